//! MAC command codec
//!
//! Every command is a CID byte followed by fixed-width fields. A frame carries
//! several commands back-to-back with no outer length prefix, so decoding
//! reports how many bytes each command consumed.
//!
//! LoRaWAN reuses one CID for a request/answer pair; the frame direction tells
//! them apart. `(cid, direction)` maps one-to-one onto [`CommandKind`].

use core::fmt;
use core::time::Duration;

use heapless::Vec;
use log::debug;
use thiserror::Error;

use super::mac::Direction;

/// MAC command kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandKind {
    /// Connectivity check from the device
    LinkCheckReq,
    /// Link margin and gateway count
    LinkCheckAns,
    /// Data rate, power and channel mask change
    LinkAdrReq,
    /// Acknowledgement of a LinkAdrReq
    LinkAdrAns,
    /// Aggregated duty-cycle limit
    DutyCycleReq,
    /// Acknowledgement of a DutyCycleReq
    DutyCycleAns,
    /// RX2 and RX1 offset parameters
    RxParamSetupReq,
    /// Acknowledgement of an RxParamSetupReq
    RxParamSetupAns,
    /// Battery and margin query
    DevStatusReq,
    /// Battery level and SNR margin
    DevStatusAns,
    /// Channel creation or change
    NewChannelReq,
    /// Acknowledgement of a NewChannelReq
    NewChannelAns,
    /// RX1 delay setting
    RxTimingSetupReq,
    /// Acknowledgement of an RxTimingSetupReq
    RxTimingSetupAns,
    /// Dwell time and EIRP limits
    TxParamSetupReq,
    /// Acknowledgement of a TxParamSetupReq
    TxParamSetupAns,
    /// Downlink frequency of an RX1 channel
    DlChannelReq,
    /// Acknowledgement of a DlChannelReq
    DlChannelAns,
}

/// CID table: kind, command identifier, direction the command travels in
const CID_TABLE: [(CommandKind, u8, Direction); 18] = [
    (CommandKind::LinkCheckReq, 0x02, Direction::Uplink),
    (CommandKind::LinkCheckAns, 0x02, Direction::Downlink),
    (CommandKind::LinkAdrReq, 0x03, Direction::Downlink),
    (CommandKind::LinkAdrAns, 0x03, Direction::Uplink),
    (CommandKind::DutyCycleReq, 0x04, Direction::Downlink),
    (CommandKind::DutyCycleAns, 0x04, Direction::Uplink),
    (CommandKind::RxParamSetupReq, 0x05, Direction::Downlink),
    (CommandKind::RxParamSetupAns, 0x05, Direction::Uplink),
    (CommandKind::DevStatusReq, 0x06, Direction::Downlink),
    (CommandKind::DevStatusAns, 0x06, Direction::Uplink),
    (CommandKind::NewChannelReq, 0x07, Direction::Downlink),
    (CommandKind::NewChannelAns, 0x07, Direction::Uplink),
    (CommandKind::RxTimingSetupReq, 0x08, Direction::Downlink),
    (CommandKind::RxTimingSetupAns, 0x08, Direction::Uplink),
    (CommandKind::TxParamSetupReq, 0x09, Direction::Downlink),
    (CommandKind::TxParamSetupAns, 0x09, Direction::Uplink),
    (CommandKind::DlChannelReq, 0x0A, Direction::Downlink),
    (CommandKind::DlChannelAns, 0x0A, Direction::Uplink),
];

impl CommandKind {
    /// All command kinds, in CID order
    pub const ALL: [CommandKind; 18] = [
        CommandKind::LinkCheckReq,
        CommandKind::LinkCheckAns,
        CommandKind::LinkAdrReq,
        CommandKind::LinkAdrAns,
        CommandKind::DutyCycleReq,
        CommandKind::DutyCycleAns,
        CommandKind::RxParamSetupReq,
        CommandKind::RxParamSetupAns,
        CommandKind::DevStatusReq,
        CommandKind::DevStatusAns,
        CommandKind::NewChannelReq,
        CommandKind::NewChannelAns,
        CommandKind::RxTimingSetupReq,
        CommandKind::RxTimingSetupAns,
        CommandKind::TxParamSetupReq,
        CommandKind::TxParamSetupAns,
        CommandKind::DlChannelReq,
        CommandKind::DlChannelAns,
    ];

    fn table_entry(&self) -> (CommandKind, u8, Direction) {
        // CID_TABLE is ordered like ALL, one entry per kind
        CID_TABLE[*self as usize]
    }

    /// Command identifier byte
    pub fn cid(&self) -> u8 {
        self.table_entry().1
    }

    /// Direction of the frames that carry this command
    pub fn direction(&self) -> Direction {
        self.table_entry().2
    }

    /// Look up the kind carried under `cid` in a frame travelling in `direction`
    pub fn from_cid(cid: u8, direction: Direction) -> Option<Self> {
        CID_TABLE
            .iter()
            .find(|(_, c, d)| *c == cid && *d == direction)
            .map(|(kind, _, _)| *kind)
    }

    /// Size on the wire, CID included
    pub fn serialized_size(&self) -> usize {
        match self {
            CommandKind::LinkCheckReq => 1,
            CommandKind::LinkCheckAns => 3,
            CommandKind::LinkAdrReq => 5,
            CommandKind::LinkAdrAns => 2,
            CommandKind::DutyCycleReq => 2,
            CommandKind::DutyCycleAns => 1,
            CommandKind::RxParamSetupReq => 5,
            CommandKind::RxParamSetupAns => 2,
            CommandKind::DevStatusReq => 1,
            CommandKind::DevStatusAns => 3,
            CommandKind::NewChannelReq => 6,
            CommandKind::NewChannelAns => 2,
            CommandKind::RxTimingSetupReq => 2,
            CommandKind::RxTimingSetupAns => 1,
            CommandKind::TxParamSetupReq => 1,
            CommandKind::TxParamSetupAns => 1,
            CommandKind::DlChannelReq => 5,
            CommandKind::DlChannelAns => 1,
        }
    }

    /// Command name as LoRaWAN documents it
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::LinkCheckReq => "LinkCheckReq",
            CommandKind::LinkCheckAns => "LinkCheckAns",
            CommandKind::LinkAdrReq => "LinkAdrReq",
            CommandKind::LinkAdrAns => "LinkAdrAns",
            CommandKind::DutyCycleReq => "DutyCycleReq",
            CommandKind::DutyCycleAns => "DutyCycleAns",
            CommandKind::RxParamSetupReq => "RxParamSetupReq",
            CommandKind::RxParamSetupAns => "RxParamSetupAns",
            CommandKind::DevStatusReq => "DevStatusReq",
            CommandKind::DevStatusAns => "DevStatusAns",
            CommandKind::NewChannelReq => "NewChannelReq",
            CommandKind::NewChannelAns => "NewChannelAns",
            CommandKind::RxTimingSetupReq => "RxTimingSetupReq",
            CommandKind::RxTimingSetupAns => "RxTimingSetupAns",
            CommandKind::TxParamSetupReq => "TxParamSetupReq",
            CommandKind::TxParamSetupAns => "TxParamSetupAns",
            CommandKind::DlChannelReq => "DlChannelReq",
            CommandKind::DlChannelAns => "DlChannelAns",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure to parse bytes into a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Nothing left to read
    #[error("empty buffer")]
    Empty,
    /// The CID is not assigned for this direction
    #[error("unknown CID {cid:#04x} in {direction:?} frame")]
    UnknownCid {
        /// Offending byte
        cid: u8,
        /// Direction the frame was decoded as
        direction: Direction,
    },
    /// The buffer ends before the declared size
    #[error("{what} needs {needed} bytes, {available} available")]
    BufferTooShort {
        /// What was being decoded
        what: &'static str,
        /// Bytes required
        needed: usize,
        /// Bytes present
        available: usize,
    },
    /// An FOpts field longer than a frame header can carry
    #[error("FOpts field of {len} bytes exceeds 15")]
    FrameOptionsTooLong {
        /// Length of the rejected field
        len: usize,
    },
}

/// Failure to write a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Output buffer is smaller than the serialized size
    #[error("buffer holds {available} bytes, {needed} needed")]
    BufferTooSmall {
        /// Bytes required
        needed: usize,
        /// Bytes present
        available: usize,
    },
    /// A field does not fit its wire width
    #[error("{kind} field {field} out of range: {value}")]
    FieldOutOfRange {
        /// Command being encoded
        kind: CommandKind,
        /// Field name
        field: &'static str,
        /// Rejected value
        value: i64,
    },
    /// Commands do not fit in the 15-byte FOpts field
    #[error("frame options need {needed} bytes, at most 15 fit")]
    FrameOptionsOverflow {
        /// Bytes required
        needed: usize,
    },
}

/// MAC command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MacCommand {
    /// Link check request
    LinkCheckReq,
    /// Link check answer
    LinkCheckAns {
        /// Demodulation margin in dB
        margin: u8,
        /// Number of gateways that received the request
        gateway_count: u8,
    },
    /// Link ADR request
    LinkAdrReq {
        /// Data rate index (4 bits)
        data_rate: u8,
        /// TX power index (4 bits)
        tx_power: u8,
        /// Channel mask
        channel_mask: u16,
        /// Channel mask control (3 bits)
        ch_mask_cntl: u8,
        /// Number of transmissions (4 bits)
        nb_trans: u8,
    },
    /// Link ADR answer
    LinkAdrAns {
        /// TX power accepted
        power_ack: bool,
        /// Data rate accepted
        data_rate_ack: bool,
        /// Channel mask accepted
        channel_mask_ack: bool,
    },
    /// Duty cycle request
    DutyCycleReq {
        /// Aggregated duty cycle exponent: the device may transmit 1/2^n of the time (4 bits)
        max_duty_cycle: u8,
    },
    /// Duty cycle answer
    DutyCycleAns,
    /// RX parameter setup request
    RxParamSetupReq {
        /// RX1 data rate offset (3 bits)
        rx1_dr_offset: u8,
        /// RX2 data rate index (4 bits)
        rx2_data_rate: u8,
        /// RX2 frequency in Hz, multiple of 100
        frequency_hz: u32,
    },
    /// RX parameter setup answer
    RxParamSetupAns {
        /// RX1 data rate offset accepted
        rx1_dr_offset_ack: bool,
        /// RX2 data rate accepted
        rx2_data_rate_ack: bool,
        /// RX2 frequency accepted
        channel_ack: bool,
    },
    /// Device status request
    DevStatusReq,
    /// Device status answer
    DevStatusAns {
        /// Battery level (0 = external power, 1-254 = level, 255 = unknown)
        battery: u8,
        /// SNR margin in dB, -32..=31
        margin: i8,
    },
    /// New channel request
    NewChannelReq {
        /// Channel index
        ch_index: u8,
        /// Channel frequency in Hz, multiple of 100
        frequency_hz: u32,
        /// Minimum data rate index (4 bits)
        min_data_rate: u8,
        /// Maximum data rate index (4 bits)
        max_data_rate: u8,
    },
    /// New channel answer
    NewChannelAns {
        /// Data rate range usable by the device
        data_rate_range_ok: bool,
        /// Frequency usable by the device
        channel_frequency_ok: bool,
    },
    /// RX timing setup request
    RxTimingSetupReq {
        /// RX1 delay in seconds, 0 meaning 1 (4 bits)
        delay: u8,
    },
    /// RX timing setup answer
    RxTimingSetupAns,
    /// TX parameter setup request
    TxParamSetupReq,
    /// TX parameter setup answer
    TxParamSetupAns,
    /// Downlink channel request
    DlChannelReq {
        /// Channel index
        ch_index: u8,
        /// Downlink frequency in Hz, multiple of 100
        frequency_hz: u32,
    },
    /// Downlink channel answer
    DlChannelAns,
}

/// Largest frequency the 24-bit, 100 Hz-step field can carry
const MAX_FREQUENCY_HZ: u32 = 0x00FF_FFFF * 100;

fn flag(value: bool, shift: u8) -> u8 {
    (value as u8) << shift
}

fn bit(byte: u8, shift: u8) -> bool {
    byte & (1 << shift) != 0
}

fn write_frequency(out: &mut [u8], frequency_hz: u32) {
    let bytes = (frequency_hz / 100).to_le_bytes();
    out[..3].copy_from_slice(&bytes[..3]);
}

fn read_frequency(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]) * 100
}

impl MacCommand {
    /// Kind of this command
    pub fn kind(&self) -> CommandKind {
        match self {
            MacCommand::LinkCheckReq => CommandKind::LinkCheckReq,
            MacCommand::LinkCheckAns { .. } => CommandKind::LinkCheckAns,
            MacCommand::LinkAdrReq { .. } => CommandKind::LinkAdrReq,
            MacCommand::LinkAdrAns { .. } => CommandKind::LinkAdrAns,
            MacCommand::DutyCycleReq { .. } => CommandKind::DutyCycleReq,
            MacCommand::DutyCycleAns => CommandKind::DutyCycleAns,
            MacCommand::RxParamSetupReq { .. } => CommandKind::RxParamSetupReq,
            MacCommand::RxParamSetupAns { .. } => CommandKind::RxParamSetupAns,
            MacCommand::DevStatusReq => CommandKind::DevStatusReq,
            MacCommand::DevStatusAns { .. } => CommandKind::DevStatusAns,
            MacCommand::NewChannelReq { .. } => CommandKind::NewChannelReq,
            MacCommand::NewChannelAns { .. } => CommandKind::NewChannelAns,
            MacCommand::RxTimingSetupReq { .. } => CommandKind::RxTimingSetupReq,
            MacCommand::RxTimingSetupAns => CommandKind::RxTimingSetupAns,
            MacCommand::TxParamSetupReq => CommandKind::TxParamSetupReq,
            MacCommand::TxParamSetupAns => CommandKind::TxParamSetupAns,
            MacCommand::DlChannelReq { .. } => CommandKind::DlChannelReq,
            MacCommand::DlChannelAns => CommandKind::DlChannelAns,
        }
    }

    /// Size on the wire, CID included
    pub fn serialized_size(&self) -> usize {
        self.kind().serialized_size()
    }

    /// Check every field against its wire width
    fn validate(&self) -> Result<(), EncodeError> {
        let kind = self.kind();
        let check = |field: &'static str, value: i64, max: i64| {
            if (0..=max).contains(&value) {
                Ok(())
            } else {
                Err(EncodeError::FieldOutOfRange { kind, field, value })
            }
        };
        let check_frequency = |frequency_hz: u32| {
            if frequency_hz % 100 == 0 && frequency_hz <= MAX_FREQUENCY_HZ {
                Ok(())
            } else {
                Err(EncodeError::FieldOutOfRange {
                    kind,
                    field: "Frequency",
                    value: frequency_hz as i64,
                })
            }
        };

        match *self {
            MacCommand::LinkAdrReq {
                data_rate,
                tx_power,
                ch_mask_cntl,
                nb_trans,
                ..
            } => {
                check("DataRate", data_rate as i64, 15)?;
                check("TxPower", tx_power as i64, 15)?;
                check("ChMaskCntl", ch_mask_cntl as i64, 7)?;
                check("NbTrans", nb_trans as i64, 15)
            }
            MacCommand::DutyCycleReq { max_duty_cycle } => {
                check("MaxDutyCycle", max_duty_cycle as i64, 15)
            }
            MacCommand::RxParamSetupReq {
                rx1_dr_offset,
                rx2_data_rate,
                frequency_hz,
            } => {
                check("RX1DROffset", rx1_dr_offset as i64, 7)?;
                check("RX2DataRate", rx2_data_rate as i64, 15)?;
                check_frequency(frequency_hz)
            }
            MacCommand::DevStatusAns { margin, .. } => {
                // 6-bit two's complement
                check("Margin", margin as i64 + 32, 63)
            }
            MacCommand::NewChannelReq {
                frequency_hz,
                min_data_rate,
                max_data_rate,
                ..
            } => {
                check("MinDR", min_data_rate as i64, 15)?;
                check("MaxDR", max_data_rate as i64, 15)?;
                check_frequency(frequency_hz)
            }
            MacCommand::RxTimingSetupReq { delay } => check("Del", delay as i64, 15),
            MacCommand::DlChannelReq { frequency_hz, .. } => check_frequency(frequency_hz),
            _ => Ok(()),
        }
    }

    /// Write the CID and the fields into `buffer`.
    ///
    /// Returns the number of bytes written, always [`MacCommand::serialized_size`].
    pub fn serialize(&self, buffer: &mut [u8]) -> Result<usize, EncodeError> {
        let size = self.serialized_size();
        if buffer.len() < size {
            return Err(EncodeError::BufferTooSmall {
                needed: size,
                available: buffer.len(),
            });
        }
        self.validate()?;

        let out = &mut buffer[..size];
        out[0] = self.kind().cid();
        match *self {
            MacCommand::LinkCheckReq
            | MacCommand::DutyCycleAns
            | MacCommand::DevStatusReq
            | MacCommand::RxTimingSetupAns
            | MacCommand::TxParamSetupReq
            | MacCommand::TxParamSetupAns
            | MacCommand::DlChannelAns => {}
            MacCommand::LinkCheckAns {
                margin,
                gateway_count,
            } => {
                out[1] = margin;
                out[2] = gateway_count;
            }
            MacCommand::LinkAdrReq {
                data_rate,
                tx_power,
                channel_mask,
                ch_mask_cntl,
                nb_trans,
            } => {
                out[1] = (data_rate << 4) | tx_power;
                out[2..4].copy_from_slice(&channel_mask.to_le_bytes());
                out[4] = (ch_mask_cntl << 4) | nb_trans;
            }
            MacCommand::LinkAdrAns {
                power_ack,
                data_rate_ack,
                channel_mask_ack,
            } => {
                out[1] = flag(power_ack, 2) | flag(data_rate_ack, 1) | flag(channel_mask_ack, 0);
            }
            MacCommand::DutyCycleReq { max_duty_cycle } => {
                out[1] = max_duty_cycle;
            }
            MacCommand::RxParamSetupReq {
                rx1_dr_offset,
                rx2_data_rate,
                frequency_hz,
            } => {
                out[1] = (rx1_dr_offset << 4) | rx2_data_rate;
                write_frequency(&mut out[2..5], frequency_hz);
            }
            MacCommand::RxParamSetupAns {
                rx1_dr_offset_ack,
                rx2_data_rate_ack,
                channel_ack,
            } => {
                out[1] =
                    flag(rx1_dr_offset_ack, 2) | flag(rx2_data_rate_ack, 1) | flag(channel_ack, 0);
            }
            MacCommand::DevStatusAns { battery, margin } => {
                out[1] = battery;
                out[2] = (margin as u8) & 0x3F;
            }
            MacCommand::NewChannelReq {
                ch_index,
                frequency_hz,
                min_data_rate,
                max_data_rate,
            } => {
                out[1] = ch_index;
                write_frequency(&mut out[2..5], frequency_hz);
                out[5] = (max_data_rate << 4) | min_data_rate;
            }
            MacCommand::NewChannelAns {
                data_rate_range_ok,
                channel_frequency_ok,
            } => {
                out[1] = flag(data_rate_range_ok, 1) | flag(channel_frequency_ok, 0);
            }
            MacCommand::RxTimingSetupReq { delay } => {
                out[1] = delay;
            }
            MacCommand::DlChannelReq {
                ch_index,
                frequency_hz,
            } => {
                out[1] = ch_index;
                write_frequency(&mut out[2..5], frequency_hz);
            }
        }
        Ok(size)
    }

    /// Decode one command from the start of `buffer`.
    ///
    /// Reads the CID, looks the kind up for `direction`, then decodes the
    /// fields. Returns the command and the number of bytes consumed so the
    /// caller can continue with the next command.
    pub fn deserialize(
        direction: Direction,
        buffer: &[u8],
    ) -> Result<(MacCommand, usize), DecodeError> {
        let cid = *buffer.first().ok_or(DecodeError::Empty)?;
        let kind = CommandKind::from_cid(cid, direction).ok_or_else(|| {
            debug!("Rejecting CID {:#04x} in {:?} frame", cid, direction);
            DecodeError::UnknownCid { cid, direction }
        })?;
        let size = kind.serialized_size();
        let command = Self::deserialize_fields(kind, &buffer[1..])?;
        Ok((command, size))
    }

    /// Decode the fields of a command whose CID has already been read.
    ///
    /// `fields` starts right after the CID; extra trailing bytes are ignored.
    pub fn deserialize_fields(kind: CommandKind, fields: &[u8]) -> Result<MacCommand, DecodeError> {
        let needed = kind.serialized_size() - 1;
        if fields.len() < needed {
            return Err(DecodeError::BufferTooShort {
                what: kind.name(),
                needed: needed + 1,
                available: fields.len() + 1,
            });
        }
        let p = &fields[..needed];

        let command = match kind {
            CommandKind::LinkCheckReq => MacCommand::LinkCheckReq,
            CommandKind::LinkCheckAns => MacCommand::LinkCheckAns {
                margin: p[0],
                gateway_count: p[1],
            },
            CommandKind::LinkAdrReq => MacCommand::LinkAdrReq {
                data_rate: p[0] >> 4,
                tx_power: p[0] & 0x0F,
                channel_mask: u16::from_le_bytes([p[1], p[2]]),
                ch_mask_cntl: (p[3] >> 4) & 0x07,
                nb_trans: p[3] & 0x0F,
            },
            CommandKind::LinkAdrAns => MacCommand::LinkAdrAns {
                power_ack: bit(p[0], 2),
                data_rate_ack: bit(p[0], 1),
                channel_mask_ack: bit(p[0], 0),
            },
            CommandKind::DutyCycleReq => MacCommand::DutyCycleReq {
                max_duty_cycle: p[0] & 0x0F,
            },
            CommandKind::DutyCycleAns => MacCommand::DutyCycleAns,
            CommandKind::RxParamSetupReq => MacCommand::RxParamSetupReq {
                rx1_dr_offset: (p[0] >> 4) & 0x07,
                rx2_data_rate: p[0] & 0x0F,
                frequency_hz: read_frequency(&p[1..4]),
            },
            CommandKind::RxParamSetupAns => MacCommand::RxParamSetupAns {
                rx1_dr_offset_ack: bit(p[0], 2),
                rx2_data_rate_ack: bit(p[0], 1),
                channel_ack: bit(p[0], 0),
            },
            CommandKind::DevStatusReq => MacCommand::DevStatusReq,
            CommandKind::DevStatusAns => MacCommand::DevStatusAns {
                battery: p[0],
                // Sign-extend the 6-bit field
                margin: (((p[1] & 0x3F) << 2) as i8) >> 2,
            },
            CommandKind::NewChannelReq => MacCommand::NewChannelReq {
                ch_index: p[0],
                frequency_hz: read_frequency(&p[1..4]),
                min_data_rate: p[4] & 0x0F,
                max_data_rate: p[4] >> 4,
            },
            CommandKind::NewChannelAns => MacCommand::NewChannelAns {
                data_rate_range_ok: bit(p[0], 1),
                channel_frequency_ok: bit(p[0], 0),
            },
            CommandKind::RxTimingSetupReq => MacCommand::RxTimingSetupReq { delay: p[0] & 0x0F },
            CommandKind::RxTimingSetupAns => MacCommand::RxTimingSetupAns,
            CommandKind::TxParamSetupReq => MacCommand::TxParamSetupReq,
            CommandKind::TxParamSetupAns => MacCommand::TxParamSetupAns,
            CommandKind::DlChannelReq => MacCommand::DlChannelReq {
                ch_index: p[0],
                frequency_hz: read_frequency(&p[1..4]),
            },
            CommandKind::DlChannelAns => MacCommand::DlChannelAns,
        };
        Ok(command)
    }

    /// Channel indices a LinkAdrReq mask enables, lowest first
    pub fn enabled_channels(&self) -> Option<Vec<u8, 16>> {
        match *self {
            MacCommand::LinkAdrReq { channel_mask, .. } => {
                let mut channels = Vec::new();
                for index in (0..16u8).filter(|i| channel_mask & (1 << i) != 0) {
                    // At most 16 bits can be set
                    let _ = channels.push(index);
                }
                Some(channels)
            }
            _ => None,
        }
    }

    /// Number of transmissions a LinkAdrReq prescribes
    pub fn repetitions(&self) -> Option<u8> {
        match *self {
            MacCommand::LinkAdrReq { nb_trans, .. } => Some(nb_trans),
            _ => None,
        }
    }

    /// Aggregated duty cycle fraction a DutyCycleReq allows: 1/2^MaxDCycle
    pub fn max_allowed_duty_cycle(&self) -> Option<f64> {
        match *self {
            MacCommand::DutyCycleReq { max_duty_cycle } => {
                Some(1.0 / (1u32 << (max_duty_cycle & 0x0F)) as f64)
            }
            _ => None,
        }
    }

    /// RX1 delay an RxTimingSetupReq sets
    pub fn rx_delay(&self) -> Option<Duration> {
        match *self {
            MacCommand::RxTimingSetupReq { delay } => {
                Some(Duration::from_secs(u64::from(delay.max(1))))
            }
            _ => None,
        }
    }

    /// Count one more gateway in a LinkCheckAns. Returns false for other kinds.
    pub fn increment_gateway_count(&mut self) -> bool {
        match self {
            MacCommand::LinkCheckAns { gateway_count, .. } => {
                *gateway_count = gateway_count.saturating_add(1);
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for MacCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind())?;
        match *self {
            MacCommand::LinkCheckAns {
                margin,
                gateway_count,
            } => write!(f, "Margin={}, GwCnt={}", margin, gateway_count)?,
            MacCommand::LinkAdrReq {
                data_rate,
                tx_power,
                channel_mask,
                ch_mask_cntl,
                nb_trans,
            } => write!(
                f,
                "DataRate={}, TxPower={}, ChMask={:#06x}, ChMaskCntl={}, NbTrans={}",
                data_rate, tx_power, channel_mask, ch_mask_cntl, nb_trans
            )?,
            MacCommand::LinkAdrAns {
                power_ack,
                data_rate_ack,
                channel_mask_ack,
            } => write!(
                f,
                "PowerACK={}, DataRateACK={}, ChannelMaskACK={}",
                power_ack, data_rate_ack, channel_mask_ack
            )?,
            MacCommand::DutyCycleReq { max_duty_cycle } => {
                write!(f, "MaxDutyCycle={}", max_duty_cycle)?
            }
            MacCommand::RxParamSetupReq {
                rx1_dr_offset,
                rx2_data_rate,
                frequency_hz,
            } => write!(
                f,
                "RX1DROffset={}, RX2DataRate={}, Frequency={}Hz",
                rx1_dr_offset, rx2_data_rate, frequency_hz
            )?,
            MacCommand::RxParamSetupAns {
                rx1_dr_offset_ack,
                rx2_data_rate_ack,
                channel_ack,
            } => write!(
                f,
                "RX1DROffsetACK={}, RX2DataRateACK={}, ChannelACK={}",
                rx1_dr_offset_ack, rx2_data_rate_ack, channel_ack
            )?,
            MacCommand::DevStatusAns { battery, margin } => {
                write!(f, "Battery={}, Margin={}", battery, margin)?
            }
            MacCommand::NewChannelReq {
                ch_index,
                frequency_hz,
                min_data_rate,
                max_data_rate,
            } => write!(
                f,
                "ChIndex={}, Frequency={}Hz, MinDR={}, MaxDR={}",
                ch_index, frequency_hz, min_data_rate, max_data_rate
            )?,
            MacCommand::NewChannelAns {
                data_rate_range_ok,
                channel_frequency_ok,
            } => write!(
                f,
                "DataRateRangeOk={}, ChannelFrequencyOk={}",
                data_rate_range_ok, channel_frequency_ok
            )?,
            MacCommand::RxTimingSetupReq { delay } => write!(f, "Del={}", delay)?,
            MacCommand::DlChannelReq {
                ch_index,
                frequency_hz,
            } => write!(f, "ChIndex={}, Frequency={}Hz", ch_index, frequency_hz)?,
            MacCommand::LinkCheckReq
            | MacCommand::DutyCycleAns
            | MacCommand::DevStatusReq
            | MacCommand::RxTimingSetupAns
            | MacCommand::TxParamSetupReq
            | MacCommand::TxParamSetupAns
            | MacCommand::DlChannelAns => {}
        }
        f.write_str(")")
    }
}

/// Walks a concatenated run of MAC commands.
///
/// Yields each command in order and stops after the first decode error.
#[derive(Debug, Clone)]
pub struct CommandIter<'a> {
    direction: Direction,
    remaining: &'a [u8],
    consumed: usize,
    failed: bool,
}

impl<'a> CommandIter<'a> {
    /// Iterate over the commands in `bytes`, decoded for `direction`
    pub fn new(direction: Direction, bytes: &'a [u8]) -> Self {
        Self {
            direction,
            remaining: bytes,
            consumed: 0,
            failed: false,
        }
    }

    /// Bytes successfully decoded so far
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

impl<'a> Iterator for CommandIter<'a> {
    type Item = Result<MacCommand, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining.is_empty() {
            return None;
        }
        match MacCommand::deserialize(self.direction, self.remaining) {
            Ok((command, size)) => {
                self.remaining = &self.remaining[size..];
                self.consumed += size;
                Some(Ok(command))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cid_table_is_bijective() {
        for (i, kind) in CommandKind::ALL.iter().enumerate() {
            assert_eq!(CID_TABLE[i].0, *kind);
            assert_eq!(CommandKind::from_cid(kind.cid(), kind.direction()), Some(*kind));
        }
        for (i, a) in CommandKind::ALL.iter().enumerate() {
            for b in &CommandKind::ALL[i + 1..] {
                assert!((a.cid(), a.direction()) != (b.cid(), b.direction()));
            }
        }
    }

    #[test]
    fn test_reserved_cids_rejected() {
        for cid in [0x00, 0x01, 0x0B, 0x0D, 0x80, 0xFF] {
            assert_eq!(CommandKind::from_cid(cid, Direction::Uplink), None);
            assert_eq!(CommandKind::from_cid(cid, Direction::Downlink), None);
        }
    }

    #[test]
    fn test_link_adr_req_layout() {
        let cmd = MacCommand::LinkAdrReq {
            data_rate: 5,
            tx_power: 2,
            channel_mask: 0x0007,
            ch_mask_cntl: 6,
            nb_trans: 1,
        };
        let mut buf = [0u8; 5];
        assert_eq!(cmd.serialize(&mut buf), Ok(5));
        assert_eq!(buf, [0x03, 0x52, 0x07, 0x00, 0x61]);
    }

    #[test]
    fn test_dev_status_margin_sign() {
        let cmd = MacCommand::DevStatusAns {
            battery: 200,
            margin: -5,
        };
        let mut buf = [0u8; 3];
        cmd.serialize(&mut buf).unwrap();
        assert_eq!(buf, [0x06, 200, 0x3B]);
        let (decoded, used) = MacCommand::deserialize(Direction::Uplink, &buf).unwrap();
        assert_eq!(decoded, cmd);
        assert_eq!(used, 3);
    }

    #[test]
    fn test_frequency_must_be_multiple_of_100() {
        let cmd = MacCommand::DlChannelReq {
            ch_index: 1,
            frequency_hz: 868_100_050,
        };
        let mut buf = [0u8; 5];
        assert!(matches!(
            cmd.serialize(&mut buf),
            Err(EncodeError::FieldOutOfRange {
                field: "Frequency",
                ..
            })
        ));
    }

    #[test]
    fn test_display() {
        let cmd = MacCommand::LinkCheckAns {
            margin: 20,
            gateway_count: 3,
        };
        assert_eq!(alloc::format!("{}", cmd), "LinkCheckAns(Margin=20, GwCnt=3)");
        assert_eq!(alloc::format!("{}", MacCommand::DutyCycleAns), "DutyCycleAns()");
    }
}
