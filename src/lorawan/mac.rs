//! MAC header, frame control and FOpts handling

use heapless::Vec;

use super::commands::{CommandIter, DecodeError, EncodeError, MacCommand};

/// Maximum length of the FOpts field in a frame header
pub const MAX_FOPTS_LEN: usize = 15;

/// Direction a frame travels in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Device to network
    Uplink,
    /// Network to device
    Downlink,
}

/// MAC header types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MType {
    /// Join request from a device
    JoinRequest = 0x00,
    /// Join accept from the network
    JoinAccept = 0x20,
    /// Uplink without acknowledgement
    UnconfirmedDataUp = 0x40,
    /// Downlink without acknowledgement
    UnconfirmedDataDown = 0x60,
    /// Uplink the network must acknowledge
    ConfirmedDataUp = 0x80,
    /// Downlink the device must acknowledge
    ConfirmedDataDown = 0xA0,
    /// Rejoin request from a device
    RejoinRequest = 0xC0,
    /// Proprietary frame
    Proprietary = 0xE0,
}

impl MType {
    /// Extract the message type from the top three bits of an MHDR byte
    pub fn from_byte(byte: u8) -> Self {
        match byte & 0xE0 {
            0x00 => MType::JoinRequest,
            0x20 => MType::JoinAccept,
            0x40 => MType::UnconfirmedDataUp,
            0x60 => MType::UnconfirmedDataDown,
            0x80 => MType::ConfirmedDataUp,
            0xA0 => MType::ConfirmedDataDown,
            0xC0 => MType::RejoinRequest,
            _ => MType::Proprietary,
        }
    }

    /// Direction implied by the message type.
    ///
    /// Proprietary frames carry no direction and are treated as downlink.
    pub fn direction(&self) -> Direction {
        match self {
            MType::JoinRequest
            | MType::UnconfirmedDataUp
            | MType::ConfirmedDataUp
            | MType::RejoinRequest => Direction::Uplink,
            MType::JoinAccept
            | MType::UnconfirmedDataDown
            | MType::ConfirmedDataDown
            | MType::Proprietary => Direction::Downlink,
        }
    }

    /// Whether the sender expects an acknowledgement
    pub fn is_confirmed(&self) -> bool {
        matches!(self, MType::ConfirmedDataUp | MType::ConfirmedDataDown)
    }
}

/// MAC header (MHDR), the first byte of every PHY payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacHeader {
    /// Message type
    pub mtype: MType,
    /// LoRaWAN major version (0 = R1)
    pub major: u8,
}

impl MacHeader {
    /// Build a header for the given message type, major version R1
    pub fn new(mtype: MType) -> Self {
        Self { mtype, major: 0 }
    }

    /// Parse an MHDR byte
    pub fn from_byte(byte: u8) -> Self {
        Self {
            mtype: MType::from_byte(byte),
            major: byte & 0x03,
        }
    }

    /// Encode as an MHDR byte
    pub fn to_byte(&self) -> u8 {
        self.mtype as u8 | (self.major & 0x03)
    }

    /// Whether the frame travels from a device to the network
    pub fn is_uplink(&self) -> bool {
        self.mtype.direction() == Direction::Uplink
    }
}

/// Frame header flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FCtrl {
    /// Adaptive data rate enabled
    pub adr: bool,
    /// ADR acknowledgement requested (uplink only)
    pub adr_ack_req: bool,
    /// Acknowledges the last confirmed frame
    pub ack: bool,
    /// More downlink data pending (downlink only)
    pub f_pending: bool,
    /// Length of the FOpts field, 0 to 15
    pub f_opts_len: u8,
}

impl FCtrl {
    /// Pack into the FCtrl byte
    pub fn to_byte(&self) -> u8 {
        let mut byte = self.f_opts_len & 0x0F;
        if self.adr {
            byte |= 0x80;
        }
        if self.adr_ack_req {
            byte |= 0x40;
        }
        if self.ack {
            byte |= 0x20;
        }
        if self.f_pending {
            byte |= 0x10;
        }
        byte
    }

    /// Unpack an FCtrl byte
    pub fn from_byte(byte: u8) -> Self {
        Self {
            adr: (byte & 0x80) != 0,
            adr_ack_req: (byte & 0x40) != 0,
            ack: (byte & 0x20) != 0,
            f_pending: (byte & 0x10) != 0,
            f_opts_len: byte & 0x0F,
        }
    }
}

/// Pack MAC commands back-to-back into an FOpts field
pub fn encode_frame_options(
    commands: &[MacCommand],
) -> Result<Vec<u8, MAX_FOPTS_LEN>, EncodeError> {
    let total: usize = commands.iter().map(MacCommand::serialized_size).sum();
    if total > MAX_FOPTS_LEN {
        return Err(EncodeError::FrameOptionsOverflow { needed: total });
    }

    let mut buffer = [0u8; MAX_FOPTS_LEN];
    let mut offset = 0;
    for command in commands {
        offset += command.serialize(&mut buffer[offset..])?;
    }

    let mut f_opts = Vec::new();
    f_opts
        .extend_from_slice(&buffer[..offset])
        .map_err(|_| EncodeError::FrameOptionsOverflow { needed: offset })?;
    Ok(f_opts)
}

/// Parse every MAC command carried in an FOpts field.
///
/// Fails on a field longer than [`MAX_FOPTS_LEN`] and on the first malformed
/// command; nothing decoded before the failure is returned.
pub fn decode_frame_options(
    direction: Direction,
    f_opts: &[u8],
) -> Result<Vec<MacCommand, MAX_FOPTS_LEN>, DecodeError> {
    if f_opts.len() > MAX_FOPTS_LEN {
        return Err(DecodeError::FrameOptionsTooLong { len: f_opts.len() });
    }

    let mut commands = Vec::new();
    for command in CommandIter::new(direction, f_opts) {
        // At most one command per byte, so the capacity is never exceeded
        commands
            .push(command?)
            .map_err(|_| DecodeError::FrameOptionsTooLong { len: f_opts.len() })?;
    }
    Ok(commands)
}
