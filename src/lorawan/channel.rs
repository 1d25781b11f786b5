//! Logical channels and regulatory sub-bands

use thiserror::Error;

use crate::time::SimTime;

/// Channel and sub-band configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ChannelError {
    /// Duty cycle outside (0, 1]
    #[error("duty cycle {0} outside (0, 1]")]
    InvalidDutyCycle(f64),
    /// Sub-band whose first frequency is above its last
    #[error("sub-band range {first_hz}..={last_hz} Hz is empty")]
    InvalidRange {
        /// First frequency in Hz
        first_hz: u32,
        /// Last frequency in Hz
        last_hz: u32,
    },
    /// No registered sub-band contains the frequency
    #[error("no sub-band covers {frequency_hz} Hz")]
    NoSubBand {
        /// Frequency in Hz
        frequency_hz: u32,
    },
    /// Channel index past the end of the channel list
    #[error("channel index {index} out of range (list holds {len})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Current list length
        len: usize,
    },
    /// A channel mask enables a channel that does not exist
    #[error("channel mask enables missing channel {index}")]
    MaskEnablesMissingChannel {
        /// Bit position in the mask
        index: usize,
    },
}

/// A logical channel a device may transmit on
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalChannel {
    /// Center frequency in Hz
    pub frequency_hz: u32,
    /// Lowest data rate index allowed
    pub min_data_rate: u8,
    /// Highest data rate index allowed
    pub max_data_rate: u8,
    /// Whether the channel mask allows uplinks on this channel
    pub enabled_for_uplink: bool,
}

impl LogicalChannel {
    /// Create an uplink-enabled channel allowing DR0 to DR5
    pub fn new(frequency_hz: u32) -> Self {
        Self {
            frequency_hz,
            min_data_rate: 0,
            max_data_rate: 5,
            enabled_for_uplink: true,
        }
    }

    /// Restrict the allowed data rate range
    pub fn with_data_rate_range(mut self, min_data_rate: u8, max_data_rate: u8) -> Self {
        self.min_data_rate = min_data_rate;
        self.max_data_rate = max_data_rate;
        self
    }

    /// Allow uplinks on this channel
    pub fn enable_for_uplink(&mut self) {
        self.enabled_for_uplink = true;
    }

    /// Forbid uplinks on this channel
    pub fn disable_for_uplink(&mut self) {
        self.enabled_for_uplink = false;
    }

    /// Whether `data_rate` lies within the allowed range
    pub fn supports_data_rate(&self, data_rate: u8) -> bool {
        (self.min_data_rate..=self.max_data_rate).contains(&data_rate)
    }
}

/// A frequency range with its own duty cycle and power limits
#[derive(Debug, Clone, PartialEq)]
pub struct SubBand {
    first_frequency_hz: u32,
    last_frequency_hz: u32,
    duty_cycle: f64,
    max_tx_power_dbm: f64,
    /// Earliest instant a new transmission in this sub-band is allowed
    next_transmission_time: SimTime,
}

impl SubBand {
    /// Create a sub-band covering `first_frequency_hz..=last_frequency_hz`
    pub fn new(
        first_frequency_hz: u32,
        last_frequency_hz: u32,
        duty_cycle: f64,
        max_tx_power_dbm: f64,
    ) -> Result<Self, ChannelError> {
        if first_frequency_hz > last_frequency_hz {
            return Err(ChannelError::InvalidRange {
                first_hz: first_frequency_hz,
                last_hz: last_frequency_hz,
            });
        }
        if !(duty_cycle > 0.0 && duty_cycle <= 1.0) {
            return Err(ChannelError::InvalidDutyCycle(duty_cycle));
        }
        Ok(Self {
            first_frequency_hz,
            last_frequency_hz,
            duty_cycle,
            max_tx_power_dbm,
            next_transmission_time: SimTime::ZERO,
        })
    }

    /// Whether `frequency_hz` falls inside this sub-band, bounds included
    pub fn contains(&self, frequency_hz: u32) -> bool {
        (self.first_frequency_hz..=self.last_frequency_hz).contains(&frequency_hz)
    }

    /// Lowest frequency of the band in Hz
    pub fn first_frequency_hz(&self) -> u32 {
        self.first_frequency_hz
    }

    /// Highest frequency of the band in Hz
    pub fn last_frequency_hz(&self) -> u32 {
        self.last_frequency_hz
    }

    /// Fraction of time a device may transmit in this band
    pub fn duty_cycle(&self) -> f64 {
        self.duty_cycle
    }

    /// Transmission power cap in dBm
    pub fn max_tx_power_dbm(&self) -> f64 {
        self.max_tx_power_dbm
    }

    /// Change the transmission power cap
    pub fn set_max_tx_power_dbm(&mut self, max_tx_power_dbm: f64) {
        self.max_tx_power_dbm = max_tx_power_dbm;
    }

    /// Earliest instant a new transmission in this sub-band is allowed
    pub fn next_transmission_time(&self) -> SimTime {
        self.next_transmission_time
    }

    pub(crate) fn set_next_transmission_time(&mut self, at: SimTime) {
        self.next_transmission_time = at;
    }
}
