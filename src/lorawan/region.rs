//! Regional channel plans
//!
//! A [`Region`] knows the regulatory sub-bands of a frequency plan, the
//! channels a device starts with, and how data-rate indices map to LoRa
//! modulation parameters. [`ChannelManager::from_region`] turns one into a
//! ready-to-use channel manager.
//!
//! [`ChannelManager::from_region`]: super::channel_manager::ChannelManager::from_region

use alloc::vec::Vec;

use super::channel::{ChannelError, LogicalChannel, SubBand};

/// Modulation parameters behind a data-rate index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataRate {
    /// Spreading factor (7 to 12)
    pub spreading_factor: u8,
    /// Bandwidth in Hz
    pub bandwidth_hz: u32,
}

impl DataRate {
    const fn new(spreading_factor: u8, bandwidth_hz: u32) -> Self {
        Self {
            spreading_factor,
            bandwidth_hz,
        }
    }
}

/// A regional frequency plan
pub trait Region {
    /// Short plan name, e.g. "EU868"
    fn name(&self) -> &'static str;

    /// Regulatory sub-bands of the plan
    fn sub_bands(&self) -> Result<Vec<SubBand>, ChannelError>;

    /// Channels a freshly activated device holds
    fn default_channels(&self) -> Vec<LogicalChannel>;

    /// Modulation parameters of data-rate index `index`
    fn data_rate(&self, index: u8) -> Option<DataRate>;

    /// Largest application payload allowed at data-rate index `index`
    fn max_payload_size(&self, index: u8) -> Option<usize>;
}

/// European 863-870 MHz plan
#[derive(Debug, Clone, Copy, Default)]
pub struct Eu868;

impl Eu868 {
    /// Default channel frequencies in Hz
    pub const DEFAULT_CHANNELS: [u32; 3] = [868_100_000, 868_300_000, 868_500_000];

    const DATA_RATES: [DataRate; 7] = [
        DataRate::new(12, 125_000),
        DataRate::new(11, 125_000),
        DataRate::new(10, 125_000),
        DataRate::new(9, 125_000),
        DataRate::new(8, 125_000),
        DataRate::new(7, 125_000),
        DataRate::new(7, 250_000),
    ];

    /// Create the plan
    pub fn new() -> Self {
        Self
    }
}

impl Region for Eu868 {
    fn name(&self) -> &'static str {
        "EU868"
    }

    fn sub_bands(&self) -> Result<Vec<SubBand>, ChannelError> {
        Ok(alloc::vec![
            SubBand::new(868_000_000, 868_600_000, 0.01, 14.0)?,
            SubBand::new(868_700_000, 869_200_000, 0.001, 14.0)?,
            SubBand::new(869_400_000, 869_650_000, 0.1, 27.0)?,
        ])
    }

    fn default_channels(&self) -> Vec<LogicalChannel> {
        Self::DEFAULT_CHANNELS
            .iter()
            .map(|&frequency| LogicalChannel::new(frequency).with_data_rate_range(0, 5))
            .collect()
    }

    fn data_rate(&self, index: u8) -> Option<DataRate> {
        Self::DATA_RATES.get(usize::from(index)).copied()
    }

    fn max_payload_size(&self, index: u8) -> Option<usize> {
        match index {
            0..=2 => Some(51),
            3 => Some(115),
            4..=6 => Some(222),
            _ => None,
        }
    }
}

/// North American 902-928 MHz plan
#[derive(Debug, Clone, Copy, Default)]
pub struct Us915 {
    /// Selected block of eight 125 kHz channels (0-7); all channels when unset
    sub_band: Option<u8>,
}

impl Us915 {
    const FIRST_125KHZ_CHANNEL: u32 = 902_300_000;
    const STEP_125KHZ: u32 = 200_000;
    const FIRST_500KHZ_CHANNEL: u32 = 903_000_000;
    const STEP_500KHZ: u32 = 1_600_000;

    const DATA_RATES: [DataRate; 5] = [
        DataRate::new(10, 125_000),
        DataRate::new(9, 125_000),
        DataRate::new(8, 125_000),
        DataRate::new(7, 125_000),
        DataRate::new(8, 500_000),
    ];

    /// Create the plan with all 72 uplink channels enabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict uplinks to one block of eight 125 kHz channels plus the
    /// matching 500 kHz channel
    pub fn set_sub_band(&mut self, sub_band: u8) {
        self.sub_band = Some(sub_band.min(7));
    }

    /// Currently selected block
    pub fn sub_band(&self) -> Option<u8> {
        self.sub_band
    }

    fn block_enabled(&self, block: u8) -> bool {
        self.sub_band.map_or(true, |selected| selected == block)
    }
}

impl Region for Us915 {
    fn name(&self) -> &'static str {
        "US915"
    }

    fn sub_bands(&self) -> Result<Vec<SubBand>, ChannelError> {
        Ok(alloc::vec![SubBand::new(902_000_000, 928_000_000, 1.0, 30.0)?])
    }

    fn default_channels(&self) -> Vec<LogicalChannel> {
        let narrow = (0..64u32).map(|i| {
            let mut channel =
                LogicalChannel::new(Self::FIRST_125KHZ_CHANNEL + i * Self::STEP_125KHZ)
                    .with_data_rate_range(0, 3);
            if !self.block_enabled((i / 8) as u8) {
                channel.disable_for_uplink();
            }
            channel
        });
        let wide = (0..8u32).map(|i| {
            let mut channel =
                LogicalChannel::new(Self::FIRST_500KHZ_CHANNEL + i * Self::STEP_500KHZ)
                    .with_data_rate_range(4, 4);
            if !self.block_enabled(i as u8) {
                channel.disable_for_uplink();
            }
            channel
        });
        narrow.chain(wide).collect()
    }

    fn data_rate(&self, index: u8) -> Option<DataRate> {
        Self::DATA_RATES.get(usize::from(index)).copied()
    }

    fn max_payload_size(&self, index: u8) -> Option<usize> {
        match index {
            0 => Some(11),
            1 => Some(53),
            2 => Some(125),
            3 | 4 => Some(242),
            _ => None,
        }
    }
}
