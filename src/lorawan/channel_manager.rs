//! Duty-cycle aware channel management
//!
//! A [`ChannelManager`] belongs to one device. It holds the device's logical
//! channels (its channel mask) and the regulatory sub-bands those channels
//! fall into, and tracks two independent airtime budgets:
//! - one per sub-band, using that sub-band's duty cycle
//! - one aggregated over the whole device, using the device-wide duty cycle
//!
//! Both must allow a transmission. The manager never blocks or refuses a
//! transmission itself; it reports how long the caller has to wait.

use alloc::vec::Vec;
use core::time::Duration;

use log::{debug, info};

use super::channel::{ChannelError, LogicalChannel, SubBand};
use super::region::Region;
use crate::config::DeviceConfig;
use crate::time::SimTime;

/// Silence required after `airtime` so that the duty cycle holds
fn off_time(airtime: Duration, duty_cycle: f64) -> Duration {
    let secs = airtime.as_secs_f64() * (1.0 / duty_cycle - 1.0);
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

fn validate_duty_cycle(duty_cycle: f64) -> Result<(), ChannelError> {
    if duty_cycle > 0.0 && duty_cycle <= 1.0 {
        Ok(())
    } else {
        Err(ChannelError::InvalidDutyCycle(duty_cycle))
    }
}

/// Per-device channel list and duty-cycle bookkeeping
#[derive(Debug, Clone)]
pub struct ChannelManager {
    /// Registered sub-bands, searched in insertion order
    sub_bands: Vec<SubBand>,
    /// Channel mask; the first slots hold the region's default channels
    channels: Vec<LogicalChannel>,
    /// Earliest instant the aggregated budget allows a new transmission
    next_aggregated_transmission_time: SimTime,
    /// Device-wide duty cycle
    aggregated_duty_cycle: f64,
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self {
            sub_bands: Vec::new(),
            channels: Vec::new(),
            next_aggregated_transmission_time: SimTime::ZERO,
            aggregated_duty_cycle: 1.0,
        }
    }
}

impl ChannelManager {
    /// Create an empty manager with no device-wide limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty manager configured from `config`
    pub fn with_config(config: &DeviceConfig) -> Result<Self, ChannelError> {
        let mut manager = Self::new();
        manager.set_aggregated_duty_cycle(config.aggregated_duty_cycle)?;
        Ok(manager)
    }

    /// Create a manager holding `region`'s sub-bands and default channels
    pub fn from_region<R: Region + ?Sized>(
        region: &R,
        config: &DeviceConfig,
    ) -> Result<Self, ChannelError> {
        let mut manager = Self::with_config(config)?;
        for sub_band in region.sub_bands()? {
            manager.add_sub_band(sub_band);
        }
        for channel in region.default_channels() {
            manager.add_channel(channel);
        }
        info!(
            "Channel plan {}: {} channels, {} sub-bands",
            region.name(),
            manager.channels.len(),
            manager.sub_bands.len()
        );
        Ok(manager)
    }

    /// Device-wide duty cycle
    pub fn aggregated_duty_cycle(&self) -> f64 {
        self.aggregated_duty_cycle
    }

    /// Change the device-wide duty cycle, e.g. after a DutyCycleReq
    pub fn set_aggregated_duty_cycle(&mut self, duty_cycle: f64) -> Result<(), ChannelError> {
        validate_duty_cycle(duty_cycle)?;
        self.aggregated_duty_cycle = duty_cycle;
        Ok(())
    }

    /// Register a sub-band.
    ///
    /// Sub-bands are expected not to overlap; lookups return the first match.
    pub fn add_sub_band(&mut self, sub_band: SubBand) {
        self.sub_bands.push(sub_band);
    }

    /// Create and register a sub-band
    pub fn add_sub_band_range(
        &mut self,
        first_frequency_hz: u32,
        last_frequency_hz: u32,
        duty_cycle: f64,
        max_tx_power_dbm: f64,
    ) -> Result<(), ChannelError> {
        let sub_band = SubBand::new(
            first_frequency_hz,
            last_frequency_hz,
            duty_cycle,
            max_tx_power_dbm,
        )?;
        self.add_sub_band(sub_band);
        Ok(())
    }

    /// Append a channel
    pub fn add_channel(&mut self, channel: LogicalChannel) {
        self.channels.push(channel);
    }

    /// Append a default channel at `frequency_hz`
    pub fn add_channel_at(&mut self, frequency_hz: u32) {
        self.add_channel(LogicalChannel::new(frequency_hz));
    }

    /// Put `channel` at `index`.
    ///
    /// Replaces the channel there, or appends when `index` equals the list length.
    pub fn set_channel(&mut self, index: usize, channel: LogicalChannel) -> Result<(), ChannelError> {
        let len = self.channels.len();
        match index {
            i if i < len => self.channels[i] = channel,
            i if i == len => self.channels.push(channel),
            _ => return Err(ChannelError::IndexOutOfRange { index, len }),
        }
        Ok(())
    }

    /// Remove the first channel equal to `channel`. Returns whether one was removed.
    pub fn remove_channel(&mut self, channel: &LogicalChannel) -> bool {
        match self.channels.iter().position(|c| c == channel) {
            Some(index) => {
                self.channels.remove(index);
                true
            }
            None => false,
        }
    }

    /// Mark the channel at `index` ineligible for uplink, keeping it in the list
    pub fn disable_channel(&mut self, index: usize) -> Result<(), ChannelError> {
        let len = self.channels.len();
        self.channels
            .get_mut(index)
            .map(LogicalChannel::disable_for_uplink)
            .ok_or(ChannelError::IndexOutOfRange { index, len })
    }

    /// Apply a LinkAdrReq channel mask to the first 16 channels.
    ///
    /// Bit `i` set enables channel `i`, cleared disables it. A mask enabling a
    /// channel that does not exist is rejected and nothing changes.
    pub fn apply_channel_mask(&mut self, mask: u16) -> Result<(), ChannelError> {
        if let Some(index) = (self.channels.len()..16).find(|i| mask & (1 << i) != 0) {
            return Err(ChannelError::MaskEnablesMissingChannel { index });
        }
        for (i, channel) in self.channels.iter_mut().take(16).enumerate() {
            channel.enabled_for_uplink = mask & (1 << i) != 0;
        }
        Ok(())
    }

    /// Channel at `index`
    pub fn channel(&self, index: usize) -> Option<&LogicalChannel> {
        self.channels.get(index)
    }

    /// Every registered channel
    pub fn channels(&self) -> &[LogicalChannel] {
        &self.channels
    }

    /// Channels the mask currently allows uplinks on
    pub fn enabled_channels(&self) -> impl Iterator<Item = &LogicalChannel> {
        self.channels.iter().filter(|c| c.enabled_for_uplink)
    }

    /// Every registered sub-band
    pub fn sub_bands(&self) -> &[SubBand] {
        &self.sub_bands
    }

    /// Sub-band containing `frequency_hz`
    pub fn sub_band_for_frequency(&self, frequency_hz: u32) -> Option<&SubBand> {
        self.sub_bands.iter().find(|b| b.contains(frequency_hz))
    }

    fn sub_band_for_frequency_mut(&mut self, frequency_hz: u32) -> Option<&mut SubBand> {
        self.sub_bands.iter_mut().find(|b| b.contains(frequency_hz))
    }

    /// Sub-band `channel` belongs to
    pub fn sub_band_for_channel(&self, channel: &LogicalChannel) -> Option<&SubBand> {
        self.sub_band_for_frequency(channel.frequency_hz)
    }

    fn require_sub_band(&self, channel: &LogicalChannel) -> Result<&SubBand, ChannelError> {
        self.sub_band_for_channel(channel)
            .ok_or(ChannelError::NoSubBand {
                frequency_hz: channel.frequency_hz,
            })
    }

    /// Maximum transmit power in dBm allowed on `channel`
    pub fn tx_power_for_channel(&self, channel: &LogicalChannel) -> Result<f64, ChannelError> {
        self.require_sub_band(channel).map(SubBand::max_tx_power_dbm)
    }

    /// Maximum transmit power in Watts allowed on `channel`
    #[cfg(feature = "std")]
    pub fn tx_power_watts_for_channel(&self, channel: &LogicalChannel) -> Result<f64, ChannelError> {
        self.tx_power_for_channel(channel).map(super::phy::dbm_to_watts)
    }

    /// Register a transmission of `duration` on `channel` that ended at `now`.
    ///
    /// Pushes back both the channel's sub-band budget and the aggregated
    /// budget to `now + duration * (1/duty_cycle - 1)`. Neither instant ever
    /// moves backwards. Fails without changing anything if no sub-band covers
    /// the channel.
    ///
    /// Passing the end of the transmission keeps the airtime fraction of a
    /// sub-band at or below its duty cycle. Passing the start instead lets it
    /// reach `d / (1 - d)`.
    pub fn add_event(
        &mut self,
        now: SimTime,
        duration: Duration,
        channel: &LogicalChannel,
    ) -> Result<(), ChannelError> {
        let aggregated_duty_cycle = self.aggregated_duty_cycle;
        let sub_band = self
            .sub_band_for_frequency_mut(channel.frequency_hz)
            .ok_or(ChannelError::NoSubBand {
                frequency_hz: channel.frequency_hz,
            })?;

        let next = now + off_time(duration, sub_band.duty_cycle());
        let next = next.max(sub_band.next_transmission_time());
        sub_band.set_next_transmission_time(next);
        debug!(
            "Transmission of {:?} on {} Hz at {}: sub-band free at {}",
            duration, channel.frequency_hz, now, next
        );

        let aggregated = now + off_time(duration, aggregated_duty_cycle);
        self.next_aggregated_transmission_time =
            aggregated.max(self.next_aggregated_transmission_time);
        debug!(
            "Aggregated budget free at {}",
            self.next_aggregated_transmission_time
        );
        Ok(())
    }

    /// Time to wait before `channel`'s sub-band allows a transmission.
    ///
    /// Ignores the aggregated budget; check [`ChannelManager::aggregated_waiting_time`]
    /// as well, or use [`ChannelManager::transmission_delay`].
    pub fn waiting_time(&self, now: SimTime, channel: &LogicalChannel) -> Result<Duration, ChannelError> {
        let sub_band = self.require_sub_band(channel)?;
        Ok(sub_band.next_transmission_time().saturating_duration_since(now))
    }

    /// Time to wait before the aggregated budget allows a transmission
    pub fn aggregated_waiting_time(&self, now: SimTime) -> Duration {
        self.next_aggregated_transmission_time
            .saturating_duration_since(now)
    }

    /// Time to wait before both budgets allow a transmission on `channel`
    pub fn transmission_delay(&self, now: SimTime, channel: &LogicalChannel) -> Result<Duration, ChannelError> {
        let sub_band_wait = self.waiting_time(now, channel)?;
        Ok(sub_band_wait.max(self.aggregated_waiting_time(now)))
    }

    /// Earliest instant the aggregated budget allows a transmission
    pub fn next_aggregated_transmission_time(&self) -> SimTime {
        self.next_aggregated_transmission_time
    }
}
