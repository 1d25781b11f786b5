/// Per-device configuration consumed by
/// [`ChannelManager::from_region`](crate::lorawan::ChannelManager::from_region)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceConfig {
    /// Fraction of time the device may spend transmitting, across all sub-bands
    pub aggregated_duty_cycle: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            aggregated_duty_cycle: 1.0,
        }
    }
}

impl DeviceConfig {
    /// Create a configuration with no device-wide limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device-wide duty cycle.
    ///
    /// Validated when a channel manager is built from this configuration.
    pub fn with_aggregated_duty_cycle(mut self, duty_cycle: f64) -> Self {
        self.aggregated_duty_cycle = duty_cycle;
        self
    }
}
