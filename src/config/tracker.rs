/// What the tracker does when a callback refers to a packet it cannot account for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedgerPolicy {
    /// Log the inconsistency and return it as an error; the ledger is untouched
    #[default]
    Report,
    /// Panic with the error message
    Abort,
}

/// Packet tracker configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackerConfig {
    /// Handling of ledger inconsistencies
    pub ledger_policy: LedgerPolicy,
}

impl TrackerConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ledger policy
    pub fn with_ledger_policy(mut self, ledger_policy: LedgerPolicy) -> Self {
        self.ledger_policy = ledger_policy;
        self
    }
}
