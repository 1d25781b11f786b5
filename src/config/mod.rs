//! Device and tracker configuration
//!
//! This module contains the knobs a simulation sets up front:
//! - Device configuration (device-wide duty cycle)
//! - Tracker configuration (how ledger inconsistencies are handled)

/// Device configuration
pub mod device;

/// Packet tracker configuration
pub mod tracker;

pub use device::DeviceConfig;
pub use tracker::{LedgerPolicy, TrackerConfig};
