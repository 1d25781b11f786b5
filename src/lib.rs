//! LoRaWAN network simulation core in Rust
//!
//! This crate provides the pieces of a LoRaWAN network simulator that sit
//! between the radio model and the reporting layer. The discrete-event
//! scheduler driving a run lives outside the crate and hands every operation
//! the current [`time::SimTime`].
//!
//! # Features
//! - Per-device duty-cycle admission control over regulatory sub-bands
//! - Regional channel plans (EU868, US915)
//! - Codec for the LoRaWAN 1.0.x MAC commands and frame options
//! - Packet lifecycle ledger with PHY and MAC metrics
//! - `no_std` with `alloc`; the default `std` feature adds dB/Watt conversions
//!
//! # Example
//! ```
//! use core::time::Duration;
//! use lorawan_sim::{
//!     config::DeviceConfig,
//!     lorawan::{ChannelManager, Eu868},
//!     time::SimTime,
//! };
//!
//! let mut channels = ChannelManager::from_region(&Eu868::new(), &DeviceConfig::default()).unwrap();
//! let channel = channels.channels()[0].clone();
//!
//! let now = SimTime::from_millis(5_000);
//! channels.add_event(now, Duration::from_millis(500), &channel).unwrap();
//!
//! // 1 % sub-band: 500 ms on air means 49.5 s of silence
//! assert_eq!(
//!     channels.transmission_delay(now, &channel).unwrap(),
//!     Duration::from_millis(49_500)
//! );
//! ```

#![warn(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// Device and tracker configuration
pub mod config;

/// LoRaWAN protocol pieces
pub mod lorawan;

/// Packet identity
pub mod packet;

/// Simulated time
pub mod time;

/// Packet lifecycle tracking
pub mod tracker;

pub use config::{DeviceConfig, LedgerPolicy, TrackerConfig};
pub use packet::{GatewayId, NodeId, Packet, PacketId, PacketIdGenerator};
pub use time::SimTime;
pub use tracker::{PacketTracker, TrackerError};
