//! LoRaWAN protocol pieces
//!
//! This module contains the parts of the protocol a network simulation needs:
//! - MAC header parsing and frame options
//! - MAC command codec
//! - Logical channels, sub-bands and duty-cycle admission
//! - Regional channel plans
//! - PHY packet metadata

/// Logical channels and sub-bands
pub mod channel;

/// Duty-cycle aware channel management
pub mod channel_manager;

/// MAC command codec
pub mod commands;

/// MAC header and frame options
pub mod mac;

/// PHY packet metadata and power units
pub mod phy;

/// Regional channel plans
pub mod region;

pub use channel::{ChannelError, LogicalChannel, SubBand};
pub use channel_manager::ChannelManager;
pub use commands::{CommandIter, CommandKind, DecodeError, EncodeError, MacCommand};
pub use mac::{Direction, MType, MacHeader};
pub use phy::PhyTag;
pub use region::{DataRate, Eu868, Region, Us915};
