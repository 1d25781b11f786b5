//! Packet identity
//!
//! Packets are keyed by an explicit identifier assigned when the MAC layer
//! hands a frame to the radio. Copies of a [`Packet`] share the same id, so
//! every layer that sees a copy refers to the same ledger entry.

use alloc::vec::Vec;
use core::fmt;

use crate::lorawan::mac::MacHeader;

/// Unique identifier of a transmitted packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacketId(u64);

impl PacketId {
    /// Wrap a raw id
    pub const fn new(raw: u64) -> Self {
        PacketId(raw)
    }

    /// Raw id value
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out monotonically increasing packet ids
#[derive(Debug, Default)]
pub struct PacketIdGenerator {
    next: u64,
}

impl PacketIdGenerator {
    /// Create a generator starting at id 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id
    pub fn next_id(&mut self) -> PacketId {
        let id = PacketId(self.next);
        self.next += 1;
        id
    }
}

/// Identifier of an end device (the sender context of an uplink)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeId(pub u32);

/// Identifier of a gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GatewayId(pub u32);

impl fmt::Display for GatewayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gw{}", self.0)
    }
}

/// A LoRaWAN PHY payload together with its identity
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Identity shared by every copy of this packet
    pub id: PacketId,
    /// Raw bytes, starting with the MAC header
    pub bytes: Vec<u8>,
}

impl Packet {
    /// Create a packet from its id and raw bytes
    pub fn new(id: PacketId, bytes: Vec<u8>) -> Self {
        Self { id, bytes }
    }

    /// Parse the MAC header without touching the payload.
    ///
    /// Returns `None` for an empty packet.
    pub fn mac_header(&self) -> Option<MacHeader> {
        self.bytes.first().copied().map(MacHeader::from_byte)
    }

    /// Whether this packet travels from a device to the network
    pub fn is_uplink(&self) -> bool {
        self.mac_header().map_or(false, |mhdr| mhdr.is_uplink())
    }
}
