//! Ledger records

use alloc::collections::BTreeMap;
use core::fmt;

use crate::packet::{GatewayId, NodeId, PacketId};
use crate::time::SimTime;

/// The three ledgers kept by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ledger {
    /// Per-gateway radio outcomes
    Phy,
    /// Per-gateway MAC deliveries
    Mac,
    /// Finished confirmed-uplink retry sequences
    Retransmission,
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Ledger::Phy => "PHY",
            Ledger::Mac => "MAC",
            Ledger::Retransmission => "retransmission",
        })
    }
}

/// How an uplink fared at one gateway's radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhyOutcome {
    /// Demodulated successfully
    Received,
    /// Destroyed by an overlapping transmission
    Interfered,
    /// Every demodulator path was busy
    NoMoreReceivers,
    /// Arrived below the receiver's sensitivity
    UnderSensitivity,
    /// The gateway was transmitting a downlink at the time
    LostBecauseTx,
}

/// PHY-level record of one uplink
#[derive(Debug, Clone, PartialEq)]
pub struct PacketStatus {
    /// Packet identity
    pub id: PacketId,
    /// Transmitting device
    pub sender: NodeId,
    /// When the radio started transmitting
    pub send_time: SimTime,
    /// Outcome per gateway; gateways that reported nothing are absent
    pub outcomes: BTreeMap<GatewayId, PhyOutcome>,
}

impl PacketStatus {
    pub(crate) fn new(id: PacketId, sender: NodeId, send_time: SimTime) -> Self {
        Self {
            id,
            sender,
            send_time,
            outcomes: BTreeMap::new(),
        }
    }

    /// Outcome reported by `gateway`
    pub fn outcome(&self, gateway: GatewayId) -> Option<PhyOutcome> {
        self.outcomes.get(&gateway).copied()
    }
}

/// MAC-level record of one uplink
#[derive(Debug, Clone, PartialEq)]
pub struct MacPacketStatus {
    /// Packet identity
    pub id: PacketId,
    /// Transmitting device
    pub sender: NodeId,
    /// When the MAC layer handed the frame to the radio
    pub send_time: SimTime,
    /// Spreading factor used
    pub spreading_factor: u8,
    /// Reception instant per gateway; gateways that never received it are absent
    pub reception_times: BTreeMap<GatewayId, SimTime>,
}

impl MacPacketStatus {
    pub(crate) fn new(id: PacketId, sender: NodeId, send_time: SimTime, spreading_factor: u8) -> Self {
        Self {
            id,
            sender,
            send_time,
            spreading_factor,
            reception_times: BTreeMap::new(),
        }
    }

    /// When `gateway` received the packet
    pub fn reception_time(&self, gateway: GatewayId) -> Option<SimTime> {
        self.reception_times.get(&gateway).copied()
    }

    /// Whether at least one gateway received the packet
    pub fn is_received(&self) -> bool {
        !self.reception_times.is_empty()
    }
}

/// Outcome of a confirmed uplink's whole retry sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetransmissionStatus {
    /// Packet identity
    pub id: PacketId,
    /// When the first attempt was sent
    pub first_attempt: SimTime,
    /// When the sequence concluded
    pub finish_time: SimTime,
    /// Spreading factor used
    pub spreading_factor: u8,
    /// Transmissions performed
    pub attempts: u8,
    /// Whether an acknowledgement arrived
    pub successful: bool,
}
