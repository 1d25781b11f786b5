//! Packet lifecycle tracking
//!
//! A [`PacketTracker`] is the ledger every device and gateway reports into
//! while a simulation runs. The PHY and MAC layers fire one callback per
//! physical or logical event; afterwards the metric queries in
//! [`metrics`] summarize any time window of the run without replaying it.
//!
//! Only uplinks are tracked. Callbacks for downlinks return `Ok(())` and leave
//! the ledger untouched.
//!
//! # Example
//! ```
//! use core::time::Duration;
//! use lorawan_sim::packet::{GatewayId, NodeId, Packet, PacketIdGenerator};
//! use lorawan_sim::time::SimTime;
//! use lorawan_sim::tracker::PacketTracker;
//!
//! let mut ids = PacketIdGenerator::new();
//! let mut tracker = PacketTracker::new();
//!
//! let packet = Packet::new(ids.next_id(), vec![0x40, 0x01, 0x02]);
//! let sent = SimTime::from_millis(1_000);
//! tracker.on_mac_transmission(sent, &packet, NodeId(1), 7).unwrap();
//! tracker
//!     .on_mac_gateway_reception(sent + Duration::from_millis(50), &packet, GatewayId(0))
//!     .unwrap();
//!
//! let counts = tracker.count_mac_packets_globally(SimTime::ZERO, SimTime::from_millis(2_000), Some(7));
//! assert_eq!((counts.sent, counts.received), (1, 1));
//! ```

use alloc::collections::BTreeMap;

use log::{error, info, warn};
use thiserror::Error;

use crate::config::{LedgerPolicy, TrackerConfig};
use crate::packet::{GatewayId, NodeId, Packet, PacketId};
use crate::time::SimTime;

/// Metric queries over the ledger
pub mod metrics;

/// Ledger records
pub mod status;

pub use metrics::{ConfirmedPacketCounts, MacPacketCounts, PhyPacketCounts};
pub use status::{Ledger, MacPacketStatus, PacketStatus, PhyOutcome, RetransmissionStatus};

/// Callbacks that cannot be reconciled with the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// An outcome or reception names a packet the ledger never saw transmitted
    #[error("packet {id} not found in the {ledger} ledger")]
    UnknownPacket {
        /// Packet identity
        id: PacketId,
        /// Ledger that was searched
        ledger: Ledger,
    },
    /// A second transmission record for the same packet
    #[error("packet {id} already present in the {ledger} ledger")]
    DuplicatePacket {
        /// Packet identity
        id: PacketId,
        /// Ledger holding the first record
        ledger: Ledger,
    },
    /// A gateway already reported on this packet
    #[error("packet {id} already recorded at {gateway}")]
    AlreadyRecorded {
        /// Packet identity
        id: PacketId,
        /// Reporting gateway
        gateway: GatewayId,
    },
    /// The packet has no MAC header to classify it by
    #[error("packet {id} has no MAC header")]
    MissingHeader {
        /// Packet identity
        id: PacketId,
    },
}

/// Ledger of uplink lifecycles
#[derive(Debug, Default)]
pub struct PacketTracker {
    config: TrackerConfig,
    phy_packets: BTreeMap<PacketId, PacketStatus>,
    mac_packets: BTreeMap<PacketId, MacPacketStatus>,
    retransmissions: BTreeMap<PacketId, RetransmissionStatus>,
}

impl PacketTracker {
    /// Create an empty tracker that reports inconsistencies
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tracker with the given configuration
    pub fn with_config(config: TrackerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Active configuration
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Apply the ledger policy to an inconsistency
    fn inconsistency(&self, err: TrackerError) -> TrackerError {
        match self.config.ledger_policy {
            LedgerPolicy::Report => {
                error!("Packet ledger inconsistency: {}", err);
                err
            }
            LedgerPolicy::Abort => panic!("packet ledger inconsistency: {}", err),
        }
    }

    fn duplicate(&self, err: TrackerError) -> TrackerError {
        warn!("Ignoring {}", err);
        err
    }

    /// Whether `packet` should be tracked at all
    fn is_tracked(&self, packet: &Packet) -> Result<bool, TrackerError> {
        match packet.mac_header() {
            Some(mhdr) => Ok(mhdr.is_uplink()),
            None => Err(self.inconsistency(TrackerError::MissingHeader { id: packet.id })),
        }
    }

    /// The radio of `sender` started transmitting `packet`
    pub fn on_phy_transmission(
        &mut self,
        now: SimTime,
        packet: &Packet,
        sender: NodeId,
    ) -> Result<(), TrackerError> {
        if !self.is_tracked(packet)? {
            return Ok(());
        }
        if self.phy_packets.contains_key(&packet.id) {
            return Err(self.duplicate(TrackerError::DuplicatePacket {
                id: packet.id,
                ledger: Ledger::Phy,
            }));
        }
        info!("PHY packet {} was transmitted by device {}", packet.id, sender.0);
        self.phy_packets
            .insert(packet.id, PacketStatus::new(packet.id, sender, now));
        Ok(())
    }

    /// `gateway` demodulated `packet`
    pub fn on_phy_received(&mut self, packet: &Packet, gateway: GatewayId) -> Result<(), TrackerError> {
        self.record_outcome(packet, gateway, PhyOutcome::Received)
    }

    /// `packet` was destroyed by interference at `gateway`
    pub fn on_phy_interfered(&mut self, packet: &Packet, gateway: GatewayId) -> Result<(), TrackerError> {
        self.record_outcome(packet, gateway, PhyOutcome::Interfered)
    }

    /// `gateway` had no free demodulator for `packet`
    pub fn on_phy_no_more_receivers(
        &mut self,
        packet: &Packet,
        gateway: GatewayId,
    ) -> Result<(), TrackerError> {
        self.record_outcome(packet, gateway, PhyOutcome::NoMoreReceivers)
    }

    /// `packet` arrived below `gateway`'s sensitivity
    pub fn on_phy_under_sensitivity(
        &mut self,
        packet: &Packet,
        gateway: GatewayId,
    ) -> Result<(), TrackerError> {
        self.record_outcome(packet, gateway, PhyOutcome::UnderSensitivity)
    }

    /// `gateway` was transmitting while `packet` arrived
    pub fn on_phy_lost_because_tx(
        &mut self,
        packet: &Packet,
        gateway: GatewayId,
    ) -> Result<(), TrackerError> {
        self.record_outcome(packet, gateway, PhyOutcome::LostBecauseTx)
    }

    fn record_outcome(
        &mut self,
        packet: &Packet,
        gateway: GatewayId,
        outcome: PhyOutcome,
    ) -> Result<(), TrackerError> {
        if !self.is_tracked(packet)? {
            return Ok(());
        }
        let Some(status) = self.phy_packets.get(&packet.id) else {
            return Err(self.inconsistency(TrackerError::UnknownPacket {
                id: packet.id,
                ledger: Ledger::Phy,
            }));
        };
        if status.outcomes.contains_key(&gateway) {
            return Err(self.duplicate(TrackerError::AlreadyRecorded {
                id: packet.id,
                gateway,
            }));
        }

        info!("PHY packet {} at {}: {:?}", packet.id, gateway, outcome);
        if let Some(status) = self.phy_packets.get_mut(&packet.id) {
            status.outcomes.insert(gateway, outcome);
        }
        Ok(())
    }

    /// The MAC layer of `sender` handed `packet` to the radio
    pub fn on_mac_transmission(
        &mut self,
        now: SimTime,
        packet: &Packet,
        sender: NodeId,
        spreading_factor: u8,
    ) -> Result<(), TrackerError> {
        if !self.is_tracked(packet)? {
            return Ok(());
        }
        if self.mac_packets.contains_key(&packet.id) {
            return Err(self.duplicate(TrackerError::DuplicatePacket {
                id: packet.id,
                ledger: Ledger::Mac,
            }));
        }
        info!(
            "MAC packet {} was sent by device {} at SF{}",
            packet.id, sender.0, spreading_factor
        );
        self.mac_packets.insert(
            packet.id,
            MacPacketStatus::new(packet.id, sender, now, spreading_factor),
        );
        Ok(())
    }

    /// The MAC layer of `gateway` received `packet`
    pub fn on_mac_gateway_reception(
        &mut self,
        now: SimTime,
        packet: &Packet,
        gateway: GatewayId,
    ) -> Result<(), TrackerError> {
        if !self.is_tracked(packet)? {
            return Ok(());
        }
        let Some(status) = self.mac_packets.get(&packet.id) else {
            return Err(self.inconsistency(TrackerError::UnknownPacket {
                id: packet.id,
                ledger: Ledger::Mac,
            }));
        };
        if status.reception_times.contains_key(&gateway) {
            return Err(self.duplicate(TrackerError::AlreadyRecorded {
                id: packet.id,
                gateway,
            }));
        }

        info!("MAC packet {} was received at {} at {}", packet.id, gateway, now);
        if let Some(status) = self.mac_packets.get_mut(&packet.id) {
            status.reception_times.insert(gateway, now);
        }
        Ok(())
    }

    /// A confirmed uplink's retry sequence concluded at `now`
    pub fn on_retransmission_sequence_finished(
        &mut self,
        now: SimTime,
        attempts: u8,
        spreading_factor: u8,
        success: bool,
        first_attempt: SimTime,
        packet: &Packet,
    ) -> Result<(), TrackerError> {
        if self.retransmissions.contains_key(&packet.id) {
            return Err(self.duplicate(TrackerError::DuplicatePacket {
                id: packet.id,
                ledger: Ledger::Retransmission,
            }));
        }
        info!(
            "Retransmissions of packet {} finished after {} attempts (success: {})",
            packet.id, attempts, success
        );
        self.retransmissions.insert(
            packet.id,
            RetransmissionStatus {
                id: packet.id,
                first_attempt,
                finish_time: now,
                spreading_factor,
                attempts,
                successful: success,
            },
        );
        Ok(())
    }

    /// PHY record of `id`
    pub fn phy_packet(&self, id: PacketId) -> Option<&PacketStatus> {
        self.phy_packets.get(&id)
    }

    /// MAC record of `id`
    pub fn mac_packet(&self, id: PacketId) -> Option<&MacPacketStatus> {
        self.mac_packets.get(&id)
    }

    /// Retry-sequence record of `id`
    pub fn retransmission(&self, id: PacketId) -> Option<&RetransmissionStatus> {
        self.retransmissions.get(&id)
    }

    /// Number of packets in `ledger`
    pub fn ledger_len(&self, ledger: Ledger) -> usize {
        match ledger {
            Ledger::Phy => self.phy_packets.len(),
            Ledger::Mac => self.mac_packets.len(),
            Ledger::Retransmission => self.retransmissions.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn uplink(id: u64) -> Packet {
        Packet::new(PacketId::new(id), vec![0x40, 0x00])
    }

    #[test]
    fn test_downlinks_ignored() {
        let mut tracker = PacketTracker::new();
        let downlink = Packet::new(PacketId::new(0), vec![0x60, 0x00]);
        assert!(tracker
            .on_mac_transmission(SimTime::ZERO, &downlink, NodeId(0), 7)
            .is_ok());
        assert!(tracker
            .on_mac_gateway_reception(SimTime::ZERO, &downlink, GatewayId(0))
            .is_ok());
        assert_eq!(tracker.ledger_len(Ledger::Mac), 0);
    }

    #[test]
    fn test_missing_header() {
        let mut tracker = PacketTracker::new();
        let empty = Packet::new(PacketId::new(4), vec![]);
        assert_eq!(
            tracker.on_phy_transmission(SimTime::ZERO, &empty, NodeId(0)),
            Err(TrackerError::MissingHeader {
                id: PacketId::new(4)
            })
        );
    }

    #[test]
    fn test_first_outcome_wins() {
        let mut tracker = PacketTracker::new();
        let packet = uplink(1);
        tracker
            .on_phy_transmission(SimTime::ZERO, &packet, NodeId(3))
            .unwrap();
        tracker.on_phy_received(&packet, GatewayId(0)).unwrap();
        assert_eq!(
            tracker.on_phy_interfered(&packet, GatewayId(0)),
            Err(TrackerError::AlreadyRecorded {
                id: packet.id,
                gateway: GatewayId(0)
            })
        );
        let status = tracker.phy_packet(packet.id).unwrap();
        assert_eq!(status.outcome(GatewayId(0)), Some(PhyOutcome::Received));
        assert_eq!(status.outcome(GatewayId(1)), None);
    }

    #[test]
    fn test_unknown_packet_reported() {
        let mut tracker = PacketTracker::new();
        let packet = uplink(9);
        assert_eq!(
            tracker.on_phy_received(&packet, GatewayId(0)),
            Err(TrackerError::UnknownPacket {
                id: packet.id,
                ledger: Ledger::Phy
            })
        );
        assert_eq!(
            tracker.on_mac_gateway_reception(SimTime::ZERO, &packet, GatewayId(0)),
            Err(TrackerError::UnknownPacket {
                id: packet.id,
                ledger: Ledger::Mac
            })
        );
        assert_eq!(tracker.ledger_len(Ledger::Phy), 0);
    }

    #[test]
    #[should_panic(expected = "not found in the MAC ledger")]
    fn test_abort_policy_panics() {
        let config = TrackerConfig::new().with_ledger_policy(LedgerPolicy::Abort);
        let mut tracker = PacketTracker::with_config(config);
        let _ = tracker.on_mac_gateway_reception(SimTime::ZERO, &uplink(2), GatewayId(0));
    }

    #[test]
    fn test_duplicate_transmission_keeps_first() {
        let mut tracker = PacketTracker::new();
        let packet = uplink(5);
        tracker
            .on_mac_transmission(SimTime::from_millis(10), &packet, NodeId(1), 9)
            .unwrap();
        assert!(matches!(
            tracker.on_mac_transmission(SimTime::from_millis(20), &packet, NodeId(1), 7),
            Err(TrackerError::DuplicatePacket { .. })
        ));
        let status = tracker.mac_packet(packet.id).unwrap();
        assert_eq!(status.send_time, SimTime::from_millis(10));
        assert_eq!(status.spreading_factor, 9);
    }
}
