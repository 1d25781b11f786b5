//! Metric queries
//!
//! Every query is a pure function of the ledger and its window arguments, so
//! asking twice gives the same answer. Windows are closed (`start <= t <= stop`)
//! except for the delay query, which uses the open interval.
//! Queries never fail; an empty window yields zero counts and ratios of 0.0.

use alloc::collections::BTreeMap;
use core::fmt;

use log::debug;

use super::status::PhyOutcome;
use super::PacketTracker;
use crate::packet::GatewayId;
use crate::time::SimTime;

fn in_window(t: SimTime, start: SimTime, stop: SimTime) -> bool {
    start <= t && t <= stop
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// PHY outcomes of the uplinks sent in a window, as seen by one gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhyPacketCounts {
    /// Uplinks sent
    pub sent: usize,
    /// Demodulated
    pub received: usize,
    /// Destroyed by interference
    pub interfered: usize,
    /// Dropped for lack of a free demodulator
    pub no_more_receivers: usize,
    /// Below sensitivity
    pub under_sensitivity: usize,
    /// Lost to a concurrent downlink
    pub lost_because_tx: usize,
}

impl PhyPacketCounts {
    /// Counts in the order sent, received, interfered, no more receivers,
    /// under sensitivity, lost because of transmission
    pub fn as_array(&self) -> [usize; 6] {
        [
            self.sent,
            self.received,
            self.interfered,
            self.no_more_receivers,
            self.under_sensitivity,
            self.lost_because_tx,
        ]
    }

    fn count(&mut self, outcome: PhyOutcome) {
        match outcome {
            PhyOutcome::Received => self.received += 1,
            PhyOutcome::Interfered => self.interfered += 1,
            PhyOutcome::NoMoreReceivers => self.no_more_receivers += 1,
            PhyOutcome::UnderSensitivity => self.under_sensitivity += 1,
            PhyOutcome::LostBecauseTx => self.lost_because_tx += 1,
        }
    }
}

impl fmt::Display for PhyPacketCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.as_array();
        write!(f, "{} {} {} {} {} {}", a, b, c, d, e, g)
    }
}

/// MAC deliveries of the uplinks sent in a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MacPacketCounts {
    /// Uplinks sent
    pub sent: usize,
    /// Uplinks received by at least one gateway
    pub received: usize,
}

impl MacPacketCounts {
    /// Packet delivery ratio
    pub fn delivery_ratio(&self) -> f64 {
        ratio(self.received, self.sent)
    }

    /// Packet loss ratio
    pub fn loss_ratio(&self) -> f64 {
        if self.sent == 0 {
            0.0
        } else {
            1.0 - self.delivery_ratio()
        }
    }
}

impl fmt::Display for MacPacketCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.sent, self.received)
    }
}

/// Confirmed-uplink retry sequences started in a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfirmedPacketCounts {
    /// Sequences finished
    pub attempted: usize,
    /// Sequences that got an acknowledgement
    pub succeeded: usize,
}

impl ConfirmedPacketCounts {
    /// Confirmed packet success ratio
    pub fn success_ratio(&self) -> f64 {
        ratio(self.succeeded, self.attempted)
    }
}

impl fmt::Display for ConfirmedPacketCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.attempted, self.succeeded)
    }
}

impl PacketTracker {
    /// Outcomes at `gateway` of the uplinks sent in `[start, stop]`.
    ///
    /// An uplink `gateway` never reported on counts only as sent.
    pub fn count_phy_packets_per_gateway(
        &self,
        start: SimTime,
        stop: SimTime,
        gateway: GatewayId,
    ) -> PhyPacketCounts {
        let mut counts = PhyPacketCounts::default();
        for status in self
            .phy_packets
            .values()
            .filter(|s| in_window(s.send_time, start, stop))
        {
            counts.sent += 1;
            if let Some(outcome) = status.outcome(gateway) {
                counts.count(outcome);
            }
        }
        debug!("PHY counts at {} in [{}, {}]: {}", gateway, start, stop, counts);
        counts
    }

    /// Uplinks sent in `[start, stop]` and how many of them any gateway received.
    ///
    /// With `spreading_factor` set, only uplinks sent at that spreading factor count.
    pub fn count_mac_packets_globally(
        &self,
        start: SimTime,
        stop: SimTime,
        spreading_factor: Option<u8>,
    ) -> MacPacketCounts {
        let mut counts = MacPacketCounts::default();
        for status in self.mac_packets.values().filter(|s| {
            in_window(s.send_time, start, stop)
                && spreading_factor.map_or(true, |sf| s.spreading_factor == sf)
        }) {
            counts.sent += 1;
            if status.is_received() {
                counts.received += 1;
            }
        }
        debug!("MAC counts in [{}, {}]: {}", start, stop, counts);
        counts
    }

    /// Confirmed-uplink sequences whose first attempt falls in `[start, stop]`
    /// and how many succeeded
    pub fn count_mac_packets_globally_cpsr(
        &self,
        start: SimTime,
        stop: SimTime,
        spreading_factor: Option<u8>,
    ) -> ConfirmedPacketCounts {
        let mut counts = ConfirmedPacketCounts::default();
        for entry in self.retransmissions.values().filter(|r| {
            in_window(r.first_attempt, start, stop)
                && spreading_factor.map_or(true, |sf| r.spreading_factor == sf)
        }) {
            counts.attempted += 1;
            if entry.successful {
                counts.succeeded += 1;
            }
        }
        debug!("Confirmed counts in [{}, {}]: {}", start, stop, counts);
        counts
    }

    /// Mean delay in seconds between sending and reception, over uplinks sent
    /// strictly inside `(start, stop)` and the `gateway_count` gateways
    /// starting at `first_gateway`.
    ///
    /// Each (packet, gateway) pair with a reception counts once. Pairs without
    /// a reception, or with a reception recorded before the send time, are
    /// skipped. Returns 0.0 when nothing qualifies.
    pub fn count_mac_packets_globally_delay(
        &self,
        start: SimTime,
        stop: SimTime,
        first_gateway: GatewayId,
        gateway_count: u32,
        spreading_factor: Option<u8>,
    ) -> f64 {
        let mut delay_sum_ns: u128 = 0;
        let mut pairs: u64 = 0;

        let gateways = first_gateway..GatewayId(first_gateway.0.saturating_add(gateway_count));
        for status in self.mac_packets.values().filter(|s| {
            start < s.send_time
                && s.send_time < stop
                && spreading_factor.map_or(true, |sf| s.spreading_factor == sf)
        }) {
            for (gateway, received) in status.reception_times.range(gateways.clone()) {
                match received.checked_duration_since(status.send_time) {
                    Some(delay) => {
                        delay_sum_ns += delay.as_nanos();
                        pairs += 1;
                    }
                    None => debug!(
                        "Packet {} received at {} before it was sent, ignoring it",
                        status.id, gateway
                    ),
                }
            }
        }

        if pairs == 0 {
            0.0
        } else {
            delay_sum_ns as f64 / pairs as f64 / 1e9
        }
    }

    /// Number of finished confirmed-uplink sequences in `[start, stop]` per
    /// attempt count
    pub fn retransmission_histogram(
        &self,
        start: SimTime,
        stop: SimTime,
        spreading_factor: Option<u8>,
    ) -> BTreeMap<u8, usize> {
        let mut histogram = BTreeMap::new();
        for entry in self.retransmissions.values().filter(|r| {
            in_window(r.first_attempt, start, stop)
                && spreading_factor.map_or(true, |sf| r.spreading_factor == sf)
        }) {
            *histogram.entry(entry.attempts).or_insert(0) += 1;
        }
        histogram
    }

    /// Mean number of transmissions per finished confirmed-uplink sequence in
    /// `[start, stop]`, or 0.0 if there is none
    pub fn mean_attempts(&self, start: SimTime, stop: SimTime, spreading_factor: Option<u8>) -> f64 {
        let (sequences, attempts) = self
            .retransmission_histogram(start, stop, spreading_factor)
            .into_iter()
            .fold((0usize, 0usize), |(n, total), (attempts, count)| {
                (n + count, total + usize::from(attempts) * count)
            });
        ratio(attempts, sequences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{NodeId, Packet, PacketId};
    use alloc::vec;

    fn uplink(id: u64) -> Packet {
        Packet::new(PacketId::new(id), vec![0x80, 0x00])
    }

    #[test]
    fn test_empty_window() {
        let tracker = PacketTracker::new();
        let stop = SimTime::from_millis(10_000);
        let counts = tracker.count_mac_packets_globally(SimTime::ZERO, stop, None);
        assert_eq!(counts, MacPacketCounts::default());
        assert_eq!(counts.delivery_ratio(), 0.0);
        assert_eq!(counts.loss_ratio(), 0.0);
        assert_eq!(
            tracker
                .count_mac_packets_globally_cpsr(SimTime::ZERO, stop, None)
                .success_ratio(),
            0.0
        );
        assert_eq!(
            tracker.count_mac_packets_globally_delay(SimTime::ZERO, stop, GatewayId(0), 4, None),
            0.0
        );
        assert_eq!(tracker.mean_attempts(SimTime::ZERO, stop, None), 0.0);
    }

    #[test]
    fn test_phy_counts_display() {
        let counts = PhyPacketCounts {
            sent: 4,
            received: 1,
            interfered: 1,
            no_more_receivers: 0,
            under_sensitivity: 1,
            lost_because_tx: 0,
        };
        assert_eq!(counts.as_array(), [4, 1, 1, 0, 1, 0]);
        assert_eq!(alloc::format!("{}", counts), "4 1 1 0 1 0");
    }

    #[test]
    fn test_ratios() {
        let counts = MacPacketCounts { sent: 4, received: 3 };
        assert_eq!(counts.delivery_ratio(), 0.75);
        assert_eq!(counts.loss_ratio(), 0.25);
    }

    #[test]
    fn test_histogram_and_mean() {
        let mut tracker = PacketTracker::new();
        let finished = SimTime::from_millis(20_000);
        for (id, attempts, success) in [(0, 1, true), (1, 1, true), (2, 4, false), (3, 2, true)] {
            tracker
                .on_retransmission_sequence_finished(
                    finished,
                    attempts,
                    7,
                    success,
                    SimTime::from_millis(1_000 * id),
                    &uplink(id),
                )
                .unwrap();
        }
        let stop = SimTime::from_millis(10_000);
        let histogram = tracker.retransmission_histogram(SimTime::ZERO, stop, Some(7));
        assert_eq!(histogram.get(&1), Some(&2));
        assert_eq!(histogram.get(&4), Some(&1));
        assert_eq!(tracker.mean_attempts(SimTime::ZERO, stop, None), 2.0);
        assert!(tracker.retransmission_histogram(SimTime::ZERO, stop, Some(9)).is_empty());

        let cpsr = tracker.count_mac_packets_globally_cpsr(SimTime::ZERO, stop, None);
        assert_eq!(
            cpsr,
            ConfirmedPacketCounts {
                attempted: 4,
                succeeded: 3
            }
        );
    }

    #[test]
    fn test_delay_spans_gateway_range() {
        let mut tracker = PacketTracker::new();
        let packet = uplink(0);
        let sent = SimTime::from_millis(1_000);
        tracker.on_mac_transmission(sent, &packet, NodeId(0), 7).unwrap();
        tracker
            .on_mac_gateway_reception(SimTime::from_millis(1_100), &packet, GatewayId(0))
            .unwrap();
        tracker
            .on_mac_gateway_reception(SimTime::from_millis(1_300), &packet, GatewayId(1))
            .unwrap();

        let stop = SimTime::from_millis(5_000);
        let only_first = tracker.count_mac_packets_globally_delay(SimTime::ZERO, stop, GatewayId(0), 1, None);
        assert!((only_first - 0.1).abs() < 1e-9);
        let both = tracker.count_mac_packets_globally_delay(SimTime::ZERO, stop, GatewayId(0), 2, None);
        assert!((both - 0.2).abs() < 1e-9);
        let second = tracker.count_mac_packets_globally_delay(SimTime::ZERO, stop, GatewayId(1), 1, None);
        assert!((second - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_delay_window_is_open_and_skips_early_receptions() {
        let mut tracker = PacketTracker::new();
        let gateway = GatewayId(0);
        // (sent, received) in milliseconds
        for (id, sent, received) in [(0, 2_000, 1_500), (1, 1_000, 1_700), (2, 3_000, 3_200)] {
            let packet = uplink(id);
            tracker
                .on_mac_transmission(SimTime::from_millis(sent), &packet, NodeId(0), 7)
                .unwrap();
            tracker
                .on_mac_gateway_reception(SimTime::from_millis(received), &packet, gateway)
                .unwrap();
        }

        let delay = |start: u64, stop: u64| {
            tracker.count_mac_packets_globally_delay(
                SimTime::from_millis(start),
                SimTime::from_millis(stop),
                gateway,
                1,
                None,
            )
        };
        // Packet 1 sits on the start bound and packet 0 arrives before it left
        assert!((delay(1_000, 5_000) - 0.2).abs() < 1e-9);
        assert!((delay(999, 5_000) - 0.45).abs() < 1e-9);
        // Packet 2 sits on the stop bound
        assert_eq!(delay(1_000, 3_000), 0.0);
    }

    #[test]
    fn test_delay_over_every_gateway_id() {
        let mut tracker = PacketTracker::new();
        let packet = uplink(0);
        tracker
            .on_mac_transmission(SimTime::from_millis(1_000), &packet, NodeId(0), 7)
            .unwrap();
        tracker
            .on_mac_gateway_reception(SimTime::from_millis(1_400), &packet, GatewayId(u32::MAX - 1))
            .unwrap();

        let stop = SimTime::from_millis(5_000);
        let delay = tracker.count_mac_packets_globally_delay(SimTime::ZERO, stop, GatewayId(0), u32::MAX, None);
        assert!((delay - 0.4).abs() < 1e-9);
    }
}
