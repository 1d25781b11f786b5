use core::time::Duration;

use lorawan_sim::{
    config::{DeviceConfig, LedgerPolicy, TrackerConfig},
    lorawan::{ChannelManager, Eu868, LogicalChannel},
    packet::{GatewayId, NodeId},
    time::SimTime,
    tracker::{Ledger, PacketTracker, PhyPacketCounts, TrackerError},
};

mod mock;
use mock::MockNetwork;

fn secs(s: f64) -> SimTime {
    SimTime::from_secs_f64(s)
}

#[test]
fn test_mac_delivery_and_delay() {
    let mut network = MockNetwork::new();
    let mut tracker = PacketTracker::new();
    let gateway = GatewayId(0);

    let send = |network: &mut MockNetwork, tracker: &mut PacketTracker, t: f64| {
        let now = network.advance_to(t);
        let packet = network.uplink();
        tracker.on_mac_transmission(now, &packet, NodeId(1), 7).unwrap();
        packet
    };

    let first = send(&mut network, &mut tracker, 0.0);
    let now = network.advance_to(0.1);
    tracker.on_mac_gateway_reception(now, &first, gateway).unwrap();
    let _lost = send(&mut network, &mut tracker, 1.0);
    let third = send(&mut network, &mut tracker, 2.0);
    let now = network.advance_to(2.1);
    tracker.on_mac_gateway_reception(now, &third, gateway).unwrap();

    let counts = tracker.count_mac_packets_globally(secs(0.0), secs(3.0), Some(7));
    assert_eq!((counts.sent, counts.received), (3, 2));
    assert!((counts.delivery_ratio() - 2.0 / 3.0).abs() < 1e-12);

    let delay = tracker.count_mac_packets_globally_delay(secs(0.0), secs(3.0), gateway, 1, Some(7));
    assert!((delay - 0.1).abs() < 1e-9, "delay {}", delay);

    // Other spreading factors see nothing
    let counts = tracker.count_mac_packets_globally(secs(0.0), secs(3.0), Some(9));
    assert_eq!((counts.sent, counts.received), (0, 0));
}

#[test]
fn test_reads_are_repeatable() {
    let mut network = MockNetwork::new();
    let mut tracker = PacketTracker::new();
    for i in 0..5u32 {
        let now = network.advance(Duration::from_millis(700));
        let packet = network.uplink();
        tracker.on_phy_transmission(now, &packet, NodeId(i)).unwrap();
        tracker.on_mac_transmission(now, &packet, NodeId(i), 8).unwrap();
        if i % 2 == 0 {
            tracker.on_phy_received(&packet, GatewayId(0)).unwrap();
            tracker
                .on_mac_gateway_reception(now + Duration::from_millis(30), &packet, GatewayId(0))
                .unwrap();
        }
    }

    let stop = secs(10.0);
    let first = (
        tracker.count_phy_packets_per_gateway(SimTime::ZERO, stop, GatewayId(0)),
        tracker.count_mac_packets_globally(SimTime::ZERO, stop, None),
        tracker.count_mac_packets_globally_delay(SimTime::ZERO, stop, GatewayId(0), 1, None),
    );
    let second = (
        tracker.count_phy_packets_per_gateway(SimTime::ZERO, stop, GatewayId(0)),
        tracker.count_mac_packets_globally(SimTime::ZERO, stop, None),
        tracker.count_mac_packets_globally_delay(SimTime::ZERO, stop, GatewayId(0), 1, None),
    );
    assert_eq!(first.0, second.0);
    assert_eq!(first.1, second.1);
    assert_eq!(first.2.to_bits(), second.2.to_bits());
    assert_eq!((first.1.sent, first.1.received), (5, 3));
}

#[test]
fn test_phy_outcomes_per_gateway() {
    let mut network = MockNetwork::new();
    let mut tracker = PacketTracker::new();
    let (near, far) = (GatewayId(0), GatewayId(1));

    let mut sent = Vec::new();
    for _ in 0..6 {
        let now = network.advance(Duration::from_secs(1));
        let packet = network.uplink();
        tracker.on_phy_transmission(now, &packet, NodeId(7)).unwrap();
        sent.push(packet);
    }
    tracker.on_phy_received(&sent[0], near).unwrap();
    tracker.on_phy_received(&sent[1], near).unwrap();
    tracker.on_phy_interfered(&sent[2], near).unwrap();
    tracker.on_phy_no_more_receivers(&sent[3], near).unwrap();
    tracker.on_phy_under_sensitivity(&sent[4], near).unwrap();
    // sent[5] is never reported by `near`
    tracker.on_phy_lost_because_tx(&sent[0], far).unwrap();
    tracker.on_phy_under_sensitivity(&sent[1], far).unwrap();

    let counts = tracker.count_phy_packets_per_gateway(SimTime::ZERO, secs(10.0), near);
    assert_eq!(
        counts,
        PhyPacketCounts {
            sent: 6,
            received: 2,
            interfered: 1,
            no_more_receivers: 1,
            under_sensitivity: 1,
            lost_because_tx: 0,
        }
    );
    assert_eq!(counts.to_string(), "6 2 1 1 1 0");

    let far_counts = tracker.count_phy_packets_per_gateway(SimTime::ZERO, secs(10.0), far);
    assert_eq!(far_counts.as_array(), [6, 0, 0, 0, 1, 1]);

    // Closed window: packets sent at exactly 2 s and 4 s both count
    let window = tracker.count_phy_packets_per_gateway(secs(2.0), secs(4.0), near);
    assert_eq!(window.sent, 3);
}

#[test]
fn test_confirmed_success_ratio() {
    let mut network = MockNetwork::new();
    let mut tracker = PacketTracker::new();

    let outcomes = [(1u8, true, 7u8), (3, true, 7), (8, false, 7), (2, true, 9)];
    for (attempts, success, sf) in outcomes {
        let first_attempt = network.advance(Duration::from_secs(5));
        let packet = network.confirmed_uplink();
        let finished = network.advance(Duration::from_secs(u64::from(attempts) * 2));
        tracker
            .on_retransmission_sequence_finished(finished, attempts, sf, success, first_attempt, &packet)
            .unwrap();
    }

    let all = tracker.count_mac_packets_globally_cpsr(SimTime::ZERO, secs(1_000.0), None);
    assert_eq!((all.attempted, all.succeeded), (4, 3));
    assert_eq!(all.success_ratio(), 0.75);

    let sf7 = tracker.count_mac_packets_globally_cpsr(SimTime::ZERO, secs(1_000.0), Some(7));
    assert_eq!((sf7.attempted, sf7.succeeded), (3, 2));
    assert_eq!(tracker.mean_attempts(SimTime::ZERO, secs(1_000.0), Some(7)), 4.0);
    assert_eq!(tracker.ledger_len(Ledger::Retransmission), 4);
}

#[test]
fn test_ledger_errors_leave_entries_intact() {
    let mut network = MockNetwork::new();
    let mut tracker = PacketTracker::new();

    let known = network.uplink();
    let stray = network.uplink();
    let now = network.advance_to(1.0);
    tracker.on_mac_transmission(now, &known, NodeId(2), 10).unwrap();
    tracker.on_mac_gateway_reception(secs(1.2), &known, GatewayId(3)).unwrap();

    assert_eq!(
        tracker.on_mac_gateway_reception(secs(1.3), &stray, GatewayId(3)),
        Err(TrackerError::UnknownPacket {
            id: stray.id,
            ledger: Ledger::Mac
        })
    );
    assert_eq!(
        tracker.on_mac_gateway_reception(secs(1.4), &known, GatewayId(3)),
        Err(TrackerError::AlreadyRecorded {
            id: known.id,
            gateway: GatewayId(3)
        })
    );

    let status = tracker.mac_packet(known.id).unwrap();
    assert_eq!(status.reception_time(GatewayId(3)), Some(secs(1.2)));
    assert!(tracker.mac_packet(stray.id).is_none());
}

#[test]
#[should_panic(expected = "not found in the PHY ledger")]
fn test_abort_policy_covers_phy_callbacks() {
    let mut network = MockNetwork::new();
    let config = TrackerConfig::new().with_ledger_policy(LedgerPolicy::Abort);
    let mut tracker = PacketTracker::with_config(config);
    let packet = network.uplink();
    let _ = tracker.on_phy_interfered(&packet, GatewayId(0));
}

#[test]
fn test_downlinks_are_not_tracked() {
    let mut network = MockNetwork::new();
    let mut tracker = PacketTracker::new();
    let downlink = network.downlink();
    tracker.on_phy_transmission(SimTime::ZERO, &downlink, NodeId(0)).unwrap();
    tracker.on_phy_received(&downlink, GatewayId(0)).unwrap();
    tracker.on_mac_transmission(SimTime::ZERO, &downlink, NodeId(0), 7).unwrap();
    assert_eq!(tracker.ledger_len(Ledger::Phy), 0);
    assert_eq!(tracker.ledger_len(Ledger::Mac), 0);
}

#[test]
fn test_sub_band_isolation() {
    let mut manager = ChannelManager::new();
    manager
        .add_sub_band_range(868_000_000, 868_600_000, 0.01, 14.0)
        .unwrap();
    manager
        .add_sub_band_range(869_400_000, 869_650_000, 1.0, 27.0)
        .unwrap();
    manager.set_aggregated_duty_cycle(0.5).unwrap();
    let slow = LogicalChannel::new(868_100_000);
    let fast = LogicalChannel::new(869_525_000);
    manager.add_channel(slow.clone());
    manager.add_channel(fast.clone());

    let now = secs(30.0);
    manager.add_event(now, Duration::from_secs(1), &slow).unwrap();
    assert_eq!(
        manager.sub_band_for_channel(&slow).unwrap().next_transmission_time(),
        secs(129.0)
    );
    assert_eq!(manager.aggregated_waiting_time(now), Duration::from_secs(1));

    let mut other = manager.clone();
    other.add_event(now, Duration::from_secs(1), &fast).unwrap();
    assert_eq!(
        other.sub_band_for_channel(&fast).unwrap().next_transmission_time(),
        now
    );
    // The aggregate only depends on the device-wide fraction
    assert_eq!(
        other.next_aggregated_transmission_time(),
        manager.next_aggregated_transmission_time()
    );
}

#[test]
fn test_duty_cycle_bound_holds() {
    let mut manager = ChannelManager::from_region(&Eu868::new(), &DeviceConfig::default()).unwrap();
    let channel = manager.channels()[0].clone();
    let duty_cycle = manager.sub_band_for_channel(&channel).unwrap().duty_cycle();

    // A device that transmits as soon as it is allowed to
    let airtimes = [370u64, 1_483, 61, 2_793, 900, 120, 41, 1_100];
    let mut now = SimTime::ZERO;
    let mut on_air = Duration::ZERO;
    for (i, &ms) in airtimes.iter().cycle().take(40).enumerate() {
        now = now + manager.transmission_delay(now, &channel).unwrap();
        let airtime = Duration::from_millis(ms);
        // Registered once the transmission has ended
        now = now + airtime;
        manager.add_event(now, airtime, &channel).unwrap();
        on_air += airtime;

        let elapsed = now.as_secs_f64();
        let waiting = manager.waiting_time(now, &channel).unwrap();
        // Airtime over the whole run, counting the mandatory silence that follows
        let budget = (elapsed + waiting.as_secs_f64()) * duty_cycle;
        assert!(
            on_air.as_secs_f64() <= budget + 1e-6,
            "step {}: {:?} on air exceeds {}",
            i,
            on_air,
            budget
        );
    }
}
