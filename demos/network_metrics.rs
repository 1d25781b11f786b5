//! Network metrics example
//!
//! Runs a small EU868 network for one simulated hour:
//! - four devices, each with its own duty-cycle limited channel manager
//! - two gateways with a fixed, seeded chance of losing each uplink
//! - one device sending confirmed uplinks without retries
//!
//! Every PHY and MAC event is reported to a shared packet tracker, and the
//! usual network metrics are printed at the end. Run with
//! `RUST_LOG=debug` for per-event output.

use std::collections::BTreeMap;
use std::time::Duration;

use env_logger::Builder;
use log::{info, LevelFilter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use lorawan_sim::{
    config::DeviceConfig,
    lorawan::{ChannelManager, Eu868, LogicalChannel, Region},
    packet::{GatewayId, NodeId, Packet},
    time::SimTime,
    tracker::{PacketTracker, PhyOutcome},
    PacketIdGenerator,
};

const GATEWAYS: u32 = 2;
const RUN_TIME: Duration = Duration::from_secs(3_600);
const REPORT_PERIOD: Duration = Duration::from_secs(30);

/// Time on air of a 20-byte payload at 125 kHz
fn airtime(spreading_factor: u8) -> Duration {
    Duration::from_millis(match spreading_factor {
        7 => 72,
        8 => 134,
        9 => 247,
        10 => 452,
        11 => 987,
        _ => 1_810,
    })
}

/// Seeded per-gateway reception, so every run loses the same uplinks
struct Lossy(StdRng);

impl Lossy {
    fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    fn outcome(&mut self) -> PhyOutcome {
        match self.0.gen_range(0..10) {
            0..=5 => PhyOutcome::Received,
            6 => PhyOutcome::Interfered,
            7 | 8 => PhyOutcome::UnderSensitivity,
            _ => PhyOutcome::NoMoreReceivers,
        }
    }
}

struct Device {
    id: NodeId,
    spreading_factor: u8,
    confirmed: bool,
    channels: ChannelManager,
    next_channel: usize,
}

impl Device {
    /// Next channel, round robin, that both duty-cycle budgets allow right now
    fn pick_channel(&mut self, now: SimTime) -> Result<LogicalChannel, Duration> {
        let enabled: Vec<LogicalChannel> = self.channels.enabled_channels().cloned().collect();
        let mut shortest = Duration::MAX;
        for offset in 0..enabled.len() {
            let channel = &enabled[(self.next_channel + offset) % enabled.len()];
            let wait = self
                .channels
                .transmission_delay(now, channel)
                .unwrap_or(Duration::MAX);
            if wait.is_zero() {
                self.next_channel = (self.next_channel + offset + 1) % enabled.len();
                return Ok(channel.clone());
            }
            shortest = shortest.min(wait);
        }
        Err(shortest)
    }
}

enum Event {
    Send(usize),
    Arrive {
        packet: Packet,
        gateway: GatewayId,
        outcome: PhyOutcome,
    },
    Finish {
        packet: Packet,
        spreading_factor: u8,
        first_attempt: SimTime,
    },
}

fn main() {
    Builder::new().filter_level(LevelFilter::Info).parse_default_env().init();

    let region = Eu868::new();
    let config = DeviceConfig::default();
    let mut devices: Vec<Device> = [7u8, 9, 10, 12]
        .iter()
        .enumerate()
        .map(|(i, &spreading_factor)| Device {
            id: NodeId(i as u32),
            spreading_factor,
            confirmed: i == 3,
            channels: ChannelManager::from_region(&region, &config)
                .expect("EU868 plan is valid"),
            next_channel: 0,
        })
        .collect();

    let mut tracker = PacketTracker::new();
    let mut ids = PacketIdGenerator::new();
    let mut radio = Lossy::new(0x2545_F491_4F6C_DD1D);

    let mut queue: BTreeMap<(SimTime, u64), Event> = BTreeMap::new();
    let mut sequence = 0u64;
    let mut schedule = |queue: &mut BTreeMap<(SimTime, u64), Event>, at: SimTime, event: Event| {
        queue.insert((at, sequence), event);
        sequence += 1;
    };
    for (i, _) in devices.iter().enumerate() {
        schedule(&mut queue, SimTime::from_millis(i as u64 * 1_000), Event::Send(i));
    }

    let end = SimTime::ZERO + RUN_TIME;
    while let Some(((now, _), event)) = queue.pop_first() {
        if now > end {
            break;
        }
        match event {
            Event::Send(index) => {
                let device = &mut devices[index];
                let channel = match device.pick_channel(now) {
                    Ok(channel) => channel,
                    Err(wait) => {
                        schedule(&mut queue, now + wait, Event::Send(index));
                        continue;
                    }
                };

                let on_air = airtime(device.spreading_factor);
                let header = if device.confirmed { 0x80 } else { 0x40 };
                let packet = Packet::new(ids.next_id(), vec![header, 0x26, 0x01, 0x1F, 0x0B]);
                tracker
                    .on_phy_transmission(now, &packet, device.id)
                    .expect("fresh packet");
                tracker
                    .on_mac_transmission(now, &packet, device.id, device.spreading_factor)
                    .expect("fresh packet");

                let done = now + on_air;
                device
                    .channels
                    .add_event(done, on_air, &channel)
                    .expect("channel comes from the plan");
                for gateway in (0..GATEWAYS).map(GatewayId) {
                    let outcome = radio.outcome();
                    let arrival = Event::Arrive {
                        packet: packet.clone(),
                        gateway,
                        outcome,
                    };
                    schedule(&mut queue, done, arrival);
                }
                if device.confirmed {
                    let finish = Event::Finish {
                        packet,
                        spreading_factor: device.spreading_factor,
                        first_attempt: now,
                    };
                    schedule(&mut queue, done + Duration::from_secs(2), finish);
                }
                schedule(&mut queue, now + REPORT_PERIOD, Event::Send(index));
            }
            Event::Arrive {
                packet,
                gateway,
                outcome,
            } => {
                let recorded = match outcome {
                    PhyOutcome::Received => tracker
                        .on_phy_received(&packet, gateway)
                        .and_then(|_| tracker.on_mac_gateway_reception(now, &packet, gateway)),
                    PhyOutcome::Interfered => tracker.on_phy_interfered(&packet, gateway),
                    PhyOutcome::NoMoreReceivers => tracker.on_phy_no_more_receivers(&packet, gateway),
                    PhyOutcome::UnderSensitivity => tracker.on_phy_under_sensitivity(&packet, gateway),
                    PhyOutcome::LostBecauseTx => tracker.on_phy_lost_because_tx(&packet, gateway),
                };
                recorded.expect("packet was transmitted first");
            }
            Event::Finish {
                packet,
                spreading_factor,
                first_attempt,
            } => {
                let success = tracker
                    .mac_packet(packet.id)
                    .map_or(false, |status| status.is_received());
                tracker
                    .on_retransmission_sequence_finished(
                        now,
                        1,
                        spreading_factor,
                        success,
                        first_attempt,
                        &packet,
                    )
                    .expect("one sequence per packet");
            }
        }
    }

    // Skip the first minute while devices spread out
    let start = SimTime::from_millis(60_000);
    for gateway in (0..GATEWAYS).map(GatewayId) {
        let counts = tracker.count_phy_packets_per_gateway(start, end, gateway);
        info!("{} PHY counts: {}", gateway, counts);
    }
    for sf in [7u8, 9, 10, 12] {
        let counts = tracker.count_mac_packets_globally(start, end, Some(sf));
        let data_rate = (0..6)
            .find(|&dr| region.data_rate(dr).map(|r| r.spreading_factor) == Some(sf))
            .unwrap_or(0);
        info!(
            "SF{} (DR{}): {} sent, {} received, delivery ratio {:.3}",
            sf,
            data_rate,
            counts.sent,
            counts.received,
            counts.delivery_ratio()
        );
    }
    let delay = tracker.count_mac_packets_globally_delay(start, end, GatewayId(0), GATEWAYS, None);
    info!("Mean delay across gateways: {:.3} s", delay);
    let confirmed = tracker.count_mac_packets_globally_cpsr(start, end, None);
    info!(
        "Confirmed uplinks: {} attempted, {} succeeded, CPSR {:.3}",
        confirmed.attempted,
        confirmed.succeeded,
        confirmed.success_ratio()
    );
}
