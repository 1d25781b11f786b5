#![allow(dead_code)]

use core::time::Duration;

use lorawan_sim::{
    lorawan::{mac::MacHeader, MType},
    packet::{Packet, PacketIdGenerator},
    time::SimTime,
};

/// Stands in for the scheduler and MAC layers that drive the crate in a real run
pub struct MockNetwork {
    now: SimTime,
    ids: PacketIdGenerator,
}

impl MockNetwork {
    /// Create a network whose clock starts at zero
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            ids: PacketIdGenerator::new(),
        }
    }

    /// Current simulated instant
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Move the clock to `secs` seconds; the clock never runs backwards
    pub fn advance_to(&mut self, secs: f64) -> SimTime {
        let target = SimTime::from_secs_f64(secs);
        assert!(target >= self.now, "clock moved backwards");
        self.now = target;
        self.now
    }

    /// Move the clock forward by `duration`
    pub fn advance(&mut self, duration: Duration) -> SimTime {
        self.now = self.now + duration;
        self.now
    }

    /// Build a frame of the given type with a fresh id
    pub fn frame(&mut self, mtype: MType) -> Packet {
        let mut bytes = vec![MacHeader::new(mtype).to_byte()];
        bytes.extend_from_slice(&[0x01, 0x02, 0x03, 0x04, 0x00, 0x00, 0x00]);
        Packet::new(self.ids.next_id(), bytes)
    }

    /// Unconfirmed uplink with a fresh id
    pub fn uplink(&mut self) -> Packet {
        self.frame(MType::UnconfirmedDataUp)
    }

    /// Confirmed uplink with a fresh id
    pub fn confirmed_uplink(&mut self) -> Packet {
        self.frame(MType::ConfirmedDataUp)
    }

    /// Unconfirmed downlink with a fresh id
    pub fn downlink(&mut self) -> Packet {
        self.frame(MType::UnconfirmedDataDown)
    }
}
