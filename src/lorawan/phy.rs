//! PHY layer packet metadata and power units
//!
//! The radio model attaches a [`PhyTag`] to every packet copy it hands around,
//! recording how the transmission was configured and how it fared at the
//! receiver.

use super::commands::{DecodeError, EncodeError};

/// Metadata the radio model carries alongside a packet
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhyTag {
    /// Spreading factor used for the transmission
    pub spreading_factor: u8,
    /// Spreading factor of the interferer that destroyed the packet, 0 if intact
    pub destroyed_by: u8,
    /// Power at the receiver in dBm
    pub receive_power_dbm: f64,
    /// Data-rate index of the transmission
    pub data_rate: u8,
    /// Carrier frequency in MHz
    pub frequency_mhz: f64,
    /// Sending node
    pub node_id: u16,
    /// Transmission attempts so far
    pub transmissions: u8,
}

impl PhyTag {
    /// Serialized size in bytes
    pub const SIZE: usize = 22;

    /// Create a tag for a fresh transmission
    pub fn new(spreading_factor: u8, data_rate: u8, frequency_mhz: f64, node_id: u16) -> Self {
        Self {
            spreading_factor,
            data_rate,
            frequency_mhz,
            node_id,
            transmissions: 1,
            ..Self::default()
        }
    }

    /// Whether an interferer destroyed the packet
    pub fn is_destroyed(&self) -> bool {
        self.destroyed_by != 0
    }

    /// Write the tag into `buffer` in little-endian order
    pub fn serialize(&self, buffer: &mut [u8]) -> Result<usize, EncodeError> {
        if buffer.len() < Self::SIZE {
            return Err(EncodeError::BufferTooSmall {
                needed: Self::SIZE,
                available: buffer.len(),
            });
        }
        buffer[0] = self.spreading_factor;
        buffer[1] = self.destroyed_by;
        buffer[2..10].copy_from_slice(&self.receive_power_dbm.to_le_bytes());
        buffer[10] = self.data_rate;
        buffer[11..19].copy_from_slice(&self.frequency_mhz.to_le_bytes());
        buffer[19..21].copy_from_slice(&self.node_id.to_le_bytes());
        buffer[21] = self.transmissions;
        Ok(Self::SIZE)
    }

    /// Read a tag from the start of `buffer`
    pub fn deserialize(buffer: &[u8]) -> Result<Self, DecodeError> {
        let bytes: &[u8; Self::SIZE] = buffer
            .get(..Self::SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(DecodeError::BufferTooShort {
                what: "PhyTag",
                needed: Self::SIZE,
                available: buffer.len(),
            })?;

        let f64_at = |at: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[at..at + 8]);
            f64::from_le_bytes(raw)
        };

        Ok(Self {
            spreading_factor: bytes[0],
            destroyed_by: bytes[1],
            receive_power_dbm: f64_at(2),
            data_rate: bytes[10],
            frequency_mhz: f64_at(11),
            node_id: u16::from_le_bytes([bytes[19], bytes[20]]),
            transmissions: bytes[21],
        })
    }
}

/// Convert a gain in dB to a linear ratio
#[cfg(feature = "std")]
pub fn db_to_ratio(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

/// Convert a linear ratio to dB
#[cfg(feature = "std")]
pub fn ratio_to_db(ratio: f64) -> f64 {
    10.0 * ratio.log10()
}

/// Convert a power in dBm to Watts
#[cfg(feature = "std")]
pub fn dbm_to_watts(dbm: f64) -> f64 {
    10f64.powf(dbm / 10.0) / 1000.0
}

/// Convert a power in Watts to dBm
#[cfg(feature = "std")]
pub fn watts_to_dbm(watts: f64) -> f64 {
    10.0 * (watts * 1000.0).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_layout() {
        let tag = PhyTag {
            spreading_factor: 9,
            destroyed_by: 7,
            receive_power_dbm: -120.5,
            data_rate: 3,
            frequency_mhz: 868.1,
            node_id: 0x1234,
            transmissions: 2,
        };
        let mut buffer = [0u8; 24];
        assert_eq!(tag.serialize(&mut buffer), Ok(PhyTag::SIZE));
        assert_eq!(buffer[0], 9);
        assert_eq!(buffer[10], 3);
        assert_eq!(&buffer[19..22], &[0x34, 0x12, 2]);
        assert_eq!(PhyTag::deserialize(&buffer), Ok(tag));
        assert!(tag.is_destroyed());
    }

    #[test]
    fn test_tag_short_buffers() {
        let tag = PhyTag::new(7, 5, 868.3, 1);
        assert!(!tag.is_destroyed());
        let mut small = [0u8; 21];
        assert_eq!(
            tag.serialize(&mut small),
            Err(EncodeError::BufferTooSmall {
                needed: 22,
                available: 21
            })
        );
        assert!(matches!(
            PhyTag::deserialize(&small),
            Err(DecodeError::BufferTooShort { needed: 22, .. })
        ));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_power_units() {
        assert!((dbm_to_watts(30.0) - 1.0).abs() < 1e-12);
        assert!((watts_to_dbm(0.025_118_864) - 14.0).abs() < 1e-6);
        assert!((db_to_ratio(3.0) - 1.995_262_3).abs() < 1e-6);
        assert!((ratio_to_db(100.0) - 20.0).abs() < 1e-12);
    }
}
