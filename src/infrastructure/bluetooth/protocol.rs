//! SiG Spectrometer Protocol
//!
//! Characteristic definitions, byte-packing helpers and spectrum packet
//! framing for the spectrometer's GATT service.

use crate::infrastructure::bluetooth::crc;
use crate::infrastructure::bluetooth::parse_data;
use std::fmt;
use tracing::trace;

/// Primary GATT service UUID
pub const SERVICE_UUID: &str = "d1a7ff00-af78-4449-a34f-4da1afaf51bc";

/// Number of 16-byte subpages per EEPROM page
pub const EEPROM_SUBPAGES: usize = 4;

/// Bytes returned per EEPROM subpage read
pub const EEPROM_SUBPAGE_SIZE: usize = 16;

/// Size of the `firstPixel` header on every spectrum packet
pub const SPECTRUM_HEADER_SIZE: usize = 2;

/// Highest legal `firstPixel` value; anything beyond is a NACK from the firmware
pub const MAX_PIXEL_OFFSET: i16 = 2048;

/// GATT characteristics used by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    IntegrationTime,
    Gain,
    LaserState,
    AcquireSpectrum,
    SpectrumRequest,
    ReadSpectrum,
    EepromCmd,
    EepromData,
    BatteryStatus,
    Roi,
}

impl Characteristic {
    pub const ALL: [Characteristic; 10] = [
        Self::IntegrationTime,
        Self::Gain,
        Self::LaserState,
        Self::AcquireSpectrum,
        Self::SpectrumRequest,
        Self::ReadSpectrum,
        Self::EepromCmd,
        Self::EepromData,
        Self::BatteryStatus,
        Self::Roi,
    ];

    /// Firmware characteristic UUID
    pub fn uuid(&self) -> &'static str {
        match self {
            Self::IntegrationTime => "d1a7ff01-af78-4449-a34f-4da1afaf51bc",
            Self::Gain => "d1a7ff02-af78-4449-a34f-4da1afaf51bc",
            Self::LaserState => "d1a7ff03-af78-4449-a34f-4da1afaf51bc",
            Self::AcquireSpectrum => "d1a7ff04-af78-4449-a34f-4da1afaf51bc",
            Self::SpectrumRequest => "d1a7ff05-af78-4449-a34f-4da1afaf51bc",
            Self::ReadSpectrum => "d1a7ff06-af78-4449-a34f-4da1afaf51bc",
            Self::EepromCmd => "d1a7ff07-af78-4449-a34f-4da1afaf51bc",
            Self::EepromData => "d1a7ff08-af78-4449-a34f-4da1afaf51bc",
            Self::BatteryStatus => "d1a7ff09-af78-4449-a34f-4da1afaf51bc",
            Self::Roi => "d1a7ff0a-af78-4449-a34f-4da1afaf51bc",
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::IntegrationTime => "integrationTimeMS",
            Self::Gain => "gainDb",
            Self::LaserState => "laserState",
            Self::AcquireSpectrum => "acquireSpectrum",
            Self::SpectrumRequest => "spectrumRequest",
            Self::ReadSpectrum => "readSpectrum",
            Self::EepromCmd => "eepromCmd",
            Self::EepromData => "eepromData",
            Self::BatteryStatus => "batteryStatus",
            Self::Roi => "roi",
        }
    }

    /// Look up a characteristic by UUID (case-insensitive)
    pub fn from_uuid(uuid: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.uuid().eq_ignore_ascii_case(uuid))
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte packing for characteristic writes
pub mod to_ble_data {
    /// A boolean is a single `0`/`1` byte
    pub fn from_bool(value: bool) -> Vec<u8> {
        vec![u8::from(value)]
    }

    /// Two raw bytes sent as a big-endian word
    pub fn from_bytes(msb: u8, lsb: u8) -> Vec<u8> {
        vec![msb, lsb]
    }

    /// The least-significant `len` bytes of `value`, most-significant first.
    ///
    /// `uint_be(0xAABBCCDD, 2)` yields `[0xCC, 0xDD]`.
    pub fn uint_be(value: u64, len: usize) -> Vec<u8> {
        let bytes = value.to_be_bytes();
        let len = len.min(bytes.len());
        bytes[bytes.len() - len..].to_vec()
    }
}

/// Why a spectrum packet was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketRejection {
    /// Odd length or shorter than the header
    Malformed(usize),
    /// `firstPixel` outside `[0, 2048]`
    Nack(i16),
    /// Same checksum as the previously accepted packet
    Duplicate(u16),
}

impl fmt::Display for PacketRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(len) => write!(f, "malformed packet ({} bytes)", len),
            Self::Nack(first) => write!(f, "NACK (firstPixel {})", first),
            Self::Duplicate(crc) => write!(f, "duplicate packet (crc {:#06x})", crc),
        }
    }
}

/// A validated spectrum packet
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumPacket {
    pub first_pixel: u16,
    pub intensities: Vec<u16>,
    pub crc: u16,
}

/// Parse and validate one spectrum read-back response.
///
/// # Packet Structure
///
/// ```text
/// [0-1]   : firstPixel (u16 big-endian)
/// [2-...] : intensities (u16 little-endian each)
/// ```
///
/// `last_crc` is the checksum of the previously accepted packet of this scan.
pub fn parse_spectrum_packet(
    response: &[u8],
    last_crc: Option<u16>,
) -> Result<SpectrumPacket, PacketRejection> {
    let len = response.len();
    if len < SPECTRUM_HEADER_SIZE || len % 2 != 0 {
        return Err(PacketRejection::Malformed(len));
    }

    trace!("Raw packet: {:02X?}", response);

    let first = parse_data::to_i16_be(response, 0).ok_or(PacketRejection::Malformed(len))?;
    if !(0..=MAX_PIXEL_OFFSET).contains(&first) {
        return Err(PacketRejection::Nack(first));
    }

    let crc = crc::checksum(response);
    if last_crc == Some(crc) {
        return Err(PacketRejection::Duplicate(crc));
    }

    let intensities = response[SPECTRUM_HEADER_SIZE..]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Ok(SpectrumPacket {
        first_pixel: first as u16,
        intensities,
        crc,
    })
}

/// Build a spectrum packet as the firmware frames it
pub fn encode_spectrum_packet(first_pixel: u16, intensities: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(SPECTRUM_HEADER_SIZE + intensities.len() * 2);
    out.extend_from_slice(&first_pixel.to_be_bytes());
    for value in intensities {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}
