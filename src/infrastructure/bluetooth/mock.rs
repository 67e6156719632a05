//! Simulated Spectrometer
//!
//! An in-memory [`Transport`] that behaves like the SiG firmware: it serves
//! EEPROM subpages, frames spectra into packets and accepts parameter
//! writes. Faults can be scripted per spectrum read to exercise the retry
//! path.

use crate::domain::eeprom::{EepromImage, PAGE_COUNT, PAGE_SIZE};
use crate::domain::laser::LaserState;
use crate::infrastructure::bluetooth::parse_data;
use crate::infrastructure::bluetooth::protocol::{
    self, Characteristic, EEPROM_SUBPAGES, EEPROM_SUBPAGE_SIZE,
};
use crate::infrastructure::bluetooth::transport::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::trace;

/// Default pixels per spectrum packet (fits a 185-byte ATT MTU)
pub const DEFAULT_PIXELS_PER_PACKET: usize = 90;

/// Misbehaviour injected into a single spectrum read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFault {
    /// Re-send the previous response unchanged
    Duplicate,
    /// Odd-length response
    Malformed,
    /// `firstPixel` of 0xFFFF
    Nack,
    /// Read fails at the link level
    LinkLoss,
}

pub struct SimulatedSpectrometer {
    eeprom: [[u8; PAGE_SIZE]; PAGE_COUNT],
    eeprom_cursor: Option<(usize, usize)>,
    pixel_count: usize,
    pixels_per_packet: usize,
    spectra: VecDeque<Vec<u16>>,
    current: Vec<u16>,
    request_offset: usize,
    last_response: Vec<u8>,
    faults: VecDeque<Option<ReadFault>>,
    persistent_fault: Option<ReadFault>,
    battery: Option<Vec<u8>>,
    refused: HashSet<Characteristic>,
    writes: Vec<(Characteristic, Vec<u8>)>,
    reads: HashMap<Characteristic, usize>,
}

impl SimulatedSpectrometer {
    pub fn new(image: &EepromImage) -> Self {
        let eeprom = *image.pages();
        let pixel_count = match parse_data::to_u16(&eeprom[2], 16) {
            Some(0) | None => 1952,
            Some(n) => n as usize,
        };
        Self {
            eeprom,
            eeprom_cursor: None,
            pixel_count,
            pixels_per_packet: DEFAULT_PIXELS_PER_PACKET,
            spectra: VecDeque::new(),
            current: Vec::new(),
            request_offset: 0,
            last_response: Vec::new(),
            faults: VecDeque::new(),
            persistent_fault: None,
            battery: Some(vec![80, 0]),
            refused: HashSet::new(),
            writes: Vec::new(),
            reads: HashMap::new(),
        }
    }

    pub fn with_packet_size(mut self, pixels: usize) -> Self {
        self.pixels_per_packet = pixels.max(1);
        self
    }

    pub fn with_battery(mut self, payload: Option<Vec<u8>>) -> Self {
        self.battery = payload;
        self
    }

    /// Spectrum served for the next acquire trigger
    pub fn queue_spectrum(&mut self, pixels: Vec<u16>) {
        self.spectra.push_back(pixels);
    }

    /// Faults for the next spectrum reads, in order; `None` reads normally
    pub fn inject_faults<I: IntoIterator<Item = Option<ReadFault>>>(&mut self, faults: I) {
        self.faults.extend(faults);
    }

    /// Fail every spectrum read with the same fault
    pub fn fail_all_reads(&mut self, fault: ReadFault) {
        self.persistent_fault = Some(fault);
    }

    /// Make writes to `characteristic` report failure
    pub fn refuse_writes(&mut self, characteristic: Characteristic) {
        self.refused.insert(characteristic);
    }

    pub fn writes_to(&self, characteristic: Characteristic) -> Vec<Vec<u8>> {
        self.writes
            .iter()
            .filter(|(c, _)| *c == characteristic)
            .map(|(_, data)| data.clone())
            .collect()
    }

    pub fn read_count(&self, characteristic: Characteristic) -> usize {
        self.reads.get(&characteristic).copied().unwrap_or(0)
    }

    pub fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    /// Gaussian peaks on a flat baseline, for demos
    pub fn synthetic_spectrum(pixel_count: usize) -> Vec<u16> {
        let n = pixel_count as f64;
        let peak = |p: f64, center: f64, width: f64, height: f64| {
            height * (-(p - center).powi(2) / (2.0 * width * width)).exp()
        };
        (0..pixel_count)
            .map(|p| {
                let p = p as f64;
                let value = 1000.0 + peak(p, n / 3.0, 15.0, 20_000.0) + peak(p, 2.0 * n / 3.0, 25.0, 8_000.0);
                value.min(u16::MAX as f64) as u16
            })
            .collect()
    }

    fn next_packet(&mut self) -> Vec<u8> {
        if self.request_offset >= self.current.len() {
            return vec![0xFF, 0xFF];
        }
        let end = (self.request_offset + self.pixels_per_packet).min(self.current.len());
        protocol::encode_spectrum_packet(
            self.request_offset as u16,
            &self.current[self.request_offset..end],
        )
    }

    fn read_spectrum(&mut self) -> Result<Vec<u8>, TransportError> {
        let fault = self.faults.pop_front().flatten().or(self.persistent_fault);
        let response = match fault {
            Some(ReadFault::LinkLoss) => return Err(TransportError::Disconnected),
            Some(ReadFault::Malformed) => vec![0x00, 0x00, 0x01],
            Some(ReadFault::Nack) => vec![0xFF, 0xFF],
            Some(ReadFault::Duplicate) if !self.last_response.is_empty() => {
                self.last_response.clone()
            }
            _ => self.next_packet(),
        };
        self.last_response = response.clone();
        Ok(response)
    }

    fn read_eeprom(&mut self) -> Result<Vec<u8>, TransportError> {
        let (page, subpage) = self
            .eeprom_cursor
            .ok_or(TransportError::NoData(Characteristic::EepromData))?;
        let start = subpage * EEPROM_SUBPAGE_SIZE;
        Ok(self.eeprom[page][start..start + EEPROM_SUBPAGE_SIZE].to_vec())
    }
}

#[async_trait]
impl Transport for SimulatedSpectrometer {
    async fn write_characteristic(&mut self, characteristic: Characteristic, data: &[u8]) -> bool {
        trace!("sim write {} {:02X?}", characteristic, data);
        self.writes.push((characteristic, data.to_vec()));
        if self.refused.contains(&characteristic) {
            return false;
        }

        match characteristic {
            Characteristic::EepromCmd => match data {
                [page, subpage]
                    if (*page as usize) < PAGE_COUNT && (*subpage as usize) < EEPROM_SUBPAGES =>
                {
                    self.eeprom_cursor = Some((*page as usize, *subpage as usize));
                    true
                }
                _ => false,
            },
            Characteristic::AcquireSpectrum => {
                self.current = self
                    .spectra
                    .pop_front()
                    .unwrap_or_else(|| Self::synthetic_spectrum(self.pixel_count));
                self.request_offset = 0;
                true
            }
            Characteristic::SpectrumRequest => match parse_data::to_u16_be(data, 0) {
                Some(offset) if data.len() == 2 => {
                    self.request_offset = offset as usize;
                    true
                }
                _ => false,
            },
            Characteristic::LaserState => LaserState::parse(data).is_ok(),
            Characteristic::IntegrationTime | Characteristic::Gain => data.len() == 2,
            _ => true,
        }
    }

    async fn read_characteristic(
        &mut self,
        characteristic: Characteristic,
    ) -> Result<Vec<u8>, TransportError> {
        *self.reads.entry(characteristic).or_insert(0) += 1;
        match characteristic {
            Characteristic::ReadSpectrum => self.read_spectrum(),
            Characteristic::EepromData => self.read_eeprom(),
            Characteristic::BatteryStatus => self
                .battery
                .clone()
                .ok_or(TransportError::NoData(characteristic)),
            Characteristic::LaserState => self
                .writes_to(Characteristic::LaserState)
                .pop()
                .ok_or(TransportError::NoData(characteristic)),
            other => Err(TransportError::ReadFailed(
                other,
                "characteristic is write-only".to_string(),
            )),
        }
    }
}
