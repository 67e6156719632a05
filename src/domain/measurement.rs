//! Measurement
//!
//! One completed acquisition, aligned against the unit's calibration.
//! Dark subtraction is applied once at construction.

use crate::domain::calibration;
use crate::domain::eeprom::CalibrationRecord;
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, warn};

/// One output row per pixel, in the shape exporters consume
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRow {
    pub pixel: usize,
    pub wavelength: f64,
    pub wavenumber: Option<f64>,
    pub raw: f64,
    pub dark: Option<f64>,
    pub processed: f64,
    pub reference: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    pub id: String,
    pub timestamp: DateTime<Local>,
    pub serial_number: String,
    pub raw: Vec<f64>,
    pub dark: Option<Vec<f64>>,
    pub processed: Vec<f64>,
    pub reference: Option<Vec<f64>>,
    pub wavelengths: Vec<f64>,
    pub wavenumbers: Option<Vec<f64>>,
    pub excitation_nm: Option<f64>,
}

impl Measurement {
    pub fn build(
        pixel_count: usize,
        raw: Vec<f64>,
        dark: Option<Vec<f64>>,
        calibration: &CalibrationRecord,
    ) -> Self {
        Self::build_at(pixel_count, raw, dark, calibration, Local::now())
    }

    /// Build with an explicit timestamp.
    ///
    /// `processed` is `raw - dark` when the dark has exactly the raw length,
    /// otherwise a copy of `raw`.
    pub fn build_at(
        pixel_count: usize,
        raw: Vec<f64>,
        dark: Option<Vec<f64>>,
        calibration: &CalibrationRecord,
        timestamp: DateTime<Local>,
    ) -> Self {
        let processed = match &dark {
            Some(d) if d.len() == raw.len() => {
                raw.iter().zip(d).map(|(r, d)| r - d).collect()
            }
            Some(d) => {
                warn!(
                    "Dark length {} does not match spectrum length {}, not subtracting",
                    d.len(),
                    raw.len()
                );
                raw.clone()
            }
            None => raw.clone(),
        };

        let wavelengths = calibration::generate_wavelengths(pixel_count, &calibration.wavecal_coeffs);
        let excitation_nm = calibration.excitation();
        let wavenumbers =
            excitation_nm.map(|nm| calibration::wavelengths_to_wavenumbers(nm, &wavelengths));

        let id = format!(
            "{}-{}",
            timestamp.format("%Y%m%d-%H%M%S-%3f"),
            calibration.serial_number
        );
        debug!("Built measurement {} ({} pixels)", id, raw.len());

        Self {
            id,
            timestamp,
            serial_number: calibration.serial_number.clone(),
            raw,
            dark,
            processed,
            reference: None,
            wavelengths,
            wavenumbers,
            excitation_nm,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.raw.len()
    }

    pub fn set_reference(&mut self, reference: Option<Vec<f64>>) {
        self.reference = reference;
    }

    /// Smooth odd/even fixed-pattern noise.
    ///
    /// Every odd pixel except the last is replaced by the mean of its two even
    /// neighbours.
    pub fn average_alternating(&mut self) {
        let n = self.processed.len();
        let mut i = 1;
        while i + 1 < n {
            self.processed[i] = (self.processed[i - 1] + self.processed[i + 1]) / 2.0;
            i += 2;
        }
    }

    /// Per-pixel rows for export. Axes shorter than the spectrum are padded
    /// with `NaN` wavelengths rather than truncating data.
    pub fn rows(&self) -> Vec<MeasurementRow> {
        let at = |v: &Option<Vec<f64>>, i: usize| v.as_ref().and_then(|v| v.get(i).copied());
        (0..self.raw.len())
            .map(|i| MeasurementRow {
                pixel: i,
                wavelength: self.wavelengths.get(i).copied().unwrap_or(f64::NAN),
                wavenumber: at(&self.wavenumbers, i),
                raw: self.raw[i],
                dark: at(&self.dark, i),
                processed: self.processed[i],
                reference: at(&self.reference, i),
            })
            .collect()
    }
}
