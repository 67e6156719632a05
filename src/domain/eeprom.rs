//! EEPROM Calibration Record
//!
//! The spectrometer stores its factory calibration in 8 pages of 64 bytes.
//! Which fields are meaningful depends on the format byte at the end of
//! page 0; fields added by later formats keep their defaults on older units.
//!
//! ## Page Layout
//!
//! ```text
//! page 0 : identity, hardware flags, startup settings, detector gain/offset
//! page 1 : wavelength and temperature coefficients, calibration date/operator
//! page 2 : detector geometry, ROI, linearity
//! page 3 : laser power, excitation, 32-bit integration bounds, resolution
//! page 4 : free-form user data
//! page 5 : bad pixels, product configuration
//! page 6 : intensity correction
//! page 7 : reserved
//! ```

use crate::infrastructure::bluetooth::parse_data as pd;
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const PAGE_SIZE: usize = 64;
pub const PAGE_COUNT: usize = 8;

/// Maximum number of bad pixel slots on page 5
pub const MAX_BAD_PIXELS: usize = 15;

/// Maximum number of intensity-correction coefficients
pub const MAX_INTENSITY_COEFFS: usize = 8;

const DEFAULT_WAVECAL: [f32; 4] = [0.0, 1.0, 0.0, 0.0];
const DEFAULT_DETECTOR_GAIN: f32 = 24.0;
const DEFAULT_ACTIVE_PIXELS_HORIZ: u16 = 1952;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EepromError {
    #[error("expected 8 EEPROM pages, got {0}")]
    InsufficientPages(usize),
    #[error("EEPROM page {page} is {len} bytes (expected 64)")]
    ShortPage { page: usize, len: usize },
    #[error("EEPROM page {0} is corrupted (uniform 0x00 or 0xFF)")]
    CorruptedPage(usize),
}

/// Optional hardware features advertised by format 9 and later
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeatureMask {
    pub invert_x_axis: bool,
    pub bin_2x2: bool,
    pub gen15: bool,
    pub cutoff_filter_installed: bool,
    pub hardware_even_odd: bool,
    pub sig_laser_tec: bool,
    pub has_interlock_feedback: bool,
}

impl FeatureMask {
    pub fn from_bits(bits: u16) -> Self {
        let bit = |n: u16| bits & (1 << n) != 0;
        Self {
            invert_x_axis: bit(0),
            bin_2x2: bit(1),
            gen15: bit(2),
            cutoff_filter_installed: bit(3),
            hardware_even_odd: bit(4),
            sig_laser_tec: bit(5),
            has_interlock_feedback: bit(6),
        }
    }
}

/// Vertical readout band of the detector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerticalRegion {
    pub start: u16,
    pub end: u16,
}

/// Decoded factory calibration of one spectrometer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationRecord {
    pub format: u8,

    // Page 0
    pub model: String,
    pub serial_number: String,
    pub baud_rate: u32,
    pub has_cooling: bool,
    pub has_battery: bool,
    pub has_laser: bool,
    /// Integral excitation wavelength used by formats before 9
    pub excitation_nm: u16,
    pub feature_mask: FeatureMask,
    pub slit_size_um: u16,
    pub startup_integration_time_ms: u16,
    pub startup_detector_temperature_deg_c: i16,
    pub startup_triggering_mode: u8,
    pub detector_gain: f32,
    pub detector_offset: i16,
    pub detector_gain_odd: f32,
    pub detector_offset_odd: i16,

    // Page 1
    pub wavecal_coeffs: [f32; 4],
    pub deg_c_to_dac_coeffs: [f32; 3],
    pub detector_temp_max: i16,
    pub detector_temp_min: i16,
    pub adc_to_deg_c_coeffs: [f32; 3],
    pub thermistor_resistance_at_298k: i16,
    pub thermistor_beta: i16,
    pub calibration_date: String,
    pub calibrated_by: String,

    // Page 2
    pub detector_name: String,
    pub active_pixels_horiz: u16,
    pub active_pixels_vert: u16,
    pub min_integration_time_ms: u32,
    pub max_integration_time_ms: u32,
    pub actual_pixels_horiz: u16,
    pub roi_horiz_start: u16,
    pub roi_horiz_end: u16,
    pub roi_vert_regions: [VerticalRegion; 3],
    pub linearity_coeffs: [f32; 5],

    // Page 3
    pub laser_power_coeffs: [f32; 4],
    pub max_laser_power_mw: f32,
    pub min_laser_power_mw: f32,
    pub laser_excitation_wavelength_nm: f32,
    pub avg_resolution: f32,

    // Page 4
    #[serde(skip)]
    pub user_data: [u8; PAGE_SIZE],

    // Page 5
    pub bad_pixels: BTreeSet<u16>,
    pub product_configuration: String,

    // Page 6
    pub intensity_correction_order: u8,
    pub intensity_correction_coeffs: Vec<f32>,
}

impl Default for CalibrationRecord {
    fn default() -> Self {
        Self {
            format: 0,
            model: String::new(),
            serial_number: String::new(),
            baud_rate: 0,
            has_cooling: false,
            has_battery: false,
            has_laser: false,
            excitation_nm: 0,
            feature_mask: FeatureMask::default(),
            slit_size_um: 0,
            startup_integration_time_ms: 0,
            startup_detector_temperature_deg_c: 0,
            startup_triggering_mode: 0,
            detector_gain: DEFAULT_DETECTOR_GAIN,
            detector_offset: 0,
            detector_gain_odd: 0.0,
            detector_offset_odd: 0,
            wavecal_coeffs: DEFAULT_WAVECAL,
            deg_c_to_dac_coeffs: [0.0; 3],
            detector_temp_max: 0,
            detector_temp_min: 0,
            adc_to_deg_c_coeffs: [0.0; 3],
            thermistor_resistance_at_298k: 0,
            thermistor_beta: 0,
            calibration_date: String::new(),
            calibrated_by: String::new(),
            detector_name: String::new(),
            active_pixels_horiz: DEFAULT_ACTIVE_PIXELS_HORIZ,
            active_pixels_vert: 0,
            min_integration_time_ms: 1,
            max_integration_time_ms: 0,
            actual_pixels_horiz: 0,
            roi_horiz_start: 0,
            roi_horiz_end: 0,
            roi_vert_regions: [VerticalRegion::default(); 3],
            linearity_coeffs: [0.0; 5],
            laser_power_coeffs: [0.0; 4],
            max_laser_power_mw: 0.0,
            min_laser_power_mw: 0.0,
            laser_excitation_wavelength_nm: 0.0,
            avg_resolution: 0.0,
            user_data: [0; PAGE_SIZE],
            bad_pixels: BTreeSet::new(),
            product_configuration: String::new(),
            intensity_correction_order: 0,
            intensity_correction_coeffs: Vec::new(),
        }
    }
}

fn f32s<const N: usize>(page: &[u8], offset: usize) -> [f32; N] {
    std::array::from_fn(|i| pd::to_f32(page, offset + 4 * i).unwrap_or(0.0))
}

fn is_uniform(page: &[u8], value: u8) -> bool {
    page.iter().all(|&b| b == value)
}

impl CalibrationRecord {
    /// Decode a calibration record from the raw EEPROM pages.
    ///
    /// Only page 0 is checked for corruption; later pages may legitimately be
    /// blank on older units. Out-of-range values are replaced by safe
    /// defaults and logged rather than reported as errors.
    pub fn decode<P: AsRef<[u8]>>(pages: &[P]) -> Result<Self, EepromError> {
        if pages.len() < PAGE_COUNT {
            return Err(EepromError::InsufficientPages(pages.len()));
        }
        for (page, buf) in pages.iter().take(PAGE_COUNT).enumerate() {
            let len = buf.as_ref().len();
            if len < PAGE_SIZE {
                return Err(EepromError::ShortPage { page, len });
            }
        }

        let p: Vec<&[u8]> = pages
            .iter()
            .take(PAGE_COUNT)
            .map(|page| &page.as_ref()[..PAGE_SIZE])
            .collect();

        if is_uniform(p[0], 0x00) || is_uniform(p[0], 0xFF) {
            warn!("EEPROM page 0 is blank, refusing to decode");
            return Err(EepromError::CorruptedPage(0));
        }

        let mut rec = Self {
            format: pd::to_u8(p[0], 63).unwrap_or(0),
            ..Self::default()
        };
        debug!("Decoding EEPROM format {}", rec.format);

        rec.decode_page0(p[0]);
        rec.decode_page1(p[1]);
        rec.decode_page2(p[2]);
        rec.decode_page3(p[3]);
        rec.user_data.copy_from_slice(p[4]);
        rec.decode_page5(p[5]);
        rec.decode_page6(p[6]);

        rec.enforce_defaults();

        info!(
            "EEPROM decoded: model {} serial {} ({} pixels, format {})",
            rec.model, rec.serial_number, rec.active_pixels_horiz, rec.format
        );
        Ok(rec)
    }

    fn decode_page0(&mut self, page: &[u8]) {
        self.model = pd::to_string(page, 0, 16).unwrap_or_default();
        self.serial_number = pd::to_string(page, 16, 16).unwrap_or_default();
        self.baud_rate = pd::to_u32(page, 32).unwrap_or(0);
        self.has_cooling = pd::to_bool(page, 36).unwrap_or(false);
        self.has_battery = pd::to_bool(page, 37).unwrap_or(false);
        self.has_laser = pd::to_bool(page, 38).unwrap_or(false);

        let word = pd::to_u16(page, 39).unwrap_or(0);
        if self.format >= 9 {
            self.feature_mask = FeatureMask::from_bits(word);
        } else {
            self.excitation_nm = word;
        }

        self.slit_size_um = pd::to_u16(page, 41).unwrap_or(0);
        self.startup_integration_time_ms = pd::to_u16(page, 43).unwrap_or(0);
        self.startup_detector_temperature_deg_c = pd::to_i16(page, 45).unwrap_or(0);
        self.startup_triggering_mode = pd::to_u8(page, 47).unwrap_or(0);
        self.detector_gain = pd::to_f32(page, 48).unwrap_or(0.0);
        self.detector_offset = pd::to_i16(page, 52).unwrap_or(0);
        self.detector_gain_odd = pd::to_f32(page, 54).unwrap_or(0.0);
        self.detector_offset_odd = pd::to_i16(page, 58).unwrap_or(0);
    }

    fn decode_page1(&mut self, page: &[u8]) {
        self.wavecal_coeffs = f32s(page, 0);
        self.deg_c_to_dac_coeffs = f32s(page, 16);
        self.detector_temp_max = pd::to_i16(page, 28).unwrap_or(0);
        self.detector_temp_min = pd::to_i16(page, 30).unwrap_or(0);
        self.adc_to_deg_c_coeffs = f32s(page, 32);
        self.thermistor_resistance_at_298k = pd::to_i16(page, 44).unwrap_or(0);
        self.thermistor_beta = pd::to_i16(page, 46).unwrap_or(0);
        self.calibration_date = pd::to_string(page, 48, 12).unwrap_or_default();
        self.calibrated_by = pd::to_string(page, 60, 3).unwrap_or_default();
    }

    fn decode_page2(&mut self, page: &[u8]) {
        self.detector_name = pd::to_string(page, 0, 16).unwrap_or_default();
        self.active_pixels_horiz = pd::to_u16(page, 16).unwrap_or(0);
        // byte 18 unused
        self.active_pixels_vert = pd::to_u16(page, 19).unwrap_or(0);
        self.min_integration_time_ms = pd::to_u16(page, 21).unwrap_or(0) as u32;
        self.max_integration_time_ms = pd::to_u16(page, 23).unwrap_or(0) as u32;
        self.actual_pixels_horiz = pd::to_u16(page, 25).unwrap_or(0);
        self.roi_horiz_start = pd::to_u16(page, 27).unwrap_or(0);
        self.roi_horiz_end = pd::to_u16(page, 29).unwrap_or(0);
        for (i, region) in self.roi_vert_regions.iter_mut().enumerate() {
            let offset = 31 + 4 * i;
            region.start = pd::to_u16(page, offset).unwrap_or(0);
            region.end = pd::to_u16(page, offset + 2).unwrap_or(0);
        }
        self.linearity_coeffs = f32s(page, 43);
    }

    fn decode_page3(&mut self, page: &[u8]) {
        self.laser_power_coeffs = f32s(page, 12);
        self.max_laser_power_mw = pd::to_f32(page, 28).unwrap_or(0.0);
        self.min_laser_power_mw = pd::to_f32(page, 32).unwrap_or(0.0);
        self.laser_excitation_wavelength_nm = pd::to_f32(page, 36).unwrap_or(0.0);

        if self.format >= 5 {
            self.min_integration_time_ms = pd::to_u32(page, 40).unwrap_or(0);
            self.max_integration_time_ms = pd::to_u32(page, 44).unwrap_or(0);
        }
        if self.format >= 7 {
            self.avg_resolution = pd::to_f32(page, 48).unwrap_or(0.0);
        }
    }

    fn decode_page5(&mut self, page: &[u8]) {
        self.bad_pixels = (0..MAX_BAD_PIXELS)
            .filter_map(|i| pd::to_i16(page, 2 * i))
            .filter_map(|pixel| u16::try_from(pixel).ok())
            .collect();

        if self.format >= 5 {
            self.product_configuration = pd::to_string(page, 30, 16).unwrap_or_default();
        }
    }

    fn decode_page6(&mut self, page: &[u8]) {
        if self.format < 6 {
            return;
        }
        self.intensity_correction_order = pd::to_u8(page, 0).unwrap_or(0);
        let count = self.intensity_correction_order as usize + 1;
        if count > MAX_INTENSITY_COEFFS {
            warn!(
                "Intensity correction order {} exceeds {} coefficients, ignoring",
                self.intensity_correction_order, MAX_INTENSITY_COEFFS
            );
            self.intensity_correction_coeffs.clear();
            return;
        }
        self.intensity_correction_coeffs = (0..count)
            .map(|i| pd::to_f32(page, 1 + 4 * i).unwrap_or(0.0))
            .collect();
    }

    fn enforce_defaults(&mut self) {
        if self.wavecal_coeffs.iter().any(|c| c.is_nan()) {
            warn!(
                "Wavelength calibration contains NaN ({:?}), using identity",
                self.wavecal_coeffs
            );
            self.wavecal_coeffs = DEFAULT_WAVECAL;
        }
        if self.min_integration_time_ms < 1 {
            warn!(
                "Min integration time {} ms invalid, using 1",
                self.min_integration_time_ms
            );
            self.min_integration_time_ms = 1;
        }
        if !(self.detector_gain > 0.0 && self.detector_gain < 256.0) {
            warn!(
                "Detector gain {} invalid, using {}",
                self.detector_gain, DEFAULT_DETECTOR_GAIN
            );
            self.detector_gain = DEFAULT_DETECTOR_GAIN;
        }
        if self.active_pixels_horiz == 0 {
            warn!(
                "Active pixel count invalid, using {}",
                DEFAULT_ACTIVE_PIXELS_HORIZ
            );
            self.active_pixels_horiz = DEFAULT_ACTIVE_PIXELS_HORIZ;
        }
    }

    /// Laser excitation in nm, if the unit stores one
    pub fn excitation(&self) -> Option<f64> {
        let nm = self.laser_excitation_wavelength_nm;
        if nm.is_finite() && nm > 0.0 {
            Some(nm as f64)
        } else if self.excitation_nm > 0 {
            Some(self.excitation_nm as f64)
        } else {
            None
        }
    }

    /// User data page as text, cut at the first NUL
    pub fn user_text(&self) -> String {
        pd::to_string(&self.user_data, 0, PAGE_SIZE).unwrap_or_default()
    }

    /// Override the horizontal ROI from user settings
    pub fn set_roi_horizontal(&mut self, start: u16, end: u16) {
        info!(
            "ROI override: {}..{} (was {}..{})",
            start, end, self.roi_horiz_start, self.roi_horiz_end
        );
        self.roi_horiz_start = start;
        self.roi_horiz_end = end;
    }

    /// Flattened (name, value) list of every field, for display
    pub fn viewable_fields(&self) -> Vec<(String, String)> {
        fn list<T: std::fmt::Display>(values: &[T]) -> String {
            values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }

        let mut fields: Vec<(&str, String)> = vec![
            ("Format", self.format.to_string()),
            ("Model", self.model.clone()),
            ("Serial Number", self.serial_number.clone()),
            ("Baud Rate", self.baud_rate.to_string()),
            ("Has Cooling", self.has_cooling.to_string()),
            ("Has Battery", self.has_battery.to_string()),
            ("Has Laser", self.has_laser.to_string()),
        ];
        if self.format >= 9 {
            fields.push(("Feature Mask", format!("{:?}", self.feature_mask)));
        } else {
            fields.push(("Excitation (nm)", self.excitation_nm.to_string()));
        }
        fields.extend([
            ("Slit Size (µm)", self.slit_size_um.to_string()),
            (
                "Startup Integration Time (ms)",
                self.startup_integration_time_ms.to_string(),
            ),
            (
                "Startup Temp (°C)",
                self.startup_detector_temperature_deg_c.to_string(),
            ),
            (
                "Startup Triggering Mode",
                self.startup_triggering_mode.to_string(),
            ),
            ("Detector Gain", self.detector_gain.to_string()),
            ("Detector Offset", self.detector_offset.to_string()),
            ("Detector Gain Odd", self.detector_gain_odd.to_string()),
            ("Detector Offset Odd", self.detector_offset_odd.to_string()),
            ("Wavecal Coeffs", list(&self.wavecal_coeffs)),
            ("degCToDAC Coeffs", list(&self.deg_c_to_dac_coeffs)),
            ("Detector Temp Max", self.detector_temp_max.to_string()),
            ("Detector Temp Min", self.detector_temp_min.to_string()),
            ("adcToDegC Coeffs", list(&self.adc_to_deg_c_coeffs)),
            (
                "Thermistor Resistance at 298K",
                self.thermistor_resistance_at_298k.to_string(),
            ),
            ("Thermistor Beta", self.thermistor_beta.to_string()),
            ("Calibration Date", self.calibration_date.clone()),
            ("Calibrated By", self.calibrated_by.clone()),
            ("Detector Name", self.detector_name.clone()),
            ("Active Pixels Horizontal", self.active_pixels_horiz.to_string()),
            ("Active Pixels Vertical", self.active_pixels_vert.to_string()),
            (
                "Min Integration Time (ms)",
                self.min_integration_time_ms.to_string(),
            ),
            (
                "Max Integration Time (ms)",
                self.max_integration_time_ms.to_string(),
            ),
            ("Actual Pixels Horizontal", self.actual_pixels_horiz.to_string()),
            ("ROI Horizontal Start", self.roi_horiz_start.to_string()),
            ("ROI Horizontal End", self.roi_horiz_end.to_string()),
        ]);
        for (i, region) in self.roi_vert_regions.iter().enumerate() {
            fields.push((
                ["ROI Vertical Region 1", "ROI Vertical Region 2", "ROI Vertical Region 3"][i],
                format!("{}..{}", region.start, region.end),
            ));
        }
        fields.extend([
            ("Linearity Coeffs", list(&self.linearity_coeffs)),
            ("Laser Power Coeffs", list(&self.laser_power_coeffs)),
            ("Max Laser Power (mW)", self.max_laser_power_mw.to_string()),
            ("Min Laser Power (mW)", self.min_laser_power_mw.to_string()),
            (
                "Laser Excitation (nm)",
                self.laser_excitation_wavelength_nm.to_string(),
            ),
            ("Avg Resolution", self.avg_resolution.to_string()),
            ("User Text", self.user_text()),
            (
                "Bad Pixels",
                list(&self.bad_pixels.iter().copied().collect::<Vec<_>>()),
            ),
            ("Product Configuration", self.product_configuration.clone()),
            (
                "Intensity Correction Order",
                self.intensity_correction_order.to_string(),
            ),
            (
                "Intensity Correction Coeffs",
                list(&self.intensity_correction_coeffs),
            ),
        ]);

        fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }
}

/// Builder for raw EEPROM images, used by the simulated device and tests
#[derive(Debug, Clone)]
pub struct EepromImage {
    pages: [[u8; PAGE_SIZE]; PAGE_COUNT],
}

impl Default for EepromImage {
    fn default() -> Self {
        Self {
            pages: [[0; PAGE_SIZE]; PAGE_COUNT],
        }
    }
}

impl EepromImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(mut self, page: usize, offset: usize, data: &[u8]) -> Self {
        self.pages[page][offset..offset + data.len()].copy_from_slice(data);
        self
    }

    pub fn u8(self, page: usize, offset: usize, value: u8) -> Self {
        self.bytes(page, offset, &[value])
    }

    pub fn u16(self, page: usize, offset: usize, value: u16) -> Self {
        self.bytes(page, offset, &value.to_le_bytes())
    }

    pub fn i16(self, page: usize, offset: usize, value: i16) -> Self {
        self.bytes(page, offset, &value.to_le_bytes())
    }

    pub fn u32(self, page: usize, offset: usize, value: u32) -> Self {
        self.bytes(page, offset, &value.to_le_bytes())
    }

    pub fn f32(self, page: usize, offset: usize, value: f32) -> Self {
        self.bytes(page, offset, &value.to_le_bytes())
    }

    pub fn text(self, page: usize, offset: usize, value: &str) -> Self {
        self.bytes(page, offset, value.as_bytes())
    }

    pub fn pages(&self) -> &[[u8; PAGE_SIZE]; PAGE_COUNT] {
        &self.pages
    }

    /// A plausible 785 nm unit with the given format byte
    pub fn sample(format: u8, serial: &str, pixels: u16) -> Self {
        let mut image = Self::new()
            .text(0, 0, "WP-785X-SR")
            .text(0, 16, serial)
            .u32(0, 32, 115_200)
            .u8(0, 37, 1)
            .u8(0, 38, 1)
            .u16(0, 39, if format >= 9 { 0x0010 } else { 785 })
            .u16(0, 41, 50)
            .u16(0, 43, 400)
            .f32(0, 48, 8.0)
            .f32(0, 54, 8.0)
            .u8(0, 63, format)
            .f32(1, 0, 770.0)
            .f32(1, 4, 0.06)
            .f32(1, 8, -2.5e-6)
            .text(1, 48, "2026-01-15")
            .text(1, 60, "WP")
            .text(2, 0, "IMX385")
            .u16(2, 16, pixels)
            .u16(2, 19, 64)
            .u16(2, 21, 3)
            .u16(2, 23, 5000)
            .u16(2, 25, pixels)
            .u16(2, 29, pixels.saturating_sub(1))
            .f32(3, 28, 450.0)
            .f32(3, 36, 785.0)
            .u32(3, 40, 3)
            .u32(3, 44, 10_000)
            .f32(3, 48, 10.5)
            .text(4, 0, "demo unit");
        for slot in 0..MAX_BAD_PIXELS {
            image = image.i16(5, 2 * slot, -1);
        }
        image
            .text(5, 30, "SiG-785")
            .u8(6, 0, 1)
            .f32(6, 1, 1.0)
            .f32(6, 5, 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(image: &EepromImage) -> Result<CalibrationRecord, EepromError> {
        CalibrationRecord::decode(image.pages())
    }

    #[test]
    fn test_insufficient_pages() {
        let pages = vec![[1u8; PAGE_SIZE]; 7];
        assert_eq!(
            CalibrationRecord::decode(&pages),
            Err(EepromError::InsufficientPages(7))
        );
    }

    #[test]
    fn test_short_page() {
        let mut pages: Vec<Vec<u8>> = vec![vec![1u8; PAGE_SIZE]; PAGE_COUNT];
        pages[3].truncate(16);
        assert_eq!(
            CalibrationRecord::decode(&pages),
            Err(EepromError::ShortPage { page: 3, len: 16 })
        );
    }

    #[test]
    fn test_corrupted_page() {
        let zeros = EepromImage::new();
        assert_eq!(decode(&zeros), Err(EepromError::CorruptedPage(0)));

        let mut ff = EepromImage::sample(9, "WP-00001", 1952);
        ff.pages[0] = [0xFF; PAGE_SIZE];
        assert_eq!(decode(&ff), Err(EepromError::CorruptedPage(0)));

        let mixed = EepromImage::new().u8(0, 10, 0xFF);
        assert!(decode(&mixed).is_ok());
    }

    #[test]
    fn test_sample_unit() {
        let rec = decode(&EepromImage::sample(9, "WP-00042", 1952)).unwrap();
        assert_eq!(rec.format, 9);
        assert_eq!(rec.model, "WP-785X-SR");
        assert_eq!(rec.serial_number, "WP-00042");
        assert!(rec.has_battery && rec.has_laser && !rec.has_cooling);
        assert!(rec.feature_mask.hardware_even_odd);
        assert_eq!(rec.excitation_nm, 0);
        assert_eq!(rec.detector_gain, 8.0);
        assert_eq!(rec.wavecal_coeffs, [770.0, 0.06, -2.5e-6, 0.0]);
        assert_eq!(rec.calibration_date, "2026-01-15");
        assert_eq!(rec.detector_name, "IMX385");
        assert_eq!(rec.active_pixels_horiz, 1952);
        assert_eq!(rec.min_integration_time_ms, 3);
        assert_eq!(rec.max_integration_time_ms, 10_000);
        assert_eq!(rec.avg_resolution, 10.5);
        assert_eq!(rec.product_configuration, "SiG-785");
        assert_eq!(rec.intensity_correction_coeffs, vec![1.0, 0.5]);
        assert!(rec.bad_pixels.is_empty());
        assert_eq!(rec.user_text(), "demo unit");
        assert_eq!(rec.excitation(), Some(785.0));
    }

    #[test]
    fn test_format_gating() {
        let rec = decode(&EepromImage::sample(4, "WP-00001", 1024)).unwrap();
        // 16-bit bounds from page 2 survive on format 4
        assert_eq!(rec.max_integration_time_ms, 5000);
        assert_eq!(rec.product_configuration, "");
        assert!(rec.intensity_correction_coeffs.is_empty());
        assert_eq!(rec.avg_resolution, 0.0);
        assert_eq!(rec.excitation_nm, 785);
        assert_eq!(rec.feature_mask, FeatureMask::default());

        let rec = decode(&EepromImage::sample(6, "WP-00001", 1024)).unwrap();
        assert_eq!(rec.max_integration_time_ms, 10_000);
        assert_eq!(rec.product_configuration, "SiG-785");
        assert_eq!(rec.intensity_correction_coeffs.len(), 2);
        assert_eq!(rec.avg_resolution, 0.0);
    }

    #[test]
    fn test_intensity_order_too_high() {
        let image = EepromImage::sample(7, "WP-00001", 1024).u8(6, 0, 8);
        let rec = decode(&image).unwrap();
        assert_eq!(rec.intensity_correction_order, 8);
        assert!(rec.intensity_correction_coeffs.is_empty());

        let image = EepromImage::sample(7, "WP-00001", 1024).u8(6, 0, 7);
        assert_eq!(decode(&image).unwrap().intensity_correction_coeffs.len(), 8);
    }

    #[test]
    fn test_bad_pixels() {
        let image = EepromImage::sample(9, "WP-00001", 1952)
            .i16(5, 4, 3)
            .i16(5, 8, 7)
            .i16(5, 12, 3)
            .i16(5, 14, -200);
        let rec = decode(&image).unwrap();
        assert_eq!(rec.bad_pixels.into_iter().collect::<Vec<_>>(), vec![3, 7]);

        let image = EepromImage::sample(9, "WP-00001", 1952)
            .i16(5, 0, 900)
            .i16(5, 2, 0)
            .i16(5, 28, 12);
        let rec = decode(&image).unwrap();
        assert_eq!(
            rec.bad_pixels.into_iter().collect::<Vec<_>>(),
            vec![0, 12, 900]
        );
    }

    #[test]
    fn test_defaults_enforced() {
        let image = EepromImage::sample(9, "WP-00001", 0)
            .f32(1, 8, f32::NAN)
            .f32(0, 48, 300.0)
            .u32(3, 40, 0);
        let rec = decode(&image).unwrap();
        assert_eq!(rec.wavecal_coeffs, [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(rec.detector_gain, 24.0);
        assert_eq!(rec.min_integration_time_ms, 1);
        assert_eq!(rec.active_pixels_horiz, 1952);

        let rec = decode(&EepromImage::sample(9, "WP-00001", 1952).f32(0, 48, 0.0)).unwrap();
        assert_eq!(rec.detector_gain, 24.0);
    }

    #[test]
    fn test_roi_override_and_fields() {
        let mut rec = decode(&EepromImage::sample(9, "WP-00009", 1952)).unwrap();
        rec.set_roi_horizontal(100, 1800);
        assert_eq!((rec.roi_horiz_start, rec.roi_horiz_end), (100, 1800));

        let fields = rec.viewable_fields();
        let lookup = |name: &str| {
            fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(lookup("Serial Number").as_deref(), Some("WP-00009"));
        assert_eq!(lookup("ROI Horizontal Start").as_deref(), Some("100"));
        assert_eq!(lookup("Product Configuration").as_deref(), Some("SiG-785"));
        assert!(lookup("Excitation (nm)").is_none());
    }
}
