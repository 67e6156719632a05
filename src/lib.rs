//! Session core for SiG handheld Raman spectrometers: EEPROM calibration
//! decoding, chunked spectrum acquisition over BLE, laser and battery state,
//! and calibrated measurements.

pub mod domain;
pub mod infrastructure;

pub use domain::eeprom::CalibrationRecord;
pub use domain::measurement::{Measurement, MeasurementRow};
pub use infrastructure::bluetooth::transport::{Transport, TransportError};
pub use infrastructure::bluetooth::{SessionError, SpectrometerSession};
