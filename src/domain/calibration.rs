//! Calibration Math
//!
//! Pure conversions between detector pixels and physical units, plus the
//! device's 8.8 fixed-point gain format.

use thiserror::Error;

/// Exclusive upper bound for detector gain in dB
pub const MAX_GAIN_DB: f32 = 256.0;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GainError {
    #[error("gain {0} dB outside (0, 256)")]
    OutOfRange(f32),
}

/// Expand a wavelength polynomial over `pixel_count` pixels.
///
/// Each wavelength is `Σ coeffs[i] * pixel^i`, evaluated in double precision.
pub fn generate_wavelengths(pixel_count: usize, coeffs: &[f32]) -> Vec<f64> {
    (0..pixel_count)
        .map(|pixel| {
            let x = pixel as f64;
            // Horner, highest order first
            coeffs
                .iter()
                .rev()
                .fold(0.0, |acc, &c| acc * x + c as f64)
        })
        .collect()
}

/// Convert wavelengths (nm) to Raman shift (cm⁻¹) relative to the laser line.
///
/// Values that come out non-finite (a wavelength of zero, or one equal to the
/// excitation) are reported as 0.
pub fn wavelengths_to_wavenumbers(laser_nm: f64, wavelengths: &[f64]) -> Vec<f64> {
    let base = 1e7 / laser_nm;
    wavelengths
        .iter()
        .map(|&nm| {
            let wavenumber = base - 1e7 / nm;
            if wavenumber.is_finite() {
                wavenumber
            } else {
                0.0
            }
        })
        .collect()
}

/// Encode a gain in dB as the device's "unsigned bfloat16" byte pair.
///
/// The integer part becomes the high byte and the rounded fractional part,
/// scaled by 256, the low byte.
pub fn encode_gain_db(value: f32) -> Result<[u8; 2], GainError> {
    if !(value > 0.0 && value < MAX_GAIN_DB) {
        return Err(GainError::OutOfRange(value));
    }
    let msb = value.trunc() as u8;
    let lsb = (((value - value.trunc()) * 256.0).round() as u32 & 0xFF) as u8;
    Ok([msb, lsb])
}

/// Inverse of [`encode_gain_db`]
pub fn decode_gain_db(bytes: [u8; 2]) -> f32 {
    bytes[0] as f32 + bytes[1] as f32 / 256.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_wavelength_is_offset() {
        for (n, coeffs) in [
            (1, [785.0, 0.1, 0.0, 0.0]),
            (1952, [500.25, 0.2, -1e-5, 3e-9]),
            (8, [0.0, 1.0, 0.0, 0.0]),
        ] {
            let wl = generate_wavelengths(n, &coeffs);
            assert_eq!(wl.len(), n);
            assert_eq!(wl[0], coeffs[0] as f64);
        }
    }

    #[test]
    fn test_polynomial() {
        let wl = generate_wavelengths(3, &[1.0, 2.0, 3.0, 0.5]);
        // p=2: 1 + 4 + 12 + 4
        assert_eq!(wl, vec![1.0, 6.5, 21.0]);
        assert!(generate_wavelengths(0, &[1.0]).is_empty());
    }

    #[test]
    fn test_wavenumber_at_laser_line() {
        let wn = wavelengths_to_wavenumbers(785.0, &[785.0]);
        assert_eq!(wn, vec![0.0]);

        let wn = wavelengths_to_wavenumbers(785.0, &[0.0]);
        assert_eq!(wn, vec![0.0]);
    }

    #[test]
    fn test_wavenumber_shift() {
        let wn = wavelengths_to_wavenumbers(785.0, &[850.0]);
        let expected = 1e7 / 785.0 - 1e7 / 850.0;
        assert!((wn[0] - expected).abs() < 1e-9);
        assert!(wn[0] > 970.0 && wn[0] < 980.0);
    }

    #[test]
    fn test_gain_encoding() {
        assert_eq!(encode_gain_db(24.0), Ok([24, 0]));
        assert_eq!(encode_gain_db(24.5), Ok([24, 128]));
        assert_eq!(encode_gain_db(8.25), Ok([8, 64]));
        assert_eq!(decode_gain_db([24, 128]), 24.5);
    }

    #[test]
    fn test_gain_range() {
        assert!(encode_gain_db(0.0).is_err());
        assert!(encode_gain_db(256.0).is_err());
        assert!(encode_gain_db(-1.0).is_err());
        assert!(encode_gain_db(f32::NAN).is_err());
        assert!(encode_gain_db(255.5).is_ok());
    }
}
