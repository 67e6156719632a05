//! Laser State
//!
//! The laser configuration is pushed to the device as a single 6-byte
//! payload. Raman mode hands laser timing to the firmware, so the payload
//! always reports the laser as enabled with no watchdog in that mode.
//!
//! # Payload Structure (6 bytes)
//!
//! ```text
//! [0] : laser type (< MAX_LASER_TYPES)
//! [1] : mode (0 = manual, 1 = Raman)
//! [2] : enabled (0/1)
//! [3] : watchdog seconds (0xFF invalid)
//! [4] : laser delay ms, high byte
//! [5] : laser delay ms, low byte
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const MAX_LASER_TYPES: u8 = 1;
pub const MAX_LASER_MODES: u8 = 2;
pub const PAYLOAD_LEN: usize = 6;

pub const DEFAULT_WATCHDOG_SEC: u8 = 10;
pub const DEFAULT_LASER_DELAY_MS: u16 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LaserStateError {
    #[error("laser payload must be 6 bytes, got {0}")]
    Length(usize),
    #[error("invalid laser type {0}")]
    Type(u8),
    #[error("invalid laser mode {0}")]
    Mode(u8),
    #[error("invalid laser enable flag {0}")]
    Enabled(u8),
    #[error("invalid laser watchdog {0}")]
    Watchdog(u8),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaserType {
    #[default]
    Normal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaserMode {
    #[default]
    Manual,
    Raman,
}

impl LaserMode {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Manual),
            1 => Some(Self::Raman),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaserState {
    pub laser_type: LaserType,
    pub mode: LaserMode,
    pub enabled: bool,
    pub watchdog_sec: u8,
    pub laser_delay_ms: u16,
}

impl Default for LaserState {
    fn default() -> Self {
        Self {
            laser_type: LaserType::Normal,
            mode: LaserMode::Manual,
            enabled: false,
            watchdog_sec: DEFAULT_WATCHDOG_SEC,
            laser_delay_ms: DEFAULT_LASER_DELAY_MS,
        }
    }
}

impl LaserState {
    /// Restore the safe defaults (disabled, 10 s watchdog)
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Wire payload for the laser-state characteristic.
    ///
    /// In Raman mode the enable flag and watchdog are overridden in the
    /// payload only; the stored fields are left as they are.
    pub fn serialize(&self) -> [u8; PAYLOAD_LEN] {
        let (enabled, watchdog) = match self.mode {
            LaserMode::Raman => (1, 0),
            LaserMode::Manual => (u8::from(self.enabled), self.watchdog_sec),
        };
        let [delay_hi, delay_lo] = self.laser_delay_ms.to_be_bytes();
        [
            self.laser_type as u8,
            self.mode as u8,
            enabled,
            watchdog,
            delay_hi,
            delay_lo,
        ]
    }

    /// Validate a payload and decode it.
    ///
    /// The first invalid field rejects the whole payload.
    pub fn parse(data: &[u8]) -> Result<Self, LaserStateError> {
        let bytes: [u8; PAYLOAD_LEN] = data
            .try_into()
            .map_err(|_| LaserStateError::Length(data.len()))?;
        let [laser_type, mode, enabled, watchdog, delay_hi, delay_lo] = bytes;

        if laser_type >= MAX_LASER_TYPES {
            return Err(LaserStateError::Type(laser_type));
        }
        if mode >= MAX_LASER_MODES {
            return Err(LaserStateError::Mode(mode));
        }
        let enabled = match enabled {
            0 => false,
            1 => true,
            other => return Err(LaserStateError::Enabled(other)),
        };
        if watchdog == 0xFF {
            return Err(LaserStateError::Watchdog(watchdog));
        }

        let state = Self {
            laser_type: LaserType::Normal,
            mode: LaserMode::from_byte(mode).ok_or(LaserStateError::Mode(mode))?,
            enabled,
            watchdog_sec: watchdog,
            laser_delay_ms: u16::from_be_bytes([delay_hi, delay_lo]),
        };
        debug!("Parsed laser state: {:?}", state);
        Ok(state)
    }

    /// Apply a payload to this state, keeping the current values on rejection
    pub fn apply(&mut self, data: &[u8]) -> Result<(), LaserStateError> {
        match Self::parse(data) {
            Ok(state) => {
                *self = state;
                Ok(())
            }
            Err(e) => {
                warn!("Rejected laser payload {:02X?}: {}", data, e);
                Err(e)
            }
        }
    }
}
