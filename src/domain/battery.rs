//! Battery Status
//!
//! Decodes the 2-byte battery characteristic and tracks how fresh the last
//! reading is.

use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Readings older than this are unusable for threshold decisions
pub const EXPIRATION: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default)]
pub struct BatteryStatus {
    raw: u16,
    level: f32,
    charging: bool,
    last_checked: Option<Instant>,
}

impl BatteryStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a battery payload.
    ///
    /// The high byte is the charge percentage and bit 0 of the low byte the
    /// charging flag. A missing or wrong-length payload is logged and the
    /// previous reading kept. Returns whether the reading was accepted.
    pub fn parse(&mut self, data: Option<&[u8]>) -> bool {
        self.parse_at(data, Instant::now())
    }

    fn parse_at(&mut self, data: Option<&[u8]>, now: Instant) -> bool {
        let Some(data) = data else {
            warn!("Battery status: no data");
            return false;
        };
        let [level, flags] = match data {
            [level, flags] => [*level, *flags],
            _ => {
                warn!("Battery status: expected 2 bytes, got {}", data.len());
                return false;
            }
        };

        self.raw = u16::from_be_bytes([level, flags]);
        self.level = level.min(100) as f32;
        self.charging = flags & 0x01 != 0;
        self.last_checked = Some(now);
        debug!("Battery: {}", self);
        true
    }

    pub fn raw(&self) -> u16 {
        self.raw
    }

    /// Charge level as a percentage, 0–100
    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn is_charging(&self) -> bool {
        self.charging
    }

    pub fn last_checked(&self) -> Option<Instant> {
        self.last_checked
    }

    /// True if never read or last read at least 60 seconds ago
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    fn is_expired_at(&self, now: Instant) -> bool {
        match self.last_checked {
            None => true,
            Some(t) => now.saturating_duration_since(t) >= EXPIRATION,
        }
    }

    /// Level of a fresh reading, `None` once it has expired
    pub fn fresh_level(&self) -> Option<f32> {
        (!self.is_expired()).then_some(self.level)
    }
}

impl std::fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.0}%{}",
            self.level,
            if self.charging { " (charging)" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let mut battery = BatteryStatus::new();
        assert!(battery.parse(Some(&[87, 0x01])));
        assert_eq!(battery.level(), 87.0);
        assert!(battery.is_charging());
        assert_eq!(battery.raw(), 0x5701);
        assert!(!battery.is_expired());
        assert_eq!(battery.to_string(), "87% (charging)");

        assert!(battery.parse(Some(&[40, 0x02])));
        assert!(!battery.is_charging());
    }

    #[test]
    fn test_level_clamped() {
        let mut battery = BatteryStatus::new();
        battery.parse(Some(&[250, 0]));
        assert_eq!(battery.level(), 100.0);
    }

    #[test]
    fn test_bad_payload_keeps_state() {
        let mut battery = BatteryStatus::new();
        assert!(!battery.parse(None));
        assert!(battery.is_expired());

        battery.parse(Some(&[55, 1]));
        assert!(!battery.parse(Some(&[1, 2, 3])));
        assert!(!battery.parse(Some(&[])));
        assert_eq!(battery.level(), 55.0);
        assert!(battery.is_charging());
    }

    #[test]
    fn test_expiry() {
        let mut battery = BatteryStatus::new();
        assert!(battery.is_expired());
        assert_eq!(battery.fresh_level(), None);

        let t0 = Instant::now();
        battery.parse_at(Some(&[90, 0]), t0);
        assert!(!battery.is_expired_at(t0 + Duration::from_secs(59)));
        assert!(battery.is_expired_at(t0 + EXPIRATION));
    }
}
