use crate::domain::laser::{LaserMode, DEFAULT_LASER_DELAY_MS, DEFAULT_WATCHDOG_SEC};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_file_line: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default)]
    pub rotation: LogRotation,
}

/// How often the log file rolls over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: LogRotation::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "sig_spectrometer".to_string()
}

/// Acquisition parameters and firmware timing constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    #[serde(default = "default_integration_time_ms")]
    pub integration_time_ms: u32,
    #[serde(default = "default_gain_db")]
    pub gain_db: f32,
    #[serde(default = "default_scans_to_average")]
    pub scans_to_average: u32,
    // Empirical firmware timing; change only with new firmware
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_throwaway_spectra")]
    pub throwaway_spectra: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            integration_time_ms: default_integration_time_ms(),
            gain_db: default_gain_db(),
            scans_to_average: default_scans_to_average(),
            max_retries: default_max_retries(),
            throwaway_spectra: default_throwaway_spectra(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

fn default_integration_time_ms() -> u32 {
    400
}
fn default_gain_db() -> f32 {
    8.0
}
fn default_scans_to_average() -> u32 {
    1
}
fn default_max_retries() -> u32 {
    4
}
fn default_throwaway_spectra() -> u32 {
    6
}
fn default_backoff_base_ms() -> u64 {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserSettings {
    #[serde(default)]
    pub mode: LaserMode,
    #[serde(default = "default_watchdog_sec")]
    pub watchdog_sec: u8,
    #[serde(default = "default_laser_delay_ms")]
    pub laser_delay_ms: u16,
    /// Laser refuses to fire below this battery percentage
    #[serde(default = "default_min_battery_level")]
    pub min_battery_level: f32,
}

impl Default for LaserSettings {
    fn default() -> Self {
        Self {
            mode: LaserMode::default(),
            watchdog_sec: default_watchdog_sec(),
            laser_delay_ms: default_laser_delay_ms(),
            min_battery_level: default_min_battery_level(),
        }
    }
}

fn default_watchdog_sec() -> u8 {
    DEFAULT_WATCHDOG_SEC
}
fn default_laser_delay_ms() -> u16 {
    DEFAULT_LASER_DELAY_MS
}
fn default_min_battery_level() -> f32 {
    5.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,

    #[serde(default)]
    pub acquisition: AcquisitionSettings,

    #[serde(default)]
    pub laser: LaserSettings,

    // Processing
    #[serde(default = "default_true")]
    pub dark_subtraction: bool,
    #[serde(default = "default_false")]
    pub average_alternating_pixels: bool,

    // ROI overrides applied after the EEPROM is read
    #[serde(default)]
    pub roi_horiz_start: Option<u16>,
    #[serde(default)]
    pub roi_horiz_end: Option<u16>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_settings: LogSettings::default(),
            acquisition: AcquisitionSettings::default(),
            laser: LaserSettings::default(),
            dark_subtraction: true,
            average_alternating_pixels: false,
            roi_horiz_start: None,
            roi_horiz_end: None,
        }
    }
}

impl Settings {
    /// ROI override, only when both ends are set and ordered
    pub fn roi_override(&self) -> Option<(u16, u16)> {
        match (self.roi_horiz_start, self.roi_horiz_end) {
            (Some(start), Some(end)) if start < end => Some((start, end)),
            _ => None,
        }
    }
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::from_path(settings_path))
    }

    /// Load from an explicit file, falling back to defaults if it is missing
    /// or unreadable
    pub fn from_path(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("SiGSpectrometer");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "acquisition": { "integration_time_ms": 250 } }"#).unwrap();
        assert_eq!(settings.acquisition.integration_time_ms, 250);
        assert_eq!(settings.acquisition.max_retries, 4);
        assert_eq!(settings.acquisition.throwaway_spectra, 6);
        assert_eq!(settings.laser.watchdog_sec, 10);
        assert_eq!(settings.log_settings.level, "info");
        assert!(settings.dark_subtraction);
    }

    #[test]
    fn test_older_settings_file_still_loads() {
        // files written by earlier builds carry fields that no longer exist
        let settings: Settings = serde_json::from_str(
            r#"{ "last_connected_address": 1234, "log_settings": { "show_thread_ids": true, "rotation": "hourly" } }"#,
        )
        .unwrap();
        assert_eq!(settings.log_settings.rotation, LogRotation::Hourly);
        assert!(settings.dark_subtraction);

        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("last_connected_address"));
        assert!(json.contains(r#""rotation":"hourly""#));
    }

    #[test]
    fn test_roi_override() {
        let mut settings = Settings::default();
        assert_eq!(settings.roi_override(), None);
        settings.roi_horiz_start = Some(10);
        settings.roi_horiz_end = Some(5);
        assert_eq!(settings.roi_override(), None);
        settings.roi_horiz_end = Some(1500);
        assert_eq!(settings.roi_override(), Some((10, 1500)));
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!(
            "sig_spectrometer_settings_{}.json",
            std::process::id()
        ));
        let mut service = SettingsService::from_path(path.clone());
        service.get_mut().acquisition.scans_to_average = 5;
        service.get_mut().laser.mode = LaserMode::Raman;
        service.save().unwrap();

        let reloaded = SettingsService::from_path(path.clone());
        assert_eq!(reloaded.get().acquisition.scans_to_average, 5);
        assert_eq!(reloaded.get().laser.mode, LaserMode::Raman);
        let _ = fs::remove_file(path);
    }
}
