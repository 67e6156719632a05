//! Spectrometer Session
//!
//! Per-connection coordinator. Owns the transport, the decoded calibration,
//! the laser and battery state and the acquisition engine, and reports
//! progress to an optional observer channel.

use crate::domain::battery::BatteryStatus;
use crate::domain::eeprom::{CalibrationRecord, EepromError, PAGE_COUNT, PAGE_SIZE};
use crate::domain::laser::{LaserMode, LaserState, LaserStateError};
use crate::domain::measurement::Measurement;
use crate::domain::models::{ConnectionStatus, MessageSeverity, SessionEvent, StatusMessage};
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::acquisition::{AcquisitionEngine, AcquisitionError};
use crate::infrastructure::bluetooth::protocol::{Characteristic, EEPROM_SUBPAGES, EEPROM_SUBPAGE_SIZE};
use crate::infrastructure::bluetooth::transport::{write_checked, Transport, TransportError};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("EEPROM has not been read")]
    NotCalibrated,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Eeprom(#[from] EepromError),
    #[error(transparent)]
    LaserState(#[from] LaserStateError),
    #[error("laser unavailable (battery {})", fmt_level(.level))]
    LaserUnavailable { level: Option<f32> },
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
}

fn fmt_level(level: &Option<f32>) -> String {
    match level {
        Some(l) => format!("{:.0}%", l),
        None => "unknown".to_string(),
    }
}

/// One connected spectrometer
pub struct SpectrometerSession<T: Transport> {
    transport: T,
    settings: Settings,
    engine: AcquisitionEngine,
    calibration: Option<CalibrationRecord>,
    laser: LaserState,
    battery: BatteryStatus,
    dark: Option<Vec<f64>>,
    reference: Option<Vec<f64>>,
    event_sender: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl<T: Transport> SpectrometerSession<T> {
    pub fn new(transport: T, settings: Settings) -> Self {
        let engine = AcquisitionEngine::from_settings(&settings.acquisition);
        let laser = LaserState {
            mode: settings.laser.mode,
            watchdog_sec: settings.laser.watchdog_sec,
            laser_delay_ms: settings.laser.laser_delay_ms,
            ..LaserState::default()
        };
        Self {
            transport,
            settings,
            engine,
            calibration: None,
            laser,
            battery: BatteryStatus::new(),
            dark: None,
            reference: None,
            event_sender: None,
        }
    }

    /// Forward session events to `sender`
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.event_sender = Some(sender);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn calibration(&self) -> Option<&CalibrationRecord> {
        self.calibration.as_ref()
    }

    pub fn laser_state(&self) -> LaserState {
        self.laser
    }

    pub fn battery(&self) -> &BatteryStatus {
        &self.battery
    }

    pub fn engine(&self) -> &AcquisitionEngine {
        &self.engine
    }

    pub fn dark(&self) -> Option<&[f64]> {
        self.dark.as_deref()
    }

    fn send_event(&self, event: SessionEvent) {
        if let Some(sender) = &self.event_sender {
            let _ = sender.send(event);
        }
    }

    fn send_log(&self, message: impl Into<String>, severity: MessageSeverity) {
        self.send_event(SessionEvent::LogMessage(StatusMessage {
            message: message.into(),
            severity,
        }));
    }

    /// Read the calibration and battery after the link comes up
    pub async fn initialize(&mut self) -> Result<&CalibrationRecord, SessionError> {
        self.send_event(SessionEvent::ConnectionStatus(ConnectionStatus::Connecting));
        let loaded = self.read_eeprom().await.map(|_| ());
        if let Err(e) = loaded {
            self.send_event(SessionEvent::ConnectionStatus(ConnectionStatus::Error));
            return Err(e);
        }
        self.update_battery().await;
        self.send_event(SessionEvent::ConnectionStatus(ConnectionStatus::Connected));
        self.calibration.as_ref().ok_or(SessionError::NotCalibrated)
    }

    /// Read all EEPROM pages subpage by subpage and decode them.
    ///
    /// A failure anywhere leaves the previous calibration in place.
    pub async fn read_eeprom(&mut self) -> Result<&CalibrationRecord, SessionError> {
        let mut pages = vec![[0u8; PAGE_SIZE]; PAGE_COUNT];

        for (page, buffer) in pages.iter_mut().enumerate() {
            for subpage in 0..EEPROM_SUBPAGES {
                write_checked(
                    &mut self.transport,
                    Characteristic::EepromCmd,
                    &[page as u8, subpage as u8],
                )
                .await?;
                let data = self
                    .transport
                    .read_characteristic(Characteristic::EepromData)
                    .await?;
                if data.len() < EEPROM_SUBPAGE_SIZE {
                    error!(
                        "EEPROM page {} subpage {}: {} bytes",
                        page,
                        subpage,
                        data.len()
                    );
                    return Err(TransportError::ReadFailed(
                        Characteristic::EepromData,
                        format!("short subpage ({} bytes)", data.len()),
                    )
                    .into());
                }
                let start = subpage * EEPROM_SUBPAGE_SIZE;
                buffer[start..start + EEPROM_SUBPAGE_SIZE]
                    .copy_from_slice(&data[..EEPROM_SUBPAGE_SIZE]);
            }
            debug!("EEPROM page {} read", page);
        }

        let mut record = CalibrationRecord::decode(&pages).map_err(|e| {
            error!("EEPROM decode failed: {}", e);
            self.send_log(format!("EEPROM decode failed: {}", e), MessageSeverity::Error);
            e
        })?;
        if let Some((start, end)) = self.settings.roi_override() {
            record.set_roi_horizontal(start, end);
        }

        info!(
            "Calibration loaded: {} {} (format {}, {} pixels)",
            record.model, record.serial_number, record.format, record.active_pixels_horiz
        );
        self.send_log(
            format!("Connected to {} {}", record.model, record.serial_number),
            MessageSeverity::Success,
        );
        Ok(self.calibration.insert(record))
    }

    /// Apply a horizontal ROI to the loaded calibration
    pub fn set_roi_override(&mut self, start: u16, end: u16) -> Result<(), SessionError> {
        let record = self.calibration.as_mut().ok_or(SessionError::NotCalibrated)?;
        record.set_roi_horizontal(start, end);
        Ok(())
    }

    /// Poll the battery characteristic. Returns whether a reading was
    /// accepted; on failure the previous reading is kept.
    pub async fn update_battery(&mut self) -> bool {
        let data = match self
            .transport
            .read_characteristic(Characteristic::BatteryStatus)
            .await
        {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("Battery read failed: {}", e);
                None
            }
        };
        let accepted = self.battery.parse(data.as_deref());
        if accepted {
            self.send_event(SessionEvent::BatteryUpdated {
                level: self.battery.level(),
                charging: self.battery.is_charging(),
            });
        }
        accepted
    }

    /// The laser may only fire on a calibrated unit that has one. Units with
    /// a battery also need a fresh reading above the configured minimum.
    pub fn laser_available(&self) -> bool {
        let Some(calibration) = self.calibration.as_ref() else {
            return false;
        };
        if !calibration.has_laser {
            return false;
        }
        !calibration.has_battery
            || self
                .battery
                .fresh_level()
                .is_some_and(|level| level >= self.settings.laser.min_battery_level)
    }

    /// Validate the current laser state and write it to the device.
    ///
    /// A state that fails validation is reset to the safe defaults and
    /// nothing is written.
    pub async fn push_laser_state(&mut self) -> Result<(), SessionError> {
        let payload = self.laser.serialize();
        if let Err(e) = LaserState::parse(&payload) {
            error!("Refusing laser payload {:02X?}: {}", payload, e);
            self.laser.reset();
            self.send_event(SessionEvent::LaserStateChanged(self.laser));
            return Err(e.into());
        }
        write_checked(&mut self.transport, Characteristic::LaserState, &payload).await?;
        debug!("Laser state pushed: {:02X?}", payload);
        self.send_event(SessionEvent::LaserStateChanged(self.laser));
        Ok(())
    }

    /// Change the laser state and push it. A refused write restores the
    /// previous state.
    pub async fn update_laser<F>(&mut self, change: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut LaserState),
    {
        let previous = self.laser;
        change(&mut self.laser);
        match self.push_laser_state().await {
            Err(SessionError::Transport(e)) => {
                warn!("Laser update not applied, restoring previous state");
                self.laser = previous;
                Err(e.into())
            }
            other => other,
        }
    }

    pub async fn set_laser_enabled(&mut self, enabled: bool) -> Result<(), SessionError> {
        if enabled && !self.laser_available() {
            let level = self.battery.fresh_level();
            warn!("Laser enable refused (battery {})", fmt_level(&level));
            self.send_log("Laser unavailable: battery low or unknown", MessageSeverity::Warning);
            return Err(SessionError::LaserUnavailable { level });
        }
        self.update_laser(|laser| laser.enabled = enabled).await?;
        info!("Laser {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    pub async fn set_laser_mode(&mut self, mode: LaserMode) -> Result<(), SessionError> {
        self.update_laser(|laser| laser.mode = mode).await
    }

    pub async fn set_laser_watchdog(&mut self, watchdog_sec: u8) -> Result<(), SessionError> {
        self.update_laser(|laser| laser.watchdog_sec = watchdog_sec).await
    }

    pub fn stage_integration_time_ms(&mut self, ms: u32) -> u32 {
        self.engine.stage_integration_time_ms(ms)
    }

    pub fn stage_gain_db(&mut self, db: f32) -> Result<(), SessionError> {
        self.engine
            .stage_gain_db(db)
            .map_err(|e| SessionError::Acquisition(e.into()))
    }

    pub fn set_scans_to_average(&mut self, scans: u32) {
        self.engine.set_scans_to_average(scans);
    }

    pub async fn commit_parameters(&mut self) -> Result<(), SessionError> {
        self.engine.commit_parameters(&mut self.transport).await?;
        Ok(())
    }

    fn pixel_count(&self) -> Result<usize, SessionError> {
        self.calibration
            .as_ref()
            .map(|c| c.active_pixels_horiz as usize)
            .ok_or(SessionError::NotCalibrated)
    }

    async fn acquire_spectrum(&mut self) -> Result<Vec<f64>, SessionError> {
        let pixel_count = self.pixel_count()?;
        let sender = self.event_sender.clone();
        let result = self
            .engine
            .acquire(&mut self.transport, pixel_count, |fraction| {
                if let Some(sender) = &sender {
                    let _ = sender.send(SessionEvent::AcquisitionProgress(fraction));
                }
            })
            .await;
        result.map_err(|e| {
            self.send_log(format!("Acquisition failed: {}", e), MessageSeverity::Error);
            e.into()
        })
    }

    /// Acquire and store a dark spectrum for subtraction
    pub async fn acquire_dark(&mut self) -> Result<Vec<f64>, SessionError> {
        let dark = self.acquire_spectrum().await?;
        info!("Dark stored ({} pixels)", dark.len());
        self.dark = Some(dark.clone());
        Ok(dark)
    }

    pub fn clear_dark(&mut self) {
        self.dark = None;
    }

    /// Reference spectrum attached to later measurements
    pub fn set_reference(&mut self, reference: Option<Vec<f64>>) {
        self.reference = reference;
    }

    /// Acquire a spectrum and build a calibrated measurement from it
    pub async fn acquire_measurement(&mut self) -> Result<Measurement, SessionError> {
        let raw = self.acquire_spectrum().await?;
        let calibration = self.calibration.as_ref().ok_or(SessionError::NotCalibrated)?;

        let dark = if self.settings.dark_subtraction {
            self.dark.clone()
        } else {
            None
        };
        let mut measurement = Measurement::build(raw.len(), raw, dark, calibration);
        if self.settings.average_alternating_pixels {
            measurement.average_alternating();
        }
        measurement.set_reference(self.reference.clone());

        info!("Measurement {} complete", measurement.id);
        self.send_log(
            format!("Measurement {} complete", measurement.id),
            MessageSeverity::Success,
        );
        Ok(measurement)
    }
}
