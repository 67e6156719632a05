//! Spectrum Acquisition
//!
//! Drives one (optionally scan-averaged) spectrum out of the device:
//!
//! ```text
//! commit parameters ─► for each scan:
//!                        acquire trigger ─► wait integration time
//!                        ─► loop { request offset ─► read packet ─► validate }
//!                        ─► pixel fixups ─► accumulate
//!                      ─► divide by scan count
//! ```
//!
//! A rejected packet (malformed, NACK, duplicate) is retried with backoff.
//! The first retry of a scan waits for several throwaway integrations since
//! the sensor usually needs warm-up frames discarded; later retries back off
//! exponentially.

use crate::domain::calibration::{self, GainError};
use crate::domain::settings::AcquisitionSettings;
use crate::infrastructure::bluetooth::parse_data;
use crate::infrastructure::bluetooth::protocol::{
    self, to_ble_data, Characteristic, PacketRejection,
};
use crate::infrastructure::bluetooth::transport::{write_checked, Transport, TransportError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

pub const MIN_INTEGRATION_TIME_MS: u32 = 3;
pub const MAX_INTEGRATION_TIME_MS: u32 = 5000;

/// Leading pixels that are unreliable on every scan
const BAD_LEADING_PIXELS: usize = 4;

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("acquisition already in progress")]
    Busy,
    #[error("no pixels to acquire")]
    NoPixels,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Gain(#[from] GainError),
    #[error("acquisition failed at pixel {pixel} after {retries} retries: {reason}")]
    AcquisitionFailed {
        pixel: usize,
        retries: u32,
        reason: String,
    },
}

/// Retry and averaging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionConfig {
    pub scans_to_average: u32,
    pub max_retries: u32,
    pub throwaway_spectra: u32,
    pub backoff_base_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self::from(&AcquisitionSettings::default())
    }
}

impl From<&AcquisitionSettings> for AcquisitionConfig {
    fn from(s: &AcquisitionSettings) -> Self {
        Self {
            scans_to_average: s.scans_to_average.max(1),
            max_retries: s.max_retries,
            throwaway_spectra: s.throwaway_spectra,
            backoff_base_ms: s.backoff_base_ms,
        }
    }
}

/// Counters from the most recent acquisition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub scans: u32,
    pub packets: u32,
    pub retries: u32,
}

/// Clears the in-flight flag when the acquisition ends, even if the future
/// is dropped part way through
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct AcquisitionEngine {
    config: AcquisitionConfig,
    staged_integration_time_ms: u32,
    staged_gain_db: f32,
    pushed_integration_time_ms: Option<u32>,
    pushed_gain_db: Option<f32>,
    acquiring: Arc<AtomicBool>,
    // Checksum of the last accepted packet. Kept across triggers so a stale
    // buffer re-delivered after a new trigger is still caught
    last_crc: Option<u16>,
    stats: AcquisitionStats,
}

impl AcquisitionEngine {
    pub fn new(config: AcquisitionConfig) -> Self {
        Self {
            config,
            staged_integration_time_ms: MIN_INTEGRATION_TIME_MS,
            staged_gain_db: 8.0,
            pushed_integration_time_ms: None,
            pushed_gain_db: None,
            acquiring: Arc::new(AtomicBool::new(false)),
            last_crc: None,
            stats: AcquisitionStats::default(),
        }
    }

    pub fn from_settings(settings: &AcquisitionSettings) -> Self {
        let mut engine = Self::new(AcquisitionConfig::from(settings));
        engine.stage_integration_time_ms(settings.integration_time_ms);
        if let Err(e) = engine.stage_gain_db(settings.gain_db) {
            warn!("Ignoring configured gain: {}", e);
        }
        engine
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn set_scans_to_average(&mut self, scans: u32) {
        self.config.scans_to_average = scans.max(1);
    }

    /// Whether an acquisition is in flight.
    ///
    /// This is a plain flag, not a lock: callers are expected to serialize
    /// their own acquisitions and parameter changes.
    pub fn is_acquiring(&self) -> bool {
        self.acquiring.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.stats
    }

    pub fn integration_time_ms(&self) -> u32 {
        self.staged_integration_time_ms
    }

    pub fn gain_db(&self) -> f32 {
        self.staged_gain_db
    }

    /// Stage an integration time for the next commit, clamped to [3, 5000] ms.
    /// Returns the value that will be pushed.
    pub fn stage_integration_time_ms(&mut self, ms: u32) -> u32 {
        let clamped = ms.clamp(MIN_INTEGRATION_TIME_MS, MAX_INTEGRATION_TIME_MS);
        if clamped != ms {
            warn!("Integration time {} ms clamped to {} ms", ms, clamped);
        }
        self.staged_integration_time_ms = clamped;
        clamped
    }

    /// Stage a gain for the next commit. Out-of-range values are rejected
    /// and the staged value is left unchanged.
    pub fn stage_gain_db(&mut self, db: f32) -> Result<(), GainError> {
        calibration::encode_gain_db(db)?;
        self.staged_gain_db = db;
        Ok(())
    }

    /// Push staged parameters that differ from what the device already has
    pub async fn commit_parameters<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<(), AcquisitionError> {
        let ms = self.staged_integration_time_ms;
        if self.pushed_integration_time_ms != Some(ms) {
            let payload = to_ble_data::uint_be(ms as u64, 2);
            write_checked(transport, Characteristic::IntegrationTime, &payload).await?;
            self.pushed_integration_time_ms = Some(ms);
            info!("Integration time set to {} ms", ms);
        }

        let db = self.staged_gain_db;
        if self.pushed_gain_db != Some(db) {
            let [msb, lsb] = calibration::encode_gain_db(db)?;
            let payload = to_ble_data::from_bytes(msb, lsb);
            write_checked(transport, Characteristic::Gain, &payload).await?;
            self.pushed_gain_db = Some(db);
            info!("Gain set to {} dB", db);
        }
        Ok(())
    }

    /// Forget what was pushed so the next commit re-sends everything
    /// (after a reconnect, for example)
    pub fn invalidate_pushed(&mut self) {
        self.pushed_integration_time_ms = None;
        self.pushed_gain_db = None;
    }

    /// Acquire one averaged spectrum of `pixel_count` pixels.
    ///
    /// `progress` receives the fraction of pixels read across all scans and
    /// only ever increases.
    pub async fn acquire<T, F>(
        &mut self,
        transport: &mut T,
        pixel_count: usize,
        mut progress: F,
    ) -> Result<Vec<f64>, AcquisitionError>
    where
        T: Transport + ?Sized,
        F: FnMut(f64),
    {
        if pixel_count == 0 {
            return Err(AcquisitionError::NoPixels);
        }
        if self.acquiring.swap(true, Ordering::AcqRel) {
            warn!("Acquisition requested while one is in flight");
            return Err(AcquisitionError::Busy);
        }
        let _in_flight = InFlight(Arc::clone(&self.acquiring));

        self.stats = AcquisitionStats::default();
        self.commit_parameters(transport).await?;

        let scans = self.config.scans_to_average.max(1);
        let total = (pixel_count as f64) * scans as f64;
        let mut sum = vec![0.0; pixel_count];

        for scan in 0..scans {
            let done_before = scan as f64 * pixel_count as f64;
            let spectrum = self
                .acquire_scan(transport, pixel_count, |read| {
                    progress((done_before + read as f64) / total)
                })
                .await?;
            for (acc, v) in sum.iter_mut().zip(&spectrum) {
                *acc += *v as f64;
            }
            self.stats.scans += 1;
            debug!("Scan {}/{} complete", scan + 1, scans);
        }

        let spectrum = average(sum, scans);
        info!(
            "Acquired {} pixels ({} scans, {} packets, {} retries)",
            pixel_count, scans, self.stats.packets, self.stats.retries
        );
        Ok(spectrum)
    }

    async fn acquire_scan<T, F>(
        &mut self,
        transport: &mut T,
        pixel_count: usize,
        mut progress: F,
    ) -> Result<Vec<u16>, AcquisitionError>
    where
        T: Transport + ?Sized,
        F: FnMut(usize),
    {
        let integration_ms = self.staged_integration_time_ms;

        write_checked(
            transport,
            Characteristic::AcquireSpectrum,
            &to_ble_data::from_bool(true),
        )
        .await?;
        sleep(Duration::from_millis(integration_ms as u64)).await;

        let mut spectrum = vec![0u16; pixel_count];
        let mut pixels_read = 0usize;
        let mut retries = 0u32;

        while pixels_read < pixel_count {
            let request = to_ble_data::uint_be(pixels_read as u64, 2);
            write_checked(transport, Characteristic::SpectrumRequest, &request).await?;

            let response = transport
                .read_characteristic(Characteristic::ReadSpectrum)
                .await
                .map_err(|e| {
                    error!("Spectrum read failed at pixel {}: {}", pixels_read, e);
                    e
                })?;

            // A packet that answers the offset just requested is fresh even if
            // its bytes repeat the last one (identical single-packet scans)
            let answers_request = parse_data::to_u16_be(&response, 0) == Some(pixels_read as u16);
            let dedup_against = if answers_request { None } else { self.last_crc };

            let rejection = match protocol::parse_spectrum_packet(&response, dedup_against) {
                Ok(packet) if packet.intensities.is_empty() => {
                    Some(PacketRejection::Malformed(response.len()))
                }
                Ok(packet) => {
                    if packet.first_pixel as usize != pixels_read {
                        warn!(
                            "Packet starts at pixel {} but {} was requested",
                            packet.first_pixel, pixels_read
                        );
                    }
                    self.last_crc = Some(packet.crc);
                    self.stats.packets += 1;

                    let room = pixel_count - pixels_read;
                    let take = packet.intensities.len().min(room);
                    spectrum[pixels_read..pixels_read + take]
                        .copy_from_slice(&packet.intensities[..take]);
                    if packet.intensities.len() > take {
                        debug!(
                            "Ignoring {} trailing pixels in final packet",
                            packet.intensities.len() - take
                        );
                    }
                    pixels_read += take;
                    progress(pixels_read);
                    None
                }
                Err(rejection) => Some(rejection),
            };

            if let Some(rejection) = rejection {
                retries += 1;
                if retries > self.config.max_retries {
                    error!(
                        "Giving up at pixel {} after {} retries ({})",
                        pixels_read, self.config.max_retries, rejection
                    );
                    return Err(AcquisitionError::AcquisitionFailed {
                        pixel: pixels_read,
                        retries: self.config.max_retries,
                        reason: rejection.to_string(),
                    });
                }
                self.stats.retries += 1;
                let delay = self.retry_delay(retries, integration_ms);
                warn!(
                    "Retry {}/{} at pixel {} in {:?}: {}",
                    retries, self.config.max_retries, pixels_read, delay, rejection
                );
                sleep(delay).await;
            }
        }

        apply_pixel_fixups(&mut spectrum);
        Ok(spectrum)
    }

    /// Wait before retry number `retry` (1-based)
    fn retry_delay(&self, retry: u32, integration_ms: u32) -> Duration {
        if retry == 1 {
            Duration::from_millis(integration_ms as u64 * self.config.throwaway_spectra as u64)
        } else {
            Duration::from_millis(self.config.backoff_base_ms.saturating_pow(retry))
        }
    }
}

/// Overwrite the pixels the detector always gets wrong: the first four take
/// the value of pixel 4 and the last takes the second-to-last.
pub fn apply_pixel_fixups<T: Copy>(spectrum: &mut [T]) {
    let n = spectrum.len();
    if n <= BAD_LEADING_PIXELS {
        return;
    }
    let anchor = spectrum[BAD_LEADING_PIXELS];
    spectrum[..BAD_LEADING_PIXELS].fill(anchor);
    spectrum[n - 1] = spectrum[n - 2];
}

/// Divide a pixel-wise sum by the number of scans
pub fn average(mut sum: Vec<f64>, scans: u32) -> Vec<f64> {
    if scans > 1 {
        let n = scans as f64;
        sum.iter_mut().for_each(|v| *v /= n);
    }
    sum
}

/// Pixel-wise mean of several spectra of equal length
pub fn average_spectra(spectra: &[Vec<f64>]) -> Vec<f64> {
    let Some(first) = spectra.first() else {
        return Vec::new();
    };
    let mut sum = vec![0.0; first.len()];
    for spectrum in spectra {
        for (acc, v) in sum.iter_mut().zip(spectrum) {
            *acc += v;
        }
    }
    average(sum, spectra.len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::eeprom::EepromImage;
    use crate::infrastructure::bluetooth::mock::{ReadFault, SimulatedSpectrometer};
    use tokio::time::Instant;

    fn sim(pixels: u16, packet: usize) -> SimulatedSpectrometer {
        SimulatedSpectrometer::new(&EepromImage::sample(9, "SIM-1", pixels)).with_packet_size(packet)
    }

    fn engine(integration_ms: u32) -> AcquisitionEngine {
        let mut engine = AcquisitionEngine::new(AcquisitionConfig::default());
        engine.stage_integration_time_ms(integration_ms);
        engine
    }

    fn ramp(n: u16) -> Vec<u16> {
        (0..n).map(|i| 100 + i * 10).collect()
    }

    #[test]
    fn test_average_spectra() {
        let same = vec![vec![10.0, 20.0, 30.0], vec![10.0, 20.0, 30.0]];
        assert_eq!(average_spectra(&same), vec![10.0, 20.0, 30.0]);

        let diff = vec![vec![10.0, 20.0, 30.0], vec![20.0, 30.0, 40.0]];
        assert_eq!(average_spectra(&diff), vec![15.0, 25.0, 35.0]);

        assert!(average_spectra(&[]).is_empty());
    }

    #[test]
    fn test_pixel_fixups() {
        let mut s = vec![0, 1, 2, 3, 40, 50, 60, 70];
        apply_pixel_fixups(&mut s);
        assert_eq!(s, vec![40, 40, 40, 40, 40, 50, 60, 60]);

        let mut short = vec![1, 2, 3];
        apply_pixel_fixups(&mut short);
        assert_eq!(short, vec![1, 2, 3]);
    }

    #[test]
    fn test_staging() {
        let mut engine = engine(100);
        assert_eq!(engine.stage_integration_time_ms(1), 3);
        assert_eq!(engine.stage_integration_time_ms(60_000), 5000);
        assert!(engine.stage_gain_db(300.0).is_err());
        assert_eq!(engine.gain_db(), 8.0);
        assert!(engine.stage_gain_db(24.5).is_ok());
        assert_eq!(engine.gain_db(), 24.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_acquisition() {
        let mut sim = sim(20, 8);
        sim.queue_spectrum(ramp(20));
        let mut engine = engine(100);

        let mut updates = Vec::new();
        let spectrum = engine
            .acquire(&mut sim, 20, |p| updates.push(p))
            .await
            .unwrap();

        let mut expected: Vec<f64> = ramp(20).into_iter().map(f64::from).collect();
        apply_pixel_fixups(&mut expected);
        assert_eq!(spectrum, expected);
        assert_eq!(engine.stats().packets, 3);
        assert_eq!(engine.stats().retries, 0);
        assert_eq!(updates, vec![0.4, 0.8, 1.0]);
        assert!(!engine.is_acquiring());

        assert_eq!(
            sim.writes_to(Characteristic::SpectrumRequest),
            vec![vec![0, 0], vec![0, 8], vec![0, 16]]
        );
        assert_eq!(sim.writes_to(Characteristic::AcquireSpectrum), vec![vec![1]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_first_packet_retried_once() {
        let mut sim = sim(16, 8);
        let mut engine = engine(50);
        engine.acquire(&mut sim, 16, |_| {}).await.unwrap();

        // the new trigger's first read re-delivers the previous final packet
        sim.inject_faults([Some(ReadFault::Duplicate)]);
        let start = Instant::now();
        let spectrum = engine.acquire(&mut sim, 16, |_| {}).await.unwrap();

        assert_eq!(spectrum.len(), 16);
        assert_eq!(engine.stats().retries, 1);
        assert_eq!(engine.stats().packets, 2);
        assert_eq!(sim.read_count(Characteristic::ReadSpectrum), 2 + 3);
        assert_eq!(start.elapsed(), Duration::from_millis(50 + 300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_packet_retried_once() {
        let mut sim = sim(16, 8);
        sim.queue_spectrum(ramp(16));
        // second read re-delivers the first packet
        sim.inject_faults([None, Some(ReadFault::Duplicate)]);
        let mut engine = engine(50);

        let start = Instant::now();
        let spectrum = engine.acquire(&mut sim, 16, |_| {}).await.unwrap();

        assert_eq!(engine.stats().retries, 1);
        assert_eq!(engine.stats().packets, 2);
        assert_eq!(sim.read_count(Characteristic::ReadSpectrum), 3);
        assert_eq!(spectrum[10], 200.0);
        // integration + first-retry throwaway wait (50 ms x 6)
        assert_eq!(start.elapsed(), Duration::from_millis(50 + 300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let mut sim = sim(16, 8);
        sim.fail_all_reads(ReadFault::Malformed);
        let mut engine = engine(10);

        let start = Instant::now();
        let result = engine.acquire(&mut sim, 16, |_| {}).await;

        match result {
            Err(AcquisitionError::AcquisitionFailed { pixel, retries, .. }) => {
                assert_eq!(pixel, 0);
                assert_eq!(retries, 4);
            }
            other => panic!("expected AcquisitionFailed, got {:?}", other),
        }
        assert_eq!(engine.stats().retries, 4);
        assert_eq!(sim.read_count(Characteristic::ReadSpectrum), 5);
        assert!(!engine.is_acquiring());
        // 10 + 60 + 25 + 125 + 625
        assert_eq!(start.elapsed(), Duration::from_millis(845));
    }

    #[tokio::test(start_paused = true)]
    async fn test_nack_then_recovery() {
        let mut sim = sim(16, 16);
        sim.queue_spectrum(ramp(16));
        sim.inject_faults([Some(ReadFault::Nack), Some(ReadFault::Nack)]);
        let mut engine = engine(10);

        let spectrum = engine.acquire(&mut sim, 16, |_| {}).await.unwrap();
        assert_eq!(spectrum.len(), 16);
        assert_eq!(engine.stats().retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_loss_aborts() {
        let mut sim = sim(16, 8);
        sim.inject_faults([Some(ReadFault::LinkLoss)]);
        let mut engine = engine(10);

        let result = engine.acquire(&mut sim, 16, |_| {}).await;
        assert!(matches!(
            result,
            Err(AcquisitionError::Transport(TransportError::Disconnected))
        ));
        assert!(!engine.is_acquiring());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_averaging() {
        let mut sim = sim(8, 8);
        sim.queue_spectrum(vec![10; 8]);
        sim.queue_spectrum(vec![20; 8]);
        let mut engine = engine(10);
        engine.set_scans_to_average(2);

        let mut updates = Vec::new();
        let spectrum = engine
            .acquire(&mut sim, 8, |p| updates.push(p))
            .await
            .unwrap();
        assert_eq!(spectrum, vec![15.0; 8]);
        assert_eq!(updates, vec![0.5, 1.0]);
        assert_eq!(engine.stats().scans, 2);
        assert_eq!(sim.writes_to(Characteristic::AcquireSpectrum).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_averages_two_scans() {
        let mut sim = sim(3, 8);
        sim.queue_spectrum(vec![10, 20, 30]);
        sim.queue_spectrum(vec![20, 30, 40]);
        let mut engine = engine(10);
        engine.set_scans_to_average(2);

        let spectrum = engine.acquire(&mut sim, 3, |_| {}).await.unwrap();
        assert_eq!(spectrum, vec![15.0, 25.0, 35.0]);
        assert_eq!(engine.stats().retries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_single_packet_scans_unchanged() {
        let mut sim = sim(3, 8);
        sim.queue_spectrum(vec![10, 20, 30]);
        sim.queue_spectrum(vec![10, 20, 30]);
        let mut engine = engine(10);
        engine.set_scans_to_average(2);

        let spectrum = engine.acquire(&mut sim, 3, |_| {}).await.unwrap();
        assert_eq!(spectrum, vec![10.0, 20.0, 30.0]);
        assert_eq!(engine.stats().retries, 0);
        assert_eq!(sim.read_count(Characteristic::ReadSpectrum), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_flat_acquisitions() {
        let mut sim = sim(64, 90);
        sim.queue_spectrum(vec![0; 64]);
        sim.queue_spectrum(vec![0; 64]);
        let mut engine = engine(10);

        assert_eq!(engine.acquire(&mut sim, 64, |_| {}).await.unwrap(), vec![0.0; 64]);
        assert_eq!(engine.acquire(&mut sim, 64, |_| {}).await.unwrap(), vec![0.0; 64]);
        assert_eq!(engine.stats().retries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_sub_scan_aborts_average() {
        let mut sim = sim(8, 8);
        sim.queue_spectrum(vec![10; 8]);
        sim.inject_faults([None, Some(ReadFault::LinkLoss)]);
        let mut engine = engine(10);
        engine.set_scans_to_average(3);

        assert!(engine.acquire(&mut sim, 8, |_| {}).await.is_err());
        assert_eq!(engine.stats().scans, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_pixels_ignored() {
        let mut sim = sim(12, 8);
        sim.queue_spectrum(ramp(16));
        let mut engine = engine(10);

        let spectrum = engine.acquire(&mut sim, 12, |_| {}).await.unwrap();
        assert_eq!(spectrum.len(), 12);
        assert_eq!(spectrum[10], 200.0);
        assert_eq!(spectrum[11], 200.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parameters_pushed_once() {
        let mut sim = sim(8, 4);
        let mut engine = engine(100);
        engine.stage_gain_db(24.5).unwrap();

        engine.acquire(&mut sim, 8, |_| {}).await.unwrap();
        engine.acquire(&mut sim, 8, |_| {}).await.unwrap();
        assert_eq!(sim.writes_to(Characteristic::IntegrationTime), vec![vec![0, 100]]);
        assert_eq!(sim.writes_to(Characteristic::Gain), vec![vec![24, 128]]);

        engine.stage_integration_time_ms(200);
        engine.commit_parameters(&mut sim).await.unwrap();
        assert_eq!(
            sim.writes_to(Characteristic::IntegrationTime),
            vec![vec![0, 100], vec![0, 200]]
        );
        assert_eq!(sim.writes_to(Characteristic::Gain).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_write_not_cached() {
        let mut sim = sim(8, 8);
        sim.refuse_writes(Characteristic::Gain);
        let mut engine = engine(100);

        let result = engine.commit_parameters(&mut sim).await;
        assert!(matches!(
            result,
            Err(AcquisitionError::Transport(TransportError::WriteFailed(
                Characteristic::Gain
            )))
        ));
        // integration time went through and is cached; gain will be retried
        engine.commit_parameters(&mut sim).await.ok();
        assert_eq!(sim.writes_to(Characteristic::IntegrationTime).len(), 1);
        assert_eq!(sim.writes_to(Characteristic::Gain).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_flag() {
        let mut sim = sim(8, 8);
        let mut engine = engine(10);
        engine.acquiring.store(true, Ordering::Release);
        assert!(matches!(
            engine.acquire(&mut sim, 8, |_| {}).await,
            Err(AcquisitionError::Busy)
        ));
        assert_eq!(sim.writes_to(Characteristic::AcquireSpectrum).len(), 0);
    }
}
