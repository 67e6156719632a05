use anyhow::Context;
use sig_spectrometer::domain::eeprom::EepromImage;
use sig_spectrometer::domain::models::{MessageSeverity, SessionEvent};
use sig_spectrometer::domain::settings::SettingsService;
use sig_spectrometer::infrastructure::bluetooth::mock::SimulatedSpectrometer;
use sig_spectrometer::infrastructure::logging;
use sig_spectrometer::SpectrometerSession;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Rows printed from the finished measurement
const PREVIEW_ROWS: usize = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new().context("Failed to load settings")?;

    let _logging_guard = logging::init_logger(&settings_service.get().log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!(
        "Starting SiG spectrometer session (settings: {})",
        settings_service.path().display()
    );

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let observer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                SessionEvent::LogMessage(msg) => match msg.severity {
                    MessageSeverity::Error => error!("{}", msg.message),
                    MessageSeverity::Warning => warn!("{}", msg.message),
                    _ => info!("{}", msg.message),
                },
                SessionEvent::ConnectionStatus(status) => info!("Connection: {:?}", status),
                SessionEvent::BatteryUpdated { level, charging } => {
                    info!("Battery {:.0}%{}", level, if charging { " (charging)" } else { "" })
                }
                SessionEvent::LaserStateChanged(state) => info!("Laser: {:?}", state),
                SessionEvent::AcquisitionProgress(_) => {}
            }
        }
    });

    let mut device = SimulatedSpectrometer::new(&EepromImage::sample(9, "WP-00887", 1952));
    // flat dark at the synthetic baseline
    device.queue_spectrum(vec![1000; device.pixel_count()]);
    let mut session =
        SpectrometerSession::new(device, settings_service.get().clone()).with_events(event_tx);

    let calibration = session.initialize().await.context("Failed to read calibration")?;
    println!("Calibration:");
    for (name, value) in calibration.viewable_fields() {
        println!("  {:<32} {}", name, value);
    }
    println!("Battery: {}", session.battery());

    session.commit_parameters().await?;
    session.acquire_dark().await.context("Dark acquisition failed")?;

    session.set_laser_enabled(true).await?;
    let measurement = session.acquire_measurement().await;
    session.set_laser_enabled(false).await?;
    let measurement = measurement.context("Measurement failed")?;

    println!("Measurement {}:", measurement.id);
    println!(
        "  {:>6} {:>10} {:>10} {:>10} {:>10}",
        "pixel", "nm", "cm-1", "raw", "processed"
    );
    for row in measurement.rows().iter().take(PREVIEW_ROWS) {
        println!(
            "  {:>6} {:>10.2} {:>10.2} {:>10.1} {:>10.1}",
            row.pixel,
            row.wavelength,
            row.wavenumber.unwrap_or(0.0),
            row.raw,
            row.processed
        );
    }

    drop(session);
    observer.await?;
    Ok(())
}
