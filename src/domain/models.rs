use crate::domain::laser::LaserState;

/// Notifications a session pushes to its observer (UI, logger, exporter)
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ConnectionStatus(ConnectionStatus),
    LogMessage(StatusMessage),
    /// Fraction of pixels read so far, across all averaged scans
    AcquisitionProgress(f64),
    BatteryUpdated { level: f32, charging: bool },
    LaserStateChanged(LaserState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}
