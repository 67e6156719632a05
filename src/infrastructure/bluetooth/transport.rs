//! GATT Transport
//!
//! The session never talks to a BLE stack directly. It writes and reads
//! named characteristics through this trait; connecting, MTU negotiation and
//! service discovery belong to the implementor.

use crate::infrastructure::bluetooth::protocol::Characteristic;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("write to {0} failed")]
    WriteFailed(Characteristic),
    #[error("read from {0} failed: {1}")]
    ReadFailed(Characteristic, String),
    #[error("read from {0} returned no data")]
    NoData(Characteristic),
    #[error("link lost")]
    Disconnected,
}

/// Characteristic-level access to a connected spectrometer.
///
/// Calls are issued strictly one at a time by the session; implementors do
/// not need to handle concurrent requests.
#[async_trait]
pub trait Transport: Send {
    /// Write a value; `false` means the firmware did not accept the write
    async fn write_characteristic(&mut self, characteristic: Characteristic, data: &[u8]) -> bool;

    /// Read the current value of a characteristic
    async fn read_characteristic(
        &mut self,
        characteristic: Characteristic,
    ) -> Result<Vec<u8>, TransportError>;
}

/// Write helper that turns a refused write into an error
pub async fn write_checked<T: Transport + ?Sized>(
    transport: &mut T,
    characteristic: Characteristic,
    data: &[u8],
) -> Result<(), TransportError> {
    if transport.write_characteristic(characteristic, data).await {
        Ok(())
    } else {
        tracing::error!("Write to {} failed ({:02X?})", characteristic, data);
        Err(TransportError::WriteFailed(characteristic))
    }
}
