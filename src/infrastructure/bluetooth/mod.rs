//! Bluetooth Module
//!
//! Talks to a SiG spectrometer over its GATT service.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  SpectrometerSession                     │
//! │  (per-connection coordinator - public API)               │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌─────────────┐ ┌───────────┐ ┌──────────┐
//! │ Acquisition │ │ Transport │ │ Protocol │
//! │             │ │           │ │          │
//! │ - Params    │ │ - GATT    │ │ - UUIDs  │
//! │ - Retry     │ │   reads/  │ │ - Framing│
//! │ - Averaging │ │   writes  │ │ - CRC    │
//! └─────────────┘ └───────────┘ └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Characteristic definitions, byte packing and packet framing
//! - [`parse_data`] - Fixed-width field readers
//! - [`crc`] - Packet checksums
//! - [`transport`] - The GATT access trait
//! - [`acquisition`] - Chunked spectrum read-back with retry and averaging
//! - [`service`] - Session coordinator
//! - [`mock`] - Simulated spectrometer

pub mod acquisition;
pub mod crc;
pub mod mock;
pub mod parse_data;
pub mod protocol;
pub mod service;
pub mod transport;

// Re-export main service for convenience
pub use service::{SessionError, SpectrometerSession};
