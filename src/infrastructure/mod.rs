pub mod bluetooth;
pub mod logging;
