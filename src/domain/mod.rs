pub mod battery;
pub mod calibration;
pub mod eeprom;
pub mod laser;
pub mod measurement;
pub mod models;
pub mod settings;
