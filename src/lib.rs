//! urja-eps - battery monitor and safety shutdown for a two-cell powered SBC
//!
//! Samples both cells through an ADS1115, estimates charge with a fitted
//! polynomial curve, shows the pack state on three LEDs and halts the host
//! before the pack is over-discharged. A push button requests the same halt
//! on demand.
//!
//! ## Features
//!
//! - `rpi`: Raspberry Pi hardware (rppal I2C + GPIO). Without it only the
//!   `mock` device kind is available.

pub mod app;
pub mod config;
pub mod core;
pub mod devices;
pub mod error;
pub mod indicator;
pub mod model;
pub mod safety;
pub mod sampler;
pub mod scheduler;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, Result};
