//! Core abstractions for the controller.
//!
//! - [`driver`]: Traits the ADC, GPIO and host power back ends implement
//! - [`types`]: Readings, levels, indicator states and per-tick reports
//! - [`retry`]: Bounded exponential backoff shared by the sampler and the safety controller

pub mod driver;
pub mod retry;
pub mod types;
