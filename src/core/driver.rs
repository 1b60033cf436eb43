//! Driver traits for hardware abstraction
//!
//! The controller never touches hardware directly. Each back end (Raspberry Pi,
//! simulated pack) implements these three traits, and the handles are built once
//! at startup and passed into the components that own them.

use crate::core::types::{CellChannel, Level};
use crate::error::Result;
use std::time::Duration;

/// Callback fired by a GPIO driver on a falling edge.
///
/// Runs on the driver's interrupt thread, never on the polling loop.
pub type EdgeCallback = Box<dyn FnMut() + Send + 'static>;

/// Analog front end for the two cell taps
pub trait AdcDriver: Send {
    /// Read the instantaneous voltage of one cell, in volts.
    ///
    /// Cell 2 is measured differentially against cell 1's tap; implementations
    /// resolve that to the absolute voltage across cell 2 before returning.
    fn read_voltage(&mut self, channel: CellChannel) -> Result<f32>;
}

/// Digital outputs (LEDs) and the shutdown button input
pub trait GpioDriver: Send {
    /// Drive an output pin high or low
    fn set_output(&mut self, pin: u8, level: Level) -> Result<()>;

    /// Register a falling-edge interrupt on an input pin.
    ///
    /// Edges closer together than `debounce` are suppressed by the driver. The
    /// registration lives as long as the driver handle.
    fn register_falling_edge(
        &mut self,
        pin: u8,
        debounce: Duration,
        callback: EdgeCallback,
    ) -> Result<()>;
}

/// Privileged host power actions.
///
/// Both calls are fire-and-forget: on success the host is going down and the
/// process may be killed at any point afterwards.
pub trait PowerControl: Send + Sync {
    /// Ask the OS to halt
    fn halt_now(&self) -> Result<()>;

    /// Ask the OS to reboot
    fn reboot_now(&self) -> Result<()>;
}
