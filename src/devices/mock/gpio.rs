//! In-memory GPIO for tests and hardware-free runs

use crate::core::driver::{EdgeCallback, GpioDriver};
use crate::core::types::Level;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct EdgeHandler {
    debounce: Duration,
    last_edge: Option<Instant>,
    callback: Arc<Mutex<EdgeCallback>>,
}

#[derive(Default)]
struct MockGpioInner {
    levels: HashMap<u8, Level>,
    writes: usize,
    fail_writes: bool,
    handlers: HashMap<u8, EdgeHandler>,
}

/// GPIO that records output levels and lets callers inject button edges.
///
/// Clones share state.
#[derive(Clone, Default)]
pub struct MockGpio {
    inner: Arc<Mutex<MockGpioInner>>,
}

impl MockGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last level written to `pin`, if any
    pub fn level(&self, pin: u8) -> Option<Level> {
        self.inner.lock().levels.get(&pin).copied()
    }

    /// Pins currently driven high
    pub fn high_pins(&self) -> Vec<u8> {
        let inner = self.inner.lock();
        let mut pins: Vec<u8> = inner
            .levels
            .iter()
            .filter(|(_, level)| **level == Level::High)
            .map(|(pin, _)| *pin)
            .collect();
        pins.sort_unstable();
        pins
    }

    /// Total number of output writes
    pub fn writes(&self) -> usize {
        self.inner.lock().writes
    }

    /// Make every following write fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// True if an edge handler is registered on `pin`
    pub fn has_interrupt(&self, pin: u8) -> bool {
        self.inner.lock().handlers.contains_key(&pin)
    }

    /// Simulate a falling edge on `pin` at `at`.
    ///
    /// Returns false if no handler is registered or the edge falls inside the
    /// debounce window of the previous accepted edge. The callback runs on the
    /// calling thread, outside the GPIO lock.
    pub fn falling_edge_at(&self, pin: u8, at: Instant) -> bool {
        let callback = {
            let mut inner = self.inner.lock();
            let Some(handler) = inner.handlers.get_mut(&pin) else {
                return false;
            };
            if let Some(last) = handler.last_edge
                && at.saturating_duration_since(last) < handler.debounce
            {
                log::trace!("Mock GPIO: edge on pin {} suppressed by debounce", pin);
                return false;
            }
            handler.last_edge = Some(at);
            Arc::clone(&handler.callback)
        };
        let mut callback = callback.lock();
        (*callback)();
        true
    }

    /// Simulate a falling edge on `pin` now
    pub fn press(&self, pin: u8) -> bool {
        self.falling_edge_at(pin, Instant::now())
    }
}

impl GpioDriver for MockGpio {
    fn set_output(&mut self, pin: u8, level: Level) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(Error::hardware("mock-gpio", format!("write to pin {} failed", pin)));
        }
        inner.writes += 1;
        if inner.levels.insert(pin, level) != Some(level) {
            log::trace!("Mock GPIO: pin {} -> {:?}", pin, level);
        }
        Ok(())
    }

    fn register_falling_edge(
        &mut self,
        pin: u8,
        debounce: Duration,
        callback: EdgeCallback,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.handlers.contains_key(&pin) {
            return Err(Error::Interrupt {
                pin,
                message: "interrupt already registered".to_string(),
            });
        }
        inner.handlers.insert(
            pin,
            EdgeHandler {
                debounce,
                last_edge: None,
                callback: Arc::new(Mutex::new(callback)),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_records_levels() {
        let mut gpio = MockGpio::new();
        gpio.set_output(3, Level::High).unwrap();
        gpio.set_output(2, Level::Low).unwrap();
        assert_eq!(gpio.level(3), Some(Level::High));
        assert_eq!(gpio.level(2), Some(Level::Low));
        assert_eq!(gpio.level(1), None);
        assert_eq!(gpio.high_pins(), vec![3]);
        assert_eq!(gpio.writes(), 2);
    }

    #[test]
    fn test_debounce_suppresses_bounces() {
        let mut gpio = MockGpio::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        gpio.register_falling_edge(
            4,
            Duration::from_millis(100),
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        let t0 = Instant::now();
        assert!(gpio.falling_edge_at(4, t0));
        assert!(!gpio.falling_edge_at(4, t0 + Duration::from_millis(20)));
        assert!(!gpio.falling_edge_at(4, t0 + Duration::from_millis(99)));
        assert!(gpio.falling_edge_at(4, t0 + Duration::from_millis(150)));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_edge_without_handler_is_ignored() {
        let gpio = MockGpio::new();
        assert!(!gpio.press(4));
    }

    #[test]
    fn test_double_registration_fails() {
        let mut gpio = MockGpio::new();
        gpio.register_falling_edge(4, Duration::ZERO, Box::new(|| {}))
            .unwrap();
        assert!(matches!(
            gpio.register_falling_edge(4, Duration::ZERO, Box::new(|| {})),
            Err(Error::Interrupt { pin: 4, .. })
        ));
    }

    #[test]
    fn test_failed_writes() {
        let mut gpio = MockGpio::new();
        gpio.set_fail_writes(true);
        assert!(gpio.set_output(1, Level::High).is_err());
        assert_eq!(gpio.writes(), 0);
    }
}
