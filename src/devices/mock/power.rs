//! Power control that records requests instead of acting on them

use crate::core::driver::PowerControl;
use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct MockPowerInner {
    halts: AtomicUsize,
    reboots: AtomicUsize,
    /// Upcoming calls to reject
    failures: AtomicU32,
    /// Artificial latency per call (ms), widens race windows in tests
    latency_ms: AtomicU32,
}

/// Host power stand-in: counts halt and reboot calls.
///
/// Used by tests and by the `mock` device so a desktop run never shuts the
/// machine down. Clones share counters.
#[derive(Clone, Default)]
pub struct MockPower {
    inner: Arc<MockPowerInner>,
}

impl MockPower {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` calls
    pub fn fail_next(&self, count: u32) {
        self.inner.failures.store(count, Ordering::SeqCst);
    }

    /// Sleep this long inside every call
    pub fn set_latency(&self, latency: Duration) {
        self.inner
            .latency_ms
            .store(latency.as_millis() as u32, Ordering::SeqCst);
    }

    /// Halt calls received (failed ones included)
    pub fn halts(&self) -> usize {
        self.inner.halts.load(Ordering::SeqCst)
    }

    /// Reboot calls received (failed ones included)
    pub fn reboots(&self) -> usize {
        self.inner.reboots.load(Ordering::SeqCst)
    }

    /// All privileged calls received
    pub fn total_calls(&self) -> usize {
        self.halts() + self.reboots()
    }

    fn call(&self, action: &'static str) -> Result<()> {
        let latency = self.inner.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            thread::sleep(Duration::from_millis(latency as u64));
        }
        let rejected = self
            .inner
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(Error::PrivilegedAction {
                action,
                message: "mock rejection".to_string(),
            });
        }
        log::warn!("Mock power: host {} requested (not performed)", action);
        Ok(())
    }
}

impl PowerControl for MockPower {
    fn halt_now(&self) -> Result<()> {
        self.inner.halts.fetch_add(1, Ordering::SeqCst);
        self.call("halt")
    }

    fn reboot_now(&self) -> Result<()> {
        self.inner.reboots.fetch_add(1, Ordering::SeqCst);
        self.call("reboot")
    }
}
