//! Scripted ADC for tests

use crate::core::driver::AdcDriver;
use crate::core::types::CellChannel;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// ADC returning fixed, externally settable cell voltages.
///
/// Clones share state, so a test keeps one handle while the sampler owns another.
#[derive(Clone, Default)]
pub struct MockAdc {
    inner: Arc<Mutex<MockAdcInner>>,
}

#[derive(Default)]
struct MockAdcInner {
    cell1: f32,
    cell2: f32,
    /// Number of upcoming reads that fail with a bus fault
    failures: u32,
    reads: u32,
}

impl MockAdc {
    pub fn new(cell1: f32, cell2: f32) -> Self {
        let adc = Self::default();
        adc.set_cells(cell1, cell2);
        adc
    }

    /// Change the voltages returned by subsequent reads
    pub fn set_cells(&self, cell1: f32, cell2: f32) {
        let mut inner = self.inner.lock();
        inner.cell1 = cell1;
        inner.cell2 = cell2;
    }

    /// Make the next `count` reads fail
    pub fn fail_next(&self, count: u32) {
        self.inner.lock().failures = count;
    }

    /// Total read attempts, failed ones included
    pub fn reads(&self) -> u32 {
        self.inner.lock().reads
    }
}

impl AdcDriver for MockAdc {
    fn read_voltage(&mut self, channel: CellChannel) -> Result<f32> {
        let mut inner = self.inner.lock();
        inner.reads += 1;
        if inner.failures > 0 {
            inner.failures -= 1;
            return Err(Error::hardware("mock-adc", format!("{} read NAK", channel)));
        }
        Ok(match channel {
            CellChannel::Cell1 => inner.cell1,
            CellChannel::Cell2 => inner.cell2,
        })
    }
}
