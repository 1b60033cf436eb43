//! Voltage sampler: both cell voltages per tick

use crate::core::driver::AdcDriver;
use crate::core::retry::RetryPolicy;
use crate::core::types::{CellChannel, CellReadings};
use crate::error::{Error, Result};

/// Reads cell 1 and cell 2 from the ADC.
///
/// A failed or implausible read is never replaced with a default voltage. With
/// a retry policy the read is repeated; once attempts run out the error goes
/// to the caller and the tick is abandoned.
pub struct VoltageSampler {
    adc: Box<dyn AdcDriver>,
    retry: RetryPolicy,
}

impl VoltageSampler {
    pub fn new(adc: Box<dyn AdcDriver>) -> Self {
        Self {
            adc,
            retry: RetryPolicy::NONE,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sample both cells, cell 1 first
    pub fn sample(&mut self) -> Result<CellReadings> {
        let cell1 = self.read_cell(CellChannel::Cell1)?;
        let cell2 = self.read_cell(CellChannel::Cell2)?;
        Ok(CellReadings::new(cell1, cell2))
    }

    fn read_cell(&mut self, channel: CellChannel) -> Result<f32> {
        let adc = &mut self.adc;
        let retries = self.retry.retries;
        self.retry.run(
            || {
                let value = adc.read_voltage(channel)?;
                if !value.is_finite() || value < 0.0 {
                    return Err(Error::InvalidReading {
                        channel: channel.to_string(),
                        value,
                    });
                }
                Ok(value)
            },
            |attempt, e| {
                if attempt <= retries {
                    log::warn!(
                        "{} read failed (attempt {}/{}): {}",
                        channel,
                        attempt,
                        retries + 1,
                        e
                    );
                }
            },
        )
    }
}
