//! Simulated discharging two-cell pack

use super::noise::ReadNoise;
use crate::config::MockConfig;
use crate::core::driver::AdcDriver;
use crate::core::types::CellChannel;
use crate::error::Result;
use std::time::{Duration, Instant};

/// ADC back end that discharges linearly from `start_cell_voltage`, with
/// Gaussian read noise. Cell 2 drains `cell_imbalance` faster than cell 1.
pub struct SimulatedPack {
    config: MockConfig,
    noise: ReadNoise,
    started: Instant,
}

impl SimulatedPack {
    pub fn new(config: MockConfig) -> Self {
        let noise = ReadNoise::new(config.noise_stddev, config.random_seed);
        Self {
            config,
            noise,
            started: Instant::now(),
        }
    }

    /// Noise-free cell voltage after `elapsed`
    pub fn ideal_voltage(&self, channel: CellChannel, elapsed: Duration) -> f32 {
        let rate = match channel {
            CellChannel::Cell1 => self.config.discharge_volts_per_sec,
            CellChannel::Cell2 => {
                self.config.discharge_volts_per_sec * (1.0 + self.config.cell_imbalance)
            }
        };
        (self.config.start_cell_voltage - rate * elapsed.as_secs_f32()).max(0.0)
    }

    fn read_at(&mut self, channel: CellChannel, elapsed: Duration) -> f32 {
        let ideal = self.ideal_voltage(channel, elapsed);
        (ideal + self.noise.next_volts()).max(0.0)
    }
}

impl AdcDriver for SimulatedPack {
    fn read_voltage(&mut self, channel: CellChannel) -> Result<f32> {
        let elapsed = self.started.elapsed();
        Ok(self.read_at(channel, elapsed))
    }
}
