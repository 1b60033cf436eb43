//! Seedable Gaussian read noise for the simulated pack

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, Normal};

/// ADC read noise: zero-mean Gaussian with a fixed standard deviation
pub struct ReadNoise {
    rng: SmallRng,
    /// `None` when the configured deviation is zero (or unusable)
    distribution: Option<Normal<f32>>,
}

impl ReadNoise {
    /// Seed 0 draws from entropy; any other seed repeats the same sequence.
    pub fn new(stddev_volts: f32, seed: u64) -> Self {
        let rng = match seed {
            0 => SmallRng::from_entropy(),
            seed => SmallRng::seed_from_u64(seed),
        };
        let distribution = if stddev_volts > 0.0 {
            Normal::new(0.0, stddev_volts).ok()
        } else {
            None
        };
        Self { rng, distribution }
    }

    /// Next noise sample (V)
    pub fn next_volts(&mut self) -> f32 {
        match &self.distribution {
            Some(normal) => normal.sample(&mut self.rng),
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = ReadNoise::new(0.01, 42);
        let mut b = ReadNoise::new(0.01, 42);
        for _ in 0..100 {
            assert_eq!(a.next_volts(), b.next_volts());
        }
    }

    #[test]
    fn test_zero_stddev_is_silent() {
        let mut noise = ReadNoise::new(0.0, 42);
        assert!((0..10).all(|_| noise.next_volts() == 0.0));
    }

    #[test]
    fn test_spread_matches_stddev() {
        let mut noise = ReadNoise::new(0.01, 9);
        let n = 20_000;
        let samples: Vec<f32> = (0..n).map(|_| noise.next_volts()).collect();
        let mean = samples.iter().sum::<f32>() / n as f32;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n as f32;
        assert!(mean.abs() < 0.001);
        assert!((var.sqrt() - 0.01).abs() < 0.001);
    }
}
