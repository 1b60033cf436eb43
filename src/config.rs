//! Configuration for urja-eps
//!
//! Loaded once at startup from a TOML file. Every field has a default, so a
//! partial file (or no file at all) yields the reference setup: 2 Hz sampling,
//! 6.7 V hard cutoff, LED breakpoints at 8.4 V and 6.9 V, degree-8 curve over a
//! single-cell LiPo table, LEDs on BCM 1/2/3 and the off button on BCM 4.
//!
//! ```toml
//! [device]
//! kind = "rpi"            # or "mock"
//!
//! [sampling]
//! frequency_hz = 2.0
//!
//! [safety]
//! critical_voltage = 6.7
//!
//! [indicator]
//! normal_above = 8.4
//! low_above = 6.9
//!
//! [model]
//! degree = 8
//! calibration = [
//!     { voltage = 3.27, percent = 0.0 },
//!     { voltage = 4.20, percent = 100.0 },
//! ]
//! ```

use crate::core::retry::RetryPolicy;
use crate::devices::ads1115::protocol;
use crate::error::{Error, Result};
use crate::model::{self, CalibrationPoint};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub sampling: SamplingConfig,
    pub safety: SafetyConfig,
    pub indicator: IndicatorConfig,
    pub model: ModelConfig,
    pub adc: AdcConfig,
    pub pins: PinConfig,
    pub button: ButtonConfig,
    pub power: PowerConfig,
    pub logging: LoggingConfig,
    pub mock: MockConfig,
}

/// Which hardware back end to drive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// ADS1115 + BCM GPIO on a Raspberry Pi (feature `rpi`)
    #[default]
    Rpi,
    /// Simulated discharging pack
    Mock,
}

/// Device selection
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub kind: DeviceKind,
}

/// Polling loop
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Ticks per second
    pub frequency_hz: f32,
    /// Extra ADC read attempts per cell before the tick is abandoned (0 = none)
    pub read_retries: u32,
    /// Delay before the first read retry, doubled for each further one
    pub retry_backoff_ms: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 2.0,
            read_retries: 0,
            retry_backoff_ms: 20,
        }
    }
}

impl SamplingConfig {
    /// Time between tick starts
    pub fn period(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.frequency_hz)
    }

    /// Retry policy for ADC reads
    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = Duration::from_millis(self.retry_backoff_ms);
        RetryPolicy::new(self.read_retries, backoff, self.period().max(backoff))
    }
}

/// Hard cutoff
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Pack voltage at or below which the host is halted (V)
    pub critical_voltage: f32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            critical_voltage: 6.7,
        }
    }
}

/// LED breakpoints on the pack voltage
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Green strictly above this (V)
    pub normal_above: f32,
    /// Yellow strictly above this and up to `normal_above`, red at or below (V)
    pub low_above: f32,
    /// Band a rising voltage must clear before the LED improves (V, 0 = off)
    pub hysteresis_volts: f32,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            normal_above: 8.4,
            low_above: 6.9,
            hysteresis_volts: 0.0,
        }
    }
}

/// Charge curve fit
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Polynomial degree
    pub degree: usize,
    /// Single-cell (voltage, percent) calibration points
    pub calibration: Vec<CalibrationPoint>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            degree: model::DEFAULT_DEGREE,
            calibration: model::lipo_1s_calibration(),
        }
    }
}

/// Input pair of a differential ADS1115 measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct InputPair {
    /// Positive input (AIN0-3)
    pub positive: u8,
    /// Negative input (AIN0-3)
    pub negative: u8,
}

/// ADS1115 on the I2C bus
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdcConfig {
    /// I2C bus number (`/dev/i2c-N`)
    pub i2c_bus: u8,
    /// 7-bit slave address
    pub address: u16,
    /// PGA full-scale range (V): 6.144, 4.096, 2.048, 1.024, 0.512 or 0.256
    pub full_scale_volts: f32,
    /// Conversion rate (samples/s): 8, 16, 32, 64, 128, 250, 475 or 860
    pub data_rate_sps: u16,
    /// Inputs across cell 1
    pub cell1: InputPair,
    /// Inputs across cell 2
    pub cell2: InputPair,
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            i2c_bus: 1,
            address: 0x48,
            full_scale_volts: 6.144,
            data_rate_sps: 128,
            cell1: InputPair {
                positive: 0,
                negative: 1,
            },
            cell2: InputPair {
                positive: 1,
                negative: 2,
            },
        }
    }
}

/// BCM pin numbers
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PinConfig {
    pub red_led: u8,
    pub yellow_led: u8,
    pub green_led: u8,
    pub off_button: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            red_led: 1,
            yellow_led: 2,
            green_led: 3,
            off_button: 4,
        }
    }
}

/// What a button press does
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonAction {
    #[default]
    Halt,
    Reboot,
}

/// Off button
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ButtonConfig {
    /// Edges closer than this are ignored (ms)
    pub debounce_ms: u64,
    pub action: ButtonAction,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            action: ButtonAction::Halt,
        }
    }
}

impl ButtonConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Host shutdown/reboot commands
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PowerConfig {
    /// Program and arguments that halt the host
    pub halt_command: Vec<String>,
    /// Program and arguments that reboot the host
    pub reboot_command: Vec<String>,
    /// Extra attempts if the OS rejects the request
    pub retry_attempts: u32,
    /// Delay before the first retry, doubled each time (ms)
    pub retry_backoff_ms: u64,
    /// Upper bound on the retry delay (ms)
    pub max_backoff_ms: u64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            halt_command: ["/usr/bin/sudo", "/sbin/shutdown", "-h", "now"]
                .map(String::from)
                .to_vec(),
            reboot_command: ["/usr/bin/sudo", "/sbin/shutdown", "-r", "now"]
                .map(String::from)
                .to_vec(),
            retry_attempts: 3,
            retry_backoff_ms: 1000,
            max_backoff_ms: 8000,
        }
    }
}

impl PowerConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Simulated pack used by the `mock` device
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MockConfig {
    /// Cell voltage at startup (V)
    pub start_cell_voltage: f32,
    /// Linear discharge rate per cell (V/s)
    pub discharge_volts_per_sec: f32,
    /// How much faster cell 2 discharges than cell 1 (fraction)
    pub cell_imbalance: f32,
    /// Gaussian read noise (V)
    pub noise_stddev: f32,
    /// Noise seed (0 = random each run)
    pub random_seed: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            start_cell_voltage: 4.2,
            discharge_volts_per_sec: 0.01,
            cell_imbalance: 0.0,
            noise_stddev: 0.002,
            random_seed: 42,
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use urja_eps::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("urja-eps.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject configurations the controller cannot run safely with.
    ///
    /// The calibration table itself is checked when the curve is fitted.
    pub fn validate(&self) -> Result<()> {
        let hz = self.sampling.frequency_hz;
        if !(hz.is_finite() && hz > 0.0 && hz <= 1000.0) {
            return Err(Error::Config(format!(
                "sampling.frequency_hz must be in (0, 1000], got {}",
                hz
            )));
        }

        let critical = self.safety.critical_voltage;
        let low = self.indicator.low_above;
        let normal = self.indicator.normal_above;
        if ![critical, low, normal].iter().all(|v| v.is_finite() && *v > 0.0) {
            return Err(Error::Config(
                "voltage thresholds must be positive and finite".to_string(),
            ));
        }
        if low >= normal {
            return Err(Error::Config(format!(
                "indicator.low_above ({}) must be below indicator.normal_above ({})",
                low, normal
            )));
        }
        if critical > low {
            return Err(Error::Config(format!(
                "safety.critical_voltage ({}) must not exceed indicator.low_above ({})",
                critical, low
            )));
        }
        let band = self.indicator.hysteresis_volts;
        if !(band.is_finite() && band >= 0.0 && band < normal - low) {
            return Err(Error::Config(format!(
                "indicator.hysteresis_volts must be in [0, {}), got {}",
                normal - low,
                band
            )));
        }

        if self.model.degree == 0 {
            return Err(Error::Config("model.degree must be at least 1".to_string()));
        }
        if self.model.calibration.is_empty() {
            return Err(Error::Config("model.calibration is empty".to_string()));
        }

        protocol::pga_code(self.adc.full_scale_volts)?;
        protocol::data_rate_code(self.adc.data_rate_sps)?;
        for (name, pair) in [("cell1", self.adc.cell1), ("cell2", self.adc.cell2)] {
            if pair.positive > 3 || pair.negative > 3 || pair.positive == pair.negative {
                return Err(Error::Config(format!(
                    "adc.{} must name two different inputs in 0..=3",
                    name
                )));
            }
        }

        let pins = [
            self.pins.red_led,
            self.pins.yellow_led,
            self.pins.green_led,
            self.pins.off_button,
        ];
        for (i, pin) in pins.iter().enumerate() {
            if pins[i + 1..].contains(pin) {
                return Err(Error::Config(format!("pin {} assigned twice", pin)));
            }
        }

        if self.power.halt_command.is_empty() || self.power.reboot_command.is_empty() {
            return Err(Error::Config(
                "power.halt_command and power.reboot_command must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
