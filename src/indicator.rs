//! Three-LED status indicator
//!
//! | Pack voltage | State | LED |
//! |--------------|-------|-----|
//! | `v > 8.4` | NORMAL | green |
//! | `6.9 < v <= 8.4` | LOW | yellow |
//! | `v <= 6.9` | CRITICAL | red |
//!
//! Exactly one LED is lit. With the default zero hysteresis the state is a pure
//! function of the current voltage. A non-zero band only delays recovery: a
//! falling voltage switches state at the breakpoint, a rising one must clear
//! the breakpoint by the band first.

use crate::config::{IndicatorConfig, PinConfig};
use crate::core::driver::GpioDriver;
use crate::core::types::{IndicatorState, Level};
use crate::error::Result;

/// Voltage breakpoints between the three states
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoints {
    /// NORMAL strictly above this (V)
    pub normal_above: f32,
    /// LOW strictly above this, CRITICAL at or below (V)
    pub low_above: f32,
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self {
            normal_above: 8.4,
            low_above: 6.9,
        }
    }
}

impl Breakpoints {
    /// State for a pack voltage, no memory
    pub fn select(&self, pack_voltage: f32) -> IndicatorState {
        if pack_voltage > self.normal_above {
            IndicatorState::Normal
        } else if pack_voltage > self.low_above {
            IndicatorState::Low
        } else {
            IndicatorState::Critical
        }
    }

    /// State for a pack voltage given the previously shown state.
    ///
    /// Worse states apply immediately. A better state is only entered once
    /// `pack_voltage - hysteresis` also selects it.
    pub fn select_with_hysteresis(
        &self,
        pack_voltage: f32,
        previous: Option<IndicatorState>,
        hysteresis: f32,
    ) -> IndicatorState {
        let raw = self.select(pack_voltage);
        let Some(previous) = previous else {
            return raw;
        };
        if hysteresis <= 0.0 || raw.severity() >= previous.severity() {
            return raw;
        }
        let cleared = self.select(pack_voltage - hysteresis);
        if cleared.severity() < previous.severity() {
            cleared
        } else {
            previous
        }
    }
}

/// Indicator state for a pack voltage with the reference breakpoints
pub fn select_state(pack_voltage: f32) -> IndicatorState {
    Breakpoints::default().select(pack_voltage)
}

/// Output pins of the three LEDs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedPins {
    pub red: u8,
    pub yellow: u8,
    pub green: u8,
}

impl From<&PinConfig> for LedPins {
    fn from(pins: &PinConfig) -> Self {
        Self {
            red: pins.red_led,
            yellow: pins.yellow_led,
            green: pins.green_led,
        }
    }
}

impl LedPins {
    fn pin_for(&self, state: IndicatorState) -> u8 {
        match state {
            IndicatorState::Normal => self.green,
            IndicatorState::Low => self.yellow,
            IndicatorState::Critical => self.red,
        }
    }
}

/// LED state machine. Owned and written by the polling loop only.
pub struct Indicator {
    gpio: Box<dyn GpioDriver>,
    pins: LedPins,
    breakpoints: Breakpoints,
    hysteresis: f32,
    current: Option<IndicatorState>,
}

impl Indicator {
    pub fn new(gpio: Box<dyn GpioDriver>, pins: LedPins, config: &IndicatorConfig) -> Self {
        Self {
            gpio,
            pins,
            breakpoints: Breakpoints {
                normal_above: config.normal_above,
                low_above: config.low_above,
            },
            hysteresis: config.hysteresis_volts,
            current: None,
        }
    }

    /// Select the state for `pack_voltage` and drive the LEDs to match
    pub fn update(&mut self, pack_voltage: f32) -> Result<IndicatorState> {
        let state =
            self.breakpoints
                .select_with_hysteresis(pack_voltage, self.current, self.hysteresis);
        self.show(state)?;
        Ok(state)
    }

    /// Light the LED for `state` and turn the other two off.
    ///
    /// Off writes go first so two LEDs are never lit together.
    pub fn show(&mut self, state: IndicatorState) -> Result<()> {
        let on = self.pins.pin_for(state);
        for pin in [self.pins.red, self.pins.yellow, self.pins.green] {
            if pin != on {
                self.gpio.set_output(pin, Level::Low)?;
            }
        }
        self.gpio.set_output(on, Level::High)?;

        if self.current != Some(state) {
            log::info!("Indicator: {} ({})", state, state.color());
        }
        self.current = Some(state);
        Ok(())
    }

    /// Turn every LED off (on exit)
    pub fn all_off(&mut self) -> Result<()> {
        for pin in [self.pins.red, self.pins.yellow, self.pins.green] {
            self.gpio.set_output(pin, Level::Low)?;
        }
        self.current = None;
        Ok(())
    }

    /// Last state shown
    pub fn state(&self) -> Option<IndicatorState> {
        self.current
    }
}
