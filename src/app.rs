//! Application wiring for the urja-eps daemon
//!
//! Fits the charge curve, builds the safety controller, hooks the off button
//! to it, then hands the remaining hardware to the polling scheduler.

use crate::config::AppConfig;
use crate::devices::Devices;
use crate::error::Result;
use crate::indicator::{Indicator, LedPins};
use crate::model::ChargeCurve;
use crate::safety::SafetyController;
use crate::sampler::VoltageSampler;
use crate::scheduler::{Scheduler, TickReport};
use log::{debug, info};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Main application structure that owns every component
pub struct EpsApp {
    scheduler: Scheduler,
    safety: Arc<SafetyController>,
}

impl EpsApp {
    /// Build the controller on already opened devices.
    ///
    /// Fails if the calibration table cannot be fitted or the button interrupt
    /// cannot be registered; the loop never starts with either missing.
    pub fn new(config: &AppConfig, devices: Devices) -> Result<Self> {
        let Devices { adc, mut gpio, power } = devices;

        let model = ChargeCurve::fit(&config.model.calibration, config.model.degree)?;
        let (min_v, max_v) = model.calibration_range();
        info!(
            "Charge curve: degree {} over {} points, {:.2}-{:.2} V/cell ({:.1}% .. {:.1}%)",
            model.degree(),
            config.model.calibration.len(),
            min_v,
            max_v,
            model.estimate(min_v),
            model.estimate(max_v)
        );
        debug!("Charge curve coefficients: {:?}", model.coefficients());

        let safety = Arc::new(
            SafetyController::new(power, config.safety.critical_voltage)
                .with_button_action(config.button.action.into())
                .with_retry(config.power.retry_policy()),
        );

        let button_safety = Arc::clone(&safety);
        gpio.register_falling_edge(
            config.pins.off_button,
            config.button.debounce(),
            Box::new(move || {
                let outcome = button_safety.on_button_press();
                info!("Off button: {}", outcome);
            }),
        )?;
        info!(
            "Off button on BCM {} ({:?}, {} ms debounce)",
            config.pins.off_button, config.button.action, config.button.debounce_ms
        );

        let indicator = Indicator::new(gpio, LedPins::from(&config.pins), &config.indicator);
        let sampler = VoltageSampler::new(adc).with_retry(config.sampling.retry_policy());
        let scheduler = Scheduler::new(
            sampler,
            model,
            indicator,
            Arc::clone(&safety),
            config.sampling.period(),
        );

        info!("✓ Controller initialized");
        Ok(Self { scheduler, safety })
    }

    /// Poll until the running flag is cleared
    pub fn run(&mut self) -> Result<()> {
        self.scheduler.run()
    }

    /// Run a single tick (`--once`)
    pub fn tick_once(&mut self) -> Result<TickReport> {
        self.scheduler.tick()
    }

    /// Clear to stop [`run`](Self::run)
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.scheduler.running_flag()
    }

    pub fn safety(&self) -> &Arc<SafetyController> {
        &self.safety
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}
