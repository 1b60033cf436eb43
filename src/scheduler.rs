//! Polling scheduler: sense, estimate, check, report, display
//!
//! One tick, in order:
//!
//! 1. sample both cells
//! 2. sum to the pack voltage
//! 3. at or below the cutoff, request a halt (the tick still completes: the OS
//!    takes the process down on its own schedule)
//! 4. log the status line (pack voltage and charge estimate)
//! 5. drive the LEDs
//!
//! Ticks never overlap. The next deadline is one period after the previous
//! one; a tick that overruns its period starts the next one immediately.

use crate::core::types::{CellReadings, IndicatorState};
use crate::error::Result;
use crate::indicator::Indicator;
use crate::model::ChargeCurve;
use crate::safety::{SafetyController, ShutdownOutcome};
use crate::sampler::VoltageSampler;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Longest single sleep between `running` checks
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Everything one tick observed and did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub readings: CellReadings,
    pub pack_voltage: f32,
    /// Model output, unclamped: may leave [0, 100] outside the calibration range
    pub charge_percent: f32,
    pub state: IndicatorState,
    pub critical: bool,
    /// Set when this tick asked for a shutdown
    pub shutdown: Option<ShutdownOutcome>,
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pack {:.2} V ({:.3} + {:.3}) | {:.1}% | {}",
            self.pack_voltage,
            self.readings.cell1,
            self.readings.cell2,
            self.charge_percent.clamp(0.0, 100.0),
            self.state
        )?;
        if let Some(outcome) = self.shutdown {
            write!(f, " | CRITICAL: {}", outcome)?;
        }
        Ok(())
    }
}

/// Fixed-rate control loop
pub struct Scheduler {
    sampler: VoltageSampler,
    model: ChargeCurve,
    indicator: Indicator,
    safety: Arc<SafetyController>,
    period: Duration,
    running: Arc<AtomicBool>,
    ticks: u64,
    faults: u64,
}

impl Scheduler {
    pub fn new(
        sampler: VoltageSampler,
        model: ChargeCurve,
        indicator: Indicator,
        safety: Arc<SafetyController>,
        period: Duration,
    ) -> Self {
        Self {
            sampler,
            model,
            indicator,
            safety,
            period,
            running: Arc::new(AtomicBool::new(true)),
            ticks: 0,
            faults: 0,
        }
    }

    /// Flag that keeps [`run`](Self::run) looping; clear it to stop
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Ticks started
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Ticks abandoned on a hardware fault
    pub fn faults(&self) -> u64 {
        self.faults
    }

    /// Run one cycle. A sampler or LED fault ends the tick with an error.
    pub fn tick(&mut self) -> Result<TickReport> {
        self.ticks += 1;

        let readings = self.sampler.sample()?;
        let pack_voltage = readings.pack_voltage();

        let critical = self.safety.check_critical(pack_voltage);
        let shutdown = if critical {
            log::warn!(
                "Pack at {:.2} V, at or below the {:.2} V cutoff",
                pack_voltage,
                self.safety.critical_voltage()
            );
            Some(self.safety.request_shutdown())
        } else {
            None
        };

        let charge_percent = self.model.estimate_pack(readings.cell1, readings.cell2);
        if !self.model.in_calibration_range(readings.cell1)
            || !self.model.in_calibration_range(readings.cell2)
        {
            log::debug!("Cell voltage outside calibration range, charge is extrapolated");
        }
        log::info!(
            "Pack {:.2} V ({:.3} + {:.3}) | {:.1}%",
            pack_voltage,
            readings.cell1,
            readings.cell2,
            charge_percent.clamp(0.0, 100.0)
        );

        let state = self.indicator.update(pack_voltage)?;
        Ok(TickReport {
            readings,
            pack_voltage,
            charge_percent,
            state,
            critical,
            shutdown,
        })
    }

    /// Tick at the configured rate until the running flag is cleared.
    ///
    /// Tick-local faults are logged and the loop carries on; anything else ends
    /// it. LEDs are switched off on the way out.
    pub fn run(&mut self) -> Result<()> {
        log::info!(
            "Polling every {} ms (critical at {:.2} V)",
            self.period.as_millis(),
            self.safety.critical_voltage()
        );

        let mut deadline = Instant::now();
        let result = loop {
            if !self.running.load(Ordering::Relaxed) {
                break Ok(());
            }

            match self.tick() {
                Ok(_) => {}
                Err(e) if e.is_tick_local() => {
                    self.faults += 1;
                    log::error!("Tick {} skipped: {}", self.ticks, e);
                }
                Err(e) => break Err(e),
            }

            deadline += self.period;
            let now = Instant::now();
            if deadline <= now {
                log::warn!("Tick {} overran its {:?} period", self.ticks, self.period);
                deadline = now;
                continue;
            }
            self.sleep_until(deadline);
        };

        log::info!(
            "Polling stopped after {} ticks ({} faulted)",
            self.ticks,
            self.faults
        );
        if let Err(e) = self.indicator.all_off() {
            log::warn!("Could not switch LEDs off: {}", e);
        }
        result
    }

    fn sleep_until(&self, deadline: Instant) {
        loop {
            if !self.running.load(Ordering::Relaxed) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep((deadline - now).min(STOP_POLL_INTERVAL));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndicatorConfig;
    use crate::devices::mock::{MockAdc, MockGpio, MockPower};
    use crate::indicator::LedPins;
    use crate::model::{CalibrationPoint, ChargeCurve};
    use crate::safety::PowerAction;
    use approx::assert_relative_eq;

    const PINS: LedPins = LedPins {
        red: 1,
        yellow: 2,
        green: 3,
    };

    struct Rig {
        scheduler: Scheduler,
        adc: MockAdc,
        gpio: MockGpio,
        power: MockPower,
    }

    fn rig(cell1: f32, cell2: f32) -> Rig {
        let adc = MockAdc::new(cell1, cell2);
        let gpio = MockGpio::new();
        let power = MockPower::new();
        let table: Vec<CalibrationPoint> = [(6.0, 0.0), (7.0, 50.0), (8.5, 100.0)]
            .into_iter()
            .map(CalibrationPoint::from)
            .collect();
        let model = ChargeCurve::fit(&table, 2).unwrap();
        let scheduler = Scheduler::new(
            VoltageSampler::new(Box::new(adc.clone())),
            model,
            Indicator::new(Box::new(gpio.clone()), PINS, &IndicatorConfig::default()),
            Arc::new(SafetyController::new(Box::new(power.clone()), 6.7)),
            Duration::from_millis(10),
        );
        Rig {
            scheduler,
            adc,
            gpio,
            power,
        }
    }

    #[test]
    fn test_tick_low_pack() {
        let mut rig = rig(4.2, 4.2);
        let report = rig.scheduler.tick().unwrap();
        assert_relative_eq!(report.pack_voltage, 8.4);
        assert_eq!(report.state, IndicatorState::Low);
        assert!(!report.critical);
        assert_eq!(report.shutdown, None);
        assert_eq!(rig.gpio.high_pins(), vec![2]);
        assert_eq!(rig.power.total_calls(), 0);
    }

    #[test]
    fn test_critical_tick_halts_once_and_still_displays() {
        let mut rig = rig(3.3, 3.3);
        let first = rig.scheduler.tick().unwrap();
        assert!(first.critical);
        assert_eq!(
            first.shutdown,
            Some(ShutdownOutcome::Issued(PowerAction::Halt))
        );
        assert_eq!(first.state, IndicatorState::Critical);
        assert_eq!(rig.gpio.high_pins(), vec![1]);

        let second = rig.scheduler.tick().unwrap();
        assert_eq!(second.shutdown, Some(ShutdownOutcome::AlreadyRequested));
        assert_eq!(rig.power.halts(), 1);
    }

    #[test]
    fn test_red_led_before_cutoff() {
        // 6.8 V: red LED lit, no shutdown yet
        let mut rig = rig(3.4, 3.4);
        let report = rig.scheduler.tick().unwrap();
        assert_eq!(report.state, IndicatorState::Critical);
        assert!(!report.critical);
        assert_eq!(rig.power.total_calls(), 0);
    }

    #[test]
    fn test_faulted_tick_leaves_leds_untouched() {
        let mut rig = rig(4.3, 4.3);
        rig.scheduler.tick().unwrap();
        let writes = rig.gpio.writes();
        rig.adc.fail_next(1);
        assert!(rig.scheduler.tick().is_err());
        assert_eq!(rig.gpio.writes(), writes);
        assert_eq!(rig.gpio.high_pins(), vec![3]);
    }

    #[test]
    fn test_run_survives_faults_and_stops_on_flag() {
        let mut rig = rig(4.3, 4.3);
        rig.adc.fail_next(2);
        let running = rig.scheduler.running_flag();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            running.store(false, Ordering::Relaxed);
        });
        rig.scheduler.run().unwrap();
        stopper.join().unwrap();

        assert!(rig.scheduler.ticks() > 2);
        assert_eq!(rig.scheduler.faults(), 2);
        assert!(rig.gpio.high_pins().is_empty());
    }

    #[test]
    fn test_report_display_clamps_charge() {
        let report = TickReport {
            readings: CellReadings::new(4.2, 4.2),
            pack_voltage: 8.4,
            charge_percent: -123.6,
            state: IndicatorState::Low,
            critical: false,
            shutdown: None,
        };
        assert_eq!(report.to_string(), "Pack 8.40 V (4.200 + 4.200) | 0.0% | LOW");
    }
}
