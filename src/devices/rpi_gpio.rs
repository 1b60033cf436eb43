//! BCM GPIO on a Raspberry Pi via rppal

use crate::core::driver::{EdgeCallback, GpioDriver};
use crate::core::types::Level;
use crate::error::{Error, Result};
use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};
use std::collections::HashMap;
use std::time::Duration;

/// LED outputs and the off-button input.
///
/// Output pins are claimed lazily on first write and start low. Input pins
/// keep their async interrupt alive for as long as this handle exists.
pub struct RpiGpio {
    gpio: Gpio,
    outputs: HashMap<u8, OutputPin>,
    inputs: Vec<InputPin>,
}

impl RpiGpio {
    pub fn new() -> Result<Self> {
        let gpio = Gpio::new()?;
        log::debug!("GPIO: opened BCM controller");
        Ok(Self {
            gpio,
            outputs: HashMap::new(),
            inputs: Vec::new(),
        })
    }
}

impl GpioDriver for RpiGpio {
    fn set_output(&mut self, pin: u8, level: Level) -> Result<()> {
        if !self.outputs.contains_key(&pin) {
            let output = self.gpio.get(pin)?.into_output_low();
            self.outputs.insert(pin, output);
        }
        let Some(output) = self.outputs.get_mut(&pin) else {
            return Err(Error::hardware("gpio", format!("pin {} not claimed", pin)));
        };
        match level {
            Level::High => output.set_high(),
            Level::Low => output.set_low(),
        }
        Ok(())
    }

    fn register_falling_edge(
        &mut self,
        pin: u8,
        debounce: Duration,
        mut callback: EdgeCallback,
    ) -> Result<()> {
        // Button pulls the line to ground
        let mut input = self.gpio.get(pin)?.into_input_pullup();
        input
            .set_async_interrupt(Trigger::FallingEdge, Some(debounce), move |_event| {
                callback()
            })
            .map_err(|e| Error::Interrupt {
                pin,
                message: e.to_string(),
            })?;
        log::info!(
            "GPIO: falling-edge interrupt on BCM {} ({} ms debounce)",
            pin,
            debounce.as_millis()
        );
        self.inputs.push(input);
        Ok(())
    }
}
