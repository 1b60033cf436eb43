//! Device implementations

pub mod ads1115;
pub mod mock;
#[cfg(feature = "rpi")]
pub mod rpi_gpio;
pub mod system_power;

use crate::config::{AppConfig, DeviceKind};
use crate::core::driver::{AdcDriver, GpioDriver, PowerControl};
use crate::error::Result;

/// Hardware handles, opened once at startup
pub struct Devices {
    pub adc: Box<dyn AdcDriver>,
    pub gpio: Box<dyn GpioDriver>,
    pub power: Box<dyn PowerControl>,
}

/// Open the back end selected by `config.device.kind` (or the mock if forced)
pub fn create_devices(config: &AppConfig, force_mock: bool) -> Result<Devices> {
    let kind = if force_mock {
        DeviceKind::Mock
    } else {
        config.device.kind
    };
    match kind {
        DeviceKind::Rpi => open_rpi(config),
        DeviceKind::Mock => {
            log::info!(
                "Mock device: {:.2} V/cell, discharging at {} V/s",
                config.mock.start_cell_voltage,
                config.mock.discharge_volts_per_sec
            );
            Ok(Devices {
                adc: Box::new(mock::SimulatedPack::new(config.mock.clone())),
                gpio: Box::new(mock::MockGpio::new()),
                power: Box::new(mock::MockPower::new()),
            })
        }
    }
}

#[cfg(feature = "rpi")]
fn open_rpi(config: &AppConfig) -> Result<Devices> {
    let adc = ads1115::open_rpi(&config.adc)?;
    let gpio = rpi_gpio::RpiGpio::new()?;
    Ok(Devices {
        adc: Box::new(adc),
        gpio: Box::new(gpio),
        power: Box::new(system_power::SystemPower::new(&config.power)),
    })
}

#[cfg(not(feature = "rpi"))]
fn open_rpi(_config: &AppConfig) -> Result<Devices> {
    Err(crate::error::Error::Config(
        "device kind \"rpi\" needs the `rpi` feature (or run with --mock)".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_devices() {
        let mut devices = create_devices(&AppConfig::default(), true).unwrap();
        let v = devices
            .adc
            .read_voltage(crate::core::types::CellChannel::Cell1)
            .unwrap();
        assert!(v > 4.0 && v < 4.3);
    }

    #[cfg(not(feature = "rpi"))]
    #[test]
    fn test_rpi_without_feature() {
        assert!(create_devices(&AppConfig::default(), false).is_err());
    }
}
