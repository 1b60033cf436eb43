//! ADS1115 16-bit ADC driver
//!
//! Each cell is read with one single-shot conversion (or two, for input pairs
//! the MUX cannot select directly, see [`protocol::plan`]). The driver is
//! generic over [`RegisterBus`] so the conversion sequence can be exercised
//! without an I2C adapter; on a Raspberry Pi the bus is `rppal::i2c::I2c`.

pub mod protocol;

use crate::config::AdcConfig;
use crate::core::driver::AdcDriver;
use crate::core::types::CellChannel;
use crate::error::{Error, Result};
use protocol::{Conversion, Measurement};
use std::thread;
use std::time::Duration;

/// Polls of the OS bit before a conversion is declared lost
const MAX_READY_POLLS: u32 = 10;
const READY_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// 16-bit register access on the ADC's bus
pub trait RegisterBus: Send {
    fn write_register(&mut self, register: u8, value: u16) -> Result<()>;
    fn read_register(&mut self, register: u8) -> Result<u16>;
}

/// ADS1115 reading both cells of the pack
pub struct Ads1115<B: RegisterBus> {
    bus: B,
    pga: u8,
    data_rate: u8,
    full_scale_volts: f32,
    conversion_time: Duration,
    cell1: Measurement,
    cell2: Measurement,
}

impl<B: RegisterBus> Ads1115<B> {
    pub fn new(bus: B, config: &AdcConfig) -> Result<Self> {
        let pga = protocol::pga_code(config.full_scale_volts)?;
        let data_rate = protocol::data_rate_code(config.data_rate_sps)?;
        let cell1 = protocol::plan(config.cell1.positive, config.cell1.negative)?;
        let cell2 = protocol::plan(config.cell2.positive, config.cell2.negative)?;
        // One sample period plus margin for the internal oscillator
        let conversion_time =
            Duration::from_micros(1_000_000 / config.data_rate_sps as u64 + 500);

        log::info!(
            "ADS1115: ±{} V range, {} SPS, cell1 {:?}, cell2 {:?}",
            config.full_scale_volts,
            config.data_rate_sps,
            cell1,
            cell2
        );

        Ok(Self {
            bus,
            pga,
            data_rate,
            full_scale_volts: config.full_scale_volts,
            conversion_time,
            cell1,
            cell2,
        })
    }

    fn convert(&mut self, conversion: Conversion) -> Result<f32> {
        let config = protocol::single_shot_config(conversion.mux, self.pga, self.data_rate);
        self.bus.write_register(protocol::REG_CONFIG, config)?;
        thread::sleep(self.conversion_time);

        let mut polls = 0;
        while self.bus.read_register(protocol::REG_CONFIG)? & protocol::CONFIG_OS == 0 {
            polls += 1;
            if polls >= MAX_READY_POLLS {
                return Err(Error::hardware(
                    "ads1115",
                    format!("conversion on mux {} never completed", conversion.mux),
                ));
            }
            thread::sleep(READY_POLL_INTERVAL);
        }

        let raw = self.bus.read_register(protocol::REG_CONVERSION)?;
        if protocol::is_saturated(raw) {
            log::warn!(
                "ADS1115: mux {} saturated at ±{} V, reading is clipped",
                conversion.mux,
                self.full_scale_volts
            );
        }
        let volts = protocol::raw_to_volts(raw, self.full_scale_volts);
        Ok(if conversion.negate { -volts } else { volts })
    }

    fn measure(&mut self, measurement: Measurement) -> Result<f32> {
        match measurement {
            Measurement::Direct(conversion) => self.convert(conversion),
            Measurement::Difference(first, second) => {
                let a = self.convert(first)?;
                let b = self.convert(second)?;
                Ok(a - b)
            }
        }
    }
}

impl<B: RegisterBus> AdcDriver for Ads1115<B> {
    fn read_voltage(&mut self, channel: CellChannel) -> Result<f32> {
        let measurement = match channel {
            CellChannel::Cell1 => self.cell1,
            CellChannel::Cell2 => self.cell2,
        };
        self.measure(measurement)
    }
}

#[cfg(feature = "rpi")]
impl RegisterBus for rppal::i2c::I2c {
    fn write_register(&mut self, register: u8, value: u16) -> Result<()> {
        let [hi, lo] = value.to_be_bytes();
        self.write(&[register, hi, lo])?;
        Ok(())
    }

    fn read_register(&mut self, register: u8) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.write_read(&[register], &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }
}

/// Open the ADS1115 on the configured Raspberry Pi I2C bus
#[cfg(feature = "rpi")]
pub fn open_rpi(config: &AdcConfig) -> Result<Ads1115<rppal::i2c::I2c>> {
    let mut i2c = rppal::i2c::I2c::with_bus(config.i2c_bus)?;
    i2c.set_slave_address(config.address)?;
    log::info!(
        "Opened /dev/i2c-{} (ADS1115 at {:#04x})",
        config.i2c_bus,
        config.address
    );
    Ads1115::new(i2c, config)
}
