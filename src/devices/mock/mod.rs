//! Hardware-free back ends
//!
//! | Component | Stand-in |
//! |-----------|----------|
//! | ADS1115 | [`SimulatedPack`] (discharging pack with read noise) or [`MockAdc`] (scripted) |
//! | GPIO | [`MockGpio`] (records LED levels, injectable button edges with debounce) |
//! | Host power | [`MockPower`] (counts halt/reboot calls, optional rejection/latency) |
//!
//! The `mock` device kind wires `SimulatedPack`, `MockGpio` and `MockPower`
//! together so the whole loop runs on a workstation.
//!
//! ```toml
//! [device]
//! kind = "mock"
//!
//! [mock]
//! start_cell_voltage = 4.2
//! discharge_volts_per_sec = 0.05   # reaches the cutoff in about a minute
//! noise_stddev = 0.002
//! random_seed = 42                 # 0 = random each run
//! ```

mod adc;
mod gpio;
mod noise;
mod pack;
mod power;

pub use adc::MockAdc;
pub use gpio::MockGpio;
pub use pack::SimulatedPack;
pub use power::MockPower;
