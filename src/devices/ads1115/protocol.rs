//! ADS1115 register map and config-word encoding
//!
//! Config register layout (big-endian, 16 bit):
//!
//! ```text
//!  15  | 14..12 | 11..9 |  8   | 7..5 |  4..0
//!  OS  |  MUX   |  PGA  | MODE |  DR  | COMP_* (00011 = comparator off)
//! ```
//!
//! Only four differential input pairs exist in hardware: 0-1, 0-3, 1-3 and 2-3.
//! Any other pair is measured as the difference of two conversions against AIN3.

use crate::error::{Error, Result};

/// Conversion result register
pub const REG_CONVERSION: u8 = 0x00;
/// Config register
pub const REG_CONFIG: u8 = 0x01;

/// Write: start a single conversion. Read: 1 = no conversion in progress.
pub const CONFIG_OS: u16 = 1 << 15;
/// Single-shot / power-down mode
const CONFIG_MODE_SINGLE: u16 = 1 << 8;
/// Comparator disabled, ALERT/RDY high-impedance
const CONFIG_COMP_DISABLE: u16 = 0b00011;

/// Full-scale input ranges, indexed by PGA code
const FULL_SCALE_VOLTS: [f32; 6] = [6.144, 4.096, 2.048, 1.024, 0.512, 0.256];
/// Data rates (samples/s), indexed by DR code
const DATA_RATES_SPS: [u16; 8] = [8, 16, 32, 64, 128, 250, 475, 860];

/// Native differential input pairs, indexed by MUX code
const NATIVE_PAIRS: [(u8, u8); 4] = [(0, 1), (0, 3), (1, 3), (2, 3)];

/// One hardware conversion: MUX code and the sign to apply to its result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    pub mux: u8,
    pub negate: bool,
}

/// How a requested (positive, negative) pair is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    /// A single native conversion
    Direct(Conversion),
    /// `first - second`, both taken against a common input
    Difference(Conversion, Conversion),
}

fn native(positive: u8, negative: u8) -> Option<Conversion> {
    NATIVE_PAIRS.iter().enumerate().find_map(|(code, pair)| {
        if *pair == (positive, negative) {
            Some(Conversion {
                mux: code as u8,
                negate: false,
            })
        } else if *pair == (negative, positive) {
            Some(Conversion {
                mux: code as u8,
                negate: true,
            })
        } else {
            None
        }
    })
}

/// Plan the conversions needed for `V(positive) - V(negative)`
pub fn plan(positive: u8, negative: u8) -> Result<Measurement> {
    if positive > 3 || negative > 3 || positive == negative {
        return Err(Error::Config(format!(
            "invalid ADS1115 input pair {}-{}",
            positive, negative
        )));
    }
    if let Some(conversion) = native(positive, negative) {
        return Ok(Measurement::Direct(conversion));
    }
    // Neither input is AIN3 here, so both legs against AIN3 are native.
    match (native(positive, 3), native(negative, 3)) {
        (Some(first), Some(second)) => Ok(Measurement::Difference(first, second)),
        _ => Err(Error::Config(format!(
            "ADS1115 input pair {}-{} cannot be measured",
            positive, negative
        ))),
    }
}

/// PGA code for a full-scale range
pub fn pga_code(full_scale_volts: f32) -> Result<u8> {
    FULL_SCALE_VOLTS
        .iter()
        .position(|fs| *fs == full_scale_volts)
        .map(|code| code as u8)
        .ok_or_else(|| {
            Error::Config(format!(
                "unsupported ADS1115 full-scale range {} V",
                full_scale_volts
            ))
        })
}

/// DR code for a data rate
pub fn data_rate_code(sps: u16) -> Result<u8> {
    DATA_RATES_SPS
        .iter()
        .position(|rate| *rate == sps)
        .map(|code| code as u8)
        .ok_or_else(|| Error::Config(format!("unsupported ADS1115 data rate {} SPS", sps)))
}

/// Config word that starts one single-shot conversion
pub fn single_shot_config(mux: u8, pga: u8, data_rate: u8) -> u16 {
    CONFIG_OS
        | ((mux as u16 & 0b111) << 12)
        | ((pga as u16 & 0b111) << 9)
        | CONFIG_MODE_SINGLE
        | ((data_rate as u16 & 0b111) << 5)
        | CONFIG_COMP_DISABLE
}

/// Convert a raw conversion register value to volts
pub fn raw_to_volts(raw: u16, full_scale_volts: f32) -> f32 {
    (raw as i16) as f32 * full_scale_volts / 32768.0
}

/// True if the conversion hit either end of the range
pub fn is_saturated(raw: u16) -> bool {
    let value = raw as i16;
    value == i16::MAX || value == i16::MIN
}
