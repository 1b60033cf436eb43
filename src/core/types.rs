//! Core data types shared by the sampler, model, indicator and safety logic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two series cells of the pack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellChannel {
    /// Bottom cell (pack negative to mid tap)
    Cell1,
    /// Top cell (mid tap to pack positive)
    Cell2,
}

impl fmt::Display for CellChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellChannel::Cell1 => write!(f, "cell1"),
            CellChannel::Cell2 => write!(f, "cell2"),
        }
    }
}

/// Digital output level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// Voltages of both cells captured in one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellReadings {
    /// Cell 1 voltage (V)
    pub cell1: f32,
    /// Cell 2 voltage (V)
    pub cell2: f32,
}

impl CellReadings {
    pub fn new(cell1: f32, cell2: f32) -> Self {
        Self { cell1, cell2 }
    }

    /// Combined pack voltage (V)
    #[inline]
    pub fn pack_voltage(&self) -> f32 {
        self.cell1 + self.cell2
    }
}

/// Status LED state, derived from the pack voltage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorState {
    /// Green
    Normal,
    /// Yellow
    Low,
    /// Red
    Critical,
}

impl IndicatorState {
    /// Color of the LED lit for this state
    pub fn color(&self) -> &'static str {
        match self {
            IndicatorState::Normal => "green",
            IndicatorState::Low => "yellow",
            IndicatorState::Critical => "red",
        }
    }

    /// Ordering from healthiest (0) to worst (2)
    pub(crate) fn severity(&self) -> u8 {
        match self {
            IndicatorState::Normal => 0,
            IndicatorState::Low => 1,
            IndicatorState::Critical => 2,
        }
    }
}

impl fmt::Display for IndicatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorState::Normal => write!(f, "NORMAL"),
            IndicatorState::Low => write!(f, "LOW"),
            IndicatorState::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_voltage_is_sum() {
        let r = CellReadings::new(4.2, 4.2);
        assert_eq!(r.pack_voltage(), 8.4);
    }

    #[test]
    fn test_severity_order() {
        assert!(IndicatorState::Normal.severity() < IndicatorState::Low.severity());
        assert!(IndicatorState::Low.severity() < IndicatorState::Critical.severity());
    }
}
