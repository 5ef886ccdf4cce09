//! Technical indicator primitives.
//!
//! Every calculation returns an [`IndicatorSeries`] aligned index-for-index
//! with its input. Warm-up positions hold `None`; a value exists only once
//! the indicator has seen enough data to be defined.

pub mod atr;
pub mod cci;
pub mod ema;
pub mod sma;

pub use atr::calculate_atr;
pub use cci::calculate_cci;
pub use ema::calculate_ema;
pub use sma::{calculate_mad, calculate_sma};

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Mad(usize),
    Cci(usize),
    Atr(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn empty(indicator_type: IndicatorType) -> Self {
        IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        }
    }

    /// Most recent value, `None` if the series is empty or still warming up.
    pub fn last(&self) -> Option<f64> {
        self.values.last().copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(span) => write!(f, "EMA({})", span),
            IndicatorType::Mad(period) => write!(f, "MAD({})", period),
            IndicatorType::Cci(period) => write!(f, "CCI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
        }
    }
}
