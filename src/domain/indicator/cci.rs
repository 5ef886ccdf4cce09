//! Commodity Channel Index.
//!
//! CCI = (TP - SMA(TP, n)) / (0.015 * MAD(TP, n)), TP = (H + L + C) / 3.
//! Undefined during warm-up and wherever the deviation is zero.

use crate::domain::indicator::{calculate_mad, calculate_sma, IndicatorSeries, IndicatorType};

pub const CCI_CONSTANT: f64 = 0.015;

pub fn calculate_cci(typical_prices: &[f64], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Cci(period));
    }
    let sma = calculate_sma(typical_prices, period);
    let mad = calculate_mad(typical_prices, period);

    let values = typical_prices
        .iter()
        .zip(sma.values.iter().zip(mad.values.iter()))
        .map(|(&tp, (mean, dev))| match (mean, dev) {
            (Some(mean), Some(dev)) if *dev > 0.0 => Some((tp - mean) / (CCI_CONSTANT * dev)),
            _ => None,
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Cci(period),
        values,
    }
}
