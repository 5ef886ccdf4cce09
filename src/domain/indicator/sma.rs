//! Rolling simple mean and mean absolute deviation.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};

/// Rolling arithmetic mean over `period` values.
pub fn calculate_sma(values: &[f64], period: usize) -> IndicatorSeries {
    rolling(values, period, IndicatorType::Sma(period), |window| {
        window.iter().sum::<f64>() / window.len() as f64
    })
}

/// Rolling mean absolute deviation: mean(|x - mean(window)|) over `period` values.
pub fn calculate_mad(values: &[f64], period: usize) -> IndicatorSeries {
    rolling(values, period, IndicatorType::Mad(period), |window| {
        let n = window.len() as f64;
        let mean = window.iter().sum::<f64>() / n;
        window.iter().map(|x| (x - mean).abs()).sum::<f64>() / n
    })
}

fn rolling(
    values: &[f64],
    period: usize,
    indicator_type: IndicatorType,
    f: impl Fn(&[f64]) -> f64,
) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(indicator_type);
    }
    let out = (0..values.len())
        .map(|i| {
            if i + 1 < period {
                None
            } else {
                Some(f(&values[i + 1 - period..=i]))
            }
        })
        .collect();
    IndicatorSeries {
        indicator_type,
        values: out,
    }
}
