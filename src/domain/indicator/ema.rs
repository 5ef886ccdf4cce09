//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with the SMA of the first n values, then
//! EMA[i] = x[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) positions are undefined.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};

pub fn calculate_ema(values: &[f64], span: usize) -> IndicatorSeries {
    if span == 0 || values.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Ema(span));
    }

    let mut out = Vec::with_capacity(values.len());
    let k = 2.0 / (span as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &value) in values.iter().enumerate() {
        if i < span - 1 {
            sum += value;
            out.push(None);
        } else if i == span - 1 {
            sum += value;
            ema = sum / span as f64;
            out.push(Some(ema));
        } else {
            ema = value * k + ema * (1.0 - k);
            out.push(Some(ema));
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(span),
        values: out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ema_warmup() {
        let series = calculate_ema(&[10.0, 20.0, 30.0, 40.0, 50.0], 3);

        assert!(series.values[0].is_none());
        assert!(series.values[1].is_none());
        assert!(series.values[2].is_some());
        assert!(series.values[3].is_some());
        assert!(series.values[4].is_some());
    }

    #[test]
    fn ema_span_1_tracks_input() {
        let series = calculate_ema(&[10.0, 20.0, 30.0], 1);
        assert_eq!(series.values, vec![Some(10.0), Some(20.0), Some(30.0)]);
    }

    #[test]
    fn ema_seed_is_sma() {
        let series = calculate_ema(&[10.0, 20.0, 30.0], 3);
        assert_relative_eq!(series.values[2].unwrap(), 20.0);
    }

    #[test]
    fn ema_recursive_calculation() {
        let series = calculate_ema(&[10.0, 20.0, 30.0, 40.0, 50.0], 3);

        let k = 2.0 / 4.0;
        let sma = 20.0;
        let ema_3 = 40.0 * k + sma * (1.0 - k);
        let ema_4 = 50.0 * k + ema_3 * (1.0 - k);

        assert_relative_eq!(series.values[3].unwrap(), ema_3);
        assert_relative_eq!(series.values[4].unwrap(), ema_4);
    }

    #[test]
    fn ema_equal_values() {
        let series = calculate_ema(&[100.0; 5], 3);
        for value in series.values.iter().skip(2) {
            assert_relative_eq!(value.unwrap(), 100.0);
        }
    }

    #[test]
    fn ema_shorter_than_span_is_undefined() {
        let series = calculate_ema(&[1.0, 2.0], 5);
        assert_eq!(series.len(), 2);
        assert_eq!(series.last(), None);
    }

    #[test]
    fn ema_indicator_type() {
        let series = calculate_ema(&[10.0, 20.0, 30.0], 5);
        assert_eq!(series.indicator_type, IndicatorType::Ema(5));
    }

    #[test]
    fn ema_empty_and_zero_span() {
        assert!(calculate_ema(&[], 3).is_empty());
        assert!(calculate_ema(&[10.0, 20.0], 0).is_empty());
    }
}
