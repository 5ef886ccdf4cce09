//! Average True Range with Wilder smoothing.
//!
//! TR[0] = H[0] - L[0] (no previous close), TR[i] = max(H-L, |H-Cprev|, |L-Cprev|).
//! ATR[0] = TR[0], ATR[i] = ATR[i-1] + (TR[i] - ATR[i-1]) / n.
//! Defined from the first bar onwards.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

pub fn calculate_atr<'a, I>(bars: I, period: usize) -> IndicatorSeries
where
    I: IntoIterator<Item = &'a Bar>,
{
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Atr(period));
    }

    let alpha = 1.0 / period as f64;
    let mut values = Vec::new();
    let mut prev_close: Option<f64> = None;
    let mut atr: Option<f64> = None;

    for bar in bars {
        let tr = match prev_close {
            Some(prev) => bar.true_range(prev),
            None => bar.high - bar.low,
        };
        let next = match atr {
            Some(prev_atr) => prev_atr + alpha * (tr - prev_atr),
            None => tr,
        };
        atr = Some(next);
        prev_close = Some(bar.close);
        values.push(Some(next));
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}
