//! ATR-based position sizing with portfolio admission control.
//!
//! Sizing never fails: every reason not to trade is reported as a
//! zero-quantity [`SizingResult`] carrying a [`Rejection`].

use std::fmt;

use super::indicator::calculate_atr;
use super::ohlcv::Bar;
use super::position::Side;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskParameters {
    /// Fraction of equity put at risk per trade.
    pub risk_per_trade: f64,
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub reward_ratio: f64,
    /// Fraction of available funds one position may consume.
    pub max_position_fraction: f64,
    pub max_open_positions: usize,
    /// Cap on total open notional as a multiple of buying power.
    pub max_notional_ratio: f64,
    /// Reward ratio used instead of `reward_ratio` for index symbols (`^...`).
    pub index_reward_ratio: Option<f64>,
    pub min_stop_price: f64,
    pub epsilon: f64,
}

impl Default for RiskParameters {
    fn default() -> Self {
        RiskParameters {
            risk_per_trade: 0.01,
            atr_period: 14,
            atr_multiplier: 1.0,
            reward_ratio: 2.0,
            max_position_fraction: 0.01,
            max_open_positions: 10,
            max_notional_ratio: 1.0,
            index_reward_ratio: None,
            min_stop_price: 0.01,
            epsilon: 1e-5,
        }
    }
}

impl RiskParameters {
    pub fn reward_ratio_for(&self, symbol: &str) -> f64 {
        match self.index_reward_ratio {
            Some(ratio) if is_index_symbol(symbol) => ratio,
            _ => self.reward_ratio,
        }
    }
}

pub fn is_index_symbol(symbol: &str) -> bool {
    symbol.starts_with('^')
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountSnapshot {
    pub equity: f64,
    pub cash: f64,
    pub buying_power: f64,
    pub maintenance_margin: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPositionView {
    pub symbol: String,
    pub quantity: u64,
    pub market_value: f64,
    pub avg_entry_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    InvalidEntryPrice,
    AtrUnavailable,
    StopTooTight,
    ZeroQuantity,
    MaxOpenPositions,
    NotionalCap,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rejection::InvalidEntryPrice => "invalid entry price",
            Rejection::AtrUnavailable => "ATR unavailable",
            Rejection::StopTooTight => "risk per share too small",
            Rejection::ZeroQuantity => "quantity rounds to zero",
            Rejection::MaxOpenPositions => "max open positions reached",
            Rejection::NotionalCap => "total notional cap exceeded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizingResult {
    pub quantity: u64,
    pub stop_price: Option<f64>,
    pub target_price: Option<f64>,
    pub atr: Option<f64>,
    pub rejection: Option<Rejection>,
}

impl SizingResult {
    fn rejected(rejection: Rejection, atr: Option<f64>) -> Self {
        SizingResult {
            quantity: 0,
            stop_price: None,
            target_price: None,
            atr,
            rejection: Some(rejection),
        }
    }

    pub fn is_tradable(&self) -> bool {
        self.quantity > 0
    }
}

/// The individual quantity bounds that `size` takes the minimum of.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantityCandidates {
    pub risk_based: u64,
    pub notional_cap: u64,
    /// `None` for shorts, where cash does not bound the quantity.
    pub cash_cap: Option<u64>,
}

impl QuantityCandidates {
    pub fn compute(
        entry_price: f64,
        risk_per_share: f64,
        account: &AccountSnapshot,
        side: Side,
        params: &RiskParameters,
    ) -> Self {
        let available = match side {
            Side::Buy => account.cash,
            Side::Sell => account.buying_power,
        };
        QuantityCandidates {
            risk_based: floor_quantity(account.equity * params.risk_per_trade / risk_per_share),
            notional_cap: floor_quantity(available * params.max_position_fraction / entry_price),
            cash_cap: match side {
                Side::Buy => Some(floor_quantity(account.cash / entry_price)),
                Side::Sell => None,
            },
        }
    }

    pub fn min(&self) -> u64 {
        let base = self.risk_based.min(self.notional_cap);
        self.cash_cap.map_or(base, |cap| base.min(cap))
    }
}

fn floor_quantity(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.floor() as u64
    } else {
        0
    }
}

/// Sizes an entry at `entry_price` from the recent bars of the symbol.
pub fn size<'a, I>(
    history: I,
    entry_price: f64,
    account: &AccountSnapshot,
    open_positions: &[OpenPositionView],
    side: Side,
    params: &RiskParameters,
) -> SizingResult
where
    I: IntoIterator<Item = &'a Bar>,
{
    if open_positions.len() >= params.max_open_positions {
        return SizingResult::rejected(Rejection::MaxOpenPositions, None);
    }
    if !entry_price.is_finite() || entry_price <= 0.0 {
        return SizingResult::rejected(Rejection::InvalidEntryPrice, None);
    }

    let atr = match calculate_atr(history, params.atr_period).last() {
        Some(atr) if atr.is_finite() && atr >= params.epsilon => atr,
        other => return SizingResult::rejected(Rejection::AtrUnavailable, other),
    };

    let distance = atr * params.atr_multiplier;
    let (stop_price, risk_per_share) = match side {
        Side::Buy => {
            let stop = (entry_price - distance).max(params.min_stop_price);
            (stop, entry_price - stop)
        }
        Side::Sell => {
            let stop = entry_price + distance;
            (stop, stop - entry_price)
        }
    };
    if !risk_per_share.is_finite() || risk_per_share <= params.epsilon {
        return SizingResult::rejected(Rejection::StopTooTight, Some(atr));
    }
    let target_price = entry_price + side.direction() * params.reward_ratio * risk_per_share;

    let quantity =
        QuantityCandidates::compute(entry_price, risk_per_share, account, side, params).min();
    if quantity == 0 {
        return SizingResult::rejected(Rejection::ZeroQuantity, Some(atr));
    }

    let open_notional: f64 = open_positions.iter().map(|p| p.market_value.abs()).sum();
    let requested = open_notional + quantity as f64 * entry_price;
    if requested > params.max_notional_ratio * account.buying_power {
        return SizingResult::rejected(Rejection::NotionalCap, Some(atr));
    }

    SizingResult {
        quantity,
        stop_price: Some(stop_price),
        target_price: Some(target_price),
        atr: Some(atr),
        rejection: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bar(high: f64, low: f64, close: f64) -> Bar {
        Bar {
            symbol: "MSFT".into(),
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 10_000.0,
            vwap: None,
        }
    }

    /// A single bar with a range of two gives ATR = 2.
    fn atr_two() -> Vec<Bar> {
        vec![make_bar(101.0, 99.0, 100.0)]
    }

    fn account() -> AccountSnapshot {
        AccountSnapshot {
            equity: 100_000.0,
            cash: 40_000.0,
            buying_power: 80_000.0,
            maintenance_margin: 0.0,
        }
    }

    fn params() -> RiskParameters {
        RiskParameters {
            max_position_fraction: 0.5,
            ..RiskParameters::default()
        }
    }

    fn open_view(symbol: &str, value: f64) -> OpenPositionView {
        OpenPositionView {
            symbol: symbol.into(),
            quantity: 10,
            market_value: value,
            avg_entry_price: value / 10.0,
        }
    }

    #[test]
    fn long_stop_and_target_from_atr() {
        let result = size(&atr_two(), 100.0, &account(), &[], Side::Buy, &params());
        assert!((result.atr.unwrap() - 2.0).abs() < 1e-12);
        assert!((result.stop_price.unwrap() - 98.0).abs() < 1e-12);
        assert!((result.target_price.unwrap() - 104.0).abs() < 1e-12);
    }

    #[test]
    fn quantity_is_min_of_candidates() {
        // risk 1000 / 2 = 500, notional 40000 * 0.5 / 100 = 200, cash 400
        let candidates = QuantityCandidates::compute(100.0, 2.0, &account(), Side::Buy, &params());
        assert_eq!(candidates.risk_based, 500);
        assert_eq!(candidates.notional_cap, 200);
        assert_eq!(candidates.cash_cap, Some(400));

        let result = size(&atr_two(), 100.0, &account(), &[], Side::Buy, &params());
        assert_eq!(result.quantity, 200);
        assert!(result.rejection.is_none());
    }

    #[test]
    fn short_uses_buying_power_and_no_cash_cap() {
        let result = size(&atr_two(), 100.0, &account(), &[], Side::Sell, &params());
        assert!((result.stop_price.unwrap() - 102.0).abs() < 1e-12);
        assert!((result.target_price.unwrap() - 96.0).abs() < 1e-12);
        // risk 500, notional 80000 * 0.5 / 100 = 400
        assert_eq!(result.quantity, 400);
    }

    #[test]
    fn max_open_positions_rejects_first() {
        let open: Vec<OpenPositionView> =
            (0..10).map(|i| open_view(&format!("S{i}"), 0.0)).collect();
        let result = size(&atr_two(), 100.0, &account(), &open, Side::Buy, &params());
        assert_eq!(result.quantity, 0);
        assert_eq!(result.rejection, Some(Rejection::MaxOpenPositions));

        // even with nothing else usable
        let result = size(&[], -1.0, &account(), &open, Side::Buy, &params());
        assert_eq!(result.rejection, Some(Rejection::MaxOpenPositions));
    }

    #[test]
    fn notional_cap_rejects() {
        // 200 * 100 = 20000 new notional; 70000 already open; cap 80000
        let open = vec![open_view("AAPL", 70_000.0)];
        let result = size(&atr_two(), 100.0, &account(), &open, Side::Buy, &params());
        assert_eq!(result.quantity, 0);
        assert_eq!(result.rejection, Some(Rejection::NotionalCap));
        assert!(result.stop_price.is_none());
        assert!(result.target_price.is_none());
    }

    #[test]
    fn short_market_values_count_by_magnitude() {
        let open = vec![open_view("AAPL", -70_000.0)];
        let result = size(&atr_two(), 100.0, &account(), &open, Side::Buy, &params());
        assert_eq!(result.rejection, Some(Rejection::NotionalCap));
    }

    #[test]
    fn empty_history_rejects() {
        let result = size(&[], 100.0, &account(), &[], Side::Buy, &params());
        assert_eq!(result.quantity, 0);
        assert_eq!(result.rejection, Some(Rejection::AtrUnavailable));
        assert!(result.atr.is_none());
    }

    #[test]
    fn flat_bars_reject_on_atr() {
        let bars = vec![make_bar(100.0, 100.0, 100.0); 5];
        let result = size(&bars, 100.0, &account(), &[], Side::Buy, &params());
        assert_eq!(result.rejection, Some(Rejection::AtrUnavailable));
    }

    #[test]
    fn stop_floor_keeps_positive_risk() {
        // ATR 2 at entry 1.5 → stop floored to 0.01
        let result = size(&atr_two(), 1.5, &account(), &[], Side::Buy, &params());
        assert!((result.stop_price.unwrap() - 0.01).abs() < 1e-12);
        assert!(result.quantity > 0);
    }

    #[test]
    fn stop_floor_at_entry_is_too_tight() {
        let result = size(&atr_two(), 0.01, &account(), &[], Side::Buy, &params());
        assert_eq!(result.rejection, Some(Rejection::StopTooTight));
    }

    #[test]
    fn tiny_account_rounds_to_zero() {
        let poor = AccountSnapshot {
            equity: 50.0,
            cash: 50.0,
            buying_power: 50.0,
            maintenance_margin: 0.0,
        };
        let result = size(&atr_two(), 100.0, &poor, &[], Side::Buy, &params());
        assert_eq!(result.rejection, Some(Rejection::ZeroQuantity));
        assert!(result.atr.is_some());
    }

    #[test]
    fn invalid_entry_price_rejects() {
        let result = size(&atr_two(), f64::NAN, &account(), &[], Side::Buy, &params());
        assert_eq!(result.rejection, Some(Rejection::InvalidEntryPrice));
    }

    #[test]
    fn index_symbols_use_index_reward_ratio() {
        let mut params = params();
        assert!((params.reward_ratio_for("^GSPC") - 2.0).abs() < f64::EPSILON);
        params.index_reward_ratio = Some(1.0);
        assert!((params.reward_ratio_for("^GSPC") - 1.0).abs() < f64::EPSILON);
        assert!((params.reward_ratio_for("SPY") - 2.0).abs() < f64::EPSILON);
    }
}
