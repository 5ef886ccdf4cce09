//! Open positions and the trade log.

use std::fmt;

use chrono::NaiveDateTime;

use super::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_signal(signal: Signal) -> Option<Side> {
        match signal {
            Signal::Buy => Some(Side::Buy),
            Signal::Sell => Some(Side::Sell),
            Signal::None => None,
        }
    }

    /// +1 for longs, -1 for shorts.
    pub fn direction(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub quantity: u64,
    pub avg_entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    /// Most favourable price seen: highest for longs, lowest for shorts.
    pub high_water_mark: f64,
    pub opened_at: NaiveDateTime,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == Side::Buy
    }

    pub fn is_short(&self) -> bool {
        self.side == Side::Sell
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    /// Contribution to total portfolio value: negative for shorts.
    pub fn signed_value(&self, price: f64) -> f64 {
        self.side.direction() * self.market_value(price)
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.realized_pnl(price, self.quantity)
    }

    /// PnL of closing `quantity` units at `exit_price`.
    pub fn realized_pnl(&self, exit_price: f64, quantity: u64) -> f64 {
        self.side.direction() * (exit_price - self.avg_entry_price) * quantity as f64
    }

    pub fn should_stop_loss(&self, price: f64) -> bool {
        if self.is_long() {
            price <= self.stop_price
        } else {
            price >= self.stop_price
        }
    }

    pub fn should_take_profit(&self, price: f64) -> bool {
        if self.is_long() {
            price >= self.target_price
        } else {
            price <= self.target_price
        }
    }

    /// Moves the high-water mark and trails the stop behind it. The stop only
    /// ever tightens. Returns true when the stop moved.
    pub fn ratchet(&mut self, price: f64, trailing_buffer: f64) -> bool {
        let previous = self.stop_price;
        match self.side {
            Side::Buy if price > self.high_water_mark => {
                self.high_water_mark = price;
                self.stop_price = self.stop_price.max(price * (1.0 - trailing_buffer));
            }
            Side::Sell if price < self.high_water_mark => {
                self.high_water_mark = price;
                self.stop_price = self.stop_price.min(price * (1.0 + trailing_buffer));
            }
            _ => {}
        }
        self.stop_price != previous
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeAction {
    Open,
    Close,
    PartialClose,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Open => write!(f, "OPEN"),
            TradeAction::Close => write!(f, "CLOSE"),
            TradeAction::PartialClose => write!(f, "PARTIAL_CLOSE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    Signal,
    StopLoss,
    TakeProfit,
    PartialClose,
    EndOfDay,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::Signal => "signal",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::PartialClose => "partial_close",
            ExitReason::EndOfDay => "end_of_day",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeLogEntry {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub action: TradeAction,
    pub side: Side,
    pub price: f64,
    pub quantity: u64,
    /// Absent for opens.
    pub realized_pnl: Option<f64>,
    pub reason: ExitReason,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn opened_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn sample_long_position() -> Position {
        Position {
            symbol: "AAPL".into(),
            side: Side::Buy,
            quantity: 100,
            avg_entry_price: 50.0,
            stop_price: 45.0,
            target_price: 60.0,
            high_water_mark: 50.0,
            opened_at: opened_at(),
        }
    }

    fn sample_short_position() -> Position {
        Position {
            symbol: "TSLA".into(),
            side: Side::Sell,
            quantity: 100,
            avg_entry_price: 100.0,
            stop_price: 110.0,
            target_price: 80.0,
            high_water_mark: 100.0,
            opened_at: opened_at(),
        }
    }

    #[test]
    fn side_from_signal() {
        assert_eq!(Side::from_signal(Signal::Buy), Some(Side::Buy));
        assert_eq!(Side::from_signal(Signal::Sell), Some(Side::Sell));
        assert_eq!(Side::from_signal(Signal::None), None);
    }

    #[test]
    fn signed_value_by_side() {
        assert!((sample_long_position().signed_value(55.0) - 5500.0).abs() < f64::EPSILON);
        assert!((sample_short_position().signed_value(95.0) + 9500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_long_and_short() {
        assert!((sample_long_position().unrealized_pnl(55.0) - 500.0).abs() < f64::EPSILON);
        assert!((sample_long_position().unrealized_pnl(45.0) + 500.0).abs() < f64::EPSILON);
        assert!((sample_short_position().unrealized_pnl(90.0) - 1000.0).abs() < f64::EPSILON);
        assert!((sample_short_position().unrealized_pnl(110.0) + 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn realized_pnl_for_part_of_position() {
        let pos = sample_long_position();
        assert!((pos.realized_pnl(52.0, 40) - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stop_loss_triggers() {
        let long = sample_long_position();
        assert!(long.should_stop_loss(45.0));
        assert!(!long.should_stop_loss(46.0));
        let short = sample_short_position();
        assert!(short.should_stop_loss(110.0));
        assert!(!short.should_stop_loss(109.0));
    }

    #[test]
    fn take_profit_triggers() {
        let long = sample_long_position();
        assert!(long.should_take_profit(60.0));
        assert!(!long.should_take_profit(59.0));
        let short = sample_short_position();
        assert!(short.should_take_profit(80.0));
        assert!(!short.should_take_profit(81.0));
    }

    #[test]
    fn long_ratchet_raises_stop_only() {
        let mut pos = sample_long_position();
        assert!(pos.ratchet(50.5, 0.02));
        // 50.5 * 0.98 = 49.49
        assert!((pos.stop_price - 49.49).abs() < 1e-9);
        assert!((pos.high_water_mark - 50.5).abs() < f64::EPSILON);

        assert!(!pos.ratchet(50.0, 0.02));
        assert!((pos.stop_price - 49.49).abs() < 1e-9);
    }

    #[test]
    fn long_ratchet_keeps_tighter_stop() {
        let mut pos = sample_long_position();
        pos.stop_price = 49.9;
        assert!(!pos.ratchet(50.1, 0.02));
        assert!((pos.high_water_mark - 50.1).abs() < f64::EPSILON);
        assert!((pos.stop_price - 49.9).abs() < f64::EPSILON);
    }

    #[test]
    fn short_ratchet_lowers_stop() {
        let mut pos = sample_short_position();
        assert!(pos.ratchet(95.0, 0.02));
        assert!((pos.stop_price - 96.9).abs() < 1e-9);
        assert!(!pos.ratchet(97.0, 0.02));
        assert!((pos.high_water_mark - 95.0).abs() < f64::EPSILON);
    }

    #[test]
    fn display_names() {
        assert_eq!(TradeAction::PartialClose.to_string(), "PARTIAL_CLOSE");
        assert_eq!(ExitReason::EndOfDay.to_string(), "end_of_day");
        assert_eq!(Side::Sell.to_string(), "SELL");
    }
}
