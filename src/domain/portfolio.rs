//! Portfolio state: cash, open positions, realized PnL and the valuation history.

use chrono::NaiveDateTime;
use std::collections::HashMap;

use super::position::{Position, TradeLogEntry};
use super::risk::OpenPositionView;

/// Portfolio valuation at one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationSnapshot {
    pub timestamp: NaiveDateTime,
    pub total_value: f64,
    pub cash: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub open_positions: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_cash: f64,
    pub realized_pnl: f64,
    pub positions: HashMap<String, Position>,
    pub trade_log: Vec<TradeLogEntry>,
    pub valuation_history: Vec<ValuationSnapshot>,
    last_prices: HashMap<String, f64>,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Portfolio {
            cash: initial_cash,
            initial_cash,
            realized_pnl: 0.0,
            positions: HashMap::new(),
            trade_log: Vec::new(),
            valuation_history: Vec::new(),
            last_prices: HashMap::new(),
        }
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.insert(position.symbol.clone(), position);
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn remove_position(&mut self, symbol: &str) -> Option<Position> {
        self.positions.remove(symbol)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn record_trade(&mut self, entry: TradeLogEntry) {
        self.trade_log.push(entry);
    }

    /// Remembers the latest price seen for each symbol.
    pub fn mark(&mut self, symbol: &str, price: f64) {
        self.last_prices.insert(symbol.to_string(), price);
    }

    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.last_prices.get(symbol).copied()
    }

    /// Price used to value `position`: the last one seen, else its entry.
    pub fn valuation_price(&self, position: &Position) -> f64 {
        self.last_price(&position.symbol)
            .unwrap_or(position.avg_entry_price)
    }

    pub fn total_value(&self) -> f64 {
        let positions: f64 = self
            .positions
            .values()
            .map(|pos| pos.signed_value(self.valuation_price(pos)))
            .sum();
        self.cash + positions
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.positions
            .values()
            .map(|pos| pos.unrealized_pnl(self.valuation_price(pos)))
            .sum()
    }

    /// Appends a snapshot to the valuation history and returns it.
    pub fn record_valuation(&mut self, timestamp: NaiveDateTime) -> ValuationSnapshot {
        let snapshot = ValuationSnapshot {
            timestamp,
            total_value: self.total_value(),
            cash: self.cash,
            realized_pnl: self.realized_pnl,
            unrealized_pnl: self.unrealized_pnl(),
            open_positions: self.positions.len(),
        };
        self.valuation_history.push(snapshot.clone());
        snapshot
    }

    /// Open positions as the risk sizer sees them, sorted by symbol.
    pub fn open_position_views(&self) -> Vec<OpenPositionView> {
        let mut views: Vec<OpenPositionView> = self
            .positions
            .values()
            .map(|pos| OpenPositionView {
                symbol: pos.symbol.clone(),
                quantity: pos.quantity,
                market_value: pos.signed_value(self.valuation_price(pos)),
                avg_entry_price: pos.avg_entry_price,
            })
            .collect();
        views.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        views
    }
}
