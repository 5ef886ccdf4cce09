//! Position lifecycle: entries, trailing stops, exits and end-of-day liquidation.
//!
//! Every tick runs the exit rules for each open position in a fixed order:
//! end-of-day cutoff, stop-loss, take-profit, scheduled partial close. At most
//! one rule fires per position per tick.

use chrono::{NaiveDateTime, NaiveTime};
use std::collections::HashMap;

use super::portfolio::{Portfolio, ValuationSnapshot};
use super::position::{ExitReason, Position, Side, TradeAction, TradeLogEntry};
use super::risk::{AccountSnapshot, OpenPositionView, SizingResult};

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub initial_cash: f64,
    pub trailing_buffer: f64,
    pub partial_close_fraction: f64,
    pub partial_close_times: Vec<NaiveTime>,
    pub eod_cutoff: NaiveTime,
    /// Buying power reported to the sizer as a multiple of equity.
    pub buying_power_multiplier: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            initial_cash: 100_000.0,
            trailing_buffer: 0.02,
            partial_close_fraction: 0.5,
            partial_close_times: vec![
                NaiveTime::from_hms_opt(15, 30, 0).unwrap_or(NaiveTime::MIN),
                NaiveTime::from_hms_opt(15, 45, 0).unwrap_or(NaiveTime::MIN),
            ],
            eod_cutoff: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
            buying_power_multiplier: 1.0,
        }
    }
}

/// What happened to an entry request.
#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    Opened(TradeLogEntry),
    /// A position in the symbol is already open; no pyramiding.
    AlreadyOpen,
    /// The sizing result carried no quantity.
    NotSized,
    InsufficientCash,
}

#[derive(Debug, Clone)]
pub struct PositionLedger {
    config: LedgerConfig,
    portfolio: Portfolio,
}

impl PositionLedger {
    pub fn new(config: LedgerConfig) -> Self {
        let portfolio = Portfolio::new(config.initial_cash);
        PositionLedger { config, portfolio }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn is_past_cutoff(&self, timestamp: NaiveDateTime) -> bool {
        timestamp.time() >= self.config.eod_cutoff
    }

    /// Account state in the shape the risk sizer expects.
    pub fn account_snapshot(&self) -> AccountSnapshot {
        let equity = self.portfolio.total_value();
        AccountSnapshot {
            equity,
            cash: self.portfolio.cash,
            buying_power: (equity * self.config.buying_power_multiplier).max(0.0),
            maintenance_margin: 0.0,
        }
    }

    pub fn open_positions(&self) -> Vec<OpenPositionView> {
        self.portfolio.open_position_views()
    }

    /// Runs the checks `open` applies without touching any state. Returns the
    /// stop and target on success, the refusal otherwise.
    pub fn admit(
        &self,
        symbol: &str,
        side: Side,
        entry_price: f64,
        sizing: &SizingResult,
    ) -> Result<(f64, f64), OpenOutcome> {
        if self.portfolio.has_position(symbol) {
            return Err(OpenOutcome::AlreadyOpen);
        }
        let (Some(stop_price), Some(target_price)) = (sizing.stop_price, sizing.target_price)
        else {
            return Err(OpenOutcome::NotSized);
        };
        if sizing.quantity == 0 {
            return Err(OpenOutcome::NotSized);
        }
        let notional = sizing.quantity as f64 * entry_price;
        if side == Side::Buy && notional > self.portfolio.cash {
            return Err(OpenOutcome::InsufficientCash);
        }
        Ok((stop_price, target_price))
    }

    /// Applies a sized entry. Longs debit cash, shorts credit the proceeds.
    pub fn open(
        &mut self,
        symbol: &str,
        side: Side,
        entry_price: f64,
        sizing: &SizingResult,
        timestamp: NaiveDateTime,
    ) -> OpenOutcome {
        let (stop_price, target_price) = match self.admit(symbol, side, entry_price, sizing) {
            Ok(levels) => levels,
            Err(refused) => return refused,
        };

        let notional = sizing.quantity as f64 * entry_price;
        self.portfolio.cash -= side.direction() * notional;

        self.portfolio.add_position(Position {
            symbol: symbol.to_string(),
            side,
            quantity: sizing.quantity,
            avg_entry_price: entry_price,
            stop_price,
            target_price,
            high_water_mark: entry_price,
            opened_at: timestamp,
        });
        self.portfolio.mark(symbol, entry_price);

        let entry = TradeLogEntry {
            timestamp,
            symbol: symbol.to_string(),
            action: TradeAction::Open,
            side,
            price: entry_price,
            quantity: sizing.quantity,
            realized_pnl: None,
            reason: ExitReason::Signal,
        };
        self.portfolio.record_trade(entry.clone());
        OpenOutcome::Opened(entry)
    }

    /// Advances every open position by one tick and returns the exits taken.
    /// Symbols missing from `prices` keep their last known price.
    pub fn on_tick(
        &mut self,
        timestamp: NaiveDateTime,
        prices: &HashMap<String, f64>,
    ) -> Vec<TradeLogEntry> {
        for (symbol, price) in prices {
            self.portfolio.mark(symbol, *price);
        }

        if self.is_past_cutoff(timestamp) {
            return self.liquidate_all(timestamp, ExitReason::EndOfDay);
        }

        let partial_due = self.config.partial_close_times.contains(&timestamp.time());
        let buffer = self.config.trailing_buffer;
        let fraction = self.config.partial_close_fraction;

        // First pass decides, second pass applies.
        let mut decisions: Vec<(String, f64, u64, ExitReason)> = Vec::new();
        for position in self.portfolio.positions.values_mut() {
            let Some(&price) = prices.get(&position.symbol) else {
                continue;
            };
            position.ratchet(price, buffer);

            let exit = if position.should_stop_loss(price) {
                Some((position.quantity, ExitReason::StopLoss))
            } else if position.should_take_profit(price) {
                Some((position.quantity, ExitReason::TakeProfit))
            } else if partial_due {
                let quantity = (position.quantity as f64 * fraction).floor() as u64;
                (quantity > 0).then_some((quantity, ExitReason::PartialClose))
            } else {
                None
            };
            if let Some((quantity, reason)) = exit {
                decisions.push((position.symbol.clone(), price, quantity, reason));
            }
        }
        decisions.sort_by(|a, b| a.0.cmp(&b.0));

        decisions
            .into_iter()
            .filter_map(|(symbol, price, quantity, reason)| {
                self.close(&symbol, price, quantity, timestamp, reason)
            })
            .collect()
    }

    /// Closes every open position at its last known price.
    pub fn liquidate_all(
        &mut self,
        timestamp: NaiveDateTime,
        reason: ExitReason,
    ) -> Vec<TradeLogEntry> {
        let mut targets: Vec<(String, f64, u64)> = self
            .portfolio
            .positions
            .values()
            .map(|pos| {
                let price = self.portfolio.valuation_price(pos);
                (pos.symbol.clone(), price, pos.quantity)
            })
            .collect();
        targets.sort_by(|a, b| a.0.cmp(&b.0));

        targets
            .into_iter()
            .filter_map(|(symbol, price, quantity)| {
                self.close(&symbol, price, quantity, timestamp, reason)
            })
            .collect()
    }

    /// Closes up to `quantity` units of the position in `symbol` at `price`.
    pub fn close(
        &mut self,
        symbol: &str,
        price: f64,
        quantity: u64,
        timestamp: NaiveDateTime,
        reason: ExitReason,
    ) -> Option<TradeLogEntry> {
        let position = self.portfolio.positions.get_mut(symbol)?;
        let quantity = quantity.min(position.quantity);
        if quantity == 0 {
            return None;
        }

        let pnl = position.realized_pnl(price, quantity);
        let side = position.side;
        position.quantity -= quantity;
        let remaining = position.quantity;

        self.portfolio.cash += side.direction() * price * quantity as f64;
        self.portfolio.realized_pnl += pnl;
        if remaining == 0 {
            self.portfolio.remove_position(symbol);
        }

        let entry = TradeLogEntry {
            timestamp,
            symbol: symbol.to_string(),
            action: if remaining == 0 {
                TradeAction::Close
            } else {
                TradeAction::PartialClose
            },
            side,
            price,
            quantity,
            realized_pnl: Some(pnl),
            reason,
        };
        self.portfolio.record_trade(entry.clone());
        Some(entry)
    }

    pub fn valuate(&mut self, timestamp: NaiveDateTime) -> ValuationSnapshot {
        self.portfolio.record_valuation(timestamp)
    }
}
