//! The consumer pipeline: history update, signal, sizing, ledger, valuation, report.
//!
//! A session owns its engine, ledger and sink and processes one bar group at a
//! time, so none of its state needs locking.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::error::DaytraderError;
use super::ledger::{OpenOutcome, PositionLedger};
use super::metrics::SessionSummary;
use super::ohlcv::Bar;
use super::portfolio::ValuationSnapshot;
use super::position::{Side, TradeLogEntry};
use super::risk::{self, AccountSnapshot, OpenPositionView, RiskParameters};
use super::strategy::IndicatorEngine;
use super::timeline::BarGroup;
use crate::ports::execution_port::{ExecutionGateway, OrderRequest};
use crate::ports::report_port::ReportSink;

/// What one bar group did to the session.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub accepted_bars: usize,
    pub skipped_bars: usize,
    pub entries: Vec<TradeLogEntry>,
    pub exits: Vec<TradeLogEntry>,
    pub snapshot: ValuationSnapshot,
}

pub struct TradingSession<S: ReportSink> {
    engine: IndicatorEngine,
    risk: RiskParameters,
    ledger: PositionLedger,
    sink: S,
    gateway: Option<Box<dyn ExecutionGateway + Send>>,
}

impl<S: ReportSink> TradingSession<S> {
    pub fn new(
        engine: IndicatorEngine,
        risk: RiskParameters,
        ledger: PositionLedger,
        sink: S,
    ) -> Self {
        TradingSession {
            engine,
            risk,
            ledger,
            sink,
            gateway: None,
        }
    }

    /// Sizes entries from `gateway`'s account and positions and mirrors every
    /// simulated entry and exit to it. A rejected entry order cancels the
    /// simulated entry; the end-of-day liquidation becomes one close-all.
    pub fn with_gateway(mut self, gateway: Box<dyn ExecutionGateway + Send>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn engine(&self) -> &IndicatorEngine {
        &self.engine
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn gateway(&self) -> Option<&(dyn ExecutionGateway + Send)> {
        self.gateway.as_deref()
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Runs the whole pipeline for one bar group.
    pub fn process_group(&mut self, group: &BarGroup) -> Result<TickOutcome, DaytraderError> {
        let timestamp = group.timestamp;
        let mut prices: HashMap<String, f64> = HashMap::new();
        let mut accepted: Vec<&Bar> = Vec::with_capacity(group.bars.len());
        let mut skipped_bars = 0usize;

        for bar in &group.bars {
            if let Err(reason) = bar.validate() {
                warn!(symbol = %bar.symbol, %timestamp, %reason, "skipping bar");
                skipped_bars += 1;
                continue;
            }
            self.engine.update(bar.clone());
            prices.insert(bar.symbol.clone(), bar.close);
            accepted.push(bar);
        }

        let mut entries = Vec::new();
        if !self.ledger.is_past_cutoff(timestamp) {
            for bar in &accepted {
                if let Some(entry) = self.consider_entry(bar) {
                    self.sink.record_trade(&entry)?;
                    entries.push(entry);
                }
            }
        }

        let exits = self.ledger.on_tick(timestamp, &prices);
        let end_of_day = self.ledger.is_past_cutoff(timestamp);
        if end_of_day && !exits.is_empty() {
            self.flatten_gateway();
        }
        for exit in &exits {
            info!(
                symbol = %exit.symbol,
                reason = %exit.reason,
                quantity = exit.quantity,
                price = exit.price,
                pnl = exit.realized_pnl.unwrap_or(0.0),
                "position reduced"
            );
            if !end_of_day {
                self.mirror_exit(exit);
            }
            self.sink.record_trade(exit)?;
        }

        let snapshot = self.ledger.valuate(timestamp);
        debug!(
            %timestamp,
            total_value = snapshot.total_value,
            cash = snapshot.cash,
            realized = snapshot.realized_pnl,
            unrealized = snapshot.unrealized_pnl,
            positions = snapshot.open_positions,
            "valuation"
        );
        self.sink.record_valuation(&snapshot)?;

        Ok(TickOutcome {
            accepted_bars: accepted.len(),
            skipped_bars,
            entries,
            exits,
            snapshot,
        })
    }

    fn consider_entry(&mut self, bar: &Bar) -> Option<TradeLogEntry> {
        if self.ledger.portfolio().has_position(&bar.symbol) {
            return None;
        }
        let evaluation = self.engine.evaluate_detailed(&bar.symbol);
        let side = Side::from_signal(evaluation.signal)?;
        debug!(
            symbol = %bar.symbol,
            signal = %evaluation.signal,
            votes = ?evaluation.votes,
            "consensus"
        );

        let params = RiskParameters {
            reward_ratio: self.risk.reward_ratio_for(&bar.symbol),
            ..self.risk.clone()
        };
        let state = match self.gateway.as_deref() {
            Some(gateway) => broker_state(gateway),
            None => Ok((self.ledger.account_snapshot(), self.ledger.open_positions())),
        };
        let (account, open_positions) = match state {
            Ok(state) => state,
            Err(e) => {
                warn!(symbol = %bar.symbol, error = %e, "broker state unavailable; skipping entry");
                return None;
            }
        };
        let history = self.engine.history(&bar.symbol)?;
        let sizing = risk::size(
            history.iter(),
            bar.close,
            &account,
            &open_positions,
            side,
            &params,
        );
        if let Some(rejection) = sizing.rejection {
            debug!(symbol = %bar.symbol, %side, %rejection, "entry rejected by risk");
            return None;
        }
        if let Err(refused) = self.ledger.admit(&bar.symbol, side, bar.close, &sizing) {
            debug!(symbol = %bar.symbol, ?refused, "entry not applied");
            return None;
        }

        if let Some(gateway) = self.gateway.as_mut() {
            let order = OrderRequest {
                symbol: bar.symbol.clone(),
                quantity: sizing.quantity,
                side,
                reference_price: bar.close,
                stop_price: sizing.stop_price,
                target_price: sizing.target_price,
            };
            if let Err(e) = gateway.submit_order(&order) {
                warn!(symbol = %bar.symbol, error = %e, "entry order failed; skipping");
                return None;
            }
        }

        match self.ledger.open(&bar.symbol, side, bar.close, &sizing, bar.timestamp) {
            OpenOutcome::Opened(entry) => {
                info!(
                    symbol = %entry.symbol,
                    side = %entry.side,
                    quantity = entry.quantity,
                    price = entry.price,
                    stop = sizing.stop_price.unwrap_or_default(),
                    target = sizing.target_price.unwrap_or_default(),
                    "position opened"
                );
                Some(entry)
            }
            outcome => {
                warn!(symbol = %bar.symbol, ?outcome, "entry admitted but not applied");
                None
            }
        }
    }

    /// Flattens the broker book once when the ledger liquidates at the cutoff.
    fn flatten_gateway(&mut self) {
        let Some(gateway) = self.gateway.as_mut() else {
            return;
        };
        match gateway.close_all_positions() {
            Ok(closed) => info!(closed, "broker positions flattened"),
            Err(e) => warn!(error = %e, "close-all order failed"),
        }
    }

    fn mirror_exit(&mut self, exit: &TradeLogEntry) {
        let Some(gateway) = self.gateway.as_mut() else {
            return;
        };
        let side = match exit.side {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        };
        let order = OrderRequest {
            symbol: exit.symbol.clone(),
            quantity: exit.quantity,
            side,
            reference_price: exit.price,
            stop_price: None,
            target_price: None,
        };
        if let Err(e) = gateway.submit_order(&order) {
            warn!(symbol = %exit.symbol, error = %e, "exit order failed");
        }
    }

    /// Ends the session: computes the summary and lets the sink flush.
    pub fn finish(&mut self) -> Result<SessionSummary, DaytraderError> {
        let summary = SessionSummary::compute(self.ledger.portfolio());
        if summary.open_positions > 0 {
            warn!(positions = summary.open_positions, "session ended with open positions");
        }
        info!(
            ticks = summary.ticks,
            entries = summary.entries,
            exits = summary.exits,
            win_rate = summary.win_rate,
            realized_pnl = summary.realized_pnl,
            final_value = summary.final_value,
            max_drawdown = summary.max_drawdown,
            "session finished"
        );
        self.sink.finish(&summary)?;
        Ok(summary)
    }
}

fn broker_state(
    gateway: &(dyn ExecutionGateway + Send),
) -> Result<(AccountSnapshot, Vec<OpenPositionView>), DaytraderError> {
    Ok((gateway.account_snapshot()?, gateway.open_positions()?))
}
