#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use daytrader::adapters::memory_report::MemoryReportSink;
use daytrader::domain::error::DaytraderError;
pub use daytrader::domain::ohlcv::Bar;
use daytrader::domain::ledger::{LedgerConfig, PositionLedger};
use daytrader::domain::risk::{AccountSnapshot, OpenPositionView, RiskParameters};
use daytrader::domain::session::TradingSession;
use daytrader::domain::signal::VoteKind;
use daytrader::domain::strategy::{IndicatorEngine, StrategyConfig};
use daytrader::domain::timeline::Timeline;
use daytrader::ports::execution_port::{ExecutionGateway, OrderRequest, OrderResult};
use std::sync::{Arc, Mutex};

pub const INITIAL_CASH: f64 = 100_000.0;

pub fn ts(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 15)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// Bar with a fixed one-dollar range centred on `close`.
pub fn make_bar(symbol: &str, timestamp: NaiveDateTime, close: f64) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        timestamp,
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        volume: 1_000.0,
        vwap: None,
    }
}

/// Short spans so a consensus forms after a few dozen bars.
pub fn small_strategy() -> StrategyConfig {
    StrategyConfig {
        history_capacity: 60,
        warmup: 30,
        trend_span: 20,
        fast_span: 3,
        slow_span: 8,
        oscillator_period: 10,
        oscillator_threshold: 100.0,
        volume_period: 5,
        volume_factor: 0.8,
        votes: VoteKind::ALL.to_vec(),
        consensus_threshold: 3,
    }
}

/// `count` one-minute bars from 09:30 climbing 0.10 per bar from 100.00.
/// The 30th bar produces a BUY under [`small_strategy`]; the target is
/// never reached within 40 bars.
pub fn rising_bars(symbol: &str, count: u32) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let timestamp = ts(9, 30) + chrono::Duration::minutes(i64::from(i));
            make_bar(symbol, timestamp, 100.0 + 0.1 * f64::from(i))
        })
        .collect()
}

/// Rising session for `symbol` followed by one bar at the 16:00 cutoff.
pub fn session_with_close(symbol: &str, closing_price: f64) -> Timeline {
    let mut bars = rising_bars(symbol, 40);
    bars.push(make_bar(symbol, ts(16, 0), closing_price));
    Timeline::from_bars(bars)
}

pub fn make_session() -> TradingSession<MemoryReportSink> {
    TradingSession::new(
        IndicatorEngine::new(small_strategy()),
        RiskParameters::default(),
        PositionLedger::new(LedgerConfig {
            initial_cash: INITIAL_CASH,
            ..LedgerConfig::default()
        }),
        MemoryReportSink::new(),
    )
}

fn funded_account() -> AccountSnapshot {
    AccountSnapshot {
        equity: INITIAL_CASH,
        cash: INITIAL_CASH,
        buying_power: INITIAL_CASH,
        maintenance_margin: 0.0,
    }
}

/// Gateway that reports a funded account but rejects every order.
pub struct FailingGateway;

impl ExecutionGateway for FailingGateway {
    fn account_snapshot(&self) -> Result<AccountSnapshot, DaytraderError> {
        Ok(funded_account())
    }

    fn open_positions(&self) -> Result<Vec<OpenPositionView>, DaytraderError> {
        Ok(Vec::new())
    }

    fn submit_order(&mut self, order: &OrderRequest) -> Result<OrderResult, DaytraderError> {
        Err(DaytraderError::Execution {
            symbol: order.symbol.clone(),
            reason: "broker offline".into(),
        })
    }

    fn close_all_positions(&mut self) -> Result<usize, DaytraderError> {
        Ok(0)
    }
}

/// Gateway whose account cannot be read.
pub struct UnreachableGateway;

impl ExecutionGateway for UnreachableGateway {
    fn account_snapshot(&self) -> Result<AccountSnapshot, DaytraderError> {
        Err(DaytraderError::Execution {
            symbol: "*".into(),
            reason: "broker offline".into(),
        })
    }

    fn open_positions(&self) -> Result<Vec<OpenPositionView>, DaytraderError> {
        Ok(Vec::new())
    }

    fn submit_order(&mut self, order: &OrderRequest) -> Result<OrderResult, DaytraderError> {
        Err(DaytraderError::Execution {
            symbol: order.symbol.clone(),
            reason: "broker offline".into(),
        })
    }

    fn close_all_positions(&mut self) -> Result<usize, DaytraderError> {
        Ok(0)
    }
}

/// Gateway that accepts every order, reports a fixed account and shares what
/// it received with the test.
#[derive(Clone)]
pub struct RecordingGateway {
    pub account: AccountSnapshot,
    pub orders: Arc<Mutex<Vec<OrderRequest>>>,
    pub close_all_calls: Arc<Mutex<usize>>,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        RecordingGateway::with_cash(INITIAL_CASH)
    }
}

impl RecordingGateway {
    pub fn with_cash(cash: f64) -> Self {
        RecordingGateway {
            account: AccountSnapshot {
                equity: cash,
                cash,
                buying_power: cash,
                maintenance_margin: 0.0,
            },
            orders: Arc::default(),
            close_all_calls: Arc::default(),
        }
    }

    pub fn recorded(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }

    pub fn close_alls(&self) -> usize {
        *self.close_all_calls.lock().unwrap()
    }
}

impl ExecutionGateway for RecordingGateway {
    fn account_snapshot(&self) -> Result<AccountSnapshot, DaytraderError> {
        Ok(self.account)
    }

    fn open_positions(&self) -> Result<Vec<OpenPositionView>, DaytraderError> {
        Ok(Vec::new())
    }

    fn submit_order(&mut self, order: &OrderRequest) -> Result<OrderResult, DaytraderError> {
        let mut orders = self.orders.lock().unwrap();
        orders.push(order.clone());
        Ok(OrderResult {
            order_id: format!("rec-{}", orders.len()),
            symbol: order.symbol.clone(),
            quantity: order.quantity,
            side: order.side,
            fill_price: Some(order.reference_price),
        })
    }

    fn close_all_positions(&mut self) -> Result<usize, DaytraderError> {
        *self.close_all_calls.lock().unwrap() += 1;
        Ok(self.orders.lock().unwrap().len())
    }
}
