//! In-memory paper broker. Fills every accepted order at its reference price.

use std::collections::HashMap;

use tracing::debug;

use crate::domain::error::DaytraderError;
use crate::domain::position::Side;
use crate::domain::risk::{AccountSnapshot, OpenPositionView};
use crate::ports::execution_port::{ExecutionGateway, OrderRequest, OrderResult};

#[derive(Debug, Clone, PartialEq)]
struct PaperHolding {
    /// Positive long, negative short.
    quantity: i64,
    avg_price: f64,
    last_price: f64,
}

#[derive(Debug, Clone)]
pub struct PaperGateway {
    cash: f64,
    holdings: HashMap<String, PaperHolding>,
    orders: Vec<OrderResult>,
    next_id: u64,
}

impl PaperGateway {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            holdings: HashMap::new(),
            orders: Vec::new(),
            next_id: 1,
        }
    }

    pub fn orders(&self) -> &[OrderResult] {
        &self.orders
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    fn equity(&self) -> f64 {
        self.cash
            + self
                .holdings
                .values()
                .map(|h| h.quantity as f64 * h.last_price)
                .sum::<f64>()
    }

    fn fill(&mut self, symbol: &str, side: Side, quantity: u64, price: f64) -> OrderResult {
        let signed = match side {
            Side::Buy => quantity as i64,
            Side::Sell => -(quantity as i64),
        };
        self.cash -= signed as f64 * price;

        let holding = self
            .holdings
            .entry(symbol.to_string())
            .or_insert(PaperHolding {
                quantity: 0,
                avg_price: price,
                last_price: price,
            });
        let before = holding.quantity;
        let after = before + signed;
        if before == 0 || before.signum() != after.signum() {
            holding.avg_price = price;
        } else if before.signum() == signed.signum() {
            holding.avg_price = (holding.avg_price * before.abs() as f64
                + price * quantity as f64)
                / after.abs() as f64;
        }
        holding.quantity = after;
        holding.last_price = price;
        if after == 0 {
            self.holdings.remove(symbol);
        }

        let result = OrderResult {
            order_id: format!("paper-{}", self.next_id),
            symbol: symbol.to_string(),
            quantity,
            side,
            fill_price: Some(price),
        };
        self.next_id += 1;
        debug!(order_id = %result.order_id, symbol, %side, quantity, price, "paper fill");
        self.orders.push(result.clone());
        result
    }
}

impl ExecutionGateway for PaperGateway {
    fn account_snapshot(&self) -> Result<AccountSnapshot, DaytraderError> {
        let equity = self.equity();
        Ok(AccountSnapshot {
            equity,
            cash: self.cash,
            buying_power: equity,
            maintenance_margin: 0.0,
        })
    }

    fn open_positions(&self) -> Result<Vec<OpenPositionView>, DaytraderError> {
        let mut views: Vec<OpenPositionView> = self
            .holdings
            .iter()
            .map(|(symbol, h)| OpenPositionView {
                symbol: symbol.clone(),
                quantity: h.quantity.unsigned_abs(),
                market_value: h.quantity as f64 * h.last_price,
                avg_entry_price: h.avg_price,
            })
            .collect();
        views.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(views)
    }

    fn submit_order(&mut self, order: &OrderRequest) -> Result<OrderResult, DaytraderError> {
        let reject = |reason: &str| DaytraderError::Execution {
            symbol: order.symbol.clone(),
            reason: reason.to_string(),
        };
        if order.quantity == 0 {
            return Err(reject("quantity must be positive"));
        }
        if !order.reference_price.is_finite() || order.reference_price <= 0.0 {
            return Err(reject("reference price must be positive"));
        }
        let held = self
            .holdings
            .get(&order.symbol)
            .map(|h| h.quantity)
            .unwrap_or(0);
        if order.side == Side::Buy && held >= 0 {
            let cost = order.quantity as f64 * order.reference_price;
            if cost > self.cash {
                return Err(reject(&format!(
                    "insufficient cash: need {:.2}, have {:.2}",
                    cost, self.cash
                )));
            }
        }
        Ok(self.fill(
            &order.symbol,
            order.side,
            order.quantity,
            order.reference_price,
        ))
    }

    fn close_all_positions(&mut self) -> Result<usize, DaytraderError> {
        let mut symbols: Vec<String> = self.holdings.keys().cloned().collect();
        symbols.sort();
        for symbol in &symbols {
            if let Some(h) = self.holdings.get(symbol).cloned() {
                let side = if h.quantity > 0 { Side::Sell } else { Side::Buy };
                self.fill(symbol, side, h.quantity.unsigned_abs(), h.last_price);
            }
        }
        Ok(symbols.len())
    }
}
