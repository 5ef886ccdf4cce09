//! Brokerage boundary: account state and order submission.

use crate::domain::error::DaytraderError;
use crate::domain::position::Side;
use crate::domain::risk::{AccountSnapshot, OpenPositionView};

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub quantity: u64,
    pub side: Side,
    /// Price the decision was taken at; paper brokers fill here.
    pub reference_price: f64,
    pub stop_price: Option<f64>,
    pub target_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderResult {
    pub order_id: String,
    pub symbol: String,
    pub quantity: u64,
    pub side: Side,
    pub fill_price: Option<f64>,
}

/// Errors are [`DaytraderError::Execution`]; callers log them and carry on.
pub trait ExecutionGateway {
    fn account_snapshot(&self) -> Result<AccountSnapshot, DaytraderError>;

    fn open_positions(&self) -> Result<Vec<OpenPositionView>, DaytraderError>;

    fn submit_order(&mut self, order: &OrderRequest) -> Result<OrderResult, DaytraderError>;

    /// Returns the number of positions closed.
    fn close_all_positions(&mut self) -> Result<usize, DaytraderError>;
}
