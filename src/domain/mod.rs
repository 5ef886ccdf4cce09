//! Core domain types and logic.

pub mod ohlcv;
pub mod history;
pub mod indicator;
pub mod signal;
pub mod strategy;
pub mod risk;
pub mod position;
pub mod portfolio;
pub mod ledger;
pub mod timeline;
pub mod session;
pub mod metrics;
pub mod config_validation;
pub mod error;
