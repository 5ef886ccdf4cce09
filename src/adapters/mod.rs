//! Concrete adapter implementations for ports.

pub mod clock;
pub mod csv_adapter;
pub mod csv_report;
pub mod feed;
pub mod file_config_adapter;
pub mod memory_report;
pub mod paper_gateway;
