//! Port traits the domain talks through.

pub mod clock_port;
pub mod config_port;
pub mod data_port;
pub mod execution_port;
pub mod report_port;
