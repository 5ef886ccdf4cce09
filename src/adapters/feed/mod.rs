//! Bar Feed: NDJSON replay over TCP.

pub mod client;
pub mod line_buffer;
pub mod server;
pub mod wire;
