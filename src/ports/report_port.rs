//! Reporting sink port: one record per valuation tick and per trade.

use crate::domain::error::DaytraderError;
use crate::domain::metrics::SessionSummary;
use crate::domain::portfolio::ValuationSnapshot;
use crate::domain::position::TradeLogEntry;

pub trait ReportSink {
    fn record_valuation(&mut self, snapshot: &ValuationSnapshot) -> Result<(), DaytraderError>;

    fn record_trade(&mut self, entry: &TradeLogEntry) -> Result<(), DaytraderError>;

    /// Called once when the session ends. Flushes buffered output.
    fn finish(&mut self, _summary: &SessionSummary) -> Result<(), DaytraderError> {
        Ok(())
    }
}
