//! In-memory report sink, used by tests and the `replay` summary.

use crate::domain::error::DaytraderError;
use crate::domain::metrics::SessionSummary;
use crate::domain::portfolio::ValuationSnapshot;
use crate::domain::position::TradeLogEntry;
use crate::ports::report_port::ReportSink;

#[derive(Debug, Default, Clone)]
pub struct MemoryReportSink {
    pub valuations: Vec<ValuationSnapshot>,
    pub trades: Vec<TradeLogEntry>,
    pub summary: Option<SessionSummary>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for MemoryReportSink {
    fn record_valuation(&mut self, snapshot: &ValuationSnapshot) -> Result<(), DaytraderError> {
        self.valuations.push(snapshot.clone());
        Ok(())
    }

    fn record_trade(&mut self, entry: &TradeLogEntry) -> Result<(), DaytraderError> {
        self.trades.push(entry.clone());
        Ok(())
    }

    fn finish(&mut self, summary: &SessionSummary) -> Result<(), DaytraderError> {
        self.summary = Some(summary.clone());
        Ok(())
    }
}
