//! CSV report sink: a trade execution log and a per-tick session report.

use crate::domain::error::DaytraderError;
use crate::domain::metrics::SessionSummary;
use crate::domain::portfolio::ValuationSnapshot;
use crate::domain::position::TradeLogEntry;
use crate::ports::report_port::ReportSink;
use csv::Writer;
use std::fs::File;
use std::path::Path;
use tracing::info;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TRADE_HEADER: [&str; 8] = [
    "timestamp",
    "symbol",
    "action",
    "side",
    "price",
    "quantity",
    "realized_pnl",
    "reason",
];

const VALUATION_HEADER: [&str; 6] = [
    "timestamp",
    "total_value",
    "cash",
    "realized_pnl",
    "unrealized_pnl",
    "positions",
];

fn report_error(e: impl std::fmt::Display) -> DaytraderError {
    DaytraderError::Report {
        reason: e.to_string(),
    }
}

fn open_writer(path: &Path, header: &[&str]) -> Result<Writer<File>, DaytraderError> {
    let mut writer = Writer::from_path(path)
        .map_err(|e| report_error(format!("{}: {}", path.display(), e)))?;
    writer.write_record(header).map_err(report_error)?;
    Ok(writer)
}

/// Either log may be disabled by passing `None`.
pub struct CsvReportSink {
    trades: Option<Writer<File>>,
    valuations: Option<Writer<File>>,
}

impl CsvReportSink {
    pub fn create(
        trade_log: Option<&Path>,
        valuation_log: Option<&Path>,
    ) -> Result<Self, DaytraderError> {
        let trades = trade_log
            .map(|p| open_writer(p, &TRADE_HEADER))
            .transpose()?;
        let valuations = valuation_log
            .map(|p| open_writer(p, &VALUATION_HEADER))
            .transpose()?;
        Ok(Self { trades, valuations })
    }
}

impl ReportSink for CsvReportSink {
    fn record_valuation(&mut self, snapshot: &ValuationSnapshot) -> Result<(), DaytraderError> {
        let Some(writer) = self.valuations.as_mut() else {
            return Ok(());
        };
        writer
            .write_record([
                snapshot.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                format!("{:.2}", snapshot.total_value),
                format!("{:.2}", snapshot.cash),
                format!("{:.2}", snapshot.realized_pnl),
                format!("{:.2}", snapshot.unrealized_pnl),
                snapshot.open_positions.to_string(),
            ])
            .map_err(report_error)
    }

    fn record_trade(&mut self, entry: &TradeLogEntry) -> Result<(), DaytraderError> {
        let Some(writer) = self.trades.as_mut() else {
            return Ok(());
        };
        writer
            .write_record([
                entry.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                entry.symbol.clone(),
                entry.action.to_string(),
                entry.side.to_string(),
                format!("{:.4}", entry.price),
                entry.quantity.to_string(),
                entry
                    .realized_pnl
                    .map(|p| format!("{:.2}", p))
                    .unwrap_or_default(),
                entry.reason.to_string(),
            ])
            .map_err(report_error)
    }

    fn finish(&mut self, summary: &SessionSummary) -> Result<(), DaytraderError> {
        for writer in [self.trades.as_mut(), self.valuations.as_mut()]
            .into_iter()
            .flatten()
        {
            writer.flush()?;
        }
        info!(
            trades = summary.entries + summary.exits,
            ticks = summary.ticks,
            "csv reports flushed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::portfolio::Portfolio;
    use crate::domain::position::{ExitReason, Side, TradeAction};
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn ts(hour: u32, minute: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn writes_trade_and_valuation_rows() {
        let dir = TempDir::new().unwrap();
        let trades = dir.path().join("trades.csv");
        let valuations = dir.path().join("session.csv");
        let mut sink = CsvReportSink::create(Some(&trades), Some(&valuations)).unwrap();

        sink.record_trade(&TradeLogEntry {
            timestamp: ts(10, 0),
            symbol: "AAPL".into(),
            action: TradeAction::Close,
            side: Side::Buy,
            price: 104.0,
            quantity: 10,
            realized_pnl: Some(40.0),
            reason: ExitReason::TakeProfit,
        })
        .unwrap();
        sink.record_valuation(&ValuationSnapshot {
            timestamp: ts(10, 0),
            total_value: 100040.0,
            cash: 100040.0,
            realized_pnl: 40.0,
            unrealized_pnl: 0.0,
            open_positions: 0,
        })
        .unwrap();
        sink.finish(&SessionSummary::compute(&Portfolio::new(100000.0)))
            .unwrap();

        let trade_text = fs::read_to_string(&trades).unwrap();
        let lines: Vec<&str> = trade_text.lines().collect();
        assert_eq!(
            lines[0],
            "timestamp,symbol,action,side,price,quantity,realized_pnl,reason"
        );
        assert_eq!(
            lines[1],
            "2024-03-04 10:00:00,AAPL,CLOSE,BUY,104.0000,10,40.00,take_profit"
        );

        let valuation_text = fs::read_to_string(&valuations).unwrap();
        let lines: Vec<&str> = valuation_text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "2024-03-04 10:00:00,100040.00,100040.00,40.00,0.00,0");
    }

    #[test]
    fn open_entries_leave_pnl_empty() {
        let dir = TempDir::new().unwrap();
        let trades = dir.path().join("trades.csv");
        let mut sink = CsvReportSink::create(Some(&trades), None).unwrap();
        sink.record_trade(&TradeLogEntry {
            timestamp: ts(9, 45),
            symbol: "MSFT".into(),
            action: TradeAction::Open,
            side: Side::Sell,
            price: 50.0,
            quantity: 3,
            realized_pnl: None,
            reason: ExitReason::Signal,
        })
        .unwrap();
        sink.finish(&SessionSummary::compute(&Portfolio::new(1000.0)))
            .unwrap();

        let text = fs::read_to_string(&trades).unwrap();
        assert!(text.lines().nth(1).unwrap().ends_with(",3,,signal"));
    }

    #[test]
    fn bad_path_is_report_error() {
        let result = CsvReportSink::create(Some(Path::new("/nonexistent/dir/t.csv")), None);
        assert!(matches!(result, Err(DaytraderError::Report { .. })));
    }
}
