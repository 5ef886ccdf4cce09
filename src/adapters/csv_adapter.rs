//! CSV bar files: `timestamp,symbol,open,high,low,close,volume[,vwap]`.
//!
//! Extra columns are ignored. Several files merge into one timeline.

use crate::domain::error::DaytraderError;
use crate::domain::ohlcv::{parse_timestamp, Bar};
use crate::domain::timeline::Timeline;
use crate::ports::data_port::DataPort;
use serde::Deserialize;
use std::fs::File;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct BarRecord {
    timestamp: String,
    symbol: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default)]
    vwap: Option<f64>,
}

pub struct CsvAdapter {
    files: Vec<PathBuf>,
}

impl CsvAdapter {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    pub fn load_timeline(&self) -> Result<Timeline, DaytraderError> {
        let timeline = Timeline::from_bars(self.load_bars()?);
        info!(
            groups = timeline.len(),
            bars = timeline.bar_count(),
            symbols = timeline.symbols().len(),
            "timeline built"
        );
        Ok(timeline)
    }

    fn read_file(path: &PathBuf, bars: &mut Vec<Bar>) -> Result<usize, DaytraderError> {
        let file = File::open(path).map_err(|e| DaytraderError::data(
            "*",
            format!("failed to open {}: {}", path.display(), e),
        ))?;
        let mut reader = csv::Reader::from_reader(file);
        let mut skipped = 0usize;

        for (index, result) in reader.deserialize::<BarRecord>().enumerate() {
            let row = index + 2;
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!(file = %path.display(), row, error = %e, "skipping unparsable row");
                    skipped += 1;
                    continue;
                }
            };
            let Some(timestamp) = parse_timestamp(&record.timestamp) else {
                warn!(
                    file = %path.display(),
                    row,
                    timestamp = %record.timestamp,
                    "skipping row with bad timestamp"
                );
                skipped += 1;
                continue;
            };
            let bar = Bar {
                symbol: record.symbol.trim().to_string(),
                timestamp,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume,
                vwap: record.vwap,
            };
            if let Err(reason) = bar.validate() {
                warn!(
                    file = %path.display(),
                    row,
                    symbol = %bar.symbol,
                    %reason,
                    "skipping invalid bar"
                );
                skipped += 1;
                continue;
            }
            bars.push(bar);
        }
        Ok(skipped)
    }
}

impl DataPort for CsvAdapter {
    fn load_bars(&self) -> Result<Vec<Bar>, DaytraderError> {
        let mut bars = Vec::new();
        for path in &self.files {
            let before = bars.len();
            let skipped = Self::read_file(path, &mut bars)?;
            info!(file = %path.display(), loaded = bars.len() - before, skipped, "read bar file");
        }
        Ok(bars)
    }
}
