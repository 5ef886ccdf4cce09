//! NDJSON wire format: one bar group per line.
//!
//! `{"timestamp": "...", "data": [{"symbol": ..., "open": ..., ...}, ...]}`
//!
//! Numeric fields are accepted as JSON numbers or numeric strings, since
//! feeds that forward CSV cells verbatim send everything as strings. Unknown
//! fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::DaytraderError;
use crate::domain::ohlcv::{parse_timestamp, Bar};
use crate::domain::timeline::BarGroup;

const WIRE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Serialize)]
struct OutgoingBar<'a> {
    symbol: &'a str,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    vwap: Option<f64>,
}

#[derive(Serialize)]
struct OutgoingMessage<'a> {
    timestamp: String,
    data: Vec<OutgoingBar<'a>>,
}

#[derive(Deserialize)]
struct IncomingMessage {
    timestamp: String,
    #[serde(default)]
    data: Vec<Value>,
}

/// One decoded line. Entries that failed to decode are reported next to the
/// group instead of failing the whole message.
#[derive(Debug)]
pub struct DecodedGroup {
    pub group: BarGroup,
    pub rejected: Vec<DaytraderError>,
}

/// Serializes a group as one newline-terminated line.
pub fn encode_group(group: &BarGroup) -> Result<String, DaytraderError> {
    let message = OutgoingMessage {
        timestamp: group.timestamp.format(WIRE_TIMESTAMP_FORMAT).to_string(),
        data: group
            .bars
            .iter()
            .map(|b| OutgoingBar {
                symbol: &b.symbol,
                open: b.open,
                high: b.high,
                low: b.low,
                close: b.close,
                volume: b.volume,
                vwap: b.vwap,
            })
            .collect(),
    };
    Ok(serde_json::to_string(&message)? + "\n")
}

/// Decodes one line. Fails only when the envelope itself is unusable.
pub fn decode_line(line: &str) -> Result<DecodedGroup, DaytraderError> {
    let message: IncomingMessage = serde_json::from_str(line.trim())?;
    let timestamp = parse_timestamp(&message.timestamp).ok_or_else(|| {
        DaytraderError::data("*", format!("bad message timestamp {:?}", message.timestamp))
    })?;

    let mut bars = Vec::with_capacity(message.data.len());
    let mut rejected = Vec::new();
    for entry in &message.data {
        match decode_entry(entry, timestamp) {
            Ok(bar) => bars.push(bar),
            Err(e) => rejected.push(e),
        }
    }
    Ok(DecodedGroup {
        group: BarGroup { timestamp, bars },
        rejected,
    })
}

fn decode_entry(entry: &Value, timestamp: chrono::NaiveDateTime) -> Result<Bar, DaytraderError> {
    let symbol = entry
        .get("symbol")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DaytraderError::data("?", "entry without symbol"))?;

    let field = |name: &str| -> Result<f64, DaytraderError> {
        lenient_number(entry.get(name))
            .ok_or_else(|| DaytraderError::data(symbol, format!("missing or non-numeric {name}")))
    };

    Ok(Bar {
        symbol: symbol.to_string(),
        timestamp,
        open: field("open")?,
        high: field("high")?,
        low: field("low")?,
        close: field("close")?,
        volume: field("volume")?,
        vwap: lenient_number(entry.get("vwap")),
    })
}

fn lenient_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn group() -> BarGroup {
        let timestamp = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        BarGroup {
            timestamp,
            bars: vec![
                Bar {
                    symbol: "AAPL".into(),
                    timestamp,
                    open: 180.0,
                    high: 181.5,
                    low: 179.25,
                    close: 181.0,
                    volume: 12000.0,
                    vwap: Some(180.4),
                },
                Bar {
                    symbol: "^GSPC".into(),
                    timestamp,
                    open: 5000.0,
                    high: 5010.0,
                    low: 4990.0,
                    close: 5005.0,
                    volume: 0.0,
                    vwap: None,
                },
            ],
        }
    }

    #[test]
    fn encoded_line_decodes_to_same_group() {
        let line = encode_group(&group()).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        assert!(!line.contains("\"vwap\":null"));

        let decoded = decode_line(&line).unwrap();
        assert!(decoded.rejected.is_empty());
        assert_eq!(decoded.group, group());
    }

    #[test]
    fn numeric_strings_and_extra_columns_are_accepted() {
        let line = r#"{"timestamp": "2024-05-06 09:30:00", "data": [
            {"timestamp": "2024-05-06 09:30:00", "symbol": "MSFT", "open": "410.1",
             "high": "411", "low": "409.5", "close": "410.8", "volume": "3500",
             "vwap": "", "trade_count": "17"}]}"#;
        let decoded = decode_line(&line.replace('\n', " ")).unwrap();
        assert_eq!(decoded.group.bars.len(), 1);
        let bar = &decoded.group.bars[0];
        assert_eq!(bar.symbol, "MSFT");
        assert!((bar.open - 410.1).abs() < f64::EPSILON);
        assert!((bar.volume - 3500.0).abs() < f64::EPSILON);
        assert_eq!(bar.vwap, None);
    }

    #[test]
    fn bad_entries_are_rejected_individually() {
        let line = r#"{"timestamp":"2024-05-06T09:31:00","data":[{"symbol":"A","open":1,"high":2,"low":1,"close":"x","volume":1},{"open":1},{"symbol":"B","open":1,"high":2,"low":1,"close":1.5,"volume":1}]}"#;
        let decoded = decode_line(line).unwrap();
        assert_eq!(decoded.group.bars.len(), 1);
        assert_eq!(decoded.group.bars[0].symbol, "B");
        assert_eq!(decoded.rejected.len(), 2);
        assert!(decoded
            .rejected
            .iter()
            .all(|e| matches!(e, DaytraderError::Data { .. })));
    }

    #[test]
    fn malformed_envelopes_fail() {
        assert!(matches!(decode_line("{not json"), Err(DaytraderError::Json(_))));
        assert!(matches!(
            decode_line(r#"{"data": []}"#),
            Err(DaytraderError::Json(_))
        ));
        assert!(matches!(
            decode_line(r#"{"timestamp": "soon", "data": []}"#),
            Err(DaytraderError::Data { .. })
        ));
    }
}
