//! Feed consumer: reads groups off a stream and drives a trading session.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tracing::{info, info_span, warn, Instrument};

use super::line_buffer::LineBuffer;
use super::wire::decode_line;
use crate::domain::error::DaytraderError;
use crate::domain::metrics::SessionSummary;
use crate::domain::session::TradingSession;
use crate::ports::report_port::ReportSink;

const READ_CHUNK: usize = 64 * 1024;

/// Why the stream stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEnd {
    Eof,
    IdleTimeout(Duration),
    ReadError(String),
}

impl fmt::Display for StreamEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamEnd::Eof => write!(f, "end of stream"),
            StreamEnd::IdleTimeout(d) => write!(f, "no data for {}s", d.as_secs_f64()),
            StreamEnd::ReadError(e) => write!(f, "read error: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientReport {
    pub groups: usize,
    pub skipped_messages: usize,
    pub rejected_entries: usize,
    pub end: StreamEnd,
    pub summary: SessionSummary,
}

/// Consumes `reader` until EOF, a read error or `idle_timeout` without data,
/// then finishes the session. Only sink failures are returned as errors.
pub async fn consume<R, S>(
    mut reader: R,
    session: &mut TradingSession<S>,
    idle_timeout: Duration,
) -> Result<ClientReport, DaytraderError>
where
    R: AsyncRead + Unpin,
    S: ReportSink,
{
    let mut buffer = LineBuffer::default();
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut groups = 0usize;
    let mut skipped_messages = 0usize;
    let mut rejected_entries = 0usize;

    let end = loop {
        let read = match tokio::time::timeout(idle_timeout, reader.read(&mut chunk)).await {
            Err(_) => break StreamEnd::IdleTimeout(idle_timeout),
            Ok(Err(e)) => break StreamEnd::ReadError(e.to_string()),
            Ok(Ok(0)) => break StreamEnd::Eof,
            Ok(Ok(n)) => n,
        };
        if let Err(e) = buffer.push(&chunk[..read]) {
            break StreamEnd::ReadError(e.to_string());
        }
        while let Some(line) = buffer.next_line() {
            match handle_line(&line, session)? {
                Some(rejected) => {
                    groups += 1;
                    rejected_entries += rejected;
                }
                None => skipped_messages += 1,
            }
        }
    };

    if end == StreamEnd::Eof {
        if let Some(line) = buffer.take_remainder() {
            match handle_line(&line, session)? {
                Some(rejected) => {
                    groups += 1;
                    rejected_entries += rejected;
                }
                None => skipped_messages += 1,
            }
        }
    }

    match &end {
        StreamEnd::Eof => info!(groups, "feed finished"),
        other => warn!(groups, reason = %other, "feed interrupted"),
    }
    let summary = session.finish()?;
    Ok(ClientReport {
        groups,
        skipped_messages,
        rejected_entries,
        end,
        summary,
    })
}

/// `Some(rejected entry count)` when the line was processed, `None` when the
/// whole message was skipped.
fn handle_line<S: ReportSink>(
    line: &str,
    session: &mut TradingSession<S>,
) -> Result<Option<usize>, DaytraderError> {
    let decoded = match decode_line(line) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(error = %e, "skipping malformed message");
            return Ok(None);
        }
    };
    for rejected in &decoded.rejected {
        warn!(timestamp = %decoded.group.timestamp, error = %rejected, "skipping entry");
    }
    session.process_group(&decoded.group)?;
    Ok(Some(decoded.rejected.len()))
}

/// Connects to a feed server and trades until the stream ends.
pub async fn connect_and_consume<S: ReportSink>(
    addr: &str,
    session: &mut TradingSession<S>,
    idle_timeout: Duration,
) -> Result<ClientReport, DaytraderError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| DaytraderError::Connection {
            reason: format!("connect {addr}: {e}"),
        })?;
    info!(%addr, "connected to feed");
    consume(stream, session, idle_timeout)
        .instrument(info_span!("trading_session", %addr))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_report::MemoryReportSink;
    use crate::domain::ledger::{LedgerConfig, PositionLedger};
    use crate::domain::risk::RiskParameters;
    use crate::domain::strategy::{IndicatorEngine, StrategyConfig};

    fn session() -> TradingSession<MemoryReportSink> {
        TradingSession::new(
            IndicatorEngine::new(StrategyConfig::default()),
            RiskParameters::default(),
            PositionLedger::new(LedgerConfig::default()),
            MemoryReportSink::new(),
        )
    }

    const LINE_A: &str = r#"{"timestamp":"2024-02-01 10:00:00","data":[{"symbol":"AAPL","open":10,"high":11,"low":9,"close":10.5,"volume":100}]}"#;
    const LINE_B: &str = r#"{"timestamp":"2024-02-01 10:01:00","data":[{"symbol":"AAPL","open":10,"high":11,"low":9,"close":10.7,"volume":100},{"symbol":"BAD"}]}"#;

    #[tokio::test]
    async fn processes_lines_until_eof() {
        let input = format!("{LINE_A}\ngarbage\n{LINE_B}");
        let mut session = session();
        let report = consume(input.as_bytes(), &mut session, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(report.end, StreamEnd::Eof);
        assert_eq!(report.groups, 2);
        assert_eq!(report.skipped_messages, 1);
        assert_eq!(report.rejected_entries, 1);
        assert_eq!(report.summary.ticks, 2);

        let sink = session.sink();
        assert_eq!(sink.valuations.len(), 2);
        assert!(sink.summary.is_some());
        assert_eq!(session.engine().history_len("AAPL"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_stream_times_out_and_finishes() {
        let (client, mut server) = tokio::io::duplex(1024);
        tokio::io::AsyncWriteExt::write_all(&mut server, format!("{LINE_A}\n").as_bytes())
            .await
            .unwrap();

        let mut session = session();
        let report = consume(client, &mut session, Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(report.end, StreamEnd::IdleTimeout(Duration::from_secs(30)));
        assert_eq!(report.groups, 1);
        assert!(session.sink().summary.is_some());
        drop(server);
    }

    #[tokio::test]
    async fn connect_failure_is_connection_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut session = session();
        let result = connect_and_consume(&addr, &mut session, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(DaytraderError::Connection { .. })));
    }
}
