//! Replay server: streams the shared timeline to every connection.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{info, info_span, warn, Instrument};

use super::wire::encode_group;
use crate::domain::error::DaytraderError;
use crate::domain::timeline::Timeline;
use crate::ports::clock_port::Clock;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct FeedServer<C> {
    listener: TcpListener,
    timeline: Arc<Timeline>,
    clock: C,
    interval: Duration,
}

impl<C> FeedServer<C>
where
    C: Clock + Clone + 'static,
{
    pub async fn bind(
        addr: &str,
        timeline: Arc<Timeline>,
        clock: C,
        interval: Duration,
    ) -> Result<Self, DaytraderError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| DaytraderError::Connection {
                reason: format!("bind {addr}: {e}"),
            })?;
        Ok(Self {
            listener,
            timeline,
            clock,
            interval,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DaytraderError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever. Each connection gets its own task and its
    /// own pass over the timeline; accept errors are logged and retried.
    pub async fn run(self) -> Result<(), DaytraderError> {
        info!(
            addr = %self.local_addr()?,
            groups = self.timeline.len(),
            interval_ms = self.interval.as_millis() as u64,
            "feed server listening"
        );
        let listener = &self.listener;
        loop {
            let (stream, peer) = next_connection(|| listener.accept(), ACCEPT_BACKOFF).await;
            let timeline = Arc::clone(&self.timeline);
            let clock = self.clock.clone();
            let interval = self.interval;
            let span = info_span!("feed_connection", %peer);
            tokio::spawn(
                async move {
                    info!("consumer connected");
                    let (_, mut writer) = stream.into_split();
                    match stream_timeline(&mut writer, &timeline, &clock, interval).await {
                        Ok(sent) => info!(sent, "timeline exhausted; connection closed"),
                        Err(e) => warn!(error = %e, "feed connection ended early"),
                    }
                }
                .instrument(span),
            );
        }
    }
}

/// Calls `accept` until it succeeds, waiting `backoff` after each failure.
/// Failures such as EMFILE or ECONNABORTED are transient for a listener.
pub async fn next_connection<F, Fut, T>(mut accept: F, backoff: Duration) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(connection) => return connection,
            Err(e) => {
                warn!(error = %e, "accept failed; retrying");
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Writes every group as one line, pausing `interval` between sends, then
/// shuts the writer down. Returns the number of groups sent.
pub async fn stream_timeline<W, C>(
    writer: &mut W,
    timeline: &Timeline,
    clock: &C,
    interval: Duration,
) -> Result<usize, DaytraderError>
where
    W: AsyncWrite + Unpin,
    C: Clock,
{
    let mut sent = 0usize;
    for group in timeline.iter() {
        if sent > 0 && !interval.is_zero() {
            clock.pause(interval).await;
        }
        let line = encode_group(group)?;
        writer.write_all(line.as_bytes()).await?;
        sent += 1;
    }
    writer.flush().await?;
    writer.shutdown().await?;
    Ok(sent)
}
