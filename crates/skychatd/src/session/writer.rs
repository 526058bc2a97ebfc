//! Connection writer: owns the write half and drains the output queue.

use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use skychat_core::{Reply, SessionId};

pub struct ConnectionWriter<W> {
    id: SessionId,
    stream: W,
    outbound: mpsc::Receiver<Reply>,
    write_timeout: Duration,
    // Dropped on exit; wakes the line reader.
    _closed: oneshot::Sender<()>,
}

impl<W: AsyncWrite + Unpin> ConnectionWriter<W> {
    pub fn new(
        id: SessionId,
        stream: W,
        outbound: mpsc::Receiver<Reply>,
        write_timeout: Duration,
        closed: oneshot::Sender<()>,
    ) -> Self {
        Self {
            id,
            stream,
            outbound,
            write_timeout,
            _closed: closed,
        }
    }

    /// Write queued replies until every sender is dropped or a write fails.
    pub async fn run(mut self) {
        while let Some(reply) = self.outbound.recv().await {
            let line = reply.encode();
            match timeout(self.write_timeout, self.stream.write_all(line.as_bytes())).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(session = %self.id, error = %e, "write failed");
                    return;
                }
                Err(_) => {
                    tracing::warn!(
                        session = %self.id,
                        timeout_ms = self.write_timeout.as_millis() as u64,
                        "write timed out, dropping connection"
                    );
                    return;
                }
            }
        }

        if let Err(e) = self.stream.shutdown().await {
            tracing::trace!(session = %self.id, error = %e, "shutdown after drain failed");
        }
        tracing::debug!(session = %self.id, "connection writer finished");
    }
}
