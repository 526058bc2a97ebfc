//! Accept loop and per-connection task wiring.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot};

use skychat_core::config::ServerConfig;
use skychat_core::crypto::SessionKeys;
use skychat_core::SessionId;
use skychat_services::SharedHistory;

use crate::dispatch::{DispatchEvent, Dispatcher};
use crate::history::{HistoryHandle, HistoryWorker};
use crate::session::reader::LineReader;
use crate::session::writer::ConnectionWriter;
use crate::session::Session;

/// Run the relay on `listener` until `shutdown` fires.
///
/// `history` is `None` when the history backend is disabled.
pub async fn serve(
    listener: TcpListener,
    config: ServerConfig,
    history: Option<SharedHistory>,
    shutdown: broadcast::Sender<()>,
) -> Result<()> {
    let local = listener.local_addr().context("listener has no local address")?;
    tracing::info!(addr = %local, "skychat relay listening");

    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let handle = match history {
        Some(store) => {
            let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
            let worker =
                HistoryWorker::new(store, jobs_rx, events_tx.clone(), shutdown.subscribe());
            tokio::spawn(worker.run());
            HistoryHandle::new(jobs_tx)
        }
        None => HistoryHandle::disabled(),
    };

    let dispatcher = Dispatcher::new(handle);
    tokio::spawn(dispatcher.run(events_rx, shutdown.subscribe()));

    let mut shutdown_rx = shutdown.subscribe();
    let mut next_id: u64 = 1;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("accept loop shutting down");
                return Ok(());
            }

            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        continue;
                    }
                };

                let id = SessionId(next_id);
                next_id += 1;
                tracing::debug!(session = %id, %addr, "connection accepted");

                if let Err(e) = attach(id, stream, addr, &config, &events_tx, &shutdown) {
                    tracing::warn!(session = %id, error = %e, "failed to start session");
                }
            }
        }
    }
}

fn attach(
    id: SessionId,
    stream: TcpStream,
    addr: std::net::SocketAddr,
    config: &ServerConfig,
    events: &mpsc::UnboundedSender<DispatchEvent>,
    shutdown: &broadcast::Sender<()>,
) -> Result<()> {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(session = %id, error = %e, "failed to set TCP_NODELAY");
    }
    let (read_half, write_half) = stream.into_split();

    let (out_tx, out_rx) = mpsc::channel(config.outbound_queue.max(1));
    let (closed_tx, closed_rx) = oneshot::channel();

    let session = Session::new(id, addr, SessionKeys::generate(), out_tx);
    events
        .send(DispatchEvent::Attach(session))
        .context("dispatcher is not running")?;

    let writer = ConnectionWriter::new(id, write_half, out_rx, config.write_timeout(), closed_tx);
    tokio::spawn(writer.run());

    let reader = LineReader::new(
        id,
        read_half,
        events.clone(),
        closed_rx,
        shutdown.subscribe(),
        config.max_line_bytes.max(1),
    );
    tokio::spawn(reader.run());
    Ok(())
}
