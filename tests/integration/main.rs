//! skychat integration test harness.
//!
//! Every test starts its own relay on an ephemeral loopback port and talks
//! to it over real TCP connections:
//!
//!   cargo test --test integration
//!
//! The relay is shut down when its [`Relay`] handle is dropped.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use skychat_core::config::ServerConfig;
use skychat_services::{MemoryHistory, SharedHistory};

mod chat;
mod history;
mod lifecycle;

// ── Harness ───────────────────────────────────────────────────────────────────

/// How long a test waits for any single line.
pub const LINE_TIMEOUT: Duration = Duration::from_secs(5);

/// A relay running in the test's runtime.
pub struct Relay {
    pub addr: SocketAddr,
    shutdown: broadcast::Sender<()>,
}

impl Relay {
    /// Default config, in-memory history.
    pub async fn start() -> Result<Self> {
        let store: SharedHistory = std::sync::Arc::new(MemoryHistory::new());
        Self::start_with(ServerConfig::default(), Some(store)).await
    }

    pub async fn start_with(config: ServerConfig, history: Option<SharedHistory>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind test listener")?;
        let addr = listener.local_addr()?;
        let (shutdown, _) = broadcast::channel(1);

        let tx = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = skychatd::serve(listener, config, history, tx).await {
                eprintln!("relay exited with error: {e:#}");
            }
        });

        Ok(Self { addr, shutdown })
    }

    pub async fn connect(&self) -> Result<TestClient> {
        TestClient::connect(self.addr).await
    }

    pub fn stop(&self) {
        let _ = self.shutdown.send(());
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A line-oriented client connection.
pub struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("failed to connect to relay at {addr}"))?;
        let (read_half, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        })
    }

    pub async fn send(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }

    /// Next line from the relay, without its terminator.
    pub async fn line(&mut self) -> Result<String> {
        match tokio::time::timeout(LINE_TIMEOUT, self.lines.next_line()).await {
            Ok(Ok(Some(line))) => Ok(line),
            Ok(Ok(None)) => bail!("relay closed the connection"),
            Ok(Err(e)) => Err(e).context("read from relay failed"),
            Err(_) => bail!("no line from relay within {LINE_TIMEOUT:?}"),
        }
    }

    /// Send `line` and return the first line of the answer.
    pub async fn ask(&mut self, line: &str) -> Result<String> {
        self.send(line).await?;
        self.line().await
    }

    /// Connect and register under `name`.
    pub async fn named(relay: &Relay, name: &str) -> Result<Self> {
        let mut client = relay.connect().await?;
        let reply = client.ask(&format!("/name {name}")).await?;
        if reply != format!("> you will be known as {name}") {
            bail!("registering {name} failed: {reply}");
        }
        Ok(client)
    }

    /// Wait for the relay to close this connection.
    pub async fn expect_closed(&mut self) -> Result<()> {
        loop {
            match tokio::time::timeout(LINE_TIMEOUT, self.lines.next_line()).await {
                Ok(Ok(None)) | Ok(Err(_)) => return Ok(()),
                Ok(Ok(Some(_))) => continue,
                Err(_) => bail!("connection still open after {LINE_TIMEOUT:?}"),
            }
        }
    }
}

/// Ask `client` for `/list` until `pred` holds on the reply.
pub async fn wait_for_list(
    client: &mut TestClient,
    pred: impl Fn(&str) -> bool,
) -> Result<String> {
    for _ in 0..50 {
        let reply = client.ask("/list").await?;
        if pred(&reply) {
            return Ok(reply);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    bail!("list never reached the expected state")
}
