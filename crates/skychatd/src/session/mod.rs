//! Per-connection session state and I/O tasks.
//!
//! A connection is served by two tasks: a [`reader::LineReader`] that turns
//! input lines into commands, and a [`writer::ConnectionWriter`] that owns
//! the write half and drains the session's bounded output queue. The
//! dispatcher owns the [`Session`] value itself.

pub mod reader;
pub mod writer;

use std::collections::VecDeque;
use std::net::SocketAddr;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use skychat_core::crypto::SessionKeys;
use skychat_core::wire::ANONYMOUS;
use skychat_core::{Reply, SessionId};

/// Why a line could not be queued for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The client is not draining its output fast enough.
    Full,
    /// The connection writer has exited.
    Closed,
}

/// One position in a session's output order.
#[derive(Debug)]
enum Slot {
    Ready(Reply),
    /// Answer still being computed by the history worker.
    Pending,
}

/// Live server-side state for one connected client.
///
/// Dropping the `Session` closes the output queue; the writer then flushes
/// what is queued and shuts the stream down.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub addr: SocketAddr,
    /// Registered display name, `None` until `/name` succeeds.
    pub name: Option<String>,
    /// Name of the session this one is addressing.
    pub peer: Option<String>,
    pub keys: SessionKeys,
    outbound: mpsc::Sender<Reply>,
    /// Output held back behind an unanswered history query. Empty whenever
    /// no query is outstanding.
    held: VecDeque<Slot>,
}

impl Session {
    pub fn new(
        id: SessionId,
        addr: SocketAddr,
        keys: SessionKeys,
        outbound: mpsc::Sender<Reply>,
    ) -> Self {
        Self {
            id,
            addr,
            name: None,
            peer: None,
            keys,
            outbound,
            held: VecDeque::new(),
        }
    }

    /// Name shown to other users.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(ANONYMOUS)
    }

    /// Queue a reply without waiting. Replies stay in issue order: while a
    /// history answer is outstanding, later output waits behind it.
    pub fn send(&mut self, reply: Reply) -> Result<(), QueueError> {
        if self.held.is_empty() {
            return self.push(reply);
        }
        if self.held.len() >= self.outbound.max_capacity() {
            return Err(QueueError::Full);
        }
        self.held.push_back(Slot::Ready(reply));
        Ok(())
    }

    /// Reserve the next output position for a history answer.
    pub fn reserve(&mut self) {
        self.held.push_back(Slot::Pending);
    }

    /// Fill the oldest reserved position and release everything that is
    /// now unblocked. Answers arrive in the order they were reserved.
    pub fn complete(&mut self, reply: Reply) -> Result<(), QueueError> {
        match self.held.iter_mut().find(|slot| matches!(slot, Slot::Pending)) {
            Some(slot) => *slot = Slot::Ready(reply),
            None => {
                tracing::debug!(session = %self.id, "history answer without a reservation");
                return Ok(());
            }
        }

        while let Some(Slot::Ready(_)) = self.held.front() {
            let Some(Slot::Ready(reply)) = self.held.pop_front() else {
                break;
            };
            match self.push(reply) {
                Ok(()) => {}
                Err(QueueError::Full) => {
                    tracing::debug!(session = %self.id, "output queue full, held reply dropped");
                }
                Err(QueueError::Closed) => return Err(QueueError::Closed),
            }
        }
        Ok(())
    }

    /// Release held output now, giving up on answers still outstanding.
    /// Used when the session is closing and no answer can follow.
    pub fn release_held(&mut self) {
        for slot in std::mem::take(&mut self.held) {
            if let Slot::Ready(reply) = slot {
                if self.push(reply).is_err() {
                    tracing::debug!(session = %self.id, "held output dropped on close");
                    return;
                }
            }
        }
    }

    /// True while a history answer is outstanding.
    pub fn is_waiting(&self) -> bool {
        !self.held.is_empty()
    }

    fn push(&self, reply: Reply) -> Result<(), QueueError> {
        self.outbound.try_send(reply).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }
}
