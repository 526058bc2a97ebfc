//! Dispatcher: the single task that owns every session and the directory.
//!
//! Line readers and the accept loop only ever send [`DispatchEvent`]s. The
//! dispatcher applies them one at a time, in arrival order, so directory
//! updates need no locking. Output is queued with `try_send`; a client
//! that stops reading never holds the loop up. History answers come back
//! as events too and take the output position their query reserved.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use skychat_core::command::{HistoryKind, HistoryQuery, ParseError};
use skychat_core::crypto::CryptoError;
use skychat_core::wire::{self, Reply};
use skychat_core::{Command, CommandKind, NewMessage, SessionId};
use skychat_services::{Directory, DirectoryError};

use crate::delivery::seal_for;
use crate::history::HistoryHandle;
use crate::session::{QueueError, Session};

#[derive(Debug)]
pub enum DispatchEvent {
    /// A connection was accepted. Always precedes its commands.
    Attach(Session),
    Command(Command),
    /// A history worker answer for the query `session` issued earlier.
    HistoryReply { session: SessionId, reply: Reply },
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why a command could not be applied. Reported to the issuing session only.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Protocol(#[from] ParseError),

    #[error("{}", wire::unknown_command(.0))]
    Unrecognized(String),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("{}", wire::NAME_TAKEN)]
    NameTaken,

    #[error("'{}' is reserved. Please choose another name", wire::ANONYMOUS)]
    Reserved,

    #[error("{}", wire::UNKNOWN_PEER)]
    UnknownPeer,

    #[error("{}", wire::NO_PEER)]
    NoPeer,

    #[error("{}", wire::NAME_REQUIRED)]
    NameRequired,

    #[error("{}", wire::HISTORY_DISABLED)]
    HistoryDisabled,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("could not encrypt message for {peer}: {source}")]
    Seal { peer: String, source: CryptoError },

    #[error("{0} is not receiving messages right now")]
    Busy(String),

    #[error("{0} has left")]
    Gone(String),
}

impl From<DirectoryError> for StateError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::NameTaken(_) => StateError::NameTaken,
            DirectoryError::Reserved(_) => StateError::Reserved,
        }
    }
}

impl CommandError {
    /// Lines written back to the issuing client.
    ///
    /// State feedback goes out as normal output; clients match on its text.
    pub fn replies(&self) -> Vec<Reply> {
        match self {
            CommandError::Protocol(_) | CommandError::Delivery(_) => {
                vec![Reply::error(self.to_string())]
            }
            CommandError::Unrecognized(_) => {
                vec![Reply::error(self.to_string()), Reply::info(wire::HELP_HINT)]
            }
            CommandError::State(_) => vec![Reply::info(self.to_string())],
        }
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

pub struct Dispatcher {
    directory: Directory,
    sessions: HashMap<SessionId, Session>,
    history: HistoryHandle,
}

impl Dispatcher {
    pub fn new(history: HistoryHandle) -> Self {
        Self {
            directory: Directory::new(),
            sessions: HashMap::new(),
            history,
        }
    }

    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<DispatchEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(sessions = self.sessions.len(), "dispatcher shutting down");
                    return;
                }

                event = events.recv() => {
                    match event {
                        Some(event) => self.apply(event),
                        None => {
                            tracing::info!("event channel closed, dispatcher exiting");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Apply one event. Never fails; command errors go back to the client.
    pub fn apply(&mut self, event: DispatchEvent) {
        match event {
            DispatchEvent::Attach(session) => {
                tracing::debug!(
                    session = %session.id,
                    addr = %session.addr,
                    key = %session.keys.fingerprint(),
                    "session attached"
                );
                self.sessions.insert(session.id, session);
            }
            DispatchEvent::Command(cmd) => self.handle(cmd),
            DispatchEvent::HistoryReply { session, reply } => self.history_reply(session, reply),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn registered_count(&self) -> usize {
        self.directory.len()
    }

    fn handle(&mut self, cmd: Command) {
        let id = cmd.session;
        if !self.sessions.contains_key(&id) {
            // Queued before its session quit.
            tracing::trace!(session = %id, kind = ?cmd.kind, "command for departed session ignored");
            return;
        }

        let result = match &cmd.kind {
            CommandKind::SetName => self.set_name(&cmd),
            CommandKind::JoinPeer => self.join_peer(&cmd),
            CommandKind::ListPeers => self.list_peers(id),
            CommandKind::SendMessage => self.send_message(&cmd),
            CommandKind::Quit => {
                self.disconnect(id);
                Ok(())
            }
            CommandKind::Help => {
                self.reply(id, Reply::info(wire::HELP));
                Ok(())
            }
            CommandKind::History(kind) => self.history_query(id, *kind, &cmd.args),
            CommandKind::Unrecognized(word) => Err(CommandError::Unrecognized(word.clone())),
            CommandKind::Rejected(e) => Err(e.clone().into()),
        };

        if let Err(e) = result {
            tracing::debug!(session = %id, error = %e, "command failed");
            for reply in e.replies() {
                self.reply(id, reply);
            }
        }
    }

    fn set_name(&mut self, cmd: &Command) -> Result<(), CommandError> {
        let requested = cmd.single_arg()?;
        let Some(session) = self.sessions.get_mut(&cmd.session) else {
            return Ok(());
        };

        self.directory
            .register(session.id, session.name.as_deref(), requested)
            .map_err(StateError::from)?;

        tracing::info!(
            session = %session.id,
            previous = session.name.as_deref().unwrap_or(wire::ANONYMOUS),
            name = requested,
            "name registered"
        );
        session.name = Some(requested.to_string());
        self.reply(cmd.session, Reply::info(wire::registered(requested)));
        Ok(())
    }

    fn join_peer(&mut self, cmd: &Command) -> Result<(), CommandError> {
        let peer = cmd.single_arg()?;
        if self.directory.lookup(peer).is_none() {
            return Err(StateError::UnknownPeer.into());
        }
        if let Some(session) = self.sessions.get_mut(&cmd.session) {
            session.peer = Some(peer.to_string());
        }
        self.reply(cmd.session, Reply::info(wire::talking_to(peer)));
        Ok(())
    }

    fn list_peers(&mut self, id: SessionId) -> Result<(), CommandError> {
        let own = self.sessions.get(&id).and_then(|s| s.name.as_deref());
        let names = self.directory.list_others(own);
        self.reply(id, Reply::info(wire::available_users(&names)));
        Ok(())
    }

    fn send_message(&mut self, cmd: &Command) -> Result<(), CommandError> {
        let body = cmd.body()?;
        let Some(sender) = self.sessions.get(&cmd.session) else {
            return Ok(());
        };

        // Re-resolve on every message; the peer may have left or renamed.
        let peer_name = sender.peer.clone().ok_or(StateError::NoPeer)?;
        let recipient = self
            .directory
            .lookup(&peer_name)
            .and_then(|rid| self.sessions.get(&rid))
            .ok_or(StateError::NoPeer)?;

        let line = wire::chat_line(sender.display_name(), &body);
        let sealed = seal_for(sender, recipient, &line).map_err(|source| DeliveryError::Seal {
            peer: peer_name.clone(),
            source,
        })?;

        let from = sender.display_name().to_string();
        let recipient_id = recipient.id;
        let Some(recipient) = self.sessions.get_mut(&recipient_id) else {
            return Err(StateError::NoPeer.into());
        };
        match recipient.send(Reply::info(sealed)) {
            Ok(()) => {}
            Err(QueueError::Full) => {
                tracing::warn!(session = %recipient_id, "output queue full, message dropped");
                return Err(DeliveryError::Busy(peer_name).into());
            }
            Err(QueueError::Closed) => {
                self.disconnect(recipient_id);
                return Err(DeliveryError::Gone(peer_name).into());
            }
        }

        tracing::debug!(from = %from, to = %peer_name, bytes = body.len(), "message delivered");
        self.history.store(NewMessage::new(from, peer_name, body));
        Ok(())
    }

    fn history_query(
        &mut self,
        id: SessionId,
        kind: HistoryKind,
        args: &[String],
    ) -> Result<(), CommandError> {
        let Some(session) = self.sessions.get_mut(&id) else {
            return Ok(());
        };
        let name = session.name.clone().ok_or(StateError::NameRequired)?;
        let query = HistoryQuery::parse(kind, args)?;

        if !self.history.query(id, name, query) {
            return Err(StateError::HistoryDisabled.into());
        }
        session.reserve();
        Ok(())
    }

    fn history_reply(&mut self, id: SessionId, reply: Reply) {
        let Some(session) = self.sessions.get_mut(&id) else {
            tracing::trace!(session = %id, "history answer for departed session ignored");
            return;
        };
        if let Err(QueueError::Closed) = session.complete(reply) {
            self.disconnect(id);
        }
    }

    /// Queue a reply to `id`. A closed queue means the writer is gone, so
    /// the session is dropped here as well.
    fn reply(&mut self, id: SessionId, reply: Reply) {
        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        match session.send(reply) {
            Ok(()) => {}
            Err(QueueError::Full) => {
                tracing::debug!(session = %id, "output queue full, reply dropped");
            }
            Err(QueueError::Closed) => self.disconnect(id),
        }
    }

    /// Quit path. Safe to call any number of times for the same session.
    fn disconnect(&mut self, id: SessionId) {
        let Some(mut session) = self.sessions.remove(&id) else {
            return;
        };
        if let Some(name) = session.name.as_deref() {
            if self.directory.lookup(name) == Some(id) {
                self.directory.remove(name);
            }
        }
        session.release_held();
        if let Err(e) = session.send(Reply::info(wire::FAREWELL)) {
            tracing::debug!(session = %id, error = ?e, "farewell not queued");
        }
        tracing::info!(
            session = %id,
            name = session.display_name(),
            remaining = self.sessions.len(),
            "session closed"
        );
        // Dropping the session closes its output queue.
    }
}
