//! History collaborator: persistence interface for chat messages.
//!
//! The relay only ever stores plaintext bodies after delivery and answers
//! the `get-*` history commands through this trait. Implementations are
//! synchronous; the daemon calls them from a dedicated worker.

use std::sync::Arc;

use skychat_core::command::{HistoryQuery, PostFilter};
use skychat_core::{Message, NewMessage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("history store lock poisoned")]
    Poisoned,
}

/// Store/query interface for message history.
pub trait HistoryStore: Send + Sync {
    /// Persist a message and return its identifier.
    fn store(&self, message: NewMessage) -> Result<i64, HistoryError>;

    /// All messages sent by `name`, oldest first.
    fn query_by_sender(&self, name: &str) -> Result<Vec<Message>, HistoryError>;

    /// All messages addressed to `name`, oldest first.
    fn query_by_recipient(&self, name: &str) -> Result<Vec<Message>, HistoryError>;

    /// The `limit` most recent messages sent by `name`, newest first.
    fn query_recent(&self, name: &str, limit: usize) -> Result<Vec<Message>, HistoryError>;

    /// Messages sent by `name` whose body contains `word`, oldest first.
    fn query_containing(&self, name: &str, word: &str) -> Result<Vec<Message>, HistoryError>;
}

pub type SharedHistory = Arc<dyn HistoryStore>;

/// Answer a history command for the session registered as `name`.
pub fn run_query(
    store: &dyn HistoryStore,
    name: &str,
    query: &HistoryQuery,
) -> Result<Vec<Message>, HistoryError> {
    let (messages, filter) = match query {
        HistoryQuery::Last(n) => return store.query_recent(name, *n),
        HistoryQuery::Contains(word) => return store.query_containing(name, word),
        HistoryQuery::FromMe(filter) => (store.query_by_sender(name)?, filter),
        HistoryQuery::ToMe(filter) => (store.query_by_recipient(name)?, filter),
    };
    Ok(apply_filter(messages, filter.as_ref()))
}

fn apply_filter(mut messages: Vec<Message>, filter: Option<&PostFilter>) -> Vec<Message> {
    match filter {
        None => messages,
        Some(PostFilter::Contains(word)) => {
            messages.retain(|m| m.text.contains(word.as_str()));
            messages
        }
        Some(PostFilter::Last(n)) => {
            messages.sort_by(|a, b| b.id.cmp(&a.id));
            messages.truncate(*n);
            messages
        }
    }
}
