use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use skychat_core::{Message, NewMessage};

use crate::history::{HistoryError, HistoryStore};

/// In-memory message history. Lost on restart.
#[derive(Clone)]
pub struct MemoryHistory {
    /// id -> message
    messages: Arc<DashMap<i64, Message>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }

    /// Count stored messages
    pub fn count(&self) -> usize {
        self.messages.len()
    }

    /// Matching messages in id order.
    fn collect(&self, pred: impl Fn(&Message) -> bool) -> Vec<Message> {
        let mut out: Vec<Message> = self
            .messages
            .iter()
            .filter(|entry| pred(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by_key(|m| m.id);
        out
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore for MemoryHistory {
    fn store(&self, message: NewMessage) -> Result<i64, HistoryError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.messages.insert(id, message.with_id(id));
        Ok(id)
    }

    fn query_by_sender(&self, name: &str) -> Result<Vec<Message>, HistoryError> {
        Ok(self.collect(|m| m.from == name))
    }

    fn query_by_recipient(&self, name: &str) -> Result<Vec<Message>, HistoryError> {
        Ok(self.collect(|m| m.to == name))
    }

    fn query_recent(&self, name: &str, limit: usize) -> Result<Vec<Message>, HistoryError> {
        let mut msgs = self.collect(|m| m.from == name);
        msgs.reverse();
        msgs.truncate(limit);
        Ok(msgs)
    }

    fn query_containing(&self, name: &str, word: &str) -> Result<Vec<Message>, HistoryError> {
        Ok(self.collect(|m| m.from == name && m.text.contains(word)))
    }
}
