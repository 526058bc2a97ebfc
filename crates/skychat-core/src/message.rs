//! Chat message model shared by the relay and the history stores.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A chat message before it has been handed to a history store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub from: String,
    pub to: String,
    pub text: String,
}

impl NewMessage {
    pub fn new(from: impl Into<String>, to: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            text: text.into(),
        }
    }

    /// Attach the identifier assigned by a store.
    pub fn with_id(self, id: i64) -> Message {
        Message {
            id,
            from: self.from,
            to: self.to,
            text: self.text,
        }
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned identifier, increasing in insertion order.
    pub id: i64,
    /// Display name of the sender at the time of sending.
    pub from: String,
    /// Display name of the recipient at the time of sending.
    pub to: String,
    /// Plaintext body, without the `sender : ` prefix.
    pub text: String,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} -> {}: {}", self.id, self.from, self.to, self.text)
    }
}
