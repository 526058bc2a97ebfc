//! Session Directory: registered display name → live session.
//!
//! Owned by the dispatcher and only touched from its task, so it is a plain
//! map with no locking. Invariant: every key is the current name of the
//! session it maps to, and a name maps to at most one session.

use std::collections::HashMap;

use skychat_core::wire::ANONYMOUS;
use skychat_core::SessionId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("name {0} is already taken")]
    NameTaken(String),
    #[error("name {0} is reserved")]
    Reserved(String),
}

#[derive(Debug, Default)]
pub struct Directory {
    names: HashMap<String, SessionId>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session` under `requested`, dropping its `previous` name.
    ///
    /// Fails if another session holds the name; the directory is left
    /// untouched in that case. Re-registering one's own name succeeds.
    pub fn register(
        &mut self,
        session: SessionId,
        previous: Option<&str>,
        requested: &str,
    ) -> Result<(), DirectoryError> {
        if requested == ANONYMOUS {
            return Err(DirectoryError::Reserved(requested.to_string()));
        }
        match self.names.get(requested) {
            Some(owner) if *owner != session => {
                return Err(DirectoryError::NameTaken(requested.to_string()));
            }
            _ => {}
        }
        if let Some(previous) = previous {
            if self.names.get(previous) == Some(&session) {
                self.names.remove(previous);
            }
        }
        self.names.insert(requested.to_string(), session);
        Ok(())
    }

    /// Exact, case-sensitive lookup.
    pub fn lookup(&self, name: &str) -> Option<SessionId> {
        self.names.get(name).copied()
    }

    /// Remove `name`. No-op if absent.
    pub fn remove(&mut self, name: &str) {
        self.names.remove(name);
    }

    /// Names of every registered session except `exclude`, in map order.
    pub fn list_others(&self, exclude: Option<&str>) -> Vec<String> {
        self.names
            .keys()
            .filter(|name| Some(name.as_str()) != exclude)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
