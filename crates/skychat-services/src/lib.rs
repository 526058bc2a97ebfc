//! skychat-services: state and collaborators used by the relay daemon.

pub mod directory;
pub mod history;
pub mod message_store;
pub mod sqlite_store;

pub use directory::{Directory, DirectoryError};
pub use history::{run_query, HistoryError, HistoryStore, SharedHistory};
pub use message_store::MemoryHistory;
pub use sqlite_store::SqliteHistory;
