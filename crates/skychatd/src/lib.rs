//! skychatd: multi-user TCP chat relay.
//!
//! One task per connection reads lines, one dispatcher task owns all shared
//! state, and one writer task per connection drains that client's output.

pub mod delivery;
pub mod dispatch;
pub mod history;
pub mod server;
pub mod session;

pub use dispatch::{CommandError, DispatchEvent, Dispatcher};
pub use history::{HistoryHandle, HistoryJob, HistoryWorker};
pub use server::serve;
