//! skychat-core: shared types, line protocol, and cryptographic primitives.
//! All other skychat crates depend on this one.

pub mod command;
pub mod config;
pub mod crypto;
pub mod message;
pub mod wire;

pub use command::{Command, CommandKind, SessionId};
pub use message::{Message, NewMessage};
pub use wire::Reply;
