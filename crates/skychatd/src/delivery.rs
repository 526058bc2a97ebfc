//! Encryption gate: turns a chat line into what the recipient's
//! connection receives.

use skychat_core::crypto::{self, CryptoError};

use crate::session::Session;

/// Seal `line` for `recipient`.
///
/// A session writing to itself gets the line unchanged. Identity is the
/// session, not the key material, so two sessions never share this path.
pub fn seal_for(sender: &Session, recipient: &Session, line: &str) -> Result<String, CryptoError> {
    if sender.id == recipient.id {
        return Ok(line.to_string());
    }
    crypto::seal_hex(line, &recipient.keys.public)
}
