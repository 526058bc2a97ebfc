//! Per-session message confidentiality.
//!
//! Every session gets its own X25519 keypair when its connection is
//! accepted. Chat bodies are sealed to the recipient's public key with a
//! one-way Noise `N` handshake: the sender needs nothing but the
//! recipient's public key, and only the recipient's private key opens it.
//!
//! Sealed message layout (what [`seal`] returns):
//!   [ephemeral X25519 public key (32 bytes)] [ChaChaPoly ciphertext + 16-byte MAC]
//!
//! Key material derives ZeroizeOnDrop: wiped from memory when dropped.

use snow::Builder;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// One-way pattern: recipient static key known in advance, sender anonymous.
const NOISE_PATTERN: &str = "Noise_N_25519_ChaChaPoly_BLAKE2s";

/// Largest message Noise will produce.
const NOISE_MAX_MESSAGE: usize = 65_535;

/// Ephemeral public key plus AEAD tag.
pub const SEAL_OVERHEAD: usize = 32 + 16;

/// Largest plaintext [`seal`] accepts.
pub const MAX_PLAINTEXT: usize = NOISE_MAX_MESSAGE - SEAL_OVERHEAD;

// ── Keypair ───────────────────────────────────────────────────────────────────

/// A session's X25519 keypair.
///
/// The private key never leaves this struct; opening a sealed message goes
/// through [`SessionKeys::open`].
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    private: Zeroizing<[u8; 32]>,
    pub public: [u8; 32],
}

impl SessionKeys {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::thread_rng());
        let public = PublicKey::from(&secret);
        Self {
            private: Zeroizing::new(secret.to_bytes()),
            public: *public.as_bytes(),
        }
    }

    /// Reconstruct a keypair from private key bytes.
    pub fn from_private(private_bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(private_bytes);
        let public = PublicKey::from(&secret);
        Self {
            private: Zeroizing::new(private_bytes),
            public: *public.as_bytes(),
        }
    }

    /// Short hex form of the public key for logs.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.public[..8])
    }

    /// Open a message sealed to this keypair's public key.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < SEAL_OVERHEAD {
            return Err(CryptoError::TooShort);
        }

        let mut responder = Builder::new(pattern()?)
            .local_private_key(&*self.private)
            .build_responder()
            .map_err(CryptoError::Noise)?;

        let mut plaintext = vec![0u8; sealed.len()];
        let len = responder
            .read_message(sealed, &mut plaintext)
            .map_err(CryptoError::Noise)?;
        plaintext.truncate(len);
        Ok(plaintext)
    }
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("public", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

// ── Sealing ───────────────────────────────────────────────────────────────────

fn pattern() -> Result<snow::params::NoiseParams, CryptoError> {
    NOISE_PATTERN.parse().map_err(|_| CryptoError::BadPattern)
}

/// Seal `plaintext` to `recipient`'s public key.
///
/// Output is `SEAL_OVERHEAD + plaintext.len()` bytes.
pub fn seal(plaintext: &[u8], recipient: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    if plaintext.len() > MAX_PLAINTEXT {
        return Err(CryptoError::TooLong(plaintext.len()));
    }

    let mut initiator = Builder::new(pattern()?)
        .remote_public_key(recipient)
        .build_initiator()
        .map_err(CryptoError::Noise)?;

    let mut sealed = vec![0u8; plaintext.len() + SEAL_OVERHEAD];
    let len = initiator
        .write_message(plaintext, &mut sealed)
        .map_err(CryptoError::Noise)?;
    sealed.truncate(len);
    Ok(sealed)
}

/// Seal and hex-encode, the form written onto a client connection.
pub fn seal_hex(plaintext: &str, recipient: &[u8; 32]) -> Result<String, CryptoError> {
    seal(plaintext.as_bytes(), recipient).map(hex::encode)
}

/// Inverse of [`seal_hex`].
pub fn open_hex(sealed_hex: &str, keys: &SessionKeys) -> Result<String, CryptoError> {
    let sealed = hex::decode(sealed_hex.trim()).map_err(|_| CryptoError::BadEncoding)?;
    let plaintext = keys.open(&sealed)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::BadEncoding)
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid Noise pattern string")]
    BadPattern,

    #[error("Noise protocol error: {0}")]
    Noise(#[from] snow::Error),

    #[error("plaintext of {0} bytes exceeds the sealed message limit")]
    TooLong(usize),

    #[error("sealed message too short (need at least 48 bytes: 32 key + 16 MAC)")]
    TooShort,

    #[error("sealed message is not valid hex or UTF-8")]
    BadEncoding,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
