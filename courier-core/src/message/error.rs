//! Message encode/decode error types.

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::nonce::NonceError;

/// Failure to decode an incoming message.
///
/// The variant tells the receive path whether to acknowledge the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Unrecoverable. Acknowledge and discard so the server stops
    /// redelivering it.
    #[error("Bad message: {0}")]
    Drop(String),

    /// Possibly transient. Do not acknowledge; the server will redeliver.
    #[error("Message deferred: {0}")]
    Retry(String),
}

impl DecodeError {
    pub fn drop(reason: impl Into<String>) -> Self {
        DecodeError::Drop(reason.into())
    }

    pub fn retry(reason: impl Into<String>) -> Self {
        DecodeError::Retry(reason.into())
    }

    /// True if the message should be acknowledged and discarded.
    pub fn is_drop(&self) -> bool {
        matches!(self, DecodeError::Drop(_))
    }
}

/// Failure to build an outgoing boxed message.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("No identity configured")]
    NoIdentity,

    #[error("Missing public key for {0}")]
    MissingPublicKey(String),

    #[error("Text too long: {0} bytes")]
    TextTooLong(usize),

    #[error("Invalid message: {0}")]
    Invalid(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encryption failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Nonce generation failed: {0}")]
    Nonce(#[from] NonceError),
}
