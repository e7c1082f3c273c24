//! Network Error Types
//!
//! Error types for the relay connection.

use std::io;

use thiserror::Error;

use crate::crypto::CryptoError;

/// Connection and protocol error types.
///
/// Every variant is recoverable by reconnecting; the connection loop treats
/// them uniformly as transport failures.
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("Address resolution failed: {0}")]
    Resolution(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timeout")]
    Timeout,

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Decryption failed")]
    Decryption,

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    #[error("No identity configured")]
    NoIdentity,

    #[error("Transport not connected")]
    NotConnected,

    #[error("Connection stopped")]
    Stopped,
}

impl From<io::Error> for NetworkError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => NetworkError::Timeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => NetworkError::ConnectionClosed,
            _ => NetworkError::ConnectionFailed(err.to_string()),
        }
    }
}

impl From<CryptoError> for NetworkError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::DecryptionFailed => NetworkError::Decryption,
            other => NetworkError::Encryption(other.to_string()),
        }
    }
}
