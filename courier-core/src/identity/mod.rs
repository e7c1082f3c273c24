// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Identity Management Module
//!
//! An identity is an 8-character handle bound to a long-term X25519 key
//! pair. It is created by provisioning (or restored from a backup) and is
//! never mutated afterwards.

pub mod backup;

pub use backup::{BackupError, IdentityBackup, RestoredIdentity};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{CryptoError, KeyPair, Nonce, PublicKey, SecretKey, SharedKey};

/// Length of an identity handle in bytes.
pub const IDENTITY_LEN: usize = 8;

/// Identity-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Identity must be exactly 8 characters, got {0}")]
    InvalidLength(usize),
    #[error("Identity contains invalid character {0:?}")]
    InvalidCharacter(char),
    #[error("No identity configured")]
    NoIdentity,
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// 8-byte ASCII identity handle.
///
/// Values received from the network are kept as raw bytes; use
/// [`IdentityId::from_str`] to validate user input.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityId([u8; IDENTITY_LEN]);

impl IdentityId {
    pub const fn from_bytes(bytes: [u8; IDENTITY_LEN]) -> Self {
        IdentityId(bytes)
    }

    /// Reads an identity from the first 8 bytes of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; IDENTITY_LEN] = bytes.get(..IDENTITY_LEN)?.try_into().ok()?;
        Some(IdentityId(arr))
    }

    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }

    /// Lossy string form. Non-ASCII bytes render as replacement characters.
    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl FromStr for IdentityId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != IDENTITY_LEN {
            return Err(IdentityError::InvalidLength(s.len()));
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '*'))
        {
            return Err(IdentityError::InvalidCharacter(c));
        }
        let mut bytes = [0u8; IDENTITY_LEN];
        bytes.copy_from_slice(s.as_bytes());
        Ok(IdentityId(bytes))
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl fmt::Debug for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityId({})", self.as_string())
    }
}

/// The local user's identity.
#[derive(Clone)]
pub struct Identity {
    id: IdentityId,
    key_pair: KeyPair,
    server_group: String,
    nickname: Option<String>,
}

impl Identity {
    /// Creates an identity from its handle and long-term secret key.
    pub fn new(id: IdentityId, secret_key: SecretKey, server_group: impl Into<String>) -> Self {
        Identity {
            id,
            key_pair: KeyPair::from_secret(secret_key),
            server_group: server_group.into(),
            nickname: None,
        }
    }

    /// Sets the public nickname sent along with outgoing messages.
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn id(&self) -> IdentityId {
        self.id
    }

    pub fn public_key(&self) -> &PublicKey {
        self.key_pair.public_key()
    }

    pub fn secret_key(&self) -> &SecretKey {
        self.key_pair.secret_key()
    }

    /// Server group used to select the connection endpoint.
    pub fn server_group(&self) -> &str {
        &self.server_group
    }

    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    /// Precomputes the box key shared with `peer`.
    pub fn shared_key(&self, peer: &PublicKey) -> SharedKey {
        SharedKey::derive(self.secret_key(), peer)
    }

    /// Encrypts `plaintext` for `peer` with the long-term key.
    pub fn encrypt_for(
        &self,
        plaintext: &[u8],
        nonce: &Nonce,
        peer: &PublicKey,
    ) -> Result<Vec<u8>, CryptoError> {
        self.shared_key(peer).seal(plaintext, nonce)
    }

    /// Decrypts a box sent by `peer` to this identity.
    pub fn decrypt_from(
        &self,
        ciphertext: &[u8],
        nonce: &Nonce,
        peer: &PublicKey,
    ) -> Result<Vec<u8>, CryptoError> {
        self.shared_key(peer).open(ciphertext, nonce)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("public_key", self.public_key())
            .field("server_group", &self.server_group)
            .finish_non_exhaustive()
    }
}

/// Source of the currently active identity.
pub trait IdentityStore: Send + Sync {
    /// Returns the active identity, if one is configured.
    fn identity(&self) -> Option<Arc<Identity>>;

    /// Replaces the active identity.
    fn set_identity(&self, identity: Identity);
}

/// In-memory identity store.
#[derive(Default)]
pub struct MemoryIdentityStore {
    identity: RwLock<Option<Arc<Identity>>>,
}

impl MemoryIdentityStore {
    pub fn new(identity: Identity) -> Self {
        MemoryIdentityStore {
            identity: RwLock::new(Some(Arc::new(identity))),
        }
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn identity(&self) -> Option<Arc<Identity>> {
        self.identity.read().clone()
    }

    fn set_identity(&self, identity: Identity) {
        *self.identity.write() = Some(Arc::new(identity));
    }
}
