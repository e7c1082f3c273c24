// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Nonce/Replay Store
//!
//! One storage contract serves two purposes: outgoing nonces are checked
//! against it before use, and incoming message nonces are recorded so that
//! redelivered messages can be recognized.

mod memory;
mod sqlite;

pub use memory::MemoryNonceStore;
pub use sqlite::SqliteNonceStore;

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::crypto::Nonce;

/// Attempts before [`NonceFactory::next`] gives up.
pub const MAX_NONCE_ATTEMPTS: usize = 5;

/// Nonce store error types.
#[derive(Error, Debug)]
pub enum NonceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to generate a unique nonce after {0} attempts")]
    Exhausted(usize),
}

/// Persistent set of seen nonces. Implementations serialize internally.
pub trait NonceStore: Send + Sync {
    /// Returns true if `nonce` has been stored before.
    fn exists(&self, nonce: &Nonce) -> Result<bool, NonceError>;

    /// Records `nonce`. Returns false if it was already present.
    fn store(&self, nonce: &Nonce) -> Result<bool, NonceError>;
}

/// Generates outgoing nonces and checks incoming ones.
#[derive(Clone)]
pub struct NonceFactory {
    store: Arc<dyn NonceStore>,
}

impl NonceFactory {
    pub fn new(store: Arc<dyn NonceStore>) -> Self {
        NonceFactory { store }
    }

    /// Returns a fresh random nonce not present in the store.
    ///
    /// With `persist` the nonce is recorded atomically with the check.
    pub fn next(&self, persist: bool) -> Result<Nonce, NonceError> {
        for attempt in 1..=MAX_NONCE_ATTEMPTS {
            let nonce = Nonce::random();
            let fresh = if persist {
                self.store.store(&nonce)?
            } else {
                !self.store.exists(&nonce)?
            };
            if fresh {
                return Ok(nonce);
            }
            warn!(attempt, "Nonce collision, retrying");
        }
        Err(NonceError::Exhausted(MAX_NONCE_ATTEMPTS))
    }

    pub fn exists(&self, nonce: &Nonce) -> Result<bool, NonceError> {
        self.store.exists(nonce)
    }

    pub fn store(&self, nonce: &Nonce) -> Result<bool, NonceError> {
        self.store.store(nonce)
    }
}
