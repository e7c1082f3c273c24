//! In-memory nonce store.

use std::collections::HashSet;

use parking_lot::Mutex;

use super::{NonceError, NonceStore};
use crate::crypto::Nonce;

/// Nonce store backed by a `HashSet`. Contents are lost on drop.
#[derive(Default)]
pub struct MemoryNonceStore {
    nonces: Mutex<HashSet<Nonce>>,
}

impl MemoryNonceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nonces.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nonces.lock().is_empty()
    }
}

impl NonceStore for MemoryNonceStore {
    fn exists(&self, nonce: &Nonce) -> Result<bool, NonceError> {
        Ok(self.nonces.lock().contains(nonce))
    }

    fn store(&self, nonce: &Nonce) -> Result<bool, NonceError> {
        Ok(self.nonces.lock().insert(*nonce))
    }
}
