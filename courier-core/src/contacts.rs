//! Contact key lookup.
//!
//! The codec needs the peer's long-term public key to encrypt outgoing
//! and decrypt incoming messages. Contact persistence lives outside this
//! crate; implementations of [`ContactStore`] bridge to it.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::crypto::PublicKey;
use crate::identity::IdentityId;

/// Public key lookup by identity.
pub trait ContactStore: Send + Sync {
    /// Returns the public key for `identity`.
    ///
    /// When `fetch` is true the implementation may consult the directory
    /// server for unknown identities, which can block.
    fn public_key(&self, identity: &IdentityId, fetch: bool) -> Option<PublicKey>;
}

/// In-memory contact store.
#[derive(Default)]
pub struct MemoryContactStore {
    keys: RwLock<HashMap<IdentityId, PublicKey>>,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a contact's key.
    pub fn add(&self, identity: IdentityId, public_key: PublicKey) {
        self.keys.write().insert(identity, public_key);
    }

    pub fn remove(&self, identity: &IdentityId) -> Option<PublicKey> {
        self.keys.write().remove(identity)
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

impl ContactStore for MemoryContactStore {
    fn public_key(&self, identity: &IdentityId, _fetch: bool) -> Option<PublicKey> {
        self.keys.read().get(identity).copied()
    }
}
