//! Per-direction handshake nonces: `cookie(16) || counter(u64 LE)`.

use crate::crypto::{Nonce, NONCE_LEN};

pub const COOKIE_LEN: usize = 16;

/// Strictly increasing nonce sequence for one direction of a connection.
#[derive(Debug, Clone)]
pub struct NonceCounter {
    cookie: [u8; COOKIE_LEN],
    next: u64,
}

impl NonceCounter {
    /// Counter starts at 1.
    pub fn new(cookie: [u8; COOKIE_LEN]) -> Self {
        NonceCounter { cookie, next: 1 }
    }

    pub fn cookie(&self) -> &[u8; COOKIE_LEN] {
        &self.cookie
    }

    /// Returns the current nonce and advances the counter.
    pub fn next_nonce(&mut self) -> Nonce {
        let mut bytes = [0u8; NONCE_LEN];
        bytes[..COOKIE_LEN].copy_from_slice(&self.cookie);
        bytes[COOKIE_LEN..].copy_from_slice(&self.next.to_le_bytes());
        self.next += 1;
        Nonce::from_bytes(bytes)
    }
}
