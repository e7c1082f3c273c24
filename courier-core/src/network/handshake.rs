// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Client Handshake
//!
//! Establishes the ephemeral session key with the relay:
//!
//! 1. client → `ephemeral_pk(32) || client_cookie(16)`
//! 2. server → `server_cookie(16) || box(server_ephemeral_pk(32) || client_cookie(16))`,
//!    boxed with the client ephemeral key and the server long-term key
//! 3. client → `box(identity(8) || version(32) || server_cookie(16) || vouch_nonce(24) || vouch(48))`,
//!    boxed with both ephemeral keys; the vouch boxes the client ephemeral
//!    public key with the identity's long-term key
//! 4. server → `box(16 zero bytes)` login acknowledgment
//!
//! Boxes in steps 2-4 use the per-direction [`NonceCounter`]s.

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::crypto::{
    random_bytes, KeyPair, Nonce, PublicKey, SharedKey, BOX_OVERHEAD, KEY_LEN, NONCE_LEN,
};
use crate::identity::{Identity, IDENTITY_LEN};

use super::config::ConnectionConfig;
use super::framing::{FrameReader, FrameWriter};
use super::nonce_counter::{NonceCounter, COOKIE_LEN};
use super::NetworkError;

/// Version string length in the login block.
pub const VERSION_LEN: usize = 32;
/// Encrypted server hello: server ephemeral key and echoed client cookie.
pub const SERVER_HELLO_LEN: usize = KEY_LEN + COOKIE_LEN + BOX_OVERHEAD;
/// Boxed client ephemeral public key.
pub const VOUCH_LEN: usize = KEY_LEN + BOX_OVERHEAD;
/// Login block plaintext.
pub const LOGIN_LEN: usize = IDENTITY_LEN + VERSION_LEN + COOKIE_LEN + NONCE_LEN + VOUCH_LEN;
/// Encrypted login acknowledgment.
pub const LOGIN_ACK_LEN: usize = 16 + BOX_OVERHEAD;

/// Ephemeral key pair reused across connections until it expires.
#[derive(Debug, Clone)]
pub struct EphemeralKey {
    pair: KeyPair,
    created: Instant,
}

impl EphemeralKey {
    pub fn generate() -> Self {
        EphemeralKey {
            pair: KeyPair::generate(),
            created: Instant::now(),
        }
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.pair
    }

    pub fn is_fresh(&self, max_age: Duration) -> bool {
        self.created.elapsed() < max_age
    }
}

/// Keys and nonce counters of an established session.
pub struct Session {
    key: Arc<SharedKey>,
    client_nonces: NonceCounter,
    server_nonces: NonceCounter,
    server_key: PublicKey,
}

impl Session {
    /// Long-term server key the hello opened with.
    pub fn server_key(&self) -> &PublicKey {
        &self.server_key
    }

    /// Splits into the inbound and outbound frame codecs.
    pub fn into_codec(self) -> (FrameReader, FrameWriter) {
        (
            FrameReader::new(self.key.clone(), self.server_nonces),
            FrameWriter::new(self.key, self.client_nonces),
        )
    }
}

/// Client side of the handshake for one connection attempt.
pub struct ClientHandshake<'a> {
    identity: &'a Identity,
    ephemeral: &'a KeyPair,
    config: &'a ConnectionConfig,
    client_cookie: [u8; COOKIE_LEN],
}

impl<'a> ClientHandshake<'a> {
    /// Prepares a handshake with a random client cookie.
    pub fn new(
        identity: &'a Identity,
        ephemeral: &'a KeyPair,
        config: &'a ConnectionConfig,
    ) -> Self {
        ClientHandshake {
            identity,
            ephemeral,
            config,
            client_cookie: random_bytes(),
        }
    }

    pub fn with_client_cookie(mut self, cookie: [u8; COOKIE_LEN]) -> Self {
        self.client_cookie = cookie;
        self
    }

    pub fn client_cookie(&self) -> &[u8; COOKIE_LEN] {
        &self.client_cookie
    }

    /// Runs the handshake over `stream`.
    ///
    /// Nothing beyond the initial hello is written if the server hello does
    /// not authenticate or does not echo the client cookie.
    pub fn perform<S: Read + Write>(self, stream: &mut S) -> Result<Session, NetworkError> {
        let mut hello = Vec::with_capacity(KEY_LEN + COOKIE_LEN);
        hello.extend_from_slice(self.ephemeral.public_key().as_bytes());
        hello.extend_from_slice(&self.client_cookie);
        stream.write_all(&hello)?;
        stream.flush()?;
        debug!(client_cookie = %hex::encode(self.client_cookie), "Sent client hello");

        let mut server_cookie = [0u8; COOKIE_LEN];
        stream.read_exact(&mut server_cookie)?;
        debug!(server_cookie = %hex::encode(server_cookie), "Received server cookie");

        let mut server_nonces = NonceCounter::new(server_cookie);
        let mut client_nonces = NonceCounter::new(self.client_cookie);

        let mut server_hello = [0u8; SERVER_HELLO_LEN];
        stream.read_exact(&mut server_hello)?;
        let (hello_plain, server_key) =
            self.open_server_hello(&server_hello, &server_nonces.next_nonce())?;

        let server_ephemeral = PublicKey::from_slice(&hello_plain[..KEY_LEN])
            .map_err(|e| NetworkError::Handshake(e.to_string()))?;
        if hello_plain[KEY_LEN..KEY_LEN + COOKIE_LEN] != self.client_cookie {
            return Err(NetworkError::Handshake("client cookie mismatch".into()));
        }
        debug!("Server hello verified");

        let vouch_nonce = Nonce::random();
        let vouch = self.identity.encrypt_for(
            self.ephemeral.public_key().as_bytes(),
            &vouch_nonce,
            &server_key,
        )?;

        let mut login = Vec::with_capacity(LOGIN_LEN);
        login.extend_from_slice(self.identity.id().as_bytes());
        login.extend_from_slice(&version_field(&self.config.version));
        login.extend_from_slice(&server_cookie);
        login.extend_from_slice(vouch_nonce.as_bytes());
        login.extend_from_slice(&vouch);

        let session_key = SharedKey::derive(self.ephemeral.secret_key(), &server_ephemeral);
        let login_box = session_key.seal(&login, &client_nonces.next_nonce())?;
        stream.write_all(&login_box)?;
        stream.flush()?;
        debug!("Sent login");

        let mut login_ack = [0u8; LOGIN_ACK_LEN];
        stream.read_exact(&mut login_ack)?;
        session_key
            .open(&login_ack, &server_nonces.next_nonce())
            .map_err(|_| NetworkError::Handshake("login ack did not authenticate".into()))?;
        info!(identity = %self.identity.id(), "Login acknowledged");

        Ok(Session {
            key: Arc::new(session_key),
            client_nonces,
            server_nonces,
            server_key,
        })
    }

    /// Opens the server hello with the primary key, then the alternate key.
    fn open_server_hello(
        &self,
        server_hello: &[u8],
        nonce: &Nonce,
    ) -> Result<(Vec<u8>, PublicKey), NetworkError> {
        let secret = self.ephemeral.secret_key();
        let primary = self.config.server_public_key;
        if let Ok(plain) = SharedKey::derive(secret, &primary).open(server_hello, nonce) {
            return Ok((plain, primary));
        }

        let alt = self.config.server_public_key_alt;
        let plain = SharedKey::derive(secret, &alt)
            .open(server_hello, nonce)
            .map_err(|_| NetworkError::Handshake("server hello did not authenticate".into()))?;
        debug!("Server hello opened with alternate key");
        Ok((plain, alt))
    }
}

/// Version string truncated or zero-padded to [`VERSION_LEN`] bytes.
fn version_field(version: &str) -> [u8; VERSION_LEN] {
    let mut field = [0u8; VERSION_LEN];
    let bytes = version.as_bytes();
    let len = bytes.len().min(VERSION_LEN);
    field[..len].copy_from_slice(&bytes[..len]);
    field
}
