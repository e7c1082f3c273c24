// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Cryptographic primitives.
//!
//! Public-key authenticated encryption compatible with NaCl's `crypto_box`:
//! an X25519 shared secret is hashed with HSalsa20 and used as an
//! XSalsa20-Poly1305 key. The Poly1305 tag is prepended to the ciphertext.

pub mod keys;
pub mod password_kdf;

pub use keys::{KeyPair, PublicKey, SecretKey};
pub use password_kdf::{derive_key_pbkdf2, derive_key_pbkdf2_default, PasswordKdfError};

use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::XSalsa20Poly1305;
use rand::RngCore;
use salsa20::cipher::consts::U10;
use salsa20::cipher::generic_array::GenericArray;
use salsa20::cipher::{KeyIvInit, StreamCipher};
use salsa20::{hsalsa, XSalsa20};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a box nonce in bytes.
pub const NONCE_LEN: usize = 24;

/// Length of public, secret and symmetric keys in bytes.
pub const KEY_LEN: usize = 32;

/// Bytes added to the plaintext by [`SharedKey::seal`].
pub const BOX_OVERHEAD: usize = 16;

/// Cryptographic error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Invalid nonce length: expected 24 bytes, got {0}")]
    InvalidNonceLength(usize),
}

/// A 24-byte nonce.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nonce(pub [u8; NONCE_LEN]);

impl Nonce {
    /// Creates a nonce from raw bytes.
    pub fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Nonce(bytes)
    }

    /// Creates a nonce from a slice, checking its length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; NONCE_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidNonceLength(bytes.len()))?;
        Ok(Nonce(arr))
    }

    /// Generates a random nonce from the OS random source.
    pub fn random() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Nonce(bytes)
    }

    /// All-zero nonce.
    pub fn zero() -> Self {
        Nonce([0u8; NONCE_LEN])
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Nonce({})", hex::encode(self.0))
    }
}

/// A 32-byte symmetric key.
///
/// Used for blob encryption keys carried inside messages and for keys
/// derived from passwords.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        SymmetricKey(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(bytes.len()))?;
        Ok(SymmetricKey(arr))
    }

    /// Generates a random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        SymmetricKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl AsRef<[u8]> for SymmetricKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<Vec<u8>> for SymmetricKey {
    type Error = CryptoError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_slice(&bytes)
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Precomputed key for a (secret key, peer public key) pair.
///
/// Equivalent to NaCl's `crypto_box_beforenm`.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedKey([u8; KEY_LEN]);

impl SharedKey {
    /// Derives the box key shared between `secret` and `peer`.
    pub fn derive(secret: &SecretKey, peer: &PublicKey) -> Self {
        let shared = secret.diffie_hellman(peer);
        let key = hsalsa::<U10>(
            GenericArray::from_slice(&shared),
            &GenericArray::default(),
        );
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&key);
        SharedKey(bytes)
    }

    /// Encrypts and authenticates `plaintext`. Output is `tag || ciphertext`.
    pub fn seal(&self, plaintext: &[u8], nonce: &Nonce) -> Result<Vec<u8>, CryptoError> {
        let cipher = XSalsa20Poly1305::new((&self.0).into());
        cipher
            .encrypt(nonce.as_bytes().into(), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)
    }

    /// Verifies and decrypts a box produced by [`SharedKey::seal`].
    pub fn open(&self, ciphertext: &[u8], nonce: &Nonce) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < BOX_OVERHEAD {
            return Err(CryptoError::DecryptionFailed);
        }
        let cipher = XSalsa20Poly1305::new((&self.0).into());
        cipher
            .decrypt(nonce.as_bytes().into(), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

/// Encrypts `plaintext` from `secret`'s owner to `peer`.
pub fn box_seal(
    plaintext: &[u8],
    nonce: &Nonce,
    peer: &PublicKey,
    secret: &SecretKey,
) -> Result<Vec<u8>, CryptoError> {
    SharedKey::derive(secret, peer).seal(plaintext, nonce)
}

/// Decrypts a box sent by `peer` to `secret`'s owner.
pub fn box_open(
    ciphertext: &[u8],
    nonce: &Nonce,
    peer: &PublicKey,
    secret: &SecretKey,
) -> Result<Vec<u8>, CryptoError> {
    SharedKey::derive(secret, peer).open(ciphertext, nonce)
}

/// Applies the XSalsa20 keystream to `data` in place.
///
/// Encryption and decryption are the same operation.
pub fn stream_xor(key: &SymmetricKey, nonce: &Nonce, data: &mut [u8]) {
    let mut cipher = XSalsa20::new(
        GenericArray::from_slice(key.as_bytes()),
        GenericArray::from_slice(nonce.as_bytes()),
    );
    cipher.apply_keystream(data);
}

/// SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let digest = ring::digest::digest(&ring::digest::SHA256, data);
    let mut out = [0u8; 32];
    out.copy_from_slice(digest.as_ref());
    out
}

/// Fills a fixed-size array with random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}
