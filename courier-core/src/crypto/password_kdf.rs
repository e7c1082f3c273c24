// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Password-Based Key Derivation
//!
//! Identity backups derive their stream key with PBKDF2-HMAC-SHA256 over the
//! backup password and the 8-byte salt stored in front of the ciphertext.

use std::num::NonZeroU32;

use ring::pbkdf2;
use thiserror::Error;
use zeroize::Zeroizing;

use super::{SymmetricKey, KEY_LEN};

/// Iteration count baked into the backup format.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

#[derive(Error, Debug)]
pub enum PasswordKdfError {
    #[error("Iteration count must be at least 1")]
    ZeroIterations,

    #[error("Salt must not be empty")]
    EmptySalt,
}

/// PBKDF2-HMAC-SHA256 with an explicit iteration count.
pub fn derive_key_pbkdf2(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<SymmetricKey, PasswordKdfError> {
    let rounds = NonZeroU32::new(iterations).ok_or(PasswordKdfError::ZeroIterations)?;
    if salt.is_empty() {
        return Err(PasswordKdfError::EmptySalt);
    }

    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA256, rounds, salt, password, &mut *out);
    Ok(SymmetricKey::from_bytes(*out))
}

/// Backup key derivation with [`PBKDF2_ITERATIONS`].
pub fn derive_key_pbkdf2_default(
    password: &[u8],
    salt: &[u8],
) -> Result<SymmetricKey, PasswordKdfError> {
    derive_key_pbkdf2(password, salt, PBKDF2_ITERATIONS)
}
