// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Identity Backup Module
//!
//! Password-protected export of an identity's long-term secret key as a
//! human-transcribable string.
//!
//! Layout before encoding: `salt (8) || XSalsa20(id (8) || sk (32) || hash (2))`
//! where `hash` is the first two bytes of `SHA-256(id || sk)` and the stream
//! key is PBKDF2-HMAC-SHA256(password, salt). The 50 bytes are base-32
//! encoded (80 characters) and split into dash-separated groups of four.

use std::fmt;

use data_encoding::BASE32;
use thiserror::Error;
use zeroize::Zeroizing;

use super::{IdentityId, IDENTITY_LEN};
use crate::crypto::{
    derive_key_pbkdf2_default, random_bytes, sha256, stream_xor, Nonce, PasswordKdfError,
    PublicKey, SecretKey, KEY_LEN,
};

/// Minimum accepted password length in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

const SALT_LEN: usize = 8;
const HASH_LEN: usize = 2;
const PLAIN_LEN: usize = IDENTITY_LEN + KEY_LEN + HASH_LEN;
/// Decoded backup length in bytes.
pub const BACKUP_LEN: usize = SALT_LEN + PLAIN_LEN;

/// Backup error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackupError {
    #[error("Password must be at least 8 characters")]
    PasswordTooShort,
    #[error("Wrong password")]
    WrongPassword,
    #[error("Malformed backup: {0}")]
    Malformed(String),
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
}

impl From<PasswordKdfError> for BackupError {
    fn from(err: PasswordKdfError) -> Self {
        BackupError::KeyDerivation(err.to_string())
    }
}

/// Identity and keys recovered from a backup.
#[derive(Debug)]
pub struct RestoredIdentity {
    pub identity: IdentityId,
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

/// An encrypted identity backup.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityBackup {
    data: [u8; BACKUP_LEN],
}

impl IdentityBackup {
    /// Encrypts `identity` and `secret_key` under `password`.
    pub fn generate(
        identity: &IdentityId,
        secret_key: &SecretKey,
        password: &str,
    ) -> Result<Self, BackupError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(BackupError::PasswordTooShort);
        }

        let salt: [u8; SALT_LEN] = random_bytes();
        let key = derive_key_pbkdf2_default(password.as_bytes(), &salt)?;

        let mut plain = Zeroizing::new([0u8; PLAIN_LEN]);
        plain[..IDENTITY_LEN].copy_from_slice(identity.as_bytes());
        plain[IDENTITY_LEN..IDENTITY_LEN + KEY_LEN].copy_from_slice(secret_key.as_bytes());
        let hash = sha256(&plain[..IDENTITY_LEN + KEY_LEN]);
        plain[IDENTITY_LEN + KEY_LEN..].copy_from_slice(&hash[..HASH_LEN]);

        stream_xor(&key, &Nonce::zero(), &mut plain[..]);

        let mut data = [0u8; BACKUP_LEN];
        data[..SALT_LEN].copy_from_slice(&salt);
        data[SALT_LEN..].copy_from_slice(&plain[..]);
        Ok(IdentityBackup { data })
    }

    /// Parses the textual form. Whitespace, dashes and letter case are ignored.
    pub fn parse(text: &str) -> Result<Self, BackupError> {
        let cleaned: String = text
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let bytes = BASE32
            .decode(cleaned.as_bytes())
            .map_err(|e| BackupError::Malformed(format!("invalid base32: {}", e)))?;

        let data: [u8; BACKUP_LEN] = bytes.as_slice().try_into().map_err(|_| {
            BackupError::Malformed(format!(
                "expected {} bytes, got {}",
                BACKUP_LEN,
                bytes.len()
            ))
        })?;
        Ok(IdentityBackup { data })
    }

    /// Decrypts the backup with `password`.
    pub fn restore(&self, password: &str) -> Result<RestoredIdentity, BackupError> {
        let (salt, ciphertext) = self.data.split_at(SALT_LEN);
        let key = derive_key_pbkdf2_default(password.as_bytes(), salt)?;

        let mut plain = Zeroizing::new([0u8; PLAIN_LEN]);
        plain.copy_from_slice(ciphertext);
        stream_xor(&key, &Nonce::zero(), &mut plain[..]);

        let hash = sha256(&plain[..IDENTITY_LEN + KEY_LEN]);
        if hash[..HASH_LEN] != plain[IDENTITY_LEN + KEY_LEN..] {
            return Err(BackupError::WrongPassword);
        }

        let identity = IdentityId::from_slice(&plain[..IDENTITY_LEN])
            .ok_or_else(|| BackupError::Malformed("truncated identity".into()))?;
        let secret_key = SecretKey::from_slice(&plain[IDENTITY_LEN..IDENTITY_LEN + KEY_LEN])
            .map_err(|e| BackupError::Malformed(e.to_string()))?;
        let public_key = secret_key.public_key();

        Ok(RestoredIdentity {
            identity,
            secret_key,
            public_key,
        })
    }

    /// Raw decoded bytes (salt followed by ciphertext).
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Display for IdentityBackup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = BASE32.encode(&self.data);
        for (i, chunk) in encoded.as_bytes().chunks(4).enumerate() {
            if i != 0 {
                f.write_str("-")?;
            }
            // BASE32 output is ASCII
            f.write_str(&String::from_utf8_lossy(chunk))?;
        }
        Ok(())
    }
}

impl fmt::Debug for IdentityBackup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdentityBackup(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_form_has_twenty_groups() {
        let id: IdentityId = "ABCD1234".parse().unwrap();
        let backup = IdentityBackup::generate(&id, &SecretKey::generate(), "correct horse").unwrap();
        let text = backup.to_string();

        assert_eq!(text.len(), 80 + 19);
        assert_eq!(text.split('-').count(), 20);
        assert!(text.split('-').all(|g| g.len() == 4));
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let err = IdentityBackup::parse("ABCD-EFGH").unwrap_err();
        assert!(matches!(err, BackupError::Malformed(_)));
    }
}
