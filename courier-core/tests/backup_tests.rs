//! Identity Backup Tests
//!
//! Password-protected export and import of the identity and secret key.

use courier_core::identity::backup::MIN_PASSWORD_LEN;
use courier_core::{BackupError, IdentityBackup, IdentityId, SecretKey};

fn identity() -> (IdentityId, SecretKey) {
    ("ECHOECHO".parse().unwrap(), SecretKey::generate())
}

/// Scenario: A backup restores the identity and key with the right password
#[test]
fn test_backup_round_trip() {
    let (id, secret) = identity();
    let backup = IdentityBackup::generate(&id, &secret, "correct horse").unwrap();

    let text = backup.to_string();
    let restored = IdentityBackup::parse(&text)
        .unwrap()
        .restore("correct horse")
        .unwrap();

    assert_eq!(restored.identity, id);
    assert_eq!(restored.secret_key.as_bytes(), secret.as_bytes());
    assert_eq!(restored.public_key, secret.public_key());
}

/// Scenario: The text form is grouped in blocks of four
#[test]
fn test_backup_text_grouping() {
    let (id, secret) = identity();
    let text = IdentityBackup::generate(&id, &secret, "password1")
        .unwrap()
        .to_string();

    for group in text.split('-') {
        assert!(group.len() <= 4);
        assert!(!group.is_empty());
    }
}

/// Scenario: Whitespace, extra dashes and lowercase are tolerated on import
#[test]
fn test_backup_parse_is_lenient() {
    let (id, secret) = identity();
    let backup = IdentityBackup::generate(&id, &secret, "password1").unwrap();
    let messy = format!("  {}\n", backup.to_string().to_lowercase().replace('-', " - "));

    assert_eq!(IdentityBackup::parse(&messy).unwrap(), backup);
}

/// Scenario: The wrong password is rejected
#[test]
fn test_backup_wrong_password() {
    let (id, secret) = identity();
    let backup = IdentityBackup::generate(&id, &secret, "password1").unwrap();

    assert_eq!(
        backup.restore("password2").unwrap_err(),
        BackupError::WrongPassword
    );
}

/// Scenario: Short passwords are refused at export
#[test]
fn test_backup_short_password() {
    let (id, secret) = identity();
    let short = "x".repeat(MIN_PASSWORD_LEN - 1);

    assert_eq!(
        IdentityBackup::generate(&id, &secret, &short).unwrap_err(),
        BackupError::PasswordTooShort
    );
}

/// Scenario: Truncated or non-base32 input is malformed
#[test]
fn test_backup_malformed_input() {
    assert!(matches!(
        IdentityBackup::parse("ABCD-EFGH"),
        Err(BackupError::Malformed(_))
    ));
    assert!(matches!(
        IdentityBackup::parse("!!!!-????"),
        Err(BackupError::Malformed(_))
    ));
}

/// Scenario: Two backups of the same identity differ by salt
#[test]
fn test_backups_are_salted() {
    let (id, secret) = identity();
    let a = IdentityBackup::generate(&id, &secret, "password1").unwrap();
    let b = IdentityBackup::generate(&id, &secret, "password1").unwrap();
    assert_ne!(a, b);
}
