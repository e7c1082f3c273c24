//! Identity backup export and import.

use anyhow::{bail, Result};
use courier_core::identity::backup::MIN_PASSWORD_LEN;
use courier_core::{BackupError, Identity, IdentityBackup};
use dialoguer::Password;

use crate::config::CliConfig;

/// Prints a backup of the stored identity.
pub fn export(config: &CliConfig) -> Result<()> {
    let identity = config.load_identity()?;

    let password = Password::new()
        .with_prompt(format!("Backup password (min. {MIN_PASSWORD_LEN} characters)"))
        .with_confirmation("Repeat password", "Passwords do not match")
        .interact()?;

    let backup = IdentityBackup::generate(&identity.id(), identity.secret_key(), &password);
    let backup = match backup {
        Ok(backup) => backup,
        Err(BackupError::PasswordTooShort) => {
            bail!("Password must be at least {MIN_PASSWORD_LEN} characters")
        }
        Err(e) => return Err(e.into()),
    };

    println!("Identity backup for {}:", identity.id());
    println!();
    println!("{backup}");
    Ok(())
}

/// Restores an identity from a backup string and stores it.
pub fn import(config: &CliConfig, text: &str, server_group: &str, force: bool) -> Result<()> {
    if config.is_initialized() && !force {
        bail!("An identity already exists. Use --force to replace it.");
    }

    let backup = match IdentityBackup::parse(text) {
        Ok(backup) => backup,
        Err(BackupError::Malformed(reason)) => bail!("Not a valid backup: {reason}"),
        Err(e) => return Err(e.into()),
    };
    let password = Password::new().with_prompt("Backup password").interact()?;

    let restored = match backup.restore(&password) {
        Ok(restored) => restored,
        Err(BackupError::WrongPassword) => bail!("Wrong password"),
        Err(e) => return Err(e.into()),
    };

    let identity = Identity::new(restored.identity, restored.secret_key, server_group);
    config.save_identity(&identity)?;

    println!("Restored identity {}", identity.id());
    println!("Public key: {}", restored.public_key.to_hex());
    Ok(())
}
