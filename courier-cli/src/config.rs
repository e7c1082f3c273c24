//! CLI Configuration

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use courier_core::{
    ConnectionConfig, Identity, IdentityId, MemoryContactStore, PublicKey, SecretKey,
};
use serde::{Deserialize, Serialize};

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub config_file: Option<PathBuf>,
    pub server_key: Option<String>,
    pub server_prefix: Option<String>,
    pub server_suffix: Option<String>,
}

/// Identity as stored on disk.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityFile {
    pub identity: String,
    /// Hex encoded long-term secret key.
    pub secret_key: String,
    pub server_group: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

impl IdentityFile {
    pub fn from_identity(identity: &Identity) -> Self {
        IdentityFile {
            identity: identity.id().to_string(),
            secret_key: hex::encode(identity.secret_key().as_bytes()),
            server_group: identity.server_group().to_string(),
            nickname: identity.nickname().map(str::to_string),
        }
    }

    pub fn to_identity(&self) -> Result<Identity> {
        let id: IdentityId = self
            .identity
            .parse()
            .context("Invalid identity in identity file")?;
        let secret_bytes = hex::decode(&self.secret_key).context("Invalid secret key encoding")?;
        let secret = SecretKey::from_slice(&secret_bytes).context("Invalid secret key")?;
        let identity = Identity::new(id, secret, self.server_group.clone());
        Ok(match &self.nickname {
            Some(nickname) => identity.with_nickname(nickname.clone()),
            None => identity,
        })
    }
}

impl CliConfig {
    pub fn identity_path(&self) -> PathBuf {
        self.data_dir.join("identity.json")
    }

    pub fn contacts_path(&self) -> PathBuf {
        self.data_dir.join("contacts.json")
    }

    pub fn nonce_db_path(&self) -> PathBuf {
        self.data_dir.join("nonces.db")
    }

    pub fn queue_path(&self) -> PathBuf {
        self.data_dir.join("queue.bin")
    }

    pub fn is_initialized(&self) -> bool {
        self.identity_path().exists()
    }

    pub fn load_identity(&self) -> Result<Identity> {
        if !self.is_initialized() {
            bail!("No identity found. Run 'courier backup-import' first.");
        }
        let json = fs::read_to_string(self.identity_path())?;
        let file: IdentityFile = serde_json::from_str(&json)?;
        file.to_identity()
    }

    pub fn save_identity(&self, identity: &Identity) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        let json = serde_json::to_string_pretty(&IdentityFile::from_identity(identity))?;
        fs::write(self.identity_path(), json)?;
        Ok(())
    }

    /// Loads `contacts.json` (`{"IDENTITY": "hex public key"}`), if present.
    pub fn load_contacts(&self) -> Result<MemoryContactStore> {
        let store = MemoryContactStore::new();
        let path = self.contacts_path();
        if !path.exists() {
            return Ok(store);
        }
        let entries: HashMap<String, String> = serde_json::from_str(&fs::read_to_string(path)?)?;
        for (identity, key) in entries {
            let id: IdentityId = identity
                .parse()
                .with_context(|| format!("Invalid contact {identity}"))?;
            let key = PublicKey::from_hex(&key)
                .with_context(|| format!("Invalid key for {identity}"))?;
            store.add(id, key);
        }
        Ok(store)
    }

    /// Connection config from the config file or the command line.
    pub fn connection_config(&self) -> Result<ConnectionConfig> {
        let mut config = match (&self.config_file, &self.server_key) {
            (Some(path), _) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("Reading {}", path.display()))?;
                serde_json::from_str(&json).context("Invalid connection config")?
            }
            (None, Some(key)) => {
                ConnectionConfig::new(PublicKey::from_hex(key).context("Invalid server key")?)
            }
            (None, None) => bail!("Either --config or --server-key is required"),
        };
        if let Some(prefix) = &self.server_prefix {
            config.server_name_prefix = prefix.clone();
        }
        if let Some(suffix) = &self.server_suffix {
            config.server_name_suffix = suffix.clone();
        }
        Ok(config)
    }
}
