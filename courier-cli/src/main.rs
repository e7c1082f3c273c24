// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Courier CLI
//!
//! Command-line client for the Courier relay: identity backups, listening
//! for messages and sending text messages.

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "courier")]
#[command(version, about = "End-to-end encrypted messaging client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory (identity, contacts, nonce store, queue)
    #[arg(long, global = true, env = "COURIER_DATA_DIR", default_value = ".courier")]
    data_dir: PathBuf,

    /// JSON connection config file
    #[arg(long, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Server long-term public key (hex), used without a config file
    #[arg(long, global = true, env = "COURIER_SERVER_KEY")]
    server_key: Option<String>,

    /// Server host name prefix
    #[arg(long, global = true, env = "COURIER_SERVER_PREFIX")]
    server_prefix: Option<String>,

    /// Server host name suffix
    #[arg(long, global = true, env = "COURIER_SERVER_SUFFIX")]
    server_suffix: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a password protected backup of the identity
    BackupExport,

    /// Restore the identity from a backup string
    BackupImport {
        /// Backup string (dash separated groups)
        backup: String,

        /// Server group of the restored identity
        #[arg(long, default_value = "00")]
        server_group: String,

        /// Replace an existing identity
        #[arg(long)]
        force: bool,
    },

    /// Connect and print incoming messages
    Listen {
        /// Stop after this many seconds (default: run until killed)
        #[arg(long)]
        seconds: Option<u64>,
    },

    /// Send a text message
    SendText {
        /// Recipient identity
        to: String,

        /// Message text
        text: String,

        /// Recipient public key (hex), if not in contacts.json
        #[arg(long)]
        peer_key: Option<String>,

        /// Seconds to wait for the server acknowledgment
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("courier_core=info,courier=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = CliConfig {
        data_dir: cli.data_dir,
        config_file: cli.config,
        server_key: cli.server_key,
        server_prefix: cli.server_prefix,
        server_suffix: cli.server_suffix,
    };

    match cli.command {
        Commands::BackupExport => commands::backup::export(&config)?,
        Commands::BackupImport {
            backup,
            server_group,
            force,
        } => commands::backup::import(&config, &backup, &server_group, force)?,
        Commands::Listen { seconds } => commands::messaging::listen(&config, seconds)?,
        Commands::SendText {
            to,
            text,
            peer_key,
            timeout,
        } => commands::messaging::send_text(&config, &to, &text, peer_key.as_deref(), timeout)?,
    }

    Ok(())
}
