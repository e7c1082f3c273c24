// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Connection Configuration
//!
//! Endpoint naming, server keys and protocol timing for [`super::Connection`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use crate::crypto::PublicKey;

/// Default plaintext port of the relay.
pub const DEFAULT_PORT: u16 = 5222;
/// Fallback port, tried after the primary port of the same address.
pub const DEFAULT_ALT_PORT: u16 = 443;

/// Highest exponent used for reconnect backoff.
const MAX_BACKOFF_EXPONENT: i64 = 10;

fn default_prefix() -> String {
    "g-".to_string()
}

fn default_ipv6_prefix() -> String {
    "ds.".to_string()
}

fn default_suffix() -> String {
    ".0.courier.chat".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_alt_port() -> u16 {
    DEFAULT_ALT_PORT
}

fn default_true() -> bool {
    true
}

fn default_version() -> String {
    format!(
        "courier-core/{}",
        option_env!("CARGO_PKG_VERSION").unwrap_or("0.1.0")
    )
}

fn default_connect_timeout_ms() -> u64 {
    15_000
}

fn default_connect_timeout_ipv6_ms() -> u64 {
    3_000
}

fn default_read_timeout_ms() -> u64 {
    20_000
}

fn default_keepalive_interval_ms() -> u64 {
    180_000
}

fn default_reconnect_base() -> u32 {
    2
}

fn default_reconnect_max_ms() -> u64 {
    10_000
}

fn default_ephemeral_key_max_age_ms() -> u64 {
    7 * 24 * 60 * 60 * 1000
}

/// Relay connection configuration.
///
/// The server host name is `[ipv6_prefix] prefix (server_group | ".") suffix`.
/// Only the server keys are mandatory when deserializing; every other field
/// falls back to the protocol defaults.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_prefix")]
    pub server_name_prefix: String,
    #[serde(default = "default_ipv6_prefix")]
    pub server_name_ipv6_prefix: String,
    #[serde(default = "default_suffix")]
    pub server_name_suffix: String,
    #[serde(default = "default_port")]
    pub server_port: u16,
    #[serde(default = "default_alt_port")]
    pub server_port_alt: u16,
    #[serde(default)]
    pub use_ipv6: bool,
    #[serde(default = "default_true")]
    pub use_server_group: bool,
    /// Long-term public key of the relay.
    #[serde_as(as = "Hex")]
    pub server_public_key: PublicKey,
    /// Alternate long-term key, tried when the server hello does not open
    /// with the primary key.
    #[serde_as(as = "Hex")]
    pub server_public_key_alt: PublicKey,
    /// Client version string, truncated to 32 bytes in the login block.
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ipv6_ms")]
    pub connect_timeout_ipv6_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,
    #[serde(default = "default_reconnect_base")]
    pub reconnect_base: u32,
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    #[serde(default = "default_ephemeral_key_max_age_ms")]
    pub ephemeral_key_max_age_ms: u64,
}

impl ConnectionConfig {
    /// Creates a config with protocol defaults for the given server key.
    pub fn new(server_public_key: PublicKey) -> Self {
        ConnectionConfig {
            server_name_prefix: default_prefix(),
            server_name_ipv6_prefix: default_ipv6_prefix(),
            server_name_suffix: default_suffix(),
            server_port: DEFAULT_PORT,
            server_port_alt: DEFAULT_ALT_PORT,
            use_ipv6: false,
            use_server_group: true,
            server_public_key,
            server_public_key_alt: server_public_key,
            version: default_version(),
            connect_timeout_ms: default_connect_timeout_ms(),
            connect_timeout_ipv6_ms: default_connect_timeout_ipv6_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            keepalive_interval_ms: default_keepalive_interval_ms(),
            reconnect_base: default_reconnect_base(),
            reconnect_max_ms: default_reconnect_max_ms(),
            ephemeral_key_max_age_ms: default_ephemeral_key_max_age_ms(),
        }
    }

    pub fn with_alt_server_key(mut self, key: PublicKey) -> Self {
        self.server_public_key_alt = key;
        self
    }

    pub fn with_server_name(
        mut self,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        self.server_name_prefix = prefix.into();
        self.server_name_suffix = suffix.into();
        self
    }

    pub fn with_ports(mut self, port: u16, alt_port: u16) -> Self {
        self.server_port = port;
        self.server_port_alt = alt_port;
        self
    }

    pub fn with_ipv6(mut self, use_ipv6: bool) -> Self {
        self.use_ipv6 = use_ipv6;
        self
    }

    pub fn with_server_group(mut self, use_server_group: bool) -> Self {
        self.use_server_group = use_server_group;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Overrides read timeout and keepalive interval (used by tests).
    pub fn with_timing(mut self, read_timeout: Duration, keepalive_interval: Duration) -> Self {
        self.read_timeout_ms = read_timeout.as_millis() as u64;
        self.keepalive_interval_ms = keepalive_interval.as_millis() as u64;
        self
    }

    pub fn with_reconnect(mut self, base: u32, max: Duration) -> Self {
        self.reconnect_base = base;
        self.reconnect_max_ms = max.as_millis() as u64;
        self
    }

    /// Builds the host name for a server group.
    pub fn server_host(&self, server_group: &str) -> String {
        let mut host = String::new();
        if self.use_ipv6 {
            host.push_str(&self.server_name_ipv6_prefix);
        }
        host.push_str(&self.server_name_prefix);
        if self.use_server_group {
            host.push_str(server_group);
        } else {
            host.push('.');
        }
        host.push_str(&self.server_name_suffix);
        host
    }

    pub fn connect_timeout(&self, ipv6: bool) -> Duration {
        if ipv6 {
            Duration::from_millis(self.connect_timeout_ipv6_ms)
        } else {
            Duration::from_millis(self.connect_timeout_ms)
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn ephemeral_key_max_age(&self) -> Duration {
        Duration::from_millis(self.ephemeral_key_max_age_ms)
    }

    /// Delay before the next connect attempt after `attempts` failures.
    ///
    /// `min(base^min(attempts - 1, 10), max)` seconds; a first retry with
    /// zero recorded attempts waits `1 / base` seconds.
    pub fn reconnect_delay(&self, attempts: u32) -> Duration {
        let exponent = (i64::from(attempts) - 1).min(MAX_BACKOFF_EXPONENT) as i32;
        let base = f64::from(self.reconnect_base.max(1));
        let max = Duration::from_millis(self.reconnect_max_ms);
        let secs = base.powi(exponent);
        if secs >= max.as_secs_f64() {
            return max;
        }
        Duration::try_from_secs_f64(secs).unwrap_or(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new(PublicKey::from_bytes([1u8; 32]))
    }

    #[test]
    fn test_reconnect_delay_huge_base_capped() {
        let json = r#"{
            "server_public_key": "0101010101010101010101010101010101010101010101010101010101010101",
            "server_public_key_alt": "0101010101010101010101010101010101010101010101010101010101010101",
            "reconnect_base": 100
        }"#;
        let cfg: ConnectionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.reconnect_delay(11), Duration::from_secs(10));

        let cfg = config().with_reconnect(u32::MAX, Duration::from_secs(3));
        assert_eq!(cfg.reconnect_delay(u32::MAX), Duration::from_secs(3));
        assert!(cfg.reconnect_delay(0) < Duration::from_millis(1));
    }

    #[test]
    fn test_server_host_with_group() {
        assert_eq!(config().server_host("4f"), "g-4f.0.courier.chat");
    }

    #[test]
    fn test_server_host_without_group_ipv6() {
        let cfg = config().with_server_group(false).with_ipv6(true);
        assert_eq!(cfg.server_host("4f"), "ds.g-..0.courier.chat");
    }

    #[test]
    fn test_reconnect_delay_sequence() {
        let cfg = config();
        let delays: Vec<_> = (0..8).map(|n| cfg.reconnect_delay(n)).collect();
        assert_eq!(delays[0], Duration::from_millis(500));
        assert_eq!(delays[1], Duration::from_secs(1));
        assert_eq!(delays[2], Duration::from_secs(2));
        assert_eq!(delays[3], Duration::from_secs(4));
        assert_eq!(delays[4], Duration::from_secs(8));
        assert_eq!(delays[5], Duration::from_secs(10));
        assert_eq!(delays[7], Duration::from_secs(10));
    }

    #[test]
    fn test_reconnect_delay_huge_attempts_is_capped() {
        assert_eq!(config().reconnect_delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = format!(
            r#"{{"server_public_key":"{}","server_public_key_alt":"{}"}}"#,
            "01".repeat(32),
            "02".repeat(32)
        );
        let cfg: ConnectionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.server_port, DEFAULT_PORT);
        assert_eq!(cfg.server_public_key_alt, PublicKey::from_bytes([2u8; 32]));
        assert_eq!(cfg.read_timeout(), Duration::from_secs(20));
    }
}
