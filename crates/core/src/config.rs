//! Provisioner configuration
//!
//! Loaded once at startup (TOML file, then environment overrides), validated,
//! and shared read-only behind an `Arc` for the rest of the process.

use crate::{Error, Result};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Name of the allocation counter file inside the clients directory
pub const ALLOC_FILE: &str = "alloc.json";

/// Provisioner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Identity of the single operator allowed to drive the lifecycle
    pub operator_id: i64,

    /// WireGuard interface on the server
    pub interface: String,

    /// Server public key embedded in every client config
    pub server_public_key: String,

    /// Server endpoint (host:port)
    pub server_endpoint: String,

    /// Address block clients are allocated from
    pub vpn_subnet: String,

    /// DNS server pushed to clients
    pub dns: String,

    /// PersistentKeepalive in seconds
    pub keepalive: u32,

    /// Directory holding client configs, artifacts and the counter file
    pub clients_dir: PathBuf,

    /// Routes clients send through the tunnel
    pub allowed_ips: String,

    /// Client interface MTU
    pub mtu: u32,

    /// External tool configuration
    pub tools: ToolsConfig,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            operator_id: 0,
            interface: "wg0".to_string(),
            server_public_key: String::new(),
            server_endpoint: String::new(),
            vpn_subnet: "10.8.1.0/24".to_string(),
            dns: "1.1.1.1".to_string(),
            keepalive: 25,
            clients_dir: PathBuf::from("/opt/wg-bot/clients"),
            allowed_ips: "0.0.0.0/0,::/0".to_string(),
            mtu: 1420,
            tools: ToolsConfig::default(),
        }
    }
}

/// Which implementation produces keypairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyBackend {
    /// `wg genkey` / `wg pubkey`
    Wg,
    /// In-process x25519
    Native,
}

/// Which implementation renders the QR artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactBackend {
    /// `qrencode -t PNG`
    Qrencode,
    /// In-process qrcode + PNG encoder
    Native,
}

/// External tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Path to the wg binary
    pub wg_binary: String,

    /// Path to the qrencode binary
    pub qrencode_binary: String,

    pub key_backend: KeyBackend,

    pub artifact_backend: ArtifactBackend,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            wg_binary: "wg".to_string(),
            qrencode_binary: "qrencode".to_string(),
            key_backend: KeyBackend::Wg,
            artifact_backend: ArtifactBackend::Qrencode,
        }
    }
}

impl ProvisionerConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SUPER_OWNER_CHAT_ID") {
            self.operator_id = parse_number("SUPER_OWNER_CHAT_ID", &v)?;
        }
        if let Some(v) = lookup("WG_INTERFACE") {
            self.interface = v;
        }
        if let Some(v) = lookup("SERVER_PUBLIC_KEY") {
            self.server_public_key = v;
        }
        if let Some(v) = lookup("SERVER_ENDPOINT") {
            self.server_endpoint = v;
        }
        if let Some(v) = lookup("VPN_SUBNET") {
            self.vpn_subnet = v;
        }
        if let Some(v) = lookup("DNS_IP") {
            self.dns = v;
        }
        if let Some(v) = lookup("KEEPALIVE") {
            self.keepalive = parse_number("KEEPALIVE", &v)?;
        }
        if let Some(v) = lookup("CLIENTS_DIR") {
            self.clients_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ALLOWED_IPS") {
            self.allowed_ips = v;
        }
        if let Some(v) = lookup("MTU") {
            self.mtu = parse_number("MTU", &v)?;
        }
        if let Some(v) = lookup("WG_BINARY") {
            self.tools.wg_binary = v;
        }
        if let Some(v) = lookup("QRENCODE_BINARY") {
            self.tools.qrencode_binary = v;
        }
        Ok(self)
    }

    /// Check the configuration before it is frozen
    pub fn validate(&self) -> Result<()> {
        self.subnet()?;
        if self.interface.trim().is_empty() {
            return Err(Error::InvalidConfig("interface name is empty".to_string()));
        }
        if self.server_public_key.is_empty() {
            warn!("server_public_key is empty; client configs will not connect");
        }
        if self.server_endpoint.is_empty() {
            warn!("server_endpoint is empty; client configs will not connect");
        }
        Ok(())
    }

    /// Parsed address block
    pub fn subnet(&self) -> Result<IpNetwork> {
        Ok(self.vpn_subnet.parse::<IpNetwork>()?)
    }

    /// Path of the allocation counter file
    pub fn alloc_path(&self) -> PathBuf {
        self.clients_dir.join(ALLOC_FILE)
    }

    /// Whether the caller is the configured operator
    pub fn is_operator(&self, caller_id: i64) -> bool {
        caller_id == self.operator_id
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("{} is not a number: {:?}", key, value)))
}
