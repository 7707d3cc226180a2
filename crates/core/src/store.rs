//! On-disk client configs
//!
//! Each client is one `<name>.conf` file in the clients directory, with an
//! optional sibling `<name>.png` QR artifact. A client is active iff its config
//! file exists.

use crate::config::ProvisionerConfig;
use crate::keys::KeyGenerator;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};

const CONFIG_EXT: &str = "conf";
const ARTIFACT_EXT: &str = "png";

/// Client config store rooted at the clients directory
#[derive(Debug, Clone)]
pub struct ClientStore {
    config: Arc<ProvisionerConfig>,
}

impl ClientStore {
    pub fn new(config: Arc<ProvisionerConfig>) -> Self {
        Self { config }
    }

    pub fn dir(&self) -> &Path {
        &self.config.clients_dir
    }

    /// Path of a client's config file
    pub fn config_path(&self, name: &str) -> PathBuf {
        self.dir().join(format!("{}.{}", name, CONFIG_EXT))
    }

    /// Path of a client's QR artifact
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.config_path(name).with_extension(ARTIFACT_EXT)
    }

    /// Whether a client config exists
    pub async fn exists(&self, name: &str) -> Result<bool> {
        Ok(fs::try_exists(self.config_path(name)).await?)
    }

    /// Render the client config text
    pub fn render(&self, address: &str, private_key: &str) -> String {
        let c = &self.config;
        format!(
            r#"[Interface]
PrivateKey = {private_key}
Address = {address}
DNS = {dns}
MTU = {mtu}

[Peer]
PublicKey = {server_public_key}
AllowedIPs = {allowed_ips}
Endpoint = {endpoint}
PersistentKeepalive = {keepalive}
"#,
            private_key = private_key,
            address = address,
            dns = c.dns,
            mtu = c.mtu,
            server_public_key = c.server_public_key,
            allowed_ips = c.allowed_ips,
            endpoint = c.server_endpoint,
            keepalive = c.keepalive,
        )
    }

    /// Write a client config, replacing any existing file of the same name
    pub async fn write_config(&self, name: &str, address: &str, private_key: &str) -> Result<PathBuf> {
        fs::create_dir_all(self.dir()).await?;
        let path = self.config_path(name);
        if fs::try_exists(&path).await? {
            warn!("Overwriting existing config for {}", name);
        }
        fs::write(&path, self.render(address, private_key)).await?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Read a client config, `None` if the client does not exist
    pub async fn read(&self, name: &str) -> Result<Option<String>> {
        match fs::read(self.config_path(name)).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Recover a client's public key from the private key in its config
    ///
    /// `None` when the file holds no usable `PrivateKey` line.
    pub async fn extract_public_key(
        &self,
        config_path: &Path,
        keys: &dyn KeyGenerator,
    ) -> Result<Option<String>> {
        let bytes = fs::read(config_path).await?;
        let Ok(text) = String::from_utf8(bytes) else {
            warn!("{} is not valid UTF-8", config_path.display());
            return Ok(None);
        };
        match parse_field(&text, "PrivateKey") {
            Some(private_key) => Ok(Some(keys.public_key(&private_key).await?)),
            None => Ok(None),
        }
    }

    /// Delete a client's config and artifact; missing files are fine
    pub async fn remove(&self, name: &str) -> Result<()> {
        remove_if_exists(&self.config_path(name)).await?;
        remove_if_exists(&self.artifact_path(name)).await?;
        Ok(())
    }

    /// Names of all clients with a config file, sorted
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = match fs::read_dir(self.dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CONFIG_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Value of the first `key = value` line starting with `key`
///
/// Empty values count as absent.
pub fn parse_field(text: &str, key: &str) -> Option<String> {
    text.lines()
        .find(|line| line.starts_with(key) && line.contains('='))
        .and_then(|line| line.split_once('='))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Reject names that cannot be used verbatim as a file stem
pub fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
