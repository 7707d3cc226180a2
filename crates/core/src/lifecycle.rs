//! Client lifecycle
//!
//! Sequences the allocator, key generator, config store, artifact encoder and
//! peer registrar into create / revoke / fetch. There is no transaction across
//! the counter file, the config files and the daemon: steps run in a fixed
//! order with the daemon change last, nothing is rolled back, and `fetch`,
//! `list` and `audit` are the way to inspect what a failed step left behind.
//!
//! The manager trusts its caller; operator checks belong to the front end.

use crate::allocator::{host_cidr, AddressAllocator};
use crate::artifact::{ArtifactEncoder, NativeQr, QrencodeCli};
use crate::config::{ArtifactBackend, KeyBackend, ProvisionerConfig};
use crate::keys::{KeyGenerator, NativeKeys, WgCliKeys};
use crate::registrar::{PeerRegistrar, WgCliRegistrar};
use crate::store::{parse_field, validate_name, ClientStore};
use crate::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// A freshly provisioned client
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedClient {
    pub name: String,
    /// Host address with its /32 suffix
    pub address: String,
    pub public_key: String,
    pub config_path: PathBuf,
    pub artifact_path: PathBuf,
}

/// Outcome of a revocation
#[derive(Debug, Clone, Serialize)]
pub struct RevokedClient {
    pub name: String,
    /// Key recovered from the config, if any
    pub public_key: Option<String>,
    /// Whether the daemon was asked to drop the peer
    pub peer_removed: bool,
}

/// A stored client config
#[derive(Debug, Clone, Serialize)]
pub struct ClientArtifact {
    pub name: String,
    pub config_path: PathBuf,
    pub artifact_path: Option<PathBuf>,
    pub contents: String,
    pub address: Option<String>,
}

/// Disagreement between the daemon peer table and the config files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    /// Configs whose key is not registered on the daemon
    pub unregistered_clients: Vec<String>,
    /// Daemon peers with no config file
    pub orphaned_peers: Vec<String>,
    /// Configs with no recoverable key
    pub unreadable_clients: Vec<String>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.unregistered_clients.is_empty()
            && self.orphaned_peers.is_empty()
            && self.unreadable_clients.is_empty()
    }
}

/// Client lifecycle manager
pub struct ClientManager {
    config: Arc<ProvisionerConfig>,
    allocator: AddressAllocator,
    store: ClientStore,
    keys: Arc<dyn KeyGenerator>,
    encoder: Arc<dyn ArtifactEncoder>,
    registrar: Arc<dyn PeerRegistrar>,
}

impl ClientManager {
    /// Create a manager with explicit backends
    pub fn new(
        config: Arc<ProvisionerConfig>,
        keys: Arc<dyn KeyGenerator>,
        encoder: Arc<dyn ArtifactEncoder>,
        registrar: Arc<dyn PeerRegistrar>,
    ) -> Self {
        Self {
            allocator: AddressAllocator::new(config.alloc_path()),
            store: ClientStore::new(config.clone()),
            config,
            keys,
            encoder,
            registrar,
        }
    }

    /// Create a manager with the backends selected in the configuration
    pub fn from_config(config: Arc<ProvisionerConfig>) -> Self {
        let tools = &config.tools;
        let keys: Arc<dyn KeyGenerator> = match tools.key_backend {
            KeyBackend::Wg => Arc::new(WgCliKeys::new(tools.wg_binary.clone())),
            KeyBackend::Native => Arc::new(NativeKeys),
        };
        let encoder: Arc<dyn ArtifactEncoder> = match tools.artifact_backend {
            ArtifactBackend::Qrencode => Arc::new(QrencodeCli::new(tools.qrencode_binary.clone())),
            ArtifactBackend::Native => Arc::new(NativeQr::default()),
        };
        let registrar = Arc::new(WgCliRegistrar::new(
            tools.wg_binary.clone(),
            config.interface.clone(),
        ));
        Self::new(config, keys, encoder, registrar)
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    pub fn store(&self) -> &ClientStore {
        &self.store
    }

    pub fn allocator(&self) -> &AddressAllocator {
        &self.allocator
    }

    /// Provision a new client
    ///
    /// Re-using a name overwrites its files; the old peer stays registered.
    pub async fn create(&self, name: &str) -> Result<ProvisionedClient> {
        validate_name(name)?;
        if self.store.exists(name).await? {
            warn!("Client {} already exists; its previous peer stays registered", name);
        }

        let ip = self
            .allocator
            .allocate(&self.config.vpn_subnet)
            .await
            .inspect_err(|e| error!("Address allocation for {} failed: {}", name, e))?;
        let address = host_cidr(ip);
        info!("Allocated {} for {}", address, name);

        let keypair = self
            .keys
            .generate()
            .await
            .inspect_err(|e| error!("Key generation for {} failed: {}", name, e))?;

        let config_path = self
            .store
            .write_config(name, &address, &keypair.private_key)
            .await
            .inspect_err(|e| error!("Writing config for {} failed: {}", name, e))?;
        info!("Wrote config {}", config_path.display());

        let artifact_path = self
            .encoder
            .encode(&config_path)
            .await
            .inspect_err(|e| error!("Rendering artifact for {} failed: {}", name, e))?;

        self.registrar
            .add_peer(&keypair.public_key, &address)
            .await
            .inspect_err(|e| {
                error!(
                    "Registering peer for {} failed, config left at {}: {}",
                    name,
                    config_path.display(),
                    e
                )
            })?;

        info!("Client {} provisioned at {}", name, address);
        Ok(ProvisionedClient {
            name: name.to_string(),
            address,
            public_key: keypair.public_key,
            config_path,
            artifact_path,
        })
    }

    /// Revoke a client, `None` if it does not exist
    pub async fn revoke(&self, name: &str) -> Result<Option<RevokedClient>> {
        validate_name(name)?;
        if !self.store.exists(name).await? {
            info!("Revoke: no client named {}", name);
            return Ok(None);
        }

        let config_path = self.store.config_path(name);
        let public_key = self
            .store
            .extract_public_key(&config_path, self.keys.as_ref())
            .await
            .inspect_err(|e| error!("Recovering key for {} failed: {}", name, e))?;

        let peer_removed = match &public_key {
            Some(key) => {
                self.registrar
                    .remove_peer(key)
                    .await
                    .inspect_err(|e| error!("Removing peer for {} failed: {}", name, e))?;
                true
            }
            None => {
                warn!("No private key in {}; skipping daemon removal", config_path.display());
                false
            }
        };

        self.store
            .remove(name)
            .await
            .inspect_err(|e| error!("Deleting files for {} failed: {}", name, e))?;

        info!("Client {} revoked", name);
        Ok(Some(RevokedClient {
            name: name.to_string(),
            public_key,
            peer_removed,
        }))
    }

    /// Fetch a client's stored config, `None` if it does not exist
    pub async fn fetch(&self, name: &str) -> Result<Option<ClientArtifact>> {
        validate_name(name)?;
        let Some(contents) = self.store.read(name).await? else {
            return Ok(None);
        };

        let artifact_path = self.store.artifact_path(name);
        let artifact_path = tokio::fs::try_exists(&artifact_path)
            .await?
            .then_some(artifact_path);

        Ok(Some(ClientArtifact {
            name: name.to_string(),
            config_path: self.store.config_path(name),
            artifact_path,
            address: parse_field(&contents, "Address"),
            contents,
        }))
    }

    /// Names of all active clients
    pub async fn list(&self) -> Result<Vec<String>> {
        self.store.list().await
    }

    /// Compare the daemon peer table with the config files
    pub async fn audit(&self) -> Result<DriftReport> {
        let peers: HashSet<String> = self.registrar.list_peers().await?.into_iter().collect();
        let mut report = DriftReport::default();
        let mut known = HashSet::new();

        for name in self.store.list().await? {
            let path = self.store.config_path(&name);
            match self.store.extract_public_key(&path, self.keys.as_ref()).await {
                Ok(Some(key)) => {
                    if !peers.contains(&key) {
                        report.unregistered_clients.push(name);
                    }
                    known.insert(key);
                }
                Ok(None) => report.unreadable_clients.push(name),
                Err(e) => {
                    warn!("Cannot recover key for {}: {}", name, e);
                    report.unreadable_clients.push(name);
                }
            }
        }

        report.orphaned_peers = peers.difference(&known).cloned().collect();
        report.orphaned_peers.sort();

        if report.is_clean() {
            info!("Audit clean: {} clients, {} peers", known.len(), peers.len());
        } else {
            warn!(
                "Audit drift: {} unregistered, {} orphaned, {} unreadable",
                report.unregistered_clients.len(),
                report.orphaned_peers.len(),
                report.unreadable_clients.len()
            );
        }
        Ok(report)
    }
}
