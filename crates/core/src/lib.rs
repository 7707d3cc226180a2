//! Peerwarden Core Library
//!
//! Address allocation and WireGuard client lifecycle: allocate an address,
//! generate keys, write the client config and its QR artifact, register the
//! peer on the tunnel daemon, and undo all of it on revocation.

pub mod allocator;
pub mod artifact;
pub mod config;
pub mod error;
pub mod exec;
pub mod keys;
pub mod lifecycle;
pub mod registrar;
pub mod store;

// Re-export commonly used types
pub use allocator::{AddressAllocator, AllocationState};
pub use artifact::{ArtifactEncoder, NativeQr, QrencodeCli};
pub use config::ProvisionerConfig;
pub use error::{Error, ErrorKind, Result};
pub use keys::{KeyGenerator, NativeKeys, WgCliKeys, WgKeyPair};
pub use lifecycle::{ClientArtifact, ClientManager, DriftReport, ProvisionedClient, RevokedClient};
pub use registrar::{PeerRegistrar, WgCliRegistrar};
pub use store::ClientStore;

/// Peerwarden version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file path
pub fn default_config_path() -> std::path::PathBuf {
    std::path::PathBuf::from("/etc/peerwarden/peerwarden.toml")
}
