//! WireGuard key generation
//!
//! Two backends behind [`KeyGenerator`]:
//! - `WgCliKeys` shells out to `wg genkey` / `wg pubkey` (default)
//! - `NativeKeys` uses x25519-dalek in-process

use crate::{exec, Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::debug;

/// WireGuard key pair, both halves base64 encoded
#[derive(Clone, PartialEq, Eq)]
pub struct WgKeyPair {
    pub private_key: String,
    pub public_key: String,
}

impl std::fmt::Debug for WgKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgKeyPair")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Key generator interface
#[async_trait]
pub trait KeyGenerator: Send + Sync {
    /// Generate a fresh key pair
    async fn generate(&self) -> Result<WgKeyPair>;

    /// Derive the public key for a base64 private key
    async fn public_key(&self, private_key: &str) -> Result<String>;
}

// ============================================================================
// wg CLI backend
// ============================================================================

/// Keys produced by the `wg` tool
#[derive(Debug, Clone)]
pub struct WgCliKeys {
    wg_binary: String,
}

impl WgCliKeys {
    pub fn new(wg_binary: impl Into<String>) -> Self {
        Self {
            wg_binary: wg_binary.into(),
        }
    }
}

#[async_trait]
impl KeyGenerator for WgCliKeys {
    async fn generate(&self) -> Result<WgKeyPair> {
        let private_key = exec::run(&self.wg_binary, &["genkey"], None).await?;
        let public_key = self.public_key(&private_key).await?;
        debug!("Generated key pair {}", public_key);
        Ok(WgKeyPair {
            private_key,
            public_key,
        })
    }

    async fn public_key(&self, private_key: &str) -> Result<String> {
        let input = format!("{}\n", private_key);
        exec::run(&self.wg_binary, &["pubkey"], Some(&input)).await
    }
}

// ============================================================================
// In-process backend
// ============================================================================

/// Keys produced in-process with x25519
#[derive(Debug, Clone, Default)]
pub struct NativeKeys;

#[async_trait]
impl KeyGenerator for NativeKeys {
    async fn generate(&self) -> Result<WgKeyPair> {
        Ok(generate_wireguard_keypair())
    }

    async fn public_key(&self, private_key: &str) -> Result<String> {
        derive_public_key(private_key)
    }
}

/// Generate a WireGuard keypair using x25519
pub fn generate_wireguard_keypair() -> WgKeyPair {
    use rand::RngCore;

    let mut private_key_bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut private_key_bytes);

    // WireGuard clamping, same as `wg genkey`
    private_key_bytes[0] &= 248;
    private_key_bytes[31] &= 127;
    private_key_bytes[31] |= 64;

    let public = public_from_bytes(private_key_bytes);
    WgKeyPair {
        private_key: STANDARD.encode(private_key_bytes),
        public_key: STANDARD.encode(public),
    }
}

/// Derive a base64 public key from a base64 private key
pub fn derive_public_key(private_key: &str) -> Result<String> {
    let bytes = STANDARD.decode(private_key.trim())?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::Parse("Invalid private key length".to_string()))?;
    Ok(STANDARD.encode(public_from_bytes(bytes)))
}

fn public_from_bytes(private_key: [u8; 32]) -> [u8; 32] {
    use x25519_dalek::{PublicKey, StaticSecret};

    let secret = StaticSecret::from(private_key);
    PublicKey::from(&secret).to_bytes()
}
