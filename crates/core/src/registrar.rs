//! Peer registration on the running WireGuard interface

use crate::{exec, Result};
use async_trait::async_trait;
use tracing::info;

/// Peer registrar interface
#[async_trait]
pub trait PeerRegistrar: Send + Sync {
    /// Add (or update) a peer limited to a single host address
    async fn add_peer(&self, public_key: &str, address: &str) -> Result<()>;

    /// Remove a peer
    async fn remove_peer(&self, public_key: &str) -> Result<()>;

    /// Public keys of the peers currently configured on the interface
    async fn list_peers(&self) -> Result<Vec<String>>;
}

/// Registrar driving `wg set` on one interface
#[derive(Debug, Clone)]
pub struct WgCliRegistrar {
    wg_binary: String,
    interface: String,
}

impl WgCliRegistrar {
    pub fn new(wg_binary: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            wg_binary: wg_binary.into(),
            interface: interface.into(),
        }
    }

    /// Arguments for `wg set <iface> peer <key> allowed-ips <ip>/32`
    pub fn add_peer_args(&self, public_key: &str, address: &str) -> Vec<String> {
        vec![
            "set".to_string(),
            self.interface.clone(),
            "peer".to_string(),
            public_key.to_string(),
            "allowed-ips".to_string(),
            host_route(address),
        ]
    }

    /// Arguments for `wg set <iface> peer <key> remove`
    pub fn remove_peer_args(&self, public_key: &str) -> Vec<String> {
        vec![
            "set".to_string(),
            self.interface.clone(),
            "peer".to_string(),
            public_key.to_string(),
            "remove".to_string(),
        ]
    }

    async fn wg(&self, args: &[String]) -> Result<String> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        exec::run(&self.wg_binary, &args, None).await
    }
}

#[async_trait]
impl PeerRegistrar for WgCliRegistrar {
    async fn add_peer(&self, public_key: &str, address: &str) -> Result<()> {
        self.wg(&self.add_peer_args(public_key, address)).await?;
        info!("Registered peer {} on {}", public_key, self.interface);
        Ok(())
    }

    async fn remove_peer(&self, public_key: &str) -> Result<()> {
        self.wg(&self.remove_peer_args(public_key)).await?;
        info!("Removed peer {} from {}", public_key, self.interface);
        Ok(())
    }

    async fn list_peers(&self) -> Result<Vec<String>> {
        let out = self
            .wg(&["show".to_string(), self.interface.clone(), "peers".to_string()])
            .await?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Strip any prefix from `address` and re-suffix it as a host route
///
/// `/32` for IPv4; IPv6 hosts get `/128`.
pub fn host_route(address: &str) -> String {
    let host = address.split('/').next().unwrap_or(address);
    if host.contains(':') {
        format!("{}/128", host)
    } else {
        format!("{}/32", host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_route() {
        assert_eq!(host_route("10.8.1.2/32"), "10.8.1.2/32");
        assert_eq!(host_route("10.8.1.2/24"), "10.8.1.2/32");
        assert_eq!(host_route("10.8.1.2"), "10.8.1.2/32");
        assert_eq!(host_route("fd00:8::2/128"), "fd00:8::2/128");
    }

    #[test]
    fn test_add_peer_args() {
        let reg = WgCliRegistrar::new("wg", "wg0");
        assert_eq!(
            reg.add_peer_args("PUB=", "10.8.1.2/32"),
            vec!["set", "wg0", "peer", "PUB=", "allowed-ips", "10.8.1.2/32"]
        );
    }

    #[test]
    fn test_remove_peer_args() {
        let reg = WgCliRegistrar::new("wg", "wg1");
        assert_eq!(
            reg.remove_peer_args("PUB="),
            vec!["set", "wg1", "peer", "PUB=", "remove"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_surfaces_as_external_tool() {
        let reg = WgCliRegistrar::new("false", "wg0");
        let err = reg.add_peer("PUB=", "10.8.1.2/32").await.unwrap_err();
        assert!(matches!(err, crate::Error::ExternalTool { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_peers_parses_lines() {
        // `echo show wg0 peers` prints its arguments back as a single line
        let reg = WgCliRegistrar::new("echo", "wg0");
        assert_eq!(reg.list_peers().await.unwrap(), vec!["show wg0 peers"]);
    }
}
