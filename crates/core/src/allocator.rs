//! Client address allocation
//!
//! A plain counter walk over the address block. The cursor lives in a small
//! JSON file (`{"last": N}`); every allocation bumps it by one and returns
//! `network + N`. Nothing is ever handed back, and the read-modify-write is not
//! atomic: two concurrent allocations can observe the same cursor.

use crate::{Error, Result};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Persisted allocation cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationState {
    #[serde(default = "initial_index")]
    pub last: u64,
}

impl Default for AllocationState {
    fn default() -> Self {
        Self {
            last: initial_index(),
        }
    }
}

/// Index the cursor starts at; the first address handed out is `network + 2`
fn initial_index() -> u64 {
    1
}

/// Counter-backed address allocator
#[derive(Debug, Clone)]
pub struct AddressAllocator {
    state_path: PathBuf,
}

impl AddressAllocator {
    /// Create an allocator persisting its cursor at `state_path`
    pub fn new(state_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Read the persisted cursor without advancing it
    pub async fn current(&self) -> Result<AllocationState> {
        let doc = self.read_document().await?;
        Ok(serde_json::from_value(Value::Object(doc))?)
    }

    /// Allocate the next host address in `subnet`
    ///
    /// Only `last` is rewritten; other keys in the state file are kept.
    pub async fn allocate(&self, subnet: &str) -> Result<IpAddr> {
        let network: IpNetwork = subnet.parse()?;

        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut doc = self.read_document().await?;
        let state: AllocationState = serde_json::from_value(Value::Object(doc.clone()))?;
        let idx = state.last.checked_add(1).ok_or(Error::AddressSpaceExhausted)?;
        let address = offset_address(network.network(), idx)?;

        doc.insert("last".to_string(), Value::from(idx));
        fs::write(&self.state_path, serde_json::to_string(&doc)?).await?;

        debug!("Allocated {} (index {}) from {}", address, idx, network);
        Ok(address)
    }

    /// Raw state file as a JSON object; empty when the file does not exist
    async fn read_document(&self) -> Result<Map<String, Value>> {
        let content = match fs::read_to_string(&self.state_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content)? {
            Value::Object(doc) => Ok(doc),
            other => Err(Error::Parse(format!(
                "{} is not a JSON object: {}",
                self.state_path.display(),
                other
            ))),
        }
    }
}

/// `base + offset`, failing only when the result leaves the address family
pub fn offset_address(base: IpAddr, offset: u64) -> Result<IpAddr> {
    match base {
        IpAddr::V4(v4) => {
            let offset = u32::try_from(offset).map_err(|_| Error::AddressSpaceExhausted)?;
            u32::from(v4)
                .checked_add(offset)
                .map(|n| IpAddr::V4(Ipv4Addr::from(n)))
                .ok_or(Error::AddressSpaceExhausted)
        }
        IpAddr::V6(v6) => u128::from(v6)
            .checked_add(u128::from(offset))
            .map(|n| IpAddr::V6(Ipv6Addr::from(n)))
            .ok_or(Error::AddressSpaceExhausted),
    }
}

/// Host-route CIDR for an address (`/32` for IPv4, `/128` for IPv6)
pub fn host_cidr(address: IpAddr) -> String {
    match address {
        IpAddr::V4(_) => format!("{}/32", address),
        IpAddr::V6(_) => format!("{}/128", address),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_allocator(tmp: &TempDir) -> AddressAllocator {
        AddressAllocator::new(tmp.path().join("clients").join("alloc.json"))
    }

    #[tokio::test]
    async fn test_first_allocation_skips_network_and_gateway() {
        let tmp = TempDir::new().unwrap();
        let alloc = test_allocator(&tmp);

        let ip = alloc.allocate("10.8.1.0/24").await.unwrap();
        assert_eq!(ip, "10.8.1.2".parse::<IpAddr>().unwrap());

        // Directory was created and the cursor persisted
        let raw = std::fs::read_to_string(alloc.state_path()).unwrap();
        assert_eq!(raw, r#"{"last":2}"#);
    }

    #[tokio::test]
    async fn test_sequential_allocations_increase_by_one() {
        let tmp = TempDir::new().unwrap();
        let alloc = test_allocator(&tmp);

        let mut previous: Option<u32> = None;
        for _ in 0..5 {
            let ip = match alloc.allocate("10.8.1.0/24").await.unwrap() {
                IpAddr::V4(v4) => u32::from(v4),
                IpAddr::V6(_) => panic!("expected IPv4"),
            };
            if let Some(prev) = previous {
                assert_eq!(ip, prev + 1);
            }
            previous = Some(ip);
        }

        assert_eq!(alloc.current().await.unwrap().last, 1 + 5);
    }

    #[tokio::test]
    async fn test_uses_network_base_not_given_host() {
        let tmp = TempDir::new().unwrap();
        let alloc = test_allocator(&tmp);

        let ip = alloc.allocate("10.8.1.77/24").await.unwrap();
        assert_eq!(ip, "10.8.1.2".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_resumes_from_persisted_cursor() {
        let tmp = TempDir::new().unwrap();
        let alloc = test_allocator(&tmp);
        std::fs::create_dir_all(alloc.state_path().parent().unwrap()).unwrap();
        std::fs::write(alloc.state_path(), r#"{"last": 9}"#).unwrap();

        let ip = alloc.allocate("10.8.1.0/24").await.unwrap();
        assert_eq!(ip, "10.8.1.10".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_missing_key_defaults_to_initial_index() {
        let tmp = TempDir::new().unwrap();
        let alloc = test_allocator(&tmp);
        std::fs::create_dir_all(alloc.state_path().parent().unwrap()).unwrap();
        std::fs::write(alloc.state_path(), "{}").unwrap();

        let ip = alloc.allocate("10.8.1.0/24").await.unwrap();
        assert_eq!(ip, "10.8.1.2".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_other_state_keys_survive_allocation() {
        let tmp = TempDir::new().unwrap();
        let alloc = test_allocator(&tmp);
        std::fs::create_dir_all(alloc.state_path().parent().unwrap()).unwrap();
        std::fs::write(alloc.state_path(), r#"{"last": 4, "note": "migrated"}"#).unwrap();

        let ip = alloc.allocate("10.8.1.0/24").await.unwrap();
        assert_eq!(ip, "10.8.1.5".parse::<IpAddr>().unwrap());

        let raw: Value =
            serde_json::from_str(&std::fs::read_to_string(alloc.state_path()).unwrap()).unwrap();
        assert_eq!(raw["last"], 5);
        assert_eq!(raw["note"], "migrated");
    }

    #[tokio::test]
    async fn test_non_object_state_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let alloc = test_allocator(&tmp);
        std::fs::create_dir_all(alloc.state_path().parent().unwrap()).unwrap();
        std::fs::write(alloc.state_path(), "[3]").unwrap();

        let err = alloc.allocate("10.8.1.0/24").await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[tokio::test]
    async fn test_no_block_capacity_check() {
        let tmp = TempDir::new().unwrap();
        let alloc = test_allocator(&tmp);
        std::fs::create_dir_all(alloc.state_path().parent().unwrap()).unwrap();
        std::fs::write(alloc.state_path(), r#"{"last": 255}"#).unwrap();

        // Walks straight past the /24
        let ip = alloc.allocate("10.8.1.0/24").await.unwrap();
        assert_eq!(ip, "10.8.2.0".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_malformed_subnet_does_not_advance() {
        let tmp = TempDir::new().unwrap();
        let alloc = test_allocator(&tmp);

        let err = alloc.allocate("not-a-subnet").await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(alloc.current().await.unwrap(), AllocationState::default());
    }

    #[tokio::test]
    async fn test_corrupt_state_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let alloc = test_allocator(&tmp);
        std::fs::create_dir_all(alloc.state_path().parent().unwrap()).unwrap();
        std::fs::write(alloc.state_path(), "last=3").unwrap();

        let err = alloc.allocate("10.8.1.0/24").await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[tokio::test]
    async fn test_ipv6_block() {
        let tmp = TempDir::new().unwrap();
        let alloc = test_allocator(&tmp);

        let ip = alloc.allocate("fd00:8::/64").await.unwrap();
        assert_eq!(ip, "fd00:8::2".parse::<IpAddr>().unwrap());
        assert_eq!(host_cidr(ip), "fd00:8::2/128");
    }

    #[test]
    fn test_offset_overflow() {
        let top: IpAddr = "255.255.255.255".parse().unwrap();
        assert!(matches!(
            offset_address(top, 1),
            Err(Error::AddressSpaceExhausted)
        ));
        assert_eq!(
            host_cidr(offset_address("10.8.1.0".parse().unwrap(), 2).unwrap()),
            "10.8.1.2/32"
        );
    }
}
