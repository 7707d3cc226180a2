//! Error types for peerwarden

use thiserror::Error;

/// Result type alias using the peerwarden Error
pub type Result<T> = std::result::Result<T, Error>;

/// Peerwarden error types
///
/// "Client not found" is deliberately absent: lookups by name return
/// `Ok(None)` instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Command failed: {command}\n{stderr}")]
    ExternalTool {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid client name: {0:?}")]
    InvalidName(String),

    #[error("Address space exhausted")]
    AddressSpaceExhausted,

    #[error("Artifact error: {0}")]
    Artifact(String),
}

/// Coarse error classification for front ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parse,
    ExternalTool,
    InvalidConfig,
    InvalidName,
    AddressSpaceExhausted,
    Artifact,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Parse(_) => ErrorKind::Parse,
            Error::ExternalTool { .. } => ErrorKind::ExternalTool,
            Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Error::InvalidName(_) => ErrorKind::InvalidName,
            Error::AddressSpaceExhausted => ErrorKind::AddressSpaceExhausted,
            Error::Artifact(_) => ErrorKind::Artifact,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<ipnetwork::IpNetworkError> for Error {
    fn from(e: ipnetwork::IpNetworkError) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::Parse(format!("invalid base64 key: {}", e))
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Artifact(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_tool_message_carries_stderr() {
        let err = Error::ExternalTool {
            command: "wg set wg0 peer abc remove".to_string(),
            status: Some(1),
            stderr: "Unable to access interface: No such device".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("wg set wg0 peer abc remove"));
        assert!(msg.contains("No such device"));
        assert_eq!(err.kind(), ErrorKind::ExternalTool);
    }

    #[test]
    fn test_conversions_map_to_parse() {
        let err: Error = "10.8.1.0/99".parse::<ipnetwork::IpNetwork>().unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Parse);

        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
