//! QR artifacts for client configs
//!
//! The artifact is a PNG QR code of the config text, written next to the
//! config with the same stem, so a phone can import the tunnel by scanning it.

use crate::{exec, Error, Result};
use async_trait::async_trait;
use image::Luma;
use qrcode::QrCode;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Artifact encoder interface
#[async_trait]
pub trait ArtifactEncoder: Send + Sync {
    /// Encode the config at `config_path`, returning the artifact path
    async fn encode(&self, config_path: &Path) -> Result<PathBuf>;
}

/// Sibling artifact path for a config file
pub fn artifact_path_for(config_path: &Path) -> PathBuf {
    config_path.with_extension("png")
}

/// Encoder backed by the `qrencode` tool
#[derive(Debug, Clone)]
pub struct QrencodeCli {
    binary: String,
}

impl QrencodeCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl ArtifactEncoder for QrencodeCli {
    async fn encode(&self, config_path: &Path) -> Result<PathBuf> {
        let text = fs::read_to_string(config_path).await?;
        let png = artifact_path_for(config_path);
        let png_arg = png.to_string_lossy();
        exec::run(&self.binary, &["-o", png_arg.as_ref(), "-t", "PNG", &text], None).await?;
        debug!("Rendered {}", png.display());
        Ok(png)
    }
}

/// In-process encoder (qrcode + PNG)
#[derive(Debug, Clone)]
pub struct NativeQr {
    /// Minimum image edge in pixels
    pub min_size: u32,
}

impl Default for NativeQr {
    fn default() -> Self {
        Self { min_size: 512 }
    }
}

#[async_trait]
impl ArtifactEncoder for NativeQr {
    async fn encode(&self, config_path: &Path) -> Result<PathBuf> {
        let text = fs::read(config_path).await?;
        let png = artifact_path_for(config_path);

        let code = QrCode::new(&text).map_err(|e| Error::Artifact(e.to_string()))?;
        let img = code
            .render::<Luma<u8>>()
            .min_dimensions(self.min_size, self.min_size)
            .build();
        img.save_with_format(&png, image::ImageFormat::Png)?;

        debug!("Rendered {} ({}x{})", png.display(), img.width(), img.height());
        Ok(png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "[Interface]\nPrivateKey = PRIV=\nAddress = 10.8.1.2/32\n";

    #[test]
    fn test_artifact_path_for() {
        assert_eq!(
            artifact_path_for(Path::new("/srv/clients/alice.conf")),
            PathBuf::from("/srv/clients/alice.png")
        );
    }

    #[tokio::test]
    async fn test_native_writes_png() {
        let tmp = TempDir::new().unwrap();
        let conf = tmp.path().join("alice.conf");
        std::fs::write(&conf, SAMPLE).unwrap();

        let png = NativeQr::default().encode(&conf).await.unwrap();
        assert_eq!(png, tmp.path().join("alice.png"));

        let bytes = std::fs::read(&png).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[tokio::test]
    async fn test_missing_config_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = NativeQr::default()
            .encode(&tmp.path().join("ghost.conf"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_qrencode_failure_surfaces_as_external_tool() {
        let tmp = TempDir::new().unwrap();
        let conf = tmp.path().join("alice.conf");
        std::fs::write(&conf, SAMPLE).unwrap();

        let err = QrencodeCli::new("false").encode(&conf).await.unwrap_err();
        assert!(matches!(err, crate::Error::ExternalTool { .. }));
    }
}
