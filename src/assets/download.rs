//! HTTP asset provisioner.
//!
//! Streams locale bundles into the user's cache directory, verifying the
//! catalog checksum before the file is considered installed.

use crate::assets::{AssetProvisioner, DownloadProgress, ProgressFn, catalog};
use crate::error::{Result, SessionError};
use crate::locale::Locale;
use async_trait::async_trait;
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Directory where locale bundles are stored.
///
/// Uses `~/.cache/speech-session/assets/` on Linux.
pub fn assets_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("speech-session")
        .join("assets")
}

/// On-disk path for a locale's bundle, whether or not it exists yet.
pub fn asset_path(locale: &Locale) -> PathBuf {
    assets_dir().join(format!("{}.bundle", locale.identifier()))
}

/// Provisioner that downloads bundles over HTTPS.
pub struct HttpAssetProvisioner {
    client: reqwest::Client,
    assets_dir: PathBuf,
}

impl HttpAssetProvisioner {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            assets_dir: assets_dir(),
        }
    }

    /// Stores bundles under a custom directory instead of the user cache.
    pub fn with_assets_dir(mut self, dir: PathBuf) -> Self {
        self.assets_dir = dir;
        self
    }

    fn path_for(&self, locale: &Locale) -> PathBuf {
        self.assets_dir
            .join(format!("{}.bundle", locale.identifier()))
    }

    async fn download(
        &self,
        locale: &Locale,
        asset: &catalog::AssetInfo,
        progress: &ProgressFn,
    ) -> Result<()> {
        let output_path = self.path_for(locale);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(locale = %locale, size_mb = asset.size_mb, "downloading locale assets");

        let response = self.client.get(asset.url).send().await.map_err(|e| {
            if e.is_connect() {
                SessionError::NoNetwork
            } else {
                SessionError::DownloadFailed {
                    locale: locale.identifier().to_string(),
                    message: format!("failed to start download: {e}"),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(SessionError::DownloadFailed {
                locale: locale.identifier().to_string(),
                message: format!("server returned {}", response.status()),
            });
        }

        let total_bytes = response.content_length().unwrap_or(0);
        let mut downloaded: u64 = 0;
        let mut hasher = Sha256::new();
        let mut stream = response.bytes_stream();
        let mut file = fs::File::create(&output_path)?;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SessionError::DownloadFailed {
                locale: locale.identifier().to_string(),
                message: format!("failed to read download chunk: {e}"),
            })?;

            file.write_all(&chunk)?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
            progress(DownloadProgress::new(
                locale.clone(),
                downloaded,
                total_bytes,
            ));
        }

        if !asset.sha256.is_empty() {
            let calculated = format!("{:x}", hasher.finalize());
            if calculated != asset.sha256 {
                if let Err(e) = fs::remove_file(&output_path) {
                    tracing::warn!(error = %e, "failed to remove corrupted download");
                }
                return Err(SessionError::DownloadFailed {
                    locale: locale.identifier().to_string(),
                    message: format!(
                        "checksum mismatch: expected {}, got {calculated}",
                        asset.sha256
                    ),
                });
            }
        }

        tracing::info!(locale = %locale, path = %output_path.display(), "assets installed");
        Ok(())
    }
}

impl Default for HttpAssetProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetProvisioner for HttpAssetProvisioner {
    fn is_installed(&self, locale: &Locale) -> bool {
        self.path_for(locale).exists()
    }

    async fn ensure(&self, locale: &Locale, progress: &ProgressFn) -> Result<()> {
        let asset = catalog::get_asset(locale).ok_or_else(|| SessionError::UnsupportedLocale {
            locale: locale.identifier().to_string(),
        })?;

        if self.is_installed(locale) {
            progress(DownloadProgress::complete(locale.clone()));
            return Ok(());
        }

        self.download(locale, asset, progress).await
    }
}
