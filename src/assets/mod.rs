//! Locale asset provisioning.
//!
//! Before a session can transcribe a locale, its recognition assets must be
//! on disk. The provisioner hides where they come from; the session only
//! observes fractional download progress while it waits.

pub mod catalog;
#[cfg(feature = "asset-download")]
pub mod download;

use crate::error::{Result, SessionError};
use crate::locale::Locale;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

pub use catalog::{AssetInfo, get_asset, is_supported, supported_locales};

/// A point-in-time snapshot of asset installation progress.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    pub locale: Locale,
    /// Completed fraction in `[0.0, 1.0]`.
    pub fraction: f32,
    pub bytes_downloaded: u64,
    pub total_bytes: u64,
}

impl DownloadProgress {
    pub fn new(locale: Locale, bytes_downloaded: u64, total_bytes: u64) -> Self {
        let fraction = if total_bytes == 0 {
            0.0
        } else {
            (bytes_downloaded as f64 / total_bytes as f64).clamp(0.0, 1.0) as f32
        };
        Self {
            locale,
            fraction,
            bytes_downloaded,
            total_bytes,
        }
    }

    /// Progress for an asset that is already on disk.
    pub fn complete(locale: Locale) -> Self {
        Self {
            locale,
            fraction: 1.0,
            bytes_downloaded: 0,
            total_bytes: 0,
        }
    }
}

/// Callback invoked as installation advances.
pub type ProgressFn = dyn Fn(DownloadProgress) + Send + Sync;

/// Makes locale assets available on disk.
#[async_trait]
pub trait AssetProvisioner: Send + Sync {
    /// Whether the locale's assets are already installed.
    fn is_installed(&self, locale: &Locale) -> bool;

    /// Ensures the locale's assets are installed, reporting progress along
    /// the way. Returns without downloading when assets are already present.
    async fn ensure(&self, locale: &Locale, progress: &ProgressFn) -> Result<()>;
}

/// Provisioner for tests with scriptable outcomes.
pub struct MockAssetProvisioner {
    installed: Mutex<HashSet<String>>,
    no_network: bool,
    download_failure: Option<String>,
    progress_steps: u32,
}

impl MockAssetProvisioner {
    pub fn new() -> Self {
        Self {
            installed: Mutex::new(HashSet::new()),
            no_network: false,
            download_failure: None,
            progress_steps: 4,
        }
    }

    /// Marks a locale's assets as already on disk.
    pub fn with_installed(self, locale: &str) -> Self {
        self.installed
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .insert(Locale::new(locale).identifier().to_string());
        self
    }

    /// Simulates running with no network connectivity.
    pub fn with_no_network(mut self) -> Self {
        self.no_network = true;
        self
    }

    /// Makes downloads fail partway through.
    pub fn with_download_failure(mut self, message: &str) -> Self {
        self.download_failure = Some(message.to_string());
        self
    }

    /// Number of progress callbacks emitted per simulated download.
    pub fn with_progress_steps(mut self, steps: u32) -> Self {
        self.progress_steps = steps.max(1);
        self
    }
}

impl Default for MockAssetProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetProvisioner for MockAssetProvisioner {
    fn is_installed(&self, locale: &Locale) -> bool {
        self.installed
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .contains(locale.identifier())
    }

    async fn ensure(&self, locale: &Locale, progress: &ProgressFn) -> Result<()> {
        let asset = get_asset(locale).ok_or_else(|| SessionError::UnsupportedLocale {
            locale: locale.identifier().to_string(),
        })?;

        if self.is_installed(locale) {
            progress(DownloadProgress::complete(locale.clone()));
            return Ok(());
        }

        if self.no_network {
            return Err(SessionError::NoNetwork);
        }

        let total = asset.size_mb as u64 * 1024 * 1024;
        for step in 1..=self.progress_steps {
            if let Some(message) = &self.download_failure
                && step > self.progress_steps / 2
            {
                return Err(SessionError::DownloadFailed {
                    locale: locale.identifier().to_string(),
                    message: message.clone(),
                });
            }
            let done = total * step as u64 / self.progress_steps as u64;
            progress(DownloadProgress::new(locale.clone(), done, total));
            tokio::task::yield_now().await;
        }

        self.installed
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .insert(locale.identifier().to_string());
        Ok(())
    }
}
