//! Static catalog of per-locale recognition assets.

use crate::locale::Locale;

/// Metadata for one locale's recognition asset bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetInfo {
    /// Normalized locale identifier (e.g., "en-US").
    pub locale: &'static str,
    /// Bundle size in megabytes.
    pub size_mb: u32,
    /// SHA-256 checksum for integrity verification.
    pub sha256: &'static str,
    /// Download URL.
    pub url: &'static str,
}

/// Locales the engine ships assets for.
pub const ASSETS: &[AssetInfo] = &[
    AssetInfo {
        locale: "en-US",
        size_mb: 142,
        sha256: "sha256_en_us_placeholder",
        url: "https://assets.example.com/speech/en-US.bundle",
    },
    AssetInfo {
        locale: "en-GB",
        size_mb: 142,
        sha256: "sha256_en_gb_placeholder",
        url: "https://assets.example.com/speech/en-GB.bundle",
    },
    AssetInfo {
        locale: "de-DE",
        size_mb: 156,
        sha256: "sha256_de_de_placeholder",
        url: "https://assets.example.com/speech/de-DE.bundle",
    },
    AssetInfo {
        locale: "fr-FR",
        size_mb: 151,
        sha256: "sha256_fr_fr_placeholder",
        url: "https://assets.example.com/speech/fr-FR.bundle",
    },
    AssetInfo {
        locale: "es-ES",
        size_mb: 149,
        sha256: "sha256_es_es_placeholder",
        url: "https://assets.example.com/speech/es-ES.bundle",
    },
    AssetInfo {
        locale: "it-IT",
        size_mb: 147,
        sha256: "sha256_it_it_placeholder",
        url: "https://assets.example.com/speech/it-IT.bundle",
    },
    AssetInfo {
        locale: "pt-BR",
        size_mb: 148,
        sha256: "sha256_pt_br_placeholder",
        url: "https://assets.example.com/speech/pt-BR.bundle",
    },
    AssetInfo {
        locale: "ja-JP",
        size_mb: 173,
        sha256: "sha256_ja_jp_placeholder",
        url: "https://assets.example.com/speech/ja-JP.bundle",
    },
    AssetInfo {
        locale: "zh-CN",
        size_mb: 181,
        sha256: "sha256_zh_cn_placeholder",
        url: "https://assets.example.com/speech/zh-CN.bundle",
    },
    AssetInfo {
        locale: "ko-KR",
        size_mb: 168,
        sha256: "sha256_ko_kr_placeholder",
        url: "https://assets.example.com/speech/ko-KR.bundle",
    },
];

/// Looks up the asset bundle for a locale.
pub fn get_asset(locale: &Locale) -> Option<&'static AssetInfo> {
    ASSETS.iter().find(|a| a.locale == locale.identifier())
}

/// Whether the locale has a catalog entry at all.
pub fn is_supported(locale: &Locale) -> bool {
    get_asset(locale).is_some()
}

/// All supported locales.
pub fn supported_locales() -> Vec<Locale> {
    ASSETS.iter().map(|a| Locale::new(a.locale)).collect()
}
