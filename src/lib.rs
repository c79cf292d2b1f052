//! speech-session - Async lifecycle coordinator for on-device speech
//! recognition.
//!
//! Wraps a black-box recognition engine in a deterministic state machine
//! with streaming results, voice-activity gating, locale asset
//! provisioning, and file transcription.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod assets;
pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod locale;
pub mod session;
pub mod vad;
pub mod vocabulary;

// Core traits (capture → gate → recognize → stream)
pub use audio::{AudioFrame, AudioSource, AudioSourceFactory, RouteMonitor};
pub use engine::{EngineOptions, EngineSession, RecognitionEngine, TranscriptionResult};

// Session surface
pub use session::{
    ResultStream, SessionBuilder, SessionEvent, SpeechSession, Status, TranscriptSnapshot,
};

// Provisioning
pub use assets::{AssetProvisioner, DownloadProgress};

// Error handling
pub use error::{Result, SessionError};

// Config
pub use config::{Config, SessionConfig, TranscriptionPreset, VadSensitivity};
pub use locale::Locale;
pub use vocabulary::CustomVocabulary;

/// Build version string with optional git commit hash.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }
}
