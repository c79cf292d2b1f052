//! Session and application configuration.
//!
//! [`SessionConfig`] is the per-activation configuration handed to
//! `SpeechSession::start`. [`Config`] is the TOML-backed application
//! configuration used by the demo binary, with environment overrides.

use crate::defaults;
use crate::error::{Result, SessionError};
use crate::locale::Locale;
use crate::vocabulary::CustomVocabulary;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How the engine should report results for an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionPreset {
    /// Final results only, no volatile hypotheses.
    Transcription,
    /// Volatile hypotheses streamed ahead of each final result.
    #[default]
    ProgressiveTranscription,
    /// Like progressive, but every run carries an audio time range.
    TimeIndexedTranscription,
}

impl TranscriptionPreset {
    /// Whether the engine should emit volatile (non-final) results.
    pub fn reports_volatile_results(&self) -> bool {
        matches!(
            self,
            Self::ProgressiveTranscription | Self::TimeIndexedTranscription
        )
    }

    /// Whether results must carry audio time ranges.
    pub fn includes_time_ranges(&self) -> bool {
        matches!(self, Self::TimeIndexedTranscription)
    }
}

/// Voice-activity gate sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VadSensitivity {
    /// Only loud, clear speech opens the gate.
    Low,
    #[default]
    Medium,
    /// Quiet speech opens the gate; more background noise gets through.
    High,
}

impl VadSensitivity {
    /// RMS speech threshold for this sensitivity.
    pub fn threshold(&self) -> f32 {
        match self {
            Self::Low => defaults::VAD_THRESHOLD_LOW,
            Self::Medium => defaults::VAD_THRESHOLD_MEDIUM,
            Self::High => defaults::VAD_THRESHOLD_HIGH,
        }
    }
}

/// Voice-activity gating settings for an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VoiceActivitySettings {
    /// Whether the gate is wired into the pipeline at all.
    pub enabled: bool,
    /// Gate sensitivity; ignored while disabled.
    pub sensitivity: VadSensitivity,
}

/// Per-activation configuration for `SpeechSession::start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Locale whose recognition model is used.
    pub locale: Locale,
    /// Result reporting preset.
    pub preset: TranscriptionPreset,
    /// Optional custom vocabulary compiled into the engine.
    pub vocabulary: Option<CustomVocabulary>,
    /// Free-form contextual terms passed to the engine.
    pub contextual_terms: Vec<String>,
    /// Voice-activity gating settings.
    pub voice_activity: VoiceActivitySettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            locale: Locale::new(defaults::DEFAULT_LOCALE),
            preset: TranscriptionPreset::default(),
            vocabulary: None,
            contextual_terms: Vec::new(),
            voice_activity: VoiceActivitySettings::default(),
        }
    }
}

impl SessionConfig {
    /// Creates a configuration for a locale with defaults everywhere else.
    pub fn for_locale(locale: impl Into<Locale>) -> Self {
        Self {
            locale: locale.into(),
            ..Default::default()
        }
    }

    /// Sets the transcription preset.
    pub fn with_preset(mut self, preset: TranscriptionPreset) -> Self {
        self.preset = preset;
        self
    }

    /// Enables voice-activity gating with the given sensitivity.
    pub fn with_voice_activity(mut self, sensitivity: VadSensitivity) -> Self {
        self.voice_activity = VoiceActivitySettings {
            enabled: true,
            sensitivity,
        };
        self
    }

    /// Adds a contextual term.
    pub fn with_contextual_term(mut self, term: &str) -> Self {
        self.contextual_terms.push(term.to_string());
        self
    }

    /// Sets the custom vocabulary, validating it first.
    pub fn with_vocabulary(mut self, vocabulary: CustomVocabulary) -> Result<Self> {
        vocabulary.validate()?;
        self.vocabulary = Some(vocabulary);
        Ok(self)
    }
}

/// Validation limits for the file-transcription entry point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    /// Directories a transcription file must live under.
    ///
    /// Empty means any local path is accepted.
    pub allowed_dirs: Vec<PathBuf>,
    /// Maximum accepted audio duration in seconds.
    pub max_duration_secs: u64,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            allowed_dirs: Vec::new(),
            max_duration_secs: defaults::MAX_FILE_DURATION_SECS,
        }
    }
}

impl FileConfig {
    /// Maximum accepted duration as a `Duration`.
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }
}

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture device name; `None` picks the system default.
    pub device: Option<String>,
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

/// Root application configuration (TOML).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub audio: AudioConfig,
    pub file: FileConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Missing fields use default values; invalid TOML is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults if it is missing.
    ///
    /// Invalid TOML is still an error; only a missing file yields defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: Config = toml::from_str(&contents)?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supported variables:
    /// - `SPEECH_SESSION_LOCALE` → session.locale
    /// - `SPEECH_SESSION_AUDIO_DEVICE` → audio.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(locale) = std::env::var("SPEECH_SESSION_LOCALE")
            && !locale.is_empty()
        {
            self.session.locale = Locale::new(&locale);
        }

        if let Ok(device) = std::env::var("SPEECH_SESSION_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        self
    }

    fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(SessionError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.file.max_duration_secs == 0 {
            return Err(SessionError::ConfigInvalidValue {
                key: "file.max_duration_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
