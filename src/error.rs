//! Error types for speech-session.
//!
//! Every variant carries the full triad the public contract requires:
//! a human-readable description (`Display`), a failure reason
//! ([`SessionError::reason`]), and a recovery suggestion
//! ([`SessionError::recovery_suggestion`]).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    // Permission errors
    #[error("Microphone permission denied")]
    MicrophonePermissionDenied,

    #[error("Speech recognition permission denied")]
    RecognitionPermissionDenied,

    // Locale / model errors
    #[error("Locale not supported: {locale}")]
    UnsupportedLocale { locale: String },

    #[error("Failed to reserve recognition model for {locale}: {message}")]
    ModelReservationFailed { locale: String, message: String },

    #[error("No network connection available for asset download")]
    NoNetwork,

    #[error("Asset download failed for {locale}: {message}")]
    DownloadFailed { locale: String, message: String },

    // Audio pipeline errors
    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio buffer conversion failed: {message}")]
    BufferConversion { message: String },

    #[error("Recognition engine setup failed: {message}")]
    EngineSetup { message: String },

    #[error("Recognition engine failed: {message}")]
    Engine { message: String },

    // Lifecycle errors
    #[error("Session is already active")]
    AlreadyActive,

    #[error("Session is not paused")]
    NotPaused,

    #[error("Failed to resume transcription: {message}")]
    ResumeFailed { message: String },

    // File transcription validation errors
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Not a local file: {path}")]
    NotLocalFile { path: String },

    #[error("File is outside the allowed directories: {path}")]
    PathNotAllowed { path: String },

    #[error("Unsupported audio format: {path}")]
    UnsupportedFormat { path: String },

    #[error("Audio duration {actual_secs}s exceeds the maximum of {max_secs}s")]
    DurationExceeded { actual_secs: u64, max_secs: u64 },

    // Custom vocabulary errors
    #[error("Custom vocabulary can only be installed while the session is idle")]
    VocabularyWhileActive,

    #[error("Custom vocabulary rejected: {message}")]
    VocabularyInvalid { message: String },

    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Short machine-friendly failure reason for the error kind.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MicrophonePermissionDenied => "microphone_permission_denied",
            Self::RecognitionPermissionDenied => "recognition_permission_denied",
            Self::UnsupportedLocale { .. } => "unsupported_locale",
            Self::ModelReservationFailed { .. } => "model_reservation_failed",
            Self::NoNetwork => "no_network",
            Self::DownloadFailed { .. } => "download_failed",
            Self::AudioCapture { .. } => "audio_capture_failed",
            Self::AudioDeviceNotFound { .. } => "audio_device_not_found",
            Self::BufferConversion { .. } => "buffer_conversion_failed",
            Self::EngineSetup { .. } => "engine_setup_failed",
            Self::Engine { .. } => "engine_failed",
            Self::AlreadyActive => "session_already_active",
            Self::NotPaused => "session_not_paused",
            Self::ResumeFailed { .. } => "resume_failed",
            Self::FileNotFound { .. } => "file_not_found",
            Self::NotLocalFile { .. } => "not_local_file",
            Self::PathNotAllowed { .. } => "path_not_allowed",
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::DurationExceeded { .. } => "duration_exceeded",
            Self::VocabularyWhileActive => "vocabulary_while_active",
            Self::VocabularyInvalid { .. } => "vocabulary_invalid",
            Self::ConfigParse { .. } | Self::Config(_) => "config_parse_failed",
            Self::ConfigInvalidValue { .. } => "config_invalid_value",
            Self::Io(_) => "io_error",
        }
    }

    /// What the caller can do about it.
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::MicrophonePermissionDenied => {
                "Grant microphone access in your system settings and start again"
            }
            Self::RecognitionPermissionDenied => {
                "Grant speech recognition access in your system settings and start again"
            }
            Self::UnsupportedLocale { .. } => {
                "Pick one of the supported locales (see the asset catalog)"
            }
            Self::ModelReservationFailed { .. } => {
                "Free up disk space or remove unused locale assets, then retry"
            }
            Self::NoNetwork => "Restore network connectivity and start again",
            Self::DownloadFailed { .. } => "Check your connection and retry the download",
            Self::AudioCapture { .. } | Self::AudioDeviceNotFound { .. } => {
                "Check that a working microphone is connected and selected"
            }
            Self::BufferConversion { .. } => {
                "Verify the audio source produces 16kHz mono PCM frames"
            }
            Self::EngineSetup { .. } | Self::Engine { .. } => {
                "Stop the session and start again; if the failure persists, reinstall the locale assets"
            }
            Self::AlreadyActive => "Stop the current transcription before starting a new one",
            Self::NotPaused => "Call resume only after a successful pause",
            Self::ResumeFailed { .. } => "Start a new transcription; the previous pipeline is gone",
            Self::FileNotFound { .. } => "Check the file path",
            Self::NotLocalFile { .. } => "Provide a path to a local file",
            Self::PathNotAllowed { .. } => {
                "Move the file into one of the configured allowed directories"
            }
            Self::UnsupportedFormat { .. } => "Convert the file to 16-bit PCM WAV",
            Self::DurationExceeded { .. } => {
                "Split the recording or raise max_file_duration in the configuration"
            }
            Self::VocabularyWhileActive => "Stop the session, then install the vocabulary",
            Self::VocabularyInvalid { .. } => "Fix the vocabulary descriptor and retry",
            Self::ConfigParse { .. } | Self::Config(_) | Self::ConfigInvalidValue { .. } => {
                "Fix the configuration file and restart"
            }
            Self::Io(_) => "Check file permissions and available disk space",
        }
    }

    /// True when the error signals a failed `start()` that left the session idle.
    pub fn is_start_failure(&self) -> bool {
        matches!(
            self,
            Self::MicrophonePermissionDenied
                | Self::RecognitionPermissionDenied
                | Self::UnsupportedLocale { .. }
                | Self::ModelReservationFailed { .. }
                | Self::NoNetwork
                | Self::DownloadFailed { .. }
                | Self::EngineSetup { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, SessionError>;
