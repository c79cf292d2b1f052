//! File transcription validation.
//!
//! Every check here runs before any engine or audio resources are allocated,
//! so a bad path fails fast and leaves the session untouched.

use crate::audio::wav::probe_duration_secs;
use crate::config::FileConfig;
use crate::error::{Result, SessionError};
use std::path::{Path, PathBuf};

/// Validates a transcription input file and returns its canonical path and
/// duration in seconds.
///
/// Checks, in order: the file exists, it is a regular local file, it lives
/// under one of the allowed directories (when any are configured), it is a
/// WAV file, and its duration does not exceed the configured maximum.
pub fn validate_input_file(path: &Path, config: &FileConfig) -> Result<(PathBuf, f64)> {
    if !path.exists() {
        return Err(SessionError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let canonical = path.canonicalize()?;
    if !canonical.is_file() {
        return Err(SessionError::NotLocalFile {
            path: path.display().to_string(),
        });
    }

    if !config.allowed_dirs.is_empty() {
        let mut allowed = false;
        for dir in &config.allowed_dirs {
            // unresolvable allowed dirs simply never match
            if let Ok(dir) = dir.canonicalize()
                && canonical.starts_with(&dir)
            {
                allowed = true;
                break;
            }
        }
        if !allowed {
            return Err(SessionError::PathNotAllowed {
                path: canonical.display().to_string(),
            });
        }
    }

    let is_wav = canonical
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    if !is_wav {
        return Err(SessionError::UnsupportedFormat {
            path: canonical.display().to_string(),
        });
    }

    let duration = probe_duration_secs(&canonical)?;
    let max_secs = config.max_duration_secs;
    if duration > max_secs as f64 {
        return Err(SessionError::DurationExceeded {
            actual_secs: duration as u64,
            max_secs,
        });
    }

    Ok((canonical, duration))
}
