//! Session lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a speech session.
///
/// Legal transitions:
/// `Idle -> Preparing -> Transcribing <-> Paused`, any active state
/// `-> Stopping -> Idle`. A failed start falls back from `Preparing` to
/// `Idle` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// No pipeline exists.
    Idle,
    /// Permissions, assets, and engine resources are being acquired.
    Preparing,
    /// Audio is flowing and results are being produced.
    Transcribing,
    /// Pipeline exists but audio is not forwarded to the engine.
    Paused,
    /// Teardown in progress; final results may still arrive.
    Stopping,
}

impl Status {
    /// Whether a pipeline exists in this state.
    pub fn is_active(&self) -> bool {
        matches!(self, Status::Preparing | Status::Transcribing | Status::Paused | Status::Stopping)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Idle => "idle",
            Status::Preparing => "preparing",
            Status::Transcribing => "transcribing",
            Status::Paused => "paused",
            Status::Stopping => "stopping",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_idle_is_inactive() {
        assert!(!Status::Idle.is_active());
        assert!(Status::Preparing.is_active());
        assert!(Status::Transcribing.is_active());
        assert!(Status::Paused.is_active());
        assert!(Status::Stopping.is_active());
    }

    #[test]
    fn test_display_matches_serde_names() {
        let json = serde_json::to_string(&Status::Transcribing).unwrap();
        assert_eq!(json, "\"transcribing\"");
        assert_eq!(Status::Transcribing.to_string(), "transcribing");
    }
}
