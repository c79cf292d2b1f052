//! Default configuration constants for speech-session.
//!
//! Shared constants used across configuration types to keep the library,
//! the demo binary, and the tests in agreement.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default locale identifier (BCP-47).
pub const DEFAULT_LOCALE: &str = "en-US";

/// Default voice-activity speech threshold for medium sensitivity.
///
/// This RMS-based threshold (0.0 to 1.0) determines when a frame is
/// considered speech. 0.02 is tuned for typical microphone input levels.
pub const VAD_THRESHOLD_MEDIUM: f32 = 0.02;

/// Speech threshold for low sensitivity (requires louder speech).
pub const VAD_THRESHOLD_LOW: f32 = 0.05;

/// Speech threshold for high sensitivity (picks up quiet speech).
pub const VAD_THRESHOLD_HIGH: f32 = 0.008;

/// Duration of silence before speech presence is considered ended (ms).
pub const VAD_SILENCE_DURATION_MS: u32 = 800;

/// Interval at which the audio pump polls the audio source (ms).
///
/// ~60Hz keeps capture latency low without burning CPU on an idle source.
pub const AUDIO_POLL_INTERVAL_MS: u64 = 16;

/// Bounded capacity of the caller-facing result channel.
///
/// Backpressure, not unbounded buffering: a slow consumer stalls the relay
/// once this many results are in flight.
pub const RESULT_BUFFER: usize = 64;

/// Capacity of broadcast side streams (status, audio input, voice activity).
pub const BROADCAST_BUFFER: usize = 256;

/// Capacity of the frame channel between the audio pump and the engine.
pub const FRAME_BUFFER: usize = 128;

/// Maximum duration accepted by the file-transcription entry point.
pub const MAX_FILE_DURATION_SECS: u64 = 2 * 60 * 60;

/// How long `stop()` waits for pipeline tasks before detaching them.
pub const TEARDOWN_TIMEOUT_MS: u64 = 5000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitivity_thresholds_are_ordered() {
        // Higher sensitivity means a lower threshold.
        assert!(VAD_THRESHOLD_HIGH < VAD_THRESHOLD_MEDIUM);
        assert!(VAD_THRESHOLD_MEDIUM < VAD_THRESHOLD_LOW);
    }

    #[test]
    fn buffers_are_nonzero() {
        assert!(RESULT_BUFFER > 0);
        assert!(BROADCAST_BUFFER > 0);
        assert!(FRAME_BUFFER > 0);
    }
}
