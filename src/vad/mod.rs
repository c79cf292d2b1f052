//! Voice activity gating.
//!
//! RMS-based speech detection with a hangover window, used to decide which
//! audio frames are forwarded to the recognition engine when voice activity
//! detection is enabled. The gate never pauses the session; it only withholds
//! frames and drives the speech-detected observable.

use crate::config::VoiceActivitySettings;
use crate::defaults;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Time source, so gating can be tested with a manual clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Real clock backed by `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<Instant>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        *current += duration;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self
            .current
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

/// Gate tuning derived from session voice-activity settings.
#[derive(Debug, Clone, Copy)]
pub struct GateConfig {
    /// RMS level above which a frame counts as speech (0.0 to 1.0).
    pub speech_threshold: f32,
    /// Silence needed after speech before the gate closes (milliseconds).
    pub hangover_ms: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            speech_threshold: defaults::VAD_THRESHOLD_MEDIUM,
            hangover_ms: defaults::VAD_SILENCE_DURATION_MS,
        }
    }
}

impl From<&VoiceActivitySettings> for GateConfig {
    fn from(settings: &VoiceActivitySettings) -> Self {
        Self {
            speech_threshold: settings.sensitivity.threshold(),
            hangover_ms: defaults::VAD_SILENCE_DURATION_MS,
        }
    }
}

/// Gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Waiting for speech; frames are withheld.
    Closed,
    /// Speech in progress; frames flow to the engine.
    Open,
    /// Silence after speech; frames still flow until the hangover elapses.
    Hangover,
}

/// Per-frame gating decision.
#[derive(Debug, Clone, Copy)]
pub struct GateDecision {
    /// Whether the frame should reach the engine.
    pub forward: bool,
    /// Whether speech is currently considered active.
    pub speech_detected: bool,
    /// RMS level of the frame (0.0 to 1.0).
    pub level: f32,
}

/// Energy-based voice activity gate.
///
/// Unlike a push-to-talk detector, the gate is cyclic: after speech ends it
/// returns to `Closed` and re-opens on the next utterance, so a single
/// session can span many utterances.
pub struct EnergyGate<C: Clock = SystemClock> {
    config: GateConfig,
    state: GateState,
    silence_start: Option<Instant>,
    clock: C,
}

impl<C: Clock> EnergyGate<C> {
    pub fn with_clock(config: GateConfig, clock: C) -> Self {
        Self {
            config,
            state: GateState::Closed,
            silence_start: None,
            clock,
        }
    }

    /// Classifies one frame of 16-bit PCM and updates the gate.
    pub fn process(&mut self, samples: &[i16]) -> GateDecision {
        let rms = calculate_rms(samples);
        let is_speech = rms > self.config.speech_threshold;
        let now = self.clock.now();

        let (forward, speech_detected) = match self.state {
            GateState::Closed => {
                if is_speech {
                    self.state = GateState::Open;
                    self.silence_start = None;
                    (true, true)
                } else {
                    (false, false)
                }
            }
            GateState::Open => {
                if is_speech {
                    (true, true)
                } else {
                    self.state = GateState::Hangover;
                    self.silence_start = Some(now);
                    (true, true)
                }
            }
            GateState::Hangover => {
                if is_speech {
                    self.state = GateState::Open;
                    self.silence_start = None;
                    (true, true)
                } else {
                    let elapsed = self
                        .silence_start
                        .map(|start| now.duration_since(start).as_millis() as u32)
                        .unwrap_or(0);

                    if elapsed >= self.config.hangover_ms {
                        self.state = GateState::Closed;
                        self.silence_start = None;
                        (false, false)
                    } else {
                        (true, true)
                    }
                }
            }
        };

        GateDecision {
            forward,
            speech_detected,
            level: rms,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Returns the gate to its initial closed state.
    pub fn reset(&mut self) {
        self.state = GateState::Closed;
        self.silence_start = None;
    }

    /// Updates the speech threshold without resetting state.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.config.speech_threshold = threshold;
    }
}

impl EnergyGate<SystemClock> {
    pub fn new(config: GateConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

/// Normalized RMS of 16-bit PCM samples.
///
/// 0.0 is silence; a full-scale sine wave lands near 0.707; 1.0 is maximum
/// amplitude.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}
