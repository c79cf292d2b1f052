//! Recognition engine abstraction.
//!
//! The engine itself is a black box: it accepts PCM frames and emits
//! transcription results. This module defines the channel-based contract the
//! session pipeline drives, plus a scriptable mock used throughout the tests.

use crate::audio::AudioFrame;
use crate::config::{SessionConfig, TranscriptionPreset};
use crate::defaults;
use crate::error::{Result, SessionError};
use crate::locale::Locale;
use crate::vocabulary::CustomVocabulary;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Half-open time range of a recognized run, in seconds from session start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start_secs: f64,
    pub end_secs: f64,
}

/// A contiguous run of recognized text, optionally time-indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub time_range: Option<TimeRange>,
}

/// One transcription hypothesis from the engine.
///
/// Volatile results (`is_final == false`) replace the previous volatile text;
/// final results append to the transcript and clear the volatile portion.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionResult {
    pub text: String,
    pub is_final: bool,
    pub runs: Vec<TextRun>,
    pub alternatives: Vec<String>,
}

impl TranscriptionResult {
    /// A volatile (replaceable) hypothesis.
    pub fn volatile(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_final: false,
            runs: Vec::new(),
            alternatives: Vec::new(),
        }
    }

    /// A finalized result.
    pub fn finalized(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_final: true,
            runs: Vec::new(),
            alternatives: Vec::new(),
        }
    }

    pub fn with_alternative(mut self, text: &str) -> Self {
        self.alternatives.push(text.to_string());
        self
    }

    pub fn with_run(mut self, text: &str, range: Option<TimeRange>) -> Self {
        self.runs.push(TextRun {
            text: text.to_string(),
            time_range: range,
        });
        self
    }
}

/// Options handed to the engine when a recognition stream starts.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub locale: Locale,
    /// Whether the engine should emit volatile hypotheses before finals.
    pub reports_volatile_results: bool,
    /// Whether finals should carry time-indexed runs.
    pub includes_time_ranges: bool,
    pub vocabulary: Option<CustomVocabulary>,
    pub contextual_terms: Vec<String>,
}

impl From<&SessionConfig> for EngineOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            locale: config.locale.clone(),
            reports_volatile_results: config.preset.reports_volatile_results(),
            includes_time_ranges: config.preset.includes_time_ranges(),
            vocabulary: config.vocabulary.clone(),
            contextual_terms: config.contextual_terms.clone(),
        }
    }
}

impl EngineOptions {
    /// Options for a bare locale with the default preset.
    pub fn for_locale(locale: Locale) -> Self {
        Self {
            locale,
            reports_volatile_results: TranscriptionPreset::default().reports_volatile_results(),
            includes_time_ranges: TranscriptionPreset::default().includes_time_ranges(),
            vocabulary: None,
            contextual_terms: Vec::new(),
        }
    }
}

/// A live recognition stream.
///
/// Dropping `frames` tells the engine no more audio is coming; it then
/// flushes any pending finals and closes `events`. That ordering is what
/// makes session teardown deterministic.
pub struct EngineSession {
    pub frames: mpsc::Sender<AudioFrame>,
    pub events: mpsc::Receiver<Result<TranscriptionResult>>,
}

/// On-device recognition engine.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Allocates engine resources and opens a recognition stream.
    async fn start(&self, options: EngineOptions) -> Result<EngineSession>;
}

#[derive(Debug, Clone)]
enum MockEvent {
    Result(TranscriptionResult),
    Error(String),
}

impl MockEvent {
    fn into_result(self) -> Result<TranscriptionResult> {
        match self {
            MockEvent::Result(result) => Ok(result),
            MockEvent::Error(message) => Err(SessionError::Engine { message }),
        }
    }
}

/// Scriptable engine for tests.
///
/// Each scripted event is released after one audio frame arrives; flush
/// results are emitted once the frame channel closes. The same script plays
/// for every `start` call, so pipeline rebuilds can be exercised.
#[derive(Clone)]
pub struct MockRecognitionEngine {
    script: Vec<MockEvent>,
    flush: Vec<TranscriptionResult>,
    start_failure: Option<String>,
    frames_seen: Arc<AtomicU64>,
    starts: Arc<Mutex<Vec<EngineOptions>>>,
}

impl MockRecognitionEngine {
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            flush: Vec::new(),
            start_failure: None,
            frames_seen: Arc::new(AtomicU64::new(0)),
            starts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Emits this result after the next unconsumed frame.
    pub fn with_result(mut self, result: TranscriptionResult) -> Self {
        self.script.push(MockEvent::Result(result));
        self
    }

    /// Emits an engine error after the next unconsumed frame.
    pub fn with_error(mut self, message: &str) -> Self {
        self.script.push(MockEvent::Error(message.to_string()));
        self
    }

    /// Emits this final when the frame channel closes.
    pub fn with_flush_result(mut self, result: TranscriptionResult) -> Self {
        self.flush.push(result);
        self
    }

    /// Makes `start` fail with an engine setup error.
    pub fn with_start_failure(mut self, message: &str) -> Self {
        self.start_failure = Some(message.to_string());
        self
    }

    /// Total frames consumed across all streams.
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen.load(Ordering::SeqCst)
    }

    /// Options from every `start` call, in order.
    pub fn start_options(&self) -> Vec<EngineOptions> {
        self.starts
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

impl Default for MockRecognitionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecognitionEngine for MockRecognitionEngine {
    async fn start(&self, options: EngineOptions) -> Result<EngineSession> {
        if let Some(message) = &self.start_failure {
            return Err(SessionError::EngineSetup {
                message: message.clone(),
            });
        }

        self.starts
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(options);

        let (frames_tx, mut frames_rx) = mpsc::channel::<AudioFrame>(defaults::FRAME_BUFFER);
        let (events_tx, events_rx) = mpsc::channel(defaults::RESULT_BUFFER);

        let mut script = self.script.clone().into_iter();
        let flush = self.flush.clone();
        let frames_seen = Arc::clone(&self.frames_seen);

        tokio::spawn(async move {
            while let Some(_frame) = frames_rx.recv().await {
                frames_seen.fetch_add(1, Ordering::SeqCst);
                if let Some(event) = script.next()
                    && events_tx.send(event.into_result()).await.is_err()
                {
                    return;
                }
            }
            for result in flush {
                if events_tx.send(Ok(result)).await.is_err() {
                    return;
                }
            }
        });

        Ok(EngineSession {
            frames: frames_tx,
            events: events_rx,
        })
    }
}
