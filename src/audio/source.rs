//! Audio source trait and frame types.

use crate::error::{Result, SessionError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// A frame of normalized audio samples with timing information.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// PCM samples (16-bit signed integers, 16kHz mono).
    pub samples: Vec<i16>,
    /// Timestamp when this frame was captured.
    pub timestamp: Instant,
    /// Sequence number for ordering and gap detection.
    pub sequence: u64,
}

impl AudioFrame {
    /// Creates a new audio frame.
    pub fn new(samples: Vec<i16>, timestamp: Instant, sequence: u64) -> Self {
        Self {
            samples,
            timestamp,
            sequence,
        }
    }

    /// Frame duration in milliseconds at the given sample rate.
    pub fn duration_ms(&self, sample_rate: u32) -> u32 {
        if sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000 / sample_rate as u64) as u32
    }
}

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (live microphone, WAV file,
/// or mock). Sources are polled by the pipeline's audio pump.
pub trait AudioSource: Send + Sync {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    fn stop(&mut self) -> Result<()>;

    /// Read whatever samples have accumulated since the last call.
    ///
    /// An empty vector from a finite source means it is exhausted; from a
    /// live source it means no data has arrived yet.
    fn read_samples(&mut self) -> Result<Vec<i16>>;

    /// True for sources that eventually run out (files, pipes).
    fn is_finite(&self) -> bool {
        false
    }
}

/// Opens a fresh audio source for each activation cycle.
///
/// The session owns one factory and calls it once per `start()`, so a
/// stopped pipeline never leaks capture state into the next one.
pub trait AudioSourceFactory: Send + Sync {
    /// Open a source, ready for `start()`.
    fn open(&self) -> Result<Box<dyn AudioSource>>;
}

impl<F> AudioSourceFactory for F
where
    F: Fn() -> Result<Box<dyn AudioSource>> + Send + Sync,
{
    fn open(&self) -> Result<Box<dyn AudioSource>> {
        self()
    }
}

/// A phase of scripted frames for [`MockAudioSource`].
#[derive(Debug, Clone)]
pub struct FramePhase {
    /// Samples returned for each read in this phase.
    pub samples: Vec<i16>,
    /// Number of reads this phase lasts.
    pub count: u32,
}

/// Mock audio source for testing.
///
/// Plays back a scripted sequence of frame phases, then returns empty reads.
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    phases: Vec<FramePhase>,
    reads: Arc<AtomicU32>,
    started: Arc<Mutex<bool>>,
    stopped: Arc<Mutex<bool>>,
    live: bool,
    fail_start: bool,
    fail_read: bool,
    error_message: String,
}

impl MockAudioSource {
    /// Creates a mock with no scripted frames; every read returns empty.
    pub fn new() -> Self {
        Self {
            phases: Vec::new(),
            reads: Arc::new(AtomicU32::new(0)),
            started: Arc::new(Mutex::new(false)),
            stopped: Arc::new(Mutex::new(false)),
            live: false,
            fail_start: false,
            fail_read: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Scripts the frames returned by successive reads.
    pub fn with_frame_sequence(mut self, phases: Vec<FramePhase>) -> Self {
        self.phases = phases;
        self
    }

    /// Marks the source as live (empty reads never mean exhaustion).
    pub fn as_live_source(mut self) -> Self {
        self.live = true;
        self
    }

    /// Configure the mock to fail on start.
    pub fn with_start_failure(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Configure the mock to fail on every read.
    pub fn with_read_failure(mut self) -> Self {
        self.fail_read = true;
        self
    }

    /// Configure the error message for failures.
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// True once `stop()` has been called.
    pub fn was_stopped(&self) -> bool {
        *lock_ignore_poison(&self.stopped)
    }

    /// Shared flag observers can hold across the pipeline boundary.
    pub fn stopped_flag(&self) -> Arc<Mutex<bool>> {
        self.stopped.clone()
    }
}

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.fail_start {
            return Err(SessionError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        *lock_ignore_poison(&self.started) = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        *lock_ignore_poison(&self.stopped) = true;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.fail_read {
            return Err(SessionError::AudioCapture {
                message: self.error_message.clone(),
            });
        }

        let mut read = self.reads.fetch_add(1, Ordering::Relaxed);
        for phase in &self.phases {
            if read < phase.count {
                return Ok(phase.samples.clone());
            }
            read -= phase.count;
        }
        Ok(Vec::new())
    }

    fn is_finite(&self) -> bool {
        !self.live
    }
}
