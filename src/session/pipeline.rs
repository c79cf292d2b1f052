//! The streaming transcription pipeline.
//!
//! Two tasks per activation: the pump polls the audio source and feeds
//! frames to the engine, and the relay forwards engine events to the
//! caller's result stream while folding them into the transcript.
//!
//! Teardown is channel-driven. Stopping the pump drops the engine's frame
//! sender; the engine flushes pending finals and closes its event channel;
//! the relay drains those finals to the caller and exits. The caller
//! dropping the result stream triggers the same sequence from the other end.

use crate::audio::{AudioFrame, AudioSource};
use crate::defaults;
use crate::engine::{EngineSession, TranscriptionResult};
use crate::error::Result;
use crate::session::transcript::TranscriptAccumulator;
use crate::vad::{Clock, EnergyGate, SystemClock};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;

/// Everything a pipeline activation needs. The source must already be
/// started.
pub struct PipelineParts<C: Clock = SystemClock> {
    pub source: Box<dyn AudioSource>,
    pub engine_session: EngineSession,
    pub result_tx: mpsc::Sender<Result<TranscriptionResult>>,
    pub transcript: Arc<StdMutex<TranscriptAccumulator>>,
    pub speech_tx: watch::Sender<bool>,
    /// Voice activity gate; `None` forwards every frame.
    pub gate: Option<EnergyGate<C>>,
}

/// Handle to a running pipeline activation.
pub struct PipelineHandle {
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    finished_rx: watch::Receiver<bool>,
    pump: JoinHandle<()>,
    relay: JoinHandle<()>,
}

impl PipelineHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Stops forwarding audio without tearing anything down.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Receiver that flips to `true` once the relay has drained all engine
    /// events, i.e. the activation is fully finished.
    pub fn finished(&self) -> watch::Receiver<bool> {
        self.finished_rx.clone()
    }

    /// Tears the activation down and waits for both tasks.
    ///
    /// Final results flushed by the engine are still delivered to the
    /// caller's stream before this returns.
    pub async fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();

        let deadline = Duration::from_millis(defaults::TEARDOWN_TIMEOUT_MS);
        if tokio::time::timeout(deadline, self.pump).await.is_err() {
            tracing::warn!("audio pump did not finish within teardown deadline");
        }
        if tokio::time::timeout(deadline, self.relay).await.is_err() {
            tracing::warn!("result relay did not finish within teardown deadline");
        }
    }
}

/// Spawns the pump and relay tasks for one activation.
pub fn spawn<C: Clock + 'static>(parts: PipelineParts<C>) -> PipelineHandle {
    let PipelineParts {
        mut source,
        engine_session,
        result_tx,
        transcript,
        speech_tx,
        mut gate,
    } = parts;

    let EngineSession {
        frames: frames_tx,
        events: mut events_rx,
    } = engine_session;

    let running = Arc::new(AtomicBool::new(true));
    let paused = Arc::new(AtomicBool::new(false));
    let shutdown = Arc::new(Notify::new());
    let (finished_tx, finished_rx) = watch::channel(false);

    let pump = {
        let running = Arc::clone(&running);
        let paused = Arc::clone(&paused);
        let shutdown = Arc::clone(&shutdown);
        let result_tx = result_tx.clone();
        let speech_tx = speech_tx.clone();

        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(defaults::AUDIO_POLL_INTERVAL_MS));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut sequence: u64 = 0;

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown.notified() => break,
                }
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let samples = match source.read_samples() {
                    Ok(samples) => samples,
                    Err(e) => {
                        tracing::warn!(error = %e, "audio source read failed");
                        let _ = result_tx.send(Err(e)).await;
                        running.store(false, Ordering::SeqCst);
                        break;
                    }
                };

                if samples.is_empty() {
                    if source.is_finite() {
                        // end of recorded input
                        break;
                    }
                    continue;
                }

                // paused activations keep draining the device buffer
                if paused.load(Ordering::SeqCst) {
                    continue;
                }

                if let Some(gate) = gate.as_mut() {
                    let decision = gate.process(&samples);
                    speech_tx.send_if_modified(|current| {
                        if *current != decision.speech_detected {
                            *current = decision.speech_detected;
                            true
                        } else {
                            false
                        }
                    });
                    if !decision.forward {
                        continue;
                    }
                } else {
                    speech_tx.send_if_modified(|current| {
                        if !*current {
                            *current = true;
                            true
                        } else {
                            false
                        }
                    });
                }

                sequence += 1;
                let frame = AudioFrame::new(samples, Instant::now(), sequence);
                if frames_tx.send(frame).await.is_err() {
                    // engine is gone
                    break;
                }
            }

            if let Err(e) = source.stop() {
                tracing::warn!(error = %e, "audio source stop failed");
            }
            // dropping frames_tx lets the engine flush finals and close its
            // event channel
        })
    };

    let relay = {
        let running = Arc::clone(&running);
        let shutdown = Arc::clone(&shutdown);

        tokio::spawn(async move {
            let mut caller_gone = false;

            loop {
                if caller_gone {
                    // keep the transcript consistent even though nobody is
                    // listening anymore
                    match events_rx.recv().await {
                        Some(Ok(result)) => {
                            if let Ok(mut transcript) = transcript.lock() {
                                transcript.apply(&result);
                            }
                        }
                        Some(Err(_)) => break,
                        None => break,
                    }
                    continue;
                }

                tokio::select! {
                    event = events_rx.recv() => match event {
                        Some(item) => {
                            let engine_failed = item.is_err();
                            if let Ok(result) = &item
                                && let Ok(mut transcript) = transcript.lock()
                            {
                                transcript.apply(result);
                            }
                            if result_tx.send(item).await.is_err() {
                                caller_gone = true;
                                running.store(false, Ordering::SeqCst);
                                shutdown.notify_waiters();
                            } else if engine_failed {
                                // an engine error mid-stream ends the activation
                                running.store(false, Ordering::SeqCst);
                                shutdown.notify_waiters();
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = result_tx.closed() => {
                        caller_gone = true;
                        running.store(false, Ordering::SeqCst);
                        shutdown.notify_waiters();
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
            let _ = finished_tx.send(true);
        })
    };

    PipelineHandle {
        running,
        paused,
        shutdown,
        finished_rx,
        pump,
        relay,
    }
}
