//! Session lifecycle coordination.
//!
//! [`SpeechSession`] owns the state machine (`idle -> preparing ->
//! transcribing <-> paused -> stopping -> idle`) and wires audio capture,
//! voice-activity gating, asset provisioning, and the recognition engine
//! into a single result stream per activation.
//!
//! All transitions are serialized through one async mutex: concurrent calls
//! queue rather than race, and a call that arrives mid-transition observes
//! the settled state that transition produced.

pub mod events;
pub mod file;
pub mod permissions;
pub mod pipeline;
pub mod status;
pub mod transcript;

use crate::assets::{AssetProvisioner, DownloadProgress};
use crate::audio::{AudioInputDescriptor, AudioSource, AudioSourceFactory, RouteMonitor};
use crate::config::{
    Config, FileConfig, SessionConfig, TranscriptionPreset, VoiceActivitySettings,
};
use crate::defaults;
use crate::engine::{EngineOptions, RecognitionEngine, TranscriptionResult};
use crate::error::{Result, SessionError};
use crate::locale::Locale;
use crate::vad::{EnergyGate, GateConfig};
use crate::vocabulary::CustomVocabulary;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::{Mutex, broadcast, mpsc, watch};

pub use events::{EventEmitter, SessionEvent};
pub use file::validate_input_file;
pub use permissions::{GrantedPermissions, MockPermissionProbe, PermissionProbe};
pub use pipeline::{PipelineHandle, PipelineParts};
pub use status::Status;
pub use transcript::{TranscriptAccumulator, TranscriptSnapshot};

/// Stream of transcription results for one activation.
///
/// Dropping the stream tells the session nobody is listening; it tears the
/// pipeline down and returns to idle on its own.
#[derive(Debug)]
pub struct ResultStream {
    rx: mpsc::Receiver<Result<TranscriptionResult>>,
}

impl ResultStream {
    /// Next result, or `None` once the activation has fully ended.
    pub async fn recv(&mut self) -> Option<Result<TranscriptionResult>> {
        self.rx.recv().await
    }
}

struct Active {
    handle: PipelineHandle,
    // kept so the caller's stream survives the gap during a pipeline rebuild
    result_tx: mpsc::Sender<Result<TranscriptionResult>>,
}

struct State {
    config: SessionConfig,
    generation: u64,
    active: Option<Active>,
}

struct SessionInner {
    engine: Arc<dyn RecognitionEngine>,
    provisioner: Arc<dyn AssetProvisioner>,
    permissions: Arc<dyn PermissionProbe>,
    source_factory: Option<Arc<dyn AudioSourceFactory>>,
    file_config: FileConfig,
    state: Mutex<State>,
    transcript: Arc<StdMutex<TranscriptAccumulator>>,
    status_tx: watch::Sender<Status>,
    speech_tx: watch::Sender<bool>,
    progress_tx: watch::Sender<Option<DownloadProgress>>,
    input_tx: watch::Sender<Option<AudioInputDescriptor>>,
    events: EventEmitter<SessionEvent>,
}

impl SessionInner {
    fn set_status(&self, status: Status) {
        let changed = self.status_tx.send_if_modified(|current| {
            if *current != status {
                *current = status;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::debug!(status = %status, "session status changed");
            self.events.emit(SessionEvent::StatusChanged(status));
        }
    }
}

/// Builder for [`SpeechSession`].
///
/// The engine and asset provisioner are mandatory collaborators; everything
/// else has a working default. `build` must run inside a tokio runtime.
pub struct SessionBuilder {
    engine: Arc<dyn RecognitionEngine>,
    provisioner: Arc<dyn AssetProvisioner>,
    permissions: Arc<dyn PermissionProbe>,
    source_factory: Option<Arc<dyn AudioSourceFactory>>,
    route_monitor: Option<Arc<dyn RouteMonitor>>,
    config: Config,
}

impl SessionBuilder {
    pub fn permissions(mut self, permissions: Arc<dyn PermissionProbe>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Audio source used for live activations.
    pub fn source_factory(mut self, factory: Arc<dyn AudioSourceFactory>) -> Self {
        self.source_factory = Some(factory);
        self
    }

    /// Platform route-change notifications, where available.
    pub fn route_monitor(mut self, monitor: Arc<dyn RouteMonitor>) -> Self {
        self.route_monitor = Some(monitor);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    pub fn build(self) -> SpeechSession {
        let (status_tx, _) = watch::channel(Status::Idle);
        let (speech_tx, speech_rx) = watch::channel(false);
        let (progress_tx, _) = watch::channel(None);
        let (input_tx, _) = watch::channel(None);
        let events = EventEmitter::new();

        #[cfg(feature = "cpal-audio")]
        let source_factory = self.source_factory.or_else(|| {
            let device = self.config.audio.device.clone();
            let factory = move || -> Result<Box<dyn AudioSource>> {
                let source = crate::audio::capture::CpalAudioSource::new(device.as_deref())?;
                Ok(Box::new(source) as Box<dyn AudioSource>)
            };
            Some(Arc::new(factory) as Arc<dyn AudioSourceFactory>)
        });
        #[cfg(not(feature = "cpal-audio"))]
        let source_factory = self.source_factory;

        let inner = Arc::new(SessionInner {
            engine: self.engine,
            provisioner: self.provisioner,
            permissions: self.permissions,
            source_factory,
            file_config: self.config.file,
            state: Mutex::new(State {
                config: self.config.session,
                generation: 0,
                active: None,
            }),
            transcript: Arc::new(StdMutex::new(TranscriptAccumulator::new())),
            status_tx,
            speech_tx,
            progress_tx,
            input_tx,
            events,
        });

        spawn_speech_broadcaster(Arc::clone(&inner), speech_rx);
        if let Some(monitor) = self.route_monitor {
            spawn_route_relay(Arc::clone(&inner), monitor);
        }

        SpeechSession { inner }
    }
}

fn spawn_speech_broadcaster(inner: Arc<SessionInner>, mut speech_rx: watch::Receiver<bool>) {
    tokio::spawn(async move {
        while speech_rx.changed().await.is_ok() {
            let detected = *speech_rx.borrow_and_update();
            inner.events.emit(SessionEvent::SpeechDetected(detected));
        }
    });
}

fn spawn_route_relay(inner: Arc<SessionInner>, monitor: Arc<dyn RouteMonitor>) {
    let mut routes = monitor.subscribe();
    tokio::spawn(async move {
        while let Some(descriptor) = routes.recv().await {
            tracing::debug!(device = %descriptor.name, "audio route changed");
            // send_replace, so pollers see the value without subscribing
            inner.input_tx.send_replace(Some(descriptor.clone()));
            inner
                .events
                .emit(SessionEvent::AudioRouteChanged(descriptor));
        }
    });
}

fn spawn_supervisor(
    inner: Arc<SessionInner>,
    generation: u64,
    mut finished: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        if finished.wait_for(|done| *done).await.is_err() {
            return;
        }
        let mut state = inner.state.lock().await;
        // a newer transition already owns teardown
        if state.generation != generation {
            return;
        }
        if let Some(active) = state.active.take() {
            inner.set_status(Status::Stopping);
            active.handle.stop().await;
        }
        inner.set_status(Status::Idle);
        inner.speech_tx.send_replace(false);
        inner.progress_tx.send_replace(None);
    });
}

/// Async coordinator around a black-box on-device recognition engine.
#[derive(Clone)]
pub struct SpeechSession {
    inner: Arc<SessionInner>,
}

impl SpeechSession {
    pub fn builder(
        engine: Arc<dyn RecognitionEngine>,
        provisioner: Arc<dyn AssetProvisioner>,
    ) -> SessionBuilder {
        SessionBuilder {
            engine,
            provisioner,
            permissions: Arc::new(GrantedPermissions),
            source_factory: None,
            route_monitor: None,
            config: Config::default(),
        }
    }

    /// Starts live transcription from the configured audio source.
    ///
    /// Fails with [`SessionError::AlreadyActive`] when a pipeline already
    /// exists. On any preparation failure the session falls back to idle
    /// with nothing allocated.
    pub async fn start(&self) -> Result<ResultStream> {
        let mut state = self.inner.state.lock().await;
        if state.active.is_some() {
            return Err(SessionError::AlreadyActive);
        }

        self.inner.set_status(Status::Preparing);
        match self.prepare_and_spawn(&mut state, None, true, true).await {
            Ok(stream) => Ok(stream),
            Err(e) => {
                self.fail_back_to_idle(&mut state);
                Err(e)
            }
        }
    }

    /// Transcribes a local WAV file through the same pipeline.
    ///
    /// Validation (existence, allowed directories, format, duration) happens
    /// before any engine resources are allocated. The stream closes after
    /// the final results for the file have been delivered.
    pub async fn transcribe_file(&self, path: &Path) -> Result<ResultStream> {
        let mut state = self.inner.state.lock().await;
        if state.active.is_some() {
            return Err(SessionError::AlreadyActive);
        }

        let (canonical, duration) = validate_input_file(path, &self.inner.file_config)?;
        tracing::info!(path = %canonical.display(), duration_secs = duration, "transcribing file");

        self.inner.set_status(Status::Preparing);
        let source: Box<dyn AudioSource> =
            match crate::audio::wav::WavAudioSource::from_path(&canonical) {
                Ok(source) => Box::new(source),
                Err(e) => {
                    self.fail_back_to_idle(&mut state);
                    return Err(e);
                }
            };

        match self
            .prepare_and_spawn(&mut state, Some(source), true, false)
            .await
        {
            Ok(stream) => Ok(stream),
            Err(e) => {
                self.fail_back_to_idle(&mut state);
                Err(e)
            }
        }
    }

    /// Pauses audio forwarding. The pipeline stays alive and `resume` picks
    /// up instantly. Pausing when already paused, or when nothing is
    /// running, is a no-op.
    pub async fn pause(&self) -> Result<()> {
        let state = self.inner.state.lock().await;
        if let Some(active) = &state.active
            && *self.inner.status_tx.borrow() == Status::Transcribing
        {
            active.handle.pause();
            self.inner.set_status(Status::Paused);
        }
        Ok(())
    }

    /// Resumes a paused session. Resuming while transcribing is a no-op;
    /// resuming with no pipeline is an error. If the pipeline ended while it
    /// was paused there is nothing to pick up: resume fails with
    /// [`SessionError::ResumeFailed`] and the session falls back to idle.
    pub async fn resume(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        let Some(active) = &state.active else {
            return Err(SessionError::NotPaused);
        };
        if *self.inner.status_tx.borrow() != Status::Paused {
            return Ok(());
        }
        if active.handle.is_running() {
            active.handle.resume();
            self.inner.set_status(Status::Transcribing);
            return Ok(());
        }
        self.fail_back_to_idle(&mut state);
        Err(SessionError::ResumeFailed {
            message: "pipeline ended while paused".to_string(),
        })
    }

    /// Stops the session and waits for deterministic teardown: the engine
    /// flushes pending finals to the stream before this returns. Stopping
    /// an idle session is a no-op.
    pub async fn stop(&self) -> Result<TranscriptSnapshot> {
        let mut state = self.inner.state.lock().await;
        let Some(active) = state.active.take() else {
            return Ok(self.transcript());
        };

        state.generation += 1;
        self.inner.set_status(Status::Stopping);
        active.handle.stop().await;
        drop(active.result_tx);

        self.inner.set_status(Status::Idle);
        self.inner.speech_tx.send_replace(false);
        self.inner.progress_tx.send_replace(None);
        Ok(self.transcript())
    }

    /// Switches the recognition locale. Mid-session this rebuilds the
    /// pipeline: finalized text is preserved, the volatile hypothesis is
    /// discarded, and the existing result stream keeps delivering.
    pub async fn set_locale(&self, locale: impl Into<Locale>) -> Result<()> {
        let locale = locale.into();
        self.update_config(move |config| config.locale = locale)
            .await
    }

    /// Switches the transcription preset, rebuilding mid-session.
    pub async fn set_preset(&self, preset: TranscriptionPreset) -> Result<()> {
        self.update_config(move |config| config.preset = preset)
            .await
    }

    /// Reconfigures voice-activity gating, rebuilding mid-session. Disabling
    /// gating makes the speech-detected observable report `true` again as
    /// soon as audio flows.
    pub async fn set_voice_activity(&self, settings: VoiceActivitySettings) -> Result<()> {
        self.update_config(move |config| config.voice_activity = settings)
            .await
    }

    /// Installs a custom vocabulary for subsequent activations and returns
    /// its cache key. Rejected while a pipeline exists.
    pub async fn install_vocabulary(&self, vocabulary: CustomVocabulary) -> Result<String> {
        let mut state = self.inner.state.lock().await;
        if state.active.is_some() {
            return Err(SessionError::VocabularyWhileActive);
        }
        vocabulary.validate()?;
        let key = vocabulary.cache_key();
        state.config.vocabulary = Some(vocabulary);
        Ok(key)
    }

    /// Adds a contextual term for subsequent activations.
    pub async fn add_contextual_term(&self, term: &str) -> Result<()> {
        let term = term.to_string();
        self.update_config(move |config| config.contextual_terms.push(term))
            .await
    }

    pub fn status(&self) -> Status {
        *self.inner.status_tx.borrow()
    }

    /// Current-value observable of the lifecycle state.
    pub fn watch_status(&self) -> watch::Receiver<Status> {
        self.inner.status_tx.subscribe()
    }

    pub fn speech_detected(&self) -> bool {
        *self.inner.speech_tx.borrow()
    }

    pub fn watch_speech_detected(&self) -> watch::Receiver<bool> {
        self.inner.speech_tx.subscribe()
    }

    /// Progress of the current asset download, if one is running.
    pub fn download_progress(&self) -> Option<DownloadProgress> {
        self.inner.progress_tx.borrow().clone()
    }

    pub fn watch_download_progress(&self) -> watch::Receiver<Option<DownloadProgress>> {
        self.inner.progress_tx.subscribe()
    }

    /// Most recently reported audio input route, if a monitor is configured.
    pub fn current_audio_input(&self) -> Option<AudioInputDescriptor> {
        self.inner.input_tx.borrow().clone()
    }

    pub fn watch_audio_input(&self) -> watch::Receiver<Option<AudioInputDescriptor>> {
        self.inner.input_tx.subscribe()
    }

    /// Subscribes to discrete session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of the transcript accumulated so far.
    pub fn transcript(&self) -> TranscriptSnapshot {
        self.inner
            .transcript
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .snapshot()
    }

    /// Copy of the current session configuration.
    pub async fn config(&self) -> SessionConfig {
        self.inner.state.lock().await.config.clone()
    }

    async fn update_config(
        &self,
        mutate: impl FnOnce(&mut SessionConfig) + Send,
    ) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        mutate(&mut state.config);
        if state.active.is_some() {
            self.rebuild(&mut state).await?;
        }
        Ok(())
    }

    /// Replaces the running pipeline under the new configuration while the
    /// caller's result stream stays open.
    async fn rebuild(&self, state: &mut State) -> Result<()> {
        let Some(active) = state.active.take() else {
            return Ok(());
        };
        let was_paused = active.handle.is_paused();
        let result_tx = active.result_tx.clone();

        state.generation += 1;
        self.inner.set_status(Status::Preparing);
        // flushes the old stream's finals into the caller's stream first
        active.handle.stop().await;
        self.inner
            .transcript
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clear_volatile();

        match self.spawn_pipeline(state, None, result_tx).await {
            Ok(()) => {
                if was_paused {
                    if let Some(active) = &state.active {
                        active.handle.pause();
                    }
                    self.inner.set_status(Status::Paused);
                }
                Ok(())
            }
            Err(e) => {
                self.fail_back_to_idle(state);
                Err(e)
            }
        }
    }

    async fn prepare_and_spawn(
        &self,
        state: &mut State,
        source: Option<Box<dyn AudioSource>>,
        fresh: bool,
        needs_microphone: bool,
    ) -> Result<ResultStream> {
        if needs_microphone {
            self.inner.permissions.check_microphone().await?;
        }
        self.inner.permissions.check_recognition().await?;

        if fresh {
            self.inner
                .transcript
                .lock()
                .unwrap_or_else(|poison| poison.into_inner())
                .reset();
        }

        let (result_tx, result_rx) = mpsc::channel(defaults::RESULT_BUFFER);
        self.spawn_pipeline(state, source, result_tx).await?;

        Ok(ResultStream { rx: result_rx })
    }

    async fn spawn_pipeline(
        &self,
        state: &mut State,
        source: Option<Box<dyn AudioSource>>,
        result_tx: mpsc::Sender<Result<TranscriptionResult>>,
    ) -> Result<()> {
        let locale = state.config.locale.clone();

        self.inner.progress_tx.send_replace(None);
        let inner = Arc::clone(&self.inner);
        let progress_cb = move |p: DownloadProgress| {
            inner.progress_tx.send_replace(Some(p.clone()));
            inner.events.emit(SessionEvent::DownloadProgress(p));
        };
        self.inner.provisioner.ensure(&locale, &progress_cb).await?;

        let options = EngineOptions::from(&state.config);
        let engine_session = self.inner.engine.start(options).await?;

        let mut source = match source {
            Some(source) => source,
            None => {
                let factory = self.inner.source_factory.as_ref().ok_or_else(|| {
                    SessionError::AudioCapture {
                        message: "no audio source factory configured".to_string(),
                    }
                })?;
                factory.open()?
            }
        };
        source.start()?;

        let gate = if state.config.voice_activity.enabled {
            Some(EnergyGate::new(GateConfig::from(&state.config.voice_activity)))
        } else {
            None
        };
        // without a gate the observable sits at its neutral "speech present"
        // value; with one it starts closed until the gate opens
        self.inner.speech_tx.send_replace(gate.is_none());

        let handle = pipeline::spawn(PipelineParts {
            source,
            engine_session,
            result_tx: result_tx.clone(),
            transcript: Arc::clone(&self.inner.transcript),
            speech_tx: self.inner.speech_tx.clone(),
            gate,
        });

        state.generation += 1;
        spawn_supervisor(
            Arc::clone(&self.inner),
            state.generation,
            handle.finished(),
        );
        state.active = Some(Active { handle, result_tx });

        self.inner.set_status(Status::Transcribing);
        Ok(())
    }

    fn fail_back_to_idle(&self, state: &mut State) {
        state.active = None;
        state.generation += 1;
        self.inner.set_status(Status::Idle);
        self.inner.speech_tx.send_replace(false);
        self.inner.progress_tx.send_replace(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MockAssetProvisioner;
    use crate::audio::{FramePhase, MockAudioSource};
    use crate::engine::MockRecognitionEngine;

    fn live_source_factory() -> Arc<dyn AudioSourceFactory> {
        Arc::new(|| -> Result<Box<dyn AudioSource>> {
            let source = MockAudioSource::new()
                .as_live_source()
                .with_frame_sequence(vec![FramePhase {
                    samples: vec![3000i16; 320],
                    count: u32::MAX,
                }]);
            Ok(Box::new(source) as Box<dyn AudioSource>)
        })
    }

    fn basic_session(engine: MockRecognitionEngine) -> SpeechSession {
        SpeechSession::builder(
            Arc::new(engine),
            Arc::new(MockAssetProvisioner::new().with_installed("en-US")),
        )
        .source_factory(live_source_factory())
        .build()
    }

    #[tokio::test]
    async fn test_start_moves_to_transcribing_and_rejects_second_start() {
        let session = basic_session(MockRecognitionEngine::new());
        assert_eq!(session.status(), Status::Idle);

        let _stream = session.start().await.unwrap();
        assert_eq!(session.status(), Status::Transcribing);

        assert!(matches!(
            session.start().await,
            Err(SessionError::AlreadyActive)
        ));

        session.stop().await.unwrap();
        assert_eq!(session.status(), Status::Idle);
    }

    #[tokio::test]
    async fn test_permission_denial_falls_back_to_idle() {
        let session = SpeechSession::builder(
            Arc::new(MockRecognitionEngine::new()),
            Arc::new(MockAssetProvisioner::new().with_installed("en-US")),
        )
        .permissions(Arc::new(MockPermissionProbe::new().deny_microphone()))
        .source_factory(live_source_factory())
        .build();

        let result = session.start().await;
        assert!(matches!(
            result,
            Err(SessionError::MicrophonePermissionDenied)
        ));
        assert_eq!(session.status(), Status::Idle);

        // and the session is still usable after fixing nothing else
        assert!(session.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let session = basic_session(MockRecognitionEngine::new());
        session.stop().await.unwrap();
        session.stop().await.unwrap();
        assert_eq!(session.status(), Status::Idle);
    }

    #[tokio::test]
    async fn test_resume_without_pipeline_is_an_error() {
        let session = basic_session(MockRecognitionEngine::new());
        assert!(matches!(
            session.resume().await,
            Err(SessionError::NotPaused)
        ));
        // pause with no pipeline is a no-op by contrast
        assert!(session.pause().await.is_ok());
    }

    #[tokio::test]
    async fn test_vocabulary_rejected_while_active() {
        let session = basic_session(MockRecognitionEngine::new());
        let _stream = session.start().await.unwrap();

        let vocabulary =
            CustomVocabulary::new("en-US", "jargon", "1", 0.5).with_phrase("tokio", 3);
        assert!(matches!(
            session.install_vocabulary(vocabulary).await,
            Err(SessionError::VocabularyWhileActive)
        ));

        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_vocabulary_installs_when_idle_and_reports_cache_key() {
        let session = basic_session(MockRecognitionEngine::new());
        let vocabulary =
            CustomVocabulary::new("en-US", "jargon", "1", 0.5).with_phrase("tokio", 3);
        let expected = vocabulary.cache_key();

        let key = session.install_vocabulary(vocabulary).await.unwrap();
        assert_eq!(key, expected);
        assert_eq!(
            session.config().await.vocabulary.unwrap().identifier,
            "jargon"
        );
    }

    #[tokio::test]
    async fn test_unsupported_locale_fails_start() {
        let session = SpeechSession::builder(
            Arc::new(MockRecognitionEngine::new()),
            Arc::new(MockAssetProvisioner::new()),
        )
        .source_factory(live_source_factory())
        .session_config(SessionConfig::for_locale("xx-XX"))
        .build();

        assert!(matches!(
            session.start().await,
            Err(SessionError::UnsupportedLocale { .. })
        ));
        assert_eq!(session.status(), Status::Idle);
    }
}
