//! End-to-end lifecycle tests driving [`SpeechSession`] through mock
//! collaborators: scripted engine, scripted audio source, and in-memory
//! asset provisioner.

use speech_session::assets::MockAssetProvisioner;
use speech_session::audio::source::{FramePhase, MockAudioSource};
use speech_session::audio::{AudioSource, AudioSourceFactory};
use speech_session::engine::{
    EngineOptions, EngineSession, MockRecognitionEngine, RecognitionEngine, TranscriptionResult,
};
use speech_session::error::{Result, SessionError};
use speech_session::session::SessionEvent;
use speech_session::vocabulary::CustomVocabulary;
use speech_session::{SpeechSession, Status};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Endless loud frames, as a microphone would produce.
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

fn session_with(engine: Arc<MockRecognitionEngine>) -> SpeechSession {
    SpeechSession::builder(
        engine as Arc<dyn RecognitionEngine>,
        Arc::new(
            MockAssetProvisioner::new()
                .with_installed("en-US")
                .with_installed("de-DE"),
        ),
    )
    .source_factory(live_source_factory())
    .build()
}

fn write_wav(path: &Path, seconds: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..(16_000 * seconds) {
        writer.write_sample(1000i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// Engine whose event stream stays open forever: it accepts the recognition
/// stream but never emits, flushes, or closes anything.
struct HangingEngine;

#[async_trait::async_trait]
impl RecognitionEngine for HangingEngine {
    async fn start(&self, _options: EngineOptions) -> Result<EngineSession> {
        let (frames, frames_rx) = tokio::sync::mpsc::channel(8);
        let (events_tx, events) = tokio::sync::mpsc::channel(8);
        tokio::spawn(async move {
            let _keep_open = (frames_rx, events_tx);
            std::future::pending::<()>().await;
        });
        Ok(EngineSession { frames, events })
    }
}

async fn next_result(
    stream: &mut speech_session::ResultStream,
) -> Option<Result<TranscriptionResult>> {
    timeout(RECV_TIMEOUT, stream.recv())
        .await
        .expect("timed out waiting for a result")
}

#[tokio::test]
async fn test_live_stream_delivers_volatile_then_final() {
    let engine = Arc::new(
        MockRecognitionEngine::new()
            .with_result(TranscriptionResult::volatile("hel"))
            .with_result(TranscriptionResult::volatile("hello"))
            .with_result(TranscriptionResult::finalized("hello world.")),
    );
    let session = session_with(engine);

    let mut stream = session.start().await.unwrap();
    assert_eq!(session.status(), Status::Transcribing);

    let first = next_result(&mut stream).await.unwrap().unwrap();
    assert!(!first.is_final);
    assert_eq!(first.text, "hel");

    let second = next_result(&mut stream).await.unwrap().unwrap();
    assert!(!second.is_final);
    assert_eq!(second.text, "hello");

    let third = next_result(&mut stream).await.unwrap().unwrap();
    assert!(third.is_final);

    let snapshot = session.transcript();
    assert_eq!(snapshot.finalized, "hello world.");
    assert_eq!(snapshot.volatile, "");

    session.stop().await.unwrap();
    assert_eq!(session.status(), Status::Idle);
}

#[tokio::test]
async fn test_stop_flushes_pending_finals_before_stream_closes() {
    let engine = Arc::new(
        MockRecognitionEngine::new()
            .with_flush_result(TranscriptionResult::finalized("tail.")),
    );
    let session = session_with(engine);

    let mut stream = session.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let snapshot = session.stop().await.unwrap();
    assert_eq!(snapshot.finalized, "tail.");

    // the flushed final was already delivered when stop returned
    let flushed = next_result(&mut stream).await.unwrap().unwrap();
    assert!(flushed.is_final);
    assert_eq!(flushed.text, "tail.");
    assert!(next_result(&mut stream).await.is_none());
}

#[tokio::test]
async fn test_pause_withholds_audio_and_resume_continues() {
    let engine = Arc::new(MockRecognitionEngine::new());
    let session = session_with(Arc::clone(&engine));

    let _stream = session.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(engine.frames_seen() > 0);

    session.pause().await.unwrap();
    assert_eq!(session.status(), Status::Paused);
    tokio::time::sleep(Duration::from_millis(60)).await;

    let while_paused = engine.frames_seen();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(engine.frames_seen(), while_paused);

    session.resume().await.unwrap();
    assert_eq!(session.status(), Status::Transcribing);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(engine.frames_seen() > while_paused);

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_dropping_stream_tears_session_down() {
    let session = session_with(Arc::new(MockRecognitionEngine::new()));
    let mut status = session.watch_status();

    let stream = session.start().await.unwrap();
    assert_eq!(session.status(), Status::Transcribing);

    drop(stream);

    timeout(RECV_TIMEOUT, status.wait_for(|s| *s == Status::Idle))
        .await
        .expect("session never returned to idle")
        .unwrap();
    assert!(!session.speech_detected());

    // a fresh start works after the automatic teardown
    let _stream = session.start().await.unwrap();
    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_engine_error_mid_stream_tears_down_to_idle() {
    let engine = Arc::new(
        MockRecognitionEngine::new()
            .with_result(TranscriptionResult::volatile("hel"))
            .with_error("decoder crashed"),
    );
    let session = session_with(engine);
    let mut status = session.watch_status();

    let mut stream = session.start().await.unwrap();

    let error = loop {
        match next_result(&mut stream)
            .await
            .expect("stream ended before the engine error arrived")
        {
            Ok(_) => continue,
            Err(e) => break e,
        }
    };
    assert!(matches!(error, SessionError::Engine { .. }));
    assert!(!error.is_start_failure());

    timeout(RECV_TIMEOUT, status.wait_for(|s| *s == Status::Idle))
        .await
        .expect("session never returned to idle after an engine error")
        .unwrap();

    // the stream closes; no further results follow the error
    assert!(next_result(&mut stream).await.is_none());
}

#[tokio::test]
async fn test_automatic_teardown_passes_through_stopping() {
    let session = session_with(Arc::new(MockRecognitionEngine::new()));
    let mut events = session.subscribe();

    let stream = session.start().await.unwrap();
    drop(stream);

    let mut statuses = Vec::new();
    while !statuses.contains(&Status::Idle) {
        let event = timeout(RECV_TIMEOUT, events.recv())
            .await
            .expect("session never settled after the stream was dropped")
            .unwrap();
        if let SessionEvent::StatusChanged(status) = event {
            statuses.push(status);
        }
    }
    assert_eq!(
        statuses,
        vec![
            Status::Preparing,
            Status::Transcribing,
            Status::Stopping,
            Status::Idle
        ]
    );
}

#[tokio::test]
async fn test_locale_switch_rebuilds_and_preserves_finalized_text() {
    let engine = Arc::new(
        MockRecognitionEngine::new()
            .with_result(TranscriptionResult::finalized("first part.")),
    );
    let session = session_with(Arc::clone(&engine));

    let mut stream = session.start().await.unwrap();
    let first = next_result(&mut stream).await.unwrap().unwrap();
    assert!(first.is_final);

    session.set_locale("de-DE").await.unwrap();
    assert_eq!(session.status(), Status::Transcribing);

    let starts = engine.start_options();
    assert_eq!(starts.len(), 2);
    assert_eq!(starts[1].locale.identifier(), "de-DE");

    // finalized text survives the rebuild
    assert!(session.transcript().finalized.starts_with("first part."));

    // the original stream keeps delivering from the new pipeline
    let replayed = next_result(&mut stream).await.unwrap().unwrap();
    assert!(replayed.is_final);

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_download_progress_is_observable_during_start() {
    let session = SpeechSession::builder(
        Arc::new(MockRecognitionEngine::new()),
        Arc::new(MockAssetProvisioner::new()),
    )
    .source_factory(live_source_factory())
    .build();
    session.set_locale("de-DE").await.unwrap();

    let mut events = session.subscribe();
    let _stream = session.start().await.unwrap();

    let progress = session.download_progress().expect("progress after install");
    assert!((progress.fraction - 1.0).abs() < f32::EPSILON);

    let mut saw_partial = false;
    while let Ok(Ok(event)) = timeout(Duration::from_millis(200), events.recv()).await {
        if let SessionEvent::DownloadProgress(p) = event {
            if p.fraction < 1.0 {
                saw_partial = true;
            }
        }
    }
    assert!(saw_partial, "expected intermediate download progress events");

    session.stop().await.unwrap();
    assert!(session.download_progress().is_none());
}

#[tokio::test]
async fn test_no_network_start_fails_back_to_idle() {
    let session = SpeechSession::builder(
        Arc::new(MockRecognitionEngine::new()),
        Arc::new(MockAssetProvisioner::new().with_no_network()),
    )
    .source_factory(live_source_factory())
    .build();

    let err = session.start().await.unwrap_err();
    assert!(matches!(err, SessionError::NoNetwork));
    assert!(err.is_start_failure());
    assert_eq!(session.status(), Status::Idle);
}

#[tokio::test]
async fn test_file_transcription_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.wav");
    write_wav(&path, 1);

    let engine = Arc::new(
        MockRecognitionEngine::new()
            .with_result(TranscriptionResult::finalized("spoken text."))
            .with_flush_result(TranscriptionResult::finalized("flushed tail.")),
    );
    let session = SpeechSession::builder(
        engine as Arc<dyn RecognitionEngine>,
        Arc::new(MockAssetProvisioner::new().with_installed("en-US")),
    )
    .build();
    let mut status = session.watch_status();

    let mut stream = session.transcribe_file(&path).await.unwrap();

    let mut finals = Vec::new();
    while let Some(item) = timeout(RECV_TIMEOUT, stream.recv())
        .await
        .expect("timed out draining file stream")
    {
        let result = item.unwrap();
        if result.is_final {
            finals.push(result.text);
        }
    }
    assert!(finals.contains(&"spoken text.".to_string()));
    assert!(finals.contains(&"flushed tail.".to_string()));

    timeout(RECV_TIMEOUT, status.wait_for(|s| *s == Status::Idle))
        .await
        .expect("session never returned to idle after file end")
        .unwrap();

    let snapshot = session.transcript();
    assert_eq!(snapshot.combined(), "spoken text. flushed tail.");
}

#[tokio::test]
async fn test_file_validation_rejects_bad_inputs_without_side_effects() {
    let session = session_with(Arc::new(MockRecognitionEngine::new()));

    let missing = session
        .transcribe_file(Path::new("/nonexistent/clip.wav"))
        .await;
    assert!(matches!(missing, Err(SessionError::FileNotFound { .. })));
    assert_eq!(session.status(), Status::Idle);

    let dir = tempfile::tempdir().unwrap();
    let mp3 = dir.path().join("clip.mp3");
    std::fs::write(&mp3, b"not audio").unwrap();
    let wrong_format = session.transcribe_file(&mp3).await;
    assert!(matches!(
        wrong_format,
        Err(SessionError::UnsupportedFormat { .. })
    ));
    assert_eq!(session.status(), Status::Idle);

    // validation failures leave the session usable
    let _stream = session.start().await.unwrap();
    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_vocabulary_cache_key_is_order_independent() {
    let session = session_with(Arc::new(MockRecognitionEngine::new()));

    let a = CustomVocabulary::new("en-US", "medical", "3", 0.7)
        .with_phrase("stat", 4)
        .with_phrase("bolus", 2);
    let b = CustomVocabulary::new("en-US", "medical", "3", 0.7)
        .with_phrase("bolus", 2)
        .with_phrase("stat", 4);

    let key_a = session.install_vocabulary(a).await.unwrap();
    let key_b = session.install_vocabulary(b).await.unwrap();
    assert_eq!(key_a, key_b);

    let bumped = CustomVocabulary::new("en-US", "medical", "4", 0.7)
        .with_phrase("stat", 4)
        .with_phrase("bolus", 2);
    let key_bumped = session.install_vocabulary(bumped).await.unwrap();
    assert_ne!(key_a, key_bumped);
}

#[tokio::test]
async fn test_disabling_vad_resets_speech_detected_to_neutral() {
    use speech_session::config::VoiceActivitySettings;
    use speech_session::VadSensitivity;

    // silence only: an enabled gate never reports speech
    let silent_factory: Arc<dyn AudioSourceFactory> =
        Arc::new(|| -> Result<Box<dyn AudioSource>> {
            let source = MockAudioSource::new()
                .as_live_source()
                .with_frame_sequence(vec![FramePhase {
                    samples: vec![0i16; 320],
                    count: u32::MAX,
                }]);
            Ok(Box::new(source) as Box<dyn AudioSource>)
        });

    let session = SpeechSession::builder(
        Arc::new(MockRecognitionEngine::new()),
        Arc::new(MockAssetProvisioner::new().with_installed("en-US")),
    )
    .source_factory(silent_factory)
    .build();

    session
        .set_voice_activity(VoiceActivitySettings {
            enabled: true,
            sensitivity: VadSensitivity::Medium,
        })
        .await
        .unwrap();

    let _stream = session.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!session.speech_detected(), "silence keeps the gate closed");

    // disabling gating mid-session rebuilds without the gate; the
    // observable returns to its neutral "speech present" value
    session
        .set_voice_activity(VoiceActivitySettings {
            enabled: false,
            sensitivity: VadSensitivity::Medium,
        })
        .await
        .unwrap();
    assert!(session.speech_detected());

    session.stop().await.unwrap();
    assert!(!session.speech_detected(), "idle sessions report no speech");
}

#[tokio::test]
async fn test_route_changes_reach_watch_and_event_stream() {
    use speech_session::audio::route::{AudioInputDescriptor, AudioPortType, MockRouteMonitor};

    let monitor = Arc::new(MockRouteMonitor::new());
    let session = SpeechSession::builder(
        Arc::new(MockRecognitionEngine::new()),
        Arc::new(MockAssetProvisioner::new().with_installed("en-US")),
    )
    .source_factory(live_source_factory())
    .route_monitor(Arc::clone(&monitor) as Arc<dyn speech_session::RouteMonitor>)
    .build();

    assert!(session.current_audio_input().is_none());
    let mut input = session.watch_audio_input();
    let mut events = session.subscribe();

    monitor.push(AudioInputDescriptor::new("Headset Mic", AudioPortType::Headset));

    timeout(RECV_TIMEOUT, input.wait_for(|d| d.is_some()))
        .await
        .expect("route change never reached the watch")
        .unwrap();
    let current = session.current_audio_input().unwrap();
    assert_eq!(current.name, "Headset Mic");

    loop {
        let event = timeout(RECV_TIMEOUT, events.recv())
            .await
            .expect("route change never reached the event stream")
            .unwrap();
        if let SessionEvent::AudioRouteChanged(descriptor) = event {
            assert_eq!(descriptor.port, AudioPortType::Headset);
            break;
        }
    }
}

#[tokio::test]
async fn test_resume_fails_when_pipeline_died_while_paused() {
    let failing_factory: Arc<dyn AudioSourceFactory> =
        Arc::new(|| -> Result<Box<dyn AudioSource>> {
            let source = MockAudioSource::new()
                .as_live_source()
                .with_read_failure()
                .with_error_message("device unplugged");
            Ok(Box::new(source) as Box<dyn AudioSource>)
        });

    let session = SpeechSession::builder(
        Arc::new(HangingEngine),
        Arc::new(MockAssetProvisioner::new().with_installed("en-US")),
    )
    .source_factory(failing_factory)
    .build();

    let mut stream = session.start().await.unwrap();

    // the capture failure kills the pump, but the engine side stays open,
    // so the session still looks alive
    let error = next_result(&mut stream).await.unwrap().unwrap_err();
    assert!(matches!(error, SessionError::AudioCapture { .. }));

    session.pause().await.unwrap();
    assert_eq!(session.status(), Status::Paused);

    let err = session.resume().await.unwrap_err();
    assert!(matches!(err, SessionError::ResumeFailed { .. }));
    assert_eq!(session.status(), Status::Idle);
}

#[tokio::test]
async fn test_route_updates_land_without_any_subscriber() {
    use speech_session::audio::route::{AudioInputDescriptor, AudioPortType, MockRouteMonitor};

    let monitor = Arc::new(MockRouteMonitor::new());
    let session = SpeechSession::builder(
        Arc::new(MockRecognitionEngine::new()),
        Arc::new(MockAssetProvisioner::new().with_installed("en-US")),
    )
    .source_factory(live_source_factory())
    .route_monitor(Arc::clone(&monitor) as Arc<dyn speech_session::RouteMonitor>)
    .build();

    // nobody watches the route observable; polling must still see the change
    monitor.push(AudioInputDescriptor::new("USB Mic", AudioPortType::Usb));

    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        if let Some(current) = session.current_audio_input() {
            assert_eq!(current.name, "USB Mic");
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "route update never became visible to polling"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_vocabulary_installed_before_start_reaches_engine() {
    let engine = Arc::new(MockRecognitionEngine::new());
    let session = session_with(Arc::clone(&engine));

    let vocabulary = CustomVocabulary::new("en-US", "jargon", "1", 0.5).with_phrase("voip", 3);
    session.install_vocabulary(vocabulary).await.unwrap();

    let _stream = session.start().await.unwrap();
    let starts = engine.start_options();
    assert_eq!(starts.len(), 1);
    let installed = starts[0].vocabulary.as_ref().expect("vocabulary passed");
    assert_eq!(installed.identifier, "jargon");

    session.stop().await.unwrap();
}
