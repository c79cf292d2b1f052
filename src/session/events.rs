//! Session event fan-out.
//!
//! A broadcast channel carries discrete change notifications to any number
//! of subscribers; slow subscribers lose old events rather than stalling the
//! session.

use crate::assets::DownloadProgress;
use crate::audio::AudioInputDescriptor;
use crate::defaults;
use crate::session::status::Status;
use tokio::sync::broadcast;

/// Discrete session notifications.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StatusChanged(Status),
    SpeechDetected(bool),
    AudioRouteChanged(AudioInputDescriptor),
    DownloadProgress(DownloadProgress),
}

/// Multi-subscriber event fan-out.
#[derive(Debug, Clone)]
pub struct EventEmitter<T: Clone> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> EventEmitter<T> {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(defaults::BROADCAST_BUFFER);
        Self { sender }
    }

    /// Opens a new subscription; only events emitted after this call are seen.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Emits an event. Silently drops it when nobody is listening.
    pub fn emit(&self, event: T) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_subscribers_receive_events() {
        let emitter: EventEmitter<SessionEvent> = EventEmitter::new();
        let mut first = emitter.subscribe();
        let mut second = emitter.subscribe();

        emitter.emit(SessionEvent::StatusChanged(Status::Preparing));

        assert!(matches!(
            first.recv().await.unwrap(),
            SessionEvent::StatusChanged(Status::Preparing)
        ));
        assert!(matches!(
            second.recv().await.unwrap(),
            SessionEvent::StatusChanged(Status::Preparing)
        ));
    }

    #[test]
    fn test_emit_without_subscribers_does_not_panic() {
        let emitter: EventEmitter<SessionEvent> = EventEmitter::new();
        assert_eq!(emitter.subscriber_count(), 0);
        emitter.emit(SessionEvent::SpeechDetected(true));
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let emitter: EventEmitter<SessionEvent> = EventEmitter::new();
        emitter.emit(SessionEvent::StatusChanged(Status::Transcribing));

        let mut late = emitter.subscribe();
        emitter.emit(SessionEvent::SpeechDetected(false));

        assert!(matches!(
            late.recv().await.unwrap(),
            SessionEvent::SpeechDetected(false)
        ));
    }
}
