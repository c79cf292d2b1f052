//! Audio input route descriptions and change notifications.
//!
//! Route-change notifications are platform dependent; on platforms without
//! them, a session simply has no route monitor and the audio-input stream
//! stays silent.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Port type of a capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioPortType {
    BuiltInMicrophone,
    Headset,
    Bluetooth,
    Usb,
    LineIn,
    Unknown,
}

/// Metadata describing the currently active capture device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioInputDescriptor {
    /// Human-readable device name.
    pub name: String,
    /// Port type, where the platform exposes it.
    pub port: AudioPortType,
}

impl AudioInputDescriptor {
    /// Creates a descriptor.
    pub fn new(name: &str, port: AudioPortType) -> Self {
        Self {
            name: name.to_string(),
            port,
        }
    }
}

/// Source of audio route-change notifications.
///
/// The session relays the receiver's events onto its broadcast stream; it
/// never owns or interprets them.
pub trait RouteMonitor: Send + Sync {
    /// Subscribe to route changes for the lifetime of the session.
    fn subscribe(&self) -> mpsc::Receiver<AudioInputDescriptor>;
}

/// Route monitor for tests: routes are pushed by hand.
pub struct MockRouteMonitor {
    tx: std::sync::Mutex<Vec<mpsc::Sender<AudioInputDescriptor>>>,
}

impl MockRouteMonitor {
    pub fn new() -> Self {
        Self {
            tx: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Pushes a route change to every subscriber.
    pub fn push(&self, descriptor: AudioInputDescriptor) {
        let senders = self
            .tx
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        for tx in senders.iter() {
            let _ = tx.try_send(descriptor.clone());
        }
    }
}

impl Default for MockRouteMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteMonitor for MockRouteMonitor {
    fn subscribe(&self) -> mpsc::Receiver<AudioInputDescriptor> {
        let (tx, rx) = mpsc::channel(16);
        self.tx
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(tx);
        rx
    }
}
