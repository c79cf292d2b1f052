//! Audio capture: source trait, frame types, WAV file source, route changes.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod route;
pub mod source;
pub mod wav;

pub use route::{AudioInputDescriptor, AudioPortType, MockRouteMonitor, RouteMonitor};
pub use source::{AudioFrame, AudioSource, AudioSourceFactory, FramePhase, MockAudioSource};
pub use wav::WavAudioSource;
