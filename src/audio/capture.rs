//! Live microphone capture using CPAL.

use crate::audio::route::{AudioInputDescriptor, AudioPortType};
use crate::audio::source::AudioSource;
use crate::defaults;
use crate::error::{Result, SessionError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::{Arc, Mutex};

/// Quiet down JACK/ALSA/PipeWire chatter that CPAL triggers while probing
/// audio backends.
///
/// # Safety
/// Modifies environment variables; callers must invoke this before spawning
/// any threads.
pub fn suppress_audio_warnings() {
    // SAFETY: called at startup before any threads are spawned
    unsafe {
        std::env::set_var("JACK_NO_START_SERVER", "1");
        std::env::set_var("JACK_NO_AUDIO_RESERVATION", "1");
        std::env::set_var("PIPEWIRE_DEBUG", "0");
        std::env::set_var("ALSA_DEBUG", "0");
        std::env::set_var("PW_LOG", "0");
    }
}

/// Server-style devices that respect the desktop's input selection.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "pulseaudio"];

/// Device name patterns that are never useful for speech input.
const FILTERED_PATTERNS: &[&str] = &[
    "surround", "front:", "rear:", "center:", "side:", "hdmi", "s/pdif", "digital output",
];

fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS.iter().any(|p| lower.contains(p))
}

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES.iter().any(|p| lower.contains(p))
}

/// Lists usable input device names, preferred devices first.
pub fn list_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| SessionError::AudioCapture {
            message: format!("failed to enumerate input devices: {e}"),
        })?;

    let mut preferred = Vec::new();
    let mut rest = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }
            if is_preferred_device(&name) {
                preferred.push(name);
            } else {
                rest.push(name);
            }
        }
    }
    preferred.extend(rest);
    Ok(preferred)
}

fn find_device(device_name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    if let Some(name) = device_name {
        let devices = host
            .input_devices()
            .map_err(|e| SessionError::AudioCapture {
                message: format!("failed to enumerate input devices: {e}"),
            })?;
        for device in devices {
            if let Ok(dev_name) = device.name()
                && dev_name == name
            {
                return Ok(device);
            }
        }
        return Err(SessionError::AudioDeviceNotFound {
            device: name.to_string(),
        });
    }

    // Prefer a sound-server device so the desktop's input selection applies.
    if let Ok(devices) = host.input_devices() {
        for device in devices {
            if let Ok(name) = device.name()
                && is_preferred_device(&name)
            {
                return Ok(device);
            }
        }
    }

    host.default_input_device()
        .ok_or_else(|| SessionError::AudioDeviceNotFound {
            device: "default".to_string(),
        })
}

/// Descriptor for the device a live session would capture from.
pub fn current_input_descriptor(device_name: Option<&str>) -> Result<AudioInputDescriptor> {
    let device = find_device(device_name)?;
    let name = device.name().map_err(|e| SessionError::AudioCapture {
        message: format!("failed to read device name: {e}"),
    })?;
    Ok(AudioInputDescriptor::new(&name, AudioPortType::Unknown))
}

/// Wrapper making cpal::Stream Send.
///
/// SAFETY: the stream is only touched under the Mutex in CpalAudioSource, so
/// access is exclusive even when the source moves between threads.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Live capture source producing 16-bit PCM at 16kHz mono.
///
/// Tries an i16 16kHz mono config first, then f32, then falls back to the
/// device's native config with software channel mixing and resampling.
pub struct CpalAudioSource {
    device: cpal::Device,
    stream: Arc<Mutex<Option<SendableStream>>>,
    // cpal invokes the data callback on its own realtime thread; chunks
    // cross over to the session's polling thread through this channel.
    samples_tx: Sender<Vec<i16>>,
    samples_rx: Receiver<Vec<i16>>,
    sample_rate: u32,
}

impl CpalAudioSource {
    /// Opens the named device, or the best default when `device_name` is None.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let device = find_device(device_name)?;
        let (samples_tx, samples_rx) = unbounded();
        Ok(Self {
            device,
            stream: Arc::new(Mutex::new(None)),
            samples_tx,
            samples_rx,
            sample_rate: defaults::SAMPLE_RATE,
        })
    }

    fn build_stream(&self) -> Result<cpal::Stream> {
        let preferred_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            tracing::warn!(error = %err, "audio stream error");
        };

        let tx = self.samples_tx.clone();
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                tx.send(data.to_vec()).ok();
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        let tx = self.samples_tx.clone();
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let converted: Vec<i16> = data
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .collect();
                tx.send(converted).ok();
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        self.build_stream_native()
    }

    /// Captures at the device's native config and converts in software.
    fn build_stream_native(&self) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let default_config =
            self.device
                .default_input_config()
                .map_err(|e| SessionError::AudioCapture {
                    message: format!("failed to query default input config: {e}"),
                })?;

        let native_rate = default_config.sample_rate().0;
        let native_channels = default_config.channels() as usize;
        let target_rate = self.sample_rate;
        let stream_config: cpal::StreamConfig = default_config.clone().into();

        tracing::debug!(
            channels = native_channels,
            rate = native_rate,
            format = ?default_config.sample_format(),
            "capturing at native format with software conversion"
        );

        let err_callback = |err| {
            tracing::warn!(error = %err, "audio stream error");
        };

        let tx = self.samples_tx.clone();

        match default_config.sample_format() {
            SampleFormat::I16 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let converted =
                            mix_and_resample(data, native_channels, native_rate, target_rate);
                        tx.send(converted).ok();
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| SessionError::AudioCapture {
                    message: format!("failed to build native i16 stream: {e}"),
                }),
            SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let i16_data: Vec<i16> = data
                            .iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                            .collect();
                        let converted =
                            mix_and_resample(&i16_data, native_channels, native_rate, target_rate);
                        tx.send(converted).ok();
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| SessionError::AudioCapture {
                    message: format!("failed to build native f32 stream: {e}"),
                }),
            fmt => Err(SessionError::AudioCapture {
                message: format!("unsupported native sample format: {fmt:?}"),
            }),
        }
    }
}

/// Mix multi-channel audio to mono and resample to the target rate.
fn mix_and_resample(
    samples: &[i16],
    channels: usize,
    source_rate: u32,
    target_rate: u32,
) -> Vec<i16> {
    let mono: Vec<i16> = if channels == 1 {
        samples.to_vec()
    } else {
        samples
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect()
    };

    if source_rate == target_rate {
        mono
    } else {
        crate::audio::wav::resample(&mono, source_rate, target_rate)
    }
}

impl AudioSource for CpalAudioSource {
    fn start(&mut self) -> Result<()> {
        {
            let stream_guard = self.stream.lock().map_err(|e| SessionError::AudioCapture {
                message: format!("failed to lock stream: {e}"),
            })?;
            if stream_guard.is_some() {
                return Ok(());
            }
        }

        let stream = self.build_stream()?;
        stream.play().map_err(|e| SessionError::AudioCapture {
            message: format!("failed to start audio stream: {e}"),
        })?;

        let mut stream_guard = self.stream.lock().map_err(|e| SessionError::AudioCapture {
            message: format!("failed to lock stream: {e}"),
        })?;
        *stream_guard = Some(SendableStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut stream_guard = self.stream.lock().map_err(|e| SessionError::AudioCapture {
            message: format!("failed to lock stream: {e}"),
        })?;

        if let Some(stream) = stream_guard.take() {
            stream.0.pause().map_err(|e| SessionError::AudioCapture {
                message: format!("failed to stop audio stream: {e}"),
            })?;
        }
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        let mut samples = Vec::new();
        for chunk in self.samples_rx.try_iter() {
            samples.extend_from_slice(&chunk);
        }
        Ok(samples)
    }
}
