//! WAV file audio source for file transcription.

use crate::audio::source::AudioSource;
use crate::defaults::SAMPLE_RATE;
use crate::error::{Result, SessionError};
use std::io::Read;
use std::path::Path;

/// Audio source backed by decoded WAV data.
///
/// Accepts arbitrary sample rates and channel counts, resampling to
/// 16kHz mono before playback into the pipeline.
#[derive(Debug)]
pub struct WavAudioSource {
    samples: Vec<i16>,
    position: usize,
    chunk_size: usize,
}

impl WavAudioSource {
    /// Creates a source from a file on disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(Box::new(std::io::BufReader::new(file)))
    }

    /// Creates a source from any reader.
    pub fn from_reader(reader: Box<dyn Read + Send>) -> Result<Self> {
        let mut wav_reader =
            hound::WavReader::new(reader).map_err(|e| SessionError::UnsupportedFormat {
                path: format!("failed to parse WAV data: {e}"),
            })?;

        let spec = wav_reader.spec();
        let source_rate = spec.sample_rate;
        let source_channels = spec.channels;

        let raw_samples: Vec<i16> = wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| SessionError::BufferConversion {
                message: format!("failed to read WAV samples: {e}"),
            })?;

        let mono_samples = if source_channels == 2 {
            raw_samples
                .chunks_exact(2)
                .map(|chunk| {
                    let left = chunk[0] as i32;
                    let right = chunk[1] as i32;
                    ((left + right) / 2) as i16
                })
                .collect()
        } else {
            raw_samples
        };

        let samples = if source_rate != SAMPLE_RATE {
            resample(&mono_samples, source_rate, SAMPLE_RATE)
        } else {
            mono_samples
        };

        // 100ms chunks at 16kHz
        let chunk_size = 1600;

        Ok(Self {
            samples,
            position: 0,
            chunk_size,
        })
    }

    /// Total duration of the decoded audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / SAMPLE_RATE as f64
    }
}

/// Reads only the WAV header of a file and returns its duration in seconds.
///
/// Used to validate file length before any engine resources are allocated.
pub fn probe_duration_secs(path: &Path) -> Result<f64> {
    let reader = hound::WavReader::open(path).map_err(|e| SessionError::UnsupportedFormat {
        path: format!("{}: {e}", path.display()),
    })?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(SessionError::UnsupportedFormat {
            path: format!("{}: zero sample rate", path.display()),
        });
    }
    let frames = reader.duration() as f64;
    Ok(frames / spec.sample_rate as f64)
}

impl AudioSource for WavAudioSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.position >= self.samples.len() {
            return Ok(Vec::new());
        }

        let end = std::cmp::min(self.position + self.chunk_size, self.samples.len());
        let chunk = self.samples[self.position..end].to_vec();
        self.position = end;

        Ok(chunk)
    }

    fn is_finite(&self) -> bool {
        true
    }
}

/// Simple linear interpolation resampling.
pub(crate) fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_16khz_mono_passes_through_unchanged() {
        let input_samples = vec![100i16, 200, 300, 400, 500];
        let wav_data = make_wav_data(16000, 1, &input_samples);

        let source = WavAudioSource::from_reader(Box::new(Cursor::new(wav_data))).unwrap();

        assert_eq!(source.samples, input_samples);
        assert!(source.is_finite());
    }

    #[test]
    fn test_stereo_downmixes_to_mono() {
        // pairs: (100, 200), (300, 400), (500, 600)
        let stereo_samples = vec![100i16, 200, 300, 400, 500, 600];
        let wav_data = make_wav_data(16000, 2, &stereo_samples);

        let source = WavAudioSource::from_reader(Box::new(Cursor::new(wav_data))).unwrap();

        assert_eq!(source.samples, vec![150i16, 350, 550]);
    }

    #[test]
    fn test_48khz_resamples_to_16khz() {
        let input_samples = vec![1000i16; 48000]; // 1 second
        let wav_data = make_wav_data(48000, 1, &input_samples);

        let source = WavAudioSource::from_reader(Box::new(Cursor::new(wav_data))).unwrap();

        assert!(source.samples.len() >= 15900 && source.samples.len() <= 16100);
        assert!(source.samples.iter().all(|&s| (900..=1100).contains(&s)));
    }

    #[test]
    fn test_read_samples_returns_100ms_chunks_then_empty() {
        let input_samples = vec![1i16; 5000];
        let wav_data = make_wav_data(16000, 1, &input_samples);

        let mut source = WavAudioSource::from_reader(Box::new(Cursor::new(wav_data))).unwrap();

        assert_eq!(source.read_samples().unwrap().len(), 1600);
        assert_eq!(source.read_samples().unwrap().len(), 1600);
        assert_eq!(source.read_samples().unwrap().len(), 1600);
        // remainder: 5000 - 3*1600 = 200
        assert_eq!(source.read_samples().unwrap().len(), 200);
        assert_eq!(source.read_samples().unwrap().len(), 0);
    }

    #[test]
    fn test_invalid_wav_data_is_rejected() {
        let invalid_data = vec![0u8, 1, 2, 3, 4, 5];

        let result = WavAudioSource::from_reader(Box::new(Cursor::new(invalid_data)));

        match result {
            Err(SessionError::UnsupportedFormat { path }) => {
                assert!(path.contains("failed to parse WAV"), "got: {path}");
            }
            other => panic!("expected UnsupportedFormat error, got {other:?}"),
        }
    }

    #[test]
    fn test_duration_secs_reflects_resampled_length() {
        let input_samples = vec![0i16; 32000]; // 2 seconds at 16kHz
        let wav_data = make_wav_data(16000, 1, &input_samples);

        let source = WavAudioSource::from_reader(Box::new(Cursor::new(wav_data))).unwrap();

        assert!((source.duration_secs() - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_probe_duration_reads_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let wav_data = make_wav_data(8000, 1, &vec![0i16; 8000 * 3]); // 3 seconds
        std::fs::write(&path, wav_data).unwrap();

        let duration = probe_duration_secs(&path).unwrap();
        assert!((duration - 3.0).abs() < 0.01, "got {duration}");
    }

    #[test]
    fn test_probe_duration_rejects_non_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        std::fs::write(&path, b"not a wav file at all").unwrap();

        assert!(probe_duration_secs(&path).is_err());
    }

    #[test]
    fn test_resample_upsample_interpolates() {
        let samples = vec![0i16, 1000, 2000];
        let resampled = resample(&samples, 8000, 16000);

        assert_eq!(resampled.len(), 6);
        assert_eq!(resampled[0], 0);
        assert!(resampled[1] > 0 && resampled[1] < 1000);
        assert_eq!(resampled[2], 1000);
    }

    #[test]
    fn test_resample_handles_empty_and_single_sample() {
        assert_eq!(resample(&[], 16000, 8000).len(), 0);

        let single = resample(&[100i16], 16000, 8000);
        assert_eq!(single, vec![100i16]);
    }
}
