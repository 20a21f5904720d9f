use crate::config::ExportFormat;
use crate::error::AudioError;
use std::path::Path;

#[cfg(feature = "audio_playback")]
use std::sync::Arc;
#[cfg(feature = "audio_playback")]
use std::time::Duration;

#[cfg(feature = "audio_playback")]
use rodio::Source;

/// Destination for prepared crops: a playback device, a file, or both.
pub trait AudioSink {
    /// Start playing mono samples. May return before playback ends.
    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<(), AudioError>;

    /// Write mono samples to `path` as a WAV file tagged with `sample_rate`.
    fn write(&mut self, path: &Path, samples: &[f32], sample_rate: u32)
        -> Result<(), AudioError>;
}

/// Write-only sink backed by hound.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavSink {
    format: ExportFormat,
}

impl WavSink {
    pub fn new(format: ExportFormat) -> Self {
        Self { format }
    }
}

impl AudioSink for WavSink {
    fn play(&mut self, _samples: &[f32], _sample_rate: u32) -> Result<(), AudioError> {
        Err(AudioError::PlaybackUnsupported)
    }

    fn write(
        &mut self,
        path: &Path,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<(), AudioError> {
        write_wav(path, samples, sample_rate, self.format)
    }
}

/// Inverse of the `1 / 2^15` scaling [`crate::source::WavFileSource`] applies to
/// 16-bit input, so a sample read from a 16-bit file is written back unchanged.
/// Values past full scale saturate.
pub fn quantize_i16(sample: f32) -> i16 {
    (sample * 32768.0)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Encode mono samples to a WAV file.
pub fn write_wav(
    path: &Path,
    samples: &[f32],
    sample_rate: u32,
    format: ExportFormat,
) -> Result<(), AudioError> {
    let (bits_per_sample, sample_format) = match format {
        ExportFormat::Int16 => (16, hound::SampleFormat::Int),
        ExportFormat::Float32 => (32, hound::SampleFormat::Float),
    };
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample,
        sample_format,
    };
    let wrap = |source| AudioError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(wrap)?;
    for &sample in samples {
        match format {
            ExportFormat::Int16 => {
                writer.write_sample(quantize_i16(sample)).map_err(wrap)?;
            }
            ExportFormat::Float32 => writer.write_sample(sample).map_err(wrap)?,
        }
    }
    writer.finalize().map_err(wrap)?;

    tracing::info!(
        path = %path.display(),
        samples = samples.len(),
        sample_rate,
        ?format,
        "Wrote WAV file"
    );
    Ok(())
}

#[cfg(feature = "audio_playback")]
/// Audio source that plays from a shared buffer of f32 samples.
pub struct AudioBufferSource {
    /// Shared reference to the prepared crop.
    buffer: Arc<[f32]>,
    /// Sample rate in Hz.
    sample_rate: u32,
    /// Current read position.
    position: usize,
}

#[cfg(feature = "audio_playback")]
impl AudioBufferSource {
    /// Create a new mono AudioBufferSource.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::ZeroSampleRate`] if `sample_rate == 0`.
    pub fn new(buffer: Arc<[f32]>, sample_rate: u32) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::ZeroSampleRate);
        }

        Ok(Self {
            buffer,
            sample_rate,
            position: 0,
        })
    }
}

#[cfg(feature = "audio_playback")]
impl Iterator for AudioBufferSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.buffer.get(self.position).copied()?;
        self.position += 1;
        Some(sample)
    }
}

#[cfg(feature = "audio_playback")]
impl Source for AudioBufferSource {
    fn current_span_len(&self) -> Option<usize> {
        Some(self.buffer.len().saturating_sub(self.position))
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        let duration_secs = self.buffer.len() as f64 / self.sample_rate as f64;
        Some(Duration::from_secs_f64(duration_secs))
    }
}

/// Sink that plays through the default output device and writes with hound.
#[cfg(feature = "audio_playback")]
pub struct RodioSink {
    _stream: rodio::OutputStream,
    sink: rodio::Sink,
    format: ExportFormat,
}

#[cfg(feature = "audio_playback")]
impl RodioSink {
    /// Open the default output device.
    pub fn open_default(format: ExportFormat) -> Result<Self, AudioError> {
        let stream = rodio::OutputStreamBuilder::open_default_stream().map_err(|e| {
            AudioError::PlaybackInitFailed {
                reason: e.to_string(),
            }
        })?;
        let sink = rodio::Sink::connect_new(stream.mixer());
        tracing::info!("Audio output initialized");

        Ok(Self {
            _stream: stream,
            sink,
            format,
        })
    }

    /// Block until everything queued has played.
    pub fn wait_until_done(&self) {
        self.sink.sleep_until_end();
    }

    /// Drop anything still queued.
    pub fn stop(&self) {
        self.sink.stop();
    }
}

#[cfg(feature = "audio_playback")]
impl AudioSink for RodioSink {
    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<(), AudioError> {
        self.sink.stop();
        let source = AudioBufferSource::new(samples.into(), sample_rate)?;
        self.sink.append(source);
        self.sink.play();
        tracing::debug!(samples = samples.len(), sample_rate, "Playback started");
        Ok(())
    }

    fn write(
        &mut self,
        path: &Path,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<(), AudioError> {
        write_wav(path, samples, sample_rate, self.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_int16_export_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crop.wav");
        let samples = vec![0.0, 0.5, -0.5, 1.5, -1.0, 1.0 / 32768.0];

        WavSink::new(ExportFormat::Int16)
            .write(&path, &samples, 22050)
            .unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 22050);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        let written: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(written, vec![0, 16384, -16384, i16::MAX, i16::MIN, 1]);
    }

    #[test]
    fn test_float32_export_is_lossless() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crop.wav");
        let samples = vec![0.125, -0.75, 0.3333];

        WavSink::new(ExportFormat::Float32)
            .write(&path, &samples, 16000)
            .unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let written: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(written, samples);
    }

    #[test]
    fn test_wav_sink_cannot_play() {
        let mut sink = WavSink::default();
        assert!(matches!(
            sink.play(&[0.1], 16000),
            Err(AudioError::PlaybackUnsupported)
        ));
    }

    #[cfg(feature = "audio_playback")]
    #[test]
    fn test_buffer_source_yields_samples_once() {
        let source = AudioBufferSource::new(vec![0.1f32, 0.2].into(), 8000).unwrap();
        assert_eq!(source.channels(), 1);
        assert_eq!(source.current_span_len(), Some(2));
        assert_eq!(
            source.total_duration(),
            Some(Duration::from_secs_f64(2.0 / 8000.0))
        );
        assert_eq!(source.collect::<Vec<_>>(), vec![0.1, 0.2]);
        assert!(AudioBufferSource::new(vec![0.0f32].into(), 0).is_err());
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let result = WavSink::default().write(Path::new("/nonexistent/dir/out.wav"), &[0.1], 16000);
        assert!(matches!(result, Err(AudioError::WriteFailed { .. })));
    }
}
