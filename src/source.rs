use crate::error::AudioError;
use hound::{SampleFormat, WavReader as HoundReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A seekable, finite mono signal the session reads windows from.
///
/// Implementations may block, cache, or run reads on a helper thread, as long as
/// `read` returns exactly `count` samples that agree with the backing data, or
/// an error. A read that gives up early should return [`AudioError::Cancelled`].
pub trait AudioSource: Send {
    /// Sample rate in Hz; fixed for the source's lifetime.
    fn sample_rate(&self) -> u32;

    /// Total number of samples.
    fn length(&self) -> u64;

    /// Fetch `count` samples starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::OutOfRange`] when `start + count > length()`.
    fn read(&mut self, start: u64, count: usize) -> Result<Vec<f32>, AudioError>;

    /// Short human-readable origin, used in logs.
    fn describe(&self) -> String {
        "audio source".to_string()
    }
}

/// Bounds check shared by the built-in sources.
pub(crate) fn check_range(start: u64, count: usize, length: u64) -> Result<(), AudioError> {
    match start.checked_add(count as u64) {
        Some(end) if end <= length => Ok(()),
        _ => Err(AudioError::OutOfRange {
            start,
            count,
            length,
        }),
    }
}

/// Which channel of a stereo file feeds the session. Mono files ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum WaveformChannel {
    #[default]
    Left,
    Right,
}

impl WaveformChannel {
    fn index(self, channels: u16) -> usize {
        match self {
            WaveformChannel::Right if channels > 1 => 1,
            _ => 0,
        }
    }
}

/// In-memory source over a shared sample buffer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl MemorySource {
    pub fn new(samples: impl Into<Arc<[f32]>>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

impl AudioSource for MemorySource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn length(&self) -> u64 {
        self.samples.len() as u64
    }

    fn read(&mut self, start: u64, count: usize) -> Result<Vec<f32>, AudioError> {
        check_range(start, count, self.length())?;
        let start = start as usize;
        Ok(self.samples[start..start + count].to_vec())
    }

    fn describe(&self) -> String {
        format!("memory ({} samples)", self.samples.len())
    }
}

/// WAV file source that only materializes the requested range.
///
/// The header is validated once at open time. Each `read` reopens the file and
/// seeks, so a file that disappears mid-session is reported as
/// [`AudioError::SourceUnavailable`] on the next read instead of serving stale data.
///
/// Integer samples of any width up to 32 bits and 32-bit float samples are
/// normalized to `f32` in `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct WavFileSource {
    path: PathBuf,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
    sample_format: SampleFormat,
    frames: u64,
    channel: WaveformChannel,
}

impl WavFileSource {
    /// Open a WAV file and validate its header.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::LoadFailed`] if the file cannot be opened or parsed.
    /// Returns [`AudioError::UnsupportedChannels`] for files with > 2 channels.
    /// Returns [`AudioError::InvalidSampleRate`] for sample rates outside 8kHz-192kHz.
    /// Returns [`AudioError::UnsupportedFormat`] for integer widths above 32 bits
    /// or float widths other than 32.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use frame_explorer::source::{AudioSource, WavFileSource, WaveformChannel};
    ///
    /// let source = WavFileSource::open("recording.wav", WaveformChannel::Left)?;
    /// println!("{} samples at {} Hz", source.length(), source.sample_rate());
    /// # Ok::<(), frame_explorer::error::AudioError>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P, channel: WaveformChannel) -> Result<Self, AudioError> {
        let path = path.as_ref();
        let reader = HoundReader::open(path).map_err(|source| AudioError::LoadFailed {
            path: path.to_path_buf(),
            source,
        })?;

        let spec = reader.spec();

        if !(8000..=192_000).contains(&spec.sample_rate) {
            return Err(AudioError::InvalidSampleRate {
                rate: spec.sample_rate,
            });
        }

        if spec.channels != 1 && spec.channels != 2 {
            return Err(AudioError::UnsupportedChannels {
                channels: spec.channels,
            });
        }

        let supported = match spec.sample_format {
            SampleFormat::Int => (1..=32).contains(&spec.bits_per_sample),
            SampleFormat::Float => spec.bits_per_sample == 32,
        };
        if !supported {
            return Err(AudioError::UnsupportedFormat {
                bits: spec.bits_per_sample,
            });
        }

        let frames = reader.duration() as u64;

        tracing::info!(
            path = %path.display(),
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            bits = spec.bits_per_sample,
            frames,
            ?channel,
            "Opened WAV source"
        );

        Ok(Self {
            path: path.to_path_buf(),
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            sample_format: spec.sample_format,
            frames,
            channel,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    fn unavailable(&self, reason: impl ToString) -> AudioError {
        AudioError::SourceUnavailable {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl AudioSource for WavFileSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn length(&self) -> u64 {
        self.frames
    }

    fn read(&mut self, start: u64, count: usize) -> Result<Vec<f32>, AudioError> {
        check_range(start, count, self.frames)?;

        let mut reader = HoundReader::open(&self.path).map_err(|e| self.unavailable(e))?;
        // frames fit in u32 because hound reports duration as u32
        reader
            .seek(start as u32)
            .map_err(|e| self.unavailable(e))?;

        let channels = self.channels as usize;
        let pick = self.channel.index(self.channels);
        let wanted = count * channels;

        let interleaved: Vec<f32> = match self.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .take(wanted)
                .collect::<Result<_, _>>()
                .map_err(|e| self.unavailable(e))?,
            SampleFormat::Int => {
                let scale = (1u64 << (self.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .take(wanted)
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| self.unavailable(e))?
            }
        };

        if interleaved.len() < wanted {
            return Err(AudioError::ShortRead {
                expected: count,
                actual: interleaved.len() / channels,
            });
        }

        let samples: Vec<f32> = interleaved
            .chunks_exact(channels)
            .map(|frame| frame[pick])
            .collect();

        tracing::trace!(start, count, path = %self.path.display(), "Read WAV range");
        Ok(samples)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{create_test_wav_file, ramp};

    #[test]
    fn test_memory_source_reads_exact_range() {
        let mut source = MemorySource::new(ramp(100), 16000);
        assert_eq!(source.length(), 100);

        let samples = source.read(10, 5).unwrap();
        assert_eq!(samples, ramp(100)[10..15].to_vec());

        assert!(source.read(100, 0).unwrap().is_empty());
    }

    #[test]
    fn test_memory_source_rejects_out_of_range() {
        let mut source = MemorySource::new(ramp(100), 16000);
        assert!(matches!(
            source.read(96, 5),
            Err(AudioError::OutOfRange {
                start: 96,
                count: 5,
                length: 100
            })
        ));
        assert!(matches!(
            source.read(u64::MAX, 2),
            Err(AudioError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_mono_wav_source() {
        let signal: Vec<f32> = (0..1000).map(|i| (i as f32 / 1000.0) - 0.5).collect();
        let file = create_test_wav_file(&signal, 16000, 1);

        let mut source = WavFileSource::open(file.path(), WaveformChannel::Left).unwrap();
        assert_eq!(source.sample_rate(), 16000);
        assert_eq!(source.length(), 1000);

        let window = source.read(500, 10).unwrap();
        assert_eq!(window.len(), 10);
        for (i, sample) in window.iter().enumerate() {
            assert!((sample - signal[500 + i]).abs() < 1e-3);
        }
    }

    #[test]
    fn test_stereo_wav_channel_selection() {
        // interleaved L/R: left rises, right is constant
        let interleaved: Vec<f32> = (0..200)
            .flat_map(|i| [i as f32 / 400.0, -0.25])
            .collect();
        let file = create_test_wav_file(&interleaved, 44100, 2);

        let mut left = WavFileSource::open(file.path(), WaveformChannel::Left).unwrap();
        let mut right = WavFileSource::open(file.path(), WaveformChannel::Right).unwrap();
        assert_eq!(left.length(), 200);
        assert_eq!(left.channels(), 2);

        let l = left.read(100, 4).unwrap();
        let r = right.read(100, 4).unwrap();
        assert!((l[0] - 0.25).abs() < 1e-3);
        assert!(r.iter().all(|s| (s + 0.25).abs() < 1e-3));
    }

    #[test]
    fn test_wav_source_out_of_range() {
        let file = create_test_wav_file(&[0.1; 50], 16000, 1);
        let mut source = WavFileSource::open(file.path(), WaveformChannel::Left).unwrap();
        assert!(matches!(
            source.read(45, 10),
            Err(AudioError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_deleted_file_is_unavailable() {
        let file = create_test_wav_file(&[0.1; 50], 16000, 1);
        let mut source = WavFileSource::open(file.path(), WaveformChannel::Left).unwrap();
        file.close().unwrap();

        let err = source.read(0, 10).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_invalid_wav_file() {
        let result = WavFileSource::open("nonexistent_file.wav", WaveformChannel::Left);
        assert!(matches!(result, Err(AudioError::LoadFailed { .. })));
    }

    #[test]
    fn test_low_sample_rate_rejected() {
        let file = create_test_wav_file(&[0.0; 10], 4000, 1);
        assert!(matches!(
            WavFileSource::open(file.path(), WaveformChannel::Left),
            Err(AudioError::InvalidSampleRate { rate: 4000 })
        ));
    }
}
