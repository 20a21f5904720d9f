//! Synthetic audio test fixtures for development and testing
//!
//! Deterministic signals, temporary WAV files, and stand-ins for the external
//! collaborators (analyzer, flaky sources) so sessions can be exercised
//! without real recordings or a trained model.

use crate::analyzer::{FrameAnalysis, FrameAnalyzer};
use crate::error::{AnalysisError, AudioError};
use crate::sink::quantize_i16;
use crate::source::{check_range, AudioSource};
use std::f32::consts::PI;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Generate a pure sine wave at the given frequency
///
/// # Example
/// ```
/// use frame_explorer::test_fixtures::generate_sine_wave;
/// // 1 second of A4 (440Hz) at half volume
/// let tone = generate_sine_wave(440.0, 1.0, 16000, 0.5);
/// assert_eq!(tone.len(), 16000);
/// ```
pub fn generate_sine_wave(
    frequency: f32,
    duration_secs: f32,
    sample_rate: u32,
    amplitude: f32,
) -> Vec<f32> {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            amplitude * (2.0 * PI * frequency * t).sin()
        })
        .collect()
}

/// Generate pseudo-random white noise
///
/// Deterministic noise based on sample index for reproducible tests.
pub fn generate_white_noise(duration_secs: f32, sample_rate: u32, amplitude: f32) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let num_samples = (duration_secs * sample_rate as f32) as usize;
    (0..num_samples)
        .map(|i| {
            let mut hasher = DefaultHasher::new();
            i.hash(&mut hasher);
            let hash = hasher.finish();
            let normalized = ((hash % 2000) as f32 / 1000.0) - 1.0;
            amplitude * normalized
        })
        .collect()
}

/// Sample `i` holds `i / len`, so every window has distinct, checkable content.
pub fn ramp(len: usize) -> Vec<f32> {
    (0..len).map(|i| i as f32 / len as f32).collect()
}

/// Write samples to a temporary 16-bit PCM WAV file.
///
/// `samples` are interleaved when `channels > 1`.
pub fn create_test_wav_file(
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> tempfile::NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".wav")
        .tempfile()
        .expect("create temp file");

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(file.path(), spec).expect("create wav writer");
    for &sample in samples {
        writer
            .write_sample(quantize_i16(sample))
            .expect("write sample");
    }
    writer.finalize().expect("finalize wav");
    file
}

/// Analyzer returning canned scores: one frame per 160 samples, three classes,
/// with class 0 scoring the window's mean absolute amplitude.
#[derive(Debug, Default)]
pub struct StubAnalyzer {
    pub calls: usize,
}

impl FrameAnalyzer for StubAnalyzer {
    fn analyze(
        &mut self,
        samples: &[f32],
        _sample_rate: u32,
    ) -> Result<FrameAnalysis, AnalysisError> {
        self.calls += 1;
        let frames = samples.len().div_ceil(160).max(1);
        let level = samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len().max(1) as f32;
        Ok(FrameAnalysis {
            scores: vec![vec![level, 0.5, 0.25]; frames],
            embeddings: vec![vec![level]; frames],
            spectrogram: vec![vec![0.0; 4]; frames],
            class_names: vec!["level".into(), "half".into(), "quarter".into()],
        })
    }
}

/// Analyzer that always fails.
#[derive(Debug, Default)]
pub struct FailingAnalyzer;

impl FrameAnalyzer for FailingAnalyzer {
    fn analyze(
        &mut self,
        _samples: &[f32],
        _sample_rate: u32,
    ) -> Result<FrameAnalysis, AnalysisError> {
        Err(AnalysisError::Failed {
            reason: "model unavailable".to_string(),
        })
    }
}

/// Switches shared between a test and a [`FlakySource`] it has handed away.
#[derive(Debug, Clone, Default)]
pub struct SourceControls {
    cancel: Arc<AtomicBool>,
    vanish: Arc<AtomicBool>,
    reads: Arc<AtomicUsize>,
}

impl SourceControls {
    /// Make subsequent reads fail with [`AudioError::Cancelled`].
    pub fn cancel_reads(&self, on: bool) {
        self.cancel.store(on, Ordering::SeqCst);
    }

    /// Make subsequent reads fail with [`AudioError::SourceUnavailable`].
    pub fn vanish(&self) {
        self.vanish.store(true, Ordering::SeqCst);
    }

    /// Number of successful reads so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

/// In-memory source whose reads can be cancelled or made to fail at will.
#[derive(Debug)]
pub struct FlakySource {
    samples: Vec<f32>,
    sample_rate: u32,
    controls: SourceControls,
}

impl FlakySource {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> (Self, SourceControls) {
        let controls = SourceControls::default();
        (
            Self {
                samples,
                sample_rate,
                controls: controls.clone(),
            },
            controls,
        )
    }
}

impl AudioSource for FlakySource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn length(&self) -> u64 {
        self.samples.len() as u64
    }

    fn read(&mut self, start: u64, count: usize) -> Result<Vec<f32>, AudioError> {
        if self.controls.vanish.load(Ordering::SeqCst) {
            return Err(AudioError::SourceUnavailable {
                path: PathBuf::from("flaky"),
                reason: "source removed".to_string(),
            });
        }
        if self.controls.cancel.load(Ordering::SeqCst) {
            return Err(AudioError::Cancelled);
        }
        check_range(start, count, self.length())?;
        self.controls.reads.fetch_add(1, Ordering::SeqCst);
        let start = start as usize;
        Ok(self.samples[start..start + count].to_vec())
    }
}
