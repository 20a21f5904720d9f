//! Frame analysis: the model that turns a waveform window into per-frame
//! class scores, embeddings and a spectrogram for display.
//!
//! The session only depends on the [`FrameAnalyzer`] trait. A learned model lives
//! behind it in a host application; [`SpectrogramAnalyzer`] is a self-contained
//! implementation that scores frequency bands instead of sound classes.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Log offset applied to magnitudes before taking the logarithm.
const LOG_OFFSET: f32 = 0.001;

/// Output of one analysis pass over a loaded window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameAnalysis {
    /// Per-frame class scores: `scores[frame][class]`.
    pub scores: Vec<Vec<f32>>,
    /// Per-frame embedding vectors. Opaque to the session.
    pub embeddings: Vec<Vec<f32>>,
    /// Per-frame spectra: `spectrogram[frame][bin]`.
    pub spectrogram: Vec<Vec<f32>>,
    /// Label for each score column.
    pub class_names: Vec<String>,
}

impl FrameAnalysis {
    pub fn frame_count(&self) -> usize {
        self.scores.len()
    }

    /// Mean score of each class over all frames.
    pub fn mean_scores(&self) -> Vec<f32> {
        let classes = self.scores.first().map_or(0, Vec::len);
        let mut means = vec![0.0f32; classes];
        if self.scores.is_empty() {
            return means;
        }
        for frame in &self.scores {
            for (mean, score) in means.iter_mut().zip(frame) {
                *mean += score;
            }
        }
        let frames = self.scores.len() as f32;
        means.iter_mut().for_each(|m| *m /= frames);
        means
    }

    /// The `n` classes with the highest mean score, best first, as `(class, mean)`.
    pub fn top_classes(&self, n: usize) -> Vec<(usize, f32)> {
        let mut ranked: Vec<(usize, f32)> = self.mean_scores().into_iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }

    /// Label for a class index, falling back to the index itself.
    pub fn class_name(&self, class: usize) -> String {
        self.class_names
            .get(class)
            .cloned()
            .unwrap_or_else(|| format!("class {}", class))
    }
}

/// External model run on every freshly loaded window.
///
/// Failures are reported to the caller but never affect navigation state.
pub trait FrameAnalyzer: Send {
    fn analyze(&mut self, samples: &[f32], sample_rate: u32)
        -> Result<FrameAnalysis, AnalysisError>;
}

/// STFT analyzer: log-magnitude spectrogram, band-energy scores and per-band
/// log-energy embeddings, at one frame per `hop_secs`.
///
/// A hop longer than the FFT is covered by back-to-back FFT blocks whose
/// power spectra are averaged, so every sample contributes to some frame.
pub struct SpectrogramAnalyzer {
    fft_size: usize,
    hop_secs: f64,
    bands: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
}

impl SpectrogramAnalyzer {
    /// Build an analyzer; `fft_size` must be a power of two and `bands` at most
    /// `fft_size / 2` (both guaranteed by a validated [`AnalysisConfig`]).
    pub fn new(fft_size: usize, hop_secs: f64, bands: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(fft_size);

        // Hamming window to reduce spectral leakage
        let window = (0..fft_size)
            .map(|i| {
                0.54 - 0.46
                    * ((2.0 * std::f32::consts::PI * i as f32) / (fft_size as f32 - 1.0)).cos()
            })
            .collect();

        Self {
            fft_size,
            hop_secs,
            bands: bands.max(1),
            plan,
            window,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.fft_size, config.hop_secs, config.bands)
    }

    /// Bin ranges `[lo, hi)` of each band, log-spaced above DC.
    fn band_edges(&self) -> Vec<(usize, usize)> {
        let bins = self.fft_size / 2 + 1;
        let top = (bins - 1) as f64;
        let mut edges = Vec::with_capacity(self.bands);
        let mut lo = 1usize;
        for b in 0..self.bands {
            let hi = if b + 1 == self.bands {
                bins
            } else {
                (top.powf((b + 1) as f64 / self.bands as f64).round() as usize + 1)
                    .clamp(lo + 1, bins)
            };
            edges.push((lo.min(bins), hi));
            lo = hi;
        }
        edges
    }

    fn band_names(&self, edges: &[(usize, usize)], sample_rate: u32) -> Vec<String> {
        let hz_per_bin = sample_rate as f64 / self.fft_size as f64;
        edges
            .iter()
            .map(|&(lo, hi)| {
                format!(
                    "{:.0}-{:.0} Hz",
                    lo as f64 * hz_per_bin,
                    hi.saturating_sub(1) as f64 * hz_per_bin
                )
            })
            .collect()
    }
}

impl FrameAnalyzer for SpectrogramAnalyzer {
    fn analyze(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<FrameAnalysis, AnalysisError> {
        if samples.is_empty() {
            return Err(AnalysisError::InsufficientSamples {
                needed: 1,
                actual: 0,
            });
        }
        let hop = ((self.hop_secs * sample_rate as f64).round() as usize).max(1);
        // a frame spans at least one hop so no sample between frames is skipped
        let span = hop.max(self.fft_size);
        let blocks = span.div_ceil(self.fft_size);
        // short windows are zero-padded into a single frame
        let frames = if samples.len() <= span {
            1
        } else {
            1 + (samples.len() - span).div_ceil(hop)
        };

        let edges = self.band_edges();
        let mut input = self.plan.make_input_vec();
        let mut output: Vec<Complex<f32>> = self.plan.make_output_vec();
        let mut power = vec![0.0f32; output.len()];

        let mut analysis = FrameAnalysis {
            scores: Vec::with_capacity(frames),
            embeddings: Vec::with_capacity(frames),
            spectrogram: Vec::with_capacity(frames),
            class_names: self.band_names(&edges, sample_rate),
        };

        for frame in 0..frames {
            let start = frame * hop;
            power.iter_mut().for_each(|p| *p = 0.0);

            // back-to-back blocks, the last pulled back to end on the span
            for block in 0..blocks {
                let offset = start + (block * self.fft_size).min(span - self.fft_size);
                for (i, slot) in input.iter_mut().enumerate() {
                    *slot = samples.get(offset + i).copied().unwrap_or(0.0) * self.window[i];
                }

                self.plan
                    .process(&mut input, &mut output)
                    .map_err(|e| AnalysisError::Failed {
                        reason: e.to_string(),
                    })?;

                let scale = self.fft_size as f32;
                for (p, c) in power.iter_mut().zip(&output) {
                    *p += (c.norm() / scale).powi(2);
                }
            }

            let magnitudes: Vec<f32> = power
                .iter()
                .map(|p| (p / blocks as f32).sqrt())
                .collect();

            let band_power: Vec<f32> = edges
                .iter()
                .map(|&(lo, hi)| magnitudes[lo..hi].iter().map(|m| m * m).sum())
                .collect();
            let total: f32 = band_power.iter().sum();

            let scores = if total > 0.0 {
                band_power.iter().map(|p| p / total).collect()
            } else {
                vec![0.0; band_power.len()]
            };

            analysis.embeddings.push(
                band_power
                    .iter()
                    .map(|p| (p + LOG_OFFSET * LOG_OFFSET).ln())
                    .collect(),
            );
            analysis.spectrogram.push(
                magnitudes
                    .iter()
                    .map(|m| (m + LOG_OFFSET).ln())
                    .collect(),
            );
            analysis.scores.push(scores);
        }

        tracing::trace!(frames, hop, blocks, "Spectrogram analysis complete");
        Ok(analysis)
    }
}
