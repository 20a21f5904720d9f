//! Windowed navigation and crop session for one open audio source.
//!
//! A [`Session`] is either empty or positioned on a window that starts at a
//! multiple of the window size. Every move fetches the new window into a local
//! buffer first and only commits it once the read succeeded, so a failed or
//! cancelled read leaves the previous window, crop and analysis untouched.
//! Time values are always derived from the integer sample position.

use crate::analyzer::{FrameAnalysis, FrameAnalyzer};
use crate::crop::CropRange;
use crate::error::{AnalysisError, AudioError, Result, SessionError};
use crate::metrics::SessionMetrics;
use crate::playback;
use crate::sink::AudioSink;
use crate::source::AudioSource;
use crate::timebase::{to_time, window_samples_for};
use std::path::Path;
use std::time::Instant;

/// Outcome of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A new window was loaded.
    Moved,
    /// Already at the first/last window; nothing changed.
    BoundaryReached,
}

impl Step {
    pub fn boundary_reached(self) -> bool {
        self == Step::BoundaryReached
    }
}

/// Samples materialized for the active window. Replaced wholesale on every move.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedWindow {
    pub start_sample: u64,
    pub samples: Vec<f32>,
}

impl LoadedWindow {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn end_sample(&self) -> u64 {
        self.start_sample + self.samples.len() as u64
    }
}

struct Positioned {
    source: Box<dyn AudioSource>,
    sample_rate: u32,
    total_samples: u64,
    window_samples: u64,
    window: LoadedWindow,
    crop: CropRange,
    analysis: Option<FrameAnalysis>,
    analysis_error: Option<AnalysisError>,
}

enum State {
    Empty,
    Positioned(Box<Positioned>),
}

/// A fetched window that has not been committed yet.
struct Fetched {
    window: LoadedWindow,
    analysis: Option<FrameAnalysis>,
    analysis_error: Option<AnalysisError>,
}

/// Navigation, crop and playback state for one open file.
///
/// Not meant for shared mutation: hosts that drive it from several threads must
/// serialize access themselves.
pub struct Session {
    analyzer: Option<Box<dyn FrameAnalyzer>>,
    state: State,
    metrics: SessionMetrics,
}

impl Default for Session {
    fn default() -> Self {
        Self::without_analyzer()
    }
}

impl Session {
    /// Session that runs `analyzer` on every loaded window.
    pub fn new(analyzer: Box<dyn FrameAnalyzer>) -> Self {
        Self {
            analyzer: Some(analyzer),
            state: State::Empty,
            metrics: SessionMetrics::default(),
        }
    }

    /// Session that only navigates and crops.
    pub fn without_analyzer() -> Self {
        Self {
            analyzer: None,
            state: State::Empty,
            metrics: SessionMetrics::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: SessionMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Open `source` with windows of `window_secs` and load the first window.
    ///
    /// A zero-length source leaves the session empty. On any error the session
    /// keeps whatever it had open before.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidWindowDuration`] for non-positive or non-finite
    /// durations, [`AudioError::ZeroSampleRate`] for a zero sample rate, and
    /// any error from reading the first window.
    pub fn open(&mut self, mut source: Box<dyn AudioSource>, window_secs: f64) -> Result<()> {
        if !window_secs.is_finite() || window_secs <= 0.0 {
            return Err(SessionError::InvalidWindowDuration { secs: window_secs }.into());
        }
        let sample_rate = source.sample_rate();
        if sample_rate == 0 {
            return Err(AudioError::ZeroSampleRate.into());
        }

        let total_samples = source.length();
        if total_samples == 0 {
            tracing::info!(source = %source.describe(), "Opened empty source, no windows");
            self.state = State::Empty;
            return Ok(());
        }

        let window_samples = window_samples_for(window_secs, sample_rate);
        let count = window_samples.min(total_samples) as usize;
        let fetched = Self::fetch(
            source.as_mut(),
            self.analyzer.as_deref_mut(),
            &mut self.metrics,
            0,
            count,
        )?;

        tracing::info!(
            source = %source.describe(),
            sample_rate,
            total_samples,
            window_samples,
            windows = total_samples.div_ceil(window_samples),
            "Session opened"
        );

        self.state = State::Positioned(Box::new(Positioned {
            source,
            sample_rate,
            total_samples,
            window_samples,
            crop: CropRange::full(fetched.window.len()),
            window: fetched.window,
            analysis: fetched.analysis,
            analysis_error: fetched.analysis_error,
        }));
        Ok(())
    }

    /// Drop the open source and return to the empty state.
    pub fn close(&mut self) {
        if matches!(self.state, State::Positioned(_)) {
            tracing::info!("Session closed");
        }
        self.state = State::Empty;
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.state, State::Empty)
    }

    /// Move one window forward. A no-op at the last window.
    pub fn advance(&mut self) -> Result<Step> {
        let p = self.positioned()?;
        let candidate = p.window.start_sample + p.window_samples;
        if candidate >= p.total_samples {
            tracing::debug!(start_sample = p.window.start_sample, "Last window reached");
            self.metrics.record_boundary_hit();
            return Ok(Step::BoundaryReached);
        }
        self.load_at(candidate)?;
        Ok(Step::Moved)
    }

    /// Move one window back. A no-op at the first window.
    pub fn retreat(&mut self) -> Result<Step> {
        let p = self.positioned()?;
        let Some(candidate) = p.window.start_sample.checked_sub(p.window_samples) else {
            tracing::debug!("First window reached");
            self.metrics.record_boundary_hit();
            return Ok(Step::BoundaryReached);
        };
        self.load_at(candidate)?;
        Ok(Step::Moved)
    }

    /// Jump directly to window `index` (0-based).
    ///
    /// Asking for the window already loaded reports `BoundaryReached` and does
    /// not reload.
    ///
    /// # Errors
    ///
    /// [`SessionError::WindowOutOfRange`] when `index >= window_count()`; the
    /// session is left unchanged.
    pub fn seek_window(&mut self, index: usize) -> Result<Step> {
        let p = self.positioned()?;
        let count = Self::count_windows(p);
        if index >= count {
            return Err(SessionError::WindowOutOfRange { index, count }.into());
        }
        let start = index as u64 * p.window_samples;
        if start == p.window.start_sample {
            return Ok(Step::BoundaryReached);
        }
        self.load_at(start)?;
        Ok(Step::Moved)
    }

    /// Load-window procedure: fetch, then commit window, full crop and analysis.
    fn load_at(&mut self, start: u64) -> Result<()> {
        let State::Positioned(p) = &mut self.state else {
            return Err(SessionError::NoWindow.into());
        };
        let count = p.window_samples.min(p.total_samples - start) as usize;

        let fetched = match Self::fetch(
            p.source.as_mut(),
            self.analyzer.as_deref_mut(),
            &mut self.metrics,
            start,
            count,
        ) {
            Ok(fetched) => fetched,
            Err(e) => {
                if e.is_fatal() {
                    tracing::error!(error = %e, "Audio source lost, closing session");
                    self.state = State::Empty;
                }
                return Err(e);
            }
        };

        p.crop = CropRange::full(fetched.window.len());
        p.window = fetched.window;
        p.analysis = fetched.analysis;
        p.analysis_error = fetched.analysis_error;

        tracing::debug!(start_sample = start, count, "Window loaded");
        Ok(())
    }

    /// Read `count` samples at `start` and run the analyzer on them.
    ///
    /// Analyzer failures are captured in the result, read failures are returned.
    fn fetch(
        source: &mut dyn AudioSource,
        analyzer: Option<&mut (dyn FrameAnalyzer + 'static)>,
        metrics: &mut SessionMetrics,
        start: u64,
        count: usize,
    ) -> Result<Fetched> {
        let read_started = Instant::now();
        let read = source.read(start, count).and_then(|samples| {
            if samples.len() == count {
                Ok(samples)
            } else {
                Err(AudioError::ShortRead {
                    expected: count,
                    actual: samples.len(),
                })
            }
        });
        let samples = match read {
            Ok(samples) => samples,
            Err(e) => {
                metrics.record_read(read_started.elapsed(), false);
                tracing::warn!(start_sample = start, count, error = %e, "Window read failed");
                return Err(e.into());
            }
        };
        metrics.record_read(read_started.elapsed(), true);

        let (analysis, analysis_error) = match analyzer {
            None => (None, None),
            Some(analyzer) => {
                let analysis_started = Instant::now();
                let result = analyzer.analyze(&samples, source.sample_rate());
                metrics.record_analysis(analysis_started.elapsed(), result.is_ok());
                match result {
                    Ok(analysis) => (Some(analysis), None),
                    Err(e) => {
                        tracing::warn!(start_sample = start, error = %e, "Frame analysis failed");
                        (None, Some(e))
                    }
                }
            }
        };

        Ok(Fetched {
            window: LoadedWindow {
                start_sample: start,
                samples,
            },
            analysis,
            analysis_error,
        })
    }

    /// Select a sub-range of the loaded window from an absolute time interval.
    ///
    /// The ends may be given in either order. On error the previous crop stays.
    pub fn propose_crop(&mut self, t_min: f64, t_max: f64) -> Result<CropRange> {
        let State::Positioned(p) = &mut self.state else {
            return Err(SessionError::NoWindow.into());
        };
        match CropRange::propose(
            t_min,
            t_max,
            p.window.start_sample,
            p.window.len(),
            p.sample_rate,
        ) {
            Ok(crop) => {
                p.crop = crop;
                self.metrics.record_crop(true);
                tracing::debug!(start = crop.start, end = crop.end, "Crop selected");
                Ok(crop)
            }
            Err(e) => {
                self.metrics.record_crop(false);
                tracing::debug!(t_min, t_max, error = %e, "Crop rejected");
                Err(e.into())
            }
        }
    }

    /// Reset the crop to cover the whole loaded window.
    pub fn full_window(&mut self) -> Result<CropRange> {
        let State::Positioned(p) = &mut self.state else {
            return Err(SessionError::NoWindow.into());
        };
        p.crop = CropRange::full(p.window.len());
        Ok(p.crop)
    }

    /// Copy of the cropped samples.
    pub fn extract_crop(&self) -> Result<Vec<f32>> {
        let p = self.positioned()?;
        Ok(playback::extract(&p.window.samples, p.crop))
    }

    /// Cropped samples scaled to unit peak.
    ///
    /// # Errors
    ///
    /// [`crate::error::CropError::SilentSelection`] for an all-zero crop.
    pub fn prepare_playback(&self) -> Result<Vec<f32>> {
        Ok(playback::normalize_for_playback(self.extract_crop()?)?)
    }

    /// Normalize the crop and hand it to `sink` for playback.
    pub fn play_crop(&self, sink: &mut dyn AudioSink) -> Result<()> {
        let samples = self.prepare_playback()?;
        sink.play(&samples, self.positioned()?.sample_rate)?;
        Ok(())
    }

    /// Write the raw crop, tagged with the session sample rate, to `path`.
    pub fn export_crop(&mut self, sink: &mut dyn AudioSink, path: &Path) -> Result<()> {
        let samples = self.extract_crop()?;
        let sample_rate = self.positioned()?.sample_rate;
        sink.write(path, &samples, sample_rate)?;
        self.metrics.record_export();
        tracing::info!(path = %path.display(), samples = samples.len(), "Crop exported");
        Ok(())
    }

    /// `(start, end)` of the loaded window in seconds.
    pub fn current_window_bounds(&self) -> Option<(f64, f64)> {
        let p = self.positioned().ok()?;
        Some((
            to_time(p.window.start_sample, p.sample_rate),
            to_time(p.window.end_sample(), p.sample_rate),
        ))
    }

    /// `(start, end)` of the crop in absolute seconds.
    pub fn current_crop_bounds(&self) -> Option<(f64, f64)> {
        let p = self.positioned().ok()?;
        let base = p.window.start_sample;
        Some((
            to_time(base + p.crop.start as u64, p.sample_rate),
            to_time(base + p.crop.end as u64, p.sample_rate),
        ))
    }

    pub fn crop(&self) -> Option<CropRange> {
        self.positioned().ok().map(|p| p.crop)
    }

    pub fn window(&self) -> Option<&LoadedWindow> {
        self.positioned().ok().map(|p| &p.window)
    }

    pub fn analysis(&self) -> Option<&FrameAnalysis> {
        self.positioned().ok()?.analysis.as_ref()
    }

    /// Why the analyzer produced nothing for the current window, if it failed.
    pub fn analysis_error(&self) -> Option<&AnalysisError> {
        self.positioned().ok()?.analysis_error.as_ref()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.positioned().ok().map(|p| p.sample_rate)
    }

    pub fn total_samples(&self) -> u64 {
        self.positioned().map_or(0, |p| p.total_samples)
    }

    pub fn total_duration(&self) -> f64 {
        self.positioned()
            .map_or(0.0, |p| to_time(p.total_samples, p.sample_rate))
    }

    pub fn window_samples(&self) -> Option<u64> {
        self.positioned().ok().map(|p| p.window_samples)
    }

    /// Nominal window duration; the last window may be shorter.
    pub fn window_duration(&self) -> Option<f64> {
        self.positioned()
            .ok()
            .map(|p| to_time(p.window_samples, p.sample_rate))
    }

    pub fn window_index(&self) -> Option<usize> {
        self.positioned()
            .ok()
            .map(|p| (p.window.start_sample / p.window_samples) as usize)
    }

    pub fn window_count(&self) -> usize {
        self.positioned().map_or(0, Self::count_windows)
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    fn count_windows(p: &Positioned) -> usize {
        p.total_samples.div_ceil(p.window_samples) as usize
    }

    fn positioned(&self) -> Result<&Positioned, SessionError> {
        match &self.state {
            State::Positioned(p) => Ok(&**p),
            State::Empty => Err(SessionError::NoWindow),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CropError, ExplorerError};
    use crate::source::MemorySource;
    use crate::test_fixtures::{ramp, FailingAnalyzer, StubAnalyzer};

    fn open_ramp(len: usize, sample_rate: u32, window_secs: f64) -> Session {
        let mut session = Session::new(Box::new(StubAnalyzer::default()));
        session
            .open(Box::new(MemorySource::new(ramp(len), sample_rate)), window_secs)
            .unwrap();
        session
    }

    #[test]
    fn test_open_loads_first_window() {
        let session = open_ramp(1000, 100, 3.0);
        assert_eq!(session.window_samples(), Some(300));
        assert_eq!(session.window().unwrap().samples, ramp(1000)[..300].to_vec());
        assert_eq!(session.crop(), Some(CropRange::full(300)));
        assert_eq!(session.current_window_bounds(), Some((0.0, 3.0)));
        assert!(session.analysis().is_some());
        assert_eq!(session.window_count(), 4);
    }

    #[test]
    fn test_open_empty_source() {
        let mut session = Session::without_analyzer();
        session
            .open(Box::new(MemorySource::new(Vec::<f32>::new(), 16000)), 30.0)
            .unwrap();
        assert!(session.is_empty());
        assert!(matches!(
            session.advance(),
            Err(ExplorerError::Session(SessionError::NoWindow))
        ));
        assert_eq!(session.current_window_bounds(), None);
        assert_eq!(session.window_count(), 0);
    }

    #[test]
    fn test_open_rejects_bad_window_duration() {
        let mut session = Session::without_analyzer();
        for secs in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = session.open(Box::new(MemorySource::new(ramp(10), 100)), secs);
            assert!(matches!(
                result,
                Err(ExplorerError::Session(SessionError::InvalidWindowDuration { .. }))
            ));
        }
        assert!(session.is_empty());
    }

    #[test]
    fn test_open_rejects_zero_sample_rate() {
        let mut session = open_ramp(100, 10, 1.0);
        let result = session.open(Box::new(MemorySource::new(ramp(10), 0)), 1.0);
        assert!(matches!(
            result,
            Err(ExplorerError::Audio(AudioError::ZeroSampleRate))
        ));
        assert_eq!(session.sample_rate(), Some(10));
    }

    #[test]
    fn test_tiny_window_rounds_up_to_one_sample() {
        let session = open_ramp(10, 100, 0.001);
        assert_eq!(session.window_samples(), Some(1));
        assert_eq!(session.window_count(), 10);
    }

    #[test]
    fn test_seek_window() {
        let mut session = open_ramp(1000, 100, 3.0);
        assert_eq!(session.seek_window(3).unwrap(), Step::Moved);
        assert_eq!(session.window().unwrap().len(), 100);
        assert_eq!(session.window_index(), Some(3));

        assert_eq!(session.seek_window(3).unwrap(), Step::BoundaryReached);
        assert!(matches!(
            session.seek_window(4),
            Err(ExplorerError::Session(SessionError::WindowOutOfRange { index: 4, count: 4 }))
        ));
        assert_eq!(session.window_index(), Some(3));
    }

    #[test]
    fn test_analysis_failure_keeps_navigation() {
        let mut session = Session::new(Box::new(FailingAnalyzer));
        session
            .open(Box::new(MemorySource::new(ramp(500), 100)), 2.0)
            .unwrap();
        assert!(session.analysis().is_none());
        assert!(session.analysis_error().is_some());

        assert_eq!(session.advance().unwrap(), Step::Moved);
        assert_eq!(session.window().unwrap().start_sample, 200);
        assert_eq!(session.metrics().summary().analysis_failures, 2);
    }

    #[test]
    fn test_rejected_crop_keeps_previous() {
        let mut session = open_ramp(1000, 100, 3.0);
        session.propose_crop(1.0, 2.0).unwrap();
        let err = session.propose_crop(5.0, 6.0).unwrap_err();
        assert!(matches!(
            err,
            ExplorerError::Crop(CropError::EmptyRange { .. })
        ));
        assert_eq!(session.crop(), Some(CropRange { start: 100, end: 200 }));
        assert_eq!(session.current_crop_bounds(), Some((1.0, 2.0)));
    }

    #[test]
    fn test_close() {
        let mut session = open_ramp(100, 10, 1.0);
        session.close();
        assert!(session.is_empty());
        assert!(session.extract_crop().is_err());
    }
}
