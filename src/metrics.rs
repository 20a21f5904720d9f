//! Session metrics collection and reporting.
//!
//! Uses HDR histograms for accurate latency percentiles.

use crate::config::MetricsConfig;
use crate::error::ConfigError;
use hdrhistogram::Histogram;
use std::fmt;
use std::time::{Duration, Instant};

/// Counters and latency histograms for one session
#[derive(Debug)]
pub struct SessionMetrics {
    enabled: bool,

    /// Source read latency histogram (microseconds)
    read_latency_us: Histogram<u64>,

    /// Analyzer latency histogram (microseconds)
    analysis_latency_us: Histogram<u64>,

    windows_loaded: u64,
    read_failures: u64,
    boundary_hits: u64,
    analysis_failures: u64,
    crops_accepted: u64,
    crops_rejected: u64,
    exports: u64,

    started: Instant,
}

/// Summary of key metrics for display
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    /// P50 read latency (milliseconds)
    pub read_p50_ms: f64,

    /// P99 read latency (milliseconds)
    pub read_p99_ms: f64,

    /// P50 analysis latency (milliseconds)
    pub analysis_p50_ms: f64,

    /// P99 analysis latency (milliseconds)
    pub analysis_p99_ms: f64,

    pub windows_loaded: u64,
    pub read_failures: u64,
    pub boundary_hits: u64,
    pub analysis_failures: u64,
    pub crops_accepted: u64,
    pub crops_rejected: u64,
    pub exports: u64,

    /// Uptime in seconds
    pub uptime_secs: f64,
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new(&MetricsConfig::default()).expect("Default histogram bounds are valid")
    }
}

impl SessionMetrics {
    /// Create a collector with histogram bounds from `config`
    pub fn new(config: &MetricsConfig) -> Result<Self, ConfigError> {
        let max_us = config.histogram_max_ms.saturating_mul(1000);
        let histogram = || {
            Histogram::new_with_bounds(1, max_us, config.histogram_precision).map_err(|e| {
                ConfigError::ValidationFailed {
                    reason: format!("Invalid histogram bounds: {}", e),
                }
            })
        };

        Ok(Self {
            enabled: config.enabled,
            read_latency_us: histogram()?,
            analysis_latency_us: histogram()?,
            windows_loaded: 0,
            read_failures: 0,
            boundary_hits: 0,
            analysis_failures: 0,
            crops_accepted: 0,
            crops_rejected: 0,
            exports: 0,
            started: Instant::now(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a source read
    pub fn record_read(&mut self, duration: Duration, success: bool) {
        if !self.enabled {
            return;
        }
        if success {
            self.windows_loaded += 1;
            Self::record_latency(&mut self.read_latency_us, duration);
        } else {
            self.read_failures += 1;
        }
    }

    /// Record an analyzer invocation
    pub fn record_analysis(&mut self, duration: Duration, success: bool) {
        if !self.enabled {
            return;
        }
        Self::record_latency(&mut self.analysis_latency_us, duration);
        if !success {
            self.analysis_failures += 1;
        }
    }

    /// Record a navigation no-op at the first or last window
    pub fn record_boundary_hit(&mut self) {
        if self.enabled {
            self.boundary_hits += 1;
        }
    }

    /// Record a crop proposal outcome
    pub fn record_crop(&mut self, accepted: bool) {
        if !self.enabled {
            return;
        }
        if accepted {
            self.crops_accepted += 1;
        } else {
            self.crops_rejected += 1;
        }
    }

    /// Record a written crop
    pub fn record_export(&mut self) {
        if self.enabled {
            self.exports += 1;
        }
    }

    fn record_latency(histogram: &mut Histogram<u64>, duration: Duration) {
        let us = (duration.as_micros() as u64).max(1);
        if let Err(e) = histogram.record(us.min(histogram.high())) {
            tracing::warn!("Failed to record latency: {}", e);
        }
    }

    /// Get current metrics summary
    pub fn summary(&self) -> MetricsSummary {
        let ms = |h: &Histogram<u64>, q: f64| h.value_at_quantile(q) as f64 / 1000.0;

        MetricsSummary {
            read_p50_ms: ms(&self.read_latency_us, 0.5),
            read_p99_ms: ms(&self.read_latency_us, 0.99),
            analysis_p50_ms: ms(&self.analysis_latency_us, 0.5),
            analysis_p99_ms: ms(&self.analysis_latency_us, 0.99),
            windows_loaded: self.windows_loaded,
            read_failures: self.read_failures,
            boundary_hits: self.boundary_hits,
            analysis_failures: self.analysis_failures,
            crops_accepted: self.crops_accepted,
            crops_rejected: self.crops_rejected,
            exports: self.exports,
            uptime_secs: self.started.elapsed().as_secs_f64(),
        }
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        self.read_latency_us.clear();
        self.analysis_latency_us.clear();
        self.windows_loaded = 0;
        self.read_failures = 0;
        self.boundary_hits = 0;
        self.analysis_failures = 0;
        self.crops_accepted = 0;
        self.crops_rejected = 0;
        self.exports = 0;
        self.started = Instant::now();
    }
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "read latency:     p50 {:.2}ms  p99 {:.2}ms",
            self.read_p50_ms, self.read_p99_ms
        )?;
        writeln!(
            f,
            "analysis latency: p50 {:.2}ms  p99 {:.2}ms",
            self.analysis_p50_ms, self.analysis_p99_ms
        )?;
        writeln!(
            f,
            "windows loaded: {}  read failures: {}  boundary hits: {}  analysis failures: {}",
            self.windows_loaded, self.read_failures, self.boundary_hits, self.analysis_failures
        )?;
        writeln!(
            f,
            "crops accepted: {}  rejected: {}  exports: {}",
            self.crops_accepted, self.crops_rejected, self.exports
        )?;
        write!(f, "uptime: {:.1}s", self.uptime_secs)
    }
}
