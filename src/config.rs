//! Application configuration system with TOML persistence.
//!
//! Supports loading from file with fallback to sensible defaults.

use crate::error::ConfigError;
use crate::source::WaveformChannel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Window navigation configuration
    pub navigation: NavigationConfig,

    /// Frame analysis configuration
    pub analysis: AnalysisConfig,

    /// Crop export configuration
    pub export: ExportConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Window navigation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Window duration in seconds
    pub window_secs: f64,

    /// Channel used for stereo files
    pub channel: WaveformChannel,
}

/// Built-in spectrogram analyzer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Run the analyzer on every loaded window
    pub enabled: bool,

    /// FFT size (must be power of 2)
    pub fft_size: usize,

    /// Hop between analysis frames in seconds
    pub hop_secs: f64,

    /// Number of frequency bands scored per frame
    pub bands: usize,

    /// Number of top-scoring classes to report
    pub top_n: usize,
}

/// Sample encoding for exported crops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Int16,
    Float32,
}

/// Crop export configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExportConfig {
    /// Sample encoding of written WAV files
    pub sample_format: ExportFormat,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics collection
    pub enabled: bool,

    /// Histogram precision (significant value digits)
    pub histogram_precision: u8,

    /// Maximum histogram value in milliseconds
    pub histogram_max_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            window_secs: 30.0,
            channel: WaveformChannel::Left,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fft_size: 1024,
            hop_secs: 0.1,
            bands: 10,
            top_n: 10,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            histogram_precision: 2,
            histogram_max_ms: 60_000,
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::LoadFailed {
            path: Box::new(path.to_path_buf()),
            source,
        })?;

        let config: Self =
            toml::from_str(&contents).map_err(|source| ConfigError::InvalidFormat {
                path: Box::new(path.to_path_buf()),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load_from_file(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::SaveFailed {
                path: Box::new(path.to_path_buf()),
                source,
            })?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|source| ConfigError::SerializationFailed { source })?;

        std::fs::write(path, contents).map_err(|source| ConfigError::SaveFailed {
            path: Box::new(path.to_path_buf()),
            source,
        })
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("frame-explorer");

        config_dir.join("config.toml")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let window_secs = self.navigation.window_secs;
        if !window_secs.is_finite() || window_secs <= 0.0 {
            return Err(ConfigError::ValidationFailed {
                reason: format!("Window duration {}s must be finite and > 0", window_secs),
            });
        }

        let analysis = &self.analysis;
        if !analysis.fft_size.is_power_of_two() || analysis.fft_size < 4 {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "FFT size {} must be a power of 2 (at least 4)",
                    analysis.fft_size
                ),
            });
        }

        if !analysis.hop_secs.is_finite() || analysis.hop_secs <= 0.0 {
            return Err(ConfigError::ValidationFailed {
                reason: format!("Hop {}s must be finite and > 0", analysis.hop_secs),
            });
        }

        if analysis.bands == 0 || analysis.bands > analysis.fft_size / 2 {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "Band count {} out of range 1-{}",
                    analysis.bands,
                    analysis.fft_size / 2
                ),
            });
        }

        if analysis.top_n == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "Top class count must be > 0".to_string(),
            });
        }

        if !(1..=5).contains(&self.metrics.histogram_precision) {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "Histogram precision {} out of range 1-5",
                    self.metrics.histogram_precision
                ),
            });
        }

        if self.metrics.histogram_max_ms < 2 {
            return Err(ConfigError::ValidationFailed {
                reason: "Histogram max must be >= 2ms".to_string(),
            });
        }

        Ok(())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".config"))
                })
        }

        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }

        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            None
        }
    }
}
