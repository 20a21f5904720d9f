//! Error types for the frame explorer.
//!
//! Every failure a session can hit is named here so hosts can decide how to
//! surface it: navigation failures leave the session untouched, a vanished
//! source tears it down, analysis failures are only warnings.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all frame explorer operations.
#[derive(Error, Debug)]
pub enum ExplorerError {
    /// Audio source / sink errors
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// Crop selection and playback preparation errors
    #[error("Crop error: {0}")]
    Crop(#[from] CropError),

    /// Frame analysis errors
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    /// Navigation state errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio source and sink errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to load WAV file '{path}': {source}")]
    LoadFailed { path: PathBuf, source: hound::Error },

    #[error("Invalid sample rate: {rate} Hz (must be 8kHz-192kHz)")]
    InvalidSampleRate { rate: u32 },

    #[error("Audio source reports a sample rate of 0 Hz")]
    ZeroSampleRate,

    #[error("Unsupported channel count: {channels} (only mono/stereo supported)")]
    UnsupportedChannels { channels: u16 },

    #[error("Unsupported sample width: {bits} bits")]
    UnsupportedFormat { bits: u16 },

    #[error("Sample range [{start}, {start}+{count}) outside source of {length} samples")]
    OutOfRange { start: u64, count: usize, length: u64 },

    #[error("Short read: expected {expected} samples, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("Audio source '{path}' is no longer readable: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("Read cancelled")]
    Cancelled,

    #[error("Failed to write WAV file '{path}': {source}")]
    WriteFailed { path: PathBuf, source: hound::Error },

    #[error("Audio playback initialization failed: {reason}")]
    PlaybackInitFailed { reason: String },

    #[error("Playback is not available for this sink")]
    PlaybackUnsupported,
}

/// Crop selection errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CropError {
    #[error("Crop [{start}, {end}) is empty after clamping to the window")]
    EmptyRange { start: usize, end: usize },

    #[error("Selection of {len} samples is silent, cannot normalize")]
    SilentSelection { len: usize },

    #[error("Crop bounds must be finite times")]
    NonFiniteTime,
}

/// Frame analysis errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Frame analysis failed: {reason}")]
    Failed { reason: String },

    #[error("Insufficient samples for analysis: needed {needed}, got {actual}")]
    InsufficientSamples { needed: usize, actual: usize },
}

/// Navigation state errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("No window loaded (session is empty)")]
    NoWindow,

    #[error("Invalid window duration: {secs}s (must be finite and > 0)")]
    InvalidWindowDuration { secs: f64 },

    #[error("Window {index} out of range (file has {count} windows)")]
    WindowOutOfRange { index: usize, count: usize },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file '{path}': {source}")]
    LoadFailed {
        path: Box<PathBuf>,
        source: std::io::Error,
    },

    #[error("Invalid config format in '{path}': {source}")]
    InvalidFormat {
        path: Box<PathBuf>,
        source: toml::de::Error,
    },

    #[error("Config validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Failed to save config to '{path}': {source}")]
    SaveFailed {
        path: Box<PathBuf>,
        source: std::io::Error,
    },

    #[error("Config serialization failed: {source}")]
    SerializationFailed { source: toml::ser::Error },
}

/// Result type alias for frame explorer operations
pub type Result<T, E = ExplorerError> = std::result::Result<T, E>;

impl AudioError {
    /// True when the session can no longer use its source and must be reopened
    pub fn is_fatal(&self) -> bool {
        matches!(self, AudioError::SourceUnavailable { .. })
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AudioError::LoadFailed { path, .. } => {
                format!("Could not open audio file '{}'", path.display())
            }
            AudioError::InvalidSampleRate { rate } => {
                format!("Audio file has unsupported sample rate: {} Hz", rate)
            }
            AudioError::ZeroSampleRate => "Audio has no sample rate".to_string(),
            AudioError::UnsupportedChannels { channels } => {
                format!("Audio file has unsupported {} channels", channels)
            }
            AudioError::UnsupportedFormat { bits } => {
                format!("Audio file uses unsupported {}-bit samples", bits)
            }
            AudioError::OutOfRange { .. } | AudioError::ShortRead { .. } => {
                "Requested audio lies outside the file".to_string()
            }
            AudioError::SourceUnavailable { path, .. } => {
                format!("Audio file '{}' disappeared, please reopen it", path.display())
            }
            AudioError::Cancelled => "Loading was cancelled".to_string(),
            AudioError::WriteFailed { path, .. } => {
                format!("Could not save audio to '{}'", path.display())
            }
            AudioError::PlaybackInitFailed { .. } => {
                "Could not initialize audio playback device".to_string()
            }
            AudioError::PlaybackUnsupported => "Playback is not available".to_string(),
        }
    }
}

impl CropError {
    /// Get suggested recovery action
    pub fn recovery_hint(&self) -> Option<&str> {
        match self {
            CropError::EmptyRange { .. } => Some("Select a range that overlaps the current window"),
            CropError::SilentSelection { .. } => {
                Some("Selection is silent; play or export it without normalization")
            }
            CropError::NonFiniteTime => None,
        }
    }
}

impl ExplorerError {
    /// True when the error ended the session (it must be opened again)
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExplorerError::Audio(e) if e.is_fatal())
    }
}
