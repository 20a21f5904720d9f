// Library interface for Frame Explorer components

pub mod analyzer;
pub mod batch;
pub mod config;
pub mod crop;
pub mod error;
pub mod metrics;
pub mod playback;
pub mod session;
pub mod sink;
pub mod source;
pub mod timebase;
pub mod utils;

// Test fixtures for synthetic audio generation
pub mod test_fixtures;

// Re-export commonly used types
pub use analyzer::{FrameAnalysis, FrameAnalyzer, SpectrogramAnalyzer};
pub use config::AppConfig;
pub use crop::CropRange;
pub use error::{AudioError, CropError, ExplorerError, Result};
pub use session::{Session, Step};
pub use source::{AudioSource, MemorySource, WavFileSource, WaveformChannel};
