//! Preparing a crop for playback or export.
//!
//! Silent selections are never divided by zero: [`normalize_for_playback`]
//! reports [`CropError::SilentSelection`] and leaves the fallback (usually
//! playing the crop unmodified) to the caller. Exports are written raw.

use crate::crop::CropRange;
use crate::error::CropError;

/// Owned copy of the cropped samples.
///
/// The copy outlives the window it came from, so a later reload cannot
/// invalidate it.
pub fn extract(window: &[f32], crop: CropRange) -> Vec<f32> {
    let end = crop.end.min(window.len());
    let start = crop.start.min(end);
    window[start..end].to_vec()
}

/// Peak absolute amplitude of a selection.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

/// Scale a selection so its peak absolute amplitude is 1.0.
///
/// # Errors
///
/// [`CropError::SilentSelection`] when every sample is zero (or the selection is empty).
pub fn normalize_for_playback(mut samples: Vec<f32>) -> Result<Vec<f32>, CropError> {
    let peak = peak(&samples);
    if peak == 0.0 {
        return Err(CropError::SilentSelection { len: samples.len() });
    }
    samples.iter_mut().for_each(|s| *s /= peak);
    Ok(samples)
}
