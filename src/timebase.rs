//! Conversions between sample indices and time offsets.
//!
//! Every time value a session reports is derived from an integer sample
//! position through these functions; nothing accumulates floating point
//! deltas across navigation steps.

/// Products closer than this to an integer are treated as that integer.
///
/// `n / r * r` can land a hair below `n` in binary floating point, which a bare
/// `floor` would turn into `n - 1`. Scaled up for very long files.
const SNAP_EPSILON: f64 = 1e-6;

/// Convert a time offset to a sample index, rounding toward negative infinity.
///
/// Negative times map to negative indices; callers clamp.
pub fn to_sample(time_secs: f64, sample_rate: u32) -> i64 {
    let exact = time_secs * sample_rate as f64;
    let nearest = exact.round();
    let tolerance = SNAP_EPSILON.max(exact.abs() * 8.0 * f64::EPSILON);
    if (exact - nearest).abs() < tolerance {
        nearest as i64
    } else {
        exact.floor() as i64
    }
}

/// Convert a sample index to a time offset in seconds.
pub fn to_time(sample_index: u64, sample_rate: u32) -> f64 {
    sample_index as f64 / sample_rate as f64
}

/// Window size in samples for a requested duration: rounded, never below one.
pub fn window_samples_for(window_secs: f64, sample_rate: u32) -> u64 {
    let samples = (window_secs * sample_rate as f64).round();
    if samples < 1.0 {
        1
    } else {
        samples as u64
    }
}
