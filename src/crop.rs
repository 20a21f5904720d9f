use crate::error::CropError;
use crate::timebase::{to_sample, to_time};

/// Sub-range of the loaded window in window-local sample offsets.
///
/// Always satisfies `start <= end <= window_len` for the window it was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRange {
    pub start: usize,
    pub end: usize,
}

impl CropRange {
    /// Selection covering an entire window of `window_len` samples.
    pub fn full(window_len: usize) -> Self {
        Self {
            start: 0,
            end: window_len,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Build a crop from a time interval in absolute file time.
    ///
    /// The interval may be given in either order. Both ends are converted to
    /// window-local offsets with the system-wide floor rule and clamped to the
    /// window.
    ///
    /// # Errors
    ///
    /// [`CropError::EmptyRange`] when the clamped range has no samples, and
    /// [`CropError::NonFiniteTime`] for NaN or infinite bounds.
    pub fn propose(
        t_min: f64,
        t_max: f64,
        window_start_sample: u64,
        window_len: usize,
        sample_rate: u32,
    ) -> Result<Self, CropError> {
        if !t_min.is_finite() || !t_max.is_finite() {
            return Err(CropError::NonFiniteTime);
        }

        let window_start_time = to_time(window_start_sample, sample_rate);
        let a = to_sample(t_min - window_start_time, sample_rate);
        let b = to_sample(t_max - window_start_time, sample_rate);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

        let clamp = |offset: i64| offset.clamp(0, window_len as i64) as usize;
        let (start, end) = (clamp(lo), clamp(hi));

        if start == end {
            return Err(CropError::EmptyRange { start, end });
        }
        Ok(Self { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reversed_drag_at_window_start() {
        let crop = CropRange::propose(5.0, 2.0, 0, 480_000, 16000).unwrap();
        assert_eq!(crop, CropRange { start: 32000, end: 80000 });
        assert_eq!(crop, CropRange::propose(2.0, 5.0, 0, 480_000, 16000).unwrap());
    }

    #[test]
    fn test_offsets_are_window_local() {
        // window starting at 30s
        let crop = CropRange::propose(31.0, 32.5, 480_000, 480_000, 16000).unwrap();
        assert_eq!(crop.start, 16000);
        assert_eq!(crop.end, 40000);
    }

    #[test]
    fn test_clamps_to_window() {
        let crop = CropRange::propose(-3.0, 100.0, 0, 40000, 16000).unwrap();
        assert_eq!(crop, CropRange::full(40000));

        let crop = CropRange::propose(62.0, 70.0, 960_000, 40000, 16000).unwrap();
        assert_eq!(crop.start, 32000);
        assert_eq!(crop.end, 40000);
    }

    #[test]
    fn test_empty_ranges_rejected() {
        assert_eq!(
            CropRange::propose(1.0, 1.0, 0, 1000, 1000),
            Err(CropError::EmptyRange { start: 1000, end: 1000 })
        );
        // entirely before the window
        assert_eq!(
            CropRange::propose(0.0, 10.0, 480_000, 480_000, 16000),
            Err(CropError::EmptyRange { start: 0, end: 0 })
        );
        // sub-sample selection floors to the same offset
        assert!(CropRange::propose(0.10001, 0.10002, 0, 16000, 16000).is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        assert_eq!(
            CropRange::propose(f64::NAN, 1.0, 0, 100, 100),
            Err(CropError::NonFiniteTime)
        );
        assert_eq!(
            CropRange::propose(0.0, f64::INFINITY, 0, 100, 100),
            Err(CropError::NonFiniteTime)
        );
    }

    #[test]
    fn test_bounds_invariant_holds() {
        let len = 1234;
        for i in -20..40 {
            for j in -20..40 {
                let (t0, t1) = (i as f64 * 0.037, j as f64 * 0.041);
                if let Ok(crop) = CropRange::propose(t0, t1, 0, len, 1000) {
                    assert!(crop.start < crop.end && crop.end <= len);
                    assert_eq!(Ok(crop), CropRange::propose(t1, t0, 0, len, 1000));
                }
            }
        }
    }
}
