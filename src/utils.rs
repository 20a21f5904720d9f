//! Utility functions for displaying session positions

/// Format duration in seconds to MM:SS.SS format
pub fn format_duration(duration_secs: f64) -> String {
    let duration_secs = duration_secs.max(0.0);
    let minutes = (duration_secs / 60.0) as u64;
    let seconds = duration_secs % 60.0;
    format!("{:02}:{:05.2}", minutes, seconds)
}

/// Format a `(start, end)` interval as `MM:SS.SS - MM:SS.SS`
pub fn format_range((start, end): (f64, f64)) -> String {
    format!("{} - {}", format_duration(start), format_duration(end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_zero() {
        assert_eq!(format_duration(0.0), "00:00.00");
    }

    #[test]
    fn test_format_duration_seconds_only() {
        assert_eq!(format_duration(45.67), "00:45.67");
    }

    #[test]
    fn test_format_duration_minutes_and_seconds() {
        assert_eq!(format_duration(125.45), "02:05.45");
    }

    #[test]
    fn test_format_duration_long() {
        // 1 hour, 1 minute, 1.25 seconds shows as 61 minutes
        assert_eq!(format_duration(3661.25), "61:01.25");
    }

    #[test]
    fn test_format_range() {
        assert_eq!(format_range((60.0, 62.5)), "01:00.00 - 01:02.50");
    }
}
