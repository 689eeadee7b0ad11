//! Timestamp Parsing and Trailing Windows

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::VecDeque;

const FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parse a timestamp in any of the accepted layouts.
///
/// Offsets are dropped after conversion to UTC; date-only values mean
/// midnight. Returns `None` when nothing matches.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Minutes elapsed from `earlier` to `later`
pub(crate) fn minutes_between(earlier: NaiveDateTime, later: NaiveDateTime) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 60_000.0
}

/// Trailing mean over the last `window` samples, requiring one present value.
///
/// Missing samples (NaN) occupy a slot in the window but are excluded from
/// the mean.
#[derive(Debug, Clone)]
pub struct RollingMean {
    window: usize,
    samples: VecDeque<f64>,
}

impl RollingMean {
    /// Create a rolling mean over `window` samples
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: VecDeque::with_capacity(window),
        }
    }

    /// Push a sample and return the current mean
    pub fn push(&mut self, value: f64) -> f64 {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(value);

        let (sum, count) = self
            .samples
            .iter()
            .filter(|v| !v.is_nan())
            .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));

        if count == 0 {
            f64::NAN
        } else {
            sum / count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_formats() {
        let a = parse_timestamp("2024-03-01 08:15:30").unwrap();
        assert_eq!((a.hour(), a.minute(), a.second()), (8, 15, 30));
        assert!(parse_timestamp("2024-03-01T08:15:30").is_some());
        assert!(parse_timestamp("2024-03-01T08:15:30Z").is_some());
        assert!(parse_timestamp("2024-03-01 08:15").is_some());
        assert!(parse_timestamp("03/01/2024 08:15").is_some());
        assert_eq!(parse_timestamp("2024-03-01").unwrap().hour(), 0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_minutes_between() {
        let a = parse_timestamp("2024-03-01 08:00:00").unwrap();
        let b = parse_timestamp("2024-03-01 08:07:30").unwrap();
        assert!((minutes_between(a, b) - 7.5).abs() < 1e-12);
    }

    #[test]
    fn test_rolling_mean_window() {
        let mut rolling = RollingMean::new(3);
        assert_eq!(rolling.push(3.0), 3.0);
        assert_eq!(rolling.push(6.0), 4.5);
        assert_eq!(rolling.push(9.0), 6.0);
        assert_eq!(rolling.push(12.0), 9.0);
    }

    #[test]
    fn test_rolling_mean_skips_missing() {
        let mut rolling = RollingMean::new(3);
        assert!(rolling.push(f64::NAN).is_nan());
        assert_eq!(rolling.push(4.0), 4.0);
        assert_eq!(rolling.push(8.0), 6.0);
    }
}
