//! Time formatting, parsing, and range arithmetic
//!
//! All positions and durations are seconds as `f64`. Non-finite and
//! negative inputs are tolerated everywhere and normalized to zero so a
//! misbehaving surface can never poison derived state.

use serde::{Deserialize, Serialize};

/// Format a position as `M:SS`, or `H:MM:SS` once it reaches an hour
///
/// Negative, NaN, and infinite inputs render as `0:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }

    let total = seconds.floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Parse `SS`, `M:SS`, or `H:MM:SS` back into seconds
///
/// Returns `None` for anything that is not one to three colon-separated
/// non-negative numbers.
pub fn parse_time(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut seconds = 0.0;
    for part in parts {
        let value: f64 = part.trim().parse().ok()?;
        if value < 0.0 || !value.is_finite() {
            return None;
        }
        seconds = seconds * 60.0 + value;
    }
    Some(seconds)
}

/// Percentage of `whole` covered by `part`, clamped to 0..=100
///
/// A zero, negative, or non-finite `whole` yields 0 rather than NaN or
/// infinity, so percent fields stay presentable while duration is
/// still unknown.
pub fn ratio_percent(part: f64, whole: f64) -> f64 {
    if !part.is_finite() || !whole.is_finite() || whole <= 0.0 {
        return 0.0;
    }
    ((part / whole) * 100.0).clamp(0.0, 100.0)
}

/// Clamp a seek target into the seekable window
///
/// While duration is unknown (zero or non-finite) only the lower bound
/// applies.
pub fn clamp_time(position: f64, duration: f64) -> f64 {
    if !position.is_finite() {
        return 0.0;
    }
    let lower = position.max(0.0);
    if duration.is_finite() && duration > 0.0 {
        lower.min(duration)
    } else {
        lower
    }
}

/// Sorted, disjoint set of `(start, end)` intervals in seconds
///
/// Mirrors the buffered-ranges shape surfaces report. Construction
/// normalizes arbitrary input: invalid pairs are dropped, the rest are
/// sorted and overlapping or touching ranges are merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeRanges(Vec<(f64, f64)>);

impl TimeRanges {
    /// Empty range set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a normalized range set from raw pairs
    pub fn from_pairs(pairs: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut valid: Vec<(f64, f64)> = pairs
            .into_iter()
            .filter(|(start, end)| start.is_finite() && end.is_finite() && end > start)
            .map(|(start, end)| (start.max(0.0), end))
            .filter(|(start, end)| end > start)
            .collect();

        valid.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut merged: Vec<(f64, f64)> = Vec::with_capacity(valid.len());
        for (start, end) in valid {
            match merged.last_mut() {
                Some(last) if start <= last.1 => {
                    if end > last.1 {
                        last.1 = end;
                    }
                }
                _ => merged.push((start, end)),
            }
        }

        Self(merged)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[(f64, f64)] {
        &self.0
    }

    /// End of the furthest range, if any
    ///
    /// This is the value progress bars and buffered-percent derivation
    /// use: how far ahead data is available, regardless of gaps.
    pub fn end(&self) -> Option<f64> {
        self.0.last().map(|(_, end)| *end)
    }

    /// Whether `position` falls inside any range
    pub fn contains(&self, position: f64) -> bool {
        self.0
            .iter()
            .any(|(start, end)| position >= *start && position < *end)
    }

    /// Total seconds covered across all ranges
    pub fn total(&self) -> f64 {
        self.0.iter().map(|(start, end)| end - start).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_sub_hour_times() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(30.0), "0:30");
        assert_eq!(format_time(90.0), "1:30");
        assert_eq!(format_time(599.9), "9:59");
    }

    #[test]
    fn format_hour_and_above() {
        assert_eq!(format_time(3600.0), "1:00:00");
        assert_eq!(format_time(3661.0), "1:01:01");
        assert_eq!(format_time(7325.0), "2:02:05");
    }

    #[test]
    fn format_tolerates_garbage() {
        assert_eq!(format_time(-5.0), "0:00");
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(f64::INFINITY), "0:00");
    }

    #[test]
    fn parse_round_trips_formatted_values() {
        for seconds in [0.0, 30.0, 90.0, 3661.0] {
            let text = format_time(seconds);
            assert_eq!(parse_time(&text), Some(seconds));
        }
    }

    #[test]
    fn parse_accepts_bare_seconds() {
        assert_eq!(parse_time("45"), Some(45.0));
        assert_eq!(parse_time(" 1:05 "), Some(65.0));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert_eq!(parse_time(""), None);
        assert_eq!(parse_time("abc"), None);
        assert_eq!(parse_time("1:2:3:4"), None);
        assert_eq!(parse_time("-1:00"), None);
        assert_eq!(parse_time("1::30"), None);
    }

    #[test]
    fn percent_handles_unknown_duration() {
        assert_eq!(ratio_percent(60.0, 0.0), 0.0);
        assert_eq!(ratio_percent(60.0, -1.0), 0.0);
        assert_eq!(ratio_percent(60.0, f64::NAN), 0.0);
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(ratio_percent(60.0, 120.0), 50.0);
        assert_eq!(ratio_percent(150.0, 120.0), 100.0);
        assert_eq!(ratio_percent(-10.0, 120.0), 0.0);
    }

    #[test]
    fn clamp_respects_known_duration() {
        assert_eq!(clamp_time(-3.0, 120.0), 0.0);
        assert_eq!(clamp_time(60.0, 120.0), 60.0);
        assert_eq!(clamp_time(300.0, 120.0), 120.0);
    }

    #[test]
    fn clamp_without_duration_only_floors() {
        assert_eq!(clamp_time(300.0, 0.0), 300.0);
        assert_eq!(clamp_time(-1.0, 0.0), 0.0);
        assert_eq!(clamp_time(f64::NAN, 120.0), 0.0);
    }

    #[test]
    fn ranges_merge_overlapping_and_touching() {
        let ranges = TimeRanges::from_pairs([(10.0, 20.0), (0.0, 5.0), (5.0, 8.0), (18.0, 25.0)]);
        assert_eq!(ranges.as_slice(), &[(0.0, 8.0), (10.0, 25.0)]);
        assert_eq!(ranges.end(), Some(25.0));
    }

    #[test]
    fn ranges_drop_invalid_pairs() {
        let ranges = TimeRanges::from_pairs([(5.0, 5.0), (8.0, 2.0), (f64::NAN, 10.0), (1.0, 2.0)]);
        assert_eq!(ranges.as_slice(), &[(1.0, 2.0)]);
    }

    #[test]
    fn ranges_contains_and_total() {
        let ranges = TimeRanges::from_pairs([(0.0, 10.0), (20.0, 30.0)]);
        assert!(ranges.contains(5.0));
        assert!(!ranges.contains(15.0));
        assert!(!ranges.contains(30.0));
        assert_eq!(ranges.total(), 20.0);
    }
}
