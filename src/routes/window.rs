//! Day-granularity date windows used by list routes.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use std::fmt;

/// Wire format of a window bound.
pub const DATE_FORMAT: &str = "%Y%m%d%H%M";

/// Length of the window used when no end date is given.
pub const DEFAULT_WINDOW_DAYS: i64 = 365;

const DATE_TOKEN_LEN: usize = 12;

/// Start/end pair of a list request, canonicalized to UTC calendar days.
///
/// Two requests that differ only in sub-day timestamp noise produce the
/// same window and therefore the same route string.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl DateWindow {
    /// Canonical window against the current clock.
    pub fn canonical(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self::canonical_at(start, end, Utc::now())
    }

    /// Canonical window against an explicit instant.
    ///
    /// A missing start defaults to `now`. A missing end defaults to
    /// `now + 365 days`, even when a start was given.
    pub fn canonical_at(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::canonical_with_span(start, end, now, DEFAULT_WINDOW_DAYS)
    }

    pub fn canonical_with_span(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        span_days: i64,
    ) -> Self {
        let start = start.unwrap_or(now);
        let end = end.unwrap_or_else(|| now + Duration::days(span_days));
        Self {
            start: start_of_day(start),
            end: start_of_day(end),
        }
    }

    /// Window from already-canonical bounds, kept exactly as given.
    pub fn from_bounds(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// `start/end` route segment.
    pub fn route_segment(&self) -> String {
        format!("{}/{}", format_bound(self.start), format_bound(self.end))
    }
}

impl fmt::Debug for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DateWindow({})", self.route_segment())
    }
}

pub fn format_bound(bound: NaiveDateTime) -> String {
    bound.format(DATE_FORMAT).to_string()
}

/// Strict parse of a `yyyyMMddHHmm` token.
///
/// Returns `None` unless the token is exactly twelve ASCII digits naming a
/// real calendar minute.
pub fn parse_bound(token: &str) -> Option<NaiveDateTime> {
    if token.len() != DATE_TOKEN_LEN || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let field = |range: std::ops::Range<usize>| token[range].parse::<u32>().ok();

    let year = i32::try_from(field(0..4)?).ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4..6)?, field(6..8)?)?;
    date.and_hms_opt(field(8..10)?, field(10..12)?, 0)
}

fn start_of_day(at: DateTime<Utc>) -> NaiveDateTime {
    at.date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_else(|| at.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_defaults_cover_one_year() {
        let now = utc(2024, 1, 1, 15, 42, 7);
        let window = DateWindow::canonical_at(None, None, now);
        assert_eq!(window.route_segment(), "202401010000/202412310000");
    }

    #[test]
    fn test_sub_day_noise_collapses() {
        let a = DateWindow::canonical_at(None, None, utc(2024, 3, 10, 8, 0, 1));
        let b = DateWindow::canonical_at(None, None, utc(2024, 3, 10, 8, 0, 4));
        let c = DateWindow::canonical_at(Some(utc(2024, 3, 10, 23, 59, 59)), None, utc(2024, 3, 10, 8, 0, 4));
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_end_defaults_from_now_not_start() {
        let now = utc(2024, 6, 1, 12, 0, 0);
        let start = utc(2024, 7, 1, 0, 0, 0);
        let window = DateWindow::canonical_at(Some(start), None, now);
        assert_eq!(window.route_segment(), "202407010000/202506010000");
    }

    #[test]
    fn test_parse_bound_is_strict() {
        assert!(parse_bound("202401010000").is_some());
        assert!(parse_bound("202210212359").is_some());
        assert!(parse_bound("20240101000").is_none());
        assert!(parse_bound("2024010100000").is_none());
        assert!(parse_bound("2024-1010000").is_none());
        assert!(parse_bound("202413010000").is_none());
        assert!(parse_bound("202402300000").is_none());
        assert!(parse_bound("202401012500").is_none());
    }

    #[test]
    fn test_format_parse_roundtrip_keeps_minutes() {
        let bound = parse_bound("202210212359").unwrap();
        assert_eq!(format_bound(bound), "202210212359");
    }
}
