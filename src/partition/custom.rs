/// Custom time spans such as `"1-1:3-31,6-1,9-1:11-30"`
///
/// Each comma-separated entry is either a single `MM-DD` date or an
/// inclusive `MM-DD:MM-DD` range within one calendar year. Day-of-year
/// ranges are resolved once per request for both leap and non-leap years.
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;
use thiserror::Error;

use super::spans::{day_of_year, days_in_month};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpanError {
    #[error("Malformed custom span '{span}': {reason}")]
    MalformedCustomSpan { span: String, reason: String },

    #[error("Custom span starts after it ends: {start} > {end}")]
    BackwardsDateRange { start: String, end: String },

    #[error("Invalid day of month: {month}-{day}")]
    InvalidDayOfMonth { month: u32, day: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    fn is_leap_day(self) -> bool {
        self.month == 2 && self.day == 29
    }

    // Validated dates always exist in a leap year
    fn leap_ordinal(self) -> usize {
        day_of_year(self.month, self.day, true).unwrap_or_default()
    }

    fn common_start(self) -> usize {
        if self.is_leap_day() {
            day_of_year(3, 1, false).unwrap_or_default()
        } else {
            day_of_year(self.month, self.day, false).unwrap_or_default()
        }
    }

    fn common_end(self) -> usize {
        if self.is_leap_day() {
            day_of_year(2, 28, false).unwrap_or_default()
        } else {
            day_of_year(self.month, self.day, false).unwrap_or_default()
        }
    }
}

impl std::fmt::Display for MonthDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomSpan {
    pub start: MonthDay,
    pub end: MonthDay,
}

/// Request-scoped custom span configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CustomSpans {
    spans: Vec<CustomSpan>,
    leap_ranges: Vec<Range<usize>>,
    common_ranges: Vec<Range<usize>>,
}

fn month_day_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{1,2})-(\d{1,2})$").expect("valid month-day regex"))
}

fn parse_month_day(value: &str, span: &str) -> Result<MonthDay, SpanError> {
    let malformed = |reason: &str| SpanError::MalformedCustomSpan {
        span: span.to_string(),
        reason: reason.to_string(),
    };

    let caps = month_day_pattern()
        .captures(value.trim())
        .ok_or_else(|| malformed("expected MM-DD"))?;
    let month: u32 = caps[1].parse().map_err(|_| malformed("invalid month"))?;
    let day: u32 = caps[2].parse().map_err(|_| malformed("invalid day"))?;

    let max_day = days_in_month(month, true).ok_or_else(|| malformed("month must be 1-12"))?;
    if day == 0 || day as usize > max_day {
        return Err(SpanError::InvalidDayOfMonth { month, day });
    }

    Ok(MonthDay { month, day })
}

impl CustomSpans {
    pub fn parse(spec: &str) -> Result<Self, SpanError> {
        let mut spans = Vec::new();

        for entry in spec.split(',').map(str::trim) {
            if entry.is_empty() {
                return Err(SpanError::MalformedCustomSpan {
                    span: spec.to_string(),
                    reason: "empty span".to_string(),
                });
            }

            let parts: Vec<&str> = entry.split(':').collect();
            let (start, end) = match parts.as_slice() {
                [single] => {
                    let date = parse_month_day(single, entry)?;
                    (date, date)
                }
                [start, end] => (parse_month_day(start, entry)?, parse_month_day(end, entry)?),
                _ => {
                    return Err(SpanError::MalformedCustomSpan {
                        span: entry.to_string(),
                        reason: "expected MM-DD or MM-DD:MM-DD".to_string(),
                    })
                }
            };

            if start.leap_ordinal() > end.leap_ordinal() {
                return Err(SpanError::BackwardsDateRange {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }

            spans.push(CustomSpan { start, end });
        }

        let leap_ranges = spans
            .iter()
            .map(|s| s.start.leap_ordinal() - 1..s.end.leap_ordinal())
            .collect();
        // A lone Feb 29 collapses to an empty range outside leap years
        let common_ranges = spans
            .iter()
            .map(|s| {
                let start = s.start.common_start() - 1;
                start..s.end.common_end().max(start)
            })
            .collect();

        Ok(Self {
            spans,
            leap_ranges,
            common_ranges,
        })
    }

    pub fn spans(&self) -> &[CustomSpan] {
        &self.spans
    }

    pub fn ranges(&self, leap: bool) -> &[Range<usize>] {
        if leap {
            &self.leap_ranges
        } else {
            &self.common_ranges
        }
    }
}
