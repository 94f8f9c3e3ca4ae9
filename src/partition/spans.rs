/// Calendar span tables shared by the partitioning strategies
///
/// All ranges are 0-based, end-exclusive indices into a year's daily array.
use chrono::{Datelike, NaiveDate};
use std::ops::Range;

pub const MONTH_LENGTHS: [usize; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
pub const LEAP_MONTH_LENGTHS: [usize; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

pub const QUARTER_LENGTHS: [usize; 4] = [90, 91, 92, 92];
pub const LEAP_QUARTER_LENGTHS: [usize; 4] = [91, 91, 92, 92];

// Any leap and non-leap year work; only month/day arithmetic is needed
const LEAP_REFERENCE_YEAR: i32 = 2000;
const COMMON_REFERENCE_YEAR: i32 = 2001;

pub fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

pub fn days_in_year(year: i32) -> usize {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

pub fn month_lengths(leap: bool) -> &'static [usize] {
    if leap {
        &LEAP_MONTH_LENGTHS
    } else {
        &MONTH_LENGTHS
    }
}

pub fn quarter_lengths(leap: bool) -> &'static [usize] {
    if leap {
        &LEAP_QUARTER_LENGTHS
    } else {
        &QUARTER_LENGTHS
    }
}

/// Turn consecutive span lengths into back-to-back index ranges
pub fn contiguous_ranges(lengths: &[usize]) -> Vec<Range<usize>> {
    let mut start = 0;
    lengths
        .iter()
        .map(|len| {
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Length of `month` (1-based) in a leap or non-leap year
pub fn days_in_month(month: u32, leap: bool) -> Option<usize> {
    let index = usize::try_from(month).ok()?.checked_sub(1)?;
    month_lengths(leap).get(index).copied()
}

/// 1-based day of year for a month/day pair, `None` if the date does not exist
pub fn day_of_year(month: u32, day: u32, leap: bool) -> Option<usize> {
    let year = if leap {
        LEAP_REFERENCE_YEAR
    } else {
        COMMON_REFERENCE_YEAR
    };
    NaiveDate::from_ymd_opt(year, month, day).map(|date| date.ordinal() as usize)
}
