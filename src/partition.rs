// Time partitioning of daily series into calendar buckets
//
// A partitioner consumes an ordered stream of per-model yearly records and
// lazily yields one bucket per time unit. The stream is single-pass: the
// offset-yearly strategy carries the previous year between items.

pub mod custom;
pub mod spans;

pub use custom::{CustomSpans, SpanError};

use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

use spans::{contiguous_ranges, days_in_year, is_leap_year, month_lengths, quarter_lengths};

pub const DEFAULT_OFFSET: usize = 180;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PartitionError {
    #[error("Missing data for model {model} year {year}: '{variable}' has {actual} days, expected {expected}")]
    MissingData {
        model: String,
        year: i32,
        variable: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid time aggregation '{0}' (expected yearly, monthly, quarterly, offset_yearly or custom)")]
pub struct InvalidTimeAggregation(pub String);

/// Values per variable name
pub type Bucket<T> = BTreeMap<String, Vec<T>>;

/// One model's daily values for one year, the partitioner's input unit
#[derive(Debug, Clone, PartialEq)]
pub struct YearRecord {
    pub model: String,
    pub year: i32,
    pub values: Bucket<Option<f64>>,
}

/// Identifies one time bucket; ordering is chronological within a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    Year(i32),
    Month { year: i32, month: u32 },
    Quarter { year: i32, quarter: u32 },
    OffsetYear { start: i32 },
    Custom { year: i32, index: usize },
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            BucketKey::Year(year) => write!(f, "{year:04}"),
            BucketKey::Month { year, month } => write!(f, "{year:04}-{month:02}"),
            BucketKey::Quarter { year, quarter } => write!(f, "{year:04}-Q{quarter}"),
            BucketKey::OffsetYear { start } => write!(f, "{start:04}-{:04}", start + 1),
            BucketKey::Custom { year, index } => write!(f, "{year:04}-{index:02}"),
        }
    }
}

impl Serialize for BucketKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeAggregationKind {
    Yearly,
    Monthly,
    Quarterly,
    OffsetYearly,
    Custom,
}

impl TimeAggregationKind {
    pub const ALL: [TimeAggregationKind; 5] = [
        TimeAggregationKind::Yearly,
        TimeAggregationKind::Monthly,
        TimeAggregationKind::Quarterly,
        TimeAggregationKind::OffsetYearly,
        TimeAggregationKind::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TimeAggregationKind::Yearly => "yearly",
            TimeAggregationKind::Monthly => "monthly",
            TimeAggregationKind::Quarterly => "quarterly",
            TimeAggregationKind::OffsetYearly => "offset_yearly",
            TimeAggregationKind::Custom => "custom",
        }
    }
}

impl fmt::Display for TimeAggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeAggregationKind {
    type Err = InvalidTimeAggregation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| InvalidTimeAggregation(s.to_string()))
    }
}

/// A fully configured partitioning strategy
#[derive(Debug, Clone, PartialEq)]
pub enum TimeAggregation {
    Yearly,
    Monthly,
    Quarterly,
    OffsetYearly { offset: usize },
    Custom(CustomSpans),
}

impl TimeAggregation {
    pub fn kind(&self) -> TimeAggregationKind {
        match self {
            TimeAggregation::Yearly => TimeAggregationKind::Yearly,
            TimeAggregation::Monthly => TimeAggregationKind::Monthly,
            TimeAggregation::Quarterly => TimeAggregationKind::Quarterly,
            TimeAggregation::OffsetYearly { .. } => TimeAggregationKind::OffsetYearly,
            TimeAggregation::Custom(_) => TimeAggregationKind::Custom,
        }
    }

    /// Lazily partition `records`, which must be ordered by model then year
    pub fn partition<I>(&self, records: I, strict: bool) -> Partitions<'_, I::IntoIter>
    where
        I: IntoIterator<Item = YearRecord>,
    {
        Partitions {
            records: records.into_iter(),
            aggregation: self,
            strict,
            pending: VecDeque::new(),
            previous: None,
            failed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub key: BucketKey,
    pub model: String,
    pub bucket: Bucket<Option<f64>>,
}

/// Single-pass iterator over the partitions of a record stream
pub struct Partitions<'a, I> {
    records: I,
    aggregation: &'a TimeAggregation,
    strict: bool,
    pending: VecDeque<Partition>,
    previous: Option<YearRecord>,
    failed: bool,
}

impl<I> Iterator for Partitions<'_, I>
where
    I: Iterator<Item = YearRecord>,
{
    type Item = Result<Partition, PartitionError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(partition) = self.pending.pop_front() {
                return Some(Ok(partition));
            }
            if self.failed {
                return None;
            }

            let record = self.records.next()?;
            if let Err(e) = self.split(record) {
                self.failed = true;
                return Some(Err(e));
            }
        }
    }
}

impl<I> Partitions<'_, I> {
    fn split(&mut self, record: YearRecord) -> Result<(), PartitionError> {
        self.check_lengths(&record)?;
        let leap = is_leap_year(record.year);
        let aggregation = self.aggregation;

        match aggregation {
            TimeAggregation::Yearly => {
                self.pending.push_back(Partition {
                    key: BucketKey::Year(record.year),
                    model: record.model,
                    bucket: record.values,
                });
            }
            TimeAggregation::Monthly => {
                let ranges = contiguous_ranges(month_lengths(leap));
                self.push_spans(&record, &ranges, |i| BucketKey::Month {
                    year: record.year,
                    month: i as u32 + 1,
                });
            }
            TimeAggregation::Quarterly => {
                let ranges = contiguous_ranges(quarter_lengths(leap));
                self.push_spans(&record, &ranges, |i| BucketKey::Quarter {
                    year: record.year,
                    quarter: i as u32 + 1,
                });
            }
            TimeAggregation::Custom(spans) => {
                self.push_spans(&record, spans.ranges(leap), |i| BucketKey::Custom {
                    year: record.year,
                    index: i + 1,
                });
            }
            TimeAggregation::OffsetYearly { offset } => {
                let offset = *offset;
                if let Some(previous) = self.previous.take() {
                    if previous.model == record.model && previous.year + 1 == record.year {
                        self.pending
                            .push_back(offset_window(&previous, &record, offset));
                    } else {
                        debug!(
                            "Run break between {} {} and {} {}",
                            previous.model, previous.year, record.model, record.year
                        );
                    }
                }
                self.previous = Some(record);
            }
        }

        Ok(())
    }

    fn push_spans<F>(&mut self, record: &YearRecord, ranges: &[Range<usize>], key: F)
    where
        F: Fn(usize) -> BucketKey,
    {
        for (i, range) in ranges.iter().enumerate() {
            if range.is_empty() {
                continue;
            }
            let bucket = record
                .values
                .iter()
                .map(|(variable, values)| (variable.clone(), slice_truncated(values, range.clone())))
                .collect();
            self.pending.push_back(Partition {
                key: key(i),
                model: record.model.clone(),
                bucket,
            });
        }
    }

    fn check_lengths(&self, record: &YearRecord) -> Result<(), PartitionError> {
        let expected = days_in_year(record.year);
        for (variable, values) in &record.values {
            if values.len() == expected {
                continue;
            }
            if self.strict {
                return Err(PartitionError::MissingData {
                    model: record.model.clone(),
                    year: record.year,
                    variable: variable.clone(),
                    expected,
                    actual: values.len(),
                });
            }
            warn!(
                "Model {} year {}: '{}' has {} days, expected {}; affected buckets will be truncated",
                record.model,
                record.year,
                variable,
                values.len(),
                expected
            );
        }
        Ok(())
    }
}

// Truncates to the available days
fn slice_truncated(values: &[Option<f64>], range: Range<usize>) -> Vec<Option<f64>> {
    let end = range.end.min(values.len());
    let start = range.start.min(end);
    values[start..end].to_vec()
}

fn offset_window(previous: &YearRecord, next: &YearRecord, offset: usize) -> Partition {
    let bucket = previous
        .values
        .iter()
        .map(|(variable, head)| {
            let mut values = slice_truncated(head, offset..head.len());
            if let Some(tail) = next.values.get(variable) {
                values.extend(slice_truncated(tail, 0..offset));
            }
            (variable.clone(), values)
        })
        .collect();

    Partition {
        key: BucketKey::OffsetYear {
            start: previous.year,
        },
        model: previous.model.clone(),
        bucket,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(model: &str, year: i32) -> YearRecord {
        let days = days_in_year(year);
        let values = (0..days).map(|d| Some(year as f64 * 1000.0 + d as f64)).collect();
        YearRecord {
            model: model.to_string(),
            year,
            values: BTreeMap::from([("tasmax".to_string(), values)]),
        }
    }

    fn collect(aggregation: &TimeAggregation, records: Vec<YearRecord>) -> Vec<Partition> {
        aggregation
            .partition(records, true)
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn lengths(partitions: &[Partition]) -> Vec<usize> {
        partitions.iter().map(|p| p.bucket["tasmax"].len()).collect()
    }

    #[test]
    fn test_yearly_is_identity() {
        let input = vec![record("ACCESS1-0", 2050), record("ACCESS1-0", 2051)];
        let partitions = collect(&TimeAggregation::Yearly, input.clone());

        assert_eq!(partitions.len(), 2);
        for (partition, original) in partitions.iter().zip(&input) {
            assert_eq!(partition.key, BucketKey::Year(original.year));
            assert_eq!(partition.bucket, original.values);
        }
    }

    #[test]
    fn test_monthly_lengths_sum_to_year() {
        for year in [2023, 2024] {
            let partitions = collect(&TimeAggregation::Monthly, vec![record("m", year)]);
            assert_eq!(partitions.len(), 12);
            assert_eq!(lengths(&partitions).iter().sum::<usize>(), days_in_year(year));
        }
        let leap = collect(&TimeAggregation::Monthly, vec![record("m", 2024)]);
        assert_eq!(lengths(&leap)[1], 29);
        assert_eq!(leap[1].key.to_string(), "2024-02");
        assert_eq!(leap[2].bucket["tasmax"][0], Some(2024.0 * 1000.0 + 60.0));
    }

    #[test]
    fn test_quarterly_lengths() {
        let common = collect(&TimeAggregation::Quarterly, vec![record("m", 2023)]);
        assert_eq!(lengths(&common), vec![90, 91, 92, 92]);
        let leap = collect(&TimeAggregation::Quarterly, vec![record("m", 2024)]);
        assert_eq!(lengths(&leap), vec![91, 91, 92, 92]);
        assert_eq!(leap.iter().map(|p| p.bucket["tasmax"].len()).sum::<usize>(), 366);
        assert_eq!(leap[3].key.to_string(), "2024-Q4");
    }

    #[test]
    fn test_offset_yearly_drops_fenceposts() {
        let input = (2050..2055).map(|y| record("m", y)).collect();
        let partitions = collect(&TimeAggregation::OffsetYearly { offset: 180 }, input);

        assert_eq!(partitions.len(), 4);
        assert_eq!(partitions[0].key.to_string(), "2050-2051");
        let first = &partitions[0].bucket["tasmax"];
        assert_eq!(first.len(), 365);
        assert_eq!(first[0], Some(2050.0 * 1000.0 + 180.0));
        assert_eq!(first[185], Some(2051.0 * 1000.0));
        assert_eq!(first[364], Some(2051.0 * 1000.0 + 179.0));
    }

    #[test]
    fn test_offset_yearly_breaks_runs() {
        let input = vec![
            record("a", 2050),
            record("a", 2051),
            record("a", 2053),
            record("a", 2054),
            record("b", 2055),
            record("b", 2056),
        ];
        let partitions = collect(&TimeAggregation::OffsetYearly { offset: 10 }, input);
        let keys: Vec<String> = partitions.iter().map(|p| p.key.to_string()).collect();
        assert_eq!(keys, vec!["2050-2051", "2053-2054", "2055-2056"]);
        assert_eq!(partitions[2].model, "b");
    }

    #[test]
    fn test_custom_spans() {
        let spans = CustomSpans::parse("1-1:12-31").unwrap();
        let partitions = collect(&TimeAggregation::Custom(spans), vec![record("m", 2023)]);
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].key.to_string(), "2023-01");
        assert_eq!(partitions[0].bucket["tasmax"].len(), 365);
        assert_eq!(partitions[0].bucket["tasmax"][0], Some(2023.0 * 1000.0));

        let spans = CustomSpans::parse("6-1,2-29").unwrap();
        let agg = TimeAggregation::Custom(spans);
        let leap = collect(&agg, vec![record("m", 2024)]);
        assert_eq!(leap.len(), 2);
        assert_eq!(leap[0].bucket["tasmax"], vec![Some(2024.0 * 1000.0 + 152.0)]);
        let common = collect(&agg, vec![record("m", 2023)]);
        assert_eq!(common.len(), 1);
        assert_eq!(common[0].bucket["tasmax"], vec![Some(2023.0 * 1000.0 + 151.0)]);
    }

    #[test]
    fn test_short_series_strict_and_lenient() {
        let mut short = record("m", 2023);
        short.values.get_mut("tasmax").unwrap().truncate(300);

        let mut strict = TimeAggregation::Monthly.partition(vec![short.clone()], true);
        assert!(matches!(
            strict.next(),
            Some(Err(PartitionError::MissingData { expected: 365, actual: 300, .. }))
        ));
        assert!(strict.next().is_none());

        let lenient: Vec<Partition> = TimeAggregation::Monthly
            .partition(vec![short], false)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(lenient.len(), 12);
        assert_eq!(lenient[9].bucket["tasmax"].len(), 27);
        assert!(lenient[10].bucket["tasmax"].is_empty());
    }

    #[test]
    fn test_bucket_key_ordering() {
        let mut keys = vec![
            BucketKey::Month { year: 2051, month: 1 },
            BucketKey::Month { year: 2050, month: 12 },
            BucketKey::Month { year: 2050, month: 2 },
        ];
        keys.sort();
        let labels: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(labels, vec!["2050-02", "2050-12", "2051-01"]);
        assert!(BucketKey::OffsetYear { start: 2050 } < BucketKey::OffsetYear { start: 2051 });
    }

    #[test]
    fn test_parse_time_aggregation_kind() {
        assert_eq!(
            "offset_yearly".parse::<TimeAggregationKind>().unwrap(),
            TimeAggregationKind::OffsetYearly
        );
        assert!("weekly".parse::<TimeAggregationKind>().is_err());
    }
}
