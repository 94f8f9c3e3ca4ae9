/// Summary statistics over the values collected for one time bucket
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("Cannot aggregate an empty list of values")]
    EmptyInput,

    #[error("Unknown statistic '{0}' (expected min, max, avg, median, stddev or NNth)")]
    UnknownStatistic(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    Min,
    Max,
    Avg,
    Median,
    Stddev,
    /// Linear-interpolation percentile, 1..=99
    Percentile(u8),
}

impl StatKind {
    /// Statistics measuring spread rather than position
    pub fn is_spread(self) -> bool {
        matches!(self, StatKind::Stddev)
    }
}

fn percentile_label() -> &'static Regex {
    static LABEL: OnceLock<Regex> = OnceLock::new();
    LABEL.get_or_init(|| Regex::new(r"^(\d{1,2})th$").expect("valid percentile regex"))
}

impl FromStr for StatKind {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min" => Ok(StatKind::Min),
            "max" => Ok(StatKind::Max),
            "avg" => Ok(StatKind::Avg),
            "median" => Ok(StatKind::Median),
            "stddev" => Ok(StatKind::Stddev),
            other => percentile_label()
                .captures(other)
                .and_then(|caps| caps[1].parse::<u8>().ok())
                .filter(|p| (1..=99).contains(p))
                .map(StatKind::Percentile)
                .ok_or_else(|| StatsError::UnknownStatistic(other.to_string())),
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatKind::Min => f.write_str("min"),
            StatKind::Max => f.write_str("max"),
            StatKind::Avg => f.write_str("avg"),
            StatKind::Median => f.write_str("median"),
            StatKind::Stddev => f.write_str("stddev"),
            StatKind::Percentile(p) => write!(f, "{p}th"),
        }
    }
}

impl Serialize for StatKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parse a comma-separated statistics list such as `"min,max,95th"`
pub fn parse_stat_list(value: &str) -> Result<Vec<StatKind>, StatsError> {
    let mut stats = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let stat = part.parse()?;
        if !stats.contains(&stat) {
            stats.push(stat);
        }
    }
    Ok(stats)
}

pub fn aggregate(values: &[f64], stat: StatKind) -> Result<f64, StatsError> {
    if values.is_empty() {
        return Err(StatsError::EmptyInput);
    }
    let sorted = sorted_copy(values);
    Ok(aggregate_sorted(&sorted, stat))
}

/// Evaluate several statistics over one sorted copy of `values`
pub fn aggregate_all(values: &[f64], stats: &[StatKind]) -> Result<Vec<(StatKind, f64)>, StatsError> {
    if values.is_empty() {
        return Err(StatsError::EmptyInput);
    }
    let sorted = sorted_copy(values);
    Ok(stats
        .iter()
        .map(|&stat| (stat, aggregate_sorted(&sorted, stat)))
        .collect())
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

// `sorted` must be non-empty and ascending
fn aggregate_sorted(sorted: &[f64], stat: StatKind) -> f64 {
    match stat {
        StatKind::Min => sorted[0],
        StatKind::Max => sorted[sorted.len() - 1],
        StatKind::Avg => mean(sorted),
        StatKind::Median => percentile(sorted, 50.0),
        StatKind::Stddev => {
            let mean = mean(sorted);
            let variance =
                sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / sorted.len() as f64;
            variance.sqrt()
        }
        StatKind::Percentile(p) => percentile(sorted, f64::from(p)),
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}
