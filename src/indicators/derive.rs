/// Daily derivations and per-bucket reductions
///
/// A [`DailyTransform`] turns one model/year of raw variables into a single
/// derived daily series of the same length. A [`Reduction`] collapses the
/// derived values falling in one bucket into one number per model.
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::partition::YearRecord;
use crate::stats::{aggregate, StatKind};
use crate::store::{DailySeries, Variable};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeriveError {
    #[error("Model {model} year {year} has no '{variable}' data")]
    MissingVariable {
        model: String,
        year: i32,
        variable: Variable,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparator {
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Gt => value > threshold,
            Comparator::Gte => value >= threshold,
            Comparator::Lt => value < threshold,
            Comparator::Lte => value <= threshold,
        }
    }
}

impl FromStr for Comparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gt" => Ok(Comparator::Gt),
            "gte" => Ok(Comparator::Gte),
            "lt" => Ok(Comparator::Lt),
            "lte" => Ok(Comparator::Lte),
            other => Err(format!("unknown comparator '{other}' (expected gt, gte, lt or lte)")),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Comparator::Gt => "gt",
            Comparator::Gte => "gte",
            Comparator::Lt => "lt",
            Comparator::Lte => "lte",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DegreeDayKind {
    Heating,
    Cooling,
}

/// A derivation with every request parameter resolved to storage units
#[derive(Debug, Clone, PartialEq)]
pub enum DailyTransform {
    Identity(Variable),
    Mean(Variable, Variable),
    Difference(Variable, Variable),
    Scale(Variable, f64),
    /// 1.0 on days where `value <comparator> threshold`, else 0.0
    Exceeds {
        variable: Variable,
        comparator: Comparator,
        threshold: f64,
    },
    /// Daily degree days against `base`, computed on the tasmax/tasmin mean
    DegreeDays { kind: DegreeDayKind, base: f64 },
}

impl DailyTransform {
    pub fn variables(&self) -> Vec<Variable> {
        match *self {
            DailyTransform::Identity(v) | DailyTransform::Scale(v, _) => vec![v],
            DailyTransform::Exceeds { variable, .. } => vec![variable],
            DailyTransform::Mean(a, b) | DailyTransform::Difference(a, b) => vec![a, b],
            DailyTransform::DegreeDays { .. } => vec![Variable::Tasmax, Variable::Tasmin],
        }
    }

    /// Derive `series` into a partitioner record keyed by `name`
    pub fn derive(&self, series: &DailySeries, name: &str) -> Result<YearRecord, DeriveError> {
        let get = |variable: Variable| {
            series
                .variables
                .get(&variable)
                .ok_or_else(|| DeriveError::MissingVariable {
                    model: series.model.clone(),
                    year: series.year,
                    variable,
                })
        };

        let derived: Vec<Option<f64>> = match *self {
            DailyTransform::Identity(v) => get(v)?.clone(),
            DailyTransform::Scale(v, factor) => map_days(get(v)?, |x| x * factor),
            DailyTransform::Exceeds {
                variable,
                comparator,
                threshold,
            } => map_days(get(variable)?, |x| {
                if comparator.holds(x, threshold) {
                    1.0
                } else {
                    0.0
                }
            }),
            DailyTransform::Mean(a, b) => zip_days(get(a)?, get(b)?, |x, y| (x + y) / 2.0),
            DailyTransform::Difference(a, b) => zip_days(get(a)?, get(b)?, |x, y| x - y),
            DailyTransform::DegreeDays { kind, base } => {
                zip_days(get(Variable::Tasmax)?, get(Variable::Tasmin)?, |high, low| {
                    let mean = (high + low) / 2.0;
                    match kind {
                        DegreeDayKind::Heating => (base - mean).max(0.0),
                        DegreeDayKind::Cooling => (mean - base).max(0.0),
                    }
                })
            }
        };

        Ok(YearRecord {
            model: series.model.clone(),
            year: series.year,
            values: BTreeMap::from([(name.to_string(), derived)]),
        })
    }
}

fn map_days<F: Fn(f64) -> f64>(values: &[Option<f64>], f: F) -> Vec<Option<f64>> {
    values.iter().map(|v| v.map(&f)).collect()
}

// Truncates to the shorter series; a missing value on either side is missing
fn zip_days<F: Fn(f64, f64) -> f64>(a: &[Option<f64>], b: &[Option<f64>], f: F) -> Vec<Option<f64>> {
    a.iter()
        .zip(b)
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some(f(*x, *y)),
            _ => None,
        })
        .collect()
}

/// How one model's derived daily values in a bucket become one number
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reduction {
    Mean,
    Sum,
    Max,
    Min,
    Percentile(u8),
    /// Longest run of consecutive flagged days
    LongestRun,
    /// Number of flagged runs at least `min_length` days long
    RunCount { min_length: usize },
}

impl Reduction {
    /// `None` when every day in the bucket is missing
    pub fn reduce(&self, values: &[Option<f64>]) -> Option<f64> {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        if present.is_empty() {
            return None;
        }

        match *self {
            Reduction::Mean => aggregate(&present, StatKind::Avg).ok(),
            Reduction::Max => aggregate(&present, StatKind::Max).ok(),
            Reduction::Min => aggregate(&present, StatKind::Min).ok(),
            Reduction::Percentile(p) => aggregate(&present, StatKind::Percentile(p)).ok(),
            Reduction::Sum => Some(present.iter().sum()),
            Reduction::LongestRun => Some(run_lengths(values).into_iter().max().unwrap_or(0) as f64),
            Reduction::RunCount { min_length } => Some(
                run_lengths(values)
                    .into_iter()
                    .filter(|len| *len >= min_length)
                    .count() as f64,
            ),
        }
    }
}

// Lengths of maximal runs of flagged (non-zero) days; missing days break runs
fn run_lengths(values: &[Option<f64>]) -> Vec<usize> {
    let mut runs = Vec::new();
    let mut current = 0;
    for value in values {
        match value {
            Some(v) if *v != 0.0 => current += 1,
            _ => {
                if current > 0 {
                    runs.push(current);
                }
                current = 0;
            }
        }
    }
    if current > 0 {
        runs.push(current);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(tasmax: Vec<Option<f64>>, tasmin: Vec<Option<f64>>) -> DailySeries {
        DailySeries {
            city: "phl".to_string(),
            scenario: "RCP85".to_string(),
            model: "CCSM4".to_string(),
            year: 2050,
            variables: BTreeMap::from([(Variable::Tasmax, tasmax), (Variable::Tasmin, tasmin)]),
        }
    }

    #[test]
    fn test_exceeds_flags_days() {
        let s = series(vec![Some(300.0), Some(305.0), None, Some(310.0)], vec![]);
        let transform = DailyTransform::Exceeds {
            variable: Variable::Tasmax,
            comparator: Comparator::Gte,
            threshold: 305.0,
        };
        let record = transform.derive(&s, "max_temperature_threshold").unwrap();
        assert_eq!(
            record.values["max_temperature_threshold"],
            vec![Some(0.0), Some(1.0), None, Some(1.0)]
        );
        assert_eq!(Reduction::Sum.reduce(&record.values["max_temperature_threshold"]), Some(2.0));
    }

    #[test]
    fn test_degree_days() {
        let s = series(vec![Some(290.0), Some(300.0)], vec![Some(280.0), Some(296.0)]);
        let heating = DailyTransform::DegreeDays {
            kind: DegreeDayKind::Heating,
            base: 291.0,
        };
        let record = heating.derive(&s, "hdd").unwrap();
        assert_eq!(record.values["hdd"], vec![Some(6.0), Some(0.0)]);

        let cooling = DailyTransform::DegreeDays {
            kind: DegreeDayKind::Cooling,
            base: 291.0,
        };
        let record = cooling.derive(&s, "cdd").unwrap();
        assert_eq!(record.values["cdd"], vec![Some(0.0), Some(7.0)]);
    }

    #[test]
    fn test_difference_and_missing_values() {
        let s = series(vec![Some(300.0), None], vec![Some(290.0), Some(280.0)]);
        let record = DailyTransform::Difference(Variable::Tasmax, Variable::Tasmin)
            .derive(&s, "range")
            .unwrap();
        assert_eq!(record.values["range"], vec![Some(10.0), None]);
    }

    #[test]
    fn test_missing_variable() {
        let s = series(vec![Some(300.0)], vec![Some(290.0)]);
        let err = DailyTransform::Identity(Variable::Pr)
            .derive(&s, "total_precipitation")
            .unwrap_err();
        assert_eq!(
            err,
            DeriveError::MissingVariable {
                model: "CCSM4".to_string(),
                year: 2050,
                variable: Variable::Pr
            }
        );
    }

    #[test]
    fn test_run_reductions() {
        let flags = [1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0];
        let values: Vec<Option<f64>> = flags.iter().map(|f| Some(*f)).collect();
        assert_eq!(Reduction::LongestRun.reduce(&values), Some(3.0));
        assert_eq!(Reduction::RunCount { min_length: 2 }.reduce(&values), Some(2.0));
        assert_eq!(Reduction::RunCount { min_length: 4 }.reduce(&values), Some(0.0));

        let broken = vec![Some(1.0), None, Some(1.0)];
        assert_eq!(Reduction::LongestRun.reduce(&broken), Some(1.0));
    }

    #[test]
    fn test_reduce_all_missing() {
        assert_eq!(Reduction::Mean.reduce(&[None, None]), None);
        assert_eq!(Reduction::Sum.reduce(&[]), None);
    }

    #[test]
    fn test_comparator_parse() {
        assert_eq!("lte".parse::<Comparator>().unwrap(), Comparator::Lte);
        assert!("eq".parse::<Comparator>().is_err());
        assert!(Comparator::Lt.holds(1.0, 2.0));
        assert!(!Comparator::Gt.holds(2.0, 2.0));
    }
}
