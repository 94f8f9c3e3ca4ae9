use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::units::UnitFamily;

/// Raw climate variables as stored per model and year
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variable {
    /// Daily maximum near-surface air temperature, K
    Tasmax,
    /// Daily minimum near-surface air temperature, K
    Tasmin,
    /// Precipitation flux, kg/m^2/s
    Pr,
}

impl Variable {
    pub fn as_str(self) -> &'static str {
        match self {
            Variable::Tasmax => "tasmax",
            Variable::Tasmin => "tasmin",
            Variable::Pr => "pr",
        }
    }

    pub fn family(self) -> UnitFamily {
        match self {
            Variable::Tasmax | Variable::Tasmin => UnitFamily::Temperature,
            Variable::Pr => UnitFamily::PrecipitationRate,
        }
    }

    pub fn storage_units(self) -> &'static str {
        match self {
            Variable::Tasmax | Variable::Tasmin => "K",
            Variable::Pr => "kg/m^2/s",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One model's daily values for one city, scenario and year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySeries {
    pub city: String,
    pub scenario: String,
    pub model: String,
    pub year: i32,
    #[serde(default)]
    pub variables: BTreeMap<Variable, Vec<Option<f64>>>,
}

/// Filters applied when selecting raw series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesQuery {
    pub city: String,
    pub scenario: String,
    pub models: Vec<String>,
    /// `None` selects every year
    pub years: Option<Vec<i32>>,
    pub variables: Vec<Variable>,
}

impl SeriesQuery {
    pub fn matches(&self, series: &DailySeries) -> bool {
        series.city == self.city
            && series.scenario == self.scenario
            && self.models.iter().any(|m| *m == series.model)
            && self
                .years
                .as_ref()
                .map_or(true, |years| years.contains(&series.year))
    }
}

// Data file layout consumed by the JSON-backed repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeriesFile {
    pub series: Vec<DailySeries>,
}
