/// The indicator catalog
///
/// Each indicator is a row of declarative parameters consumed by the generic
/// engine in `services::indicator_service`.
use serde::Serialize;

use crate::indicators::derive::{Comparator, DegreeDayKind};
use crate::partition::TimeAggregationKind;
use crate::store::Variable;
use crate::units::UnitFamily;

/// Daily derivation as declared, before request parameters are applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Derivation {
    Identity(Variable),
    Mean(Variable, Variable),
    Difference(Variable, Variable),
    /// Precipitation rate to daily depth
    RateToDepth(Variable),
    /// Threshold in storage units fixed by the indicator
    FixedThreshold {
        variable: Variable,
        comparator: Comparator,
        value: f64,
    },
    /// Threshold, units and comparator come from the request
    RequestedThreshold { variable: Variable },
    /// Threshold is a percentile of the historic baseline
    HistoricPercentile {
        variable: Variable,
        comparator: Comparator,
    },
    DegreeDays { kind: DegreeDayKind },
}

impl Derivation {
    pub fn variables(&self) -> Vec<Variable> {
        match *self {
            Derivation::Identity(v) | Derivation::RateToDepth(v) => vec![v],
            Derivation::FixedThreshold { variable, .. }
            | Derivation::RequestedThreshold { variable }
            | Derivation::HistoricPercentile { variable, .. } => vec![variable],
            Derivation::Mean(a, b) | Derivation::Difference(a, b) => vec![a, b],
            Derivation::DegreeDays { .. } => vec![Variable::Tasmax, Variable::Tasmin],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    Mean,
    Sum,
    Max,
    Min,
    /// Uses the request's `percentile`
    Percentile,
    LongestRun,
    RunCount { min_length: usize },
}

/// Indicator-specific request parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraParameter {
    Threshold,
    BaseTemperature,
    Percentile { default: Option<u8> },
    HistoricRange,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorDefinition {
    pub name: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub derivation: Derivation,
    pub reducer: Reducer,
    pub family: UnitFamily,
    pub storage_units: &'static str,
    pub default_units: &'static str,
    pub valid_aggregations: &'static [TimeAggregationKind],
    pub parameters: &'static [ExtraParameter],
}

impl IndicatorDefinition {
    pub fn variables(&self) -> Vec<Variable> {
        self.derivation.variables()
    }

    pub fn takes(&self, parameter: ExtraParameter) -> bool {
        self.parameters
            .iter()
            .any(|p| std::mem::discriminant(p) == std::mem::discriminant(&parameter))
    }

    pub fn percentile_default(&self) -> Option<Option<u8>> {
        self.parameters.iter().find_map(|p| match p {
            ExtraParameter::Percentile { default } => Some(*default),
            _ => None,
        })
    }

    pub fn supports(&self, kind: TimeAggregationKind) -> bool {
        self.valid_aggregations.contains(&kind)
    }
}

const ALL_AGGREGATIONS: &[TimeAggregationKind] = &TimeAggregationKind::ALL;
const YEAR_LIKE: &[TimeAggregationKind] = &[
    TimeAggregationKind::Yearly,
    TimeAggregationKind::OffsetYearly,
];

const FREEZING_K: f64 = 273.15;
// ETCCDI dry day: under 1 mm of precipitation
const DRY_DAY_RATE: f64 = 1.0 / 86_400.0;
pub const SECONDS_PER_DAY: f64 = 86_400.0;

pub const HISTORIC_SCENARIO: &str = "historical";

pub static INDICATORS: &[IndicatorDefinition] = &[
    IndicatorDefinition {
        name: "average_high_temperature",
        label: "Average High Temperature",
        description: "Aggregated average high temperature",
        derivation: Derivation::Identity(Variable::Tasmax),
        reducer: Reducer::Mean,
        family: UnitFamily::Temperature,
        storage_units: "K",
        default_units: "F",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[],
    },
    IndicatorDefinition {
        name: "average_low_temperature",
        label: "Average Low Temperature",
        description: "Aggregated average low temperature",
        derivation: Derivation::Identity(Variable::Tasmin),
        reducer: Reducer::Mean,
        family: UnitFamily::Temperature,
        storage_units: "K",
        default_units: "F",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[],
    },
    IndicatorDefinition {
        name: "average_temperature",
        label: "Average Temperature",
        description: "Aggregated average of the daily high and low temperature",
        derivation: Derivation::Mean(Variable::Tasmax, Variable::Tasmin),
        reducer: Reducer::Mean,
        family: UnitFamily::Temperature,
        storage_units: "K",
        default_units: "F",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[],
    },
    IndicatorDefinition {
        name: "max_high_temperature",
        label: "Maximum High Temperature",
        description: "Maximum high temperature",
        derivation: Derivation::Identity(Variable::Tasmax),
        reducer: Reducer::Max,
        family: UnitFamily::Temperature,
        storage_units: "K",
        default_units: "F",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[],
    },
    IndicatorDefinition {
        name: "min_low_temperature",
        label: "Minimum Low Temperature",
        description: "Minimum low temperature",
        derivation: Derivation::Identity(Variable::Tasmin),
        reducer: Reducer::Min,
        family: UnitFamily::Temperature,
        storage_units: "K",
        default_units: "F",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[],
    },
    IndicatorDefinition {
        name: "diurnal_temperature_range",
        label: "Diurnal Temperature Range",
        description: "Average difference between the daily high and low temperature",
        derivation: Derivation::Difference(Variable::Tasmax, Variable::Tasmin),
        reducer: Reducer::Mean,
        family: UnitFamily::TemperatureDelta,
        storage_units: "K",
        default_units: "F",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[],
    },
    IndicatorDefinition {
        name: "percentile_high_temperature",
        label: "Percentile High Temperature",
        description: "The specified percentile of the daily high temperature",
        derivation: Derivation::Identity(Variable::Tasmax),
        reducer: Reducer::Percentile,
        family: UnitFamily::Temperature,
        storage_units: "K",
        default_units: "F",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[ExtraParameter::Percentile { default: None }],
    },
    IndicatorDefinition {
        name: "percentile_low_temperature",
        label: "Percentile Low Temperature",
        description: "The specified percentile of the daily low temperature",
        derivation: Derivation::Identity(Variable::Tasmin),
        reducer: Reducer::Percentile,
        family: UnitFamily::Temperature,
        storage_units: "K",
        default_units: "F",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[ExtraParameter::Percentile { default: None }],
    },
    IndicatorDefinition {
        name: "total_precipitation",
        label: "Total Precipitation",
        description: "Total precipitation",
        derivation: Derivation::RateToDepth(Variable::Pr),
        reducer: Reducer::Sum,
        family: UnitFamily::PrecipitationDepth,
        storage_units: "kg/m^2",
        default_units: "in",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[],
    },
    IndicatorDefinition {
        name: "average_precipitation",
        label: "Average Precipitation",
        description: "Average daily precipitation rate",
        derivation: Derivation::Identity(Variable::Pr),
        reducer: Reducer::Mean,
        family: UnitFamily::PrecipitationRate,
        storage_units: "kg/m^2/s",
        default_units: "in/day",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[],
    },
    IndicatorDefinition {
        name: "percentile_precipitation",
        label: "Percentile Precipitation",
        description: "The specified percentile of the daily precipitation rate",
        derivation: Derivation::Identity(Variable::Pr),
        reducer: Reducer::Percentile,
        family: UnitFamily::PrecipitationRate,
        storage_units: "kg/m^2/s",
        default_units: "in/day",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[ExtraParameter::Percentile { default: None }],
    },
    IndicatorDefinition {
        name: "max_temperature_threshold",
        label: "Max Temperature Threshold",
        description: "Number of days where the high temperature meets the threshold",
        derivation: Derivation::RequestedThreshold {
            variable: Variable::Tasmax,
        },
        reducer: Reducer::Sum,
        family: UnitFamily::Count,
        storage_units: "days",
        default_units: "days",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[ExtraParameter::Threshold],
    },
    IndicatorDefinition {
        name: "min_temperature_threshold",
        label: "Min Temperature Threshold",
        description: "Number of days where the low temperature meets the threshold",
        derivation: Derivation::RequestedThreshold {
            variable: Variable::Tasmin,
        },
        reducer: Reducer::Sum,
        family: UnitFamily::Count,
        storage_units: "days",
        default_units: "days",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[ExtraParameter::Threshold],
    },
    IndicatorDefinition {
        name: "precipitation_threshold",
        label: "Precipitation Threshold",
        description: "Number of days where the precipitation rate meets the threshold",
        derivation: Derivation::RequestedThreshold {
            variable: Variable::Pr,
        },
        reducer: Reducer::Sum,
        family: UnitFamily::Count,
        storage_units: "days",
        default_units: "days",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[ExtraParameter::Threshold],
    },
    IndicatorDefinition {
        name: "frost_days",
        label: "Frost Days",
        description: "Number of days where the low temperature is below freezing",
        derivation: Derivation::FixedThreshold {
            variable: Variable::Tasmin,
            comparator: Comparator::Lt,
            value: FREEZING_K,
        },
        reducer: Reducer::Sum,
        family: UnitFamily::Count,
        storage_units: "days",
        default_units: "days",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[],
    },
    IndicatorDefinition {
        name: "heating_degree_days",
        label: "Heating Degree Days",
        description: "Total difference of the daily average temperature below a base temperature",
        derivation: Derivation::DegreeDays {
            kind: DegreeDayKind::Heating,
        },
        reducer: Reducer::Sum,
        family: UnitFamily::TemperatureDelta,
        storage_units: "K",
        default_units: "F",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[ExtraParameter::BaseTemperature],
    },
    IndicatorDefinition {
        name: "cooling_degree_days",
        label: "Cooling Degree Days",
        description: "Total difference of the daily average temperature above a base temperature",
        derivation: Derivation::DegreeDays {
            kind: DegreeDayKind::Cooling,
        },
        reducer: Reducer::Sum,
        family: UnitFamily::TemperatureDelta,
        storage_units: "K",
        default_units: "F",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[ExtraParameter::BaseTemperature],
    },
    IndicatorDefinition {
        name: "extreme_heat_events",
        label: "Extreme Heat Events",
        description: "Number of days where the high temperature exceeds a historic percentile",
        derivation: Derivation::HistoricPercentile {
            variable: Variable::Tasmax,
            comparator: Comparator::Gt,
        },
        reducer: Reducer::Sum,
        family: UnitFamily::Count,
        storage_units: "days",
        default_units: "days",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[
            ExtraParameter::Percentile { default: Some(99) },
            ExtraParameter::HistoricRange,
        ],
    },
    IndicatorDefinition {
        name: "extreme_cold_events",
        label: "Extreme Cold Events",
        description: "Number of days where the low temperature falls below a historic percentile",
        derivation: Derivation::HistoricPercentile {
            variable: Variable::Tasmin,
            comparator: Comparator::Lt,
        },
        reducer: Reducer::Sum,
        family: UnitFamily::Count,
        storage_units: "days",
        default_units: "days",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[
            ExtraParameter::Percentile { default: Some(1) },
            ExtraParameter::HistoricRange,
        ],
    },
    IndicatorDefinition {
        name: "extreme_precipitation_events",
        label: "Extreme Precipitation Events",
        description: "Number of days where precipitation exceeds a historic percentile",
        derivation: Derivation::HistoricPercentile {
            variable: Variable::Pr,
            comparator: Comparator::Gt,
        },
        reducer: Reducer::Sum,
        family: UnitFamily::Count,
        storage_units: "days",
        default_units: "days",
        valid_aggregations: ALL_AGGREGATIONS,
        parameters: &[
            ExtraParameter::Percentile { default: Some(99) },
            ExtraParameter::HistoricRange,
        ],
    },
    IndicatorDefinition {
        name: "max_consecutive_dry_days",
        label: "Max Consecutive Dry Days",
        description: "Longest run of days with under 1 mm of precipitation",
        derivation: Derivation::FixedThreshold {
            variable: Variable::Pr,
            comparator: Comparator::Lt,
            value: DRY_DAY_RATE,
        },
        reducer: Reducer::LongestRun,
        family: UnitFamily::Count,
        storage_units: "days",
        default_units: "days",
        valid_aggregations: YEAR_LIKE,
        parameters: &[],
    },
    IndicatorDefinition {
        name: "dry_spells",
        label: "Dry Spells",
        description: "Number of runs of at least 5 consecutive days with under 1 mm of precipitation",
        derivation: Derivation::FixedThreshold {
            variable: Variable::Pr,
            comparator: Comparator::Lt,
            value: DRY_DAY_RATE,
        },
        reducer: Reducer::RunCount { min_length: 5 },
        family: UnitFamily::Count,
        storage_units: "days",
        default_units: "days",
        valid_aggregations: YEAR_LIKE,
        parameters: &[],
    },
];

pub fn find(name: &str) -> Option<&'static IndicatorDefinition> {
    INDICATORS.iter().find(|definition| definition.name == name)
}

/// Problems with the catalog itself; empty for a consistent catalog
pub fn catalog_problems() -> Vec<String> {
    let mut problems = Vec::new();

    for (i, definition) in INDICATORS.iter().enumerate() {
        let name = definition.name;
        if INDICATORS[..i].iter().any(|other| other.name == name) {
            problems.push(format!("{name}: duplicate name"));
        }
        for units in [definition.storage_units, definition.default_units] {
            if !definition.family.contains(units) {
                problems.push(format!("{name}: '{units}' is not a {} unit", definition.family));
            }
        }
        if definition.valid_aggregations.is_empty() {
            problems.push(format!("{name}: no valid time aggregations"));
        }

        let needs_percentile = matches!(definition.reducer, Reducer::Percentile)
            || matches!(definition.derivation, Derivation::HistoricPercentile { .. });
        if needs_percentile != definition.percentile_default().is_some() {
            problems.push(format!("{name}: percentile parameter does not match its derivation"));
        }
        let needs_threshold = matches!(definition.derivation, Derivation::RequestedThreshold { .. });
        if needs_threshold != definition.takes(ExtraParameter::Threshold) {
            problems.push(format!("{name}: threshold parameter does not match its derivation"));
        }
        let needs_basetemp = matches!(definition.derivation, Derivation::DegreeDays { .. });
        if needs_basetemp != definition.takes(ExtraParameter::BaseTemperature) {
            problems.push(format!("{name}: basetemp parameter does not match its derivation"));
        }
        let needs_historic = matches!(definition.derivation, Derivation::HistoricPercentile { .. });
        if needs_historic != definition.takes(ExtraParameter::HistoricRange) {
            problems.push(format!("{name}: historic_range parameter does not match its derivation"));
        }

        let counts = matches!(
            definition.derivation,
            Derivation::FixedThreshold { .. }
                | Derivation::RequestedThreshold { .. }
                | Derivation::HistoricPercentile { .. }
        );
        if counts != (definition.family == UnitFamily::Count) {
            problems.push(format!("{name}: flag derivations must report counts"));
        }
    }

    problems
}
