/// Indicator request parameters and their validation
///
/// `IndicatorParams` mirrors the raw request vocabulary. Validation against an
/// indicator definition produces an `IndicatorRequest` with every value
/// resolved, defaulted and converted to storage units.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::indicators::{Comparator, Derivation, ExtraParameter, IndicatorDefinition};
use crate::partition::{
    CustomSpans, InvalidTimeAggregation, SpanError, TimeAggregation, TimeAggregationKind,
};
use crate::stats::{parse_stat_list, StatKind};
use crate::units::{convert, UnitError, UnitFamily};

pub const MIN_YEAR: i32 = 1950;
pub const MAX_YEAR: i32 = 2100;

pub const HISTORIC_RANGE_STARTS: [i32; 4] = [1951, 1961, 1971, 1981];
pub const HISTORIC_RANGE_YEARS: i32 = 30;
pub const DEFAULT_HISTORIC_RANGE: i32 = 1961;

const DEFAULT_BASETEMP: f64 = 65.0;
const DEFAULT_BASETEMP_UNITS: &str = "F";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Missing required parameter '{0}'")]
    MissingRequiredParameter(&'static str),

    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error(transparent)]
    TimeAggregation(#[from] InvalidTimeAggregation),

    #[error(transparent)]
    Span(#[from] SpanError),
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ParamError {
    ParamError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

/// Raw request parameters; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub models: Option<String>,
    pub years: Option<String>,
    pub time_aggregation: Option<String>,
    pub custom_time_agg: Option<String>,
    pub offset: Option<i64>,
    pub units: Option<String>,
    pub agg: Option<String>,
    pub threshold: Option<f64>,
    pub threshold_units: Option<String>,
    pub threshold_comparator: Option<String>,
    pub basetemp: Option<f64>,
    pub basetemp_units: Option<String>,
    pub percentile: Option<i64>,
    pub historic_range: Option<String>,
}

/// A threshold converted to the variable's storage units
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Threshold {
    pub value: f64,
    pub comparator: Comparator,
}

/// A 30-year historic baseline identified by its first year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoricRange {
    pub start: i32,
}

impl HistoricRange {
    pub fn end(&self) -> i32 {
        self.start + HISTORIC_RANGE_YEARS - 1
    }

    pub fn years(&self) -> Vec<i32> {
        (self.start..=self.end()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRequest {
    pub models: Vec<String>,
    /// `None` selects every year
    pub years: Option<Vec<i32>>,
    pub aggregation: TimeAggregation,
    pub units: String,
    pub stats: Vec<StatKind>,
    pub threshold: Option<Threshold>,
    /// Base temperature in K
    pub basetemp: Option<f64>,
    pub percentile: Option<u8>,
    pub historic_range: Option<HistoricRange>,
}

impl IndicatorParams {
    pub fn validate(
        &self,
        definition: &IndicatorDefinition,
        available_models: &[String],
        config: &Config,
    ) -> Result<IndicatorRequest, ParamError> {
        Ok(IndicatorRequest {
            models: self.parse_models(available_models)?,
            years: self.parse_years()?,
            aggregation: self.parse_aggregation(definition, config)?,
            units: self.parse_units(definition)?,
            stats: self.parse_stats(config)?,
            threshold: self.parse_threshold(definition)?,
            basetemp: self.parse_basetemp(definition)?,
            percentile: self.parse_percentile(definition)?,
            historic_range: self.parse_historic_range(definition)?,
        })
    }

    fn parse_models(&self, available: &[String]) -> Result<Vec<String>, ParamError> {
        let requested = match self.models.as_deref().map(str::trim) {
            None | Some("") => return Ok(available.to_vec()),
            Some(models) => models,
        };

        let mut models: Vec<String> = Vec::new();
        for model in requested.split(',').map(str::trim).filter(|m| !m.is_empty()) {
            if !available.iter().any(|a| a == model) {
                return Err(invalid("models", format!("unknown model '{model}'")));
            }
            if !models.iter().any(|m| m == model) {
                models.push(model.to_string());
            }
        }
        Ok(models)
    }

    fn parse_years(&self) -> Result<Option<Vec<i32>>, ParamError> {
        let requested = match self.years.as_deref().map(str::trim) {
            None | Some("") => return Ok(None),
            Some(years) => years,
        };

        let parse_year = |value: &str| -> Result<i32, ParamError> {
            let year: i32 = value
                .trim()
                .parse()
                .map_err(|_| invalid("years", format!("'{value}' is not a year")))?;
            if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
                return Err(invalid(
                    "years",
                    format!("{year} is outside {MIN_YEAR}-{MAX_YEAR}"),
                ));
            }
            Ok(year)
        };

        let mut years = Vec::new();
        for part in requested.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once(':') {
                Some((start, end)) => {
                    let (start, end) = (parse_year(start)?, parse_year(end)?);
                    if start > end {
                        return Err(invalid("years", format!("range {start}:{end} is backwards")));
                    }
                    years.extend(start..=end);
                }
                None => years.push(parse_year(part)?),
            }
        }
        years.sort_unstable();
        years.dedup();
        Ok(Some(years))
    }

    fn parse_aggregation(
        &self,
        definition: &IndicatorDefinition,
        config: &Config,
    ) -> Result<TimeAggregation, ParamError> {
        let kind: TimeAggregationKind = self
            .time_aggregation
            .as_deref()
            .unwrap_or(TimeAggregationKind::Yearly.as_str())
            .parse()?;

        if !definition.supports(kind) {
            return Err(invalid(
                "time_aggregation",
                format!("{} does not support {kind}", definition.name),
            ));
        }

        Ok(match kind {
            TimeAggregationKind::Yearly => TimeAggregation::Yearly,
            TimeAggregationKind::Monthly => TimeAggregation::Monthly,
            TimeAggregationKind::Quarterly => TimeAggregation::Quarterly,
            TimeAggregationKind::OffsetYearly => {
                let offset = match self.offset {
                    None => config.default_offset,
                    Some(offset) => usize::try_from(offset)
                        .ok()
                        .filter(|o| *o <= 365)
                        .ok_or_else(|| invalid("offset", format!("{offset} is outside 0-365")))?,
                };
                TimeAggregation::OffsetYearly { offset }
            }
            TimeAggregationKind::Custom => {
                let spans = self
                    .custom_time_agg
                    .as_deref()
                    .ok_or(ParamError::MissingRequiredParameter("custom_time_agg"))?;
                TimeAggregation::Custom(CustomSpans::parse(spans)?)
            }
        })
    }

    fn parse_units(&self, definition: &IndicatorDefinition) -> Result<String, ParamError> {
        let units = self.units.as_deref().unwrap_or(definition.default_units);
        if !definition.family.contains(units) {
            return Err(UnitError::UnknownUnit {
                unit: units.to_string(),
                family: definition.family,
            }
            .into());
        }
        Ok(units.to_string())
    }

    fn parse_stats(&self, config: &Config) -> Result<Vec<StatKind>, ParamError> {
        let agg = self.agg.as_deref().unwrap_or(&config.default_agg);
        let stats = parse_stat_list(agg).map_err(|e| invalid("agg", e.to_string()))?;
        if stats.is_empty() {
            return Err(invalid("agg", "no statistics requested"));
        }
        Ok(stats)
    }

    fn parse_threshold(
        &self,
        definition: &IndicatorDefinition,
    ) -> Result<Option<Threshold>, ParamError> {
        let variable = match definition.derivation {
            Derivation::RequestedThreshold { variable } => variable,
            _ => return Ok(None),
        };

        let value = self
            .threshold
            .ok_or(ParamError::MissingRequiredParameter("threshold"))?;
        let units = self
            .threshold_units
            .as_deref()
            .ok_or(ParamError::MissingRequiredParameter("threshold_units"))?;
        let comparator: Comparator = self
            .threshold_comparator
            .as_deref()
            .ok_or(ParamError::MissingRequiredParameter("threshold_comparator"))?
            .parse()
            .map_err(|reason: String| invalid("threshold_comparator", reason))?;

        let value = convert(value, units, variable.storage_units(), variable.family())?;
        Ok(Some(Threshold { value, comparator }))
    }

    fn parse_basetemp(&self, definition: &IndicatorDefinition) -> Result<Option<f64>, ParamError> {
        if !definition.takes(ExtraParameter::BaseTemperature) {
            return Ok(None);
        }
        let value = self.basetemp.unwrap_or(DEFAULT_BASETEMP);
        let units = self
            .basetemp_units
            .as_deref()
            .unwrap_or(DEFAULT_BASETEMP_UNITS);
        Ok(Some(convert(value, units, "K", UnitFamily::Temperature)?))
    }

    fn parse_percentile(&self, definition: &IndicatorDefinition) -> Result<Option<u8>, ParamError> {
        let default = match definition.percentile_default() {
            None => return Ok(None),
            Some(default) => default,
        };

        match self.percentile {
            None => default
                .map(Some)
                .ok_or(ParamError::MissingRequiredParameter("percentile")),
            Some(p) => u8::try_from(p)
                .ok()
                .filter(|p| (1..=99).contains(p))
                .map(Some)
                .ok_or_else(|| invalid("percentile", format!("{p} is outside 1-99"))),
        }
    }

    fn parse_historic_range(
        &self,
        definition: &IndicatorDefinition,
    ) -> Result<Option<HistoricRange>, ParamError> {
        if !definition.takes(ExtraParameter::HistoricRange) {
            return Ok(None);
        }
        let start = match self.historic_range.as_deref() {
            None => DEFAULT_HISTORIC_RANGE,
            Some(value) => value
                .trim()
                .parse::<i32>()
                .ok()
                .filter(|start| HISTORIC_RANGE_STARTS.contains(start))
                .ok_or_else(|| {
                    invalid(
                        "historic_range",
                        format!("'{value}' is not one of {HISTORIC_RANGE_STARTS:?}"),
                    )
                })?,
        };
        Ok(Some(HistoricRange { start }))
    }
}
