use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

use crate::collate::Collator;
use crate::config::Config;
use crate::error::IndicatorError;
use crate::indicators::definitions::SECONDS_PER_DAY;
use crate::indicators::{
    find, DailyTransform, Derivation, DeriveError, IndicatorDefinition, Reducer, Reduction,
    HISTORIC_SCENARIO,
};
use crate::params::{HistoricRange, IndicatorParams, IndicatorRequest, ParamError};
use crate::partition::{BucketKey, TimeAggregationKind};
use crate::stats::{aggregate, aggregate_all, StatKind};
use crate::store::{SeriesQuery, SeriesSource, Variable};
use crate::units::Converter;

/// A computed indicator: statistics per time bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorResult {
    pub indicator: String,
    pub city: String,
    pub scenario: String,
    pub models: Vec<String>,
    pub time_aggregation: TimeAggregationKind,
    pub units: String,
    pub data: BTreeMap<BucketKey, BTreeMap<String, f64>>,
}

pub struct IndicatorService<S> {
    source: S,
    config: Config,
}

impl<S: SeriesSource> IndicatorService<S> {
    pub fn new(source: S, config: Config) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Compute `indicator` for one city and scenario
    #[instrument(skip(self, params))]
    pub fn calculate(
        &self,
        indicator: &str,
        city: &str,
        scenario: &str,
        params: &IndicatorParams,
    ) -> Result<IndicatorResult, IndicatorError> {
        // Configured
        let definition =
            find(indicator).ok_or_else(|| IndicatorError::UnknownIndicator(indicator.to_string()))?;
        if !self.source.scenarios().iter().any(|s| s == scenario) {
            return Err(ParamError::InvalidParameter {
                name: "scenario",
                reason: format!("unknown scenario '{scenario}'"),
            }
            .into());
        }
        let request = params.validate(definition, &self.source.models(), &self.config)?;
        debug!(
            "Configured {} with {} models, {} aggregation, units {}",
            definition.name,
            request.models.len(),
            request.aggregation.kind(),
            request.units
        );

        let mut result = IndicatorResult {
            indicator: definition.name.to_string(),
            city: city.to_string(),
            scenario: scenario.to_string(),
            models: request.models.clone(),
            time_aggregation: request.aggregation.kind(),
            units: request.units.clone(),
            data: BTreeMap::new(),
        };

        let transform = match self.resolve_transform(definition, &request, city)? {
            Some(transform) => transform,
            None => return Ok(result),
        };
        let reduction = resolve_reduction(definition, &request)?;

        // DataSelected
        let query = SeriesQuery {
            city: city.to_string(),
            scenario: scenario.to_string(),
            models: request.models.clone(),
            years: request.years.clone(),
            variables: transform.variables(),
        };
        let series = self.source.select(&query)?;
        debug!("Selected series for {} {}", city, scenario);

        // Derived
        let strict = self.config.strict;
        let mut derive_error: Option<DeriveError> = None;
        let records = series
            .map_while(|s| match transform.derive(&s, definition.name) {
                Ok(record) => Some(Some(record)),
                Err(e) if strict => {
                    derive_error = Some(e);
                    None
                }
                Err(e) => {
                    warn!("Skipping series: {}", e);
                    Some(None)
                }
            })
            .flatten();

        // Partitioned, then reduced per model and collated across models
        let mut collator: Collator<f64> = Collator::new();
        let mut partitions = 0usize;
        for partition in request.aggregation.partition(records, strict) {
            let partition = partition?;
            partitions += 1;
            let values = partition
                .bucket
                .get(definition.name)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            if let Some(value) = reduction.reduce(values) {
                collator.add(
                    partition.key,
                    BTreeMap::from([(definition.name.to_string(), vec![value])]),
                )?;
            }
        }
        if let Some(e) = derive_error {
            return Err(e.into());
        }
        debug!("Partitioned into {} partitions, {} buckets", partitions, collator.len());

        // Aggregated and UnitConverted
        let value_units = Converter::new(definition.storage_units, &request.units, definition.family)?;
        let spread_units = Converter::new(
            definition.storage_units,
            &request.units,
            definition.family.delta(),
        )?;

        for (key, mut bucket) in collator.finish() {
            let values = bucket.remove(definition.name).unwrap_or_default();
            if values.is_empty() {
                continue;
            }
            let stats = aggregate_all(&values, &request.stats)?
                .into_iter()
                .map(|(stat, value)| {
                    let converter = if stat.is_spread() {
                        &spread_units
                    } else {
                        &value_units
                    };
                    (stat.to_string(), converter.apply(value))
                })
                .collect();
            result.data.insert(key, stats);
        }

        // Serialized
        info!(
            "Computed {} for {} {}: {} buckets",
            definition.name,
            city,
            scenario,
            result.data.len()
        );
        Ok(result)
    }

    /// `None` when the indicator cannot be computed and lenient mode applies
    fn resolve_transform(
        &self,
        definition: &IndicatorDefinition,
        request: &IndicatorRequest,
        city: &str,
    ) -> Result<Option<DailyTransform>, IndicatorError> {
        let transform = match definition.derivation {
            Derivation::Identity(v) => DailyTransform::Identity(v),
            Derivation::Mean(a, b) => DailyTransform::Mean(a, b),
            Derivation::Difference(a, b) => DailyTransform::Difference(a, b),
            Derivation::RateToDepth(v) => DailyTransform::Scale(v, SECONDS_PER_DAY),
            Derivation::FixedThreshold {
                variable,
                comparator,
                value,
            } => DailyTransform::Exceeds {
                variable,
                comparator,
                threshold: value,
            },
            Derivation::RequestedThreshold { variable } => {
                let threshold = request
                    .threshold
                    .ok_or(ParamError::MissingRequiredParameter("threshold"))?;
                DailyTransform::Exceeds {
                    variable,
                    comparator: threshold.comparator,
                    threshold: threshold.value,
                }
            }
            Derivation::HistoricPercentile {
                variable,
                comparator,
            } => {
                let percentile = request
                    .percentile
                    .ok_or(ParamError::MissingRequiredParameter("percentile"))?;
                let range = request
                    .historic_range
                    .ok_or(ParamError::MissingRequiredParameter("historic_range"))?;
                match self.historic_threshold(city, &request.models, variable, percentile, range)? {
                    Some(threshold) => DailyTransform::Exceeds {
                        variable,
                        comparator,
                        threshold,
                    },
                    None => return Ok(None),
                }
            }
            Derivation::DegreeDays { kind } => DailyTransform::DegreeDays {
                kind,
                base: request
                    .basetemp
                    .ok_or(ParamError::MissingRequiredParameter("basetemp"))?,
            },
        };
        Ok(Some(transform))
    }

    /// Percentile of every baseline value of `variable`, pooled across models
    fn historic_threshold(
        &self,
        city: &str,
        models: &[String],
        variable: Variable,
        percentile: u8,
        range: HistoricRange,
    ) -> Result<Option<f64>, IndicatorError> {
        let query = SeriesQuery {
            city: city.to_string(),
            scenario: HISTORIC_SCENARIO.to_string(),
            models: models.to_vec(),
            years: Some(range.years()),
            variables: vec![variable],
        };
        let pooled: Vec<f64> = self
            .source
            .select(&query)?
            .filter_map(|s| s.variables.get(&variable).cloned())
            .flatten()
            .flatten()
            .collect();

        if pooled.is_empty() {
            if self.config.strict {
                return Err(IndicatorError::MissingBaseline {
                    city: city.to_string(),
                    scenario: HISTORIC_SCENARIO.to_string(),
                    start: range.start,
                    end: range.end(),
                });
            }
            warn!(
                "No {} baseline for {} in {}-{}, returning no buckets",
                HISTORIC_SCENARIO,
                city,
                range.start,
                range.end()
            );
            return Ok(None);
        }

        let threshold = aggregate(&pooled, StatKind::Percentile(percentile))?;
        debug!(
            "Baseline {}th percentile of {} over {} values: {}",
            percentile,
            variable,
            pooled.len(),
            threshold
        );
        Ok(Some(threshold))
    }
}

fn resolve_reduction(
    definition: &IndicatorDefinition,
    request: &IndicatorRequest,
) -> Result<Reduction, ParamError> {
    Ok(match definition.reducer {
        Reducer::Mean => Reduction::Mean,
        Reducer::Sum => Reduction::Sum,
        Reducer::Max => Reduction::Max,
        Reducer::Min => Reduction::Min,
        Reducer::Percentile => Reduction::Percentile(
            request
                .percentile
                .ok_or(ParamError::MissingRequiredParameter("percentile"))?,
        ),
        Reducer::LongestRun => Reduction::LongestRun,
        Reducer::RunCount { min_length } => Reduction::RunCount { min_length },
    })
}
