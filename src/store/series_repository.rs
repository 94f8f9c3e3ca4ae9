use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::store::{DailySeries, SeriesFile, SeriesQuery, StoreError};

/// Read-only access to raw daily series
///
/// `select` must yield series ordered by model, then year.
pub trait SeriesSource {
    /// Every model the source holds data for
    fn models(&self) -> Vec<String>;

    /// Every scenario the source holds data for
    fn scenarios(&self) -> Vec<String>;

    fn select<'a>(
        &'a self,
        query: &SeriesQuery,
    ) -> Result<Box<dyn Iterator<Item = DailySeries> + 'a>, StoreError>;
}

/// In-memory series store, optionally loaded from a JSON data file
#[derive(Debug, Clone, Default)]
pub struct SeriesRepository {
    series: Vec<DailySeries>,
}

impl SeriesRepository {
    pub fn new(mut series: Vec<DailySeries>) -> Self {
        series.sort_by(|a, b| {
            (&a.model, a.year, &a.city, &a.scenario).cmp(&(&b.model, b.year, &b.city, &b.scenario))
        });
        Self { series }
    }

    #[instrument]
    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let contents = fs::read_to_string(path)?;
        let file: SeriesFile = serde_json::from_str(&contents)?;
        info!("Loaded {} series from {}", file.series.len(), path.display());
        Ok(Self::new(file.series))
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl SeriesSource for SeriesRepository {
    fn models(&self) -> Vec<String> {
        let models: BTreeSet<&String> = self.series.iter().map(|s| &s.model).collect();
        models.into_iter().cloned().collect()
    }

    fn scenarios(&self) -> Vec<String> {
        let scenarios: BTreeSet<&String> = self.series.iter().map(|s| &s.scenario).collect();
        scenarios.into_iter().cloned().collect()
    }

    fn select<'a>(
        &'a self,
        query: &SeriesQuery,
    ) -> Result<Box<dyn Iterator<Item = DailySeries> + 'a>, StoreError> {
        debug!(
            "Selecting series for city {} scenario {} ({} models)",
            query.city,
            query.scenario,
            query.models.len()
        );

        let variables = query.variables.clone();
        let query = query.clone();
        Ok(Box::new(
            self.series
                .iter()
                .filter(move |series| query.matches(series))
                .map(move |series| DailySeries {
                    city: series.city.clone(),
                    scenario: series.scenario.clone(),
                    model: series.model.clone(),
                    year: series.year,
                    variables: series
                        .variables
                        .iter()
                        .filter(|(variable, _)| variables.contains(variable))
                        .map(|(variable, values)| (*variable, values.clone()))
                        .collect(),
                }),
        ))
    }
}
