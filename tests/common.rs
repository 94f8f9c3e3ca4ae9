// Shared fixtures for integration tests
#![allow(dead_code)]

use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

use climate_indicators::partition::spans::days_in_year;

pub fn constant_days(year: i32, value: f64) -> Vec<f64> {
    vec![value; days_in_year(year)]
}

pub fn series_json(model: &str, scenario: &str, year: i32, variable: &str, values: Vec<f64>) -> serde_json::Value {
    json!({
        "city": "phl",
        "scenario": scenario,
        "model": model,
        "year": year,
        "variables": { variable: values }
    })
}

/// Write `series` as a data file and keep it alive for the test
pub fn write_series_file(series: Vec<serde_json::Value>) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    let contents = json!({ "series": series });
    write!(file, "{contents}").expect("Failed to write series file");
    file
}

/// Two models, three RCP85 years and a historical baseline year, all tasmax
pub fn tasmax_fixture() -> NamedTempFile {
    let mut series = Vec::new();
    for (model, value) in [("ACCESS1-0", 300.0), ("CCSM4", 302.0)] {
        for year in 2050..2053 {
            series.push(series_json(model, "RCP85", year, "tasmax", constant_days(year, value)));
        }
        series.push(series_json(model, "historical", 1961, "tasmax", constant_days(1961, value)));
    }
    write_series_file(series)
}
