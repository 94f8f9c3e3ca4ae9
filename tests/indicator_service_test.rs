// End-to-end indicator calculations over a JSON series file

mod common;

use climate_indicators::config::Config;
use climate_indicators::error::IndicatorError;
use climate_indicators::params::{IndicatorParams, ParamError};
use climate_indicators::services::IndicatorService;
use climate_indicators::store::{SeriesRepository, StoreError};
use std::io::Write;

use common::{constant_days, series_json, tasmax_fixture, write_series_file};

fn load(file: &tempfile::NamedTempFile) -> IndicatorService<SeriesRepository> {
    let repository = SeriesRepository::from_json_file(file.path()).expect("Failed to load fixture");
    IndicatorService::new(repository, Config::default())
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn test_yearly_average_high_across_models() {
    let file = tasmax_fixture();
    let service = load(&file);

    let params = IndicatorParams {
        units: Some("C".to_string()),
        ..Default::default()
    };
    let result = service
        .calculate("average_high_temperature", "phl", "RCP85", &params)
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    let data = json["data"].as_object().unwrap();
    assert_eq!(data.keys().collect::<Vec<_>>(), vec!["2050", "2051", "2052"]);
    for bucket in data.values() {
        assert!(approx(bucket["min"].as_f64().unwrap(), 26.85));
        assert!(approx(bucket["max"].as_f64().unwrap(), 28.85));
        assert!(approx(bucket["avg"].as_f64().unwrap(), 27.85));
    }
}

#[test]
fn test_model_and_year_filters() {
    let file = tasmax_fixture();
    let service = load(&file);

    let params = IndicatorParams {
        models: Some("CCSM4".to_string()),
        years: Some("2051:2052".to_string()),
        units: Some("K".to_string()),
        agg: Some("avg".to_string()),
        ..Default::default()
    };
    let result = service
        .calculate("max_high_temperature", "phl", "RCP85", &params)
        .unwrap();

    assert_eq!(result.models, vec!["CCSM4"]);
    let keys: Vec<String> = result.data.keys().map(|k| k.to_string()).collect();
    assert_eq!(keys, vec!["2051", "2052"]);
    assert!(result.data.values().all(|b| approx(b["avg"], 302.0)));
}

#[test]
fn test_offset_yearly_yields_one_fewer_bucket() {
    let file = tasmax_fixture();
    let service = load(&file);

    let params = IndicatorParams {
        time_aggregation: Some("offset_yearly".to_string()),
        offset: Some(90),
        ..Default::default()
    };
    let result = service
        .calculate("average_high_temperature", "phl", "RCP85", &params)
        .unwrap();
    assert_eq!(result.data.len(), 2);
}

#[test]
fn test_quarterly_and_custom_keys() {
    let file = tasmax_fixture();
    let service = load(&file);

    let quarterly = service
        .calculate(
            "average_high_temperature",
            "phl",
            "RCP85",
            &IndicatorParams {
                time_aggregation: Some("quarterly".to_string()),
                years: Some("2050".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    let keys: Vec<String> = quarterly.data.keys().map(|k| k.to_string()).collect();
    assert_eq!(keys, vec!["2050-Q1", "2050-Q2", "2050-Q3", "2050-Q4"]);

    let custom = service
        .calculate(
            "average_high_temperature",
            "phl",
            "RCP85",
            &IndicatorParams {
                time_aggregation: Some("custom".to_string()),
                custom_time_agg: Some("6-1:8-31,12-1:12-31".to_string()),
                years: Some("2050".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    let keys: Vec<String> = custom.data.keys().map(|k| k.to_string()).collect();
    assert_eq!(keys, vec!["2050-01", "2050-02"]);
}

#[test]
fn test_extreme_heat_events_use_historical_baseline() {
    let file = tasmax_fixture();
    let service = load(&file);

    // Pooled 99th percentile is 302 K; neither model's future exceeds it
    let result = service
        .calculate("extreme_heat_events", "phl", "RCP85", &IndicatorParams::default())
        .unwrap();
    assert_eq!(result.data.len(), 3);
    assert!(result.data.values().all(|b| approx(b["min"], 0.0)));
    assert!(result.data.values().all(|b| approx(b["max"], 0.0)));
}

#[test]
fn test_unknown_city_yields_empty_map() {
    let file = tasmax_fixture();
    let service = load(&file);

    let result = service
        .calculate("average_high_temperature", "nowhere", "RCP85", &IndicatorParams::default())
        .unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["data"], serde_json::json!({}));
}

#[test]
fn test_degree_days_default_base() {
    // 70 F highs and 60 F lows average to the 65 F default base
    let high = (70.0 + 459.67) * 5.0 / 9.0;
    let low = (60.0 + 459.67) * 5.0 / 9.0;
    let file = write_series_file(vec![serde_json::json!({
        "city": "phl",
        "scenario": "RCP85",
        "model": "CCSM4",
        "year": 2050,
        "variables": {
            "tasmax": constant_days(2050, high),
            "tasmin": constant_days(2050, low)
        }
    })]);
    let service = load(&file);

    let result = service
        .calculate("heating_degree_days", "phl", "RCP85", &IndicatorParams::default())
        .unwrap();
    assert!(result.data.values().all(|b| b["max"].abs() < 1e-6));

    let params = IndicatorParams {
        basetemp: Some(75.0),
        ..Default::default()
    };
    let result = service
        .calculate("heating_degree_days", "phl", "RCP85", &params)
        .unwrap();
    let bucket = result.data.values().next().unwrap();
    assert!((bucket["avg"] - 10.0 * 365.0).abs() < 1e-6);
}

#[test]
fn test_precipitation_threshold_counts_days() {
    let mut rates = constant_days(2050, 0.0);
    let wet = 10.0 / 86_400.0;
    for day in rates.iter_mut().take(20) {
        *day = wet;
    }
    let file = write_series_file(vec![series_json("CCSM4", "RCP85", 2050, "pr", rates)]);
    let service = load(&file);

    let params = IndicatorParams {
        threshold: Some(5.0),
        threshold_units: Some("mm/day".to_string()),
        threshold_comparator: Some("gt".to_string()),
        agg: Some("avg".to_string()),
        ..Default::default()
    };
    let result = service
        .calculate("precipitation_threshold", "phl", "RCP85", &params)
        .unwrap();
    assert!(approx(result.data.values().next().unwrap()["avg"], 20.0));

    let dry = service
        .calculate("max_consecutive_dry_days", "phl", "RCP85", &IndicatorParams::default())
        .unwrap();
    assert!(approx(dry.data.values().next().unwrap()["max"], 345.0));
}

#[test]
fn test_validation_errors() {
    let file = tasmax_fixture();
    let service = load(&file);

    let err = service
        .calculate(
            "max_temperature_threshold",
            "phl",
            "RCP85",
            &IndicatorParams::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        IndicatorError::Param(ParamError::MissingRequiredParameter("threshold"))
    ));

    let err = service
        .calculate(
            "dry_spells",
            "phl",
            "RCP85",
            &IndicatorParams {
                time_aggregation: Some("monthly".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        IndicatorError::Param(ParamError::InvalidParameter {
            name: "time_aggregation",
            ..
        })
    ));
}

#[test]
fn test_malformed_data_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{\"series\": [").unwrap();
    assert!(matches!(
        SeriesRepository::from_json_file(file.path()),
        Err(StoreError::Parse(_))
    ));
    assert!(matches!(
        SeriesRepository::from_json_file(std::path::Path::new("/nonexistent/series.json")),
        Err(StoreError::Io(_))
    ));
}
