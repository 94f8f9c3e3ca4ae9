/// Unit conversion for temperature and precipitation values
///
/// Every unit is defined as a `(zero, scale)` pair against its family's
/// reference unit, so that `reference = (value + zero) * scale`. Converting
/// between two units of one family collapses to `(value + offset) * ratio`.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("Unknown unit '{unit}' for {family}")]
    UnknownUnit { unit: String, family: UnitFamily },
}

/// Independent groups of units; conversion never crosses families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitFamily {
    Temperature,
    TemperatureDelta,
    PrecipitationRate,
    PrecipitationDepth,
    Count,
}

const SECONDS_PER_DAY: f64 = 86_400.0;
const MM_PER_INCH: f64 = 25.4;

const TEMPERATURE_UNITS: &[(&str, f64, f64)] = &[
    ("K", 0.0, 1.0),
    ("C", 273.15, 1.0),
    ("F", 459.67, 5.0 / 9.0),
];

const TEMPERATURE_DELTA_UNITS: &[(&str, f64, f64)] =
    &[("K", 0.0, 1.0), ("C", 0.0, 1.0), ("F", 0.0, 5.0 / 9.0)];

const PRECIPITATION_RATE_UNITS: &[(&str, f64, f64)] = &[
    ("kg/m^2/s", 0.0, 1.0),
    ("kg/m^2/day", 0.0, 1.0 / SECONDS_PER_DAY),
    ("mm/day", 0.0, 1.0 / SECONDS_PER_DAY),
    ("in/day", 0.0, MM_PER_INCH / SECONDS_PER_DAY),
];

const PRECIPITATION_DEPTH_UNITS: &[(&str, f64, f64)] =
    &[("kg/m^2", 0.0, 1.0), ("mm", 0.0, 1.0), ("in", 0.0, MM_PER_INCH)];

const COUNT_UNITS: &[(&str, f64, f64)] = &[("days", 0.0, 1.0)];

impl UnitFamily {
    fn table(self) -> &'static [(&'static str, f64, f64)] {
        match self {
            UnitFamily::Temperature => TEMPERATURE_UNITS,
            UnitFamily::TemperatureDelta => TEMPERATURE_DELTA_UNITS,
            UnitFamily::PrecipitationRate => PRECIPITATION_RATE_UNITS,
            UnitFamily::PrecipitationDepth => PRECIPITATION_DEPTH_UNITS,
            UnitFamily::Count => COUNT_UNITS,
        }
    }

    /// Unit names registered for this family
    pub fn unit_names(self) -> Vec<&'static str> {
        self.table().iter().map(|(name, _, _)| *name).collect()
    }

    pub fn contains(self, unit: &str) -> bool {
        self.table().iter().any(|(name, _, _)| *name == unit)
    }

    /// The family used for spreads and differences of values in this family
    pub fn delta(self) -> UnitFamily {
        match self {
            UnitFamily::Temperature => UnitFamily::TemperatureDelta,
            other => other,
        }
    }

    fn lookup(self, unit: &str) -> Result<(f64, f64), UnitError> {
        self.table()
            .iter()
            .find(|(name, _, _)| *name == unit)
            .map(|(_, zero, scale)| (*zero, *scale))
            .ok_or_else(|| UnitError::UnknownUnit {
                unit: unit.to_string(),
                family: self,
            })
    }
}

impl fmt::Display for UnitFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitFamily::Temperature => "temperature",
            UnitFamily::TemperatureDelta => "temperature delta",
            UnitFamily::PrecipitationRate => "precipitation rate",
            UnitFamily::PrecipitationDepth => "precipitation depth",
            UnitFamily::Count => "count",
        };
        f.write_str(name)
    }
}

/// A resolved conversion between two units of one family
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Converter {
    Identity,
    Linear { ratio: f64 },
    Affine { offset: f64, ratio: f64 },
}

impl Converter {
    pub fn new(from: &str, to: &str, family: UnitFamily) -> Result<Self, UnitError> {
        let (from_zero, from_scale) = family.lookup(from)?;
        let (to_zero, to_scale) = family.lookup(to)?;

        if from == to {
            return Ok(Converter::Identity);
        }

        let ratio = from_scale / to_scale;
        if from_zero == 0.0 && to_zero == 0.0 {
            Ok(Converter::Linear { ratio })
        } else {
            // (v + zf) * sf / st - zt  ==  (v + zf - zt * st / sf) * ratio
            let offset = from_zero - to_zero * to_scale / from_scale;
            Ok(Converter::Affine { offset, ratio })
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        match *self {
            Converter::Identity => value,
            Converter::Linear { ratio } => value * ratio,
            Converter::Affine { offset, ratio } => (value + offset) * ratio,
        }
    }
}

/// Convert a single value between two units of `family`
pub fn convert(value: f64, from: &str, to: &str, family: UnitFamily) -> Result<f64, UnitError> {
    Ok(Converter::new(from, to, family)?.apply(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_temperature_conversions() {
        let t = UnitFamily::Temperature;
        assert!(close(convert(0.0, "C", "F", t).unwrap(), 32.0));
        assert!(close(convert(100.0, "C", "K", t).unwrap(), 373.15));
        assert!(close(convert(273.15, "K", "C", t).unwrap(), 0.0));
        assert!(close(convert(212.0, "F", "C", t).unwrap(), 100.0));
        assert!(close(convert(-40.0, "F", "C", t).unwrap(), -40.0));
    }

    #[test]
    fn test_temperature_delta_has_no_offset() {
        let d = UnitFamily::TemperatureDelta;
        assert!(close(convert(10.0, "K", "C", d).unwrap(), 10.0));
        assert!(close(convert(10.0, "K", "F", d).unwrap(), 18.0));
        assert_eq!(
            Converter::new("C", "F", d).unwrap(),
            Converter::Linear { ratio: 9.0 / 5.0 }
        );
    }

    #[test]
    fn test_precipitation_conversions() {
        let rate = UnitFamily::PrecipitationRate;
        assert!(close(convert(1.0, "kg/m^2/s", "mm/day", rate).unwrap(), 86_400.0));
        assert!(close(convert(25.4, "mm/day", "in/day", rate).unwrap(), 1.0));

        let depth = UnitFamily::PrecipitationDepth;
        assert!(close(convert(2.0, "in", "mm", depth).unwrap(), 50.8));
        assert!(close(convert(25.4, "kg/m^2", "in", depth).unwrap(), 1.0));
    }

    #[test]
    fn test_identity_is_exact() {
        let value = 0.1 + 0.2;
        for family in [
            UnitFamily::Temperature,
            UnitFamily::PrecipitationRate,
            UnitFamily::PrecipitationDepth,
        ] {
            for unit in family.unit_names() {
                assert_eq!(convert(value, unit, unit, family).unwrap(), value);
            }
        }
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        let cases = [
            (UnitFamily::Temperature, "F", "K"),
            (UnitFamily::Temperature, "C", "F"),
            (UnitFamily::TemperatureDelta, "F", "C"),
            (UnitFamily::PrecipitationRate, "in/day", "kg/m^2/s"),
            (UnitFamily::PrecipitationDepth, "mm", "in"),
        ];
        for (family, a, b) in cases {
            for v in [-45.5, 0.0, 3.25, 310.0] {
                let there = convert(v, a, b, family).unwrap();
                let back = convert(there, b, a, family).unwrap();
                assert!((back - v).abs() < 1e-9, "{a}->{b}->{a} for {v} gave {back}");
            }
        }
    }

    #[test]
    fn test_unknown_unit() {
        let err = convert(1.0, "K", "in", UnitFamily::Temperature).unwrap_err();
        assert_eq!(
            err,
            UnitError::UnknownUnit {
                unit: "in".to_string(),
                family: UnitFamily::Temperature
            }
        );
        assert!(convert(1.0, "furlongs", "furlongs", UnitFamily::Count).is_err());
    }
}
