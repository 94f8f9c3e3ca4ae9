// Indicator catalog and the derivation stage that feeds the partitioner

pub mod definitions;
pub mod derive;

pub use definitions::{
    find, Derivation, ExtraParameter, IndicatorDefinition, Reducer, HISTORIC_SCENARIO, INDICATORS,
};
pub use derive::{Comparator, DailyTransform, DegreeDayKind, DeriveError, Reduction};
