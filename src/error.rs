use thiserror::Error;

use crate::collate::CollateError;
use crate::indicators::DeriveError;
use crate::params::ParamError;
use crate::partition::PartitionError;
use crate::stats::StatsError;
use crate::store::StoreError;
use crate::units::UnitError;

#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("Unknown indicator '{0}'")]
    UnknownIndicator(String),

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error("No {scenario} baseline data for {city} in {start}-{end}")]
    MissingBaseline {
        city: String,
        scenario: String,
        start: i32,
        end: i32,
    },

    #[error("Data store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Derive(#[from] DeriveError),

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error(transparent)]
    Collate(#[from] CollateError),

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error(transparent)]
    Unit(#[from] UnitError),
}
