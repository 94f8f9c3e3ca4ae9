pub mod error;
pub mod models;
pub mod series_repository;

pub use error::StoreError;
pub use models::*;
pub use series_repository::{SeriesRepository, SeriesSource};
