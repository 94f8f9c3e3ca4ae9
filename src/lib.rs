pub mod collate;
pub mod config;
pub mod error;
pub mod indicators;
pub mod params;
pub mod partition;
pub mod services;
pub mod stats;
pub mod store;
pub mod units;
