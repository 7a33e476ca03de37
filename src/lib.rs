pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod report;
pub mod service;
pub mod source;

pub use config::AppConfig;
pub use error::ReconError;
pub use models::{ComparisonRow, DataQuality, MatchKey, MatchStatus, Period, ReconSummary, Reconciliation};
pub use service::{run, MatchOptions, ReconEngine};
