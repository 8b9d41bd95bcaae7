use crate::models::DomainViolation;
use thiserror::Error;

/// Custom error types for the options-analytics library
#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("Cannot decode contract identifier '{identifier}': {reason}")]
    ContractDecode { identifier: String, reason: String },

    #[error("Chain normalization failed at contract '{identifier}': {source}")]
    Normalization {
        identifier: String,
        #[source]
        source: Box<OptionsError>,
    },

    #[error("Contract '{identifier}' expired on {expiration}, before evaluation date {as_of}")]
    ExpiredContract {
        identifier: String,
        expiration: chrono::NaiveDate,
        as_of: chrono::NaiveDate,
    },

    #[error("Greeks domain error: {0}")]
    Domain(DomainViolation),

    #[error("Degenerate volatility surface: {0}")]
    DegenerateSurface(String),

    #[error("No data available: {0}")]
    DataUnavailable(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    PolarsError(#[from] polars::prelude::PolarsError),
}

impl From<DomainViolation> for OptionsError {
    fn from(violation: DomainViolation) -> Self {
        OptionsError::Domain(violation)
    }
}

pub type Result<T> = std::result::Result<T, OptionsError>;
