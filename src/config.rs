use crate::error::{OptionsError, Result};
use dotenv::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Configuration for the market-data provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Name of the provider descriptor to use (see `api::ProviderDescriptor`)
    pub name: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Maximum number of requests sent per second
    pub requests_per_second: u32,
}

/// Configuration for the application
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Provider configuration
    pub provider: ProviderConfig,
    /// Annualized risk-free rate used for the Greeks
    pub risk_free_rate: f64,
    /// Log level
    pub log_level: String,
    /// Directory receiving chart specifications
    pub output_dir: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let name = env::var("OPTIONS_PROVIDER").unwrap_or_else(|_| "yahoo".to_string());
        let request_timeout_secs = parse_var("REQUEST_TIMEOUT_SECS", 10u64)?;
        let requests_per_second = parse_var("REQUESTS_PER_SECOND", 5u32)?;
        if requests_per_second == 0 {
            return Err(OptionsError::ConfigError(
                "REQUESTS_PER_SECOND must be at least 1".to_string(),
            ));
        }

        let risk_free_rate = parse_var("RISK_FREE_RATE", 0.05f64)?;
        if !risk_free_rate.is_finite() {
            return Err(OptionsError::ConfigError(
                "RISK_FREE_RATE must be a finite number".to_string(),
            ));
        }

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let output_dir = env::var("OUTPUT_DIR").unwrap_or_else(|_| "output".to_string());

        Ok(Config {
            provider: ProviderConfig {
                name,
                request_timeout_secs,
                requests_per_second,
            },
            risk_free_rate,
            log_level,
            output_dir,
        })
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level));

        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .map_err(|e| OptionsError::ConfigError(format!("Failed to initialize logging: {}", e)))
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| {
            OptionsError::ConfigError(format!("{} has invalid value '{}': {}", key, raw, e))
        }),
        Err(_) => Ok(default),
    }
}
