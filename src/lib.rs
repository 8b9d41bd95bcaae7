//! # options-analytics
//!
//! Options chain analytics: a canonical chain table, Black-Scholes Greeks,
//! call/put volume sentiment and smoothed implied volatility surfaces.
//!
//! ## Features
//!
//! - Contract identifier decoding and chain normalization
//! - Greeks and implied leverage per contract, computed in parallel
//! - Aggregate and monthly call/put ratios with sentiment labels
//! - Scattered-data volatility surface interpolation with Gaussian smoothing
//! - Provider-driven async REST client with timeouts and rate limiting
//! - Polars export and JSON chart specifications
//! - Environment-based configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use options_analytics::analysis::{analyze, AnalysisRequest};
//! use options_analytics::api::{fetch_full_chain, PriceSource, RestClient};
//! use options_analytics::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> options_analytics::error::Result<()> {
//!     let config = Config::from_env()?;
//!     config.init_logging()?;
//!
//!     let client = RestClient::new(&config.provider)?;
//!     let spot = client.latest_price("MA").await?;
//!     let batches = fetch_full_chain(&client, "MA").await?;
//!
//!     let request = AnalysisRequest::new("MA", spot, config.risk_free_rate);
//!     let report = analyze(&request, &batches)?;
//!     println!("{} ({})", report.sentiment.ratio, report.sentiment.sentiment());
//!
//!     if let Some(grid) = report.surface.grid() {
//!         println!("surface from {} samples", grid.samples);
//!     }
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod utils;

// Re-export commonly used types
pub use analysis::{analyze, AnalysisRequest, ChainReport, SurfaceOutcome};
pub use api::RestClient;
pub use config::Config;
pub use error::{OptionsError, Result};
