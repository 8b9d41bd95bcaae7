//! Data models for options chains and their derived analytics
//!
//! This module contains the contract and chain structures, the canonical
//! table builder, and the Greeks, sentiment and volatility surface views
//! derived from it.

pub mod chain;
pub mod contract;
pub mod greeks;
pub mod option;
pub mod ratio;
pub mod sentiment;
pub mod volatility;

pub use chain::{normalize, normalize_at, normalize_on};
pub use contract::{classify_contract, ContractSymbol};
pub use greeks::{compute_greeks, compute_leverage, enrich, DomainViolation, Greeks, GreeksOutcome, GreeksRow};
pub use option::*;
pub use ratio::Ratio;
pub use sentiment::{
    aggregate, classify_sentiment, monthly, MonthlyRatio, MonthlySentiment, Sentiment,
    SentimentSnapshot, YearMonth,
};
pub use volatility::{
    build_surface, NegativeVolPolicy, SurfaceAxis, SurfaceParams, VolatilitySurfaceGrid,
};
