pub mod black_scholes;
pub mod charts;
pub mod interpolation;
pub mod polars_utils;
pub mod smoothing;

pub use charts::{greeks_chart, monthly_sentiment_chart, surface_chart, GreekKind};
pub use polars_utils::{canonical_frame, enriched_frame, monthly_frame, volume_by_type};
