//! Request-scoped analysis of one options chain
//!
//! Runs the canonical table through the Greeks, sentiment and surface
//! builders. Every input arrives with the request; nothing is read from
//! ambient state.

use crate::error::{OptionsError, Result};
use crate::models::chain::normalize_at;
use crate::models::greeks::{enrich, GreeksRow};
use crate::models::option::{CanonicalOptionRow, ExpirationBatch, OptionType};
use crate::models::sentiment::{aggregate, monthly, MonthlySentiment, SentimentSnapshot};
use crate::models::volatility::{
    build_surface, NegativeVolPolicy, SurfaceAxis, SurfaceParams, VolatilitySurfaceGrid,
    DEFAULT_GRID_SIZE, DEFAULT_MAX_SAMPLES, DEFAULT_SMOOTHING_SIGMA,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Rows that feed the volatility surface
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceFilter {
    /// Restrict to one option type; both when `None`
    pub option_type: Option<OptionType>,
    /// Inclusive minimum traded volume
    pub min_volume: u64,
    /// Inclusive strike band; the table's strike range when `None`
    pub strike_band: Option<(f64, f64)>,
}

impl SurfaceFilter {
    pub fn accepts(&self, row: &CanonicalOptionRow) -> bool {
        if self.option_type.is_some_and(|t| t != row.option_type) {
            return false;
        }
        if row.volume < self.min_volume {
            return false;
        }
        match self.strike_band {
            Some((low, high)) => row.strike >= low && row.strike <= high,
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRequest {
    pub filter: SurfaceFilter,
    /// Use `ln(K / spot)` instead of raw strike on the second axis
    pub log_moneyness: bool,
    pub grid_size: usize,
    pub smoothing_sigma: f64,
    pub negative_policy: NegativeVolPolicy,
    pub max_samples: usize,
}

impl Default for SurfaceRequest {
    fn default() -> Self {
        Self {
            filter: SurfaceFilter::default(),
            log_moneyness: false,
            grid_size: DEFAULT_GRID_SIZE,
            smoothing_sigma: DEFAULT_SMOOTHING_SIGMA,
            negative_policy: NegativeVolPolicy::default(),
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub ticker: String,
    /// Latest underlying price; `None` when the price source had no data
    pub spot: Option<f64>,
    pub risk_free_rate: f64,
    pub surface: SurfaceRequest,
}

impl AnalysisRequest {
    pub fn new(ticker: impl Into<String>, spot: Option<f64>, risk_free_rate: f64) -> Self {
        Self {
            ticker: ticker.into(),
            spot,
            risk_free_rate,
            surface: SurfaceRequest::default(),
        }
    }

    pub fn with_surface(mut self, surface: SurfaceRequest) -> Self {
        self.surface = surface;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SurfaceOutcome {
    Built(VolatilitySurfaceGrid),
    Unavailable(String),
}

impl SurfaceOutcome {
    pub fn grid(&self) -> Option<&VolatilitySurfaceGrid> {
        match self {
            SurfaceOutcome::Built(grid) => Some(grid),
            SurfaceOutcome::Unavailable(_) => None,
        }
    }
}

/// Everything derived from one chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainReport {
    pub ticker: String,
    pub as_of: DateTime<Utc>,
    pub spot: Option<f64>,
    pub table: Vec<CanonicalOptionRow>,
    /// Positionally keyed to `table`; `None` without a spot price
    pub greeks: Option<Vec<GreeksRow>>,
    pub sentiment: SentimentSnapshot,
    pub monthly: MonthlySentiment,
    pub surface: SurfaceOutcome,
}

/// Rows accepted by `filter`, in table order
pub fn filter_rows(rows: &[CanonicalOptionRow], filter: &SurfaceFilter) -> Vec<CanonicalOptionRow> {
    rows.iter().filter(|row| filter.accepts(row)).cloned().collect()
}

/// Analyze `batches` as of now
pub fn analyze(request: &AnalysisRequest, batches: &[ExpirationBatch]) -> Result<ChainReport> {
    analyze_at(request, batches, Utc::now())
}

/// Analyze `batches` against a fixed evaluation instant.
///
/// Only normalization failures are errors. A missing spot or a degenerate
/// surface is reported inside the returned report.
pub fn analyze_at(
    request: &AnalysisRequest,
    batches: &[ExpirationBatch],
    as_of: DateTime<Utc>,
) -> Result<ChainReport> {
    let table = normalize_at(&request.ticker, batches, as_of)?;

    let spot = request.spot.filter(|s| s.is_finite() && *s > 0.0);
    if spot.is_none() {
        warn!("No usable spot price for {}, Greeks are unavailable", request.ticker);
    }
    let greeks = spot.map(|s| enrich(&table, s, request.risk_free_rate));

    let sentiment = aggregate(&table);
    let monthly = monthly(&table);

    let surface = match surface_for(&table, &request.surface, spot) {
        Ok(grid) => SurfaceOutcome::Built(grid),
        Err(e) => {
            warn!("Volatility surface unavailable for {}: {}", request.ticker, e);
            SurfaceOutcome::Unavailable(e.to_string())
        }
    };

    info!(
        "Analyzed {} contracts for {}: call/put ratio {} ({})",
        table.len(),
        request.ticker,
        sentiment.ratio,
        sentiment.sentiment()
    );

    Ok(ChainReport {
        ticker: request.ticker.clone(),
        as_of,
        spot,
        table,
        greeks,
        sentiment,
        monthly,
        surface,
    })
}

fn surface_for(
    table: &[CanonicalOptionRow],
    request: &SurfaceRequest,
    spot: Option<f64>,
) -> Result<VolatilitySurfaceGrid> {
    let rows = filter_rows(table, &request.filter);
    debug!("{} of {} rows pass the surface filter", rows.len(), table.len());

    let (strike_low, strike_high) = match request.filter.strike_band {
        Some(band) => band,
        None => strike_range(&rows).ok_or_else(|| {
            OptionsError::DegenerateSurface("no contracts pass the surface filter".to_string())
        })?,
    };

    let axis = if request.log_moneyness {
        let spot = spot.ok_or_else(|| {
            OptionsError::DataUnavailable(
                "log-moneyness surface needs the underlying price".to_string(),
            )
        })?;
        SurfaceAxis::LogMoneyness { spot }
    } else {
        SurfaceAxis::Strike
    };

    let params = SurfaceParams::new(axis, strike_low, strike_high)
        .with_grid_size(request.grid_size)
        .with_smoothing(request.smoothing_sigma)
        .with_negative_policy(request.negative_policy)
        .with_max_samples(request.max_samples);

    build_surface(&rows, &params)
}

fn strike_range(rows: &[CanonicalOptionRow]) -> Option<(f64, f64)> {
    let low = rows.iter().map(|r| r.strike).reduce(f64::min)?;
    let high = rows.iter().map(|r| r.strike).reduce(f64::max)?;
    Some((low, high))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::option::{OptionContract, RawContractRecord};
    use crate::models::ratio::Ratio;
    use chrono::{NaiveDate, TimeZone};

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 15, 30, 0).unwrap()
    }

    fn record(
        option_type: OptionType,
        strike: f64,
        expiration: NaiveDate,
        volume: u64,
        iv: f64,
    ) -> RawContractRecord {
        let symbol = OptionContract::new("QQQ", option_type, strike, expiration).occ_symbol();
        RawContractRecord::new(symbol, strike)
            .with_last_price(2.0)
            .with_volume(volume)
            .with_implied_volatility(iv)
    }

    fn batches() -> Vec<ExpirationBatch> {
        let mut out = Vec::new();
        for (i, days) in [20i64, 50, 110, 200].iter().enumerate() {
            let expiration = as_of().date_naive() + chrono::Duration::days(*days);
            let mut calls = Vec::new();
            let mut puts = Vec::new();
            for (j, strike) in [380.0, 400.0, 420.0, 440.0].iter().enumerate() {
                let iv = 0.18 + 0.01 * i as f64 + 0.005 * j as f64;
                calls.push(record(OptionType::Call, *strike, expiration, 10 * (j as u64 + 1), iv));
                puts.push(record(OptionType::Put, *strike, expiration, 5, iv + 0.02));
            }
            out.push(ExpirationBatch::new(expiration, calls, puts));
        }
        out
    }

    #[test]
    fn full_report_with_spot() {
        let request = AnalysisRequest::new("QQQ", Some(410.0), 0.05);
        let report = analyze_at(&request, &batches(), as_of()).unwrap();

        assert_eq!(report.table.len(), 32);
        let greeks = report.greeks.as_ref().unwrap();
        assert_eq!(greeks.len(), report.table.len());
        assert!(greeks.iter().all(|g| g.outcome.greeks().is_some()));

        assert_eq!(report.sentiment.total_calls, 4 * 100);
        assert_eq!(report.sentiment.total_puts, 4 * 20);
        assert_eq!(report.sentiment.ratio, Ratio::Defined(5.0));
        assert!(!report.monthly.is_empty());

        let grid = report.surface.grid().unwrap();
        assert_eq!(grid.values.dim(), (DEFAULT_GRID_SIZE, DEFAULT_GRID_SIZE));
        assert_eq!(grid.unresolved_cells(), 0);
    }

    #[test]
    fn missing_spot_disables_greeks_and_log_moneyness() {
        let surface = SurfaceRequest {
            log_moneyness: true,
            ..SurfaceRequest::default()
        };
        let request = AnalysisRequest::new("QQQ", None, 0.05).with_surface(surface);
        let report = analyze_at(&request, &batches(), as_of()).unwrap();

        assert!(report.greeks.is_none());
        assert!(matches!(report.surface, SurfaceOutcome::Unavailable(_)));
        assert_eq!(report.table.len(), 32);
    }

    #[test]
    fn degenerate_surface_keeps_the_rest_of_the_report() {
        let surface = SurfaceRequest {
            filter: SurfaceFilter {
                min_volume: 40,
                ..SurfaceFilter::default()
            },
            ..SurfaceRequest::default()
        };
        let request = AnalysisRequest::new("QQQ", Some(410.0), 0.05).with_surface(surface);
        let report = analyze_at(&request, &batches(), as_of()).unwrap();

        // only the 440 calls trade 40 contracts: one strike, no area
        assert!(matches!(report.surface, SurfaceOutcome::Unavailable(_)));
        assert!(report.greeks.is_some());
    }

    #[test]
    fn filter_by_type_volume_and_band() {
        let table = normalize_at("QQQ", &batches(), as_of()).unwrap();
        let filter = SurfaceFilter {
            option_type: Some(OptionType::Call),
            min_volume: 20,
            strike_band: Some((390.0, 430.0)),
        };
        let rows = filter_rows(&table, &filter);
        assert_eq!(rows.len(), 8);
        assert!(rows.iter().all(|r| r.is_call() && r.volume >= 20));
        assert!(rows.iter().all(|r| (390.0..=430.0).contains(&r.strike)));
    }

    #[test]
    fn empty_chain_yields_sentinel_views() {
        let request = AnalysisRequest::new("QQQ", Some(410.0), 0.05);
        let report = analyze_at(&request, &[], as_of()).unwrap();
        assert!(report.table.is_empty());
        assert_eq!(report.greeks.as_ref().map(Vec::len), Some(0));
        assert_eq!(report.sentiment.ratio, Ratio::Undefined);
        assert!(report.monthly.is_empty());
        assert!(matches!(report.surface, SurfaceOutcome::Unavailable(_)));
    }

    #[test]
    fn normalization_errors_fail_the_request() {
        let expiration = as_of().date_naive() + chrono::Duration::days(10);
        let bad = vec![ExpirationBatch::new(
            expiration,
            vec![RawContractRecord::new("QQQ24031X00400000", 400.0)],
            vec![],
        )];
        let request = AnalysisRequest::new("QQQ", Some(410.0), 0.05);
        assert!(matches!(
            analyze_at(&request, &bad, as_of()),
            Err(OptionsError::Normalization { .. })
        ));
    }
}
