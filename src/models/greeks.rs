//! Black-Scholes Greeks and implied leverage for canonical chain rows.

use crate::error::Result;
use crate::models::option::{CanonicalOptionRow, OptionType};
use crate::models::ratio::Ratio;
use crate::utils::black_scholes;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Option Greeks. Theta is per calendar day, vega and rho per 1% move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

/// Violated Black-Scholes precondition
#[derive(Debug, Clone, Copy, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "violation", content = "value", rename_all = "snake_case")]
pub enum DomainViolation {
    #[error("underlying price must be positive, got {0}")]
    NonPositiveSpot(f64),
    #[error("strike must be positive, got {0}")]
    NonPositiveStrike(f64),
    #[error("time to expiration must be positive, got {0}")]
    NonPositiveTime(f64),
    #[error("implied volatility must be positive, got {0}")]
    NonPositiveVolatility(f64),
    #[error("implied volatility is missing")]
    MissingVolatility,
    #[error("risk-free rate must be finite, got {0}")]
    NonFiniteRate(f64),
}

/// Outcome of the Greeks computation for one row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GreeksOutcome {
    Computed(Greeks),
    Rejected { reason: DomainViolation },
}

impl GreeksOutcome {
    pub fn greeks(&self) -> Option<&Greeks> {
        match self {
            GreeksOutcome::Computed(g) => Some(g),
            GreeksOutcome::Rejected { .. } => None,
        }
    }
}

/// Greeks for one canonical row, paired with it by position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreeksRow {
    pub contract_symbol: String,
    pub outcome: GreeksOutcome,
    pub leverage: Ratio,
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn check_domain(
    s: f64,
    k: f64,
    t: f64,
    r: f64,
    sigma: f64,
) -> std::result::Result<(), DomainViolation> {
    if !positive(s) {
        return Err(DomainViolation::NonPositiveSpot(s));
    }
    if !positive(k) {
        return Err(DomainViolation::NonPositiveStrike(k));
    }
    if !positive(t) {
        return Err(DomainViolation::NonPositiveTime(t));
    }
    if !positive(sigma) {
        return Err(DomainViolation::NonPositiveVolatility(sigma));
    }
    if !r.is_finite() {
        return Err(DomainViolation::NonFiniteRate(r));
    }
    Ok(())
}

fn closed_form(s: f64, k: f64, t: f64, r: f64, sigma: f64, option_type: OptionType) -> Greeks {
    let is_call = option_type == OptionType::Call;

    Greeks {
        delta: black_scholes::delta(s, k, t, r, sigma, is_call),
        gamma: black_scholes::gamma(s, k, t, r, sigma),
        theta: black_scholes::theta(s, k, t, r, sigma, is_call) / 365.0,
        vega: black_scholes::vega(s, k, t, r, sigma) / 100.0,
        rho: black_scholes::rho(s, k, t, r, sigma, is_call) / 100.0,
    }
}

/// Compute Black-Scholes Greeks, rejecting inputs outside the model's domain.
pub fn compute_greeks(
    s: f64,
    k: f64,
    t: f64,
    r: f64,
    sigma: f64,
    option_type: OptionType,
) -> Result<Greeks> {
    check_domain(s, k, t, r, sigma)?;
    Ok(closed_form(s, k, t, r, sigma, option_type))
}

/// Implied leverage `delta * S / last_price`; undefined without a traded price.
pub fn compute_leverage(delta: f64, s: f64, last_price: Option<f64>) -> Ratio {
    match last_price {
        Some(price) => Ratio::of(delta * s, price),
        None => Ratio::Undefined,
    }
}

fn row_greeks(row: &CanonicalOptionRow, spot: f64, risk_free_rate: f64) -> GreeksRow {
    let t = row.time_to_expiration;
    let outcome = match row.implied_volatility {
        None => GreeksOutcome::Rejected {
            reason: DomainViolation::MissingVolatility,
        },
        Some(sigma) => match check_domain(spot, row.strike, t, risk_free_rate, sigma) {
            Ok(()) => GreeksOutcome::Computed(closed_form(
                spot,
                row.strike,
                t,
                risk_free_rate,
                sigma,
                row.option_type,
            )),
            Err(reason) => GreeksOutcome::Rejected { reason },
        },
    };

    let leverage = match outcome {
        GreeksOutcome::Computed(greeks) => compute_leverage(greeks.delta, spot, row.last_price),
        GreeksOutcome::Rejected { .. } => Ratio::Undefined,
    };

    GreeksRow {
        contract_symbol: row.contract_symbol.clone(),
        outcome,
        leverage,
    }
}

/// Greeks for every row of the canonical table, one shared risk-free rate.
///
/// The output has the same length and order as `rows`.
pub fn enrich(rows: &[CanonicalOptionRow], spot: f64, risk_free_rate: f64) -> Vec<GreeksRow> {
    let greeks: Vec<GreeksRow> = rows
        .par_iter()
        .map(|row| row_greeks(row, spot, risk_free_rate))
        .collect();

    let rejected = greeks
        .iter()
        .filter(|g| matches!(g.outcome, GreeksOutcome::Rejected { .. }))
        .count();
    if rejected > 0 {
        warn!(
            "Greeks undefined for {} of {} contracts (expiring today or missing volatility)",
            rejected,
            rows.len()
        );
    }
    debug!("Computed Greeks for {} contracts", rows.len() - rejected);

    greeks
}
