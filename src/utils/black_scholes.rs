//! Black-Scholes building blocks (no dividend yield).
//!
//! These are unguarded closed forms: callers validate inputs first. Theta is
//! annualized, vega and rho are per unit change; per-day and per-1% scaling
//! happens in `models::greeks`.

use statrs::distribution::ContinuousCDF;
use statrs::distribution::{Continuous, Normal};
use std::sync::OnceLock;

static NORMAL_DIST: OnceLock<Normal> = OnceLock::new();

fn get_normal() -> &'static Normal {
    NORMAL_DIST.get_or_init(|| Normal::new(0.0, 1.0).expect("standard normal parameters are valid"))
}

/// Standard normal CDF
pub fn norm_cdf(x: f64) -> f64 {
    get_normal().cdf(x)
}

/// Standard normal PDF
pub fn norm_pdf(x: f64) -> f64 {
    get_normal().pdf(x)
}

/// Calculate d1 parameter for Black-Scholes model
pub fn calculate_d1(s: f64, k: f64, t: f64, r: f64, sigma: f64) -> f64 {
    ((s / k).ln() + (r + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt())
}

/// Calculate d2 parameter for Black-Scholes model
pub fn calculate_d2(d1: f64, sigma: f64, t: f64) -> f64 {
    d1 - sigma * t.sqrt()
}

/// Black-Scholes option price
pub fn price(s: f64, k: f64, t: f64, r: f64, sigma: f64, is_call: bool) -> f64 {
    let d1 = calculate_d1(s, k, t, r, sigma);
    let d2 = calculate_d2(d1, sigma, t);
    if is_call {
        s * norm_cdf(d1) - k * (-r * t).exp() * norm_cdf(d2)
    } else {
        k * (-r * t).exp() * norm_cdf(-d2) - s * norm_cdf(-d1)
    }
}

pub fn delta(s: f64, k: f64, t: f64, r: f64, sigma: f64, is_call: bool) -> f64 {
    let d1 = calculate_d1(s, k, t, r, sigma);
    if is_call {
        norm_cdf(d1)
    } else {
        -norm_cdf(-d1)
    }
}

pub fn gamma(s: f64, k: f64, t: f64, r: f64, sigma: f64) -> f64 {
    let d1 = calculate_d1(s, k, t, r, sigma);
    norm_pdf(d1) / (s * sigma * t.sqrt())
}

/// Annualized theta
pub fn theta(s: f64, k: f64, t: f64, r: f64, sigma: f64, is_call: bool) -> f64 {
    let d1 = calculate_d1(s, k, t, r, sigma);
    let d2 = calculate_d2(d1, sigma, t);
    let decay = -s * norm_pdf(d1) * sigma / (2.0 * t.sqrt());
    let discounted_strike = r * k * (-r * t).exp();
    if is_call {
        decay - discounted_strike * norm_cdf(d2)
    } else {
        decay + discounted_strike * norm_cdf(-d2)
    }
}

pub fn vega(s: f64, k: f64, t: f64, r: f64, sigma: f64) -> f64 {
    let d1 = calculate_d1(s, k, t, r, sigma);
    s * norm_pdf(d1) * t.sqrt()
}

pub fn rho(s: f64, k: f64, t: f64, r: f64, sigma: f64, is_call: bool) -> f64 {
    let d1 = calculate_d1(s, k, t, r, sigma);
    let d2 = calculate_d2(d1, sigma, t);
    let discounted = k * t * (-r * t).exp();
    if is_call {
        discounted * norm_cdf(d2)
    } else {
        -discounted * norm_cdf(-d2)
    }
}
