//! Implied volatility surface
//!
//! Interpolates scattered (time to expiration, strike or log-moneyness,
//! implied volatility) samples from the canonical table onto a regular grid,
//! then smooths it for rendering.

use crate::error::{OptionsError, Result};
use crate::models::option::CanonicalOptionRow;
use crate::utils::interpolation::{ConvexHull, CubicRbf};
use crate::utils::smoothing::gaussian_filter;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

pub const DEFAULT_GRID_SIZE: usize = 100;
pub const DEFAULT_SMOOTHING_SIGMA: f64 = 1.0;
/// Dense RBF fits cost O(n^3); denser sample sets are thinned to this size.
pub const DEFAULT_MAX_SAMPLES: usize = 900;

// Grid nodes this close to the sample hull (unit-square coordinates) are inside.
const HULL_TOLERANCE: f64 = 1e-9;

/// Encoding of the surface's second axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SurfaceAxis {
    /// Raw strike
    Strike,
    /// `ln(strike / spot)`
    LogMoneyness { spot: f64 },
}

impl SurfaceAxis {
    /// Map a strike onto this axis; `None` when the transform is undefined.
    pub fn transform(&self, strike: f64) -> Option<f64> {
        match *self {
            SurfaceAxis::Strike => strike.is_finite().then_some(strike),
            SurfaceAxis::LogMoneyness { spot } => {
                let y = (strike / spot).ln();
                (strike > 0.0 && y.is_finite()).then_some(y)
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SurfaceAxis::Strike => "Strike",
            SurfaceAxis::LogMoneyness { .. } => "Log-moneyness ln(K/S)",
        }
    }
}

/// What happens to negative values left by interpolation and smoothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NegativeVolPolicy {
    /// Replace negative values with zero
    #[default]
    Clamp,
    /// Keep values as interpolated
    Keep,
}

/// Request-scoped surface parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceParams {
    pub axis: SurfaceAxis,
    /// Lower strike bound of the grid (in strike units, before any transform)
    pub strike_low: f64,
    /// Upper strike bound of the grid (in strike units, before any transform)
    pub strike_high: f64,
    pub grid_size: usize,
    /// Gaussian filter width in grid cells; 0 disables smoothing
    pub smoothing_sigma: f64,
    pub negative_policy: NegativeVolPolicy,
    /// Upper bound on distinct samples passed to the interpolant
    pub max_samples: usize,
}

impl SurfaceParams {
    pub fn new(axis: SurfaceAxis, strike_low: f64, strike_high: f64) -> Self {
        Self {
            axis,
            strike_low,
            strike_high,
            grid_size: DEFAULT_GRID_SIZE,
            smoothing_sigma: DEFAULT_SMOOTHING_SIGMA,
            negative_policy: NegativeVolPolicy::default(),
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }

    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = grid_size;
        self
    }

    pub fn with_smoothing(mut self, sigma: f64) -> Self {
        self.smoothing_sigma = sigma;
        self
    }

    pub fn with_negative_policy(mut self, policy: NegativeVolPolicy) -> Self {
        self.negative_policy = policy;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    fn validate(&self) -> Result<()> {
        let degenerate = |msg: String| Err(OptionsError::DegenerateSurface(msg));

        if !(self.strike_low.is_finite() && self.strike_high.is_finite())
            || self.strike_low >= self.strike_high
        {
            return degenerate(format!(
                "strike bounds [{}, {}] are not an increasing range",
                self.strike_low, self.strike_high
            ));
        }
        if self.grid_size < 2 {
            return degenerate(format!("grid size {} is below 2", self.grid_size));
        }
        if !self.smoothing_sigma.is_finite() || self.smoothing_sigma < 0.0 {
            return degenerate(format!(
                "smoothing sigma {} must be finite and non-negative",
                self.smoothing_sigma
            ));
        }
        if self.smoothing_sigma > self.grid_size as f64 {
            return degenerate(format!(
                "smoothing sigma {} exceeds the grid size {}",
                self.smoothing_sigma, self.grid_size
            ));
        }
        if self.max_samples < 4 {
            return degenerate(format!("sample cap {} is below 4", self.max_samples));
        }
        if let SurfaceAxis::LogMoneyness { spot } = self.axis {
            if !(spot.is_finite() && spot > 0.0) || self.strike_low <= 0.0 {
                return degenerate(format!(
                    "log-moneyness needs a positive spot and strikes, got spot {} and lower strike {}",
                    spot, self.strike_low
                ));
            }
        }
        Ok(())
    }
}

/// Regular grid of implied volatilities.
///
/// `values[[i, j]]` is the volatility at `y_axis[i]`, `x_axis[j]`; NaN marks
/// nodes outside the convex hull of the samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilitySurfaceGrid {
    pub axis: SurfaceAxis,
    /// Time to expiration in years
    pub x_axis: Vec<f64>,
    /// Strike or log-moneyness
    pub y_axis: Vec<f64>,
    pub values: Array2<f64>,
    /// Distinct samples the surface was fitted through
    pub samples: usize,
}

impl VolatilitySurfaceGrid {
    /// Number of nodes with no interpolated value
    pub fn unresolved_cells(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }

    /// Volatility smile (y axis, values) at the `x_index`-th time node
    pub fn smile(&self, x_index: usize) -> Option<(Array1<f64>, Array1<f64>)> {
        if x_index >= self.x_axis.len() {
            return None;
        }
        let ys = Array1::from_vec(self.y_axis.clone());
        let vols = self.values.column(x_index).to_owned();
        Some((ys, vols))
    }

    /// Term structure (x axis, values) at the `y_index`-th strike node
    pub fn term_structure(&self, y_index: usize) -> Option<(Array1<f64>, Array1<f64>)> {
        if y_index >= self.y_axis.len() {
            return None;
        }
        let xs = Array1::from_vec(self.x_axis.clone());
        let vols = self.values.row(y_index).to_owned();
        Some((xs, vols))
    }

    /// Bilinear lookup between grid nodes; `None` outside the grid or next to
    /// unresolved nodes.
    pub fn interpolate(&self, x: f64, y: f64) -> Option<f64> {
        let (j0, j1, u) = bracket(&self.x_axis, x)?;
        let (i0, i1, t) = bracket(&self.y_axis, y)?;

        let v00 = self.values[[i0, j0]];
        let v01 = self.values[[i0, j1]];
        let v10 = self.values[[i1, j0]];
        let v11 = self.values[[i1, j1]];
        if v00.is_nan() || v01.is_nan() || v10.is_nan() || v11.is_nan() {
            return None;
        }

        Some(
            (1.0 - t) * (1.0 - u) * v00
                + (1.0 - t) * u * v01
                + t * (1.0 - u) * v10
                + t * u * v11,
        )
    }
}

fn bracket(axis: &[f64], value: f64) -> Option<(usize, usize, f64)> {
    let first = *axis.first()?;
    let last = *axis.last()?;
    if !(first..=last).contains(&value) || axis.len() < 2 {
        return None;
    }
    let hi = axis.partition_point(|&a| a < value).clamp(1, axis.len() - 1);
    let lo = hi - 1;
    let span = axis[hi] - axis[lo];
    let frac = if span > 0.0 { (value - axis[lo]) / span } else { 0.0 };
    Some((lo, hi, frac))
}

// Average samples over a coarse bins x bins partition of the unit square.
// Averages of linear data stay on the same plane.
fn thin(points: Vec<(f64, f64, f64)>, max_samples: usize) -> Vec<(f64, f64, f64)> {
    if points.len() <= max_samples {
        return points;
    }
    let bins = ((max_samples as f64).sqrt() as usize).max(2);
    let cell = |c: f64| ((c * bins as f64) as usize).min(bins - 1);

    let mut binned: BTreeMap<(usize, usize), (f64, f64, f64, usize)> = BTreeMap::new();
    for (u, v, iv) in points {
        let entry = binned.entry((cell(u), cell(v))).or_insert((0.0, 0.0, 0.0, 0));
        entry.0 += u;
        entry.1 += v;
        entry.2 += iv;
        entry.3 += 1;
    }
    binned
        .into_values()
        .map(|(u, v, iv, count)| {
            let count = count as f64;
            (u / count, v / count, iv / count)
        })
        .collect()
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    let step = (end - start) / (n - 1) as f64;
    (0..n)
        .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
        .collect()
}

/// Build the smoothed implied volatility surface from pre-filtered rows.
///
/// Rows without a positive implied volatility are not samples. Samples sharing
/// coordinates are averaged, and above `max_samples` distinct samples they
/// are averaged over a coarse grid of bins. The grid spans the samples' time
/// range and the requested strike bounds; nodes outside the convex hull of
/// the fitted samples are NaN.
pub fn build_surface(
    rows: &[CanonicalOptionRow],
    params: &SurfaceParams,
) -> Result<VolatilitySurfaceGrid> {
    params.validate()?;

    let samples: Vec<(f64, f64, f64)> = rows
        .iter()
        .filter_map(|row| {
            let iv = row.implied_volatility.filter(|v| v.is_finite() && *v > 0.0)?;
            let y = params.axis.transform(row.strike)?;
            Some((row.time_to_expiration, y, iv))
        })
        .collect();

    if samples.len() < rows.len() {
        debug!(
            "Skipped {} rows without usable implied volatility",
            rows.len() - samples.len()
        );
    }
    if samples.is_empty() {
        return Err(OptionsError::DegenerateSurface(
            "no rows carry a positive implied volatility".to_string(),
        ));
    }

    let x_min = samples.iter().map(|s| s.0).fold(f64::INFINITY, f64::min);
    let x_max = samples.iter().map(|s| s.0).fold(f64::NEG_INFINITY, f64::max);
    if x_max <= x_min {
        return Err(OptionsError::DegenerateSurface(format!(
            "all samples share time to expiration {}",
            x_min
        )));
    }

    let (y_low, y_high) = match (
        params.axis.transform(params.strike_low),
        params.axis.transform(params.strike_high),
    ) {
        (Some(lo), Some(hi)) if hi > lo => (lo, hi),
        _ => {
            return Err(OptionsError::DegenerateSurface(
                "strike bounds cannot be mapped onto the surface axis".to_string(),
            ))
        }
    };

    // Fit in unit-square coordinates so time and strike weigh alike.
    let to_unit = |x: f64, y: f64| ((x - x_min) / (x_max - x_min), (y - y_low) / (y_high - y_low));

    let mut merged: BTreeMap<(u64, u64), (f64, f64, f64, usize)> = BTreeMap::new();
    for &(x, y, iv) in &samples {
        let (u, v) = to_unit(x, y);
        let entry = merged.entry((u.to_bits(), v.to_bits())).or_insert((u, v, 0.0, 0));
        entry.2 += iv;
        entry.3 += 1;
    }
    let distinct: Vec<(f64, f64, f64)> = merged
        .into_values()
        .map(|(u, v, sum, count)| (u, v, sum / count as f64))
        .collect();
    let distinct_count = distinct.len();
    let points = thin(distinct, params.max_samples);
    if points.len() < distinct_count {
        debug!(
            "Thinned {} distinct samples to {} bin averages",
            distinct_count,
            points.len()
        );
    }

    let coords: Vec<(f64, f64)> = points.iter().map(|&(u, v, _)| (u, v)).collect();
    let hull = ConvexHull::new(&coords).ok_or_else(|| {
        OptionsError::DegenerateSurface(format!(
            "{} distinct samples do not span an area",
            points.len()
        ))
    })?;
    let rbf = CubicRbf::fit(&points).ok_or_else(|| {
        OptionsError::DegenerateSurface("interpolation system is singular".to_string())
    })?;

    let n = params.grid_size;
    let x_axis = linspace(x_min, x_max, n);
    let y_axis = linspace(y_low, y_high, n);
    let unit: Vec<f64> = (0..n).map(|k| k as f64 / (n - 1) as f64).collect();

    let (unit, hull, rbf) = (unit.as_slice(), &hull, &rbf);
    let cells: Vec<f64> = (0..n)
        .into_par_iter()
        .flat_map_iter(move |i| {
            let v = unit[i];
            unit.iter().map(move |&u| {
                if hull.contains(u, v, HULL_TOLERANCE) {
                    rbf.evaluate(u, v)
                } else {
                    f64::NAN
                }
            })
        })
        .collect();

    let interpolated = Array2::from_shape_vec((n, n), cells)
        .map_err(|e| OptionsError::DegenerateSurface(format!("grid shape: {}", e)))?;

    let mut values = gaussian_filter(&interpolated, params.smoothing_sigma);
    if params.negative_policy == NegativeVolPolicy::Clamp {
        values.mapv_inplace(|v| if v < 0.0 { 0.0 } else { v });
    }

    let grid = VolatilitySurfaceGrid {
        axis: params.axis,
        x_axis,
        y_axis,
        values,
        samples: points.len(),
    };

    debug!(
        "Built {}x{} surface from {} samples, {} unresolved nodes",
        n,
        n,
        grid.samples,
        grid.unresolved_cells()
    );

    Ok(grid)
}
