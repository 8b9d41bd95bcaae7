//! Gaussian smoothing for gridded surfaces.

use ndarray::{Array2, Axis};

const TRUNCATE: f64 = 4.0;

/// Normalized 1D Gaussian kernel truncated at 4 sigma
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as usize;
    let weights: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-0.5 * x * x / (sigma * sigma)).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

// Half-sample symmetric reflection: (d c b a | a b c d | d c b a)
fn reflect(index: isize, len: usize) -> usize {
    let len = len as isize;
    if len == 1 {
        return 0;
    }
    let period = 2 * len;
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - i - 1;
    }
    i as usize
}

fn smooth_line(line: &[f64], kernel: &[f64]) -> Vec<f64> {
    let radius = (kernel.len() / 2) as isize;
    (0..line.len())
        .map(|i| {
            if line[i].is_nan() {
                return f64::NAN;
            }
            let mut acc = 0.0;
            let mut weight = 0.0;
            for (k, &w) in kernel.iter().enumerate() {
                let j = reflect(i as isize + k as isize - radius, line.len());
                let v = line[j];
                if v.is_finite() {
                    acc += w * v;
                    weight += w;
                }
            }
            if weight > 0.0 {
                acc / weight
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Isotropic Gaussian filter applied separably along both axes.
///
/// NaN cells are left out of every weighted sum and stay NaN. With no NaN
/// cells this is a plain Gaussian blur with reflective boundaries.
/// `sigma <= 0` returns the input unchanged.
pub fn gaussian_filter(values: &Array2<f64>, sigma: f64) -> Array2<f64> {
    if sigma.is_nan() || sigma <= 0.0 || values.is_empty() {
        return values.clone();
    }

    let kernel = gaussian_kernel(sigma);
    let mut out = values.clone();

    for axis in [Axis(0), Axis(1)] {
        for mut lane in out.lanes_mut(axis) {
            let line: Vec<f64> = lane.iter().copied().collect();
            let smoothed = smooth_line(&line, &kernel);
            for (cell, v) in lane.iter_mut().zip(smoothed) {
                *cell = v;
            }
        }
    }

    out
}
