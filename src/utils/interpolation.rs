//! Scattered 2D interpolation.
//!
//! `CubicRbf` is a polyharmonic spline with kernel `r^3` and a linear
//! polynomial tail. It reproduces linear data exactly and is only trusted
//! inside the `ConvexHull` of its samples.

use nalgebra::{DMatrix, DVector};

const MIN_HULL_AREA: f64 = 1e-12;

/// Convex hull of a planar point set, counter-clockwise
#[derive(Debug, Clone)]
pub struct ConvexHull {
    vertices: Vec<(f64, f64)>,
}

fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

impl ConvexHull {
    /// Andrew's monotone chain. Returns `None` when the points do not span
    /// a region with positive area.
    pub fn new(points: &[(f64, f64)]) -> Option<Self> {
        let mut pts: Vec<(f64, f64)> = points.to_vec();
        pts.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.total_cmp(&b.1)));
        pts.dedup();
        if pts.len() < 3 {
            return None;
        }

        let mut lower: Vec<(f64, f64)> = Vec::with_capacity(pts.len());
        for &p in &pts {
            while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
                lower.pop();
            }
            lower.push(p);
        }

        let mut upper: Vec<(f64, f64)> = Vec::with_capacity(pts.len());
        for &p in pts.iter().rev() {
            while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
                upper.pop();
            }
            upper.push(p);
        }

        lower.pop();
        upper.pop();
        lower.extend(upper);

        let hull = Self { vertices: lower };
        if hull.vertices.len() < 3 || hull.area() <= MIN_HULL_AREA {
            return None;
        }
        Some(hull)
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }

    pub fn area(&self) -> f64 {
        let n = self.vertices.len();
        let twice: f64 = (0..n)
            .map(|i| {
                let (x0, y0) = self.vertices[i];
                let (x1, y1) = self.vertices[(i + 1) % n];
                x0 * y1 - x1 * y0
            })
            .sum();
        twice.abs() / 2.0
    }

    /// Point-in-hull test; points within `tolerance` of an edge count as inside.
    pub fn contains(&self, x: f64, y: f64, tolerance: f64) -> bool {
        let n = self.vertices.len();
        (0..n).all(|i| {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            let edge_len = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
            cross(a, b, (x, y)) >= -tolerance * edge_len
        })
    }
}

/// Cubic radial basis function interpolant
#[derive(Debug, Clone)]
pub struct CubicRbf {
    centers: Vec<(f64, f64)>,
    weights: DVector<f64>,
    // c0 + c1 * x + c2 * y
    tail: [f64; 3],
}

fn kernel(dx: f64, dy: f64) -> f64 {
    let r = (dx * dx + dy * dy).sqrt();
    r * r * r
}

impl CubicRbf {
    /// Fit through `(x, y, value)` samples with distinct coordinates.
    ///
    /// Returns `None` when the system is singular: fewer than three samples,
    /// repeated coordinates or collinear samples.
    pub fn fit(samples: &[(f64, f64, f64)]) -> Option<Self> {
        let n = samples.len();
        let coords: Vec<(f64, f64)> = samples.iter().map(|&(x, y, _)| (x, y)).collect();
        let mut distinct = coords.clone();
        distinct.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.total_cmp(&b.1)));
        distinct.dedup();
        if distinct.len() != n || ConvexHull::new(&coords).is_none() {
            return None;
        }

        // [ K  P ] [w]   [v]
        // [ P' 0 ] [c] = [0]
        let size = n + 3;
        let mut a = DMatrix::<f64>::zeros(size, size);
        let mut b = DVector::<f64>::zeros(size);

        for (i, &(xi, yi, vi)) in samples.iter().enumerate() {
            for (j, &(xj, yj, _)) in samples.iter().enumerate() {
                a[(i, j)] = kernel(xi - xj, yi - yj);
            }
            for (p, term) in [1.0, xi, yi].into_iter().enumerate() {
                a[(i, n + p)] = term;
                a[(n + p, i)] = term;
            }
            b[i] = vi;
        }

        let solution = a.lu().solve(&b)?;
        if !solution.iter().all(|v| v.is_finite()) {
            return None;
        }

        Some(Self {
            centers: coords,
            weights: solution.rows(0, n).into_owned(),
            tail: [solution[n], solution[n + 1], solution[n + 2]],
        })
    }

    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        let radial: f64 = self
            .centers
            .iter()
            .zip(self.weights.iter())
            .map(|(&(cx, cy), &w)| w * kernel(x - cx, y - cy))
            .sum();
        radial + self.tail[0] + self.tail[1] * x + self.tail[2] * y
    }
}
