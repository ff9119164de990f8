//! Ordinary Kriging interpolation
//!
//! Best Linear Unbiased Estimator for spatial data. Uses a fitted
//! variogram to compute weights minimizing estimation variance under an
//! unbiasedness constraint. The per-target system over n neighbors:
//!
//! ```text
//! [γ(x₁,x₁) ... γ(x₁,xₙ) 1] [w₁]   [γ(x₁,x₀)]
//! [   ...     ...    ...   .] [. ] = [   ...   ]
//! [γ(xₙ,x₁) ... γ(xₙ,xₙ) 1] [wₙ]   [γ(xₙ,x₀)]
//! [  1       ...    1      0] [μ ]   [    1    ]
//! ```
//!
//! where μ is the Lagrange multiplier enforcing Σwᵢ = 1. Cells whose
//! system turns out singular degrade to inverse-distance weights for
//! that cell only.
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use ndarray::Array2;

use crate::maybe_rayon::*;
use terralink_core::{Error, Grid, Result, Surface};

use super::variogram::FittedVariogram;
use super::SamplePoint;

/// Parameters for Ordinary Kriging interpolation
#[derive(Debug, Clone)]
pub struct KrigingParams {
    /// Maximum number of nearest samples per estimation (default 16).
    pub max_points: usize,
    /// Maximum search radius; samples beyond it are ignored.
    /// `None` means global search.
    pub max_radius: Option<f64>,
    /// Whether to produce the kriging variance alongside the estimate
    /// (default true).
    pub compute_variance: bool,
}

impl Default for KrigingParams {
    fn default() -> Self {
        Self {
            max_points: 16,
            max_radius: None,
            compute_variance: true,
        }
    }
}

/// Interpolate scattered samples onto a grid with Ordinary Kriging.
///
/// Returns a [`Surface`] carrying the estimate and, when requested, the
/// kriging variance. Cells with no sample in reach stay NaN.
pub fn ordinary_kriging(
    samples: &[SamplePoint],
    variogram: &FittedVariogram,
    grid: &Grid,
    params: &KrigingParams,
) -> Result<Surface> {
    let n = samples.len();
    if n < 2 {
        return Err(Error::Fit(format!(
            "kriging requires at least 2 samples, got {n}"
        )));
    }
    if params.max_points == 0 {
        return Err(Error::InvalidParameter {
            name: "max_points",
            value: "0".into(),
            reason: "must be at least 1".into(),
        });
    }

    let rows = grid.rows();
    let cols = grid.cols();
    let max_points = params.max_points.min(n);
    let max_radius = params.max_radius;
    let compute_variance = params.compute_variance;

    let cells: Vec<(f64, f64)> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![(f64::NAN, f64::NAN); cols];

            for (col, slot) in row_data.iter_mut().enumerate() {
                let (x0, y0) = grid.cell_center(row, col);

                let mut neighbors: Vec<(usize, f64)> = samples
                    .iter()
                    .enumerate()
                    .map(|(i, s)| (i, s.dist(x0, y0)))
                    .collect();
                if let Some(radius) = max_radius {
                    neighbors.retain(|(_, d)| *d <= radius);
                }
                if neighbors.is_empty() {
                    continue;
                }
                neighbors
                    .sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
                neighbors.truncate(max_points);

                // Target on top of a sample: exact value, zero variance
                if neighbors[0].1 < 1e-12 {
                    *slot = (samples[neighbors[0].0].value, 0.0);
                    continue;
                }

                *slot = krige_cell(samples, variogram, &neighbors, compute_variance);
            }

            row_data
        })
        .collect();

    let estimate_data: Vec<f64> = cells.iter().map(|(e, _)| *e).collect();
    let values = Array2::from_shape_vec((rows, cols), estimate_data).map_err(|e| {
        Error::InvalidParameter {
            name: "grid",
            value: format!("{rows}x{cols}"),
            reason: e.to_string(),
        }
    })?;

    let variance = if compute_variance {
        let variance_data: Vec<f64> = cells.iter().map(|(_, v)| *v).collect();
        Some(
            Array2::from_shape_vec((rows, cols), variance_data).map_err(|e| {
                Error::InvalidParameter {
                    name: "grid",
                    value: format!("{rows}x{cols}"),
                    reason: e.to_string(),
                }
            })?,
        )
    } else {
        None
    };

    Surface::new(grid.clone(), values, variance)
}

/// Solve one cell's kriging system; returns (estimate, variance).
fn krige_cell(
    samples: &[SamplePoint],
    variogram: &FittedVariogram,
    neighbors: &[(usize, f64)],
    compute_variance: bool,
) -> (f64, f64) {
    let k = neighbors.len();
    let m = k + 1;
    let mut matrix = vec![0.0_f64; m * m];
    let mut rhs = vec![0.0_f64; m];

    for i in 0..k {
        let si = &samples[neighbors[i].0];
        for j in 0..k {
            matrix[i * m + j] = if i == j {
                0.0 // γ(0) = 0 by convention
            } else {
                let sj = &samples[neighbors[j].0];
                variogram.evaluate(si.dist(sj.x, sj.y))
            };
        }
        // Lagrange constraint row and column
        matrix[i * m + k] = 1.0;
        matrix[k * m + i] = 1.0;
    }

    for i in 0..k {
        rhs[i] = variogram.evaluate(neighbors[i].1);
    }
    rhs[k] = 1.0;

    match solve_linear_system(m, &mut matrix, &mut rhs) {
        Ok(weights) => {
            let mut estimate = 0.0;
            for i in 0..k {
                estimate += weights[i] * samples[neighbors[i].0].value;
            }

            let variance = if compute_variance {
                // σ² = Σ wᵢ·γ(xᵢ,x₀) + μ
                let mut var = weights[k];
                for i in 0..k {
                    var += weights[i] * variogram.evaluate(neighbors[i].1);
                }
                var.max(0.0)
            } else {
                0.0
            };

            (estimate, variance)
        }
        Err(_) => {
            // Singular system: inverse-distance weights for this cell
            let mut sum_w = 0.0;
            let mut sum_wz = 0.0;
            for &(idx, dist) in neighbors {
                let w = 1.0 / (dist * dist);
                sum_w += w;
                sum_wz += w * samples[idx].value;
            }
            if sum_w > 0.0 {
                (sum_wz / sum_w, f64::NAN)
            } else {
                (f64::NAN, f64::NAN)
            }
        }
    }
}

/// Solve Ax = b in place with Gaussian elimination and partial pivoting.
/// Sized for the small kriging systems (typically 5–20 unknowns).
fn solve_linear_system(n: usize, matrix: &mut [f64], rhs: &mut [f64]) -> Result<Vec<f64>> {
    for col in 0..n {
        let mut pivot_value = matrix[col * n + col].abs();
        let mut pivot_row = col;
        for row in (col + 1)..n {
            let candidate = matrix[row * n + col].abs();
            if candidate > pivot_value {
                pivot_value = candidate;
                pivot_row = row;
            }
        }

        if pivot_value < 1e-14 {
            return Err(Error::Fit("kriging system is singular".into()));
        }

        if pivot_row != col {
            for j in 0..n {
                matrix.swap(col * n + j, pivot_row * n + j);
            }
            rhs.swap(col, pivot_row);
        }

        let pivot = matrix[col * n + col];
        for row in (col + 1)..n {
            let factor = matrix[row * n + col] / pivot;
            matrix[row * n + col] = 0.0;
            for j in (col + 1)..n {
                matrix[row * n + j] -= factor * matrix[col * n + j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut solution = vec![0.0_f64; n];
    for col in (0..n).rev() {
        let mut sum = rhs[col];
        for j in (col + 1)..n {
            sum -= matrix[col * n + j] * solution[j];
        }
        solution[col] = sum / matrix[col * n + col];
    }

    Ok(solution)
}
