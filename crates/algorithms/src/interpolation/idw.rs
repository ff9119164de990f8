//! Inverse Distance Weighting (IDW) interpolation
//!
//! Estimates the value at each grid cell as a weighted average of sample
//! points, with weights inversely proportional to distance raised to a
//! power parameter. A cell coinciding with a sample (within the snap
//! distance) takes that sample's value directly: no averaging, no
//! division by zero.
//!
//! Reference:
//! Shepard, D. (1968). A two-dimensional interpolation function for
//! irregularly-spaced data. ACM National Conference.

use ndarray::Array2;

use crate::maybe_rayon::*;
use terralink_core::{Error, Grid, Result, Surface};

use super::SamplePoint;

/// Parameters for IDW interpolation
#[derive(Debug, Clone)]
pub struct IdwParams {
    /// Power parameter (default: 2.0).
    /// Higher values give more weight to nearby points.
    pub power: f64,
    /// Maximum search radius. Points beyond this distance are ignored.
    /// `None` means all points are used (global IDW).
    pub max_radius: Option<f64>,
    /// Maximum number of nearest points to use.
    /// `None` means use all points within radius.
    pub max_points: Option<usize>,
    /// Snap threshold: a sample closer than this to the target takes over
    /// directly, avoiding the distance-zero singularity.
    pub snap_distance: f64,
}

impl Default for IdwParams {
    fn default() -> Self {
        Self {
            power: 2.0,
            max_radius: None,
            max_points: None,
            snap_distance: 1e-10,
        }
    }
}

/// Interpolate scattered samples onto a grid with IDW.
///
/// ```text
/// z(x,y) = Σ(wi · zi) / Σ(wi),  wi = 1 / d(x,y, xi,yi)^p
/// ```
///
/// Cells with no sample within the search radius stay NaN.
pub fn idw(samples: &[SamplePoint], grid: &Grid, params: &IdwParams) -> Result<Surface> {
    if samples.is_empty() {
        return Err(Error::EmptyResult("no sample points provided".into()));
    }
    if !(params.power > 0.0) {
        return Err(Error::InvalidParameter {
            name: "power",
            value: params.power.to_string(),
            reason: "must be positive".into(),
        });
    }

    let rows = grid.rows();
    let cols = grid.cols();
    let power = params.power;
    let snap_sq = params.snap_distance * params.snap_distance;
    let max_radius_sq = params.max_radius.map(|r| r * r);
    let limit = params.max_points;

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            for (col, slot) in row_data.iter_mut().enumerate() {
                let (cx, cy) = grid.cell_center(row, col);

                let mut candidates: Vec<(f64, f64)> = Vec::new();
                let mut snapped = None;

                for sample in samples {
                    let dsq = sample.dist_sq(cx, cy);

                    if dsq <= snap_sq {
                        snapped = Some(sample.value);
                        break;
                    }
                    if let Some(max_sq) = max_radius_sq {
                        if dsq > max_sq {
                            continue;
                        }
                    }
                    candidates.push((dsq, sample.value));
                }

                if let Some(value) = snapped {
                    *slot = value;
                    continue;
                }
                if candidates.is_empty() {
                    continue; // NaN
                }

                if let Some(k) = limit {
                    if candidates.len() > k {
                        candidates.sort_by(|a, b| {
                            a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal)
                        });
                        candidates.truncate(k);
                    }
                }

                let mut sum_w = 0.0;
                let mut sum_wz = 0.0;
                for &(dsq, value) in &candidates {
                    let w = 1.0 / dsq.sqrt().powf(power);
                    sum_w += w;
                    sum_wz += w * value;
                }

                if sum_w > 0.0 {
                    *slot = sum_wz / sum_w;
                }
            }

            row_data
        })
        .collect();

    let values = Array2::from_shape_vec((rows, cols), data).map_err(|e| {
        Error::InvalidParameter {
            name: "grid",
            value: format!("{rows}x{cols}"),
            reason: e.to_string(),
        }
    })?;

    Surface::new(grid.clone(), values, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use terralink_core::Crs;

    fn corner_samples() -> Vec<SamplePoint> {
        vec![
            SamplePoint::new(0.5, 9.5, 10.0),  // top-left
            SamplePoint::new(9.5, 9.5, 20.0),  // top-right
            SamplePoint::new(0.5, 0.5, 30.0),  // bottom-left
            SamplePoint::new(9.5, 0.5, 40.0),  // bottom-right
        ]
    }

    fn unit_grid() -> Grid {
        Grid::new(Crs::utm(30, true), (0.0, 0.0, 10.0, 10.0), 1.0).unwrap()
    }

    #[test]
    fn test_idw_covers_grid() {
        let surface = idw(&corner_samples(), &unit_grid(), &IdwParams::default()).unwrap();
        for row in 0..10 {
            for col in 0..10 {
                assert!(
                    surface.value(row, col).is_some(),
                    "NaN at ({row}, {col}) under global IDW"
                );
            }
        }
    }

    #[test]
    fn test_idw_exact_at_sample_locations() {
        // Samples sit exactly on cell centers: snap must return the
        // sample value with no averaging at all.
        let samples = corner_samples();
        let surface = idw(&samples, &unit_grid(), &IdwParams::default()).unwrap();

        assert_eq!(surface.value(0, 0), Some(10.0));
        assert_eq!(surface.value(0, 9), Some(20.0));
        assert_eq!(surface.value(9, 0), Some(30.0));
        assert_eq!(surface.value(9, 9), Some(40.0));
    }

    #[test]
    fn test_idw_center_is_average_of_equidistant_corners() {
        // Grid with an odd cell count so a center cell exists
        let grid = Grid::new(Crs::utm(30, true), (0.0, 0.0, 10.0, 10.0), 2.0).unwrap();
        let samples = vec![
            SamplePoint::new(1.0, 9.0, 10.0),
            SamplePoint::new(9.0, 9.0, 20.0),
            SamplePoint::new(1.0, 1.0, 30.0),
            SamplePoint::new(9.0, 1.0, 40.0),
        ];
        let surface = idw(&samples, &grid, &IdwParams::default()).unwrap();

        // Cell (2,2) center = (5, 5), equidistant from all four samples
        let center = surface.value(2, 2).unwrap();
        assert!(
            (center - 25.0).abs() < 1e-9,
            "symmetric weights should average to 25, got {center}"
        );
    }

    #[test]
    fn test_idw_radius_limits_reach() {
        let params = IdwParams {
            max_radius: Some(2.0),
            ..Default::default()
        };
        let surface = idw(&corner_samples(), &unit_grid(), &params).unwrap();

        // Center cell has no sample within 2 units
        assert_eq!(surface.value(5, 5), None);
        // Corner cell still sees its sample
        assert!(surface.value(0, 0).is_some());
    }

    #[test]
    fn test_idw_max_points() {
        let params = IdwParams {
            max_points: Some(2),
            ..Default::default()
        };
        let surface = idw(&corner_samples(), &unit_grid(), &params).unwrap();
        assert!(surface.value(0, 0).is_some());
    }

    #[test]
    fn test_idw_power_sharpens_falloff() {
        let low = idw(
            &corner_samples(),
            &unit_grid(),
            &IdwParams {
                power: 1.0,
                ..Default::default()
            },
        )
        .unwrap();
        let high = idw(
            &corner_samples(),
            &unit_grid(),
            &IdwParams {
                power: 4.0,
                ..Default::default()
            },
        )
        .unwrap();

        // Near the top-left sample, higher power hugs the sample value
        let near_low = low.value(1, 1).unwrap();
        let near_high = high.value(1, 1).unwrap();
        assert!(
            (near_high - 10.0).abs() <= (near_low - 10.0).abs() + 1e-9,
            "power 4 should track the nearby sample: low={near_low}, high={near_high}"
        );
    }

    #[test]
    fn test_idw_single_sample_everywhere() {
        let samples = vec![SamplePoint::new(5.0, 5.0, 42.0)];
        let surface = idw(&samples, &unit_grid(), &IdwParams::default()).unwrap();
        for row in 0..10 {
            for col in 0..10 {
                let v = surface.value(row, col).unwrap();
                assert!(
                    (v - 42.0).abs() < 1e-9,
                    "single sample dominates everywhere, got {v} at ({row},{col})"
                );
            }
        }
    }

    #[test]
    fn test_idw_rejects_bad_input() {
        assert!(matches!(
            idw(&[], &unit_grid(), &IdwParams::default()),
            Err(Error::EmptyResult(_))
        ));
        assert!(matches!(
            idw(
                &corner_samples(),
                &unit_grid(),
                &IdwParams {
                    power: 0.0,
                    ..Default::default()
                }
            ),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
