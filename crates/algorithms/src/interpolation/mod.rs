//! Spatial interpolation: fit a value surface over sparse observations.
//!
//! Two interchangeable strategies share the same contract (samples in,
//! per-cell [`Surface`](terralink_core::Surface) out):
//! - IDW: deterministic inverse-distance weighting
//! - Ordinary Kriging: geostatistical BLUE via a fitted variogram
//!
//! Kriging fit failures surface as [`Error::Fit`](terralink_core::Error);
//! the caller decides whether to fall back to IDW or widen the variogram
//! bins.

mod idw;
mod kriging;
mod variogram;

pub use idw::{idw, IdwParams};
pub use kriging::{ordinary_kriging, KrigingParams};
pub use variogram::{
    empirical_variogram, fit_best_variogram, fit_variogram, EmpiricalVariogram, FittedVariogram,
    VariogramModel, VariogramParams,
};

use geo::Centroid;
use terralink_core::{Error, FeatureCollection, Grid, Result, Surface};

/// A sample observation: location plus value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

impl SamplePoint {
    pub fn new(x: f64, y: f64, value: f64) -> Self {
        Self { x, y, value }
    }

    /// Squared Euclidean distance to (x, y)
    #[inline]
    pub fn dist_sq(&self, other_x: f64, other_y: f64) -> f64 {
        let dx = self.x - other_x;
        let dy = self.y - other_y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to (x, y)
    #[inline]
    pub fn dist(&self, other_x: f64, other_y: f64) -> f64 {
        self.dist_sq(other_x, other_y).sqrt()
    }
}

/// Extract numeric samples from a collection's `field` attribute.
///
/// Each feature contributes its centroid as the sample location; features
/// without a numeric value for `field` are skipped. Errors with
/// `EmptyResult` when no feature yields a sample.
pub fn samples_from(collection: &FeatureCollection, field: &str) -> Result<Vec<SamplePoint>> {
    let samples: Vec<SamplePoint> = collection
        .iter()
        .filter_map(|feature| {
            let value = feature.number(field)?;
            let c = feature.geometry.centroid()?;
            Some(SamplePoint::new(c.x(), c.y(), value))
        })
        .collect();

    if samples.is_empty() {
        return Err(Error::EmptyResult(format!(
            "field '{field}' yielded no numeric samples from {} features",
            collection.len()
        )));
    }
    Ok(samples)
}

/// Interpolation strategy selection for [`estimate`].
#[derive(Debug, Clone)]
pub enum Estimator {
    /// Inverse-distance weighting.
    Idw(IdwParams),
    /// Ordinary kriging: empirical variogram → model fit → solve.
    /// `model = None` tries all families and keeps the best fit.
    Kriging {
        model: Option<VariogramModel>,
        variogram: VariogramParams,
        kriging: KrigingParams,
    },
}

/// Run the selected strategy: `samples` onto `grid`.
pub fn estimate(samples: &[SamplePoint], grid: &Grid, estimator: &Estimator) -> Result<Surface> {
    match estimator {
        Estimator::Idw(params) => idw(samples, grid, params),
        Estimator::Kriging {
            model,
            variogram,
            kriging,
        } => {
            let empirical = empirical_variogram(samples, variogram)?;
            let fitted = match model {
                Some(m) => fit_variogram(&empirical, *m)?,
                None => fit_best_variogram(&empirical)?,
            };
            ordinary_kriging(samples, &fitted, grid, kriging)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{Geometry, LineString, Point, Polygon};
    use terralink_core::{AttributeValue, Crs, Feature};

    #[test]
    fn test_samples_from_points() {
        let mut fc = FeatureCollection::new(Crs::utm(30, true));
        for &(x, y, v) in &[(0.0, 0.0, 1.0), (10.0, 0.0, 2.0)] {
            let mut f = Feature::new(Geometry::Point(Point::new(x, y))).unwrap();
            f.set_property("pm25", AttributeValue::Float(v));
            fc.push(f);
        }
        // One feature without the field: skipped, not an error
        fc.push(Feature::new(Geometry::Point(Point::new(5.0, 5.0))).unwrap());

        let samples = samples_from(&fc, "pm25").unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].value, 1.0);
    }

    #[test]
    fn test_samples_from_polygon_uses_centroid() {
        let mut fc = FeatureCollection::new(Crs::utm(30, true));
        let mut f = Feature::new(Geometry::Polygon(Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (10.0, 0.0),
                (10.0, 10.0),
                (0.0, 10.0),
                (0.0, 0.0),
            ]),
            vec![],
        )))
        .unwrap();
        f.set_property("income", AttributeValue::Int(30_000));
        fc.push(f);

        let samples = samples_from(&fc, "income").unwrap();
        assert_eq!(samples.len(), 1);
        assert!((samples[0].x - 5.0).abs() < 1e-10);
        assert!((samples[0].y - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_samples_from_empty_errors() {
        let mut fc = FeatureCollection::new(Crs::utm(30, true));
        fc.push(Feature::new(Geometry::Point(Point::new(0.0, 0.0))).unwrap());
        assert!(matches!(
            samples_from(&fc, "absent"),
            Err(Error::EmptyResult(_))
        ));
    }

    #[test]
    fn test_estimate_dispatches_idw() {
        let samples = vec![
            SamplePoint::new(0.5, 0.5, 1.0),
            SamplePoint::new(9.5, 9.5, 3.0),
        ];
        let grid = Grid::new(Crs::utm(30, true), (0.0, 0.0, 10.0, 10.0), 1.0).unwrap();
        let surface = estimate(&samples, &grid, &Estimator::Idw(IdwParams::default())).unwrap();
        assert!(surface.value(0, 0).is_some());
    }
}
