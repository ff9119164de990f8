//! Regular grids and interpolated surfaces.
//!
//! A [`Grid`] is a regular tiling of square cells over a bounding region,
//! indexed by (row, col) with row 0 at the top. Cell polygons and centers
//! are produced on demand; grids are never persisted.
//!
//! A [`Surface`] is the output of interpolation: one predicted value per
//! grid cell, with an optional per-cell variance. NaN marks cells with no
//! prediction.

use geo_types::{LineString, Point, Polygon};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::feature::{AttributeValue, Feature, FeatureCollection};

/// A regular tiling of square cells over a bounding region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    crs: Crs,
    /// X coordinate of the left edge
    min_x: f64,
    /// Y coordinate of the top edge
    max_y: f64,
    /// Cell edge length in CRS units
    cell_size: f64,
    rows: usize,
    cols: usize,
}

impl Grid {
    /// Create a grid covering `(min_x, min_y, max_x, max_y)` at the given
    /// cell size. Rows and columns are rounded up so the grid covers the
    /// full extent.
    pub fn new(crs: Crs, extent: (f64, f64, f64, f64), cell_size: f64) -> Result<Self> {
        let (min_x, min_y, max_x, max_y) = extent;

        if !(cell_size > 0.0) {
            return Err(Error::InvalidParameter {
                name: "cell_size",
                value: cell_size.to_string(),
                reason: "must be positive".into(),
            });
        }
        if max_x <= min_x || max_y <= min_y {
            return Err(Error::InvalidParameter {
                name: "extent",
                value: format!("({min_x}, {min_y}, {max_x}, {max_y})"),
                reason: "max must exceed min on both axes".into(),
            });
        }

        let cols = ((max_x - min_x) / cell_size).ceil() as usize;
        let rows = ((max_y - min_y) / cell_size).ceil() as usize;

        Ok(Self {
            crs,
            min_x,
            max_y,
            cell_size,
            rows: rows.max(1),
            cols: cols.max(1),
        })
    }

    /// Grid covering the bounds of a feature collection.
    pub fn covering(collection: &FeatureCollection, cell_size: f64) -> Result<Self> {
        let extent = collection
            .bounds()
            .ok_or_else(|| Error::EmptyResult("cannot grid an empty collection".into()))?;
        Self::new(collection.crs().clone(), extent, cell_size)
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Center coordinates of a cell.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        let x = self.min_x + (col as f64 + 0.5) * self.cell_size;
        let y = self.max_y - (row as f64 + 0.5) * self.cell_size;
        (x, y)
    }

    /// Polygon outline of a cell (closed ring, counter-clockwise).
    pub fn cell_polygon(&self, row: usize, col: usize) -> Polygon<f64> {
        let x0 = self.min_x + col as f64 * self.cell_size;
        let x1 = x0 + self.cell_size;
        let y1 = self.max_y - row as f64 * self.cell_size;
        let y0 = y1 - self.cell_size;

        Polygon::new(
            LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
            vec![],
        )
    }
}

/// An interpolated field over a [`Grid`].
#[derive(Debug, Clone)]
pub struct Surface {
    grid: Grid,
    values: Array2<f64>,
    variance: Option<Array2<f64>>,
}

impl Surface {
    /// Assemble a surface from a grid and per-cell values.
    ///
    /// Shapes must match the grid exactly.
    pub fn new(grid: Grid, values: Array2<f64>, variance: Option<Array2<f64>>) -> Result<Self> {
        let expected = (grid.rows(), grid.cols());
        if values.dim() != expected {
            return Err(Error::InvalidParameter {
                name: "values",
                value: format!("{:?}", values.dim()),
                reason: format!("expected {:?}", expected),
            });
        }
        if let Some(var) = &variance {
            if var.dim() != expected {
                return Err(Error::InvalidParameter {
                    name: "variance",
                    value: format!("{:?}", var.dim()),
                    reason: format!("expected {:?}", expected),
                });
            }
        }
        Ok(Self {
            grid,
            values,
            variance,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn variance(&self) -> Option<&Array2<f64>> {
        self.variance.as_ref()
    }

    /// Predicted value at a cell; `None` out of bounds or where no
    /// prediction was made (NaN).
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.values
            .get((row, col))
            .copied()
            .filter(|v| !v.is_nan())
    }

    /// Export cell centers as point features with `value` (and `variance`)
    /// attributes, skipping cells without a prediction.
    pub fn to_point_features(&self) -> FeatureCollection {
        let mut out = FeatureCollection::new(self.grid.crs().clone());

        for row in 0..self.grid.rows() {
            for col in 0..self.grid.cols() {
                let v = self.values[(row, col)];
                if v.is_nan() {
                    continue;
                }
                let (x, y) = self.grid.cell_center(row, col);
                // Cell centers are always valid single-point geometries.
                let mut feature = match Feature::new(Point::new(x, y).into()) {
                    Ok(f) => f,
                    Err(_) => continue,
                };
                feature.set_property("value", AttributeValue::Float(v));
                if let Some(var) = &self.variance {
                    feature.set_property("variance", AttributeValue::Float(var[(row, col)]));
                }
                out.push(feature);
            }
        }

        out
    }
}
