//! Aggregation stage: buffers, area-weighted and count aggregates.
//!
//! Results are keyed by the source feature's position and ID, one row per
//! source feature. No-match semantics follow the data: a buffer touching
//! no coverage polygon has no observation (`None`), while a polygon
//! containing no points has a count of zero.

mod buffer;
mod clip;

pub use buffer::{buffer, buffer_geometry, BufferParams};
pub use clip::{clip_ring, intersection_area};

use geo::{Area, Contains};
use terralink_core::{Error, FeatureCollection, Result};

/// One aggregate result per source feature.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    /// Position of the source feature in its collection.
    pub index: usize,
    /// The source feature's ID, if any.
    pub id: Option<String>,
    /// Aggregated value. `None` means no observation existed (area
    /// weighting with zero intersecting coverage), as opposed to an
    /// observed zero.
    pub value: Option<f64>,
}

/// Area-weighted aggregation of a coverage attribute onto buffer polygons.
///
/// For each buffer: Σ value · (intersection_area / buffer_area) over the
/// intersecting coverage polygons. Coverage polygons of different sizes
/// contribute proportionally to overlap, making this an area-weighted
/// mean, not a simple average. A buffer intersecting no coverage yields
/// `None`.
///
/// Buffers must be polygonal and convex (which [`buffer`] guarantees);
/// coverage rows without a numeric `value_field` are treated as missing
/// observations and skipped.
pub fn area_weighted_aggregate(
    buffers: &FeatureCollection,
    coverage: &FeatureCollection,
    value_field: &str,
) -> Result<Vec<AggregateRow>> {
    buffers.ensure_same_crs(coverage)?;

    if !coverage.iter().any(|f| f.number(value_field).is_some()) {
        return Err(Error::MissingField(format!(
            "{value_field} (no numeric value in any of {} coverage features)",
            coverage.len()
        )));
    }

    let mut rows = Vec::with_capacity(buffers.len());

    for (index, feature) in buffers.iter().enumerate() {
        let window = match &feature.geometry {
            geo_types::Geometry::Polygon(p) => p.clone(),
            geo_types::Geometry::MultiPolygon(mp) if mp.0.len() == 1 => mp.0[0].clone(),
            other => {
                return Err(Error::InvalidGeometry(format!(
                    "area-weighted aggregation requires polygonal buffers, feature {index} is {}",
                    geometry_kind(other)
                )))
            }
        };

        let window_area = window.unsigned_area();
        if window_area <= 0.0 {
            return Err(Error::InvalidGeometry(format!(
                "buffer feature {index} has zero area"
            )));
        }

        let mut weighted_sum = 0.0;
        let mut observed = false;

        for cover in coverage.iter() {
            let Some(value) = cover.number(value_field) else {
                continue;
            };
            let overlap = intersection_area(&cover.geometry, &window);
            if overlap > 0.0 {
                weighted_sum += value * (overlap / window_area);
                observed = true;
            }
        }

        rows.push(AggregateRow {
            index,
            id: feature.id.clone(),
            value: if observed { Some(weighted_sum) } else { None },
        });
    }

    Ok(rows)
}

/// Count of points per polygon.
///
/// A polygon containing no points counts zero: "0 occurrences" is a
/// meaningful observation for counts, unlike the area-weighted case.
pub fn count_aggregate(
    polygons: &FeatureCollection,
    points: &FeatureCollection,
) -> Result<Vec<AggregateRow>> {
    polygons.ensure_same_crs(points)?;

    let rows = polygons
        .iter()
        .enumerate()
        .map(|(index, polygon)| {
            let count = points
                .iter()
                .filter(|point| polygon.geometry.contains(&point.geometry))
                .count();
            AggregateRow {
                index,
                id: polygon.id.clone(),
                value: Some(count as f64),
            }
        })
        .collect();

    Ok(rows)
}

fn geometry_kind(geometry: &geo_types::Geometry<f64>) -> &'static str {
    match geometry {
        geo_types::Geometry::Point(_) => "Point",
        geo_types::Geometry::Line(_) => "Line",
        geo_types::Geometry::LineString(_) => "LineString",
        geo_types::Geometry::Polygon(_) => "Polygon",
        geo_types::Geometry::MultiPoint(_) => "MultiPoint",
        geo_types::Geometry::MultiLineString(_) => "MultiLineString",
        geo_types::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo_types::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo_types::Geometry::Rect(_) => "Rect",
        geo_types::Geometry::Triangle(_) => "Triangle",
    }
}
