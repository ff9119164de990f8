//! Buffer operations
//!
//! Grow geometries by a distance in CRS units. Points become circles
//! approximated with a configurable segment count. Lines and polygons are
//! expanded as the Minkowski sum of their convex hull with a disc;
//! concave shapes are hulled first, an approximation that keeps the
//! result convex for downstream area clipping.

use geo::ConvexHull;
use geo_types::{Geometry, LineString, MultiPoint, MultiPolygon, Point, Polygon};
use std::f64::consts::PI;

use terralink_core::feature::visit_coords;
use terralink_core::{Error, FeatureCollection, Result};

/// Parameters for buffer operations
#[derive(Debug, Clone)]
pub struct BufferParams {
    /// Buffer distance in CRS units (must be positive)
    pub distance: f64,
    /// Number of segments to approximate circular arcs (default: 32)
    pub segments: usize,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            distance: 1.0,
            segments: 32,
        }
    }
}

/// Buffer every feature of a collection, preserving attributes.
pub fn buffer(collection: &FeatureCollection, params: &BufferParams) -> Result<FeatureCollection> {
    if !(params.distance > 0.0) {
        return Err(Error::InvalidParameter {
            name: "distance",
            value: params.distance.to_string(),
            reason: "buffer distance must be positive".into(),
        });
    }

    let features = collection
        .iter()
        .map(|feature| {
            let mut out = feature.clone();
            out.geometry = buffer_geometry(&feature.geometry, params);
            out
        })
        .collect();

    Ok(FeatureCollection::from_features(
        collection.crs().clone(),
        features,
    ))
}

/// Buffer a single geometry.
pub fn buffer_geometry(geometry: &Geometry<f64>, params: &BufferParams) -> Geometry<f64> {
    match geometry {
        Geometry::Point(p) => Geometry::Polygon(circle(p.x(), p.y(), params)),
        Geometry::MultiPoint(mp) => Geometry::MultiPolygon(MultiPolygon::new(
            mp.0.iter()
                .map(|p| circle(p.x(), p.y(), params))
                .collect(),
        )),
        other => Geometry::Polygon(expand_hull(other, params)),
    }
}

/// Circle approximated as a closed polygon.
fn circle(cx: f64, cy: f64, params: &BufferParams) -> Polygon<f64> {
    let n = params.segments.max(4);
    let r = params.distance;

    let mut coords = Vec::with_capacity(n + 1);
    for i in 0..n {
        let angle = 2.0 * PI * i as f64 / n as f64;
        coords.push((cx + r * angle.cos(), cy + r * angle.sin()));
    }
    coords.push(coords[0]);

    Polygon::new(LineString::from(coords), vec![])
}

/// Minkowski sum of the geometry's convex hull with a disc: every vertex
/// spawns a circle of arc points, and the convex hull of the union is the
/// expanded shape.
fn expand_hull(geometry: &Geometry<f64>, params: &BufferParams) -> Polygon<f64> {
    let n = params.segments.max(4);
    let r = params.distance;

    let mut points = Vec::new();
    visit_coords(geometry, &mut |x, y| {
        for i in 0..n {
            let angle = 2.0 * PI * i as f64 / n as f64;
            points.push(Point::new(x + r * angle.cos(), y + r * angle.sin()));
        }
    });

    MultiPoint::new(points).convex_hull()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;
    use terralink_core::{AttributeValue, Crs, Feature};

    #[test]
    fn test_point_buffer_is_a_circle() {
        let params = BufferParams {
            distance: 10.0,
            segments: 64,
        };
        let buffered = buffer_geometry(&Geometry::Point(Point::new(0.0, 0.0)), &params);

        let Geometry::Polygon(polygon) = buffered else {
            panic!("expected polygon");
        };
        let expected = PI * 100.0;
        let actual = polygon.unsigned_area();
        let error = (actual - expected).abs() / expected;
        assert!(
            error < 0.01,
            "circle area error {:.2}% (expected {expected:.1}, got {actual:.1})",
            error * 100.0
        );
    }

    #[test]
    fn test_polygon_buffer_area() {
        // Buffered square: A + P·r + π·r² for a convex shape
        let square = Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (10.0, 0.0),
                (10.0, 10.0),
                (0.0, 10.0),
                (0.0, 0.0),
            ]),
            vec![],
        );
        let params = BufferParams {
            distance: 2.0,
            segments: 64,
        };
        let buffered = buffer_geometry(&Geometry::Polygon(square), &params);

        let Geometry::Polygon(polygon) = buffered else {
            panic!("expected polygon");
        };
        let expected = 100.0 + 40.0 * 2.0 + PI * 4.0;
        let actual = polygon.unsigned_area();
        let error = (actual - expected).abs() / expected;
        assert!(
            error < 0.01,
            "expanded square area error {:.2}% (expected {expected:.1}, got {actual:.1})",
            error * 100.0
        );
    }

    #[test]
    fn test_line_buffer_covers_capsule() {
        let line = Geometry::LineString(LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]));
        let params = BufferParams {
            distance: 1.0,
            segments: 64,
        };
        let buffered = buffer_geometry(&line, &params);

        let Geometry::Polygon(polygon) = buffered else {
            panic!("expected polygon");
        };
        // Capsule: 2·r·L + π·r²
        let expected = 2.0 * 10.0 + PI;
        let actual = polygon.unsigned_area();
        let error = (actual - expected).abs() / expected;
        assert!(
            error < 0.01,
            "capsule area error {:.2}% (expected {expected:.1}, got {actual:.1})",
            error * 100.0
        );
    }

    #[test]
    fn test_buffer_collection_preserves_attributes() {
        let mut fc = FeatureCollection::new(Crs::utm(30, true));
        let mut f = Feature::new(Geometry::Point(Point::new(5.0, 5.0)))
            .unwrap()
            .with_id("site-1");
        f.set_property("name", AttributeValue::from("depot"));
        fc.push(f);

        let out = buffer(&fc, &BufferParams::default()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.features()[0].id.as_deref(), Some("site-1"));
        assert_eq!(
            out.features()[0].get_property("name"),
            Some(&AttributeValue::from("depot"))
        );
        assert!(matches!(out.features()[0].geometry, Geometry::Polygon(_)));
    }

    #[test]
    fn test_buffer_rejects_nonpositive_distance() {
        let fc = FeatureCollection::new(Crs::utm(30, true));
        for bad in [0.0, -1.0, f64::NAN] {
            let params = BufferParams {
                distance: bad,
                segments: 16,
            };
            assert!(matches!(
                buffer(&fc, &params),
                Err(Error::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn test_multipoint_buffer() {
        let mp = Geometry::MultiPoint(MultiPoint::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
        ]));
        let buffered = buffer_geometry(&mp, &BufferParams::default());
        let Geometry::MultiPolygon(mpoly) = buffered else {
            panic!("expected multipolygon");
        };
        assert_eq!(mpoly.0.len(), 2);
    }
}
