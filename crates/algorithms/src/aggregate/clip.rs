//! Polygon clipping against a convex window (Sutherland–Hodgman).
//!
//! The window must be convex; buffers produced by this crate always are.
//! Subject polygons may be arbitrary simple polygons; holes are clipped
//! separately and their area subtracted.

use geo::Area;
use geo_types::{Coord, Geometry, LineString, Polygon};

/// Clip a ring against a convex window polygon.
///
/// Returns `None` when nothing of the ring survives the clip.
pub fn clip_ring(subject: &LineString<f64>, window: &Polygon<f64>) -> Option<Polygon<f64>> {
    let window_ring = oriented_ccw(window.exterior());
    if window_ring.len() < 3 {
        return None;
    }

    // Subject vertices without the closing duplicate
    let mut output: Vec<Coord<f64>> = subject.0.clone();
    if output.len() > 1 && output.first() == output.last() {
        output.pop();
    }

    let m = window_ring.len();
    for i in 0..m {
        if output.len() < 3 {
            return None;
        }
        let a = window_ring[i];
        let b = window_ring[(i + 1) % m];

        let input = std::mem::take(&mut output);
        let n = input.len();
        for j in 0..n {
            let current = input[j];
            let previous = input[(j + n - 1) % n];

            let current_side = side(a, b, current);
            let previous_side = side(a, b, previous);

            if current_side >= 0.0 {
                if previous_side < 0.0 {
                    output.push(edge_intersection(a, b, previous, current));
                }
                output.push(current);
            } else if previous_side >= 0.0 {
                output.push(edge_intersection(a, b, previous, current));
            }
        }
    }

    if output.len() < 3 {
        return None;
    }
    output.push(output[0]);
    Some(Polygon::new(LineString::new(output), vec![]))
}

/// Area of the intersection between a polygonal geometry and a convex
/// window. Non-areal geometries contribute zero.
pub fn intersection_area(subject: &Geometry<f64>, window: &Polygon<f64>) -> f64 {
    match subject {
        Geometry::Polygon(polygon) => polygon_intersection_area(polygon, window),
        Geometry::MultiPolygon(mp) => mp
            .0
            .iter()
            .map(|polygon| polygon_intersection_area(polygon, window))
            .sum(),
        Geometry::Rect(r) => polygon_intersection_area(&r.to_polygon(), window),
        Geometry::Triangle(t) => polygon_intersection_area(&t.to_polygon(), window),
        _ => 0.0,
    }
}

fn polygon_intersection_area(polygon: &Polygon<f64>, window: &Polygon<f64>) -> f64 {
    let exterior = clip_ring(polygon.exterior(), window)
        .map(|p| p.unsigned_area())
        .unwrap_or(0.0);
    if exterior == 0.0 {
        return 0.0;
    }

    let holes: f64 = polygon
        .interiors()
        .iter()
        .filter_map(|ring| clip_ring(ring, window))
        .map(|p| p.unsigned_area())
        .sum();

    (exterior - holes).max(0.0)
}

/// Signed side of `p` relative to the directed edge a→b
/// (positive = left, the inside of a counter-clockwise ring).
fn side(a: Coord<f64>, b: Coord<f64>, p: Coord<f64>) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn edge_intersection(
    a: Coord<f64>,
    b: Coord<f64>,
    from: Coord<f64>,
    to: Coord<f64>,
) -> Coord<f64> {
    let d1 = side(a, b, from);
    let d2 = side(a, b, to);
    let t = d1 / (d1 - d2);
    Coord {
        x: from.x + t * (to.x - from.x),
        y: from.y + t * (to.y - from.y),
    }
}

/// Window exterior as an open counter-clockwise vertex list.
fn oriented_ccw(ring: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut coords = ring.0.clone();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }

    let mut signed = 0.0;
    let n = coords.len();
    for i in 0..n {
        let p = coords[i];
        let q = coords[(i + 1) % n];
        signed += p.x * q.y - q.x * p.y;
    }
    if signed < 0.0 {
        coords.reverse();
    }
    coords
}
