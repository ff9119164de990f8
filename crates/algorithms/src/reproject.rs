//! Pure-Rust reprojection between WGS84, UTM and Web Mercator.
//!
//! Covers EPSG:4326 ↔ EPSG 326xx/327xx (UTM North/South, Snyder 1987
//! forward and inverse series) and EPSG:4326 ↔ EPSG:3857. No external C
//! dependencies (no libproj), so it works on WASM targets.
//!
//! Reprojection is explicit and pure: attributes pass through untouched,
//! reprojecting to the collection's own CRS is the identity, and a
//! round trip A→B→A returns the input within floating-point tolerance.
//!
//! Reference:
//! Snyder, J.P. (1987). Map Projections: A Working Manual.
//! USGS Professional Paper 1395, pp. 38-47 (Mercator), 57-64 (UTM).

use geo::MapCoords;
use geo_types::Coord;
use terralink_core::{Crs, Error, FeatureCollection, Result};

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

// ── Public API ───────────────────────────────────────────────────────────

/// Supported projection frames.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Frame {
    /// WGS84 geographic (EPSG:4326), degrees
    Geographic,
    /// UTM zone, metres
    Utm { zone: u32, north: bool },
    /// Spherical Web Mercator (EPSG:3857), metres
    WebMercator,
}

fn frame_of(crs: &Crs) -> Result<Frame> {
    if crs.is_geographic() {
        return Ok(Frame::Geographic);
    }
    if crs.epsg() == Some(3857) {
        return Ok(Frame::WebMercator);
    }
    if let Some((zone, north)) = crs.utm_zone() {
        return Ok(Frame::Utm { zone, north });
    }
    Err(Error::UnsupportedCrs {
        from: crs.identifier(),
        to: String::new(),
    })
}

/// Reproject every geometry of a collection into `target`.
///
/// Pure function: attribute maps and feature order are preserved, and the
/// input collection is untouched. Reprojecting to an equivalent CRS
/// returns a copy tagged with `target` without transforming coordinates.
pub fn reproject(collection: &FeatureCollection, target: &Crs) -> Result<FeatureCollection> {
    if collection.crs().is_equivalent(target) {
        let features = collection.features().to_vec();
        return Ok(FeatureCollection::from_features(target.clone(), features));
    }

    let from = frame_of(collection.crs()).map_err(|_| Error::UnsupportedCrs {
        from: collection.crs().identifier(),
        to: target.identifier(),
    })?;
    let to = frame_of(target).map_err(|_| Error::UnsupportedCrs {
        from: collection.crs().identifier(),
        to: target.identifier(),
    })?;

    let features = collection
        .iter()
        .map(|feature| {
            let mut out = feature.clone();
            out.geometry = feature.geometry.map_coords(|c: Coord<f64>| {
                let (x, y) = transform(from, to, c.x, c.y);
                Coord { x, y }
            });
            out
        })
        .collect();

    Ok(FeatureCollection::from_features(target.clone(), features))
}

/// Transform a single coordinate pair between two CRS.
///
/// Errors when either CRS is outside the supported frames.
pub fn transform_point(from: &Crs, to: &Crs, x: f64, y: f64) -> Result<(f64, f64)> {
    if from.is_equivalent(to) {
        return Ok((x, y));
    }
    let from_frame = frame_of(from).map_err(|_| Error::UnsupportedCrs {
        from: from.identifier(),
        to: to.identifier(),
    })?;
    let to_frame = frame_of(to).map_err(|_| Error::UnsupportedCrs {
        from: from.identifier(),
        to: to.identifier(),
    })?;
    Ok(transform(from_frame, to_frame, x, y))
}

/// Route through WGS84 as the hub frame.
fn transform(from: Frame, to: Frame, x: f64, y: f64) -> (f64, f64) {
    if from == to {
        return (x, y);
    }
    let (lon, lat) = match from {
        Frame::Geographic => (x, y),
        Frame::Utm { zone, north } => utm_to_wgs84(x, y, zone, north),
        Frame::WebMercator => web_mercator_to_wgs84(x, y),
    };
    match to {
        Frame::Geographic => (lon, lat),
        Frame::Utm { zone, north } => wgs84_to_utm(lon, lat, zone, north),
        Frame::WebMercator => wgs84_to_web_mercator(lon, lat),
    }
}

// ── Web Mercator (Snyder 1987, spherical form) ──────────────────────────

fn wgs84_to_web_mercator(lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    let x = A * lon_deg.to_radians();
    // Clamp to the projection's defined latitude band
    let lat = lat_deg.clamp(-85.051_128_78, 85.051_128_78).to_radians();
    let y = A * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();
    (x, y)
}

fn web_mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / A).to_degrees();
    let lat = (2.0 * (y / A).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

// ── UTM forward (Snyder 1987, eq. 8-9..8-10) ────────────────────────────

/// Convert WGS84 (longitude, latitude) in degrees to UTM (easting,
/// northing) in metres for the given zone and hemisphere.
fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();

    let lon0 = central_meridian(zone);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a_coeff = cos_lat * (lon - lon0);

    let m = meridional_arc(lat);

    let a2 = a_coeff * a_coeff;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    let easting = K0 * n
        * (a_coeff
            + (1.0 - t + c) * a2 * a_coeff / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a_coeff / 120.0)
        + FALSE_EASTING;

    let northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    let northing = if north {
        northing
    } else {
        northing + FALSE_NORTHING_SOUTH
    };

    (easting, northing)
}

// ── UTM inverse (Snyder 1987, eq. 8-17..8-25) ───────────────────────────

/// Convert UTM (easting, northing) in metres back to WGS84 (longitude,
/// latitude) in degrees.
fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if north {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * E2 * E2 / 64.0 - 5.0 * E2 * E2 * E2 / 256.0));

    let sqrt_1_e2 = (1.0 - E2).sqrt();
    let e1 = (1.0 - sqrt_1_e2) / (1.0 + sqrt_1_e2);
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_2 * e1_2;

    // Footpoint latitude (Snyder eq. 3-26)
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let c1 = E_PRIME2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;
    let n1 = A / (1.0 - E2 * sin_phi1 * sin_phi1).sqrt();
    let r1 = A * (1.0 - E2) / (1.0 - E2 * sin_phi1 * sin_phi1).powf(1.5);
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d3 = d2 * d;
    let d4 = d2 * d2;
    let d5 = d4 * d;
    let d6 = d4 * d2;

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                    - 252.0 * E_PRIME2
                    - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                * d5
                / 120.0)
            / cos_phi1;

    (lon.to_degrees(), lat.to_degrees())
}

/// Central meridian of a UTM zone, in radians.
fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

/// Meridional arc from equator to latitude `lat` (radians).
/// Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e2 = E2;
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    A * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{Geometry, Point};
    use terralink_core::{AttributeValue, Feature};

    /// Helper: assert two values are within `tol` of each other.
    fn assert_close(a: f64, b: f64, tol: f64, msg: &str) {
        let diff = (a - b).abs();
        assert!(
            diff < tol,
            "{msg}: expected {b}, got {a}, diff {diff} exceeds tolerance {tol}"
        );
    }

    // Reference values from pyproj (PROJ 9.x):
    //   from pyproj import Transformer
    //   t = Transformer.from_crs(4326, 32630, always_xy=True)
    //   t.transform(-3.7037, 40.4168) → (440298.94, 4474257.31)
    #[test]
    fn madrid_wgs84_to_utm30n() {
        let (e, n) = wgs84_to_utm(-3.7037, 40.4168, 30, true);
        assert_close(e, 440_298.94, 1.0, "easting");
        assert_close(n, 4_474_257.31, 1.0, "northing");
    }

    // Buenos Aires: (-58.3816, -34.6037) → UTM 21S (EPSG:32721)
    //   t.transform(-58.3816, -34.6037) → (373317.50, 6170036.17)
    #[test]
    fn buenos_aires_wgs84_to_utm21s() {
        let (e, n) = wgs84_to_utm(-58.3816, -34.6037, 21, false);
        assert_close(e, 373_317.50, 1.0, "easting");
        assert_close(n, 6_170_036.17, 1.0, "northing");
    }

    // Equator at zone 30 central meridian (-3°): easting should be 500000
    #[test]
    fn equator_central_meridian() {
        let (e, n) = wgs84_to_utm(-3.0, 0.0, 30, true);
        assert_close(e, 500_000.0, 0.01, "easting at CM");
        assert_close(n, 0.0, 0.01, "northing at equator");
    }

    // London: (-0.1278, 51.5074) → EPSG:3857 (-14226.19, 6711542.47)
    #[test]
    fn london_wgs84_to_web_mercator() {
        let (x, y) = wgs84_to_web_mercator(-0.1278, 51.5074);
        assert_close(x, -14_226.19, 1.0, "x");
        assert_close(y, 6_711_542.47, 1.0, "y");
    }

    #[test]
    fn utm_round_trip() {
        let cases = [
            (-3.7037, 40.4168, 30, true),
            (-58.3816, -34.6037, 21, false),
            (0.01, 51.0, 31, true),
        ];
        for (lon, lat, zone, north) in cases {
            let (e, n) = wgs84_to_utm(lon, lat, zone, north);
            let (lon2, lat2) = utm_to_wgs84(e, n, zone, north);
            assert_close(lon2, lon, 1e-7, "lon round trip");
            assert_close(lat2, lat, 1e-7, "lat round trip");
        }
    }

    #[test]
    fn web_mercator_round_trip() {
        let (x, y) = wgs84_to_web_mercator(-0.1278, 51.5074);
        let (lon, lat) = web_mercator_to_wgs84(x, y);
        assert_close(lon, -0.1278, 1e-9, "lon");
        assert_close(lat, 51.5074, 1e-9, "lat");
    }

    fn london_points() -> FeatureCollection {
        let mut fc = FeatureCollection::new(Crs::wgs84());
        let mut f = Feature::new(Geometry::Point(Point::new(-0.1278, 51.5074)))
            .unwrap()
            .with_id("london");
        f.set_property("population", AttributeValue::Int(8_900_000));
        fc.push(f);
        fc
    }

    #[test]
    fn reproject_preserves_attributes() {
        let fc = london_points();
        let out = reproject(&fc, &Crs::utm(30, true)).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out.crs().epsg(), Some(32630));
        assert_eq!(out.features()[0].id.as_deref(), Some("london"));
        assert_eq!(out.features()[0].number("population"), Some(8_900_000.0));

        // Coordinates actually changed frame
        if let Geometry::Point(p) = &out.features()[0].geometry {
            assert!(p.x() > 600_000.0, "easting in metres, got {}", p.x());
            assert!(p.y() > 5_000_000.0, "northing in metres, got {}", p.y());
        } else {
            panic!("expected point");
        }
    }

    #[test]
    fn reproject_same_crs_is_identity() {
        let fc = london_points();
        let out = reproject(&fc, &Crs::wgs84()).unwrap();
        assert_eq!(out.features()[0].geometry, fc.features()[0].geometry);
    }

    #[test]
    fn reproject_round_trip_within_tolerance() {
        let fc = london_points();
        let utm = reproject(&fc, &Crs::utm(30, true)).unwrap();
        let back = reproject(&utm, &Crs::wgs84()).unwrap();

        let (Geometry::Point(p0), Geometry::Point(p1)) =
            (&fc.features()[0].geometry, &back.features()[0].geometry)
        else {
            panic!("expected points");
        };
        assert_close(p1.x(), p0.x(), 1e-6, "lon");
        assert_close(p1.y(), p0.y(), 1e-6, "lat");
    }

    #[test]
    fn reproject_unsupported_crs_is_an_error() {
        let fc = london_points();
        let result = reproject(&fc, &Crs::from_epsg(27700));
        assert!(matches!(result, Err(Error::UnsupportedCrs { .. })));
    }

    #[test]
    fn transform_point_between_projected_frames() {
        // UTM 30N → Web Mercator, routed through WGS84
        let (e, n) = wgs84_to_utm(-3.7037, 40.4168, 30, true);
        let (x, y) =
            transform_point(&Crs::utm(30, true), &Crs::web_mercator(), e, n).unwrap();
        let (lon, lat) = web_mercator_to_wgs84(x, y);
        assert_close(lon, -3.7037, 1e-6, "lon via hub");
        assert_close(lat, 40.4168, 1e-6, "lat via hub");
    }
}
