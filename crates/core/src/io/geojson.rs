//! GeoJSON reading and writing via typed serde models.
//!
//! Parses `FeatureCollection` and single-`Feature` documents. Per RFC
//! 7946 the default CRS is WGS84; a legacy named-CRS member
//! (`"crs": {"type": "name", ...}`) is honored when present, and a
//! caller-declared CRS overrides both.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

use geo_types::{Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::feature::{AttributeValue, Feature, FeatureCollection};

// ── serde models ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct GjFeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    crs: Option<GjCrs>,
    features: Vec<GjFeature>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GjFeature {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    geometry: Option<GjGeometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GjCrs {
    #[serde(rename = "type")]
    kind: String,
    properties: Map<String, Value>,
}

/// GeoJSON geometry, tagged by `type`. Coordinates keep their raw nesting
/// depth; extra vertex dimensions (elevation) are dropped on conversion.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum GjGeometry {
    Point { coordinates: Vec<f64> },
    MultiPoint { coordinates: Vec<Vec<f64>> },
    LineString { coordinates: Vec<Vec<f64>> },
    MultiLineString { coordinates: Vec<Vec<Vec<f64>>> },
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
}

// ── reading ──────────────────────────────────────────────────────────────

/// Read a GeoJSON file into a [`FeatureCollection`].
pub fn read_geojson(path: impl AsRef<Path>, declared: Option<Crs>) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    parse_geojson(&text, &path.display().to_string(), declared)
}

/// Parse GeoJSON text into a [`FeatureCollection`].
///
/// `source_id` names the source in error messages.
pub fn parse_geojson(
    text: &str,
    source_id: &str,
    declared: Option<Crs>,
) -> Result<FeatureCollection> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::format(source_id, format!("invalid JSON: {e}")))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::format(source_id, "missing 'type' member"))?;

    let (features, embedded_crs) = match kind {
        "FeatureCollection" => {
            let fc: GjFeatureCollection = serde_json::from_value(value)
                .map_err(|e| Error::format(source_id, format!("bad FeatureCollection: {e}")))?;
            let crs = fc.crs.as_ref().and_then(parse_named_crs);
            (fc.features, crs)
        }
        "Feature" => {
            let f: GjFeature = serde_json::from_value(value)
                .map_err(|e| Error::format(source_id, format!("bad Feature: {e}")))?;
            (vec![f], None)
        }
        other => {
            return Err(Error::format(
                source_id,
                format!("expected FeatureCollection or Feature, found '{other}'"),
            ))
        }
    };

    let crs = declared.or(embedded_crs).unwrap_or_default();
    let mut out = FeatureCollection::new(crs);

    for (i, gj) in features.into_iter().enumerate() {
        let geometry = match gj.geometry {
            Some(g) => to_geometry(g, source_id, i)?,
            // Null-geometry rows carry nothing the pipeline can use.
            None => continue,
        };

        let mut feature = Feature::new(geometry)
            .map_err(|e| Error::format(source_id, format!("feature {i}: {e}")))?;

        if let Some(id) = gj.id {
            feature.id = Some(id_to_string(&id));
        }
        if let Some(props) = gj.properties {
            for (key, value) in props {
                feature.set_property(key, value_to_attribute(value));
            }
        }
        out.push(feature);
    }

    Ok(out)
}

fn parse_named_crs(crs: &GjCrs) -> Option<Crs> {
    if crs.kind != "name" {
        return None;
    }
    let name = crs.properties.get("name")?.as_str()?;
    // "EPSG:32630" or "urn:ogc:def:crs:EPSG::32630"
    let code = name
        .rsplit(':')
        .next()
        .and_then(|tail| tail.parse::<u32>().ok())?;
    Some(Crs::from_epsg(code))
}

fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_to_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                AttributeValue::Int(i)
            } else {
                AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => AttributeValue::String(s),
        // Nested structures are kept as their JSON text
        other => AttributeValue::String(other.to_string()),
    }
}

fn pos(coords: &[f64], source_id: &str, index: usize) -> Result<(f64, f64)> {
    if coords.len() < 2 {
        return Err(Error::format(
            source_id,
            format!("feature {index}: position with fewer than 2 ordinates"),
        ));
    }
    Ok((coords[0], coords[1]))
}

fn to_line_string(coords: &[Vec<f64>], source_id: &str, index: usize) -> Result<LineString<f64>> {
    let mut points = Vec::with_capacity(coords.len());
    for c in coords {
        points.push(pos(c, source_id, index)?);
    }
    Ok(LineString::from(points))
}

fn to_polygon(rings: &[Vec<Vec<f64>>], source_id: &str, index: usize) -> Result<Polygon<f64>> {
    if rings.is_empty() {
        return Err(Error::format(
            source_id,
            format!("feature {index}: polygon with no rings"),
        ));
    }
    let exterior = to_line_string(&rings[0], source_id, index)?;
    let mut interiors = Vec::with_capacity(rings.len().saturating_sub(1));
    for ring in &rings[1..] {
        interiors.push(to_line_string(ring, source_id, index)?);
    }
    Ok(Polygon::new(exterior, interiors))
}

fn to_geometry(g: GjGeometry, source_id: &str, index: usize) -> Result<Geometry<f64>> {
    Ok(match g {
        GjGeometry::Point { coordinates } => {
            let (x, y) = pos(&coordinates, source_id, index)?;
            Geometry::Point(Point::new(x, y))
        }
        GjGeometry::MultiPoint { coordinates } => {
            let mut points = Vec::with_capacity(coordinates.len());
            for c in &coordinates {
                let (x, y) = pos(c, source_id, index)?;
                points.push(Point::new(x, y));
            }
            Geometry::MultiPoint(MultiPoint::new(points))
        }
        GjGeometry::LineString { coordinates } => {
            Geometry::LineString(to_line_string(&coordinates, source_id, index)?)
        }
        GjGeometry::MultiLineString { coordinates } => {
            let mut lines = Vec::with_capacity(coordinates.len());
            for ls in &coordinates {
                lines.push(to_line_string(ls, source_id, index)?);
            }
            Geometry::MultiLineString(MultiLineString::new(lines))
        }
        GjGeometry::Polygon { coordinates } => {
            Geometry::Polygon(to_polygon(&coordinates, source_id, index)?)
        }
        GjGeometry::MultiPolygon { coordinates } => {
            let mut polygons = Vec::with_capacity(coordinates.len());
            for rings in &coordinates {
                polygons.push(to_polygon(rings, source_id, index)?);
            }
            Geometry::MultiPolygon(MultiPolygon::new(polygons))
        }
    })
}

// ── writing ──────────────────────────────────────────────────────────────

/// Write a [`FeatureCollection`] as GeoJSON.
///
/// Non-WGS84 collections get a legacy named-CRS member so the frame
/// survives a round trip.
pub fn write_geojson(path: impl AsRef<Path>, collection: &FeatureCollection) -> Result<()> {
    let path = path.as_ref();
    let doc = to_geojson_value(collection)?;
    let text = serde_json::to_string_pretty(&doc)
        .map_err(|e| Error::format(path.display().to_string(), e.to_string()))?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Render a collection as a GeoJSON `serde_json::Value`.
pub fn to_geojson_value(collection: &FeatureCollection) -> Result<Value> {
    let mut features = Vec::with_capacity(collection.len());
    for feature in collection.iter() {
        features.push(feature_to_value(feature)?);
    }

    let mut doc = Map::new();
    doc.insert("type".into(), Value::String("FeatureCollection".into()));
    if !collection.crs().is_geographic() {
        doc.insert(
            "crs".into(),
            serde_json::json!({
                "type": "name",
                "properties": { "name": collection.crs().identifier() }
            }),
        );
    }
    doc.insert("features".into(), Value::Array(features));
    Ok(Value::Object(doc))
}

fn feature_to_value(feature: &Feature) -> Result<Value> {
    let mut obj = Map::new();
    obj.insert("type".into(), Value::String("Feature".into()));
    if let Some(id) = &feature.id {
        obj.insert("id".into(), Value::String(id.clone()));
    }
    obj.insert("geometry".into(), geometry_to_value(&feature.geometry)?);
    obj.insert(
        "properties".into(),
        Value::Object(properties_to_map(&feature.properties)),
    );
    Ok(Value::Object(obj))
}

fn properties_to_map(properties: &HashMap<String, AttributeValue>) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in properties {
        let v = match value {
            AttributeValue::Null => Value::Null,
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::Int(i) => Value::from(*i),
            AttributeValue::Float(f) => Value::from(*f),
            AttributeValue::String(s) => Value::String(s.clone()),
        };
        map.insert(key.clone(), v);
    }
    map
}

fn ring_coords(ring: &LineString<f64>) -> Value {
    Value::Array(
        ring.0
            .iter()
            .map(|c| Value::Array(vec![Value::from(c.x), Value::from(c.y)]))
            .collect(),
    )
}

fn polygon_coords(polygon: &Polygon<f64>) -> Value {
    let mut rings = vec![ring_coords(polygon.exterior())];
    rings.extend(polygon.interiors().iter().map(ring_coords));
    Value::Array(rings)
}

fn geometry_to_value(geometry: &Geometry<f64>) -> Result<Value> {
    let (kind, coordinates) = match geometry {
        Geometry::Point(p) => (
            "Point",
            Value::Array(vec![Value::from(p.x()), Value::from(p.y())]),
        ),
        Geometry::MultiPoint(mp) => (
            "MultiPoint",
            Value::Array(
                mp.0.iter()
                    .map(|p| Value::Array(vec![Value::from(p.x()), Value::from(p.y())]))
                    .collect(),
            ),
        ),
        Geometry::Line(l) => (
            "LineString",
            ring_coords(&LineString::from(vec![
                (l.start.x, l.start.y),
                (l.end.x, l.end.y),
            ])),
        ),
        Geometry::LineString(ls) => ("LineString", ring_coords(ls)),
        Geometry::MultiLineString(mls) => (
            "MultiLineString",
            Value::Array(mls.0.iter().map(ring_coords).collect()),
        ),
        Geometry::Polygon(p) => ("Polygon", polygon_coords(p)),
        Geometry::MultiPolygon(mp) => (
            "MultiPolygon",
            Value::Array(mp.0.iter().map(polygon_coords).collect()),
        ),
        Geometry::Rect(r) => ("Polygon", polygon_coords(&r.to_polygon())),
        Geometry::Triangle(t) => ("Polygon", polygon_coords(&t.to_polygon())),
        Geometry::GeometryCollection(_) => {
            return Err(Error::InvalidGeometry(
                "GeometryCollection is not representable in this writer".into(),
            ))
        }
    };

    Ok(serde_json::json!({ "type": kind, "coordinates": coordinates }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": "zone-1",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
                },
                "properties": { "population": 1200, "density": 3.5, "name": "centre" }
            },
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [0.5, 0.5, 99.0] },
                "properties": { "flag": true, "note": null }
            }
        ]
    }"#;

    #[test]
    fn test_parse_feature_collection() {
        let fc = parse_geojson(SAMPLE, "test", None).unwrap();
        assert_eq!(fc.len(), 2);
        assert!(fc.crs().is_geographic());

        let zone = &fc.features()[0];
        assert_eq!(zone.id.as_deref(), Some("zone-1"));
        assert_eq!(zone.number("population"), Some(1200.0));
        assert_eq!(zone.number("density"), Some(3.5));

        let point = &fc.features()[1];
        assert!(matches!(point.geometry, Geometry::Point(_)));
        assert_eq!(
            point.get_property("flag"),
            Some(&AttributeValue::Bool(true))
        );
        assert_eq!(point.get_property("note"), Some(&AttributeValue::Null));
    }

    #[test]
    fn test_declared_crs_overrides() {
        let fc = parse_geojson(SAMPLE, "test", Some(Crs::utm(30, true))).unwrap();
        assert_eq!(fc.crs().epsg(), Some(32630));
    }

    #[test]
    fn test_parse_named_crs_member() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "EPSG:32630" } },
            "features": []
        }"#;
        let fc = parse_geojson(text, "test", None).unwrap();
        assert_eq!(fc.crs().epsg(), Some(32630));
    }

    #[test]
    fn test_parse_single_feature() {
        let text = r#"{
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [1.0, 2.0] },
            "properties": {}
        }"#;
        let fc = parse_geojson(text, "test", None).unwrap();
        assert_eq!(fc.len(), 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_geojson("not json", "test", None),
            Err(Error::Format { .. })
        ));
        assert!(matches!(
            parse_geojson(r#"{"type": "Banana"}"#, "test", None),
            Err(Error::Format { .. })
        ));
    }

    #[test]
    fn test_round_trip() {
        let fc = parse_geojson(SAMPLE, "test", None).unwrap();
        let value = to_geojson_value(&fc).unwrap();
        let back = parse_geojson(&value.to_string(), "round-trip", None).unwrap();

        assert_eq!(back.len(), fc.len());
        assert_eq!(
            back.features()[0].number("population"),
            fc.features()[0].number("population")
        );
        assert_eq!(back.features()[0].geometry, fc.features()[0].geometry);
    }

    #[test]
    fn test_round_trip_keeps_projected_crs() {
        let mut fc = FeatureCollection::new(Crs::utm(30, true));
        fc.push(Feature::new(Geometry::Point(Point::new(440_000.0, 4_474_000.0))).unwrap());

        let value = to_geojson_value(&fc).unwrap();
        let back = parse_geojson(&value.to_string(), "round-trip", None).unwrap();
        assert_eq!(back.crs().epsg(), Some(32630));
    }
}
