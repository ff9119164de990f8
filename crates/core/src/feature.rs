//! Vector features: geometry plus attributes, pinned to one CRS.
//!
//! A [`Feature`] pairs a non-empty geometry with a scalar attribute map.
//! A [`FeatureCollection`] holds features sharing a single [`Crs`]; the
//! CRS travels with the collection, and operations over two collections
//! check equivalence up front rather than reprojecting implicitly.

use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::crs::Crs;
use crate::error::{Error, Result};

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Numeric view of the value: `Int` and `Float` convert, the rest
    /// yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// String view of the value, without conversion.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Optional feature ID
    pub id: Option<String>,
    /// Feature geometry (never empty)
    pub geometry: Geometry<f64>,
    /// Feature attributes
    pub properties: HashMap<String, AttributeValue>,
}

impl Feature {
    /// Create a new feature from a geometry.
    ///
    /// Rejects empty geometries (zero coordinates): every feature in the
    /// pipeline carries a usable payload.
    pub fn new(geometry: Geometry<f64>) -> Result<Self> {
        if coordinate_count(&geometry) == 0 {
            return Err(Error::InvalidGeometry(
                "feature geometry has no coordinates".into(),
            ));
        }
        Ok(Self {
            id: None,
            geometry,
            properties: HashMap::new(),
        })
    }

    /// Builder-style ID assignment.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Numeric attribute lookup; `None` when absent or non-numeric.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(AttributeValue::as_f64)
    }
}

/// Collection of features sharing one CRS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    crs: Crs,
    features: Vec<Feature>,
}

impl FeatureCollection {
    /// Create an empty collection in the given CRS.
    pub fn new(crs: Crs) -> Self {
        Self {
            crs,
            features: Vec::new(),
        }
    }

    /// Create a collection from features, all tagged with `crs`.
    pub fn from_features(crs: Crs, features: Vec<Feature>) -> Self {
        Self { crs, features }
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Fail fast when two collections are not in the same reference frame.
    pub fn ensure_same_crs(&self, other: &FeatureCollection) -> Result<()> {
        if self.crs.is_equivalent(&other.crs) {
            Ok(())
        } else {
            Err(Error::CrsMismatch(
                self.crs.identifier(),
                other.crs.identifier(),
            ))
        }
    }

    /// Axis-aligned bounds over all coordinates: (min_x, min_y, max_x, max_y).
    ///
    /// `None` for an empty collection.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut bounds: Option<(f64, f64, f64, f64)> = None;
        for feature in &self.features {
            visit_coords(&feature.geometry, &mut |x, y| {
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((min_x, min_y, max_x, max_y)) => {
                        (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
                    }
                });
            });
        }
        bounds
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

/// Total number of coordinates in a geometry.
pub fn coordinate_count(geometry: &Geometry<f64>) -> usize {
    let mut n = 0;
    visit_coords(geometry, &mut |_, _| n += 1);
    n
}

/// Visit every (x, y) coordinate of a geometry in order.
pub fn visit_coords<F: FnMut(f64, f64)>(geometry: &Geometry<f64>, f: &mut F) {
    match geometry {
        Geometry::Point(p) => f(p.x(), p.y()),
        Geometry::Line(l) => {
            f(l.start.x, l.start.y);
            f(l.end.x, l.end.y);
        }
        Geometry::LineString(ls) => {
            for c in &ls.0 {
                f(c.x, c.y);
            }
        }
        Geometry::Polygon(poly) => {
            for c in &poly.exterior().0 {
                f(c.x, c.y);
            }
            for ring in poly.interiors() {
                for c in &ring.0 {
                    f(c.x, c.y);
                }
            }
        }
        Geometry::MultiPoint(mp) => {
            for p in &mp.0 {
                f(p.x(), p.y());
            }
        }
        Geometry::MultiLineString(mls) => {
            for ls in &mls.0 {
                for c in &ls.0 {
                    f(c.x, c.y);
                }
            }
        }
        Geometry::MultiPolygon(mp) => {
            for poly in &mp.0 {
                for c in &poly.exterior().0 {
                    f(c.x, c.y);
                }
                for ring in poly.interiors() {
                    for c in &ring.0 {
                        f(c.x, c.y);
                    }
                }
            }
        }
        Geometry::GeometryCollection(gc) => {
            for g in &gc.0 {
                visit_coords(g, f);
            }
        }
        Geometry::Rect(r) => {
            f(r.min().x, r.min().y);
            f(r.max().x, r.min().y);
            f(r.max().x, r.max().y);
            f(r.min().x, r.max().y);
        }
        Geometry::Triangle(t) => {
            f(t.0.x, t.0.y);
            f(t.1.x, t.1.y);
            f(t.2.x, t.2.y);
        }
    }
}
