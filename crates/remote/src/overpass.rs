//! Map-feature query API client (Overpass QL).
//!
//! Queries OpenStreetMap features by bounding box and tag, normalizing
//! the response into a WGS84 point collection: nodes at their location,
//! ways and relations at their computed center.

use serde::Deserialize;
use std::collections::HashMap;
use tracing::info;

use geo_types::{Geometry, Point};
use terralink_core::{AttributeValue, Crs, Feature, FeatureCollection};

use crate::error::{RemoteError, Result};
use crate::http::{HttpClient, HttpOptions};

const DEFAULT_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// A map-feature query: bbox plus one tag filter.
#[derive(Debug, Clone)]
pub struct FeatureQuery {
    /// Bounding box as (south, west, north, east) in WGS84 degrees.
    pub bbox: (f64, f64, f64, f64),
    /// Tag key to match, e.g. `"amenity"`.
    pub key: String,
    /// Tag value to match; `None` matches any value of the key.
    pub value: Option<String>,
}

impl FeatureQuery {
    /// Render the query as Overpass QL.
    pub fn to_ql(&self) -> String {
        let (south, west, north, east) = self.bbox;
        let filter = match &self.value {
            Some(value) => format!("[\"{}\"=\"{}\"]", self.key, value),
            None => format!("[\"{}\"]", self.key),
        };
        format!("[out:json][timeout:60];nwr{filter}({south},{west},{north},{east});out center;")
    }
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    kind: String,
    id: u64,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

/// Client for an Overpass-compatible map-feature query endpoint.
pub struct OverpassClient {
    http: HttpClient,
    endpoint: String,
}

impl OverpassClient {
    /// Client against the public Overpass endpoint.
    pub fn new(options: HttpOptions) -> Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT, options)
    }

    /// Client against a custom endpoint (e.g. a local instance).
    pub fn with_endpoint(endpoint: impl Into<String>, options: HttpOptions) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(options)?,
            endpoint: endpoint.into(),
        })
    }

    /// Run a query and normalize the elements into WGS84 point features.
    ///
    /// Elements without a resolvable location (relations the server
    /// returned no center for) are dropped.
    pub async fn fetch_features(&self, query: &FeatureQuery) -> Result<FeatureCollection> {
        let ql = query.to_ql();
        let response: OverpassResponse = self.http.post_text_json(&self.endpoint, &ql).await?;

        let collection = elements_to_features(response);
        info!(
            key = %query.key,
            features = collection.len(),
            "fetched map features"
        );

        if collection.is_empty() {
            return Err(RemoteError::Core(terralink_core::Error::EmptyResult(
                format!("map-feature query for '{}' returned no elements", query.key),
            )));
        }
        Ok(collection)
    }
}

fn elements_to_features(response: OverpassResponse) -> FeatureCollection {
    let mut out = FeatureCollection::new(Crs::wgs84());

    for element in response.elements {
        let location = match (element.lat, element.lon, &element.center) {
            (Some(lat), Some(lon), _) => Some((lon, lat)),
            (_, _, Some(center)) => Some((center.lon, center.lat)),
            _ => None,
        };
        let Some((lon, lat)) = location else {
            continue;
        };

        let Ok(mut feature) = Feature::new(Geometry::Point(Point::new(lon, lat))) else {
            continue;
        };
        feature.id = Some(format!("{}/{}", element.kind, element.id));
        for (key, value) in element.tags {
            feature.set_property(key, AttributeValue::String(value));
        }
        out.push(feature);
    }

    out
}
