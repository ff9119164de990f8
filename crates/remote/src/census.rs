//! Statistical-table API client.
//!
//! Fetches one value per geography code from a census-style tabular API
//! and attaches the result onto polygon features by code: the linkage
//! half of a spatial join where the key is administrative rather than
//! geometric.
//!
//! The endpoint contract is the common denominator of statistical APIs:
//! `GET {base}/dataset/{dataset}.json?field={value_field}&geography=a,b,c`
//! returning `{"rows": [{"geography": "...", "value": 1.0}, ...]}`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use terralink_core::{AttributeValue, Error, FeatureCollection};

use crate::error::{RemoteError, Result};
use crate::http::{HttpClient, HttpOptions};

/// A table request: which dataset, which value, which geographies.
#[derive(Debug, Clone, Serialize)]
pub struct TableQuery {
    /// Dataset identifier, e.g. a census table code.
    pub dataset: String,
    /// Which value column to fetch.
    pub value_field: String,
    /// Geography codes to fetch rows for.
    pub geographies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TableResponse {
    rows: Vec<TableRow>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    geography: String,
    value: Option<f64>,
}

/// Client for a statistical-table API endpoint.
pub struct CensusClient {
    http: HttpClient,
    base_url: String,
}

impl CensusClient {
    /// Create a client for the given API root.
    pub fn new(base_url: impl Into<String>, options: HttpOptions) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(options)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch one value per requested geography code.
    ///
    /// Codes the API does not return are absent from the map, so callers
    /// can distinguish "not returned" from "returned null" via the
    /// entry's `Option<f64>`.
    pub async fn fetch_table(&self, query: &TableQuery) -> Result<HashMap<String, Option<f64>>> {
        if query.geographies.is_empty() {
            return Err(RemoteError::Core(Error::InvalidParameter {
                name: "geographies",
                value: "[]".into(),
                reason: "at least one geography code is required".into(),
            }));
        }

        let url = format!(
            "{}/dataset/{}.json?field={}&geography={}",
            self.base_url,
            query.dataset,
            query.value_field,
            query.geographies.join(",")
        );

        let response: TableResponse = self.http.get_json(&url).await?;
        info!(
            dataset = %query.dataset,
            requested = query.geographies.len(),
            returned = response.rows.len(),
            "fetched census table"
        );

        Ok(response
            .rows
            .into_iter()
            .map(|row| (row.geography, row.value))
            .collect())
    }
}

/// Attach fetched table values onto features by geography code.
///
/// Features whose `key_field` attribute matches a table row gain
/// `attr_name` with the row's value (`Null` when the API returned null);
/// unmatched features are left untouched. A missing row is data, not an
/// error.
pub fn attach_table(
    collection: &FeatureCollection,
    table: &HashMap<String, Option<f64>>,
    key_field: &str,
    attr_name: &str,
) -> FeatureCollection {
    let mut out = FeatureCollection::new(collection.crs().clone());

    for feature in collection.iter() {
        let mut feature = feature.clone();
        let key = feature
            .get_property(key_field)
            .and_then(AttributeValue::as_str)
            .map(str::to_string);
        if let Some(code) = key {
            if let Some(value) = table.get(&code) {
                let attr = match value {
                    Some(v) => AttributeValue::Float(*v),
                    None => AttributeValue::Null,
                };
                feature.set_property(attr_name, attr);
            }
        }
        out.push(feature);
    }

    out
}
