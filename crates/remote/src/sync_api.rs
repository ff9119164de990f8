//! Blocking (synchronous) API for the remote clients.
//!
//! Wraps the async clients with a current-thread Tokio runtime so the
//! synchronous pipeline (and the CLI) never manage their own runtime.

use std::collections::HashMap;
use std::path::Path;

use terralink_core::FeatureCollection;

use crate::census::{CensusClient, TableQuery};
use crate::download::DownloadCache;
use crate::error::{RemoteError, Result};
use crate::http::{HttpClient, HttpOptions};
use crate::overpass::{FeatureQuery, OverpassClient};

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| RemoteError::network("tokio", e.to_string()))
}

/// Blocking wrapper around [`CensusClient`].
pub struct CensusBlocking {
    rt: tokio::runtime::Runtime,
    inner: CensusClient,
}

impl CensusBlocking {
    pub fn new(base_url: impl Into<String>, options: HttpOptions) -> Result<Self> {
        Ok(Self {
            rt: runtime()?,
            inner: CensusClient::new(base_url, options)?,
        })
    }

    /// Fetch a table (blocking).
    pub fn fetch_table(&self, query: &TableQuery) -> Result<HashMap<String, Option<f64>>> {
        self.rt.block_on(self.inner.fetch_table(query))
    }
}

/// Blocking wrapper around [`OverpassClient`].
pub struct OverpassBlocking {
    rt: tokio::runtime::Runtime,
    inner: OverpassClient,
}

impl OverpassBlocking {
    pub fn new(options: HttpOptions) -> Result<Self> {
        Ok(Self {
            rt: runtime()?,
            inner: OverpassClient::new(options)?,
        })
    }

    pub fn with_endpoint(endpoint: impl Into<String>, options: HttpOptions) -> Result<Self> {
        Ok(Self {
            rt: runtime()?,
            inner: OverpassClient::with_endpoint(endpoint, options)?,
        })
    }

    /// Run a map-feature query (blocking).
    pub fn fetch_features(&self, query: &FeatureQuery) -> Result<FeatureCollection> {
        self.rt.block_on(self.inner.fetch_features(query))
    }
}

/// One-shot blocking download with an opportunistic disk cache.
pub fn download(url: &str, cache_dir: Option<&Path>) -> Result<Vec<u8>> {
    let rt = runtime()?;
    let http = HttpClient::new(HttpOptions::default())?;
    let mut cache = DownloadCache::new(8, cache_dir.map(Path::to_path_buf));
    let bytes = rt.block_on(cache.fetch(&http, url))?;
    Ok(bytes.as_ref().clone())
}
