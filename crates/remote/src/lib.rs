//! # terralink Remote
//!
//! Remote ingestion for the terralink pipeline: the only part of the
//! system touching an unreliable external resource, and therefore the
//! only one that retries (exponential backoff on transient failures).
//!
//! - [`HttpClient`]: retrying HTTP client (bytes / JSON, GET / POST)
//! - [`CensusClient`]: statistical-table API → attribute rows keyed by
//!   geography code, join-ready
//! - [`OverpassClient`]: map-feature query API → WGS84 point features
//! - [`DownloadCache`]: opportunistic disk + LRU byte cache
//! - `sync_api`: blocking wrappers so callers don't manage a runtime

pub mod census;
pub mod download;
pub mod error;
pub mod http;
pub mod overpass;
pub mod sync_api;

pub use census::{attach_table, CensusClient, TableQuery};
pub use download::DownloadCache;
pub use error::{RemoteError, Result};
pub use http::{HttpClient, HttpOptions};
pub use overpass::{FeatureQuery, OverpassClient};
pub use sync_api::{download, CensusBlocking, OverpassBlocking};
