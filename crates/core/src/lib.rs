//! # terralink Core
//!
//! Core types and I/O for the terralink geospatial linkage pipeline.
//!
//! This crate provides:
//! - `Feature` / `FeatureCollection`: vector features with attributes,
//!   pinned to a single coordinate reference system
//! - `Crs`: Coordinate Reference System handling
//! - `Grid` / `Surface`: regular cell tilings and interpolated fields
//! - I/O for common vector formats (GeoJSON, shapefile, CSV) and a JSON
//!   snapshot format for reuse across pipeline runs

pub mod crs;
pub mod error;
pub mod feature;
pub mod grid;
pub mod io;

pub use crs::{Crs, CrsUnits};
pub use error::{Error, Result};
pub use feature::{AttributeValue, Feature, FeatureCollection};
pub use grid::{Grid, Surface};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{Crs, CrsUnits};
    pub use crate::error::{Error, Result};
    pub use crate::feature::{AttributeValue, Feature, FeatureCollection};
    pub use crate::grid::{Grid, Surface};
}
