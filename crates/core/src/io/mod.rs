//! I/O operations for reading and writing vector data
//!
//! Local ingestion normalizes every source format into the
//! [`FeatureCollection`](crate::FeatureCollection) model. Remote sources
//! (statistical APIs, map-feature queries, file downloads) live in the
//! `terralink-remote` crate.

mod csv_points;
mod geojson;
mod shapefile;
mod snapshot;

pub use csv_points::{read_csv_points, CsvOptions};
pub use geojson::{parse_geojson, read_geojson, write_geojson};
pub use shapefile::read_shapefile;
pub use snapshot::{read_snapshot, write_snapshot};

use std::path::Path;

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::feature::FeatureCollection;

/// Options for [`read_features`].
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// CRS declared by the caller. Mandatory for shapefiles (no `.prj`
    /// parsing); overrides any CRS embedded in GeoJSON.
    pub crs: Option<Crs>,
    /// X (longitude/easting) column name for CSV sources.
    pub x_column: String,
    /// Y (latitude/northing) column name for CSV sources.
    pub y_column: String,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            crs: None,
            x_column: "x".to_string(),
            y_column: "y".to_string(),
        }
    }
}

/// Read a feature collection from a local file, dispatching on extension.
///
/// Supported: `.geojson`/`.json` (GeoJSON), `.shp` (shapefile, declared
/// CRS required), `.csv` (coordinate columns per [`ReadOptions`]).
pub fn read_features(path: impl AsRef<Path>, options: &ReadOptions) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "geojson" | "json" => read_geojson(path, options.crs.clone()),
        "shp" => {
            let crs = options.crs.clone().ok_or(Error::InvalidParameter {
                name: "crs",
                value: "None".into(),
                reason: "shapefiles carry no parsed CRS; declare one explicitly".into(),
            })?;
            read_shapefile(path, crs)
        }
        "csv" => {
            let csv_options = CsvOptions {
                x_column: options.x_column.clone(),
                y_column: options.y_column.clone(),
                crs: options.crs.clone().unwrap_or_default(),
            };
            read_csv_points(path, &csv_options)
        }
        other => Err(Error::format(
            path.display().to_string(),
            format!("unsupported extension '{other}'"),
        )),
    }
}
