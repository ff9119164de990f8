//! JSON snapshot persistence for feature collections.
//!
//! Snapshots serialize the full [`FeatureCollection`] (geometry,
//! attributes and CRS) so a pipeline stage's output can be reused
//! across runs without re-ingesting or re-reprojecting.

use std::path::Path;

use crate::error::{Error, Result};
use crate::feature::FeatureCollection;

/// Persist a collection as a JSON snapshot.
pub fn write_snapshot(path: impl AsRef<Path>, collection: &FeatureCollection) -> Result<()> {
    let path = path.as_ref();
    let text = serde_json::to_string(collection)
        .map_err(|e| Error::format(path.display().to_string(), e.to_string()))?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Load a collection from a JSON snapshot.
pub fn read_snapshot(path: impl AsRef<Path>) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| Error::format(path.display().to_string(), format!("bad snapshot: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;
    use crate::feature::{AttributeValue, Feature};
    use geo_types::{Geometry, Point};

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stage3.json");

        let mut fc = FeatureCollection::new(Crs::utm(30, true));
        let mut f = Feature::new(Geometry::Point(Point::new(440_000.0, 4_474_000.0)))
            .unwrap()
            .with_id("s-1");
        f.set_property("no2", AttributeValue::Float(38.1));
        fc.push(f);

        write_snapshot(&path, &fc).unwrap();
        let back = read_snapshot(&path).unwrap();

        assert_eq!(back.len(), 1);
        assert_eq!(back.crs().epsg(), Some(32630));
        assert_eq!(back.features()[0].id.as_deref(), Some("s-1"));
        assert_eq!(back.features()[0].number("no2"), Some(38.1));
    }

    #[test]
    fn test_snapshot_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(read_snapshot(&path), Err(Error::Format { .. })));
    }
}
