//! CSV ingestion for tables with coordinate columns.
//!
//! Each row becomes a point feature; the caller names the x and y
//! columns, everything else lands in the attribute map with numeric
//! sniffing (int, then float, then text).

use std::path::Path;

use geo_types::{Geometry, Point};

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::feature::{AttributeValue, Feature, FeatureCollection};

/// Options for [`read_csv_points`].
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Name of the x (longitude/easting) column.
    pub x_column: String,
    /// Name of the y (latitude/northing) column.
    pub y_column: String,
    /// CRS the coordinates are expressed in.
    pub crs: Crs,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            x_column: "x".to_string(),
            y_column: "y".to_string(),
            crs: Crs::wgs84(),
        }
    }
}

/// Read a CSV file of point observations into a [`FeatureCollection`].
pub fn read_csv_points(path: impl AsRef<Path>, options: &CsvOptions) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let source_id = path.display().to_string();

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::format(&source_id, e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| Error::format(&source_id, e.to_string()))?
        .clone();

    let column_index = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::MissingField(format!("{name} (in {source_id})")))
    };
    let x_idx = column_index(&options.x_column)?;
    let y_idx = column_index(&options.y_column)?;

    let mut out = FeatureCollection::new(options.crs.clone());

    for (row_number, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::format(&source_id, e.to_string()))?;

        let parse_coord = |idx: usize, axis: &str| -> Result<f64> {
            record
                .get(idx)
                .and_then(|v| v.parse::<f64>().ok())
                .ok_or_else(|| {
                    Error::format(
                        &source_id,
                        format!("row {}: unparseable {axis} coordinate", row_number + 2),
                    )
                })
        };
        let x = parse_coord(x_idx, "x")?;
        let y = parse_coord(y_idx, "y")?;

        let mut feature = Feature::new(Geometry::Point(Point::new(x, y)))
            .map_err(|e| Error::format(&source_id, format!("row {}: {e}", row_number + 2)))?;

        for (idx, value) in record.iter().enumerate() {
            if idx == x_idx || idx == y_idx {
                continue;
            }
            let Some(name) = headers.get(idx) else {
                continue;
            };
            feature.set_property(name, sniff(value));
        }

        out.push(feature);
    }

    Ok(out)
}

/// Numeric sniffing: int, then float, then bool, then text; empty → Null.
fn sniff(value: &str) -> AttributeValue {
    if value.is_empty() {
        return AttributeValue::Null;
    }
    if let Ok(i) = value.parse::<i64>() {
        return AttributeValue::Int(i);
    }
    if let Ok(f) = value.parse::<f64>() {
        return AttributeValue::Float(f);
    }
    match value {
        "true" | "TRUE" | "True" => AttributeValue::Bool(true),
        "false" | "FALSE" | "False" => AttributeValue::Bool(false),
        other => AttributeValue::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_points_with_attributes() {
        let file = write_csv("lon,lat,pm25,station\n-0.12,51.5,14.2,bloomsbury\n0.05,51.48,,greenwich\n");
        let options = CsvOptions {
            x_column: "lon".into(),
            y_column: "lat".into(),
            crs: Crs::wgs84(),
        };

        let fc = read_csv_points(file.path(), &options).unwrap();
        assert_eq!(fc.len(), 2);

        let first = &fc.features()[0];
        assert!(matches!(first.geometry, Geometry::Point(_)));
        assert_eq!(first.number("pm25"), Some(14.2));
        assert_eq!(
            first.get_property("station").and_then(AttributeValue::as_str),
            Some("bloomsbury")
        );

        // Empty cell → Null, not zero
        assert_eq!(
            fc.features()[1].get_property("pm25"),
            Some(&AttributeValue::Null)
        );
    }

    #[test]
    fn test_missing_column() {
        let file = write_csv("a,b\n1,2\n");
        let options = CsvOptions {
            x_column: "lon".into(),
            y_column: "lat".into(),
            crs: Crs::wgs84(),
        };
        assert!(matches!(
            read_csv_points(file.path(), &options),
            Err(Error::MissingField(_))
        ));
    }

    #[test]
    fn test_unparseable_coordinate() {
        let file = write_csv("x,y\nnot-a-number,2.0\n");
        let result = read_csv_points(file.path(), &CsvOptions::default());
        assert!(matches!(result, Err(Error::Format { .. })));
    }

    #[test]
    fn test_sniffing() {
        assert_eq!(sniff("42"), AttributeValue::Int(42));
        assert_eq!(sniff("4.5"), AttributeValue::Float(4.5));
        assert_eq!(sniff("true"), AttributeValue::Bool(true));
        assert_eq!(sniff("E02001"), AttributeValue::String("E02001".into()));
        assert_eq!(sniff(""), AttributeValue::Null);
    }
}
