//! Native ESRI shapefile reading (without GDAL dependency)
//!
//! Parses the `.shp` main file (Point, MultiPoint, PolyLine, Polygon
//! record types) and the sibling `.dbf` attribute table. Z/M variants and
//! `.prj` parsing are not supported; the caller declares the CRS.
//!
//! Reference:
//! ESRI Shapefile Technical Description (1998), ESRI White Paper.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use geo_types::{
    Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::feature::{AttributeValue, Feature, FeatureCollection};

const FILE_CODE: i32 = 9994;
const VERSION: i32 = 1000;

const SHAPE_NULL: i32 = 0;
const SHAPE_POINT: i32 = 1;
const SHAPE_POLYLINE: i32 = 3;
const SHAPE_POLYGON: i32 = 5;
const SHAPE_MULTIPOINT: i32 = 8;

/// Read a shapefile into a [`FeatureCollection`].
///
/// `path` points at the `.shp` file; a sibling `.dbf` is read for
/// attributes when present. Records are paired by index, so null-shape
/// records drop their attribute row as well.
pub fn read_shapefile(path: impl AsRef<Path>, crs: Crs) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let source_id = path.display().to_string();

    let shp_bytes = std::fs::read(path)?;
    let geometries = parse_shp(&shp_bytes, &source_id)?;

    let dbf_path = path.with_extension("dbf");
    let records = if dbf_path.exists() {
        let dbf_bytes = std::fs::read(&dbf_path)?;
        parse_dbf(&dbf_bytes, &dbf_path.display().to_string())?
    } else {
        Vec::new()
    };

    let mut out = FeatureCollection::new(crs);
    for (i, geometry) in geometries.into_iter().enumerate() {
        let Some(geometry) = geometry else {
            continue; // null shape
        };
        let mut feature = Feature::new(geometry)
            .map_err(|e| Error::format(&source_id, format!("record {}: {e}", i + 1)))?;
        if let Some(row) = records.get(i) {
            for (name, value) in row {
                feature.set_property(name.clone(), value.clone());
            }
        }
        out.push(feature);
    }

    Ok(out)
}

// ── .shp main file ───────────────────────────────────────────────────────

fn parse_shp(bytes: &[u8], source_id: &str) -> Result<Vec<Option<Geometry<f64>>>> {
    if bytes.len() < 100 {
        return Err(Error::format(source_id, "file shorter than header"));
    }

    let mut cursor = Cursor::new(bytes);

    let file_code = cursor.read_i32::<BigEndian>()?;
    if file_code != FILE_CODE {
        return Err(Error::format(
            source_id,
            format!("bad file code {file_code} (expected {FILE_CODE})"),
        ));
    }
    cursor.seek(SeekFrom::Start(24))?;
    let file_length_words = cursor.read_i32::<BigEndian>()?;
    let file_length = (file_length_words as u64) * 2;

    let version = cursor.read_i32::<LittleEndian>()?;
    if version != VERSION {
        return Err(Error::format(
            source_id,
            format!("unsupported version {version}"),
        ));
    }
    let _shape_type = cursor.read_i32::<LittleEndian>()?;
    // Bounding box + Z/M ranges: 8 doubles we don't need
    cursor.seek(SeekFrom::Start(100))?;

    let limit = file_length.min(bytes.len() as u64);
    let mut geometries = Vec::new();

    while cursor.position() + 8 <= limit {
        let _record_number = cursor.read_i32::<BigEndian>()?;
        let content_words = cursor.read_i32::<BigEndian>()?;
        if content_words < 2 {
            return Err(Error::format(source_id, "record content too short"));
        }
        let content_end = cursor.position() + (content_words as u64) * 2;
        if content_end > limit {
            return Err(Error::format(source_id, "record overruns file length"));
        }

        let shape_type = cursor.read_i32::<LittleEndian>()?;
        let geometry = match shape_type {
            SHAPE_NULL => None,
            SHAPE_POINT => {
                let x = cursor.read_f64::<LittleEndian>()?;
                let y = cursor.read_f64::<LittleEndian>()?;
                Some(Geometry::Point(Point::new(x, y)))
            }
            SHAPE_MULTIPOINT => {
                skip_bbox(&mut cursor)?;
                let n = read_count(&mut cursor, source_id, "points")?;
                let mut points = Vec::with_capacity(n);
                for _ in 0..n {
                    let x = cursor.read_f64::<LittleEndian>()?;
                    let y = cursor.read_f64::<LittleEndian>()?;
                    points.push(Point::new(x, y));
                }
                Some(Geometry::MultiPoint(MultiPoint::new(points)))
            }
            SHAPE_POLYLINE => {
                let parts = read_parts(&mut cursor, source_id)?;
                Some(if parts.len() == 1 {
                    Geometry::LineString(parts.into_iter().next().unwrap())
                } else {
                    Geometry::MultiLineString(MultiLineString::new(parts))
                })
            }
            SHAPE_POLYGON => {
                let rings = read_parts(&mut cursor, source_id)?;
                Some(assemble_polygon(rings))
            }
            other => {
                return Err(Error::format(
                    source_id,
                    format!("unsupported shape type {other} (Z/M variants are not handled)"),
                ))
            }
        };

        geometries.push(geometry);
        cursor.seek(SeekFrom::Start(content_end))?;
    }

    Ok(geometries)
}

fn skip_bbox<R: Read>(reader: &mut R) -> Result<()> {
    for _ in 0..4 {
        reader.read_f64::<LittleEndian>()?;
    }
    Ok(())
}

fn read_count<R: Read>(reader: &mut R, source_id: &str, what: &str) -> Result<usize> {
    let n = reader.read_i32::<LittleEndian>()?;
    if n < 0 {
        return Err(Error::format(
            source_id,
            format!("negative {what} count {n}"),
        ));
    }
    Ok(n as usize)
}

/// Read a PolyLine/Polygon body: bbox, part offsets, point array.
fn read_parts(cursor: &mut Cursor<&[u8]>, source_id: &str) -> Result<Vec<LineString<f64>>> {
    skip_bbox(cursor)?;
    let num_parts = read_count(cursor, source_id, "parts")?;
    let num_points = read_count(cursor, source_id, "points")?;

    let mut offsets = Vec::with_capacity(num_parts + 1);
    for _ in 0..num_parts {
        offsets.push(read_count(cursor, source_id, "part offset")?);
    }
    offsets.push(num_points);

    let mut points = Vec::with_capacity(num_points);
    for _ in 0..num_points {
        let x = cursor.read_f64::<LittleEndian>()?;
        let y = cursor.read_f64::<LittleEndian>()?;
        points.push((x, y));
    }

    let mut parts = Vec::with_capacity(num_parts);
    for window in offsets.windows(2) {
        let (start, end) = (window[0], window[1]);
        if start > end || end > num_points {
            return Err(Error::format(source_id, "part offsets out of order"));
        }
        parts.push(LineString::from(points[start..end].to_vec()));
    }

    Ok(parts)
}

/// Shoelace signed area of a closed ring (positive = counter-clockwise).
fn signed_area(ring: &LineString<f64>) -> f64 {
    let coords = &ring.0;
    let mut sum = 0.0;
    for pair in coords.windows(2) {
        sum += pair[0].x * pair[1].y - pair[1].x * pair[0].y;
    }
    sum / 2.0
}

/// Even-odd ray-cast point-in-ring test.
fn ring_contains(ring: &LineString<f64>, x: f64, y: f64) -> bool {
    let coords = &ring.0;
    let mut inside = false;
    for pair in coords.windows(2) {
        let (x1, y1) = (pair[0].x, pair[0].y);
        let (x2, y2) = (pair[1].x, pair[1].y);
        if (y1 > y) != (y2 > y) {
            let x_cross = x1 + (y - y1) / (y2 - y1) * (x2 - x1);
            if x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

/// Assemble shapefile rings into a polygon geometry.
///
/// Shapefile convention: outer rings wind clockwise (negative shoelace
/// area), holes counter-clockwise. Each hole is attached to the first
/// outer ring containing its first vertex.
fn assemble_polygon(rings: Vec<LineString<f64>>) -> Geometry<f64> {
    let mut outers: Vec<LineString<f64>> = Vec::new();
    let mut holes: Vec<LineString<f64>> = Vec::new();

    for ring in rings {
        if signed_area(&ring) <= 0.0 {
            outers.push(ring);
        } else {
            holes.push(ring);
        }
    }

    // Degenerate file with only counter-clockwise rings: treat them all
    // as outers rather than dropping the geometry.
    if outers.is_empty() {
        outers = std::mem::take(&mut holes);
    }

    let mut polygons: Vec<Polygon<f64>> = outers
        .into_iter()
        .map(|ring| Polygon::new(ring, vec![]))
        .collect();

    'hole: for hole in holes {
        if let Some(first) = hole.0.first() {
            for polygon in &mut polygons {
                if ring_contains(polygon.exterior(), first.x, first.y) {
                    polygon.interiors_push(hole);
                    continue 'hole;
                }
            }
        }
        // Orphan hole: attach to the first polygon as a best effort
        if let Some(polygon) = polygons.first_mut() {
            polygon.interiors_push(hole);
        }
    }

    if polygons.len() == 1 {
        Geometry::Polygon(polygons.into_iter().next().unwrap())
    } else {
        Geometry::MultiPolygon(MultiPolygon::new(polygons))
    }
}

// ── .dbf attribute table ─────────────────────────────────────────────────

struct DbfField {
    name: String,
    kind: u8,
    length: usize,
}

type DbfRecord = Vec<(String, AttributeValue)>;

fn parse_dbf(bytes: &[u8], source_id: &str) -> Result<Vec<DbfRecord>> {
    if bytes.len() < 32 {
        return Err(Error::format(source_id, "dbf shorter than header"));
    }

    let mut cursor = Cursor::new(bytes);
    let _version = cursor.read_u8()?;
    cursor.seek(SeekFrom::Start(4))?;
    let record_count = cursor.read_u32::<LittleEndian>()? as usize;
    let header_len = cursor.read_u16::<LittleEndian>()? as usize;
    let record_len = cursor.read_u16::<LittleEndian>()? as usize;

    // Field descriptors: 32 bytes each, terminated by 0x0D
    let mut fields = Vec::new();
    let mut offset = 32;
    while offset + 32 <= header_len.min(bytes.len()) && bytes[offset] != 0x0D {
        let descriptor = &bytes[offset..offset + 32];
        let name_end = descriptor[..11]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(11);
        let name = latin1(&descriptor[..name_end]).trim().to_string();
        fields.push(DbfField {
            name,
            kind: descriptor[11],
            length: descriptor[16] as usize,
        });
        offset += 32;
    }

    if fields.is_empty() {
        return Err(Error::format(source_id, "dbf declares no fields"));
    }
    let fields_len: usize = fields.iter().map(|f| f.length).sum();
    if fields_len + 1 > record_len {
        return Err(Error::format(source_id, "dbf record length mismatch"));
    }

    let mut records = Vec::with_capacity(record_count);
    let mut pos = header_len;

    for _ in 0..record_count {
        if pos + record_len > bytes.len() {
            break; // truncated table: keep what parsed cleanly
        }
        let raw = &bytes[pos..pos + record_len];
        pos += record_len;

        let deleted = raw[0] == 0x2A;
        let mut row = Vec::with_capacity(fields.len());
        let mut field_pos = 1;
        for field in &fields {
            let value = if deleted {
                AttributeValue::Null
            } else {
                parse_field(&raw[field_pos..field_pos + field.length], field.kind)
            };
            row.push((field.name.clone(), value));
            field_pos += field.length;
        }
        records.push(row);
    }

    Ok(records)
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn parse_field(raw: &[u8], kind: u8) -> AttributeValue {
    let text = latin1(raw);
    let trimmed = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');

    if trimmed.is_empty() {
        return AttributeValue::Null;
    }

    match kind {
        b'N' | b'F' => {
            if let Ok(i) = trimmed.parse::<i64>() {
                AttributeValue::Int(i)
            } else if let Ok(f) = trimmed.parse::<f64>() {
                AttributeValue::Float(f)
            } else {
                AttributeValue::Null
            }
        }
        b'L' => match trimmed.as_bytes()[0] {
            b'T' | b't' | b'Y' | b'y' => AttributeValue::Bool(true),
            b'F' | b'f' | b'N' | b'n' => AttributeValue::Bool(false),
            _ => AttributeValue::Null,
        },
        // C (character), D (date as YYYYMMDD) and anything exotic: text
        _ => AttributeValue::String(trimmed.to_string()),
    }
}
