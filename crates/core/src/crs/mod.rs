//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate units of a CRS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrsUnits {
    /// Angular degrees (geographic CRS)
    Degrees,
    /// Linear metres (projected CRS)
    Meters,
}

/// Coordinate Reference System representation.
///
/// A CRS is a tag carried alongside geometry; it is never applied
/// implicitly. Operations over two collections require equivalent CRS and
/// fail fast otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crs {
    /// WKT representation (primary)
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

impl Crs {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    /// UTM CRS for a zone and hemisphere (EPSG 326xx north, 327xx south).
    pub fn utm(zone: u32, north: bool) -> Self {
        let base = if north { 32600 } else { 32700 };
        Self::from_epsg(base + zone)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Whether this is the WGS84 geographic CRS.
    pub fn is_geographic(&self) -> bool {
        self.epsg == Some(4326)
    }

    /// Parse the EPSG code into UTM zone info: `Some((zone, is_north))`.
    ///
    /// - EPSG 326xx → zone xx, North hemisphere
    /// - EPSG 327xx → zone xx, South hemisphere
    pub fn utm_zone(&self) -> Option<(u32, bool)> {
        match self.epsg {
            Some(code) if (32601..=32660).contains(&code) => Some((code - 32600, true)),
            Some(code) if (32701..=32760).contains(&code) => Some((code - 32700, false)),
            _ => None,
        }
    }

    /// Coordinate units, when the CRS is recognized.
    ///
    /// WGS84 measures in degrees; Web Mercator and UTM in metres. Returns
    /// `None` for CRS identified only by WKT or PROJ strings.
    pub fn units(&self) -> Option<CrsUnits> {
        if self.is_geographic() {
            return Some(CrsUnits::Degrees);
        }
        if self.epsg == Some(3857) || self.utm_zone().is_some() {
            return Some(CrsUnits::Meters);
        }
        None
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &Crs) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // WKT/PROJ comparison is textual and imperfect; codes are preferred
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }

        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", &wkt[..wkt.len().min(50)]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = Crs::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
    }

    #[test]
    fn test_crs_equivalence() {
        let a = Crs::from_epsg(4326);
        let b = Crs::wgs84();
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&Crs::web_mercator()));
    }

    #[test]
    fn test_utm_zone_parsing() {
        assert_eq!(Crs::utm(30, true).utm_zone(), Some((30, true)));
        assert_eq!(Crs::utm(21, false).utm_zone(), Some((21, false)));
        assert_eq!(Crs::wgs84().utm_zone(), None);
        assert_eq!(Crs::from_epsg(32600).utm_zone(), None); // zone 0 invalid
        assert_eq!(Crs::from_epsg(32661).utm_zone(), None); // zone 61 invalid
    }

    #[test]
    fn test_units() {
        assert_eq!(Crs::wgs84().units(), Some(CrsUnits::Degrees));
        assert_eq!(Crs::web_mercator().units(), Some(CrsUnits::Meters));
        assert_eq!(Crs::utm(30, true).units(), Some(CrsUnits::Meters));
        assert_eq!(Crs::from_wkt("PROJCS[...]").units(), None);
    }
}
