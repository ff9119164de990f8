//! Spatial predicates, filtering and attribute joins.
//!
//! Every operation takes two collections in the same CRS and fails fast
//! with `CrsMismatch` otherwise; reprojection is always an explicit
//! prior stage. Geometry predicates delegate to the `geo` crate.

mod nearest;

pub use nearest::{nearest, NeighborHit};

use geo::{Contains, Intersects};
use geo_types::Geometry;
use std::str::FromStr;

use terralink_core::{Error, Feature, FeatureCollection, Result};

/// Binary spatial relationship between two geometries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialPredicate {
    /// The left geometry lies entirely inside the right one.
    Within,
    /// The left geometry entirely contains the right one.
    Contains,
    /// The geometries share at least one point.
    Intersects,
    /// The geometries share no point.
    Disjoint,
}

impl SpatialPredicate {
    fn holds(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
        match self {
            SpatialPredicate::Within => b.contains(a),
            SpatialPredicate::Contains => a.contains(b),
            SpatialPredicate::Intersects => a.intersects(b),
            SpatialPredicate::Disjoint => !a.intersects(b),
        }
    }
}

impl FromStr for SpatialPredicate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "within" => Ok(SpatialPredicate::Within),
            "contains" => Ok(SpatialPredicate::Contains),
            "intersects" => Ok(SpatialPredicate::Intersects),
            "disjoint" => Ok(SpatialPredicate::Disjoint),
            other => Err(Error::InvalidParameter {
                name: "predicate",
                value: other.to_string(),
                reason: "expected within|contains|intersects|disjoint".into(),
            }),
        }
    }
}

/// How many matched right-hand rows a join emits per left-hand feature.
///
/// Polygon/point overlaps are many-to-many, so the multiplicity is the
/// caller's explicit choice rather than an implicit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinCardinality {
    /// At most one match per left feature: the first in right-hand input
    /// order.
    FirstMatch,
    /// One output row per (left, match) pair; matches are exploded.
    AllMatches,
}

impl FromStr for JoinCardinality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "first" | "first-match" => Ok(JoinCardinality::FirstMatch),
            "all" | "all-matches" => Ok(JoinCardinality::AllMatches),
            other => Err(Error::InvalidParameter {
                name: "cardinality",
                value: other.to_string(),
                reason: "expected first|all".into(),
            }),
        }
    }
}

/// Select the features of `left` satisfying `predicate` against `right`.
///
/// For `Within`, `Contains` and `Intersects` the predicate must hold
/// against at least one right-hand geometry; for `Disjoint` it must hold
/// against all of them.
pub fn filter(
    left: &FeatureCollection,
    right: &FeatureCollection,
    predicate: SpatialPredicate,
) -> Result<FeatureCollection> {
    left.ensure_same_crs(right)?;

    let selected = left
        .iter()
        .filter(|feature| {
            let mut matches = right
                .iter()
                .map(|other| predicate.holds(&feature.geometry, &other.geometry));
            match predicate {
                SpatialPredicate::Disjoint => matches.all(|m| m),
                _ => matches.any(|m| m),
            }
        })
        .cloned()
        .collect();

    Ok(FeatureCollection::from_features(
        left.crs().clone(),
        selected,
    ))
}

/// Join right-hand attributes onto left-hand features by spatial match.
///
/// Matched right-hand attributes are merged under their own names; on a
/// name collision the left value wins. Unmatched left features are kept
/// unchanged: zero matches is a valid result, not an error.
pub fn join(
    left: &FeatureCollection,
    right: &FeatureCollection,
    predicate: SpatialPredicate,
    cardinality: JoinCardinality,
) -> Result<FeatureCollection> {
    left.ensure_same_crs(right)?;

    let mut out = Vec::with_capacity(left.len());

    for feature in left.iter() {
        let matches: Vec<&Feature> = right
            .iter()
            .filter(|other| predicate.holds(&feature.geometry, &other.geometry))
            .collect();

        if matches.is_empty() {
            out.push(feature.clone());
            continue;
        }

        match cardinality {
            JoinCardinality::FirstMatch => {
                out.push(merge(feature, matches[0]));
            }
            JoinCardinality::AllMatches => {
                for matched in matches {
                    out.push(merge(feature, matched));
                }
            }
        }
    }

    Ok(FeatureCollection::from_features(left.crs().clone(), out))
}

/// [`join`] that requires at least one left feature to match.
///
/// Returns `EmptyResult` when nothing matched, with the predicate and
/// input sizes in the message for diagnosis.
pub fn join_required(
    left: &FeatureCollection,
    right: &FeatureCollection,
    predicate: SpatialPredicate,
    cardinality: JoinCardinality,
) -> Result<FeatureCollection> {
    left.ensure_same_crs(right)?;

    let any_match = left.iter().any(|feature| {
        right
            .iter()
            .any(|other| predicate.holds(&feature.geometry, &other.geometry))
    });
    if !any_match {
        return Err(Error::EmptyResult(format!(
            "join with predicate {predicate:?} matched none of {} features against {}",
            left.len(),
            right.len()
        )));
    }

    join(left, right, predicate, cardinality)
}

fn merge(left: &Feature, right: &Feature) -> Feature {
    let mut out = left.clone();
    for (key, value) in &right.properties {
        out.properties
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{LineString, Point, Polygon};
    use terralink_core::{AttributeValue, Crs};

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (x0, y0),
                (x0 + size, y0),
                (x0 + size, y0 + size),
                (x0, y0 + size),
                (x0, y0),
            ]),
            vec![],
        )
    }

    fn point_collection(coords: &[(f64, f64)]) -> FeatureCollection {
        let mut fc = FeatureCollection::new(Crs::utm(30, true));
        for (i, &(x, y)) in coords.iter().enumerate() {
            fc.push(
                Feature::new(Geometry::Point(Point::new(x, y)))
                    .unwrap()
                    .with_id(format!("p{i}")),
            );
        }
        fc
    }

    fn zone_collection() -> FeatureCollection {
        let mut fc = FeatureCollection::new(Crs::utm(30, true));
        let mut west = Feature::new(Geometry::Polygon(square(0.0, 0.0, 10.0)))
            .unwrap()
            .with_id("west");
        west.set_property("zone", AttributeValue::from("west"));
        let mut east = Feature::new(Geometry::Polygon(square(10.0, 0.0, 10.0)))
            .unwrap()
            .with_id("east");
        east.set_property("zone", AttributeValue::from("east"));
        fc.push(west);
        fc.push(east);
        fc
    }

    #[test]
    fn test_filter_within() {
        let points = point_collection(&[(5.0, 5.0), (15.0, 5.0), (25.0, 5.0)]);
        let zones = zone_collection();

        let inside = filter(&points, &zones, SpatialPredicate::Within).unwrap();
        assert_eq!(inside.len(), 2);
        assert_eq!(inside.features()[0].id.as_deref(), Some("p0"));
        assert_eq!(inside.features()[1].id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_filter_disjoint_requires_all() {
        let points = point_collection(&[(5.0, 5.0), (25.0, 5.0)]);
        let zones = zone_collection();

        let outside = filter(&points, &zones, SpatialPredicate::Disjoint).unwrap();
        assert_eq!(outside.len(), 1);
        assert_eq!(outside.features()[0].id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_filter_crs_mismatch() {
        let points = point_collection(&[(5.0, 5.0)]);
        let other = FeatureCollection::new(Crs::wgs84());
        assert!(matches!(
            filter(&points, &other, SpatialPredicate::Within),
            Err(Error::CrsMismatch(_, _))
        ));
    }

    #[test]
    fn test_join_first_match_attaches_attributes() {
        let points = point_collection(&[(5.0, 5.0), (15.0, 5.0), (25.0, 5.0)]);
        let zones = zone_collection();

        let joined = join(
            &points,
            &zones,
            SpatialPredicate::Within,
            JoinCardinality::FirstMatch,
        )
        .unwrap();

        // One row per input point, matched or not
        assert_eq!(joined.len(), 3);
        assert_eq!(
            joined.features()[0].get_property("zone"),
            Some(&AttributeValue::from("west"))
        );
        assert_eq!(
            joined.features()[1].get_property("zone"),
            Some(&AttributeValue::from("east"))
        );
        // No-match row keeps its attributes untouched
        assert_eq!(joined.features()[2].get_property("zone"), None);
    }

    #[test]
    fn test_join_first_match_no_duplicates() {
        // Point on the shared boundary can match both zones; FirstMatch
        // must emit exactly one row per left feature.
        let points = point_collection(&[(10.0, 5.0)]);
        let zones = zone_collection();

        let joined = join(
            &points,
            &zones,
            SpatialPredicate::Intersects,
            JoinCardinality::FirstMatch,
        )
        .unwrap();
        assert_eq!(joined.len(), 1);
    }

    #[test]
    fn test_join_all_matches_explodes() {
        let points = point_collection(&[(10.0, 5.0)]);
        let zones = zone_collection();

        let joined = join(
            &points,
            &zones,
            SpatialPredicate::Intersects,
            JoinCardinality::AllMatches,
        )
        .unwrap();
        assert_eq!(joined.len(), 2);
        assert_eq!(
            joined.features()[0].get_property("zone"),
            Some(&AttributeValue::from("west"))
        );
        assert_eq!(
            joined.features()[1].get_property("zone"),
            Some(&AttributeValue::from("east"))
        );
    }

    #[test]
    fn test_join_left_wins_name_collisions() {
        let mut points = FeatureCollection::new(Crs::utm(30, true));
        let mut p = Feature::new(Geometry::Point(Point::new(5.0, 5.0))).unwrap();
        p.set_property("zone", AttributeValue::from("mine"));
        points.push(p);

        let joined = join(
            &points,
            &zone_collection(),
            SpatialPredicate::Within,
            JoinCardinality::FirstMatch,
        )
        .unwrap();
        assert_eq!(
            joined.features()[0].get_property("zone"),
            Some(&AttributeValue::from("mine"))
        );
    }

    #[test]
    fn test_join_required_empty() {
        let points = point_collection(&[(100.0, 100.0)]);
        let zones = zone_collection();

        let result = join_required(
            &points,
            &zones,
            SpatialPredicate::Within,
            JoinCardinality::FirstMatch,
        );
        assert!(matches!(result, Err(Error::EmptyResult(_))));
    }

    #[test]
    fn test_predicate_parsing() {
        assert_eq!(
            "within".parse::<SpatialPredicate>().unwrap(),
            SpatialPredicate::Within
        );
        assert_eq!(
            "INTERSECTS".parse::<SpatialPredicate>().unwrap(),
            SpatialPredicate::Intersects
        );
        assert!("overlaps".parse::<SpatialPredicate>().is_err());

        assert_eq!(
            "first".parse::<JoinCardinality>().unwrap(),
            JoinCardinality::FirstMatch
        );
        assert_eq!(
            "all".parse::<JoinCardinality>().unwrap(),
            JoinCardinality::AllMatches
        );
    }
}
