#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Named geographic unit types.
//!
//! A geometry-source document describes each farm ("fazenda") as one or
//! more placemarks. The extractor turns those into exactly one
//! [`NamedArea`] per normalized unit name, collected in an [`AreaSet`].

use std::collections::BTreeMap;

use field_radius_normalize::NormalizedKey;
use geo::{
    Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point,
    Polygon,
};
use serde::{Deserialize, Serialize};

/// Name used when a placemark carries neither the preferred name
/// attribute nor a `<name>` element.
pub const UNNAMED_UNIT: &str = "UNNAMED UNIT";

/// The kind of a single placemark geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryKind {
    /// Exterior boundary ring.
    Polygon,
    /// Ordered vertex list.
    Line,
    /// Single coordinate.
    Point,
}

/// The geometry of one placemark, before consolidation.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentGeometry {
    /// A polygon built from the outer boundary ring.
    Polygon(Polygon<f64>),
    /// A line string.
    Line(LineString<f64>),
    /// A point.
    Point(Point<f64>),
}

impl FragmentGeometry {
    /// Returns the kind of this fragment.
    #[must_use]
    pub const fn kind(&self) -> GeometryKind {
        match self {
            Self::Polygon(_) => GeometryKind::Polygon,
            Self::Line(_) => GeometryKind::Line,
            Self::Point(_) => GeometryKind::Point,
        }
    }
}

/// One parsed placemark: its free-text attributes and exactly one geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Placemark {
    /// Attribute bag. The `<name>` element is stored under `Name`.
    pub attributes: BTreeMap<String, String>,
    /// The placemark geometry.
    pub geometry: FragmentGeometry,
}

/// The consolidated geometry of one logical unit.
///
/// Polygons are kept as their boolean union, lines and points as plain
/// collections. A unit made of several kinds keeps all of them; the
/// highest-dimension part decides the representative point.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitGeometry {
    /// Union of all polygon fragments.
    pub polygons: MultiPolygon<f64>,
    /// All line fragments.
    pub lines: MultiLineString<f64>,
    /// All point fragments, exact duplicates removed.
    pub points: MultiPoint<f64>,
}

impl Default for UnitGeometry {
    fn default() -> Self {
        Self {
            polygons: MultiPolygon::new(Vec::new()),
            lines: MultiLineString::new(Vec::new()),
            points: MultiPoint::new(Vec::new()),
        }
    }
}

impl UnitGeometry {
    /// Whether no fragment contributed any geometry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.polygons.0.is_empty() && self.lines.0.is_empty() && self.points.0.is_empty()
    }

    /// The highest-dimension kind present, if any.
    #[must_use]
    pub fn dominant_kind(&self) -> Option<GeometryKind> {
        if !self.polygons.0.is_empty() {
            Some(GeometryKind::Polygon)
        } else if !self.lines.0.is_empty() {
            Some(GeometryKind::Line)
        } else if !self.points.0.is_empty() {
            Some(GeometryKind::Point)
        } else {
            None
        }
    }

    /// Converts to a single [`Geometry`]: the lone part when only one
    /// kind is present, otherwise a collection of all parts.
    #[must_use]
    pub fn to_geometry(&self) -> Geometry<f64> {
        let mut parts: Vec<Geometry<f64>> = Vec::with_capacity(3);
        if !self.polygons.0.is_empty() {
            parts.push(Geometry::MultiPolygon(self.polygons.clone()));
        }
        if !self.lines.0.is_empty() {
            parts.push(Geometry::MultiLineString(self.lines.clone()));
        }
        if !self.points.0.is_empty() {
            parts.push(Geometry::MultiPoint(self.points.clone()));
        }

        if parts.len() == 1 {
            parts.remove(0)
        } else {
            Geometry::GeometryCollection(GeometryCollection(parts))
        }
    }
}

/// One logical geographic unit, immutable once extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArea {
    /// Unit name as it appeared in the source (first fragment wins).
    pub name: String,
    /// Join key derived from `name`.
    pub key: NormalizedKey,
    /// Consolidated geometry of every fragment sharing `key`.
    pub geometry: UnitGeometry,
    /// Centroid of `geometry`, always longitude/latitude in degrees.
    pub representative_point: Point<f64>,
    /// Polygon area in square kilometres (0 for lines and points).
    pub area_km2: f64,
    /// How many placemarks were merged into this unit.
    pub fragment_count: usize,
    /// Attribute bags of all fragments merged in document order.
    pub attributes: BTreeMap<String, String>,
}

/// All named areas of one geometry document, keyed by normalized name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaSet {
    areas: BTreeMap<NormalizedKey, NamedArea>,
}

impl AreaSet {
    /// Builds a set from areas. A later area with a key already present
    /// replaces the earlier one; the extractor never produces duplicates.
    #[must_use]
    pub fn new(areas: impl IntoIterator<Item = NamedArea>) -> Self {
        Self {
            areas: areas.into_iter().map(|a| (a.key.clone(), a)).collect(),
        }
    }

    /// Looks up an area by exact key.
    #[must_use]
    pub fn get(&self, key: &NormalizedKey) -> Option<&NamedArea> {
        self.areas.get(key)
    }

    /// All keys, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &NormalizedKey> {
        self.areas.keys()
    }

    /// All areas, in key order.
    pub fn iter(&self) -> impl Iterator<Item = &NamedArea> {
        self.areas.values()
    }

    /// Number of areas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.areas.len()
    }

    /// Whether the set holds no area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon};

    #[test]
    fn single_kind_converts_to_that_kind() {
        let geometry = UnitGeometry {
            points: MultiPoint::new(vec![Point::new(1.0, 2.0)]),
            ..UnitGeometry::default()
        };
        assert!(matches!(geometry.to_geometry(), Geometry::MultiPoint(_)));
        assert_eq!(geometry.dominant_kind(), Some(GeometryKind::Point));
    }

    #[test]
    fn mixed_kinds_convert_to_collection() {
        let geometry = UnitGeometry {
            polygons: MultiPolygon::new(vec![polygon![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 0.0),
                (x: 1.0, y: 1.0),
            ]]),
            lines: MultiLineString::new(vec![LineString::new(vec![
                coord! { x: 0.0, y: 0.0 },
                coord! { x: 2.0, y: 2.0 },
            ])]),
            ..UnitGeometry::default()
        };
        match geometry.to_geometry() {
            Geometry::GeometryCollection(gc) => assert_eq!(gc.0.len(), 2),
            other => panic!("expected collection, got {other:?}"),
        }
        assert_eq!(geometry.dominant_kind(), Some(GeometryKind::Polygon));
    }

    #[test]
    fn empty_geometry_has_no_kind() {
        assert!(UnitGeometry::default().is_empty());
        assert_eq!(UnitGeometry::default().dominant_kind(), None);
    }
}
