//! Per-unit geometry consolidation.
//!
//! Placemarks are grouped by the normalized unit identity and every group
//! becomes exactly one [`NamedArea`]: polygon fragments are merged with a
//! boolean union, lines and points are collected, and the representative
//! point is the centroid of the highest-dimension part.

use std::collections::BTreeMap;

use field_radius_geometry_models::{
    FragmentGeometry, NamedArea, Placemark, UNNAMED_UNIT, UnitGeometry,
};
use field_radius_normalize::{NormalizedKey, normalize};
use geo::{
    Area, BooleanOps, BoundingRect, Centroid, Coord, GeodesicArea, MapCoords, MultiPolygon, Point,
};

use crate::GeometryError;
use crate::kml::NAME_ATTRIBUTE;
use crate::projection::UtmProjection;

/// Square metres per square kilometre.
const M2_PER_KM2: f64 = 1_000_000.0;

/// How unit identity and centroids are derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidateOptions {
    /// Attribute names tried, in order, before the placemark `<name>`.
    pub preferred_name_fields: Vec<String>,
    /// Compute centroid and area in the unit's UTM zone instead of raw
    /// longitude/latitude degrees.
    pub reproject: bool,
}

impl Default for ConsolidateOptions {
    fn default() -> Self {
        Self {
            preferred_name_fields: vec!["NOME_FAZ".to_string()],
            reproject: true,
        }
    }
}

/// A unit that could not be turned into a [`NamedArea`].
#[derive(Debug)]
pub struct RejectedUnit {
    /// The normalized unit key.
    pub key: NormalizedKey,
    /// Why it was dropped.
    pub error: GeometryError,
}

#[derive(Debug)]
struct UnitGroup {
    name: String,
    fragments: Vec<FragmentGeometry>,
    attributes: BTreeMap<String, String>,
}

/// Resolves a placemark's unit name: the first non-blank preferred
/// attribute, then `Name`, then [`UNNAMED_UNIT`].
#[must_use]
pub fn unit_name<'a>(placemark: &'a Placemark, preferred_fields: &[String]) -> &'a str {
    preferred_fields
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(NAME_ATTRIBUTE))
        .filter_map(|field| placemark.attributes.get(field))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .unwrap_or(UNNAMED_UNIT)
}

/// Groups placemarks into units and builds one [`NamedArea`] per unit.
///
/// Returns the areas in key order plus the units that had to be dropped.
#[must_use]
pub fn consolidate(
    placemarks: impl IntoIterator<Item = Placemark>,
    options: &ConsolidateOptions,
) -> (Vec<NamedArea>, Vec<RejectedUnit>) {
    let mut groups: BTreeMap<NormalizedKey, UnitGroup> = BTreeMap::new();

    for placemark in placemarks {
        let name = unit_name(&placemark, &options.preferred_name_fields).to_string();
        let key = normalize(&name);
        let group = groups.entry(key).or_insert_with(|| UnitGroup {
            name,
            fragments: Vec::new(),
            attributes: BTreeMap::new(),
        });
        group.attributes.extend(placemark.attributes);
        group.fragments.push(placemark.geometry);
    }

    let mut areas = Vec::with_capacity(groups.len());
    let mut rejected = Vec::new();

    for (key, group) in groups {
        let fragment_count = group.fragments.len();
        let geometry = merge_fragments(group.fragments);

        match measure(&geometry, options.reproject) {
            Ok((representative_point, area_km2)) => {
                if fragment_count > 1 {
                    log::debug!("Merged {fragment_count} fragments into unit {key}");
                }
                areas.push(NamedArea {
                    name: group.name,
                    key,
                    geometry,
                    representative_point,
                    area_km2,
                    fragment_count,
                    attributes: group.attributes,
                });
            }
            Err(error) => {
                log::warn!("Dropping unit {key}: {error}");
                rejected.push(RejectedUnit { key, error });
            }
        }
    }

    (areas, rejected)
}

/// Merges the fragments of one unit into a [`UnitGeometry`].
#[must_use]
pub fn merge_fragments(fragments: Vec<FragmentGeometry>) -> UnitGeometry {
    let mut geometry = UnitGeometry::default();

    for fragment in fragments {
        match fragment {
            FragmentGeometry::Polygon(polygon) => {
                geometry.polygons = geometry.polygons.union(&MultiPolygon::new(vec![polygon]));
            }
            FragmentGeometry::Line(line) => geometry.lines.0.push(line),
            FragmentGeometry::Point(point) => {
                if !geometry.points.0.contains(&point) {
                    geometry.points.0.push(point);
                }
            }
        }
    }

    geometry
}

/// Computes the representative point (lon/lat degrees) and polygon area
/// (km²) of a unit geometry.
///
/// # Errors
///
/// * [`GeometryError::EmptyUnion`] if the geometry has no centroid
/// * [`GeometryError::Projection`] if the UTM transform fails
pub fn measure(geometry: &UnitGeometry, reproject: bool) -> Result<(Point<f64>, f64), GeometryError> {
    if reproject {
        measure_projected(geometry)
    } else {
        let centroid = centroid_of(geometry).ok_or(GeometryError::EmptyUnion)?;
        let area = geometry.polygons.geodesic_area_unsigned() / M2_PER_KM2;
        Ok((centroid, area))
    }
}

fn measure_projected(geometry: &UnitGeometry) -> Result<(Point<f64>, f64), GeometryError> {
    let bounds = geometry
        .to_geometry()
        .bounding_rect()
        .ok_or(GeometryError::EmptyUnion)?;
    let center = bounds.center();
    let projection = UtmProjection::for_lon_lat(center.x, center.y)?;
    let forward = |c: Coord<f64>| projection.forward(c);

    let projected = UnitGeometry {
        polygons: geometry.polygons.try_map_coords(forward)?,
        lines: geometry.lines.try_map_coords(forward)?,
        points: geometry.points.try_map_coords(forward)?,
    };

    let centroid = centroid_of(&projected).ok_or(GeometryError::EmptyUnion)?;
    let area = projected.polygons.unsigned_area() / M2_PER_KM2;

    Ok((Point::from(projection.inverse(centroid.0)?), area))
}

/// Centroid of the highest-dimension non-empty part.
fn centroid_of(geometry: &UnitGeometry) -> Option<Point<f64>> {
    geometry
        .polygons
        .centroid()
        .or_else(|| geometry.lines.centroid())
        .or_else(|| geometry.points.centroid())
}
