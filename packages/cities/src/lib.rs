#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! City points and nearest-city analysis.
//!
//! Loads a `GeoJSON` city document into a [`CitySet`] (point per city,
//! polygon cities reduced to their centroid and kept in an R-tree for
//! containment lookups) and answers "which city is closest to this unit,
//! and who lives there" via [`analysis::analyze`].

pub mod analysis;

use geo::{Area, BoundingRect, Centroid, Contains, MultiPolygon, Point};
use geojson::{GeoJson, JsonObject};
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use field_radius_normalize::{NormalizedKey, normalize};
use field_radius_roster_models::HomePoint;

/// Name given to a city whose properties carry no usable name.
pub const UNKNOWN_CITY: &str = "UNKNOWN CITY";

/// Property names tried, in order, for the city name.
pub const DEFAULT_NAME_FIELDS: &[&str] = &["nome", "NOME", "cidade", "City"];

/// Errors from city loading and analysis.
#[derive(Debug, Error)]
pub enum CityError {
    /// File could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Document is valid `GeoJSON` but not features.
    #[error("City document must be a FeatureCollection or Feature")]
    NotFeatures,

    /// No feature produced a city.
    #[error("City document contains no usable city")]
    NoCities,

    /// The requested unit is not in the area set.
    #[error("Unit not found: {unit}")]
    UnitNotFound {
        /// The unit as requested.
        unit: String,
    },
}

/// One city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    /// Name as found in the document.
    pub name: String,
    /// Normalized name, compared against roster home cities.
    pub key: NormalizedKey,
    /// City point (centroid for polygon cities).
    pub point: HomePoint,
    /// City boundary, when the document had one.
    #[serde(skip)]
    pub boundary: Option<MultiPolygon<f64>>,
}

/// A city boundary in the R-tree.
struct BoundaryEntry {
    city: usize,
    area: f64,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// All cities of one document plus a containment index over the ones
/// with boundaries.
pub struct CitySet {
    cities: Vec<City>,
    boundaries: RTree<BoundaryEntry>,
}

impl std::fmt::Debug for CitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CitySet")
            .field("cities", &self.cities.len())
            .field("boundaries", &self.boundaries.size())
            .finish()
    }
}

/// A city and its distance from a target point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestCity {
    /// The city.
    pub city: City,
    /// Great-circle distance, km.
    pub distance_km: f64,
}

impl CitySet {
    /// Builds a set from cities.
    #[must_use]
    pub fn new(cities: Vec<City>) -> Self {
        let entries = cities
            .iter()
            .enumerate()
            .filter_map(|(i, city)| {
                let polygon = city.boundary.clone()?;
                let envelope = compute_envelope(&polygon)?;
                Some(BoundaryEntry {
                    city: i,
                    area: polygon.unsigned_area(),
                    envelope,
                    polygon,
                })
            })
            .collect();

        Self {
            cities,
            boundaries: RTree::bulk_load(entries),
        }
    }

    /// Parses a `GeoJSON` `FeatureCollection` (or single `Feature`).
    ///
    /// Features without a geometry are skipped with a warning.
    ///
    /// # Errors
    ///
    /// * [`CityError::GeoJson`] if the text is not `GeoJSON`
    /// * [`CityError::NotFeatures`] if it is a bare geometry
    /// * [`CityError::NoCities`] if no feature yielded a city
    pub fn from_geojson(text: &str, name_fields: &[String]) -> Result<Self, CityError> {
        let geojson: GeoJson = text.parse()?;
        let features = match geojson {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(_) => return Err(CityError::NotFeatures),
        };

        let mut cities = Vec::with_capacity(features.len());
        for (index, feature) in features.into_iter().enumerate() {
            let name = city_name(feature.properties.as_ref(), name_fields);
            let Some(geometry) = feature.geometry else {
                log::warn!("Skipping city feature #{index} ({name}): no geometry");
                continue;
            };
            let geometry: geo::Geometry<f64> = match geometry.try_into() {
                Ok(g) => g,
                Err(e) => {
                    log::warn!("Skipping city feature #{index} ({name}): {e}");
                    continue;
                }
            };
            let Some(point) = geometry.centroid() else {
                log::warn!("Skipping city feature #{index} ({name}): empty geometry");
                continue;
            };
            let boundary = match geometry {
                geo::Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
                geo::Geometry::MultiPolygon(mp) => Some(mp),
                _ => None,
            };

            cities.push(City {
                key: normalize(&name),
                name,
                point: point_to_home(point),
                boundary,
            });
        }

        if cities.is_empty() {
            return Err(CityError::NoCities);
        }

        log::info!("Loaded {} cities", cities.len());
        Ok(Self::new(cities))
    }

    /// All cities in document order.
    #[must_use]
    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    /// Number of cities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cities.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    /// The `count` cities closest to `target`, nearest first. Equal
    /// distances are ordered by city key.
    #[must_use]
    pub fn nearest(&self, target: HomePoint, count: usize) -> Vec<NearestCity> {
        let mut ranked: Vec<NearestCity> = self
            .cities
            .iter()
            .map(|city| NearestCity {
                city: city.clone(),
                distance_km: field_radius_distance::distance_km(target, city.point),
            })
            .collect();

        ranked.sort_by(|a, b| {
            a.distance_km
                .total_cmp(&b.distance_km)
                .then_with(|| a.city.key.cmp(&b.city.key))
        });
        ranked.truncate(count);
        ranked
    }

    /// The city whose boundary contains `target`. Overlapping boundaries
    /// resolve to the smallest one.
    #[must_use]
    pub fn containing(&self, target: HomePoint) -> Option<&City> {
        let point = Point::new(target.lon, target.lat);
        let query_env = AABB::from_point([target.lon, target.lat]);

        let mut best: Option<&BoundaryEntry> = None;
        for entry in self.boundaries.locate_in_envelope_intersecting(&query_env) {
            if entry.polygon.contains(&point) {
                match best {
                    None => best = Some(entry),
                    Some(current) if entry.area < current.area => best = Some(entry),
                    _ => {}
                }
            }
        }

        best.and_then(|e| self.cities.get(e.city))
    }
}

/// Resolves a city name from feature properties: the first configured
/// field holding a non-blank value, then the first property in document
/// order, then [`UNKNOWN_CITY`].
#[must_use]
pub fn city_name(properties: Option<&JsonObject>, name_fields: &[String]) -> String {
    let Some(properties) = properties else {
        return UNKNOWN_CITY.to_string();
    };

    name_fields
        .iter()
        .filter_map(|field| properties.get(field))
        .find_map(value_text)
        .or_else(|| properties.values().next().and_then(value_text))
        .unwrap_or_else(|| UNKNOWN_CITY.to_string())
}

fn value_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn point_to_home(point: Point<f64>) -> HomePoint {
    HomePoint {
        lon: point.x(),
        lat: point.y(),
    }
}

fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
