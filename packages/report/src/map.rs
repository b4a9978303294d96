//! GeoJSON map layers.
//!
//! Every feature carries a `layer` property naming what it draws:
//!
//! * `base` - specialist home point
//! * `radius` - circle around the home, radius in `radiusM` (metres)
//! * `unit` - representative point of a served unit
//! * `unitGeometry` - consolidated unit geometry
//! * `route` - road route from an OSRM-compatible service
//! * `city` - a nearest city of a nearest-city report
//!
//! Renderers draw `radius` features as circles; the geometry itself is
//! the centre point.

use field_radius_cities::analysis::NearestCityReport;
use field_radius_distance_models::SpecialistSummary;
use field_radius_geometry_models::GeometryKind;
use field_radius_routing::Route;
use geo::Point;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{round1, title_case};

/// Pastel colours cycled across specialists.
pub const PALETTE: &[&str] = &[
    "#8dd3c7", "#ffffb3", "#bebada", "#fb8072", "#80b1d3", "#fdb462", "#b3de69", "#fccde5",
    "#d9d9d9", "#bc80bd", "#ccebc5", "#ffed6f",
];

/// Map layer limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOptions {
    /// Units drawn per specialist; the rest are skipped.
    pub max_units_per_specialist: usize,
    /// Draw unit polygons and lines, not just their points.
    pub include_geometries: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            max_units_per_specialist: 50,
            include_geometries: true,
        }
    }
}

/// Colour of the specialist at `index` in the selection.
#[must_use]
pub fn color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// Builds the map layers of a selection, with optional routes and an
/// optional nearest-city report.
#[must_use]
pub fn map_layers(
    summaries: &[&SpecialistSummary],
    routes: &[Route],
    nearest: Option<&NearestCityReport>,
    options: &MapOptions,
) -> FeatureCollection {
    let mut features = Vec::new();

    for (i, summary) in summaries.iter().enumerate() {
        let color = color(i);
        let specialist = title_case(summary.specialist.as_str());
        let home = Point::new(summary.home_point.lon, summary.home_point.lat);

        features.push(feature(
            Value::from(&home),
            json!({
                "layer": "base",
                "specialist": specialist,
                "manager": title_case(summary.manager.as_str()),
                "homeCity": title_case(summary.home_city.as_str()),
                "color": color,
            }),
        ));

        if summary.unit_count > 0 {
            features.push(feature(
                Value::from(&home),
                json!({
                    "layer": "radius",
                    "specialist": specialist,
                    "radiusKm": round1(summary.max_distance_km),
                    "radiusM": summary.max_distance_km * 1000.0,
                    "band": summary.band.to_string(),
                    "color": color,
                }),
            ));
        }

        if summary.assignments.len() > options.max_units_per_specialist {
            log::info!(
                "Drawing {} of {} units for {}",
                options.max_units_per_specialist,
                summary.assignments.len(),
                summary.specialist
            );
        }

        for assignment in summary.assignments.iter().take(options.max_units_per_specialist) {
            let point = Point::new(assignment.unit_point.lon, assignment.unit_point.lat);
            features.push(feature(
                Value::from(&point),
                json!({
                    "layer": "unit",
                    "specialist": specialist,
                    "unit": assignment.unit_name,
                    "distanceKm": round1(assignment.distance_km),
                    "color": color,
                }),
            ));

            if options.include_geometries
                && assignment
                    .unit_geometry
                    .dominant_kind()
                    .is_some_and(|k| k != GeometryKind::Point)
            {
                features.push(feature(
                    Value::from(&assignment.unit_geometry.to_geometry()),
                    json!({
                        "layer": "unitGeometry",
                        "specialist": specialist,
                        "unit": assignment.unit_name,
                        "color": color,
                    }),
                ));
            }
        }
    }

    for route in routes {
        features.push(feature(
            Value::from(&route.line),
            json!({
                "layer": "route",
                "specialist": title_case(route.specialist.as_str()),
                "unit": route.unit_key.as_str(),
                "roadDistanceKm": round1(route.distance_km),
                "durationMin": round1(route.duration_min),
            }),
        ));
    }

    if let Some(report) = nearest {
        for residents in &report.cities {
            let city = &residents.nearest.city;
            features.push(feature(
                Value::from(&Point::new(city.point.lon, city.point.lat)),
                json!({
                    "layer": "city",
                    "city": city.name,
                    "distanceKm": round1(residents.nearest.distance_km),
                    "livesAndServes": residents.lives_and_serves.len(),
                    "livesNotServing": residents.lives_not_serving.len(),
                    "containsUnit": report.containing_city.as_deref() == Some(city.name.as_str()),
                }),
            ));
        }
    }

    log::info!("Built {} map features", features.len());

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn feature(value: Value, properties: serde_json::Value) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: as_object(properties),
        foreign_members: None,
    }
}

fn as_object(value: serde_json::Value) -> Option<JsonObject> {
    match value {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    }
}
