#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Great-circle distances and per-specialist aggregation.

use field_radius_distance_models::{
    BandLimits, Overview, ResolvedAssignment, SpecialistSummary, UnitDistance,
};
use field_radius_geometry_models::AreaSet;
use field_radius_matcher::{JoinResult, SpecialistJoin};
use field_radius_roster_models::HomePoint;

/// Mean Earth radius in km.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in km between two longitude/latitude points given
/// in degrees.
#[must_use]
pub fn haversine(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.clamp(0.0, 1.0).sqrt().asin()
}

/// [`haversine`] between two points.
#[must_use]
pub fn distance_km(from: HomePoint, to: HomePoint) -> f64 {
    haversine(from.lon, from.lat, to.lon, to.lat)
}

/// Builds the assignments of one specialist: one per distinct resolved
/// area, ordered by area key.
#[must_use]
pub fn assignments(join: &SpecialistJoin, areas: &AreaSet) -> Vec<ResolvedAssignment> {
    let record = &join.record;
    let mut out: Vec<ResolvedAssignment> = Vec::new();

    for resolved in &join.resolved {
        if out.iter().any(|a| a.unit_key == resolved.area_key) {
            continue;
        }
        let Some(area) = areas.get(&resolved.area_key) else {
            log::warn!("Resolved area {} is missing from the area set", resolved.area_key);
            continue;
        };
        let unit_point = HomePoint {
            lon: area.representative_point.x(),
            lat: area.representative_point.y(),
        };
        out.push(ResolvedAssignment {
            manager: record.manager.clone(),
            specialist: record.specialist.clone(),
            home_point: record.home_point,
            unit_key: area.key.clone(),
            unit_name: area.name.clone(),
            unit_point,
            unit_geometry: area.geometry.clone(),
            match_kind: resolved.kind,
            distance_km: distance_km(record.home_point, unit_point),
        });
    }

    out.sort_by(|a, b| a.unit_key.cmp(&b.unit_key));
    out
}

/// Aggregates one specialist.
#[must_use]
pub fn summarize(join: &SpecialistJoin, areas: &AreaSet, limits: &BandLimits) -> SpecialistSummary {
    let assignments = assignments(join, areas);
    let distances: Vec<f64> = assignments.iter().map(|a| a.distance_km).collect();
    let (mean_distance_km, max_distance_km) = mean_and_max(&distances);
    let record = &join.record;

    SpecialistSummary {
        manager: record.manager.clone(),
        specialist: record.specialist.clone(),
        home_city: record.home_city.clone(),
        home_point: record.home_point,
        served_unit_keys: record.served_unit_keys.clone(),
        unit_count: assignments.len(),
        mean_distance_km,
        max_distance_km,
        band: limits.classify(max_distance_km),
        details: assignments
            .iter()
            .map(|a| UnitDistance {
                unit_key: a.unit_key.clone(),
                distance_km: a.distance_km,
            })
            .collect(),
        unresolved_count: join.unresolved.len(),
        assignments,
    }
}

/// Aggregates every specialist of a join.
#[must_use]
pub fn summarize_all(join: &JoinResult, areas: &AreaSet, limits: &BandLimits) -> Vec<SpecialistSummary> {
    let summaries: Vec<SpecialistSummary> = join
        .specialists
        .iter()
        .map(|s| summarize(s, areas, limits))
        .collect();

    log::info!("Computed distance summaries for {} specialists", summaries.len());
    summaries
}

/// Mean and maximum of a list, both 0 for an empty list.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_and_max(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (mean, max)
}

/// Headline figures over a selection of summaries.
#[must_use]
pub fn overview<'a>(summaries: impl IntoIterator<Item = &'a SpecialistSummary>) -> Overview {
    let summaries: Vec<&SpecialistSummary> = summaries.into_iter().collect();
    let with_units: Vec<f64> = summaries
        .iter()
        .filter(|s| s.unit_count > 0)
        .map(|s| s.mean_distance_km)
        .collect();

    let largest = summaries
        .iter()
        .copied()
        .filter(|s| s.unit_count > 0)
        .fold(None::<&SpecialistSummary>, |best, s| match best {
            Some(b) if b.max_distance_km >= s.max_distance_km => Some(b),
            _ => Some(s),
        });

    Overview {
        specialist_count: summaries.len(),
        total_units: summaries.iter().map(|s| s.unit_count).sum(),
        mean_of_means_km: mean_and_max(&with_units).0,
        largest_radius_km: largest.map_or(0.0, |s| s.max_distance_km),
        largest_radius_specialist: largest.map(|s| s.specialist.clone()),
    }
}
