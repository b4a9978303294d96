//! Nearest-city residence analysis for one unit.
//!
//! For each of the nearest cities, roster specialists living there are
//! split into those who serve the unit and those who do not (candidates
//! for reallocation). When nobody living in the nearest city serves the
//! unit, the report falls back to every serving specialist with their
//! home-to-unit distance.

use std::collections::BTreeMap;

use field_radius_distance::distance_km;
use field_radius_distance_models::{BandLimits, DistanceBand};
use field_radius_geometry_models::AreaSet;
use field_radius_matcher::{JoinResult, SpecialistJoin};
use field_radius_normalize::{NormalizedKey, normalize};
use field_radius_roster_models::{HomePoint, Roster};
use serde::{Deserialize, Serialize};

use crate::{CityError, CitySet, NearestCity};

/// A specialist in a nearest-city report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedSpecialist {
    /// Normalized manager.
    pub manager: NormalizedKey,
    /// Normalized specialist.
    pub specialist: NormalizedKey,
    /// Normalized home city.
    pub home_city: NormalizedKey,
    /// Home to unit, km.
    pub distance_km: f64,
    /// Band of `distance_km`.
    pub band: DistanceBand,
    /// Distinct units this specialist lists in the roster.
    pub units_served: usize,
    /// Distinct specialists sharing this home city.
    pub specialists_in_city: usize,
}

/// Residence split for one nearby city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityResidents {
    /// The city and its distance from the unit.
    pub nearest: NearestCity,
    /// Living in this city and serving the unit.
    pub lives_and_serves: Vec<ClassifiedSpecialist>,
    /// Living in this city without serving the unit.
    pub lives_not_serving: Vec<ClassifiedSpecialist>,
}

/// Full nearest-city answer for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestCityReport {
    /// Area key of the unit.
    pub unit_key: NormalizedKey,
    /// Unit name as written in the geometry document.
    pub unit_name: String,
    /// Representative point of the unit.
    pub unit_point: HomePoint,
    /// City whose boundary contains the unit point, if any.
    pub containing_city: Option<String>,
    /// Nearest cities, closest first, each with its residents.
    pub cities: Vec<CityResidents>,
    /// Every serving specialist, listed when nobody in the nearest city
    /// serves the unit. Empty otherwise.
    pub fallback: Vec<ClassifiedSpecialist>,
    /// Every serving specialist with their distance, closest first.
    pub distribution: Vec<ClassifiedSpecialist>,
}

impl NearestCityReport {
    /// Whether the fallback list had to be used.
    #[must_use]
    pub fn used_fallback(&self) -> bool {
        self.cities
            .first()
            .is_some_and(|c| c.lives_and_serves.is_empty())
    }
}

/// Nearest-city analysis inputs that stay fixed across units.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisOptions {
    /// How many nearest cities to report.
    pub nearest_count: usize,
    /// Distance bands.
    pub bands: BandLimits,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            nearest_count: 1,
            bands: BandLimits::default(),
        }
    }
}

/// Whether a specialist serves the unit: the roster lists it, or one of
/// the listed keys resolved to it.
fn serves(join: &SpecialistJoin, unit: &NormalizedKey) -> bool {
    join.record.serves(unit) || join.resolved.iter().any(|r| &r.area_key == unit)
}

/// Analyzes one unit, named as the user typed it.
///
/// # Errors
///
/// * [`CityError::UnitNotFound`] if `unit` does not normalize to an area key
pub fn analyze(
    unit: &str,
    areas: &AreaSet,
    cities: &CitySet,
    roster: &Roster,
    join: &JoinResult,
    options: &AnalysisOptions,
) -> Result<NearestCityReport, CityError> {
    let area = areas
        .get(&normalize(unit))
        .ok_or_else(|| CityError::UnitNotFound {
            unit: unit.to_string(),
        })?;

    let unit_point = HomePoint {
        lon: area.representative_point.x(),
        lat: area.representative_point.y(),
    };

    let classify = |join: &SpecialistJoin| {
        let record = &join.record;
        let distance = distance_km(record.home_point, unit_point);
        ClassifiedSpecialist {
            manager: record.manager.clone(),
            specialist: record.specialist.clone(),
            home_city: record.home_city.clone(),
            distance_km: distance,
            band: options.bands.classify(distance),
            units_served: roster.units_served_by(&record.specialist),
            specialists_in_city: roster.specialists_in_city(&record.home_city),
        }
    };

    let specialists = merged_specialists(join);

    let cities_report: Vec<CityResidents> = cities
        .nearest(unit_point, options.nearest_count)
        .into_iter()
        .map(|nearest| {
            let (serving, not_serving): (Vec<&SpecialistJoin>, Vec<&SpecialistJoin>) = specialists
                .iter()
                .filter(|s| s.record.home_city == nearest.city.key)
                .partition(|s| serves(s, &area.key));
            CityResidents {
                nearest,
                lives_and_serves: serving.into_iter().map(classify).collect(),
                lives_not_serving: not_serving.into_iter().map(classify).collect(),
            }
        })
        .collect();

    let mut distribution: Vec<ClassifiedSpecialist> = specialists
        .iter()
        .filter(|s| serves(s, &area.key))
        .map(classify)
        .collect();
    distribution.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

    let fallback = if cities_report
        .first()
        .is_some_and(|c| c.lives_and_serves.is_empty())
    {
        distribution.clone()
    } else {
        Vec::new()
    };

    let containing_city = cities.containing(unit_point).map(|c| c.name.clone());

    log::info!(
        "Nearest-city analysis for {}: {} cities, {} serving specialists",
        area.key,
        cities_report.len(),
        distribution.len()
    );

    Ok(NearestCityReport {
        unit_key: area.key.clone(),
        unit_name: area.name.clone(),
        unit_point,
        containing_city,
        cities: cities_report,
        fallback,
        distribution,
    })
}

/// One join entry per (manager, specialist, home city), in first-seen
/// order. Records of the same person and city at different home points
/// are merged: served keys and resolutions are unioned and the first
/// record's home point is kept.
fn merged_specialists(join: &JoinResult) -> Vec<SpecialistJoin> {
    let mut index: BTreeMap<(NormalizedKey, NormalizedKey, NormalizedKey), usize> = BTreeMap::new();
    let mut merged: Vec<SpecialistJoin> = Vec::new();

    for entry in &join.specialists {
        let record = &entry.record;
        let key = (
            record.manager.clone(),
            record.specialist.clone(),
            record.home_city.clone(),
        );
        let Some(&i) = index.get(&key) else {
            index.insert(key, merged.len());
            merged.push(entry.clone());
            continue;
        };

        let target = &mut merged[i];
        target
            .record
            .served_unit_keys
            .extend(record.served_unit_keys.iter().cloned());
        for resolved in &entry.resolved {
            if !target.resolved.iter().any(|r| r.served_key == resolved.served_key) {
                target.resolved.push(resolved.clone());
            }
        }
        for unresolved in &entry.unresolved {
            if !target.unresolved.iter().any(|u| u.served_key == unresolved.served_key) {
                target.unresolved.push(unresolved.clone());
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use field_radius_geometry_models::{NamedArea, UnitGeometry};
    use field_radius_matcher::{MatchKind, ResolvedUnit};
    use field_radius_roster_models::{RosterRow, SpecialistRecord};
    use geo::{MultiPoint, Point};

    use crate::City;

    fn areas() -> AreaSet {
        AreaSet::new([NamedArea {
            name: "Fazenda São José".to_string(),
            key: "FAZENDA SAO JOSE".into(),
            geometry: UnitGeometry {
                points: MultiPoint::new(vec![Point::new(-49.20, -16.70)]),
                ..UnitGeometry::default()
            },
            representative_point: Point::new(-49.20, -16.70),
            area_km2: 0.0,
            fragment_count: 1,
            attributes: BTreeMap::new(),
        }])
    }

    fn cities() -> CitySet {
        let city = |name: &str, lat: f64, lon: f64| City {
            name: name.to_string(),
            key: name.into(),
            point: HomePoint::from_lat_lon(lat, lon),
            boundary: None,
        };
        CitySet::new(vec![
            city("Goiânia", -16.6864, -49.2539),
            city("Anápolis", -16.3281, -48.9529),
            city("Rio Verde", -17.7923, -50.9192),
        ])
    }

    struct Person<'a> {
        name: &'a str,
        city: &'a str,
        lat: f64,
        lon: f64,
        units: &'a [&'a str],
    }

    fn fixture(people: &[Person<'_>]) -> (Roster, JoinResult) {
        let mut rows = Vec::new();
        let mut specialists = Vec::new();
        for p in people {
            let home_point = HomePoint::from_lat_lon(p.lat, p.lon);
            for unit in p.units {
                rows.push(RosterRow {
                    row_number: rows.len() + 1,
                    manager: "JOAO".into(),
                    specialist: p.name.into(),
                    home_city: p.city.into(),
                    home_point,
                    unit: (*unit).into(),
                    raw_unit: (*unit).to_string(),
                });
            }
            let record = SpecialistRecord {
                manager: "JOAO".into(),
                specialist: p.name.into(),
                home_city: p.city.into(),
                home_point,
                served_unit_keys: p.units.iter().map(|u| NormalizedKey::from(*u)).collect(),
            };
            let resolved = record
                .served_unit_keys
                .iter()
                .filter(|k| k.as_str() == "FAZENDA SAO JOSE")
                .map(|k| ResolvedUnit {
                    served_key: k.clone(),
                    area_key: k.clone(),
                    kind: MatchKind::Exact,
                })
                .collect();
            specialists.push(SpecialistJoin {
                record,
                resolved,
                unresolved: Vec::new(),
            });
        }
        (
            Roster {
                rows,
                specialists: specialists.iter().map(|s| s.record.clone()).collect(),
            },
            JoinResult { specialists },
        )
    }

    #[test]
    fn splits_residents_of_nearest_city() {
        let (roster, join) = fixture(&[
            Person { name: "Maria", city: "Goiânia", lat: -16.6799, lon: -49.255, units: &["Fazenda São José", "Outra"] },
            Person { name: "Pedro", city: "Goiania", lat: -16.6799, lon: -49.255, units: &["Outra"] },
            Person { name: "Ana", city: "Anápolis", lat: -16.3281, lon: -48.9529, units: &["Fazenda Sao Jose"] },
        ]);
        let report = analyze("fazenda são josé", &areas(), &cities(), &roster, &join, &AnalysisOptions::default())
            .unwrap();

        assert_eq!(report.cities.len(), 1);
        let goiania = &report.cities[0];
        assert_eq!(goiania.nearest.city.key.as_str(), "GOIANIA");
        assert_eq!(goiania.lives_and_serves.len(), 1);
        assert_eq!(goiania.lives_and_serves[0].specialist.as_str(), "MARIA");
        assert_eq!(goiania.lives_and_serves[0].units_served, 2);
        assert_eq!(goiania.lives_and_serves[0].specialists_in_city, 2);
        assert_eq!(goiania.lives_not_serving.len(), 1);
        assert_eq!(goiania.lives_not_serving[0].specialist.as_str(), "PEDRO");

        assert!(!report.used_fallback());
        assert!(report.fallback.is_empty());
        assert_eq!(report.distribution.len(), 2);
        assert_eq!(report.distribution[0].specialist.as_str(), "MARIA");
        assert_eq!(report.distribution[0].band, DistanceBand::Near);
    }

    #[test]
    fn falls_back_to_serving_specialists_elsewhere() {
        let (roster, join) = fixture(&[
            Person { name: "Ana", city: "Anápolis", lat: -16.3281, lon: -48.9529, units: &["Fazenda São José"] },
            Person { name: "Rui", city: "Rio Verde", lat: -17.7923, lon: -50.9192, units: &["Fazenda São José"] },
        ]);
        let report = analyze("Fazenda Sao Jose", &areas(), &cities(), &roster, &join, &AnalysisOptions::default())
            .unwrap();

        let nearest = &report.cities[0];
        assert_eq!(nearest.nearest.city.key.as_str(), "GOIANIA");
        assert!(nearest.lives_and_serves.is_empty());
        assert!(nearest.lives_not_serving.is_empty());

        assert!(report.used_fallback());
        let names: Vec<&str> = report.fallback.iter().map(|s| s.specialist.as_str()).collect();
        assert_eq!(names, vec!["ANA", "RUI"]);
        assert!(report.fallback.iter().all(|s| s.distance_km > 0.0));
        assert!(report.fallback[0].distance_km < report.fallback[1].distance_km);
    }

    #[test]
    fn reports_top_n_cities() {
        let (roster, join) = fixture(&[]);
        let options = AnalysisOptions {
            nearest_count: 3,
            ..AnalysisOptions::default()
        };
        let report = analyze("FAZENDA SAO JOSE", &areas(), &cities(), &roster, &join, &options).unwrap();
        let keys: Vec<&str> = report.cities.iter().map(|c| c.nearest.city.key.as_str()).collect();
        assert_eq!(keys, vec!["GOIANIA", "ANAPOLIS", "RIO VERDE"]);
        assert!(report.distribution.is_empty());
        assert!(report.fallback.is_empty());
        assert!(report.containing_city.is_none());
    }

    #[test]
    fn merges_rows_of_one_specialist_at_two_home_points() {
        let (roster, join) = fixture(&[
            Person { name: "Maria", city: "Goiânia", lat: -16.6799, lon: -49.255, units: &["Outra"] },
            Person { name: "Maria", city: "Goiania", lat: -16.7001, lon: -49.301, units: &["Fazenda São José"] },
            Person { name: "Pedro", city: "Goiânia", lat: -16.6799, lon: -49.255, units: &["Outra"] },
        ]);
        let report = analyze("Fazenda São José", &areas(), &cities(), &roster, &join, &AnalysisOptions::default())
            .unwrap();

        let goiania = &report.cities[0];
        let serving: Vec<&str> = goiania.lives_and_serves.iter().map(|s| s.specialist.as_str()).collect();
        let not_serving: Vec<&str> = goiania.lives_not_serving.iter().map(|s| s.specialist.as_str()).collect();
        assert_eq!(serving, vec!["MARIA"]);
        assert_eq!(not_serving, vec!["PEDRO"]);
        assert_eq!(goiania.lives_and_serves[0].units_served, 2);
        assert!(!report.used_fallback());
        assert_eq!(report.distribution.len(), 1);
    }

    #[test]
    fn unknown_unit_is_an_error() {
        let (roster, join) = fixture(&[]);
        assert!(matches!(
            analyze("Nowhere", &areas(), &cities(), &roster, &join, &AnalysisOptions::default()),
            Err(CityError::UnitNotFound { .. })
        ));
    }
}
