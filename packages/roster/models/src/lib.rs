#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Roster data types.
//!
//! A roster spreadsheet has one row per (specialist, served unit) pair.
//! [`RosterRow`] mirrors a validated row; [`SpecialistRecord`] is the
//! grouped view with every served unit of one specialist in a set.

use std::collections::BTreeSet;

use field_radius_normalize::NormalizedKey;
use serde::{Deserialize, Serialize};

/// A home-base coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomePoint {
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl HomePoint {
    /// Creates a point from latitude and longitude, in the order the
    /// roster writes them.
    #[must_use]
    pub const fn from_lat_lon(lat: f64, lon: f64) -> Self {
        Self { lon, lat }
    }

    /// Bit patterns of both coordinates, usable as an exact grouping key.
    #[must_use]
    pub const fn bits(self) -> (u64, u64) {
        (self.lat.to_bits(), self.lon.to_bits())
    }
}

/// One validated roster row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterRow {
    /// 1-based data row number (the header is row 0).
    pub row_number: usize,
    /// Normalized manager name.
    pub manager: NormalizedKey,
    /// Normalized specialist name.
    pub specialist: NormalizedKey,
    /// Normalized home city.
    pub home_city: NormalizedKey,
    /// Parsed home coordinate.
    pub home_point: HomePoint,
    /// Normalized served unit name. Missing when the cell was blank.
    pub unit: NormalizedKey,
    /// The served unit cell as written.
    pub raw_unit: String,
}

/// One field specialist with every unit they serve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialistRecord {
    /// Normalized manager name.
    pub manager: NormalizedKey,
    /// Normalized specialist name.
    pub specialist: NormalizedKey,
    /// Normalized home city.
    pub home_city: NormalizedKey,
    /// Home base coordinate.
    pub home_point: HomePoint,
    /// Deduplicated served unit keys.
    pub served_unit_keys: BTreeSet<NormalizedKey>,
}

impl SpecialistRecord {
    /// Whether this specialist lists the given unit.
    #[must_use]
    pub fn serves(&self, unit: &NormalizedKey) -> bool {
        self.served_unit_keys.contains(unit)
    }
}

/// A loaded roster: raw rows and the grouped specialist records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    /// Every validated row, in file order.
    pub rows: Vec<RosterRow>,
    /// One record per (manager, specialist, home city, home point).
    pub specialists: Vec<SpecialistRecord>,
}

impl Roster {
    /// Number of distinct served units listed for a specialist, across
    /// all their records.
    #[must_use]
    pub fn units_served_by(&self, specialist: &NormalizedKey) -> usize {
        self.rows
            .iter()
            .filter(|row| &row.specialist == specialist && !row.unit.is_missing())
            .map(|row| &row.unit)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Number of distinct specialists whose home is the given city.
    #[must_use]
    pub fn specialists_in_city(&self, city: &NormalizedKey) -> usize {
        self.rows
            .iter()
            .filter(|row| &row.home_city == city)
            .map(|row| &row.specialist)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(specialist: &str, city: &str, unit: &str) -> RosterRow {
        RosterRow {
            row_number: 1,
            manager: "JOAO".into(),
            specialist: specialist.into(),
            home_city: city.into(),
            home_point: HomePoint::from_lat_lon(-16.68, -49.25),
            unit: unit.into(),
            raw_unit: unit.to_string(),
        }
    }

    #[test]
    fn counts_distinct_units_and_residents() {
        let roster = Roster {
            rows: vec![
                row("MARIA", "GOIANIA", "A"),
                row("MARIA", "GOIANIA", "A"),
                row("MARIA", "GOIANIA", "B"),
                row("PEDRO", "GOIANIA", ""),
                row("ANA", "ANAPOLIS", "C"),
            ],
            specialists: Vec::new(),
        };
        assert_eq!(roster.units_served_by(&"maria".into()), 2);
        assert_eq!(roster.units_served_by(&"pedro".into()), 0);
        assert_eq!(roster.specialists_in_city(&"goiânia".into()), 2);
        assert_eq!(roster.specialists_in_city(&"nowhere".into()), 0);
    }

    #[test]
    fn home_point_keeps_lat_lon_order_straight() {
        let p = HomePoint::from_lat_lon(-16.68, -49.25);
        assert!((p.lat - -16.68).abs() < f64::EPSILON);
        assert!((p.lon - -49.25).abs() < f64::EPSILON);
    }
}
