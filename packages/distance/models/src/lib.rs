#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Distance engine output types.
//!
//! All distances are kilometres at full precision. Rounding for display
//! is left to the presentation layer.

use std::collections::BTreeSet;

use field_radius_geometry_models::UnitGeometry;
use field_radius_matcher::MatchKind;
use field_radius_normalize::NormalizedKey;
use field_radius_roster_models::HomePoint;
use serde::{Deserialize, Serialize};

/// One specialist crossed with one resolved unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAssignment {
    /// Normalized manager.
    pub manager: NormalizedKey,
    /// Normalized specialist.
    pub specialist: NormalizedKey,
    /// Specialist home base.
    pub home_point: HomePoint,
    /// Area key the served unit resolved to.
    pub unit_key: NormalizedKey,
    /// Unit name as written in the geometry document.
    pub unit_name: String,
    /// Representative point of the unit.
    pub unit_point: HomePoint,
    /// Consolidated unit geometry, for map overlays.
    #[serde(skip)]
    pub unit_geometry: UnitGeometry,
    /// How the served key matched.
    pub match_kind: MatchKind,
    /// Great-circle distance from home to unit.
    pub distance_km: f64,
}

/// One line of a specialist's distance breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitDistance {
    /// Area key.
    pub unit_key: NormalizedKey,
    /// Distance from home, km.
    pub distance_km: f64,
}

/// Coarse distance classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DistanceBand {
    /// Within the near limit.
    Near,
    /// Within the mid limit.
    Mid,
    /// Beyond the mid limit.
    Far,
}

impl std::fmt::Display for DistanceBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Near => "near",
            Self::Mid => "mid",
            Self::Far => "far",
        })
    }
}

/// Upper limits (inclusive) of the near and mid bands, in km.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandLimits {
    /// Largest distance still `Near`.
    pub near_km: f64,
    /// Largest distance still `Mid`.
    pub mid_km: f64,
}

impl Default for BandLimits {
    fn default() -> Self {
        Self {
            near_km: 100.0,
            mid_km: 200.0,
        }
    }
}

impl BandLimits {
    /// Classifies a distance.
    #[must_use]
    pub fn classify(&self, distance_km: f64) -> DistanceBand {
        if distance_km <= self.near_km {
            DistanceBand::Near
        } else if distance_km <= self.mid_km {
            DistanceBand::Mid
        } else {
            DistanceBand::Far
        }
    }
}

/// Aggregate distances of one specialist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialistSummary {
    /// Normalized manager.
    pub manager: NormalizedKey,
    /// Normalized specialist.
    pub specialist: NormalizedKey,
    /// Normalized home city.
    pub home_city: NormalizedKey,
    /// Home base.
    pub home_point: HomePoint,
    /// Every unit key listed in the roster, resolved or not.
    pub served_unit_keys: BTreeSet<NormalizedKey>,
    /// Distinct resolved units.
    pub unit_count: usize,
    /// Mean home-to-unit distance, 0 with no resolved unit.
    pub mean_distance_km: f64,
    /// Largest home-to-unit distance (radius of action), 0 with no
    /// resolved unit.
    pub max_distance_km: f64,
    /// Band of the radius of action.
    pub band: DistanceBand,
    /// Per-unit distances, ordered by unit key.
    pub details: Vec<UnitDistance>,
    /// Served keys the matcher could not resolve.
    pub unresolved_count: usize,
    /// The assignments behind `details`, in the same order.
    pub assignments: Vec<ResolvedAssignment>,
}

/// Headline figures over a set of summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    /// Number of specialists.
    pub specialist_count: usize,
    /// Sum of resolved units across specialists.
    pub total_units: usize,
    /// Mean of per-specialist mean distances, over specialists with at
    /// least one unit.
    pub mean_of_means_km: f64,
    /// Largest radius of action.
    pub largest_radius_km: f64,
    /// Specialist holding the largest radius.
    pub largest_radius_specialist: Option<NormalizedKey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_limits_are_inclusive() {
        let limits = BandLimits::default();
        assert_eq!(limits.classify(0.0), DistanceBand::Near);
        assert_eq!(limits.classify(100.0), DistanceBand::Near);
        assert_eq!(limits.classify(100.1), DistanceBand::Mid);
        assert_eq!(limits.classify(200.0), DistanceBand::Mid);
        assert_eq!(limits.classify(200.1), DistanceBand::Far);
    }

    #[test]
    fn band_serializes_camel_case() {
        assert_eq!(serde_json::to_string(&DistanceBand::Near).unwrap(), "\"near\"");
        assert_eq!(DistanceBand::Far.to_string(), "far");
    }
}
