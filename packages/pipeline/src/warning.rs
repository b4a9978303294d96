//! Non-fatal problems collected while building a context.

use std::fmt;

use field_radius_geometry::{RejectedPlacemark, RejectedUnit};
use field_radius_matcher::{Candidate, SpecialistJoin};
use field_radius_normalize::NormalizedKey;
use field_radius_routing::RouteFailure;
use serde::{Deserialize, Serialize};

/// A recoverable problem. The affected record was skipped; everything
/// else was processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum Warning {
    /// A placemark had unusable geometry.
    RejectedPlacemark {
        index: usize,
        name: Option<String>,
        reason: String,
    },
    /// A unit had no usable geometry after consolidation.
    RejectedUnit { unit: NormalizedKey, reason: String },
    /// The geometry document produced no unit at all.
    NoGeometries,
    /// A served unit did not resolve to any extracted unit.
    UnresolvedUnit {
        manager: NormalizedKey,
        specialist: NormalizedKey,
        served_unit: NormalizedKey,
        best_candidate: Option<Candidate>,
    },
    /// Not a single served unit resolved.
    NoMatches,
    /// A selection filter matched no specialist.
    EmptySelection,
    /// A road route lookup failed.
    RouteFailed {
        specialist: NormalizedKey,
        unit: NormalizedKey,
        reason: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RejectedPlacemark {
                index,
                name: Some(name),
                reason,
            } => write!(f, "Placemark #{index} ({name}) skipped: {reason}"),
            Self::RejectedPlacemark {
                index,
                name: None,
                reason,
            } => write!(f, "Placemark #{index} skipped: {reason}"),
            Self::RejectedUnit { unit, reason } => write!(f, "Unit {unit} skipped: {reason}"),
            Self::NoGeometries => f.write_str("No geometries were extracted from the document"),
            Self::UnresolvedUnit {
                specialist,
                served_unit,
                best_candidate: Some(candidate),
                ..
            } => write!(
                f,
                "Unit {served_unit} served by {specialist} not found (closest: {} at {})",
                candidate.key, candidate.score
            ),
            Self::UnresolvedUnit {
                specialist,
                served_unit,
                best_candidate: None,
                ..
            } => write!(f, "Unit {served_unit} served by {specialist} not found"),
            Self::NoMatches => f.write_str("No roster unit matched any extracted geometry"),
            Self::EmptySelection => f.write_str("No specialist matches the selection"),
            Self::RouteFailed {
                specialist,
                unit,
                reason,
            } => write!(f, "Route from {specialist} to {unit} unavailable: {reason}"),
        }
    }
}

impl From<&RejectedPlacemark> for Warning {
    fn from(rejected: &RejectedPlacemark) -> Self {
        Self::RejectedPlacemark {
            index: rejected.index,
            name: rejected.name.clone(),
            reason: rejected.error.to_string(),
        }
    }
}

impl From<&RejectedUnit> for Warning {
    fn from(rejected: &RejectedUnit) -> Self {
        Self::RejectedUnit {
            unit: rejected.key.clone(),
            reason: rejected.error.to_string(),
        }
    }
}

impl From<&RouteFailure> for Warning {
    fn from(failure: &RouteFailure) -> Self {
        Self::RouteFailed {
            specialist: failure.specialist.clone(),
            unit: failure.unit_key.clone(),
            reason: failure.error.to_string(),
        }
    }
}

/// One warning per unresolved served key of a specialist.
pub fn unresolved(join: &SpecialistJoin) -> impl Iterator<Item = Warning> + '_ {
    join.unresolved.iter().map(|u| Warning::UnresolvedUnit {
        manager: join.record.manager.clone(),
        specialist: join.record.specialist.clone(),
        served_unit: u.served_key.clone(),
        best_candidate: u.best_candidate.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_closest_candidate() {
        let warning = Warning::UnresolvedUnit {
            manager: "JOAO".into(),
            specialist: "MARIA".into(),
            served_unit: "FAZ SAO JOSE".into(),
            best_candidate: Some(Candidate {
                key: "FAZENDA SAO JOSE".into(),
                score: 75,
            }),
        };
        assert_eq!(
            warning.to_string(),
            "Unit FAZ SAO JOSE served by MARIA not found (closest: FAZENDA SAO JOSE at 75)"
        );
    }

    #[test]
    fn serializes_with_kind_tag() {
        let value = serde_json::to_value(Warning::EmptySelection).unwrap();
        assert_eq!(value, serde_json::json!({ "kind": "emptySelection" }));
    }
}
