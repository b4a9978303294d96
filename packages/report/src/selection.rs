//! Manager / specialist / unit filter over distance summaries.

use field_radius_distance_models::SpecialistSummary;
use field_radius_normalize::{NormalizedKey, normalize};
use serde::{Deserialize, Serialize};

/// Either every value or one specific value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Choice {
    /// No constraint.
    #[default]
    All,
    /// Must equal this key.
    One(NormalizedKey),
}

impl Choice {
    /// `All` for a missing or blank label, otherwise the normalized label.
    #[must_use]
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(normalize) {
            Some(key) if !key.is_missing() => Self::One(key),
            _ => Self::All,
        }
    }

    /// Whether `key` passes.
    #[must_use]
    pub fn accepts(&self, key: &NormalizedKey) -> bool {
        match self {
            Self::All => true,
            Self::One(wanted) => wanted == key,
        }
    }
}

/// A filter over summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Manager equality.
    pub manager: Choice,
    /// Specialist equality.
    pub specialist: Choice,
    /// The specialist must serve this unit.
    pub unit: Choice,
}

impl Selection {
    /// Builds a selection from user-typed labels.
    #[must_use]
    pub fn from_labels(manager: Option<&str>, specialist: Option<&str>, unit: Option<&str>) -> Self {
        Self {
            manager: Choice::from_label(manager),
            specialist: Choice::from_label(specialist),
            unit: Choice::from_label(unit),
        }
    }

    /// Whether a summary passes every constraint.
    #[must_use]
    pub fn matches(&self, summary: &SpecialistSummary) -> bool {
        self.manager.accepts(&summary.manager)
            && self.specialist.accepts(&summary.specialist)
            && match &self.unit {
                Choice::All => true,
                Choice::One(unit) => {
                    summary.served_unit_keys.contains(unit)
                        || summary.assignments.iter().any(|a| &a.unit_key == unit)
                }
            }
    }

    /// Summaries passing the filter, in input order.
    #[must_use]
    pub fn apply<'a>(&self, summaries: &'a [SpecialistSummary]) -> Vec<&'a SpecialistSummary> {
        let selected: Vec<&SpecialistSummary> =
            summaries.iter().filter(|s| self.matches(s)).collect();
        log::debug!("Selection kept {} of {} specialists", selected.len(), summaries.len());
        selected
    }
}
