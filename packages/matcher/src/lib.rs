#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Unit matching and the roster/geometry join.
//!
//! A served-unit key from the roster is resolved against the extracted
//! area keys in two steps: an exact index lookup, then (if enabled) a
//! fuzzy scan over every area key. Both steps sit behind the [`Matcher`]
//! trait so they can be tested and swapped independently;
//! [`CascadeMatcher`] chains them.
//!
//! [`join`] applies a matcher to every served key of every specialist.
//! Each key ends up either resolved or unresolved, never dropped.

pub mod score;

use std::collections::BTreeSet;

use field_radius_geometry_models::AreaSet;
use field_radius_normalize::NormalizedKey;
use field_radius_roster_models::SpecialistRecord;
use serde::{Deserialize, Serialize};

pub use score::Scorer;

/// Default fuzzy acceptance threshold on the 0-100 scale.
pub const DEFAULT_THRESHOLD: u8 = 88;

/// How a served key was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum MatchKind {
    /// Keys are equal.
    Exact,
    /// Keys are similar enough.
    Fuzzy {
        /// Similarity score, at or above the threshold.
        score: u8,
    },
}

/// An area key a served key resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitMatch {
    /// The matched area key.
    pub area_key: NormalizedKey,
    /// How it matched.
    pub kind: MatchKind,
}

/// The most similar area key, whether or not it passed the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// The area key.
    pub key: NormalizedKey,
    /// Its similarity score.
    pub score: u8,
}

/// Resolves roster unit keys to area keys.
pub trait Matcher {
    /// Finds the area a served key refers to.
    fn find(&self, key: &NormalizedKey) -> Option<UnitMatch>;

    /// Best candidate for a key, for diagnostics on unresolved keys.
    fn best_candidate(&self, _key: &NormalizedKey) -> Option<Candidate> {
        None
    }
}

/// Exact-key index lookup.
#[derive(Debug, Clone, Default)]
pub struct ExactMatcher {
    keys: BTreeSet<NormalizedKey>,
}

impl ExactMatcher {
    /// Indexes the given keys.
    #[must_use]
    pub fn new(keys: impl IntoIterator<Item = NormalizedKey>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// Indexes every area key of a set.
    #[must_use]
    pub fn from_areas(areas: &AreaSet) -> Self {
        Self::new(areas.keys().cloned())
    }
}

impl Matcher for ExactMatcher {
    fn find(&self, key: &NormalizedKey) -> Option<UnitMatch> {
        self.keys.get(key).map(|k| UnitMatch {
            area_key: k.clone(),
            kind: MatchKind::Exact,
        })
    }
}

/// Linear similarity scan over all candidate keys.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    keys: Vec<NormalizedKey>,
    threshold: u8,
    scorer: Scorer,
}

impl FuzzyMatcher {
    /// Creates a matcher over `keys`. Missing (blank) keys are ignored.
    #[must_use]
    pub fn new(keys: impl IntoIterator<Item = NormalizedKey>, threshold: u8, scorer: Scorer) -> Self {
        let mut keys: Vec<NormalizedKey> = keys.into_iter().filter(|k| !k.is_missing()).collect();
        keys.sort();
        keys.dedup();
        Self {
            keys,
            threshold,
            scorer,
        }
    }

    /// Scans every area key of a set.
    #[must_use]
    pub fn from_areas(areas: &AreaSet, threshold: u8, scorer: Scorer) -> Self {
        Self::new(areas.keys().cloned(), threshold, scorer)
    }

    /// The acceptance threshold.
    #[must_use]
    pub const fn threshold(&self) -> u8 {
        self.threshold
    }
}

impl Matcher for FuzzyMatcher {
    fn find(&self, key: &NormalizedKey) -> Option<UnitMatch> {
        self.best_candidate(key)
            .filter(|c| c.score >= self.threshold)
            .map(|c| UnitMatch {
                area_key: c.key,
                kind: MatchKind::Fuzzy { score: c.score },
            })
    }

    /// Highest-scoring key. Ties go to the lexicographically smallest key.
    fn best_candidate(&self, key: &NormalizedKey) -> Option<Candidate> {
        if key.is_missing() {
            return None;
        }
        let mut best: Option<Candidate> = None;
        for candidate in &self.keys {
            let score = self.scorer.score(key.as_str(), candidate.as_str());
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(Candidate {
                    key: candidate.clone(),
                    score,
                });
            }
        }
        best
    }
}

/// Exact lookup first, fuzzy scan second.
#[derive(Debug, Clone)]
pub struct CascadeMatcher {
    exact: ExactMatcher,
    fuzzy: FuzzyMatcher,
    fuzzy_enabled: bool,
}

impl CascadeMatcher {
    /// Builds both stages over the area keys of a set.
    #[must_use]
    pub fn from_areas(areas: &AreaSet, options: &MatchOptions) -> Self {
        Self {
            exact: ExactMatcher::from_areas(areas),
            fuzzy: FuzzyMatcher::from_areas(areas, options.threshold, options.scorer),
            fuzzy_enabled: options.fuzzy_enabled,
        }
    }
}

impl Matcher for CascadeMatcher {
    fn find(&self, key: &NormalizedKey) -> Option<UnitMatch> {
        self.exact.find(key).or_else(|| {
            if self.fuzzy_enabled {
                self.fuzzy.find(key)
            } else {
                None
            }
        })
    }

    fn best_candidate(&self, key: &NormalizedKey) -> Option<Candidate> {
        self.fuzzy.best_candidate(key)
    }
}

/// Matching tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOptions {
    /// Minimum fuzzy score, 0-100, inclusive.
    pub threshold: u8,
    /// Whether the fuzzy stage runs at all.
    pub fuzzy_enabled: bool,
    /// Similarity function.
    pub scorer: Scorer,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            fuzzy_enabled: true,
            scorer: Scorer::Ratio,
        }
    }
}

/// A served key that resolved to an area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedUnit {
    /// Key as listed in the roster.
    pub served_key: NormalizedKey,
    /// Area it resolved to.
    pub area_key: NormalizedKey,
    /// How it resolved.
    pub kind: MatchKind,
}

/// A served key with no area within the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedUnit {
    /// Key as listed in the roster.
    pub served_key: NormalizedKey,
    /// Closest area key seen, for the warning text.
    pub best_candidate: Option<Candidate>,
}

/// Join output for one specialist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialistJoin {
    /// The roster record.
    pub record: SpecialistRecord,
    /// Served keys that resolved, in key order.
    pub resolved: Vec<ResolvedUnit>,
    /// Served keys that did not.
    pub unresolved: Vec<UnresolvedUnit>,
}

impl SpecialistJoin {
    /// Distinct area keys this specialist resolved to. Two served keys
    /// that resolve to the same area count once.
    #[must_use]
    pub fn area_keys(&self) -> BTreeSet<&NormalizedKey> {
        self.resolved.iter().map(|r| &r.area_key).collect()
    }
}

/// Join output for a whole roster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResult {
    /// One entry per specialist record, in roster order.
    pub specialists: Vec<SpecialistJoin>,
}

impl JoinResult {
    /// Total resolved served keys.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.specialists.iter().map(|s| s.resolved.len()).sum()
    }

    /// Total unresolved served keys.
    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.specialists.iter().map(|s| s.unresolved.len()).sum()
    }

    /// Resolved keys that needed the fuzzy stage.
    #[must_use]
    pub fn fuzzy_count(&self) -> usize {
        self.specialists
            .iter()
            .flat_map(|s| &s.resolved)
            .filter(|r| matches!(r.kind, MatchKind::Fuzzy { .. }))
            .count()
    }
}

/// Resolves every served key of every record.
#[must_use]
pub fn join(records: &[SpecialistRecord], matcher: &impl Matcher) -> JoinResult {
    let specialists: Vec<SpecialistJoin> = records
        .iter()
        .map(|record| join_one(record, matcher))
        .collect();

    let result = JoinResult { specialists };

    log::info!(
        "Joined roster: {} resolved ({} fuzzy), {} unresolved",
        result.resolved_count(),
        result.fuzzy_count(),
        result.unresolved_count(),
    );
    if result.resolved_count() == 0 && !records.is_empty() {
        log::warn!("No roster unit matched any extracted geometry");
    }

    result
}

fn join_one(record: &SpecialistRecord, matcher: &impl Matcher) -> SpecialistJoin {
    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();

    for served_key in &record.served_unit_keys {
        match matcher.find(served_key) {
            Some(found) => {
                if let MatchKind::Fuzzy { score } = found.kind {
                    log::debug!(
                        "Fuzzy matched {served_key} -> {} (score {score})",
                        found.area_key
                    );
                }
                resolved.push(ResolvedUnit {
                    served_key: served_key.clone(),
                    area_key: found.area_key,
                    kind: found.kind,
                });
            }
            None => {
                let best_candidate = matcher.best_candidate(served_key);
                log::warn!(
                    "Unit {served_key} of specialist {} has no matching geometry{}",
                    record.specialist,
                    best_candidate
                        .as_ref()
                        .map(|c| format!(" (closest: {} at {})", c.key, c.score))
                        .unwrap_or_default(),
                );
                unresolved.push(UnresolvedUnit {
                    served_key: served_key.clone(),
                    best_candidate,
                });
            }
        }
    }

    SpecialistJoin {
        record: record.clone(),
        resolved,
        unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use field_radius_roster_models::HomePoint;

    fn keys(names: &[&str]) -> Vec<NormalizedKey> {
        names.iter().map(|n| NormalizedKey::from(*n)).collect()
    }

    fn record(units: &[&str]) -> SpecialistRecord {
        SpecialistRecord {
            manager: "JOAO".into(),
            specialist: "MARIA".into(),
            home_city: "GOIANIA".into(),
            home_point: HomePoint::from_lat_lon(-16.6799, -49.255),
            served_unit_keys: keys(units).into_iter().collect(),
        }
    }

    fn cascade(area_keys: &[&str], threshold: u8, fuzzy_enabled: bool) -> CascadeMatcher {
        CascadeMatcher {
            exact: ExactMatcher::new(keys(area_keys)),
            fuzzy: FuzzyMatcher::new(keys(area_keys), threshold, Scorer::Ratio),
            fuzzy_enabled,
        }
    }

    #[test]
    fn exact_matcher_finds_equal_keys_only() {
        let matcher = ExactMatcher::new(keys(&["Fazenda São José"]));
        let found = matcher.find(&"FAZENDA SAO JOSE".into()).unwrap();
        assert_eq!(found.kind, MatchKind::Exact);
        assert!(matcher.find(&"FAZENDA SAO JOSE 2".into()).is_none());
        assert!(matcher.best_candidate(&"X".into()).is_none());
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let at = FuzzyMatcher::new(keys(&["ABCDEFGHIJ"]), 90, Scorer::Ratio);
        assert_eq!(
            at.find(&"ABCDEFGHIX".into()).map(|m| m.kind),
            Some(MatchKind::Fuzzy { score: 90 })
        );

        let above = FuzzyMatcher::new(keys(&["ABCDEFGHIJ"]), 91, Scorer::Ratio);
        assert!(above.find(&"ABCDEFGHIX".into()).is_none());
    }

    #[test]
    fn ties_go_to_smallest_key() {
        let matcher = FuzzyMatcher::new(keys(&["ABCDEFGHIY", "ABCDEFGHIX"]), 80, Scorer::Ratio);
        let found = matcher.find(&"ABCDEFGHIZ".into()).unwrap();
        assert_eq!(found.area_key.as_str(), "ABCDEFGHIX");
    }

    #[test]
    fn fuzzy_ignores_missing_candidates() {
        let matcher = FuzzyMatcher::new(keys(&["", "  "]), 0, Scorer::Ratio);
        assert!(matcher.find(&"A".into()).is_none());
        assert!(matcher.best_candidate(&"".into()).is_none());
    }

    #[test]
    fn cascade_prefers_exact_then_fuzzy() {
        let matcher = cascade(&["FAZENDA BOA VISTA", "FAZENDA BOA VISTAS"], 88, true);
        assert_eq!(
            matcher.find(&"FAZENDA BOA VISTA".into()).unwrap().kind,
            MatchKind::Exact
        );

        let fuzzy = cascade(&["FAZENDA BOA VISTA"], 88, true);
        let found = fuzzy.find(&"FAZENDA BOA VISTAS".into()).unwrap();
        assert_eq!(found.area_key.as_str(), "FAZENDA BOA VISTA");
        assert!(matches!(found.kind, MatchKind::Fuzzy { score } if score >= 88));
    }

    #[test]
    fn cascade_without_fuzzy_still_reports_candidates() {
        let matcher = cascade(&["FAZENDA BOA VISTA"], 88, false);
        assert!(matcher.find(&"FAZENDA BOA VISTAS".into()).is_none());
        let best = matcher.best_candidate(&"FAZENDA BOA VISTAS".into()).unwrap();
        assert_eq!(best.key.as_str(), "FAZENDA BOA VISTA");
    }

    #[test]
    fn join_accounts_for_every_served_key() {
        let records = vec![
            record(&["Fazenda São José", "Fazenda Boa Vistas", "Sitio Longe Demais"]),
            record(&[]),
        ];
        let matcher = cascade(&["FAZENDA SAO JOSE", "FAZENDA BOA VISTA"], 88, true);
        let result = join(&records, &matcher);

        for (specialist, record) in result.specialists.iter().zip(&records) {
            let mut seen: BTreeSet<&NormalizedKey> =
                specialist.resolved.iter().map(|r| &r.served_key).collect();
            seen.extend(specialist.unresolved.iter().map(|u| &u.served_key));
            let listed: BTreeSet<&NormalizedKey> = record.served_unit_keys.iter().collect();
            assert_eq!(seen, listed);
            assert_eq!(
                specialist.resolved.len() + specialist.unresolved.len(),
                record.served_unit_keys.len()
            );
        }

        assert_eq!(result.resolved_count(), 2);
        assert_eq!(result.fuzzy_count(), 1);
        assert_eq!(result.unresolved_count(), 1);
        assert_eq!(
            result.specialists[0].unresolved[0].served_key.as_str(),
            "SITIO LONGE DEMAIS"
        );
        assert!(result.specialists[0].unresolved[0].best_candidate.is_some());
    }

    #[test]
    fn duplicate_resolutions_count_one_area() {
        let matcher = cascade(&["FAZENDA BOA VISTA"], 88, true);
        let result = join(&[record(&["Fazenda Boa Vista", "Fazenda Boa Vistas"])], &matcher);
        assert_eq!(result.specialists[0].resolved.len(), 2);
        assert_eq!(result.specialists[0].area_keys().len(), 1);
    }
}
