//! Similarity scores on a 0-100 integer scale.
//!
//! Scores are rounded to whole numbers before any threshold comparison,
//! so a pair sitting exactly on the threshold always lands on the same
//! side.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Similarity function used by the fuzzy matcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scorer {
    /// Normalized Levenshtein similarity of the whole strings.
    #[default]
    Ratio,
    /// Best ratio among the shared-token and leftover-token combinations,
    /// ignoring word order and repeated words.
    TokenSet,
}

impl Scorer {
    /// Scores two keys with this scorer.
    #[must_use]
    pub fn score(self, a: &str, b: &str) -> u8 {
        match self {
            Self::Ratio => ratio(a, b),
            Self::TokenSet => token_set_ratio(a, b),
        }
    }
}

/// `round(100 * normalized_levenshtein(a, b))`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn ratio(a: &str, b: &str) -> u8 {
    (strsim::normalized_levenshtein(a, b) * 100.0).round() as u8
}

/// Token-set similarity.
#[must_use]
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let left: BTreeSet<&str> = a.split_whitespace().collect();
    let right: BTreeSet<&str> = b.split_whitespace().collect();

    let shared = join(left.intersection(&right).copied());
    let only_left = join(left.difference(&right).copied());
    let only_right = join(right.difference(&left).copied());

    let combined_left = join([shared.as_str(), only_left.as_str()]);
    let combined_right = join([shared.as_str(), only_right.as_str()]);

    let mut best = ratio(&combined_left, &combined_right);
    if !shared.is_empty() {
        best = best
            .max(ratio(&shared, &combined_left))
            .max(ratio(&shared, &combined_right));
    }
    best
}

fn join<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
