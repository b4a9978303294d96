#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Canonical join keys for free-text labels.
//!
//! Unit names, city names, and person names arrive from two independently
//! maintained sources (a KML export and a spreadsheet roster) with
//! differing case, accents and stray whitespace. Both sides are passed
//! through [`normalize`] before any comparison, so the join never sees
//! the raw text.
//!
//! The pipeline:
//! 1. Uppercase
//! 2. Canonical decomposition (NFD), dropping combining marks
//! 3. Transliterate the few letters that have no decomposition (`Æ`, `Ø`, ...)
//! 4. Trim

use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Key produced for missing (null or blank) input.
pub const MISSING: &str = "";

/// A label after normalization. Two labels refer to the same thing iff
/// their keys are equal (or, in the matcher, similar enough).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    /// Returns the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key came from missing input.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.0 == MISSING
    }

    /// Consumes the key, returning the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NormalizedKey {
    fn from(value: &str) -> Self {
        normalize(value)
    }
}

impl From<String> for NormalizedKey {
    fn from(value: String) -> Self {
        normalize(&value)
    }
}

/// Normalizes a label into its join key.
///
/// Total over all strings and idempotent:
/// `normalize(normalize(s).as_str()) == normalize(s)`.
#[must_use]
pub fn normalize(input: &str) -> NormalizedKey {
    let upper = input.to_uppercase();
    let mut out = String::with_capacity(upper.len());

    for ch in upper.nfd() {
        if is_combining_mark(ch) {
            continue;
        }
        match ch {
            'Æ' => out.push_str("AE"),
            'Œ' => out.push_str("OE"),
            'Ø' => out.push('O'),
            'Đ' | 'Ð' => out.push('D'),
            'Ł' => out.push('L'),
            'Þ' => out.push_str("TH"),
            _ => out.push(ch),
        }
    }

    NormalizedKey(out.trim().to_string())
}

/// Normalizes an optional label, mapping `None` to the [`MISSING`] key.
#[must_use]
pub fn normalize_opt(input: Option<&str>) -> NormalizedKey {
    input.map_or_else(|| NormalizedKey(MISSING.to_string()), normalize)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "Palmeira",
        "  Fazenda São José ",
        "GOIÂNIA",
        "Ribeirão Preto",
        "straße",
        "Ærø",
        "ǅemal",
        "\u{0301}leading mark",
        "tab\tinside",
        "",
        "   ",
        "Ωmega ß",
        "İstanbul",
    ];

    #[test]
    fn is_idempotent() {
        for s in SAMPLES {
            let once = normalize(s);
            let twice = normalize(once.as_str());
            assert_eq!(once, twice, "normalization not idempotent for {s:?}");
        }
    }

    #[test]
    fn ignores_case_and_diacritics() {
        assert_eq!(normalize("Palmeira"), normalize("PALMEIRA"));
        assert_eq!(normalize("Palmeíra"), normalize("PALMEIRA"));
        assert_eq!(normalize("Palmeíra").as_str(), "PALMEIRA");
    }

    #[test]
    fn strips_accents_from_portuguese_names() {
        assert_eq!(normalize("Fazenda São José").as_str(), "FAZENDA SAO JOSE");
        assert_eq!(normalize("goiânia").as_str(), "GOIANIA");
        assert_eq!(normalize("Conceição do Araguaia").as_str(), "CONCEICAO DO ARAGUAIA");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(normalize("  Rio Verde \n").as_str(), "RIO VERDE");
    }

    #[test]
    fn transliterates_undecomposable_letters() {
        assert_eq!(normalize("Ærø").as_str(), "AERO");
        assert_eq!(normalize("straße").as_str(), "STRASSE");
    }

    #[test]
    fn missing_input_maps_to_sentinel() {
        assert!(normalize_opt(None).is_missing());
        assert!(normalize("   ").is_missing());
        assert_eq!(normalize_opt(Some("x")).as_str(), "X");
    }

    #[test]
    fn converts_from_strings() {
        let key: NormalizedKey = "são paulo".into();
        assert_eq!(key.to_string(), "SAO PAULO");
    }
}
