#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Presentation layer: display rows, the selection filter and map layers.
//!
//! Nothing upstream rounds or title-cases; this crate is the only place
//! where values are prepared for humans.

pub mod map;
pub mod selection;
pub mod table;

use std::io::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use map::{MapOptions, map_layers};
pub use selection::{Choice, Selection};

/// Errors that can occur while writing reports.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown output format name.
    #[error("Unknown output format: {0}")]
    UnknownFormat(String),
}

/// How tables are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputFormat {
    /// Aligned plain-text columns.
    #[default]
    Table,
    /// CSV with a header row.
    Csv,
    /// Pretty-printed JSON array.
    Json,
}

impl FromStr for OutputFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(ReportError::UnknownFormat(s.to_string())),
        }
    }
}

/// Rounds to one decimal place.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Upper-cases the first letter of every word and lower-cases the rest.
#[must_use]
pub fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writes map layers as a GeoJSON document.
///
/// # Errors
///
/// Returns [`ReportError`] if serialization or the writer fails.
pub fn write_geojson(collection: &geojson::FeatureCollection, out: &mut impl Write) -> Result<(), ReportError> {
    serde_json::to_writer(&mut *out, collection)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_one_decimal() {
        assert!((round1(7.04) - 7.0).abs() < f64::EPSILON);
        assert!((round1(359.27) - 359.3).abs() < f64::EPSILON);
        assert!(round1(0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn title_cases_normalized_keys() {
        assert_eq!(title_case("FAZENDA SAO JOSE"), "Fazenda Sao Jose");
        assert_eq!(title_case("MARIA  SILVA"), "Maria  Silva");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn parses_output_formats() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!(" json ".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn writes_feature_collection() {
        let collection = map_layers(&[], &[], None, &MapOptions::default());
        let mut out = Vec::new();
        write_geojson(&collection, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"], serde_json::json!([]));
    }
}
