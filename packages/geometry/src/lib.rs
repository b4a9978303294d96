#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry extraction from KML documents.
//!
//! Parses placemarks ([`kml`]), groups them by normalized unit name and
//! merges each group into one [`NamedArea`] ([`consolidate`]), computing
//! centroids in a local UTM frame ([`projection`]) when requested.
//!
//! Bad placemarks never abort extraction: they come back in
//! [`Extraction::rejected_placemarks`] alongside the areas that did build.

pub mod consolidate;
pub mod kml;
pub mod projection;

use field_radius_geometry_models::{AreaSet, GeometryKind, NamedArea};
use thiserror::Error;

pub use consolidate::{ConsolidateOptions, RejectedUnit};
pub use kml::RejectedPlacemark;

/// Why a single placemark or unit could not produce a geometry.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// The placemark had no `Polygon`, `LineString` or `Point`.
    #[error("Placemark has no polygon, line or point geometry")]
    Missing,

    /// A coordinate tuple was not `lon,lat[,alt]` with finite numbers.
    #[error("Malformed coordinate tuple: {tuple:?}")]
    MalformedCoordinate {
        /// The offending tuple text.
        tuple: String,
    },

    /// Not enough distinct vertices for the geometry kind.
    #[error("{kind:?} needs at least {required} distinct vertices, found {found}")]
    TooFewVertices {
        /// Geometry kind being built.
        kind: GeometryKind,
        /// Distinct vertices present.
        found: usize,
        /// Minimum required.
        required: usize,
    },

    /// A polygon ring enclosing zero area.
    #[error("Polygon ring is degenerate (zero area)")]
    Degenerate,

    /// Consolidation left nothing to take a centroid of.
    #[error("Unit geometry is empty after consolidation")]
    EmptyUnion,

    /// The UTM transform failed.
    #[error("Projection error: {message}")]
    Projection {
        /// What `proj4rs` reported.
        message: String,
    },
}

/// Document-level extraction failure.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The document is not well-formed XML.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Everything extracted from one geometry document.
#[derive(Debug, Default)]
pub struct Extraction {
    /// One area per normalized unit name.
    pub areas: AreaSet,
    /// Placemarks skipped because their geometry was unusable.
    pub rejected_placemarks: Vec<RejectedPlacemark>,
    /// Units dropped after consolidation.
    pub rejected_units: Vec<RejectedUnit>,
}

/// Extracts named areas from a KML document.
///
/// # Errors
///
/// * [`ExtractError::Xml`] if the document is not well-formed XML
pub fn extract(document: &str, options: &ConsolidateOptions) -> Result<Extraction, ExtractError> {
    let parsed = kml::parse_document(document)?;
    let placemark_count = parsed.placemarks.len();

    let (areas, rejected_units) = consolidate::consolidate(
        parsed.placemarks.into_iter().map(|(_, placemark)| placemark),
        options,
    );

    log::info!(
        "Extracted {} units from {placemark_count} placemarks ({} rejected)",
        areas.len(),
        parsed.rejected.len(),
    );

    if areas.is_empty() {
        log::warn!("No geometries extracted from document");
    }

    Ok(Extraction {
        areas: AreaSet::new(areas),
        rejected_placemarks: parsed.rejected,
        rejected_units,
    })
}

/// Looks up an area by raw (un-normalized) name.
#[must_use]
pub fn find_area<'a>(areas: &'a AreaSet, name: &str) -> Option<&'a NamedArea> {
    areas.get(&field_radius_normalize::normalize(name))
}
