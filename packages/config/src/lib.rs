#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Layered configuration.
//!
//! Layers, later ones winning:
//!
//! 1. `config/default.toml`, embedded at compile time
//! 2. a TOML file given explicitly or named by `FIELD_RADIUS_CONFIG`
//! 3. the `FIELD_RADIUS_*` environment overrides
//!
//! Command-line flags are applied on top by the binary. Files may set any
//! subset of keys; unset keys keep the value of the layer below.

use std::path::{Path, PathBuf};

use field_radius_cities::analysis::AnalysisOptions;
use field_radius_distance_models::BandLimits;
use field_radius_geometry::ConsolidateOptions;
use field_radius_matcher::{MatchOptions, Scorer};
use field_radius_report::MapOptions;
use field_radius_routing::RoutingOptions;
use serde::{Deserialize, Serialize};

/// The embedded default configuration.
pub const DEFAULT_TOML: &str = include_str!("../config/default.toml");

/// Environment variable naming a configuration file.
pub const ENV_CONFIG: &str = "FIELD_RADIUS_CONFIG";
/// Overrides `matching.fuzzy_threshold`.
pub const ENV_FUZZY_THRESHOLD: &str = "FIELD_RADIUS_FUZZY_THRESHOLD";
/// Overrides `geometry.reproject_centroids`.
pub const ENV_REPROJECT: &str = "FIELD_RADIUS_REPROJECT";
/// Overrides `cities.nearest_count`.
pub const ENV_NEAREST_CITIES: &str = "FIELD_RADIUS_NEAREST_CITIES";
/// Overrides `routing.base_url`.
pub const ENV_ROUTING_URL: &str = "FIELD_RADIUS_ROUTING_URL";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A layer is not valid TOML or does not fit the schema.
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value {value:?} for {name}")]
    Env {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },

    /// The merged configuration breaks a constraint.
    #[error("Invalid config: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

/// `[matching]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    /// Minimum fuzzy score, 0-100, inclusive.
    pub fuzzy_threshold: u8,
    /// Fall back to fuzzy matching when no exact key matches.
    pub fuzzy_enabled: bool,
    /// Similarity measure used for fuzzy matching.
    pub scorer: Scorer,
}

/// `[geometry]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeometryConfig {
    /// Compute centroids and areas in the unit's UTM zone.
    pub reproject_centroids: bool,
    /// Attribute names tried, in order, before the placemark `<name>`.
    pub preferred_name_fields: Vec<String>,
}

/// `[cities]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CitiesConfig {
    /// How many nearest cities to report.
    pub nearest_count: usize,
    /// Property names tried, in order, for the city name.
    pub name_fields: Vec<String>,
}

/// `[distance]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistanceConfig {
    /// Upper limit of the near band, km.
    pub near_km: f64,
    /// Upper limit of the mid band, km.
    pub mid_km: f64,
}

/// `[map]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapConfig {
    /// Units drawn per specialist.
    pub max_units_per_specialist: usize,
    /// Draw unit polygons and lines, not just points.
    pub include_geometries: bool,
}

/// `[routing]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Look up road routes for maps by default.
    pub enabled: bool,
    /// OSRM-compatible service root.
    pub base_url: String,
    /// Lookups per run.
    pub max_routes: usize,
    /// Pause between lookups, ms.
    pub delay_ms: u64,
    /// Per-lookup timeout, seconds.
    pub timeout_secs: u64,
}

/// Every tunable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// `[matching]`
    pub matching: MatchingConfig,
    /// `[geometry]`
    pub geometry: GeometryConfig,
    /// `[cities]`
    pub cities: CitiesConfig,
    /// `[distance]`
    pub distance: DistanceConfig,
    /// `[map]`
    pub map: MapConfig,
    /// `[routing]`
    pub routing: RoutingConfig,
}

impl Default for Config {
    /// The embedded defaults.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed (guarded by a test).
    fn default() -> Self {
        toml::from_str(DEFAULT_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded default.toml: {e}"))
    }
}

impl Config {
    /// Loads all layers from the real environment.
    ///
    /// `path` wins over `FIELD_RADIUS_CONFIG`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a layer cannot be read or parsed, or the
    /// result is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// [`Config::load`] with an injectable environment lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a layer cannot be read or parsed, or the
    /// result is invalid.
    pub fn load_with(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file = path
            .map(Path::to_path_buf)
            .or_else(|| env(ENV_CONFIG).map(PathBuf::from));

        let mut config = match file {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                let text = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Io { path, source })?;
                Self::from_overlay(&text)?
            }
            None => Self::default(),
        };

        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Embedded defaults with a (possibly partial) TOML document merged on
    /// top.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if either document is malformed or
    /// the merge does not fit the schema.
    pub fn from_overlay(overlay: &str) -> Result<Self, ConfigError> {
        let mut base: toml::Table = toml::from_str(DEFAULT_TOML)?;
        let overlay: toml::Table = toml::from_str(overlay)?;
        merge(&mut base, overlay);
        Ok(toml::Value::Table(base).try_into()?)
    }

    /// Applies the `FIELD_RADIUS_*` overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if a set variable does not parse.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(value) = env(ENV_FUZZY_THRESHOLD) {
            self.matching.fuzzy_threshold = parse_env(ENV_FUZZY_THRESHOLD, &value)?;
        }
        if let Some(value) = env(ENV_REPROJECT) {
            self.geometry.reproject_centroids = parse_bool(ENV_REPROJECT, &value)?;
        }
        if let Some(value) = env(ENV_NEAREST_CITIES) {
            self.cities.nearest_count = parse_env(ENV_NEAREST_CITIES, &value)?;
        }
        if let Some(value) = env(ENV_ROUTING_URL) {
            self.routing.base_url = value.trim().to_string();
        }
        Ok(())
    }

    /// Checks cross-field and range constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid { message })
        };

        if self.matching.fuzzy_threshold > 100 {
            return invalid(format!(
                "matching.fuzzy_threshold must be 0-100, got {}",
                self.matching.fuzzy_threshold
            ));
        }
        if self.cities.nearest_count == 0 {
            return invalid("cities.nearest_count must be at least 1".to_string());
        }
        if !(self.distance.near_km >= 0.0 && self.distance.near_km <= self.distance.mid_km) {
            return invalid(format!(
                "distance bands must satisfy 0 <= near_km <= mid_km, got {} and {}",
                self.distance.near_km, self.distance.mid_km
            ));
        }
        if self.routing.enabled && self.routing.base_url.is_empty() {
            return invalid("routing.base_url is required when routing is enabled".to_string());
        }
        Ok(())
    }

    /// Matcher tunables.
    #[must_use]
    pub const fn match_options(&self) -> MatchOptions {
        MatchOptions {
            threshold: self.matching.fuzzy_threshold,
            fuzzy_enabled: self.matching.fuzzy_enabled,
            scorer: self.matching.scorer,
        }
    }

    /// Unit identity and centroid options.
    #[must_use]
    pub fn consolidate_options(&self) -> ConsolidateOptions {
        ConsolidateOptions {
            preferred_name_fields: self.geometry.preferred_name_fields.clone(),
            reproject: self.geometry.reproject_centroids,
        }
    }

    /// Distance band limits.
    #[must_use]
    pub const fn band_limits(&self) -> BandLimits {
        BandLimits {
            near_km: self.distance.near_km,
            mid_km: self.distance.mid_km,
        }
    }

    /// Nearest-city analysis options.
    #[must_use]
    pub const fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            nearest_count: self.cities.nearest_count,
            bands: self.band_limits(),
        }
    }

    /// Map layer limits.
    #[must_use]
    pub const fn map_options(&self) -> MapOptions {
        MapOptions {
            max_units_per_specialist: self.map.max_units_per_specialist,
            include_geometries: self.map.include_geometries,
        }
    }

    /// Route lookup limits.
    #[must_use]
    pub fn routing_options(&self) -> RoutingOptions {
        RoutingOptions {
            base_url: self.routing.base_url.clone(),
            max_routes: self.routing.max_routes,
            delay_ms: self.routing.delay_ms,
            timeout_secs: self.routing.timeout_secs,
        }
    }
}

/// Recursively merges `overlay` into `base`. Tables merge key by key;
/// any other value replaces.
fn merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        name,
        value: value.to_string(),
    })
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            name,
            value: value.to_string(),
        }),
    }
}
