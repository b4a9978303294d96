#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! End-to-end pipeline.
//!
//! [`PipelineContext::build`] runs extraction, roster loading, matching
//! and distance aggregation once and keeps the results. A context never
//! changes afterwards; new inputs mean a new context.

pub mod warning;

use std::path::{Path, PathBuf};

use field_radius_cities::analysis::{NearestCityReport, analyze};
use field_radius_cities::{CityError, CitySet};
use field_radius_config::{Config, ConfigError};
use field_radius_distance::{overview, summarize_all};
use field_radius_distance_models::{Overview, SpecialistSummary};
use field_radius_geometry::ExtractError;
use field_radius_geometry_models::AreaSet;
use field_radius_matcher::{CascadeMatcher, JoinResult};
use field_radius_report::Selection;
use field_radius_roster::RosterError;
use field_radius_roster_models::Roster;
use field_radius_routing::progress::ProgressCallback;
use field_radius_routing::{Route, RouteRequest, RoutingError};

pub use warning::Warning;

/// Errors that stop a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// An input file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The geometry document is not well-formed.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The roster was rejected.
    #[error(transparent)]
    Roster(#[from] RosterError),

    /// City document or nearest-city lookup error.
    #[error(transparent)]
    City(#[from] CityError),

    /// The routing client could not be created.
    #[error(transparent)]
    Routing(#[from] RoutingError),
}

/// Where the geometry document comes from.
#[derive(Debug, Clone, Copy)]
pub enum GeometrySource<'a> {
    /// A KML file.
    File(&'a Path),
    /// KML text already in memory.
    Kml(&'a str),
}

/// Where the roster comes from.
#[derive(Debug, Clone, Copy)]
pub enum RosterSource<'a> {
    /// A CSV or spreadsheet file, chosen by extension.
    File(&'a Path),
    /// CSV text already in memory.
    Csv(&'a str),
}

/// A selection applied to a context.
#[derive(Debug, Clone)]
pub struct Selected<'a> {
    /// Summaries passing the filter, in record order.
    pub summaries: Vec<&'a SpecialistSummary>,
    /// Headline figures over `summaries`.
    pub overview: Overview,
    /// Set when nothing passed the filter.
    pub warning: Option<Warning>,
}

/// Immutable results of one pipeline run.
#[derive(Debug)]
pub struct PipelineContext {
    config: Config,
    areas: AreaSet,
    roster: Roster,
    join: JoinResult,
    summaries: Vec<SpecialistSummary>,
    warnings: Vec<Warning>,
}

fn read(path: &Path) -> Result<String, PipelineError> {
    std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl PipelineContext {
    /// Runs every stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if an input cannot be read, the geometry
    /// document is malformed, or the roster fails validation. Per-record
    /// problems do not fail the build; they end up in
    /// [`PipelineContext::warnings`].
    pub fn build(
        config: &Config,
        geometry: GeometrySource<'_>,
        roster: RosterSource<'_>,
    ) -> Result<Self, PipelineError> {
        let options = config.consolidate_options();
        let extraction = match geometry {
            GeometrySource::File(path) => field_radius_geometry::extract(&read(path)?, &options)?,
            GeometrySource::Kml(text) => field_radius_geometry::extract(text, &options)?,
        };

        let mut warnings: Vec<Warning> = extraction
            .rejected_placemarks
            .iter()
            .map(Warning::from)
            .chain(extraction.rejected_units.iter().map(Warning::from))
            .collect();
        let areas = extraction.areas;
        if areas.is_empty() {
            warnings.push(Warning::NoGeometries);
        }

        let roster = match roster {
            RosterSource::File(path) => field_radius_roster::load_path(path)?,
            RosterSource::Csv(text) => field_radius_roster::load_csv(text)?,
        };

        let matcher = CascadeMatcher::from_areas(&areas, &config.match_options());
        let join = field_radius_matcher::join(&roster.specialists, &matcher);
        warnings.extend(join.specialists.iter().flat_map(warning::unresolved));
        if join.resolved_count() == 0 && !roster.specialists.is_empty() {
            warnings.push(Warning::NoMatches);
        }

        let summaries = summarize_all(&join, &areas, &config.band_limits());

        log::info!(
            "Pipeline built: {} units, {} specialists, {} warnings",
            areas.len(),
            summaries.len(),
            warnings.len()
        );

        Ok(Self {
            config: config.clone(),
            areas,
            roster,
            join,
            summaries,
            warnings,
        })
    }

    /// [`PipelineContext::build`] from two files.
    ///
    /// # Errors
    ///
    /// See [`PipelineContext::build`].
    pub fn from_paths(config: &Config, kml: &Path, roster: &Path) -> Result<Self, PipelineError> {
        Self::build(config, GeometrySource::File(kml), RosterSource::File(roster))
    }

    /// Configuration the context was built with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Extracted units.
    #[must_use]
    pub const fn areas(&self) -> &AreaSet {
        &self.areas
    }

    /// Loaded roster.
    #[must_use]
    pub const fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Join of roster against units.
    #[must_use]
    pub const fn join(&self) -> &JoinResult {
        &self.join
    }

    /// One summary per specialist record.
    #[must_use]
    pub fn summaries(&self) -> &[SpecialistSummary] {
        &self.summaries
    }

    /// Problems met while building.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Applies a selection filter.
    #[must_use]
    pub fn select(&self, selection: &Selection) -> Selected<'_> {
        let summaries = selection.apply(&self.summaries);
        let warning = if summaries.is_empty() {
            log::info!("Selection matched no specialist");
            Some(Warning::EmptySelection)
        } else {
            None
        };

        Selected {
            overview: overview(summaries.iter().copied()),
            summaries,
            warning,
        }
    }

    /// Nearest-city analysis for one unit, named as the user typed it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::City`] if the unit is unknown.
    pub fn nearest_city(
        &self,
        cities: &CitySet,
        unit: &str,
        nearest_count: Option<usize>,
    ) -> Result<NearestCityReport, PipelineError> {
        let mut options = self.config.analysis_options();
        if let Some(count) = nearest_count {
            options.nearest_count = count.max(1);
        }
        Ok(analyze(
            unit,
            &self.areas,
            cities,
            &self.roster,
            &self.join,
            &options,
        )?)
    }

    /// Looks up road routes for the assignments of a selection.
    ///
    /// Failed lookups come back as warnings.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Routing`] only if the HTTP client cannot
    /// be created.
    pub async fn fetch_routes(
        &self,
        summaries: &[&SpecialistSummary],
        progress: &dyn ProgressCallback,
    ) -> Result<(Vec<Route>, Vec<Warning>), PipelineError> {
        let options = self.config.routing_options();
        let client = field_radius_routing::build_client(&options)?;
        let requests = route_requests(summaries);

        let (routes, failures) =
            field_radius_routing::fetch_routes(&client, &requests, &options, progress).await;

        Ok((routes, failures.iter().map(Warning::from).collect()))
    }

    /// Map layers for a selection.
    #[must_use]
    pub fn map_layers(
        &self,
        summaries: &[&SpecialistSummary],
        routes: &[Route],
        nearest: Option<&NearestCityReport>,
    ) -> geojson::FeatureCollection {
        field_radius_report::map_layers(summaries, routes, nearest, &self.config.map_options())
    }
}

/// Loads a city document with the configured name fields.
///
/// # Errors
///
/// Returns [`PipelineError`] if the file cannot be read or holds no
/// usable city.
pub fn load_cities(config: &Config, path: &Path) -> Result<CitySet, PipelineError> {
    Ok(CitySet::from_geojson(&read(path)?, &config.cities.name_fields)?)
}

/// One route request per assignment, specialist by specialist.
#[must_use]
pub fn route_requests(summaries: &[&SpecialistSummary]) -> Vec<RouteRequest> {
    summaries
        .iter()
        .flat_map(|s| &s.assignments)
        .map(|a| RouteRequest {
            specialist: a.specialist.clone(),
            unit_key: a.unit_key.clone(),
            from: a.home_point,
            to: a.unit_point,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use field_radius_distance_models::DistanceBand;
    use field_radius_matcher::MatchKind;
    use field_radius_report::Choice;

    const KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <name>Fazenda São José</name>
      <Point><coordinates>-49.20,-16.70,0</coordinates></Point>
    </Placemark>
    <Placemark>
      <name>Fazenda Boa Vista</name>
      <Point><coordinates>-49.00,-16.00</coordinates></Point>
    </Placemark>
    <Placemark>
      <name>Fazenda Santa Rita</name>
      <Point><coordinates>-47.50,-15.50</coordinates></Point>
    </Placemark>
    <Placemark>
      <name>Sem Coordenada</name>
      <Point><coordinates>nope</coordinates></Point>
    </Placemark>
  </Document>
</kml>"#;

    const ROSTER: &str = "GESTOR,ESPECIALISTA,CIDADE_BASE,UNIDADE,COORDENADAS_CIDADE
JOAO,MARIA,GOIANIA,FAZENDA SAO JOSE,\"-16.6799,-49.255\"
JOAO,MARIA,GOIANIA,Fazenda Santa Ritta,\"-16.6799,-49.255\"
JOAO,MARIA,GOIANIA,Fazenda Inexistente,\"-16.6799,-49.255\"
ANA,ANA,Anápolis,Fazenda Boa Vista,\"'-16.3281,-48.9534\"
JOAO,RUI,Goiânia,fazenda boa vista,\"-16.6799,-49.255\"
";

    const CITIES: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    { "type": "Feature", "geometry": { "type": "Point", "coordinates": [-49.01, -16.01] }, "properties": { "nome": "Vila Perto" } },
    { "type": "Feature", "geometry": { "type": "Point", "coordinates": [-48.9534, -16.3281] }, "properties": { "nome": "Anápolis" } },
    { "type": "Feature", "geometry": { "type": "Point", "coordinates": [-49.255, -16.6799] }, "properties": { "nome": "Goiânia" } }
  ]
}"#;

    fn context() -> PipelineContext {
        PipelineContext::build(
            &Config::default(),
            GeometrySource::Kml(KML),
            RosterSource::Csv(ROSTER),
        )
        .unwrap()
    }

    fn summary<'a>(ctx: &'a PipelineContext, specialist: &str) -> &'a SpecialistSummary {
        ctx.summaries()
            .iter()
            .find(|s| s.specialist.as_str() == specialist)
            .unwrap()
    }

    #[test]
    fn goiania_scenario_resolves_one_near_unit() {
        let ctx = context();
        let maria = summary(&ctx, "MARIA");

        let sao_jose = maria
            .assignments
            .iter()
            .find(|a| a.unit_key.as_str() == "FAZENDA SAO JOSE")
            .unwrap();
        assert_eq!(sao_jose.match_kind, MatchKind::Exact);
        assert!((6.0..=8.0).contains(&sao_jose.distance_km), "{}", sao_jose.distance_km);
        assert_eq!(sao_jose.unit_name, "Fazenda São José");
    }

    #[test]
    fn fuzzy_resolution_and_unresolved_warnings() {
        let ctx = context();
        let maria = summary(&ctx, "MARIA");

        let santa_rita = maria
            .assignments
            .iter()
            .find(|a| a.unit_key.as_str() == "FAZENDA SANTA RITA")
            .unwrap();
        assert!(matches!(santa_rita.match_kind, MatchKind::Fuzzy { score } if score >= 88));
        assert_eq!(maria.unit_count, 2);
        assert_eq!(maria.unresolved_count, 1);
        assert_eq!(maria.band, DistanceBand::Far);

        assert!(ctx.warnings().iter().any(|w| matches!(
            w,
            Warning::UnresolvedUnit { served_unit, .. } if served_unit.as_str() == "FAZENDA INEXISTENTE"
        )));
        assert!(ctx.warnings().iter().any(|w| matches!(
            w,
            Warning::RejectedPlacemark { name: Some(name), .. } if name == "Sem Coordenada"
        )));
    }

    #[test]
    fn every_served_key_is_accounted_for() {
        let ctx = context();
        for specialist in &ctx.join().specialists {
            for key in &specialist.record.served_unit_keys {
                let resolved = specialist.resolved.iter().any(|r| &r.served_key == key);
                let unresolved = specialist.unresolved.iter().any(|u| &u.served_key == key);
                assert!(resolved ^ unresolved, "{key} lost or duplicated");
            }
        }
    }

    #[test]
    fn selection_filters_and_warns_when_empty() {
        let ctx = context();

        let joao = ctx.select(&Selection::from_labels(Some("joão"), None, None));
        assert_eq!(joao.summaries.len(), 2);
        assert!(joao.warning.is_none());
        assert_eq!(joao.overview.specialist_count, 2);
        assert_eq!(joao.overview.total_units, 3);

        let serving = ctx.select(&Selection {
            unit: Choice::One("FAZENDA BOA VISTA".into()),
            ..Selection::default()
        });
        assert_eq!(serving.summaries.len(), 2);

        let nobody = ctx.select(&Selection::from_labels(Some("PAULO"), None, None));
        assert!(nobody.summaries.is_empty());
        assert_eq!(nobody.warning, Some(Warning::EmptySelection));
        assert_eq!(nobody.overview, Overview::default());
    }

    #[test]
    fn nearest_city_falls_back_to_serving_specialists() {
        let ctx = context();
        let cities = CitySet::from_geojson(CITIES, &ctx.config().cities.name_fields).unwrap();

        let report = ctx.nearest_city(&cities, "Fazenda Boa Vista", None).unwrap();
        assert_eq!(report.cities.len(), 1);
        assert_eq!(report.cities[0].nearest.city.name, "Vila Perto");
        assert!(report.cities[0].lives_not_serving.is_empty());
        assert!(report.cities[0].lives_and_serves.is_empty());
        assert!(report.used_fallback());

        let names: Vec<&str> = report.fallback.iter().map(|c| c.specialist.as_str()).collect();
        assert_eq!(names, vec!["ANA", "RUI"]);
        assert!(report.fallback.iter().all(|c| c.distance_km > 0.0));
    }

    #[test]
    fn nearest_city_count_override() {
        let ctx = context();
        let cities = CitySet::from_geojson(CITIES, &ctx.config().cities.name_fields).unwrap();
        let report = ctx.nearest_city(&cities, "Fazenda Boa Vista", Some(3)).unwrap();
        assert_eq!(report.cities.len(), 3);
        assert!(ctx.nearest_city(&cities, "Nowhere", None).is_err());
    }

    #[test]
    fn map_layers_cover_selection() {
        let ctx = context();
        let selected = ctx.select(&Selection::from_labels(None, Some("maria"), None));
        let layers = ctx.map_layers(&selected.summaries, &[], None);

        let value = serde_json::to_value(&layers).unwrap();
        let features = value["features"].as_array().unwrap();
        let count = |layer: &str| features.iter().filter(|f| f["properties"]["layer"] == layer).count();
        assert_eq!(count("base"), 1);
        assert_eq!(count("radius"), 1);
        assert_eq!(count("unit"), 2);
    }

    #[test]
    fn route_requests_follow_assignments() {
        let ctx = context();
        let selected = ctx.select(&Selection::default());
        let requests = route_requests(&selected.summaries);
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0].specialist.as_str(), "ANA");
    }

    #[tokio::test]
    async fn zero_route_cap_fetches_nothing() {
        let mut config = Config::default();
        config.routing.max_routes = 0;
        let ctx = PipelineContext::build(&config, GeometrySource::Kml(KML), RosterSource::Csv(ROSTER)).unwrap();
        let selected = ctx.select(&Selection::default());

        let (routes, warnings) = ctx
            .fetch_routes(&selected.summaries, &field_radius_routing::progress::NullProgress)
            .await
            .unwrap();
        assert!(routes.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn empty_geometry_document_warns_instead_of_failing() {
        let ctx = PipelineContext::build(
            &Config::default(),
            GeometrySource::Kml("<kml><Document/></kml>"),
            RosterSource::Csv(ROSTER),
        )
        .unwrap();
        assert!(ctx.areas().is_empty());
        assert!(ctx.warnings().contains(&Warning::NoGeometries));
        assert!(ctx.warnings().contains(&Warning::NoMatches));
        assert!(ctx.summaries().iter().all(|s| s.unit_count == 0));
    }

    #[test]
    fn invalid_roster_stops_the_run() {
        let result = PipelineContext::build(
            &Config::default(),
            GeometrySource::Kml(KML),
            RosterSource::Csv("GESTOR,ESPECIALISTA\nJOAO,MARIA\n"),
        );
        assert!(matches!(
            result,
            Err(PipelineError::Roster(RosterError::MissingColumns { .. }))
        ));
    }
}
