//! Subcommand implementations shared by the flag-driven and interactive
//! front ends.

use std::io::Write;
use std::path::{Path, PathBuf};

use field_radius_cli_utils::{IndicatifProgress, MultiProgress};
use field_radius_config::Config;
use field_radius_pipeline::{PipelineContext, Selected, Warning, load_cities};
use field_radius_report::table::{
    detail_rows, nearest_rows, summary_rows, unit_rows, unresolved_rows, write_rows,
};
use field_radius_report::{OutputFormat, Selection, round1, title_case, write_geojson};

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// The two documents every analysis needs.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub kml: PathBuf,
    pub roster: PathBuf,
}

impl Inputs {
    fn build(&self, config: &Config) -> Result<PipelineContext, Box<dyn std::error::Error>> {
        let ctx = PipelineContext::from_paths(config, &self.kml, &self.roster)?;
        report_warnings(ctx.warnings());
        Ok(ctx)
    }
}

fn report_warnings(warnings: &[Warning]) {
    if !warnings.is_empty() {
        log::info!("{} record(s) skipped or unresolved", warnings.len());
    }
}

fn selected<'a>(ctx: &'a PipelineContext, selection: &Selection) -> Selected<'a> {
    let selected = ctx.select(selection);
    if let Some(warning) = &selected.warning {
        log::warn!("{warning}");
    }
    selected
}

/// Per-specialist radius table followed by the headline figures.
pub fn summary(config: &Config, inputs: &Inputs, selection: &Selection, format: OutputFormat) -> CommandResult {
    let ctx = inputs.build(config)?;
    let selected = selected(&ctx, selection);
    let mut out = std::io::stdout().lock();

    write_rows(&summary_rows(&selected.summaries), format, &mut out)?;

    if format == OutputFormat::Table {
        let o = &selected.overview;
        writeln!(
            out,
            "Specialists: {}  Units: {}  Mean distance: {:.1} km  Largest radius: {:.1} km{}",
            o.specialist_count,
            o.total_units,
            round1(o.mean_of_means_km),
            round1(o.largest_radius_km),
            o.largest_radius_specialist
                .as_ref()
                .map_or_else(String::new, |s| format!(" ({})", title_case(s.as_str()))),
        )?;
    }
    Ok(())
}

/// (specialist, unit, distance) lines.
pub fn details(config: &Config, inputs: &Inputs, selection: &Selection, format: OutputFormat) -> CommandResult {
    let ctx = inputs.build(config)?;
    let selected = selected(&ctx, selection);
    write_rows(&detail_rows(&selected.summaries), format, &mut std::io::stdout().lock())?;
    Ok(())
}

/// Writes the map layers of a selection as GeoJSON.
pub async fn map(
    config: &Config,
    inputs: &Inputs,
    selection: &Selection,
    output: &Path,
    with_routes: bool,
    multi: &MultiProgress,
) -> CommandResult {
    let ctx = inputs.build(config)?;
    let selected = selected(&ctx, selection);

    let routes = if with_routes {
        let progress = IndicatifProgress::lookup_bar(multi, "Fetching road routes");
        let (routes, failures) = ctx.fetch_routes(&selected.summaries, progress.as_ref()).await?;
        if !failures.is_empty() {
            log::warn!("{} route lookup(s) failed", failures.len());
        }
        routes
    } else {
        Vec::new()
    };

    let layers = ctx.map_layers(&selected.summaries, &routes, None);
    let mut file = std::io::BufWriter::new(std::fs::File::create(output)?);
    write_geojson(&layers, &mut file)?;
    file.flush()?;

    log::info!("Wrote {} map features to {}", layers.features.len(), output.display());
    Ok(())
}

/// Nearest-city residence analysis for one unit.
pub fn nearest_city(
    config: &Config,
    inputs: &Inputs,
    cities: &Path,
    unit: &str,
    count: Option<usize>,
    format: OutputFormat,
) -> CommandResult {
    let ctx = inputs.build(config)?;
    let cities = load_cities(config, cities)?;
    let report = ctx.nearest_city(&cities, unit, count)?;
    let mut out = std::io::stdout().lock();

    if format == OutputFormat::Table {
        writeln!(
            out,
            "{} ({:.5}, {:.5})",
            report.unit_name, report.unit_point.lat, report.unit_point.lon
        )?;
        if let Some(city) = &report.containing_city {
            writeln!(out, "Inside: {city}")?;
        }
        for residents in &report.cities {
            writeln!(
                out,
                "Nearest city: {} ({:.1} km)",
                residents.nearest.city.name,
                round1(residents.nearest.distance_km)
            )?;
        }
        if report.used_fallback() {
            writeln!(out, "Nobody living in the nearest city serves this unit.")?;
        }
        writeln!(out)?;
    }

    write_rows(&nearest_rows(&report), format, &mut out)?;
    Ok(())
}

/// Lists extracted units and their representative points.
pub fn units(config: &Config, kml: &Path, format: OutputFormat) -> CommandResult {
    let text = std::fs::read_to_string(kml)?;
    let extraction = field_radius_geometry::extract(&text, &config.consolidate_options())?;

    for rejected in &extraction.rejected_placemarks {
        log::debug!("Placemark #{} rejected: {}", rejected.index, rejected.error);
    }

    write_rows(&unit_rows(&extraction.areas), format, &mut std::io::stdout().lock())?;
    Ok(())
}

/// Lists served units that matched nothing, with the closest candidate.
pub fn unresolved(config: &Config, inputs: &Inputs, format: OutputFormat) -> CommandResult {
    let ctx = inputs.build(config)?;
    let rows = unresolved_rows(ctx.join());
    if rows.is_empty() {
        log::info!("Every served unit resolved");
    }
    write_rows(&rows, format, &mut std::io::stdout().lock())?;
    Ok(())
}
