//! Display rows and their CSV / JSON / plain-text renderings.
//!
//! Every row type here is already display-ready: names title-cased,
//! distances rounded to one decimal.

use std::io::Write;

use field_radius_cities::analysis::{ClassifiedSpecialist, NearestCityReport};
use field_radius_distance_models::SpecialistSummary;
use field_radius_geometry_models::AreaSet;
use field_radius_matcher::{JoinResult, MatchKind};
use serde::{Deserialize, Serialize};

use crate::{OutputFormat, ReportError, round1, title_case};

/// A row that can be laid out as a text table.
pub trait TableRow {
    /// Column headers.
    fn headers() -> &'static [&'static str];

    /// Cells, one per header.
    fn cells(&self) -> Vec<String>;
}

/// One specialist line of the summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    /// Manager, title-cased.
    pub manager: String,
    /// Specialist, title-cased.
    pub specialist: String,
    /// Home city, title-cased.
    pub home_city: String,
    /// Distinct resolved units.
    pub units: usize,
    /// Mean home-to-unit distance, km.
    pub mean_km: f64,
    /// Radius of action, km.
    pub radius_km: f64,
    /// Band of the radius.
    pub band: String,
    /// Served keys that matched no unit.
    pub unresolved: usize,
}

impl TableRow for SummaryRow {
    fn headers() -> &'static [&'static str] {
        &[
            "MANAGER",
            "SPECIALIST",
            "HOME CITY",
            "UNITS",
            "MEAN KM",
            "RADIUS KM",
            "BAND",
            "UNRESOLVED",
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.manager.clone(),
            self.specialist.clone(),
            self.home_city.clone(),
            self.units.to_string(),
            format!("{:.1}", self.mean_km),
            format!("{:.1}", self.radius_km),
            self.band.clone(),
            self.unresolved.to_string(),
        ]
    }
}

/// One (specialist, unit, distance) line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailRow {
    /// Specialist, title-cased.
    pub specialist: String,
    /// Unit name as written in the geometry document.
    pub unit: String,
    /// Home-to-unit distance, km.
    pub distance_km: f64,
    /// `exact` or `fuzzy (score)`.
    #[serde(rename = "match")]
    pub match_kind: String,
}

impl TableRow for DetailRow {
    fn headers() -> &'static [&'static str] {
        &["SPECIALIST", "UNIT", "DISTANCE KM", "MATCH"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.specialist.clone(),
            self.unit.clone(),
            format!("{:.1}", self.distance_km),
            self.match_kind.clone(),
        ]
    }
}

/// One extracted unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRow {
    /// Unit name as written in the document.
    pub name: String,
    /// Normalized unit key.
    pub key: String,
    /// Representative point longitude.
    pub lon: f64,
    /// Representative point latitude.
    pub lat: f64,
    /// Polygon area, km².
    pub area_km2: f64,
    /// Placemarks merged into the unit.
    pub fragments: usize,
}

impl TableRow for UnitRow {
    fn headers() -> &'static [&'static str] {
        &["NAME", "KEY", "LON", "LAT", "AREA KM2", "FRAGMENTS"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.key.clone(),
            format!("{:.6}", self.lon),
            format!("{:.6}", self.lat),
            format!("{:.1}", self.area_km2),
            self.fragments.to_string(),
        ]
    }
}

/// One served key the matcher could not resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedRow {
    /// Manager, title-cased.
    pub manager: String,
    /// Specialist, title-cased.
    pub specialist: String,
    /// The served key as normalized.
    pub served_unit: String,
    /// Closest unit key, if any scored.
    pub best_candidate: Option<String>,
    /// Score of `best_candidate`, 0-100.
    pub score: Option<u8>,
}

impl TableRow for UnresolvedRow {
    fn headers() -> &'static [&'static str] {
        &["MANAGER", "SPECIALIST", "SERVED UNIT", "BEST CANDIDATE", "SCORE"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.manager.clone(),
            self.specialist.clone(),
            self.served_unit.clone(),
            self.best_candidate.clone().unwrap_or_else(|| "-".to_string()),
            self.score.map_or_else(|| "-".to_string(), |s| s.to_string()),
        ]
    }
}

/// One specialist line of a nearest-city report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestRow {
    /// Which list the line comes from.
    pub section: String,
    /// Nearest city name, `-` outside the city lists.
    pub city: String,
    /// Manager, title-cased.
    pub manager: String,
    /// Specialist, title-cased.
    pub specialist: String,
    /// Home city, title-cased.
    pub home_city: String,
    /// Home-to-unit distance, km.
    pub distance_km: f64,
    /// Band of `distance_km`.
    pub band: String,
    /// Distinct units the specialist lists.
    pub units_served: usize,
    /// Distinct specialists sharing the home city.
    pub specialists_in_city: usize,
}

impl TableRow for NearestRow {
    fn headers() -> &'static [&'static str] {
        &[
            "SECTION",
            "CITY",
            "MANAGER",
            "SPECIALIST",
            "HOME CITY",
            "DISTANCE KM",
            "BAND",
            "UNITS",
            "IN CITY",
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.section.clone(),
            self.city.clone(),
            self.manager.clone(),
            self.specialist.clone(),
            self.home_city.clone(),
            format!("{:.1}", self.distance_km),
            self.band.clone(),
            self.units_served.to_string(),
            self.specialists_in_city.to_string(),
        ]
    }
}

/// Summary rows for a selection.
#[must_use]
pub fn summary_rows(summaries: &[&SpecialistSummary]) -> Vec<SummaryRow> {
    summaries
        .iter()
        .map(|s| SummaryRow {
            manager: title_case(s.manager.as_str()),
            specialist: title_case(s.specialist.as_str()),
            home_city: title_case(s.home_city.as_str()),
            units: s.unit_count,
            mean_km: round1(s.mean_distance_km),
            radius_km: round1(s.max_distance_km),
            band: s.band.to_string(),
            unresolved: s.unresolved_count,
        })
        .collect()
}

/// Detail rows for a selection, grouped by specialist then unit key.
#[must_use]
pub fn detail_rows(summaries: &[&SpecialistSummary]) -> Vec<DetailRow> {
    summaries
        .iter()
        .flat_map(|s| &s.assignments)
        .map(|a| DetailRow {
            specialist: title_case(a.specialist.as_str()),
            unit: a.unit_name.clone(),
            distance_km: round1(a.distance_km),
            match_kind: match a.match_kind {
                MatchKind::Exact => "exact".to_string(),
                MatchKind::Fuzzy { score } => format!("fuzzy ({score})"),
            },
        })
        .collect()
}

/// One row per extracted unit, in key order.
#[must_use]
pub fn unit_rows(areas: &AreaSet) -> Vec<UnitRow> {
    areas
        .iter()
        .map(|a| UnitRow {
            name: a.name.clone(),
            key: a.key.to_string(),
            lon: a.representative_point.x(),
            lat: a.representative_point.y(),
            area_km2: round1(a.area_km2),
            fragments: a.fragment_count,
        })
        .collect()
}

/// One row per unresolved served key.
#[must_use]
pub fn unresolved_rows(join: &JoinResult) -> Vec<UnresolvedRow> {
    join.specialists
        .iter()
        .flat_map(|s| {
            s.unresolved.iter().map(move |u| UnresolvedRow {
                manager: title_case(s.record.manager.as_str()),
                specialist: title_case(s.record.specialist.as_str()),
                served_unit: u.served_key.to_string(),
                best_candidate: u.best_candidate.as_ref().map(|c| c.key.to_string()),
                score: u.best_candidate.as_ref().map(|c| c.score),
            })
        })
        .collect()
}

/// Flattens a nearest-city report: per city the residents serving and
/// not serving the unit, then the fallback, then the distribution.
#[must_use]
pub fn nearest_rows(report: &NearestCityReport) -> Vec<NearestRow> {
    let row = |section: &str, city: &str, c: &ClassifiedSpecialist| NearestRow {
        section: section.to_string(),
        city: city.to_string(),
        manager: title_case(c.manager.as_str()),
        specialist: title_case(c.specialist.as_str()),
        home_city: title_case(c.home_city.as_str()),
        distance_km: round1(c.distance_km),
        band: c.band.to_string(),
        units_served: c.units_served,
        specialists_in_city: c.specialists_in_city,
    };

    let mut rows = Vec::new();
    for residents in &report.cities {
        let city = residents.nearest.city.name.as_str();
        rows.extend(residents.lives_and_serves.iter().map(|c| row("lives and serves", city, c)));
        rows.extend(residents.lives_not_serving.iter().map(|c| row("lives, not serving", city, c)));
    }
    rows.extend(report.fallback.iter().map(|c| row("fallback", "-", c)));
    rows.extend(report.distribution.iter().map(|c| row("distribution", "-", c)));
    rows
}

/// Writes rows in the requested format.
///
/// # Errors
///
/// Returns [`ReportError`] if serialization or the writer fails.
pub fn write_rows<T: TableRow + Serialize>(
    rows: &[T],
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<(), ReportError> {
    match format {
        OutputFormat::Table => write_text_table(rows, out)?,
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, rows)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Left-aligned columns sized to their widest cell.
fn write_text_table<T: TableRow>(rows: &[T], out: &mut impl Write) -> std::io::Result<()> {
    let headers = T::headers();
    let cells: Vec<Vec<String>> = rows.iter().map(TableRow::cells).collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for line in &cells {
        for (width, cell) in widths.iter_mut().zip(line) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render = |line: &[String]| {
        line.iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let header_line: Vec<String> = headers.iter().map(ToString::to_string).collect();
    writeln!(out, "{}", render(&header_line))?;
    writeln!(out, "{}", "-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)))?;
    for line in &cells {
        writeln!(out, "{}", render(line))?;
    }
    writeln!(out, "\n{} row(s)", rows.len())?;
    Ok(())
}
