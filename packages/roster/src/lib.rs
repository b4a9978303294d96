#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Roster loading.
//!
//! Reads the specialist roster from CSV or a spreadsheet, validates the
//! required columns and home coordinates, normalizes every name, and
//! groups rows into one [`SpecialistRecord`] per specialist.
//!
//! Validation is fail-fast: a missing column or an unparseable coordinate
//! rejects the whole upload rather than producing a partial roster.

pub mod coordinates;
pub mod table;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use field_radius_normalize::{NormalizedKey, normalize};
use field_radius_roster_models::{Roster, RosterRow, SpecialistRecord};
use thiserror::Error;

pub use table::RosterTable;

/// Manager column.
pub const COL_MANAGER: &str = "GESTOR";
/// Specialist column.
pub const COL_SPECIALIST: &str = "ESPECIALISTA";
/// Home city column.
pub const COL_HOME_CITY: &str = "CIDADE_BASE";
/// Served unit column.
pub const COL_UNIT: &str = "UNIDADE";
/// Combined `"lat,lon"` coordinate column.
pub const COL_COORDINATES: &str = "COORDENADAS_CIDADE";

const LAT_ALIASES: &[&str] = &["LAT", "LATITUDE"];
const LON_ALIASES: &[&str] = &["LON", "LONG", "LONGITUDE"];

/// Errors that reject a roster upload.
#[derive(Debug, Error)]
pub enum RosterError {
    /// File could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited text could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Workbook could not be opened or read.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// Required columns are absent from the header row.
    #[error("Roster is missing columns: {}", columns.join(", "))]
    MissingColumns {
        /// The absent column names.
        columns: Vec<String>,
    },

    /// A home coordinate could not be parsed.
    #[error(
        "Row {row}: cannot parse coordinate {value:?}; use \"latitude,longitude\" or \"'latitude,longitude\""
    )]
    Coordinate {
        /// 1-based data row.
        row: usize,
        /// The offending cell text.
        value: String,
    },

    /// The roster has no data rows.
    #[error("Roster has no data rows")]
    Empty,

    /// The file extension is not a known roster format.
    #[error("Unsupported roster format: {extension:?}")]
    UnsupportedFormat {
        /// The extension found.
        extension: String,
    },
}

/// Where the home coordinate comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoordinateColumns {
    Combined(usize),
    Separate { lat: usize, lon: usize },
}

/// Resolved indices of every column the loader reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    manager: usize,
    specialist: usize,
    home_city: usize,
    unit: usize,
    coordinates: CoordinateColumns,
}

impl Columns {
    fn resolve(table: &RosterTable) -> Result<Self, RosterError> {
        let manager = table.column(&[COL_MANAGER]);
        let specialist = table.column(&[COL_SPECIALIST]);
        let home_city = table.column(&[COL_HOME_CITY]);
        let unit = table.column(&[COL_UNIT]);
        let coordinates = table.column(&[COL_COORDINATES]).map_or_else(
            || {
                let lat = table.column(LAT_ALIASES)?;
                let lon = table.column(LON_ALIASES)?;
                Some(CoordinateColumns::Separate { lat, lon })
            },
            |i| Some(CoordinateColumns::Combined(i)),
        );

        match (manager, specialist, home_city, unit, coordinates) {
            (Some(manager), Some(specialist), Some(home_city), Some(unit), Some(coordinates)) => {
                Ok(Self {
                    manager,
                    specialist,
                    home_city,
                    unit,
                    coordinates,
                })
            }
            _ => {
                let columns = [
                    (COL_MANAGER, manager.is_some()),
                    (COL_SPECIALIST, specialist.is_some()),
                    (COL_HOME_CITY, home_city.is_some()),
                    (COL_UNIT, unit.is_some()),
                    (COL_COORDINATES, coordinates.is_some()),
                ]
                .into_iter()
                .filter(|(_, present)| !present)
                .map(|(name, _)| name.to_string())
                .collect();
                Err(RosterError::MissingColumns { columns })
            }
        }
    }
}

/// Loads a roster file, choosing the reader from its extension.
///
/// # Errors
///
/// * [`RosterError::UnsupportedFormat`] for unknown extensions
/// * any error of [`load_table`] or the underlying reader
pub fn load_path(path: &Path) -> Result<Roster, RosterError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let table = match extension.as_str() {
        "csv" | "txt" | "tsv" => RosterTable::from_csv(&std::fs::read_to_string(path)?)?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => RosterTable::from_workbook(path)?,
        _ => return Err(RosterError::UnsupportedFormat { extension }),
    };

    log::info!("Loaded roster table from {}", path.display());
    load_table(&table)
}

/// Loads a roster from CSV text.
///
/// # Errors
///
/// See [`load_table`].
pub fn load_csv(text: &str) -> Result<Roster, RosterError> {
    load_table(&RosterTable::from_csv(text)?)
}

/// Validates a table and groups it into specialist records.
///
/// # Errors
///
/// * [`RosterError::MissingColumns`] if a required column is absent
/// * [`RosterError::Coordinate`] on the first unparseable home coordinate
/// * [`RosterError::Empty`] if no non-blank data row remains
pub fn load_table(table: &RosterTable) -> Result<Roster, RosterError> {
    let columns = Columns::resolve(table)?;
    let mut rows = Vec::with_capacity(table.rows.len());

    for (index, cells) in table.rows.iter().enumerate() {
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let row_number = index + 1;
        let cell = |column: usize| table.cell(index, column);

        let home_point = match columns.coordinates {
            CoordinateColumns::Combined(i) => coordinates::parse_lat_lon_pair(cell(i))
                .ok_or_else(|| RosterError::Coordinate {
                    row: row_number,
                    value: cell(i).to_string(),
                })?,
            CoordinateColumns::Separate { lat, lon } => {
                coordinates::parse_lat_lon_columns(cell(lat), cell(lon)).ok_or_else(|| {
                    RosterError::Coordinate {
                        row: row_number,
                        value: format!("{},{}", cell(lat), cell(lon)),
                    }
                })?
            }
        };

        rows.push(RosterRow {
            row_number,
            manager: normalize(cell(columns.manager)),
            specialist: normalize(cell(columns.specialist)),
            home_city: normalize(cell(columns.home_city)),
            home_point,
            unit: normalize(cell(columns.unit)),
            raw_unit: cell(columns.unit).to_string(),
        });
    }

    if rows.is_empty() {
        return Err(RosterError::Empty);
    }

    let specialists = group_rows(&rows);
    log::info!(
        "Roster has {} rows for {} specialists",
        rows.len(),
        specialists.len()
    );

    Ok(Roster { rows, specialists })
}

type GroupKey = (NormalizedKey, NormalizedKey, NormalizedKey, (u64, u64));

/// Groups rows by (manager, specialist, home city, home point), collecting
/// served unit keys into a set. Blank unit cells add no key.
#[must_use]
pub fn group_rows(rows: &[RosterRow]) -> Vec<SpecialistRecord> {
    let mut groups: BTreeMap<GroupKey, SpecialistRecord> = BTreeMap::new();

    for row in rows {
        let key = (
            row.manager.clone(),
            row.specialist.clone(),
            row.home_city.clone(),
            row.home_point.bits(),
        );
        let record = groups.entry(key).or_insert_with(|| SpecialistRecord {
            manager: row.manager.clone(),
            specialist: row.specialist.clone(),
            home_city: row.home_city.clone(),
            home_point: row.home_point,
            served_unit_keys: BTreeSet::new(),
        });
        if !row.unit.is_missing() {
            record.served_unit_keys.insert(row.unit.clone());
        }
    }

    groups.into_values().collect()
}
