//! Home-base coordinate parsing.
//!
//! Spreadsheets export the combined column as `lat,lon`, often with a
//! leading `'` that forced the cell to text. Separate latitude and
//! longitude columns may use a decimal comma.

use field_radius_roster_models::HomePoint;

/// Parses a combined `"lat,lon"` (or `"'lat,lon"`) cell.
///
/// Each half takes any float form (`-16.`, `.5`, `1e1`). Returns `None`
/// for anything that is not exactly two finite numbers within
/// latitude/longitude range.
#[must_use]
pub fn parse_lat_lon_pair(value: &str) -> Option<HomePoint> {
    let value = value.trim().trim_start_matches('\'');
    let (lat, lon) = value.split_once(',')?;
    if lon.contains(',') {
        return None;
    }
    checked(parse_float(lat)?, parse_float(lon)?)
}

/// Parses separate latitude and longitude cells.
#[must_use]
pub fn parse_lat_lon_columns(lat: &str, lon: &str) -> Option<HomePoint> {
    checked(parse_number(lat)?, parse_number(lon)?)
}

fn parse_number(value: &str) -> Option<f64> {
    parse_float(&value.trim().trim_start_matches('\'').replace(',', "."))
}

fn parse_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn checked(lat: f64, lon: f64) -> Option<HomePoint> {
    ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon))
        .then(|| HomePoint::from_lat_lon(lat, lon))
}
