//! Raw tabular input: a header row plus string cells, from either a
//! delimited text file or the first sheet of a workbook.

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};

use crate::RosterError;

/// Delimiters recognized in text rosters, in tie-break order.
const DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// A header row and data rows of trimmed string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterTable {
    /// Header names, trimmed and uppercased.
    pub headers: Vec<String>,
    /// Data rows. Short rows are padded to the header width on lookup.
    pub rows: Vec<Vec<String>>,
}

impl RosterTable {
    /// Index of the first header equal to any of `names`.
    #[must_use]
    pub fn column(&self, names: &[&str]) -> Option<usize> {
        names
            .iter()
            .find_map(|name| self.headers.iter().position(|h| h == name))
    }

    /// Cell text at (`row`, `column`), or `""` when the row is short.
    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map_or("", String::as_str)
    }

    /// Parses delimited text. The delimiter is whichever of `,` `;` or tab
    /// occurs most often in the header line.
    ///
    /// # Errors
    ///
    /// * [`RosterError::Csv`] if the text is not valid CSV
    pub fn from_csv(text: &str) -> Result<Self, RosterError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let delimiter = detect_delimiter(text.lines().next().unwrap_or_default());

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?.iter().map(header_name).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(|c| c.trim().to_owned()).collect());
        }

        log::debug!(
            "Parsed {} CSV rows with delimiter {:?}",
            rows.len(),
            char::from(delimiter)
        );

        Ok(Self { headers, rows })
    }

    /// Reads the first worksheet of an XLSX/XLS/ODS workbook.
    ///
    /// # Errors
    ///
    /// * [`RosterError::Spreadsheet`] if the workbook cannot be opened or read
    /// * [`RosterError::Empty`] if the workbook has no sheets
    pub fn from_workbook(path: &Path) -> Result<Self, RosterError> {
        let mut workbook = open_workbook_auto(path)?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(RosterError::Empty)?;

        let range = workbook.worksheet_range(&sheet_name)?;
        let mut rows = range.rows();

        let headers = rows
            .next()
            .map(|header| header.iter().map(|c| header_name(&cell_text(c))).collect())
            .unwrap_or_default();

        let rows: Vec<Vec<String>> = rows
            .map(|row| row.iter().map(cell_text).collect())
            .collect();

        log::debug!("Read {} rows from sheet {sheet_name}", rows.len());

        Ok(Self { headers, rows })
    }
}

fn header_name(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn detect_delimiter(header_line: &str) -> u8 {
    let mut best = DELIMITERS[0];
    let mut best_count = 0;
    for delimiter in DELIMITERS {
        let count = header_line.bytes().filter(|b| *b == delimiter).count();
        if count > best_count {
            best = delimiter;
            best_count = count;
        }
    }
    best
}

/// Renders a spreadsheet cell as text. Whole floats lose their `.0`.
#[allow(clippy::cast_possible_truncation)]
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_owned(),
        Data::Float(f) if f.fract().abs() < f64::EPSILON && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_semicolon_delimiter() {
        let table = RosterTable::from_csv("gestor;especialista\nJoao;Maria\n").unwrap();
        assert_eq!(table.headers, vec!["GESTOR", "ESPECIALISTA"]);
        assert_eq!(table.cell(0, 1), "Maria");
    }

    #[test]
    fn detects_tab_delimiter() {
        let table = RosterTable::from_csv("A\tB\tC\n1\t2\t3\n").unwrap();
        assert_eq!(table.headers.len(), 3);
        assert_eq!(table.cell(0, 2), "3");
    }

    #[test]
    fn keeps_quoted_commas_together() {
        let table =
            RosterTable::from_csv("UNIDADE,COORDENADAS_CIDADE\nX,\"-16.68,-49.25\"\n").unwrap();
        assert_eq!(table.cell(0, 1), "-16.68,-49.25");
    }

    #[test]
    fn trims_and_uppercases_headers() {
        let table = RosterTable::from_csv("\u{feff} Gestor , cidade_base \na,b\n").unwrap();
        assert_eq!(table.headers, vec!["GESTOR", "CIDADE_BASE"]);
        assert_eq!(table.column(&["CIDADE_BASE"]), Some(1));
        assert_eq!(table.column(&["MISSING", "GESTOR"]), Some(0));
    }

    #[test]
    fn short_rows_read_as_blank() {
        let table = RosterTable::from_csv("A,B,C\n1\n").unwrap();
        assert_eq!(table.cell(0, 0), "1");
        assert_eq!(table.cell(0, 2), "");
        assert_eq!(table.cell(5, 0), "");
    }

    #[test]
    fn renders_cells() {
        assert_eq!(cell_text(&Data::Float(12.0)), "12");
        assert_eq!(cell_text(&Data::Float(-16.68)), "-16.68");
        assert_eq!(cell_text(&Data::String(" x ".to_string())), "x");
        assert_eq!(cell_text(&Data::Empty), "");
    }
}
