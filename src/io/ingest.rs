//! CSV ingest of record sets.
//!
//! Expected layout: a `name` column, a `price` column, and any number of
//! property columns. A blank property cell means the record does not declare
//! that property, which is different from declaring it as `0`.
//!
//! Design goals:
//! - **Strict schema** for the required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic order**: records keep file order, properties keep column order
//! - **Case-insensitive headers**: every header is lowercased, so `KM` and `km`
//!   name the same property and may not both appear

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{info, warn};

use crate::domain::{Record, RecordSet};
use crate::error::AppError;

const NAME_COLUMN: &str = "name";
const PRICE_COLUMN: &str = "price";

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub name: Option<String>,
    pub message: String,
}

/// Ingest output: parsed records plus what was skipped.
#[derive(Debug, Clone)]
pub struct IngestedRecords {
    pub records: RecordSet,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

impl IngestedRecords {
    pub fn rows_used(&self) -> usize {
        self.records.len()
    }
}

/// Load records from a CSV file.
pub fn load_records(path: &Path) -> Result<IngestedRecords, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    let ingested = read_records(file)?;
    info!(
        path = %path.display(),
        rows_read = ingested.rows_read,
        rows_used = ingested.rows_used(),
        "records loaded"
    );
    Ok(ingested)
}

/// Parse records from any CSV reader.
pub fn read_records<R: Read>(input: R) -> Result<IngestedRecords, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();

    let header_map = build_header_map(&headers);
    let name_idx = required_column(&header_map, NAME_COLUMN)?;
    let price_idx = required_column(&header_map, PRICE_COLUMN)?;

    // Property columns in file order, keyed by their lowercased names.
    let property_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != name_idx && *idx != price_idx)
        .map(|(idx, name)| (idx, clean_header(name).to_ascii_lowercase()))
        .filter(|(_, name)| !name.is_empty())
        .collect();
    reject_duplicate_columns(&property_columns)?;

    let mut records = RecordSet::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: 1-based lines, and the header occupies line 1.
        let line = idx + 2;
        rows_read += 1;

        let row = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    name: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&row, name_idx, price_idx, &property_columns) {
            Ok(record) => records.push(record),
            Err(message) => {
                warn!(line, %message, "skipping CSV row");
                row_errors.push(RowError {
                    line,
                    name: row.get(name_idx).filter(|s| !s.is_empty()).map(str::to_string),
                    message,
                });
            }
        }
    }

    Ok(IngestedRecords {
        records,
        row_errors,
        rows_read,
    })
}

fn parse_row(
    row: &StringRecord,
    name_idx: usize,
    price_idx: usize,
    property_columns: &[(usize, String)],
) -> Result<Record, String> {
    let name = row
        .get(name_idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "Missing `name` value.".to_string())?;
    let price = row
        .get(price_idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "Missing `price` value.".to_string())
        .and_then(|s| parse_f64(s).ok_or_else(|| format!("Invalid `price` value '{s}'.")))?;

    let mut properties = Vec::with_capacity(property_columns.len());
    for (idx, column) in property_columns {
        let Some(cell) = row.get(*idx).filter(|s| !s.is_empty()) else {
            continue;
        };
        let value = parse_f64(cell).ok_or_else(|| format!("Invalid `{column}` value '{cell}'."))?;
        properties.push((column.clone(), value));
    }

    Ok(Record::new(name, properties, price))
}

fn parse_f64(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (clean_header(name).to_ascii_lowercase(), idx))
        .collect()
}

fn clean_header(name: &str) -> &str {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}')
}

fn reject_duplicate_columns(property_columns: &[(usize, String)]) -> Result<(), AppError> {
    for (pos, (_, name)) in property_columns.iter().enumerate() {
        if property_columns[..pos].iter().any(|(_, earlier)| earlier == name) {
            return Err(AppError::new(
                2,
                format!("Duplicate column `{name}` (headers are case-insensitive)"),
            ));
        }
    }
    Ok(())
}

fn required_column(header_map: &HashMap<String, usize>, column: &str) -> Result<usize, AppError> {
    header_map
        .get(column)
        .copied()
        .ok_or_else(|| AppError::new(2, format!("Missing required column: `{column}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_cells_are_undeclared_properties() {
        let csv = "name,price,km,year\ncar-1,9000,120000,2008\ncar-2,12000,,2012\n";
        let ingested = read_records(csv.as_bytes()).unwrap();
        assert_eq!(ingested.rows_read, 2);
        assert_eq!(ingested.rows_used(), 2);
        assert!(ingested.row_errors.is_empty());

        let records: Vec<&Record> = ingested.records.iter().collect();
        assert_eq!(records[0].property("km"), Some(120000.0));
        assert_eq!(records[1].property("km"), None);
        assert_eq!(records[1].property("year"), Some(2012.0));
        assert_eq!(records[1].price(), 12000.0);
    }

    #[test]
    fn headers_are_matched_case_insensitively_with_bom() {
        let csv = "\u{feff}Name,PRICE,Doors\na,1.5,4\n";
        let ingested = read_records(csv.as_bytes()).unwrap();
        let record = ingested.records.iter().next().unwrap();
        assert_eq!(record.name(), "a");
        assert_eq!(record.property("doors"), Some(4.0));
        assert_eq!(record.property("Doors"), None);
    }

    #[test]
    fn property_headers_differing_only_in_case_are_one_feature() {
        let csv = "name,price,KM
a,9000,120000
";
        let ingested = read_records(csv.as_bytes()).unwrap();
        let names: Vec<&str> = ingested.records.iter().next().unwrap().declared_properties().collect();
        assert_eq!(names, vec!["km"]);

        let err = read_records("name,price,KM,km
a,9000,1,2
".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("Duplicate column `km`"));
    }

    #[test]
    fn bad_rows_are_reported_and_skipped() {
        let csv = "name,price,km\nok,10,1\nbad-price,abc,2\n,5,3\nbad-km,7,x\n";
        let ingested = read_records(csv.as_bytes()).unwrap();
        assert_eq!(ingested.rows_read, 4);
        assert_eq!(ingested.rows_used(), 1);

        let lines: Vec<usize> = ingested.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
        assert_eq!(ingested.row_errors[0].name.as_deref(), Some("bad-price"));
        assert_eq!(ingested.row_errors[1].name, None);
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let err = read_records("name,km\na,1\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("price"));
    }
}
