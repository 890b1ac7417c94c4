use calamine::{Data, Reader};
use chrono::{Duration, NaiveDate};
use indexmap::IndexMap;
use std::io::Cursor;

use crate::error::ImportError;

/// A single parsed cell, as encoded in the source file.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

/// One spreadsheet row: original header string -> cell value, in source
/// column order. Empty cells are absent keys.
pub type RowRecord = IndexMap<String, CellValue>;

/// Convert a spreadsheet serial date (1899-12-30 epoch, the classic 25569-day
/// offset to the Unix epoch) to a calendar date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial as i64))
}

/// Parse an uploaded file into an ordered sequence of row records.
///
/// Dispatches on the file extension: delimited text goes through the csv
/// reader, anything else is opened as a workbook (first sheet only). No
/// validation happens here; the caller reconciles whatever comes out.
pub fn parse_file(filename: &str, bytes: &[u8]) -> Result<Vec<RowRecord>, ImportError> {
    if filename.to_lowercase().ends_with(".csv") {
        parse_csv(bytes)
    } else {
        parse_workbook(bytes)
    }
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<RowRecord>, ImportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| ImportError::Parse(format!("unreadable header row: {e}")))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        // Partial rows pass through as-is; a record the reader cannot
        // decode fails the whole parse.
        let record = result?;
        let mut row = RowRecord::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            if header.is_empty() || field.is_empty() {
                continue;
            }
            row.insert(header.clone(), CellValue::Text(field.to_string()));
        }
        rows.push(row);
    }
    Ok(rows)
}

fn parse_workbook(bytes: &[u8]) -> Result<Vec<RowRecord>, ImportError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::Parse("workbook has no sheets".to_string()))??;

    let mut row_iter = range.rows();
    let headers: Vec<String> = match row_iter.next() {
        Some(header_row) => header_row.iter().map(|c| c.to_string()).collect(),
        None => return Ok(Vec::new()),
    };

    let mut rows = Vec::new();
    for sheet_row in row_iter {
        let mut row = RowRecord::new();
        for (header, cell) in headers.iter().zip(sheet_row.iter()) {
            if header.is_empty() {
                continue;
            }
            let value = match cell {
                Data::String(s) => CellValue::Text(s.clone()),
                Data::Float(f) => CellValue::Number(*f),
                Data::Int(i) => CellValue::Number(*i as f64),
                Data::Bool(b) => CellValue::Text(b.to_string()),
                Data::DateTime(dt) => match excel_serial_to_date(dt.as_f64()) {
                    Some(date) => CellValue::Date(date),
                    None => CellValue::Number(dt.as_f64()),
                },
                Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
                Data::Empty | Data::Error(_) => continue,
            };
            row.insert(header.clone(), value);
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excel_serial_to_date() {
        assert_eq!(
            excel_serial_to_date(45000.0),
            NaiveDate::from_ymd_opt(2023, 3, 15)
        );
        // 25569 days after 1899-12-30 is the Unix epoch.
        assert_eq!(
            excel_serial_to_date(25569.0),
            NaiveDate::from_ymd_opt(1970, 1, 1)
        );
    }

    #[test]
    fn test_parse_csv_preserves_headers_and_order() {
        let data = b"Invoice Number,Invoice Date,Item Rate\nINV-1,2024-04-01,100\nINV-2,2024-04-02,250\n";
        let rows = parse_file("import.csv", data).unwrap();
        assert_eq!(rows.len(), 2);
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, ["Invoice Number", "Invoice Date", "Item Rate"]);
        assert_eq!(
            rows[0].get("Invoice Number"),
            Some(&CellValue::Text("INV-1".to_string()))
        );
        assert_eq!(
            rows[1].get("Item Rate"),
            Some(&CellValue::Text("250".to_string()))
        );
    }

    #[test]
    fn test_parse_csv_empty_cells_become_absent_keys() {
        let data = b"Invoice Number,Subject,Notes\nINV-1,,late fee\n";
        let rows = parse_file("import.csv", data).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].get("Subject").is_none());
        assert!(rows[0].get("Notes").is_some());
    }

    #[test]
    fn test_parse_csv_partial_rows_pass_through() {
        let data = b"Invoice Number,Invoice Date,Item Rate\nINV-1,2024-04-01\n";
        let rows = parse_file("import.csv", data).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 2);
        assert!(rows[0].get("Item Rate").is_none());
    }

    #[test]
    fn test_parse_csv_undecodable_record_is_an_error() {
        let mut data = b"Invoice Number,Invoice Date\nINV-1,2024-04-01\n".to_vec();
        data.extend_from_slice(b"INV-\xFF2,2024-04-02\n");
        let err = parse_file("import.csv", &data).unwrap_err();
        assert!(matches!(err, ImportError::Csv(_)));
    }

    #[test]
    fn test_parse_garbage_workbook_fails() {
        let err = parse_file("import.xlsx", b"not a workbook").unwrap_err();
        assert!(matches!(
            err,
            ImportError::Workbook(_) | ImportError::Parse(_)
        ));
    }
}
