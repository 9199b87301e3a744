use crate::coercion::Cell;
use crate::error::{ReportError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use log::debug;
use std::io::Cursor;
use std::path::Path;

/// An uploaded export: original file name plus raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn from_sheets(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// Opens xlsx/xls/xlsb/ods bytes, or CSV when the name says so or the
    /// bytes are plain UTF-8 text that no spreadsheet reader accepts.
    pub fn from_bytes(file_name: &str, bytes: &[u8]) -> Result<Self> {
        if file_name.to_ascii_lowercase().ends_with(".csv") {
            return Self::from_csv(file_name, bytes);
        }

        match Self::from_spreadsheet(bytes) {
            Ok(workbook) => Ok(workbook),
            Err(err) if std::str::from_utf8(bytes).is_ok() => {
                debug!("{} is not a spreadsheet ({}), reading as CSV", file_name, err);
                Self::from_csv(file_name, bytes)
            }
            Err(err) => Err(err),
        }
    }

    fn from_spreadsheet(bytes: &[u8]) -> Result<Self> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
        let names = workbook.sheet_names().to_vec();

        let mut sheets = Vec::with_capacity(names.len());
        for name in names {
            let range = workbook.worksheet_range(&name)?;
            let rows = range
                .rows()
                .map(|row| row.iter().map(convert_cell).collect())
                .collect();
            sheets.push(Sheet::new(name, rows));
        }
        Ok(Self { sheets })
    }

    fn from_csv(file_name: &str, bytes: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(Cell::from).collect());
        }

        let name = Path::new(file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("Sheet1");
        Ok(Self {
            sheets: vec![Sheet::new(name, rows)],
        })
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Case-insensitive, whitespace-trimmed sheet lookup.
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        let wanted = name.trim();
        self.sheets
            .iter()
            .find(|sheet| sheet.name.trim().eq_ignore_ascii_case(wanted))
    }

    pub fn first_sheet(&self) -> Option<&Sheet> {
        self.sheets.first()
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => Cell::Date(datetime.date()),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_bytes_become_single_sheet_named_after_file() {
        let csv = "Portfolio,Category,Value Date\nFVLG1,CENTRAL GOVT BONDS,01-Apr-2024\n";
        let workbook = Workbook::from_bytes("Details.csv", csv.as_bytes()).unwrap();

        assert_eq!(workbook.sheet_names(), vec!["Details"]);
        let sheet = workbook.sheet("details").unwrap();
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[1][0], Cell::text("FVLG1"));
    }

    #[test]
    fn test_unrecognised_text_falls_back_to_csv() {
        let workbook = Workbook::from_bytes("upload.bin", b"a,b\n1,\n").unwrap();
        let sheet = workbook.first_sheet().unwrap();
        assert_eq!(sheet.name, "upload");
        assert_eq!(sheet.rows[1], vec![Cell::text("1"), Cell::Empty]);
    }

    #[test]
    fn test_binary_garbage_is_a_workbook_error() {
        let err = Workbook::from_bytes("upload.xlsx", &[0xff, 0xfe, 0x00, 0x81]).unwrap_err();
        assert!(matches!(err, ReportError::Workbook(_)));
    }

    #[test]
    fn test_sheet_lookup_ignores_case_and_padding() {
        let workbook = Workbook::from_sheets(vec![Sheet::new(" G-Sec ", vec![])]);
        assert!(workbook.sheet("g-sec").is_some());
        assert!(workbook.sheet("sdl").is_none());
    }
}
