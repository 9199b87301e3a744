use crate::coercion::{coerce_value, Cell, Typed};
use crate::error::RowError;
use crate::records::Field;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Static header-text to canonical-field table for one source type.
/// Keys are stored already normalized (lower-case, single-spaced).
#[derive(Debug, Clone, Copy)]
pub struct ColumnMapping(pub &'static [(&'static str, Field)]);

impl ColumnMapping {
    pub fn field_for(&self, header: &str) -> Option<Field> {
        let key = normalize_header(header);
        self.0
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, field)| *field)
    }

    /// Resolves a header row into one optional field per column.
    pub fn resolve(&self, header_row: &[Cell]) -> Vec<Option<Field>> {
        header_row
            .iter()
            .map(|cell| self.field_for(&cell.as_text()))
            .collect()
    }
}

/// Keyword rule for spotting a header row.
///
/// Outer slice: alternatives (any may match). Middle: keyword groups that
/// must all be present. Inner: spellings, any of which satisfies the group.
#[derive(Debug, Clone, Copy)]
pub struct HeaderRule(pub &'static [&'static [&'static [&'static str]]]);

impl HeaderRule {
    pub fn matches(&self, flattened: &str) -> bool {
        self.0.iter().any(|groups| {
            groups
                .iter()
                .all(|spellings| spellings.iter().any(|kw| flattened.contains(kw)))
        })
    }
}

pub fn normalize_header(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Joins a row's cell text with commas and lower-cases it.
pub fn flatten_row(row: &[Cell]) -> String {
    row.iter()
        .map(Cell::as_text)
        .collect::<Vec<_>>()
        .join(",")
        .to_lowercase()
}

pub fn find_header_row(rows: &[Vec<Cell>], rule: &HeaderRule, scan_rows: usize) -> Option<usize> {
    rows.iter()
        .take(scan_rows)
        .position(|row| rule.matches(&flatten_row(row)))
}

pub fn is_empty_row(row: &[Cell]) -> bool {
    row.iter().all(Cell::is_blank)
}

/// One data row after coercion, keyed by canonical field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedRow {
    values: HashMap<Field, Typed>,
}

impl MappedRow {
    pub fn set(&mut self, field: Field, value: Typed) {
        self.values.insert(field, value);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn text(&self, field: Field) -> Option<String> {
        match self.values.get(&field) {
            Some(Typed::Text(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn number(&self, field: Field) -> Option<f64> {
        match self.values.get(&field) {
            Some(Typed::Number(n)) => Some(*n),
            Some(Typed::Integer(i)) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn integer(&self, field: Field) -> Option<i64> {
        match self.values.get(&field) {
            Some(Typed::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn date(&self, field: Field) -> Option<NaiveDate> {
        match self.values.get(&field) {
            Some(Typed::Date(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn require_text(&self, field: Field) -> Result<String, RowError> {
        self.text(field).ok_or(RowError::MissingField(field))
    }

    pub fn require_number(&self, field: Field) -> Result<f64, RowError> {
        self.number(field).ok_or(RowError::MissingField(field))
    }

    pub fn require_date(&self, field: Field) -> Result<NaiveDate, RowError> {
        self.date(field).ok_or(RowError::MissingField(field))
    }
}

/// Coerces every mapped cell of `row`. When two columns feed the same
/// field, the first non-null value is kept.
pub fn map_row(columns: &[Option<Field>], row: &[Cell]) -> MappedRow {
    let mut mapped = MappedRow::default();
    for (field, cell) in columns.iter().zip(row) {
        let Some(field) = field else { continue };
        if mapped.values.contains_key(field) {
            continue;
        }
        if let Some(value) = coerce_value(field.kind(), cell) {
            mapped.set(*field, value);
        }
    }
    mapped
}
