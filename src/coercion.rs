use chrono::{Days, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};

/// A raw spreadsheet cell, before any column semantics are applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Display form used for header detection and text columns.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::Bool(b) => b.to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => {
                let trimmed = s.trim();
                trimmed.is_empty()
                    || trimmed.eq_ignore_ascii_case("blank")
                    || trimmed.eq_ignore_ascii_case("float")
            }
            _ => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Numeric,
    Integer,
    Date,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Typed {
    Number(f64),
    Integer(i64),
    Date(NaiveDate),
    Text(String),
}

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

// Excel's day zero, accounting for the 1900 leap-year bug.
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);
const EXCEL_MAX_SERIAL: f64 = 2_958_465.0;

const FALLBACK_DATE_FORMATS: [&str; 6] = [
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%Y/%m/%d",
    "%d.%m.%Y",
];

/// Converts a raw cell into a typed value for the declared column kind.
///
/// Never fails: blank sentinels and anything unparseable come back as `None`.
pub fn coerce_value(kind: ColumnKind, raw: &Cell) -> Option<Typed> {
    if raw.is_blank() {
        return None;
    }

    match kind {
        ColumnKind::Numeric => parse_number(raw).map(Typed::Number),
        ColumnKind::Integer => parse_integer(raw).map(Typed::Integer),
        ColumnKind::Date => parse_date(raw).map(Typed::Date),
        ColumnKind::Text => {
            let text = raw.as_text().trim().to_string();
            if text.is_empty() {
                None
            } else {
                Some(Typed::Text(text))
            }
        }
    }
}

pub fn parse_number(raw: &Cell) -> Option<f64> {
    match raw {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Text(s) => {
            let cleaned: String = s.chars().filter(|c| *c != ',').collect();
            leading_decimal(cleaned.trim())
        }
        _ => None,
    }
}

pub fn parse_integer(raw: &Cell) -> Option<i64> {
    match raw {
        Cell::Number(n) if n.is_finite() => Some(n.trunc() as i64),
        Cell::Text(s) => {
            let cleaned: String = s.chars().filter(|c| *c != ',').collect();
            leading_integer(cleaned.trim())
        }
        _ => None,
    }
}

pub fn parse_date(raw: &Cell) -> Option<NaiveDate> {
    let parsed = match raw {
        Cell::Date(d) => Some(*d),
        Cell::Number(n) => from_excel_serial(*n),
        Cell::Text(s) => parse_date_str(s.trim()),
        _ => None,
    };

    if parsed.is_none() {
        debug!("Unparseable date value: {:?}", raw);
    }
    parsed
}

/// Renders a date as `DD-Mon-YYYY`, the key format of every report series.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

fn parse_date_str(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }

    // 1. ISO prefix, anything after the first space ignored
    if has_iso_prefix(s) {
        let date_part = s.split(' ').next()?;
        let mut parts = date_part.splitn(3, '-');
        let year = leading_integer(parts.next()?)?;
        let month = leading_integer(parts.next()?)?;
        let day = leading_integer(parts.next()?)?;
        return ymd(year, month, day);
    }

    // 2. Short day-month-year with a named month
    let delimiter = if s.contains('-') {
        Some('-')
    } else if s.contains('/') {
        Some('/')
    } else {
        None
    };
    if let Some(delimiter) = delimiter {
        let parts: Vec<&str> = s.split(delimiter).collect();
        let named_month = parts.len() == 3 && parts[1].chars().any(|c| c.is_alphabetic());
        if s.len() <= 15 && parts.len() == 3 && (delimiter == '-' || named_month) {
            return day_named_month_year(&parts);
        }
    }

    // 3. Numeric month/day/year
    if s.contains('/') && !s.chars().any(|c| c.is_alphabetic()) {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() == 3 {
            let month = leading_integer(parts[0].trim())?;
            let day = leading_integer(parts[1].trim())?;
            let year = expand_year(leading_integer(parts[2].trim())?);
            return ymd(year, month, day);
        }
    }

    // 4. Anything else chrono recognises
    FALLBACK_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
}

fn has_iso_prefix(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit)
}

fn day_named_month_year(parts: &[&str]) -> Option<NaiveDate> {
    let day = leading_integer(parts[0].trim())?;
    let token: String = parts[1].trim().chars().take(3).collect();
    let month = MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(&token))
        .map(|idx| idx as i64 + 1)?;
    let year = expand_year(leading_integer(parts[2].trim())?);
    ymd(year, month, day)
}

fn expand_year(year: i64) -> i64 {
    if (0..100).contains(&year) {
        year + 2000
    } else {
        year
    }
}

fn ymd(year: i64, month: i64, day: i64) -> Option<NaiveDate> {
    let year = i32::try_from(year).ok()?;
    let month = u32::try_from(month).ok()?;
    let day = u32::try_from(day).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn from_excel_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=EXCEL_MAX_SERIAL).contains(&serial) {
        return None;
    }
    let (y, m, d) = EXCEL_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d)?.checked_add_days(Days::new(serial.trunc() as u64))
}

/// Longest numeric prefix of `s`, the way spreadsheet exports tend to
/// trail units or percent signs after the figure.
fn leading_decimal(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }
    if digits == 0 {
        return None;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

fn leading_integer(s: &str) -> Option<i64> {
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digit_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digit_start {
        return None;
    }
    s[..end].parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> Option<String> {
        parse_date(&Cell::text(s)).map(format_date)
    }

    #[test]
    fn test_blank_sentinels_are_null_for_every_kind() {
        let blanks = [
            Cell::Empty,
            Cell::text(""),
            Cell::text("   "),
            Cell::text("blank"),
            Cell::text("float"),
            Cell::text("BLANK"),
        ];
        for kind in [
            ColumnKind::Numeric,
            ColumnKind::Integer,
            ColumnKind::Date,
            ColumnKind::Text,
        ] {
            for cell in &blanks {
                assert_eq!(coerce_value(kind, cell), None, "{:?} {:?}", kind, cell);
            }
        }
    }

    #[test]
    fn test_numeric_strips_thousands_separators() {
        assert_eq!(
            coerce_value(ColumnKind::Numeric, &Cell::text("1,00,00,000.50")),
            Some(Typed::Number(10_000_000.5))
        );
        assert_eq!(
            coerce_value(ColumnKind::Numeric, &Cell::text("99.5%")),
            Some(Typed::Number(99.5))
        );
        assert_eq!(
            coerce_value(ColumnKind::Numeric, &Cell::Number(42.0)),
            Some(Typed::Number(42.0))
        );
        assert_eq!(coerce_value(ColumnKind::Numeric, &Cell::text("n/a")), None);
        assert_eq!(coerce_value(ColumnKind::Numeric, &Cell::text("-")), None);
    }

    #[test]
    fn test_integer_reads_leading_digits() {
        assert_eq!(
            coerce_value(ColumnKind::Integer, &Cell::text("7 Day")),
            Some(Typed::Integer(7))
        );
        assert_eq!(
            coerce_value(ColumnKind::Integer, &Cell::Number(14.0)),
            Some(Typed::Integer(14))
        );
        assert_eq!(coerce_value(ColumnKind::Integer, &Cell::text("Day")), None);
    }

    #[test]
    fn test_text_is_trimmed() {
        assert_eq!(
            coerce_value(ColumnKind::Text, &Cell::text("  FVLG1 ")),
            Some(Typed::Text("FVLG1".to_string()))
        );
        assert_eq!(
            coerce_value(ColumnKind::Text, &Cell::Number(100.0)),
            Some(Typed::Text("100".to_string()))
        );
    }

    #[test]
    fn test_date_cascade_formats() {
        assert_eq!(date("01-Apr-2024").as_deref(), Some("01-Apr-2024"));
        assert_eq!(date("1-apr-2024").as_deref(), Some("01-Apr-2024"));
        assert_eq!(date("01-APRIL-2024").as_deref(), Some("01-Apr-2024"));
        assert_eq!(date("2024-04-01").as_deref(), Some("01-Apr-2024"));
        assert_eq!(date("2024-04-01 10:30:00").as_deref(), Some("01-Apr-2024"));
        assert_eq!(date("2024-04-01T00:00:00Z").as_deref(), Some("01-Apr-2024"));
        assert_eq!(date("04/01/2024").as_deref(), Some("01-Apr-2024"));
        assert_eq!(date("1/Apr/24").as_deref(), Some("01-Apr-2024"));
        assert_eq!(date("1 April 2024").as_deref(), Some("01-Apr-2024"));
    }

    #[test]
    fn test_date_failures_are_whole_value_null() {
        assert_eq!(date("31-Feb-2024"), None);
        assert_eq!(date("15-Abc-2024"), None);
        assert_eq!(date("15-04-2024"), None);
        assert_eq!(date("xx/01/2024"), None);
        assert_eq!(date("not a date"), None);
    }

    #[test]
    fn test_typed_and_serial_dates() {
        let d = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        assert_eq!(parse_date(&Cell::Date(d)), Some(d));
        assert_eq!(parse_date(&Cell::Number(45383.0)), Some(d));
        assert_eq!(parse_date(&Cell::Number(-3.0)), None);
    }

    #[test]
    fn test_format_date_zero_pads_day() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(format_date(d), "05-Mar-2024");
    }
}
