use super::{parse_with_layout, FileContext, IngestContext, ParsedFile, SheetSelection, SourceLayout, SourceParser};
use crate::error::{Result, RowError};
use crate::mapper::{ColumnMapping, HeaderRule, MappedRow};
use crate::records::{CanonicalRecord, Field, GSecPrice, SdlPrice, SourceKind};
use crate::workbook::Workbook;

const COLUMNS: ColumnMapping = ColumnMapping(&[
    ("isin", Field::Isin),
    ("description", Field::Description),
    ("coupon", Field::Coupon),
    ("maturity(dd-mmm-yyyy)", Field::MaturityDate),
    ("maturity", Field::MaturityDate),
    ("price(rs)", Field::Price),
    ("price", Field::Price),
    ("ytm% p.a. (semi-annual)", Field::Ytm),
    ("ytm", Field::Ytm),
]);

const HEADER: HeaderRule = HeaderRule(&[&[&["isin"], &["price"], &["maturity"], &["ytm"]]]);

const GSEC_LAYOUT: SourceLayout = SourceLayout {
    kind: SourceKind::GSec,
    sheets: SheetSelection::Named {
        names: &["g-sec"],
        fallback_first: false,
    },
    header: HEADER,
    columns: COLUMNS,
    stops_at_end_marker: false,
    skip_sheet: None,
};

const SDL_LAYOUT: SourceLayout = SourceLayout {
    kind: SourceKind::Sdl,
    sheets: SheetSelection::EachNamed(&["sdl", "uday"]),
    header: HEADER,
    columns: COLUMNS,
    stops_at_end_marker: false,
    skip_sheet: None,
};

/// FIMMDA central government security price list.
pub struct GSecParser;

/// FIMMDA state development loan price list, including UDAY bonds.
pub struct SdlParser;

impl SourceParser for GSecParser {
    fn kind(&self) -> SourceKind {
        SourceKind::GSec
    }

    fn parse(&self, workbook: &Workbook, ctx: &IngestContext<'_>) -> Result<ParsedFile> {
        parse_with_layout(&GSEC_LAYOUT, workbook, ctx, build_gsec)
    }
}

impl SourceParser for SdlParser {
    fn kind(&self) -> SourceKind {
        SourceKind::Sdl
    }

    fn parse(&self, workbook: &Workbook, ctx: &IngestContext<'_>) -> Result<ParsedFile> {
        parse_with_layout(&SDL_LAYOUT, workbook, ctx, build_sdl)
    }
}

fn build_gsec(row: &MappedRow, ctx: &FileContext<'_>) -> std::result::Result<CanonicalRecord, RowError> {
    Ok(CanonicalRecord::GSec(GSecPrice {
        upload_batch_id: ctx.batch_id.clone(),
        isin: row.require_text(Field::Isin)?,
        coupon: row.require_number(Field::Coupon)?,
        price: row.require_number(Field::Price)?,
        description: row.text(Field::Description),
        maturity_date: row.date(Field::MaturityDate),
        ytm: row.number(Field::Ytm),
    }))
}

fn build_sdl(row: &MappedRow, ctx: &FileContext<'_>) -> std::result::Result<CanonicalRecord, RowError> {
    Ok(CanonicalRecord::Sdl(SdlPrice {
        upload_batch_id: ctx.batch_id.clone(),
        isin: row.require_text(Field::Isin)?,
        coupon: row.require_number(Field::Coupon)?,
        price: row.require_number(Field::Price)?,
        description: row.text(Field::Description),
        maturity_date: row.date(Field::MaturityDate),
        ytm: row.number(Field::Ytm),
        segment: ctx.sheet.trim().to_uppercase(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use crate::parsers::test_support::{rows, run};
    use crate::workbook::Sheet;

    const HEADER_ROW: &[&str] = &["ISIN", "Description", "Coupon", "Maturity(dd-mmm-yyyy)", "Price(Rs)", "YTM% p.a. (semi-annual)"];

    #[test]
    fn test_gsec_requires_named_sheet() {
        let workbook = Workbook::from_sheets(vec![Sheet::new("SDL", rows(&[HEADER_ROW]))]);
        let err = run(&GSecParser, &workbook).unwrap_err();
        assert!(matches!(err, ReportError::SheetNotFound { .. }));
    }

    #[test]
    fn test_gsec_rows_need_coupon_and_price() {
        let workbook = Workbook::from_sheets(vec![Sheet::new(
            "G-Sec",
            rows(&[
                HEADER_ROW,
                &["IN0020230036", "7.18% GS 2033", "7.18", "24-Jul-2033", "101.25", "7.01"],
                &["IN0020220011", "7.10% GS 2029", "7.10", "18-Apr-2029", "", "7.05"],
            ]),
        )]);
        let parsed = run(&GSecParser, &workbook).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.rejections[0].reason, RowError::MissingField(Field::Price));
    }

    #[test]
    fn test_sdl_reads_both_segments_and_tolerates_absence() {
        let workbook = Workbook::from_sheets(vec![
            Sheet::new("SDL", rows(&[HEADER_ROW, &["IN1520230011", "MH SDL 2033", "7.4", "01-Jan-2033", "100.1", "7.3"]])),
            Sheet::new("UDAY", rows(&[HEADER_ROW, &["IN2220160019", "UDAY 2031", "8.1", "22-Mar-2031", "103", "7.4"]])),
        ]);
        let parsed = run(&SdlParser, &workbook).unwrap();
        let segments: Vec<String> = parsed
            .records
            .iter()
            .filter_map(|r| match r {
                CanonicalRecord::Sdl(p) => Some(p.segment.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(segments, vec!["SDL", "UDAY"]);

        let only_gsec = Workbook::from_sheets(vec![Sheet::new("G-Sec", rows(&[HEADER_ROW]))]);
        assert!(run(&SdlParser, &only_gsec).unwrap().records.is_empty());
    }
}
