use super::{parse_with_layout, FileContext, IngestContext, ParsedFile, SheetSelection, SourceLayout, SourceParser};
use crate::error::{Result, RowError};
use crate::mapper::{ColumnMapping, HeaderRule, MappedRow};
use crate::records::{CanonicalRecord, FimmdaVal, Field, SourceKind};
use crate::workbook::Workbook;

const COLUMNS: ColumnMapping = ColumnMapping(&[
    ("security name", Field::SecurityName),
    ("identification no", Field::IdentificationNo),
    ("isin", Field::IdentificationNo),
    ("instrument id", Field::IdentificationNo),
    ("instrument type", Field::InstrumentType),
    ("category", Field::Category),
    ("sub category", Field::SubCategory),
    ("portfolio", Field::Portfolio),
    ("slr/ nslr", Field::SlrNslr),
    ("slr/nslr", Field::SlrNslr),
    ("issuer", Field::Issuer),
    ("valuation date", Field::ValueDate),
    ("value date", Field::ValueDate),
    ("maturity date", Field::MaturityDate),
    ("quantity", Field::Quantity),
    ("face value", Field::FaceValue),
    ("face value per unit", Field::FaceValuePerUnit),
    ("book value", Field::BookValue),
    ("market value", Field::MarketValue),
    ("market price", Field::MarketPrice),
    ("mp as per valuation", Field::MarketPrice),
    ("wap", Field::Wap),
    ("mduration", Field::ModifiedDuration),
    ("modified duration", Field::ModifiedDuration),
    ("pvbp", Field::Pvbp),
    ("accrued interest", Field::AccruedInterest),
    ("coupon", Field::Coupon),
    ("current yield", Field::CurrentYield),
    ("market yield", Field::MarketYield),
    ("appreciation", Field::Appreciation),
    ("depreciation", Field::Depreciation),
]);

const LAYOUT: SourceLayout = SourceLayout {
    kind: SourceKind::FimmdaVal,
    sheets: SheetSelection::AllExcept(&["summary", "total"]),
    header: HeaderRule(&[&[
        &["security", "isin"],
        &["portfolio"],
        &["book value", "market value"],
    ]]),
    columns: COLUMNS,
    stops_at_end_marker: false,
    skip_sheet: None,
};

/// FIMMDA mark-to-market valuation of the investment book.
pub struct FimmdaParser;

impl SourceParser for FimmdaParser {
    fn kind(&self) -> SourceKind {
        SourceKind::FimmdaVal
    }

    fn parse(&self, workbook: &Workbook, ctx: &IngestContext<'_>) -> Result<ParsedFile> {
        parse_with_layout(&LAYOUT, workbook, ctx, build)
    }
}

fn build(row: &MappedRow, ctx: &FileContext<'_>) -> std::result::Result<CanonicalRecord, RowError> {
    Ok(CanonicalRecord::FimmdaVal(FimmdaVal {
        upload_batch_id: ctx.batch_id.clone(),
        identification_no: row.require_text(Field::IdentificationNo)?,
        portfolio: row.require_text(Field::Portfolio)?,
        value_date: row.date(Field::ValueDate).unwrap_or(ctx.file_value_date),
        security_name: row.text(Field::SecurityName),
        instrument_type: row.text(Field::InstrumentType),
        category: row.text(Field::Category),
        sub_category: row.text(Field::SubCategory),
        slr_nslr: row.text(Field::SlrNslr),
        issuer: row.text(Field::Issuer),
        maturity_date: row.date(Field::MaturityDate),
        quantity: row.number(Field::Quantity),
        face_value: row.number(Field::FaceValue),
        face_value_per_unit: row.number(Field::FaceValuePerUnit),
        book_value: row.number(Field::BookValue),
        market_value: row.number(Field::MarketValue),
        market_price: row.number(Field::MarketPrice),
        wap: row.number(Field::Wap),
        modified_duration: row.number(Field::ModifiedDuration),
        pvbp: row.number(Field::Pvbp),
        accrued_interest: row.number(Field::AccruedInterest),
        coupon: row.number(Field::Coupon),
        current_yield: row.number(Field::CurrentYield),
        market_yield: row.number(Field::MarketYield),
        appreciation: row.number(Field::Appreciation),
        depreciation: row.number(Field::Depreciation),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::test_support::{rows, run};
    use crate::workbook::Sheet;
    use chrono::NaiveDate;

    #[test]
    fn test_value_date_defaults_to_first_dated_row() {
        let workbook = Workbook::from_sheets(vec![Sheet::new(
            "HTM-AFS",
            rows(&[
                &["Security Name", "ISIN", "Portfolio", "Category", "Book Value", "WAP", "Valuation Date"],
                &["7.18% GS 2033", "IN0020230036", "FVLG", "Central Government Bond", "1,00,00,000", "100.25", ""],
                &["7.10% GS 2029", "IN0020220011", "FVLG", "Central Government Bond", "50,00,000", "99.5", "05-Apr-2024"],
            ]),
        )]);

        let parsed = run(&FimmdaParser, &workbook).unwrap();
        let dates: Vec<NaiveDate> = parsed
            .records
            .iter()
            .filter_map(|r| match r {
                CanonicalRecord::FimmdaVal(v) => Some(v.value_date),
                _ => None,
            })
            .collect();
        let expected = NaiveDate::from_ymd_opt(2024, 4, 5).unwrap();
        assert_eq!(dates, vec![expected, expected]);
    }

    #[test]
    fn test_undated_file_uses_ingest_default() {
        let workbook = Workbook::from_sheets(vec![Sheet::new(
            "Valuation",
            rows(&[
                &["ISIN", "Portfolio", "Market Value", "MDuration"],
                &["IN0020230036", "FVSS", "250", "4.5"],
                &["", "FVSS", "100", "1"],
            ]),
        )]);

        let parsed = run(&FimmdaParser, &workbook).unwrap();
        assert_eq!(parsed.rejections.len(), 1);
        let CanonicalRecord::FimmdaVal(val) = &parsed.records[0] else {
            panic!("expected a valuation row");
        };
        assert_eq!(val.value_date, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
        assert_eq!(val.modified_duration, Some(4.5));
    }
}
