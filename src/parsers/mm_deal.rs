use super::{parse_with_layout, FileContext, IngestContext, ParsedFile, SheetSelection, SourceLayout, SourceParser};
use crate::coercion::Cell;
use crate::error::{Result, RowError};
use crate::mapper::{normalize_header, ColumnMapping, HeaderRule, MappedRow};
use crate::records::{CanonicalRecord, Field, MmDeal, MmDealOutstanding, SourceKind};
use crate::workbook::{Sheet, Workbook};

const HEADER: HeaderRule = HeaderRule(&[
    &[
        &["instrument name", "deal ref"],
        &["value date", "date"],
        &["base eqvlnt", "principal"],
    ],
    &[&["base eqvlnt(acpt-plc)", "base eqvlnt (acpt-plc)"]],
    &[&["instrument name"], &["counterparty"]],
]);

const SHEETS: SheetSelection = SheetSelection::AllExcept(&["summary", "total"]);

const COLUMNS: ColumnMapping = ColumnMapping(&[
    ("deal ref", Field::DealRef),
    ("deal reference", Field::DealRef),
    ("instrument name", Field::InstrumentName),
    ("instrument type", Field::InstrumentType),
    ("deal date", Field::DealDate),
    ("value date", Field::ValueDate),
    ("maturity date", Field::MaturityDate),
    ("principal amt(acpt-plc)", Field::Principal),
    ("principal amt (acpt-plc)", Field::Principal),
    ("principal amount", Field::Principal),
    ("deal rate", Field::Rate),
    ("tenor", Field::Tenor),
    ("base eqvlnt(acpt-plc)", Field::BaseEqvlnt),
    ("base eqvlnt (acpt-plc)", Field::BaseEqvlnt),
    ("base equivalent", Field::BaseEqvlnt),
    ("counterparty", Field::Counterparty),
    ("deal status", Field::Status),
    ("remarks", Field::Remarks),
]);

const OUTSTANDING_COLUMNS: ColumnMapping = ColumnMapping(&[
    ("date", Field::Date),
    ("deal ref", Field::DealRef),
    ("deal reference", Field::DealRef),
    ("dealer", Field::Dealer),
    ("counterparty", Field::Counterparty),
    ("portfolio", Field::Portfolio),
    ("instrument name", Field::InstrumentName),
    ("instrument type", Field::InstrumentType),
    ("instrument category", Field::InstrumentCategory),
    ("deal date", Field::DealDate),
    ("value date", Field::ValueDate),
    ("tenor", Field::Tenor),
    ("maturity date", Field::MaturityDate),
    ("operation type", Field::OperationType),
    ("deal crncy", Field::Currency),
    ("interest practice", Field::InterestPractice),
    ("interest basis", Field::InterestBasis),
    ("benchmark", Field::Benchmark),
    ("spread", Field::Spread),
    ("deal rate", Field::Rate),
    ("principal amt(acpt-plc)", Field::Principal),
    ("principal amt (acpt-plc)", Field::Principal),
    ("base eqvlnt(acpt-plc)", Field::BaseEqvlnt),
    ("base eqvlnt (acpt-plc)", Field::BaseEqvlnt),
    ("interest amount", Field::InterestAmount),
    ("(principal + interest)", Field::PrincipalPlusInterest),
    ("deal status", Field::Status),
    ("remarks", Field::Remarks),
    ("last interest date", Field::LastInterestDate),
    ("next interest date", Field::NextInterestDate),
    ("accrued interest", Field::AccruedInterest),
    ("outstanding amount", Field::OutstandingAmount),
]);

const LAYOUT: SourceLayout = SourceLayout {
    kind: SourceKind::MmDeal,
    sheets: SHEETS,
    header: HEADER,
    columns: COLUMNS,
    stops_at_end_marker: false,
    skip_sheet: Some(is_outstanding_sheet),
};

const OUTSTANDING_LAYOUT: SourceLayout = SourceLayout {
    kind: SourceKind::MmDealOutstanding,
    sheets: SHEETS,
    header: HEADER,
    columns: OUTSTANDING_COLUMNS,
    stops_at_end_marker: false,
    skip_sheet: None,
};

/// An outstanding-balances sheet inside a deal workbook: "outstanding" in the
/// sheet name or a header, or a bare "Date" column.
fn is_outstanding_sheet(sheet: &Sheet, header: &[Cell]) -> bool {
    sheet.name.to_lowercase().contains("outstanding")
        || header.iter().map(|cell| normalize_header(&cell.as_text())).any(|h| {
            h == "date" || h.contains("outstanding")
        })
}

/// Money-market deals (call, notice, term, CBLO/TREPS, ICD).
pub struct MmDealParser;

/// Money-market balances outstanding per reporting date.
pub struct MmDealOutstandingParser;

impl SourceParser for MmDealParser {
    fn kind(&self) -> SourceKind {
        SourceKind::MmDeal
    }

    fn parse(&self, workbook: &Workbook, ctx: &IngestContext<'_>) -> Result<ParsedFile> {
        parse_with_layout(&LAYOUT, workbook, ctx, build_deal)
    }
}

impl SourceParser for MmDealOutstandingParser {
    fn kind(&self) -> SourceKind {
        SourceKind::MmDealOutstanding
    }

    fn parse(&self, workbook: &Workbook, ctx: &IngestContext<'_>) -> Result<ParsedFile> {
        parse_with_layout(&OUTSTANDING_LAYOUT, workbook, ctx, build_outstanding)
    }
}

fn build_deal(row: &MappedRow, ctx: &FileContext<'_>) -> std::result::Result<CanonicalRecord, RowError> {
    Ok(CanonicalRecord::MmDeal(MmDeal {
        upload_batch_id: ctx.batch_id.clone(),
        instrument_name: row.require_text(Field::InstrumentName)?,
        value_date: row.require_date(Field::ValueDate)?,
        deal_no: row.text(Field::DealRef),
        instrument_type: row.text(Field::InstrumentType),
        deal_date: row.date(Field::DealDate),
        maturity_date: row.date(Field::MaturityDate),
        principal: row.number(Field::Principal),
        rate: row.number(Field::Rate),
        tenor: row.integer(Field::Tenor),
        base_eqvlnt: row.number(Field::BaseEqvlnt),
        counterparty: row.text(Field::Counterparty),
        status: row.text(Field::Status),
        remarks: row.text(Field::Remarks),
    }))
}

fn build_outstanding(row: &MappedRow, ctx: &FileContext<'_>) -> std::result::Result<CanonicalRecord, RowError> {
    let instrument_name = row.require_text(Field::InstrumentName)?;
    let value_date = row.date(Field::ValueDate);
    let date = row
        .date(Field::Date)
        .or(value_date)
        .ok_or(RowError::MissingField(Field::Date))?;
    let base_eqvlnt = row.number(Field::BaseEqvlnt);

    Ok(CanonicalRecord::MmDealOutstanding(MmDealOutstanding {
        upload_batch_id: ctx.batch_id.clone(),
        date,
        instrument_name,
        value_date,
        base_eqvlnt,
        outstanding_amount: row.number(Field::OutstandingAmount).or(base_eqvlnt),
        deal_no: row.text(Field::DealRef),
        dealer: row.text(Field::Dealer),
        counterparty: row.text(Field::Counterparty),
        portfolio: row.text(Field::Portfolio),
        instrument_type: row.text(Field::InstrumentType),
        instrument_category: row.text(Field::InstrumentCategory),
        deal_date: row.date(Field::DealDate),
        tenor: row.integer(Field::Tenor),
        maturity_date: row.date(Field::MaturityDate),
        operation_type: row.text(Field::OperationType),
        currency: row.text(Field::Currency),
        interest_practice: row.text(Field::InterestPractice),
        interest_basis: row.text(Field::InterestBasis),
        benchmark: row.text(Field::Benchmark),
        spread: row.number(Field::Spread),
        rate: row.number(Field::Rate),
        principal: row.number(Field::Principal),
        interest_amount: row.number(Field::InterestAmount),
        principal_plus_interest: row.number(Field::PrincipalPlusInterest),
        status: row.text(Field::Status),
        remarks: row.text(Field::Remarks),
        last_interest_date: row.date(Field::LastInterestDate),
        next_interest_date: row.date(Field::NextInterestDate),
        accrued_interest: row.number(Field::AccruedInterest),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::test_support::{rows, run};
    use chrono::NaiveDate;

    #[test]
    fn test_mm_deal_across_sheets() {
        let header: &[&str] = &["Deal Ref", "Instrument Name", "Value Date", "Base Eqvlnt(Acpt-Plc)", "Tenor"];
        let workbook = Workbook::from_sheets(vec![
            Sheet::new("Call", rows(&[header, &["M1", "CALL BORROWING (NDS)", "03-Apr-2024", "20,000,000", "1"]])),
            Sheet::new("Term", rows(&[header, &["M2", "TERM BORROWING", "03-Apr-2024", "5,000,000", "30"]])),
            Sheet::new("Summary", rows(&[header, &["M3", "CALL BORROWING", "03-Apr-2024", "1", "1"]])),
        ]);

        let parsed = run(&MmDealParser, &workbook).unwrap();
        assert_eq!(parsed.records.len(), 2);
        let CanonicalRecord::MmDeal(second) = &parsed.records[1] else {
            panic!("expected an MM deal");
        };
        assert_eq!(second.tenor, Some(30));
        assert_eq!(second.base_eqvlnt, Some(5_000_000.0));
    }

    #[test]
    fn test_deal_parser_leaves_outstanding_sheets_alone() {
        let deals: &[&str] = &["Deal Ref", "Instrument Name", "Value Date", "Base Eqvlnt(Acpt-Plc)"];
        let workbook = Workbook::from_sheets(vec![
            Sheet::new("Deals", rows(&[deals, &["M1", "CALL BORROWING", "03-Apr-2024", "20,000,000"]])),
            Sheet::new(
                "Outstanding",
                rows(&[deals, &["M2", "CALL BORROWING", "03-Apr-2024", "9,000,000"]]),
            ),
            Sheet::new(
                "Balances",
                rows(&[
                    &["Date", "Deal Ref", "Instrument Name", "Base Eqvlnt(Acpt-Plc)"],
                    &["03-Apr-2024", "M3", "CALL BORROWING", "7,000,000"],
                ]),
            ),
            Sheet::new(
                "Book",
                rows(&[
                    &["Deal Ref", "Instrument Name", "Value Date", "Base Eqvlnt(Acpt-Plc)", "Outstanding Amount"],
                    &["M4", "CALL BORROWING", "03-Apr-2024", "1", "1"],
                ]),
            ),
        ]);

        let parsed = run(&MmDealParser, &workbook).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.total_rows, 1);

        let outstanding = run(&MmDealOutstandingParser, &workbook).unwrap();
        assert_eq!(outstanding.records.len(), 4);
    }

    #[test]
    fn test_outstanding_synthesizes_date_and_amount() {
        let workbook = Workbook::from_sheets(vec![Sheet::new(
            "Outstanding",
            rows(&[
                &["Instrument Name", "Value Date", "Counterparty", "Base Eqvlnt(Acpt-Plc)"],
                &["CALL BORROWING (NDS)", "03-Apr-2024", "SBI", "20000000"],
                &["", "03-Apr-2024", "SBI", "1"],
            ]),
        )]);

        let parsed = run(&MmDealOutstandingParser, &workbook).unwrap();
        assert_eq!(parsed.total_rows, 2);
        assert_eq!(parsed.rejections.len(), 1);
        let CanonicalRecord::MmDealOutstanding(row) = &parsed.records[0] else {
            panic!("expected an outstanding MM deal");
        };
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 4, 3).unwrap());
        assert_eq!(row.outstanding_amount, Some(20_000_000.0));
    }
}
