use super::{finite, parse_with_layout, FileContext, IngestContext, ParsedFile, SheetSelection, SourceLayout, SourceParser};
use crate::error::{Result, RowError};
use crate::mapper::{ColumnMapping, HeaderRule, MappedRow};
use crate::query::value_at_price;
use crate::records::{CanonicalRecord, Field, RepoDeal, RepoDealOutstanding, SourceKind};
use crate::workbook::Workbook;

const COLUMNS: ColumnMapping = ColumnMapping(&[
    ("deal ref", Field::DealRef),
    ("deal reference", Field::DealRef),
    ("instrument", Field::Instrument),
    ("security name", Field::SecurityName),
    ("isin", Field::Isin),
    ("deal date", Field::DealDate),
    ("value date", Field::ValueDate),
    ("maturity date", Field::MaturityDate),
    ("face value", Field::FaceValue),
    ("leg1 price", Field::Leg1Price),
    ("leg2 price", Field::Leg2Price),
    ("repo rate", Field::Rate),
    ("repo period", Field::Tenor),
    ("settlement amt leg1", Field::SettlementAmountLeg1),
    ("settlement amount leg1", Field::SettlementAmountLeg1),
    ("settlement amt leg2", Field::SettlementAmountLeg2),
    ("settlement amount leg2", Field::SettlementAmountLeg2),
    ("counterparty", Field::Counterparty),
    ("remarks", Field::Remarks),
]);

const OUTSTANDING_COLUMNS: ColumnMapping = ColumnMapping(&[
    ("deal ref", Field::DealRef),
    ("deal reference", Field::DealRef),
    ("instrument", Field::Instrument),
    ("security name", Field::SecurityName),
    ("isin", Field::Isin),
    ("deal date", Field::DealDate),
    ("value date", Field::ValueDate),
    ("maturity date", Field::MaturityDate),
    ("face value", Field::FaceValue),
    ("leg1 price", Field::Leg1Price),
    ("leg2 price", Field::Leg2Price),
    ("repo rate", Field::Rate),
    ("repo period", Field::Tenor),
    ("settlement amt leg1", Field::SettlementAmountLeg1),
    ("settlement amount leg1", Field::SettlementAmountLeg1),
    ("settlement amt leg2", Field::SettlementAmountLeg2),
    ("settlement amount leg2", Field::SettlementAmountLeg2),
    ("base settlement amnt leg1", Field::OutstandingAmountLeg1),
    ("base settlement amnt leg2", Field::OutstandingAmountLeg2),
    ("counterparty", Field::Counterparty),
    ("remarks", Field::Remarks),
]);

const LAYOUT: SourceLayout = SourceLayout {
    kind: SourceKind::RepoDeal,
    sheets: SheetSelection::Named {
        names: &["detail", "details"],
        fallback_first: true,
    },
    header: HeaderRule(&[
        &[&["deal ref", "deal reference"], &["instrument"], &["value date"]],
        &[&["settlement amt leg1"], &["face value"], &["instrument"]],
    ]),
    columns: COLUMNS,
    stops_at_end_marker: true,
    skip_sheet: None,
};

const OUTSTANDING_LAYOUT: SourceLayout = SourceLayout {
    kind: SourceKind::RepoDealOutstanding,
    sheets: SheetSelection::AllExcept(&["summary", "total"]),
    header: HeaderRule(&[&[
        &["instrument"],
        &["value date"],
        &["base settlement", "face value"],
    ]]),
    columns: OUTSTANDING_COLUMNS,
    stops_at_end_marker: true,
    skip_sheet: None,
};

/// Repo / reverse-repo deal register.
pub struct RepoDealParser;

/// Repo deals still open at the reporting date.
pub struct RepoDealOutstandingParser;

impl SourceParser for RepoDealParser {
    fn kind(&self) -> SourceKind {
        SourceKind::RepoDeal
    }

    fn parse(&self, workbook: &Workbook, ctx: &IngestContext<'_>) -> Result<ParsedFile> {
        parse_with_layout(&LAYOUT, workbook, ctx, build_deal)
    }
}

impl SourceParser for RepoDealOutstandingParser {
    fn kind(&self) -> SourceKind {
        SourceKind::RepoDealOutstanding
    }

    fn parse(&self, workbook: &Workbook, ctx: &IngestContext<'_>) -> Result<ParsedFile> {
        parse_with_layout(&OUTSTANDING_LAYOUT, workbook, ctx, build_outstanding)
    }
}

/// Explicit settlement amount, else face value at the leg price.
fn settlement_leg(
    row: &MappedRow,
    explicit: Field,
    price: Field,
) -> std::result::Result<Option<f64>, RowError> {
    if let Some(amount) = row.number(explicit) {
        return Ok(Some(amount));
    }
    match (row.number(Field::FaceValue), row.number(price)) {
        (Some(face), Some(price)) => finite(explicit, value_at_price(face, price)).map(Some),
        _ => Ok(None),
    }
}

fn build_deal(row: &MappedRow, ctx: &FileContext<'_>) -> std::result::Result<CanonicalRecord, RowError> {
    Ok(CanonicalRecord::RepoDeal(RepoDeal {
        upload_batch_id: ctx.batch_id.clone(),
        instrument: row.require_text(Field::Instrument)?,
        value_date: row.require_date(Field::ValueDate)?,
        deal_no: row.text(Field::DealRef),
        security_name: row.text(Field::SecurityName),
        isin: row.text(Field::Isin),
        deal_date: row.date(Field::DealDate),
        maturity_date: row.date(Field::MaturityDate),
        face_value: row.number(Field::FaceValue),
        leg1_price: row.number(Field::Leg1Price),
        leg2_price: row.number(Field::Leg2Price),
        rate: row.number(Field::Rate),
        tenor: row.integer(Field::Tenor),
        settlement_amount_leg1: settlement_leg(row, Field::SettlementAmountLeg1, Field::Leg1Price)?,
        settlement_amount_leg2: settlement_leg(row, Field::SettlementAmountLeg2, Field::Leg2Price)?,
        counterparty: row.text(Field::Counterparty),
        remarks: row.text(Field::Remarks),
    }))
}

fn build_outstanding(row: &MappedRow, ctx: &FileContext<'_>) -> std::result::Result<CanonicalRecord, RowError> {
    let settlement_amount_leg1 = settlement_leg(row, Field::SettlementAmountLeg1, Field::Leg1Price)?;
    Ok(CanonicalRecord::RepoDealOutstanding(RepoDealOutstanding {
        upload_batch_id: ctx.batch_id.clone(),
        value_date: row.require_date(Field::ValueDate)?,
        instrument: row.text(Field::Instrument).map(|s| s.to_uppercase()),
        deal_no: row.text(Field::DealRef),
        security_name: row.text(Field::SecurityName),
        isin: row.text(Field::Isin),
        deal_date: row.date(Field::DealDate),
        maturity_date: row.date(Field::MaturityDate),
        face_value: row.number(Field::FaceValue),
        leg1_price: row.number(Field::Leg1Price),
        leg2_price: row.number(Field::Leg2Price),
        rate: row.number(Field::Rate),
        tenor: row.integer(Field::Tenor),
        settlement_amount_leg1,
        settlement_amount_leg2: settlement_leg(row, Field::SettlementAmountLeg2, Field::Leg2Price)?,
        outstanding_amount_leg1: row.number(Field::OutstandingAmountLeg1).or(settlement_amount_leg1),
        outstanding_amount_leg2: row.number(Field::OutstandingAmountLeg2),
        counterparty: row.text(Field::Counterparty),
        remarks: row.text(Field::Remarks),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::test_support::{rows, run};
    use crate::workbook::Sheet;

    #[test]
    fn test_derives_settlement_legs_and_tenor() {
        let workbook = Workbook::from_sheets(vec![Sheet::new(
            "Sheet1",
            rows(&[
                &["Deal Ref", "Instrument", "Value Date", "Face Value", "Leg1 Price", "Leg2 Price", "Repo Period", "Settlement Amt Leg2"],
                &["R1", "Market Repo", "02-Apr-2024", "100000000", "99.5", "", "1 Day", "99600000"],
            ]),
        )]);

        let parsed = run(&RepoDealParser, &workbook).unwrap();
        let CanonicalRecord::RepoDeal(deal) = &parsed.records[0] else {
            panic!("expected a repo deal");
        };
        assert_eq!(deal.settlement_amount_leg1, Some(99_500_000.0));
        assert_eq!(deal.settlement_amount_leg2, Some(99_600_000.0));
        assert_eq!(deal.tenor, Some(1));
        assert_eq!(deal.instrument, "Market Repo");
    }

    #[test]
    fn test_prefers_detail_sheet() {
        let workbook = Workbook::from_sheets(vec![
            Sheet::new("Cover", rows(&[&["nothing here"]])),
            Sheet::new(
                "Detail",
                rows(&[
                    &["Settlement Amt Leg1", "Face Value", "Instrument", "Value Date"],
                    &["10", "10", "MARKET REVERSE REPO", "2024-04-02"],
                ]),
            ),
        ]);
        let parsed = run(&RepoDealParser, &workbook).unwrap();
        assert_eq!(parsed.records.len(), 1);
    }

    #[test]
    fn test_outstanding_defaults_leg1_and_scans_sheets() {
        let header: &[&str] = &["Instrument", "Value Date", "Face Value", "Leg1 Price"];
        let workbook = Workbook::from_sheets(vec![
            Sheet::new("Repo", rows(&[header, &["market repo", "03-Apr-2024", "1000", "98"]])),
            Sheet::new("Reverse", rows(&[header, &["market reverse repo", "03-Apr-2024", "500", "100"]])),
            Sheet::new("Grand Total", rows(&[header, &["x", "03-Apr-2024", "1", "1"]])),
            Sheet::new("Notes", rows(&[&["prepared by ops"]])),
        ]);

        let parsed = run(&RepoDealOutstandingParser, &workbook).unwrap();
        assert_eq!(parsed.records.len(), 2);
        let CanonicalRecord::RepoDealOutstanding(first) = &parsed.records[0] else {
            panic!("expected an outstanding repo deal");
        };
        assert_eq!(first.instrument.as_deref(), Some("MARKET REPO"));
        assert_eq!(first.outstanding_amount_leg1, Some(980.0));
    }
}
