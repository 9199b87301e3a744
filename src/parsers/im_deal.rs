use super::{parse_with_layout, FileContext, IngestContext, ParsedFile, SheetSelection, SourceLayout, SourceParser};
use crate::error::{Result, RowError};
use crate::mapper::{ColumnMapping, HeaderRule, MappedRow};
use crate::records::{CanonicalRecord, Field, ImDeal, SourceKind};
use crate::workbook::Workbook;

const COLUMNS: ColumnMapping = ColumnMapping(&[
    ("security name", Field::SecurityName),
    ("identification no", Field::IdentificationNo),
    ("instrument type", Field::InstrumentType),
    ("portfolio", Field::Portfolio),
    ("deal ref", Field::DealRef),
    ("category", Field::Category),
    ("sub category", Field::SubCategory),
    ("counterparty", Field::Counterparty),
    ("deal date", Field::DealDate),
    ("value date", Field::ValueDate),
    ("maturity date", Field::MaturityDate),
    ("opn type", Field::OpnType),
    ("quantity", Field::Quantity),
    ("mkt nominal val", Field::MarketNominalValue),
    ("price", Field::Price),
    ("rate/yield", Field::RateYield),
    ("book value", Field::BookValue),
    ("accrued interest-days", Field::AccruedInterestDays),
    ("accrued interest-amount", Field::AccruedInterest),
    ("ccy", Field::Currency),
    ("settlement amount", Field::SettlementAmount),
    ("dealer", Field::Dealer),
    ("broker name", Field::BrokerName),
    ("brokerage amount", Field::Brokerage),
    ("holding cost", Field::HoldingCost),
    ("profit/loss", Field::ProfitLoss),
    ("slr/ nslr", Field::SlrNslr),
    ("slr/nslr", Field::SlrNslr),
    ("remarks", Field::Remarks),
]);

const LAYOUT: SourceLayout = SourceLayout {
    kind: SourceKind::ImDeal,
    sheets: SheetSelection::Named {
        names: &["details"],
        fallback_first: false,
    },
    header: HeaderRule(&[&[&["portfolio"], &["category"], &["value date"]]]),
    columns: COLUMNS,
    stops_at_end_marker: false,
    skip_sheet: None,
};

/// Investment-management deal blotter.
pub struct ImDealParser;

impl SourceParser for ImDealParser {
    fn kind(&self) -> SourceKind {
        SourceKind::ImDeal
    }

    fn parse(&self, workbook: &Workbook, ctx: &IngestContext<'_>) -> Result<ParsedFile> {
        parse_with_layout(&LAYOUT, workbook, ctx, build)
    }
}

fn build(row: &MappedRow, ctx: &FileContext<'_>) -> std::result::Result<CanonicalRecord, RowError> {
    Ok(CanonicalRecord::ImDeal(ImDeal {
        upload_batch_id: ctx.batch_id.clone(),
        portfolio: row.require_text(Field::Portfolio)?,
        category: row.require_text(Field::Category)?,
        value_date: row.require_date(Field::ValueDate)?,
        security_name: row.text(Field::SecurityName),
        identification_no: row.text(Field::IdentificationNo),
        instrument_type: row.text(Field::InstrumentType),
        deal_ref: row.text(Field::DealRef),
        sub_category: row.text(Field::SubCategory),
        counterparty: row.text(Field::Counterparty),
        deal_date: row.date(Field::DealDate),
        maturity_date: row.date(Field::MaturityDate),
        opn_type: row.text(Field::OpnType).map(|s| s.to_uppercase()),
        quantity: row.number(Field::Quantity),
        market_nominal_value: row.number(Field::MarketNominalValue),
        price: row.number(Field::Price),
        rate_yield: row.number(Field::RateYield),
        book_value: row.number(Field::BookValue),
        accrued_interest_days: row.integer(Field::AccruedInterestDays),
        accrued_interest: row.number(Field::AccruedInterest),
        currency: row.text(Field::Currency),
        settlement_amount: row.number(Field::SettlementAmount),
        dealer: row.text(Field::Dealer),
        broker_name: row.text(Field::BrokerName),
        brokerage: row.number(Field::Brokerage),
        holding_cost: row.number(Field::HoldingCost),
        profit_loss: row.number(Field::ProfitLoss),
        slr_nslr: row.text(Field::SlrNslr),
        remarks: row.text(Field::Remarks),
    }))
}
