use super::{finite, parse_with_layout, FileContext, IngestContext, ParsedFile, SheetSelection, SourceLayout, SourceParser};
use crate::error::{Result, RowError};
use crate::mapper::{ColumnMapping, HeaderRule, MappedRow};
use crate::records::{CanonicalRecord, Field, SlrNds, SourceKind};
use crate::workbook::Workbook;

const COLUMNS: ColumnMapping = ColumnMapping(&[
    ("instrument name", Field::InstrumentName),
    ("instrument", Field::InstrumentName),
    ("isin", Field::Isin),
    ("value date", Field::ValueDate),
    ("as on date", Field::ValueDate),
    ("own stock", Field::OwnStock),
    ("repo", Field::Repo),
    ("rbi refinance", Field::RbiRefinance),
    ("collateral", Field::Collateral),
    ("lien", Field::Lien),
    ("sgf", Field::Sgf),
    ("derivative", Field::Derivative),
    ("treps", Field::Treps),
    ("deflt", Field::Deflt),
    ("total pledged", Field::TotalPledged),
    ("net position", Field::NetPosition),
]);

const LAYOUT: SourceLayout = SourceLayout {
    kind: SourceKind::SlrNds,
    sheets: SheetSelection::First,
    header: HeaderRule(&[&[&["isin"], &["instrument"], &["repo", "own stock"]]]),
    columns: COLUMNS,
    stops_at_end_marker: false,
    skip_sheet: None,
};

const PLEDGE_COMPONENTS: [Field; 8] = [
    Field::Repo,
    Field::RbiRefinance,
    Field::Collateral,
    Field::Lien,
    Field::Sgf,
    Field::Derivative,
    Field::Treps,
    Field::Deflt,
];

/// SLR/NDS holding statement: own stock and encumbrances per ISIN, in lakhs.
pub struct SlrNdsParser;

impl SourceParser for SlrNdsParser {
    fn kind(&self) -> SourceKind {
        SourceKind::SlrNds
    }

    fn parse(&self, workbook: &Workbook, ctx: &IngestContext<'_>) -> Result<ParsedFile> {
        parse_with_layout(&LAYOUT, workbook, ctx, build)
    }
}

fn build(row: &MappedRow, ctx: &FileContext<'_>) -> std::result::Result<CanonicalRecord, RowError> {
    let isin = row.require_text(Field::Isin)?;
    let instrument_name = row.require_text(Field::InstrumentName)?;
    let own_stock = row.number(Field::OwnStock);

    let total_pledged = match row.number(Field::TotalPledged) {
        Some(total) => total,
        None => {
            let sum = PLEDGE_COMPONENTS
                .iter()
                .filter_map(|field| row.number(*field))
                .sum();
            finite(Field::TotalPledged, sum)?
        }
    };
    let net_position = match row.number(Field::NetPosition) {
        Some(net) => net,
        None => finite(Field::NetPosition, own_stock.unwrap_or(0.0) - total_pledged)?,
    };

    Ok(CanonicalRecord::SlrNds(SlrNds {
        upload_batch_id: ctx.batch_id.clone(),
        isin,
        instrument_name,
        value_date: row.date(Field::ValueDate).unwrap_or(ctx.file_value_date),
        own_stock,
        repo: row.number(Field::Repo),
        rbi_refinance: row.number(Field::RbiRefinance),
        collateral: row.number(Field::Collateral),
        lien: row.number(Field::Lien),
        sgf: row.number(Field::Sgf),
        derivative: row.number(Field::Derivative),
        treps: row.number(Field::Treps),
        deflt: row.number(Field::Deflt),
        total_pledged,
        net_position,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use crate::parsers::test_support::{rows, run};
    use crate::workbook::Sheet;

    #[test]
    fn test_derives_pledge_totals() {
        let workbook = Workbook::from_sheets(vec![Sheet::new(
            "NDS",
            rows(&[
                &["Instrument Name", "ISIN", "Own Stock", "Repo", "RBI Refinance", "Collateral", "Lien", "SGF", "Derivative", "TREPS", "Deflt"],
                &["GOI 7.18% 2033", "IN0020230036", "1000", "200", "50", "10", "", "5", "", "25", "blank"],
            ]),
        )]);

        let parsed = run(&SlrNdsParser, &workbook).unwrap();
        let CanonicalRecord::SlrNds(holding) = &parsed.records[0] else {
            panic!("expected an SLR row");
        };
        assert_eq!(holding.total_pledged, 290.0);
        assert_eq!(holding.net_position, 710.0);
        assert_eq!(holding.lien, None);
    }

    #[test]
    fn test_explicit_totals_win() {
        let workbook = Workbook::from_sheets(vec![Sheet::new(
            "NDS",
            rows(&[
                &["Instrument Name", "ISIN", "Own Stock", "Repo", "Total Pledged", "Net Position"],
                &["GOI 2033", "IN0020230036", "1000", "200", "300", "700"],
            ]),
        )]);
        let parsed = run(&SlrNdsParser, &workbook).unwrap();
        let CanonicalRecord::SlrNds(holding) = &parsed.records[0] else {
            panic!("expected an SLR row");
        };
        assert_eq!(holding.total_pledged, 300.0);
        assert_eq!(holding.net_position, 700.0);
    }

    #[test]
    fn test_first_sheet_header_required() {
        let workbook = Workbook::from_sheets(vec![
            Sheet::new("Cover", rows(&[&["SLR statement"]])),
            Sheet::new("NDS", rows(&[&["Instrument Name", "ISIN", "Repo"]])),
        ]);
        let err = run(&SlrNdsParser, &workbook).unwrap_err();
        assert!(matches!(err, ReportError::HeaderNotFound { .. }));
    }
}
