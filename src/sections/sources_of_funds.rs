use super::repo::MARKET_REPO;
use super::{SectionCalculator, SectionValues};
use crate::batch::BatchId;
use crate::config::ReportConfig;
use crate::error::Result;
use crate::query::{
    drop_zeros, in_crores, restrict_to, sum_by_date, DateSeries, InstrumentMatcher, TextRule,
};
use crate::records::{ImDeal, MmDealOutstanding, RepoDeal};
use crate::store::{load, RecordStore};
use chrono::NaiveDate;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy)]
enum TenorBand {
    Any,
    UpTo14Days,
    Over14Days,
}

impl TenorBand {
    fn admits(&self, tenor: Option<i64>) -> bool {
        match self {
            TenorBand::Any => true,
            TenorBand::UpTo14Days => tenor.is_some_and(|t| t <= 14),
            TenorBand::Over14Days => tenor.is_some_and(|t| t > 14),
        }
    }
}

const CALL: InstrumentMatcher = InstrumentMatcher::new(
    &[
        "CALL BORROWING (NDS)",
        "CALL BORROWING",
        "Call Money Borrowings",
        "CALL MONEY BORROWINGS",
    ],
    TextRule::Sequence(&["CALL", "BORROW"]),
);

const NOTICE: InstrumentMatcher = InstrumentMatcher::new(
    &[
        "NOTICE BORROWING (NDS)",
        "NOTICE BORROWING",
        "Notice Money Borrowings",
        "NOTICE MONEY BORROWINGS",
    ],
    TextRule::Sequence(&["NOTICE", "BORROW"]),
);

const TERM: InstrumentMatcher = InstrumentMatcher::new(
    &[
        "TERM BORROWING (NDS)",
        "TERM BORROWING",
        "Term Money Borrowings",
        "TERM MONEY BORROWINGS",
    ],
    TextRule::Sequence(&["TERM", "BORROW"]),
);

const RBI_REFINANCE: InstrumentMatcher = InstrumentMatcher::new(
    &["RBI - REFINANCE", "RBI-REFINANCE", "RBI REFINANCE", "RBI Refinance"],
    TextRule::Sequence(&["RBI", "REFINANCE"]),
);

const TREPS: InstrumentMatcher = InstrumentMatcher::new(
    &["TREPS BORROWING", "TREPS Borrowing"],
    TextRule::Sequence(&["TREPS", "BORROW"]),
);

const INTER_CORPORATE: InstrumentMatcher = InstrumentMatcher::new(
    &[
        "INTER CORPORATE DEPOSIT BORROWING",
        "Inter Corporate Deposit Borrowing",
        "INTER-CORPORATE DEPOSIT BORROWING",
    ],
    TextRule::Sequence(&["INTER", "CORPORATE", "BORROW"]),
);

const OUTSTANDING_ITEMS: [(&str, InstrumentMatcher, TenorBand); 8] = [
    ("2A2", CALL, TenorBand::Any),
    ("2A3", NOTICE, TenorBand::Any),
    ("2A4", TERM, TenorBand::Any),
    ("2A5", RBI_REFINANCE, TenorBand::Any),
    ("2A7", TREPS, TenorBand::Any),
    ("2A8", INTER_CORPORATE, TenorBand::Any),
    ("2A9", INTER_CORPORATE, TenorBand::UpTo14Days),
    ("2A10", INTER_CORPORATE, TenorBand::Over14Days),
];

/// Borrowed funds outstanding (section 2A), reported only for dates that
/// also carry IM deals.
pub struct SourcesOfFunds<'a> {
    store: &'a dyn RecordStore,
    config: &'a ReportConfig,
}

impl<'a> SourcesOfFunds<'a> {
    pub fn new(store: &'a dyn RecordStore, config: &'a ReportConfig) -> Self {
        Self { store, config }
    }

    fn deal_dates(&self, batch_id: &BatchId) -> Result<BTreeSet<NaiveDate>> {
        let deals: Vec<ImDeal> = load(self.store, batch_id)?;
        Ok(deals.iter().map(|deal| deal.value_date).collect())
    }
}

/// Per date: base-equivalent total, else outstanding-amount total, else 0.
fn outstanding_balance(rows: &[&MmDealOutstanding]) -> DateSeries {
    let mut base: BTreeMap<NaiveDate, Option<f64>> = BTreeMap::new();
    let mut outstanding: BTreeMap<NaiveDate, Option<f64>> = BTreeMap::new();

    for row in rows {
        if row.base_eqvlnt.is_none() && row.outstanding_amount.is_none() {
            continue;
        }
        let b = base.entry(row.date).or_insert(None);
        if let Some(v) = row.base_eqvlnt {
            *b = Some(b.unwrap_or(0.0) + v);
        }
        let o = outstanding.entry(row.date).or_insert(None);
        if let Some(v) = row.outstanding_amount {
            *o = Some(o.unwrap_or(0.0) + v);
        }
    }

    base.into_iter()
        .map(|(date, base_total)| {
            let fallback = outstanding.get(&date).copied().flatten();
            let value = base_total
                .filter(|v| *v != 0.0)
                .or(fallback.filter(|v| *v != 0.0))
                .unwrap_or(0.0);
            (date, value)
        })
        .collect()
}

impl SectionCalculator for SourcesOfFunds<'_> {
    fn name(&self) -> &'static str {
        "sources of funds"
    }

    fn calculate(&self, batch_id: &BatchId) -> Result<SectionValues> {
        let reference_dates = self.deal_dates(batch_id)?;
        let balances: Vec<MmDealOutstanding> = load(self.store, batch_id)?;
        debug!(
            "Sources of funds: {} outstanding rows, {} reference dates",
            balances.len(),
            reference_dates.len()
        );

        let mut values = SectionValues::new();
        for (code, matcher, band) in OUTSTANDING_ITEMS {
            // The tier is chosen over every tenor so the bands partition the total.
            let (matched, tier) = matcher.matching(
                &balances,
                |row| Some(row.instrument_name.as_str()),
                outstanding_balance,
                self.config.pattern_fallback,
            );
            debug!("{} matched via {:?}", code, tier);
            let in_band: Vec<&MmDealOutstanding> = matched
                .into_iter()
                .filter(|row| band.admits(row.tenor))
                .collect();
            let series = outstanding_balance(&in_band);
            values.insert(
                code.to_string(),
                in_crores(restrict_to(series, &reference_dates)),
            );
        }

        let repos: Vec<RepoDeal> = load(self.store, batch_id)?;
        let market_repo = sum_by_date(
            repos.iter().filter(|deal| MARKET_REPO.test(Some(&deal.instrument))),
            |deal| Some(deal.value_date),
            |deal| deal.settlement_amount_leg1,
        );
        values.insert(
            "2A6".to_string(),
            in_crores(restrict_to(drop_zeros(market_repo), &reference_dates)),
        );

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CanonicalRecord, SourceKind};
    use crate::sections::test_support::*;
    use crate::store::MemoryStore;

    fn seed(store: &MemoryStore, im_dates: &[NaiveDate], balances: Vec<MmDealOutstanding>) {
        let deals = im_dates
            .iter()
            .map(|d| CanonicalRecord::from(im_deal(*d, "FVLG", "CENTRAL GOVT BONDS", "BUY", 1.0)))
            .collect();
        store.replace_records(&batch(), SourceKind::ImDeal, deals).unwrap();
        store
            .replace_records(
                &batch(),
                SourceKind::MmDealOutstanding,
                balances.into_iter().map(CanonicalRecord::from).collect(),
            )
            .unwrap();
    }

    #[test]
    fn test_call_borrowing_restricted_to_deal_dates() {
        let store = MemoryStore::new();
        seed(
            &store,
            &[day(3)],
            vec![
                mm_outstanding(day(3), "CALL BORROWING (NDS)", Some(20_000_000.0), None),
                mm_outstanding(day(5), "CALL BORROWING (NDS)", Some(20_000_000.0), None),
            ],
        );
        let config = ReportConfig::default();
        let values = SourcesOfFunds::new(&store, &config).calculate(&batch()).unwrap();

        assert_eq!(values["2A2"][&day(3)], 2.0);
        assert!(!values["2A2"].contains_key(&day(5)));
    }

    #[test]
    fn test_no_deal_dates_means_no_entries() {
        let store = MemoryStore::new();
        seed(
            &store,
            &[],
            vec![mm_outstanding(day(3), "CALL BORROWING (NDS)", Some(20_000_000.0), None)],
        );
        let config = ReportConfig::default();
        let values = SourcesOfFunds::new(&store, &config).calculate(&batch()).unwrap();
        assert!(values["2A2"].is_empty());
    }

    #[test]
    fn test_icd_tenor_bands() {
        let store = MemoryStore::new();
        seed(
            &store,
            &[day(3)],
            vec![
                mm_outstanding(day(3), "INTER CORPORATE DEPOSIT BORROWING", Some(10_000_000.0), Some(7)),
                mm_outstanding(day(3), "INTER CORPORATE DEPOSIT BORROWING", Some(30_000_000.0), Some(90)),
                mm_outstanding(day(3), "INTER CORPORATE DEPOSIT BORROWING", Some(50_000_000.0), None),
            ],
        );
        let config = ReportConfig::default();
        let values = SourcesOfFunds::new(&store, &config).calculate(&batch()).unwrap();

        assert_eq!(values["2A8"][&day(3)], 9.0);
        assert_eq!(values["2A9"][&day(3)], 1.0);
        assert_eq!(values["2A10"][&day(3)], 3.0);
    }

    #[test]
    fn test_icd_bands_share_one_tier_and_skip_lending() {
        let store = MemoryStore::new();
        seed(
            &store,
            &[day(3)],
            vec![
                mm_outstanding(day(3), "INTER CORPORATE DEPOSIT BORROWING", Some(10_000_000.0), Some(30)),
                mm_outstanding(day(3), "INTER CORPORATE DEPOSIT LENDING", Some(5_000_000.0), Some(7)),
                mm_outstanding(day(3), "Inter Corporate Deposit Borrowing - Misc", Some(2_000_000.0), Some(7)),
            ],
        );
        let config = ReportConfig::default();
        let values = SourcesOfFunds::new(&store, &config).calculate(&batch()).unwrap();

        assert_eq!(values["2A8"][&day(3)], 1.0);
        assert!(values["2A9"].is_empty());
        assert_eq!(values["2A10"][&day(3)], 1.0);
        let banded = values["2A9"].get(&day(3)).unwrap_or(&0.0) + values["2A10"][&day(3)];
        assert_eq!(values["2A8"][&day(3)], banded);
    }

    #[test]
    fn test_icd_pattern_requires_borrowing() {
        let store = MemoryStore::new();
        seed(
            &store,
            &[day(3)],
            vec![
                mm_outstanding(day(3), "Inter Corporate Deposit Borrowing - Misc", Some(20_000_000.0), Some(7)),
                mm_outstanding(day(3), "INTER CORPORATE DEPOSIT LENDING", Some(5_000_000.0), Some(7)),
            ],
        );
        let config = ReportConfig::default();
        let values = SourcesOfFunds::new(&store, &config).calculate(&batch()).unwrap();

        assert_eq!(values["2A8"][&day(3)], 2.0);
        assert_eq!(values["2A9"][&day(3)], 2.0);
        assert!(values["2A10"].is_empty());
    }

    #[test]
    fn test_outstanding_amount_fallback() {
        let mut row = mm_outstanding(day(3), "TREPS BORROWING", None, None);
        row.outstanding_amount = Some(15_000_000.0);
        let zero = mm_outstanding(day(3), "RBI - REFINANCE", Some(0.0), None);

        let store = MemoryStore::new();
        seed(&store, &[day(3)], vec![row, zero]);
        let config = ReportConfig::default();
        let values = SourcesOfFunds::new(&store, &config).calculate(&batch()).unwrap();

        assert_eq!(values["2A7"][&day(3)], 1.5);
        assert_eq!(values["2A5"][&day(3)], 0.0);
    }

    #[test]
    fn test_market_repo_settlement() {
        let store = MemoryStore::new();
        seed(&store, &[day(2)], vec![]);
        store
            .replace_records(
                &batch(),
                SourceKind::RepoDeal,
                vec![CanonicalRecord::from(repo_deal(day(2), "market repo", 100_000_000.0, 99.5))],
            )
            .unwrap();
        let config = ReportConfig::default();
        let values = SourcesOfFunds::new(&store, &config).calculate(&batch()).unwrap();
        assert_eq!(values["2A6"][&day(2)], 9.95);
    }
}
