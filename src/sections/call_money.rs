use super::{SectionCalculator, SectionValues};
use crate::batch::BatchId;
use crate::config::ReportConfig;
use crate::error::Result;
use crate::query::{drop_zeros, in_crores, sum_by_date, InstrumentMatcher, TextRule};
use crate::records::MmDeal;
use crate::store::{load, RecordStore};
use log::debug;

const BORROWING: InstrumentMatcher = InstrumentMatcher::new(
    &[
        "CALL BORROWING (NDS)",
        "NOTICE BORROWING (NDS)",
        "TERM BORROWING (NDS)",
        "CALL BORROWING",
        "NOTICE BORROWING",
        "TERM BORROWING",
    ],
    TextRule::AnyOf(&[
        TextRule::Sequence(&["CALL", "BORROW"]),
        TextRule::Sequence(&["NOTICE", "BORROW"]),
        TextRule::Sequence(&["TERM", "BORROW"]),
    ]),
);

/// Call, notice and term money borrowed during the period (1D1).
pub struct CallMoney<'a> {
    store: &'a dyn RecordStore,
    config: &'a ReportConfig,
}

impl<'a> CallMoney<'a> {
    pub fn new(store: &'a dyn RecordStore, config: &'a ReportConfig) -> Self {
        Self { store, config }
    }
}

impl SectionCalculator for CallMoney<'_> {
    fn name(&self) -> &'static str {
        "call money"
    }

    fn calculate(&self, batch_id: &BatchId) -> Result<SectionValues> {
        let deals: Vec<MmDeal> = load(self.store, batch_id)?;

        let (series, tier) = BORROWING.select(
            &deals,
            |deal| Some(deal.instrument_name.as_str()),
            |rows| {
                sum_by_date(
                    rows.iter().copied(),
                    |deal| Some(deal.value_date),
                    |deal| deal.base_eqvlnt,
                )
            },
            self.config.pattern_fallback,
        );
        debug!("1D1 matched via {:?}", tier);

        let mut values = SectionValues::new();
        // Zero dates are dropped only once the tier is settled.
        values.insert("1D1".to_string(), in_crores(drop_zeros(series)));
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CanonicalRecord, SourceKind};
    use crate::sections::test_support::*;
    use crate::store::MemoryStore;

    fn store_with(deals: Vec<MmDeal>) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .replace_records(
                &batch(),
                SourceKind::MmDeal,
                deals.into_iter().map(CanonicalRecord::from).collect(),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_exact_labels_ignore_pattern_matches() {
        let store = store_with(vec![
            mm_deal(day(3), "CALL BORROWING (NDS)", 20_000_000.0),
            mm_deal(day(3), "TERM BORROWING", 10_000_000.0),
            mm_deal(day(4), "Call Money Borrowing - Misc", 40_000_000.0),
            mm_deal(day(3), "CALL LENDING", 90_000_000.0),
        ]);
        let config = ReportConfig::default();
        let with_fallback = CallMoney::new(&store, &config).calculate(&batch()).unwrap();

        let strict = ReportConfig {
            pattern_fallback: false,
            ..ReportConfig::default()
        };
        let without_fallback = CallMoney::new(&store, &strict).calculate(&batch()).unwrap();

        assert_eq!(with_fallback, without_fallback);
        assert_eq!(with_fallback["1D1"].len(), 1);
        assert_eq!(with_fallback["1D1"][&day(3)], 3.0);
    }

    #[test]
    fn test_exact_labels_summing_to_zero_still_win() {
        let store = store_with(vec![
            mm_deal(day(3), "CALL BORROWING", 20_000_000.0),
            mm_deal(day(3), "CALL BORROWING", -20_000_000.0),
            mm_deal(day(3), "Call Money Borrowing - Misc", 40_000_000.0),
        ]);
        let config = ReportConfig::default();
        let values = CallMoney::new(&store, &config).calculate(&batch()).unwrap();
        assert!(values["1D1"].is_empty());
    }

    #[test]
    fn test_pattern_used_when_no_exact_label() {
        let store = store_with(vec![
            mm_deal(day(4), "Call Money Borrowing - Misc", 40_000_000.0),
            mm_deal(day(4), "CALL LENDING", 90_000_000.0),
        ]);
        let config = ReportConfig::default();
        let values = CallMoney::new(&store, &config).calculate(&batch()).unwrap();
        assert_eq!(values["1D1"][&day(4)], 4.0);
    }
}
