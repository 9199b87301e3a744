use super::{SectionCalculator, SectionValues, CENTRAL_GOVT, FVLG, FVSS, STATE_GOVT, TREASURY_BILL};
use crate::batch::BatchId;
use crate::error::Result;
use crate::query::{round2, DateSeries, TextRule};
use crate::records::FimmdaVal;
use crate::store::{load, RecordStore};
use chrono::NaiveDate;
use std::collections::BTreeMap;

const NON_EQUITY: TextRule = TextRule::Not(&TextRule::Contains("equity"));
const DATED_GOVERNMENT: TextRule = TextRule::AnyOf(&[CENTRAL_GOVT, STATE_GOVT, TREASURY_BILL]);

/// Σ market value and Σ market value × modified duration.
#[derive(Debug, Default, Clone, Copy)]
struct Exposure {
    mv: f64,
    mv_md: f64,
}

fn partition(valuations: &[FimmdaVal], portfolio: TextRule, category: TextRule) -> BTreeMap<NaiveDate, Exposure> {
    let mut by_date: BTreeMap<NaiveDate, Exposure> = BTreeMap::new();
    for val in valuations {
        if !portfolio.test(Some(&val.portfolio)) || !category.test(val.category.as_deref()) {
            continue;
        }
        if let (Some(mv), Some(md)) = (val.market_value, val.modified_duration) {
            let e = by_date.entry(val.value_date).or_default();
            e.mv += mv;
            e.mv_md += mv * md;
        }
    }
    by_date
}

/// Market-value-weighted modified duration over the FVLG and FVSS books.
/// A date present in either book contributes; a zero denominator drops it.
fn weighted_duration(valuations: &[FimmdaVal], category: TextRule) -> DateSeries {
    let mut joined = partition(valuations, FVLG, category);
    for (date, e) in partition(valuations, FVSS, category) {
        let total = joined.entry(date).or_default();
        total.mv += e.mv;
        total.mv_md += e.mv_md;
    }

    joined
        .into_iter()
        .filter(|(_, e)| e.mv != 0.0)
        .map(|(date, e)| (date, round2(e.mv_md / e.mv)))
        .collect()
}

/// Portfolio duration (4A) and dated government securities duration (5A).
pub struct PortfolioDuration<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> PortfolioDuration<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }
}

impl SectionCalculator for PortfolioDuration<'_> {
    fn name(&self) -> &'static str {
        "portfolio duration"
    }

    fn calculate(&self, batch_id: &BatchId) -> Result<SectionValues> {
        let valuations: Vec<FimmdaVal> = load(self.store, batch_id)?;

        let mut values = SectionValues::new();
        values.insert("4A".to_string(), weighted_duration(&valuations, NON_EQUITY));
        values.insert("5A".to_string(), weighted_duration(&valuations, DATED_GOVERNMENT));
        Ok(values)
    }
}
