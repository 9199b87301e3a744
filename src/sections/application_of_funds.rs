use super::{
    SectionCalculator, SectionValues, CENTRAL_GOVT, FVLG, GOVT_PLEDGE_NAME, SDL_PLEDGE_NAME,
    SDL_PORTFOLIOS, STATE_GOVT, TBILL_BUCKETS, TREASURY_BILL,
};
use crate::batch::BatchId;
use crate::error::Result;
use crate::query::{drop_zeros, lakhs_to_crores, sum_by_date, to_crores, DateSeries, TextRule};
use crate::records::{FimmdaVal, SlrNds};
use crate::store::{load, RecordStore};
use chrono::NaiveDate;
use log::debug;
use std::collections::HashMap;

/// Weighted average price per (ISIN, value date), taken from the first
/// valuation row that carries one.
fn wap_index(valuations: &[FimmdaVal]) -> HashMap<(&str, NaiveDate), f64> {
    let mut index = HashMap::new();
    for val in valuations {
        if let Some(wap) = val.wap {
            index
                .entry((val.identification_no.trim(), val.value_date))
                .or_insert(wap);
        }
    }
    index
}

/// Σ(quantity × WAP) per value date, quantities taken as exported.
/// Holdings with no positive quantity, no matching name or no WAP are skipped.
fn valued_at_wap(
    holdings: &[SlrNds],
    waps: &HashMap<(&str, NaiveDate), f64>,
    name: Option<TextRule>,
    quantity: impl Fn(&SlrNds) -> f64,
) -> DateSeries {
    sum_by_date(
        holdings.iter().filter(|h| {
            quantity(h) > 0.0 && name.map_or(true, |rule| rule.test(Some(&h.instrument_name)))
        }),
        |h| Some(h.value_date),
        |h| {
            waps.get(&(h.isin.trim(), h.value_date))
                .map(|wap| quantity(h) * wap)
        },
    )
}

fn encumbered(h: &SlrNds) -> f64 {
    h.repo.unwrap_or(0.0) + h.rbi_refinance.unwrap_or(0.0)
}

/// Book value net of pledge: round((B - P) / 1e7, 2) for every date with a
/// non-zero book value.
fn net_of_pledge(book: DateSeries, pledge: &DateSeries) -> DateSeries {
    drop_zeros(book)
        .into_iter()
        .map(|(date, b)| {
            let p = pledge.get(&date).copied().unwrap_or(0.0);
            (date, to_crores(b - p))
        })
        .collect()
}

/// Government securities and treasury bills held free of encumbrance
/// (2B1a), and the stock lent to RBI (2B1b) and market repo (2B1c).
pub struct ApplicationOfFunds<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> ApplicationOfFunds<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }
}

impl SectionCalculator for ApplicationOfFunds<'_> {
    fn name(&self) -> &'static str {
        "application of funds"
    }

    fn calculate(&self, batch_id: &BatchId) -> Result<SectionValues> {
        let valuations: Vec<FimmdaVal> = load(self.store, batch_id)?;
        let holdings: Vec<SlrNds> = load(self.store, batch_id)?;
        let waps = wap_index(&valuations);
        debug!(
            "Application of funds: {} valuations, {} holdings, {} priced ISIN-dates",
            valuations.len(),
            holdings.len(),
            waps.len()
        );

        let book_value = |category: TextRule,
                          portfolio: TextRule,
                          sub_category: Option<TextRule>| {
            sum_by_date(
                valuations.iter().filter(|val| {
                    category.test(val.category.as_deref())
                        && portfolio.test(Some(&val.portfolio))
                        && sub_category.map_or(true, |rule| rule.test(val.sub_category.as_deref()))
                }),
                |val| Some(val.value_date),
                |val| val.book_value,
            )
        };
        let pledge = |name: TextRule| valued_at_wap(&holdings, &waps, Some(name), encumbered);

        let mut values = SectionValues::new();
        values.insert(
            "2B1a1".to_string(),
            net_of_pledge(book_value(CENTRAL_GOVT, FVLG, None), &pledge(GOVT_PLEDGE_NAME)),
        );
        values.insert(
            "2B1a2".to_string(),
            net_of_pledge(
                book_value(STATE_GOVT, SDL_PORTFOLIOS, None),
                &pledge(SDL_PLEDGE_NAME),
            ),
        );
        for bucket in TBILL_BUCKETS {
            values.insert(
                bucket.code.to_string(),
                net_of_pledge(
                    book_value(TREASURY_BILL, FVLG, Some(bucket.sub_category)),
                    &pledge(bucket.pledge_name),
                ),
            );
        }

        let rbi = valued_at_wap(&holdings, &waps, None, |h| h.rbi_refinance.unwrap_or(0.0));
        let repo = valued_at_wap(&holdings, &waps, None, |h| h.repo.unwrap_or(0.0));
        for (code, stock) in [("2B1b", rbi), ("2B1c", repo)] {
            values.insert(
                code.to_string(),
                stock
                    .into_iter()
                    .map(|(date, v)| (date, lakhs_to_crores(v)))
                    .collect(),
            );
        }

        Ok(values)
    }
}
