use super::{
    SectionCalculator, SectionValues, ANY_DTB, CENTRAL_GOVT, FVLG, GOVT_PLEDGE_NAME,
    SDL_PLEDGE_NAME, SDL_PORTFOLIOS, STATE_GOVT, TREASURY_BILL,
};
use crate::batch::BatchId;
use crate::error::Result;
use crate::query::{drop_zeros, sum_by_date, to_crores, TextRule};
use crate::records::{FimmdaVal, SlrNds};
use crate::store::{load, RecordStore};

/// (code, category, portfolios, SLR instrument-name rule)
const POSITIONS: [(&str, TextRule, TextRule, TextRule); 3] = [
    ("3A", TREASURY_BILL, FVLG, ANY_DTB),
    ("3B", CENTRAL_GOVT, FVLG, GOVT_PLEDGE_NAME),
    ("3C", STATE_GOVT, SDL_PORTFOLIOS, SDL_PLEDGE_NAME),
];

/// Face value held less everything pledged against it (section 3).
pub struct StockPosition<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> StockPosition<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }
}

impl SectionCalculator for StockPosition<'_> {
    fn name(&self) -> &'static str {
        "stock position"
    }

    fn calculate(&self, batch_id: &BatchId) -> Result<SectionValues> {
        let valuations: Vec<FimmdaVal> = load(self.store, batch_id)?;
        let holdings: Vec<SlrNds> = load(self.store, batch_id)?;

        let mut values = SectionValues::new();
        for (code, category, portfolios, name) in POSITIONS {
            let face = sum_by_date(
                valuations.iter().filter(|val| {
                    category.test(val.category.as_deref()) && portfolios.test(Some(&val.portfolio))
                }),
                |val| Some(val.value_date),
                |val| val.face_value,
            );
            // No valuation join.
            let pledged = sum_by_date(
                holdings
                    .iter()
                    .filter(|h| name.test(Some(&h.instrument_name))),
                |h| Some(h.value_date),
                |h| Some(h.pledge_components().iter().flatten().sum::<f64>()),
            );

            let series = drop_zeros(face)
                .into_iter()
                .map(|(date, f)| {
                    let p = pledged.get(&date).copied().unwrap_or(0.0);
                    (date, to_crores(f - p))
                })
                .collect();
            values.insert(code.to_string(), series);
        }
        Ok(values)
    }
}
