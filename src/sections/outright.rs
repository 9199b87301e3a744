use super::{SectionCalculator, SectionValues};
use crate::batch::BatchId;
use crate::error::Result;
use crate::query::{drop_zeros, in_crores, sum_by_date, TextRule};
use crate::records::ImDeal;
use crate::store::{load, RecordStore};
use log::debug;

const GOVERNMENT_CATEGORY: TextRule = TextRule::AnyOf(&[
    TextRule::OneOfIgnoreCase(&[
        "CENTRAL GOVT BONDS",
        "STATE GOVT BONDS",
        "TREASURY BILLS",
        "CENTRAL GOVERNMENT BONDS",
        "STATE GOVERNMENT BONDS",
        "T-BILLS",
    ]),
    TextRule::AllOf(&[TextRule::Contains("GOVT"), TextRule::Contains("BOND")]),
    TextRule::AllOf(&[TextRule::Contains("TREASURY"), TextRule::Contains("BILL")]),
]);

const TRADING_PORTFOLIO: TextRule = TextRule::StartsWithIgnoreCase(&["FVLG", "FVSS"]);

/// (code, operation, government security?)
const LINE_ITEMS: [(&str, &str, bool); 4] = [
    ("1A1", "BUY", true),
    ("1A2", "BUY", false),
    ("1B1", "SELL", true),
    ("1B2", "SELL", false),
];

/// Outright purchases and sales in the trading books (section 1A/1B).
pub struct OutrightTransactions<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> OutrightTransactions<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }
}

impl SectionCalculator for OutrightTransactions<'_> {
    fn name(&self) -> &'static str {
        "outright transactions"
    }

    fn calculate(&self, batch_id: &BatchId) -> Result<SectionValues> {
        let deals: Vec<ImDeal> = load(self.store, batch_id)?;
        debug!("Outright: {} IM deals in batch {}", deals.len(), batch_id);

        let mut values = SectionValues::new();
        for (code, side, government) in LINE_ITEMS {
            let series = sum_by_date(
                deals.iter().filter(|deal| {
                    deal.opn_type.as_deref() == Some(side)
                        && TRADING_PORTFOLIO.test(Some(&deal.portfolio))
                        && GOVERNMENT_CATEGORY.test(Some(&deal.category)) == government
                }),
                |deal| Some(deal.value_date),
                |deal| deal.quantity,
            );
            values.insert(code.to_string(), in_crores(drop_zeros(series)));
        }
        Ok(values)
    }
}
