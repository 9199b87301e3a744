use super::{SectionCalculator, SectionValues};
use crate::batch::BatchId;
use crate::error::Result;
use crate::query::{drop_zeros, in_crores, sum_by_date, value_at_price, TextRule};
use crate::records::RepoDeal;
use crate::store::{load, RecordStore};

pub const MARKET_REPO: TextRule = TextRule::OneOfIgnoreCase(&["MARKET REPO"]);
pub const MARKET_REVERSE_REPO: TextRule = TextRule::OneOfIgnoreCase(&["MARKET REVERSE REPO"]);

/// Market repo borrowing (1C1) and reverse-repo lending (1C2), valued at
/// first-leg consideration.
pub struct RepoTransactions<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> RepoTransactions<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }
}

impl SectionCalculator for RepoTransactions<'_> {
    fn name(&self) -> &'static str {
        "repo transactions"
    }

    fn calculate(&self, batch_id: &BatchId) -> Result<SectionValues> {
        let deals: Vec<RepoDeal> = load(self.store, batch_id)?;

        let mut values = SectionValues::new();
        for (code, rule) in [("1C1", MARKET_REPO), ("1C2", MARKET_REVERSE_REPO)] {
            let series = sum_by_date(
                deals.iter().filter(|deal| rule.test(Some(&deal.instrument))),
                |deal| Some(deal.value_date),
                |deal| match (deal.face_value, deal.leg1_price) {
                    (Some(face), Some(price)) => Some(value_at_price(face, price)),
                    _ => None,
                },
            );
            values.insert(code.to_string(), in_crores(drop_zeros(series)));
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CanonicalRecord, SourceKind};
    use crate::sections::test_support::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_market_repo_at_leg1_price() {
        let store = MemoryStore::new();
        store
            .replace_records(
                &batch(),
                SourceKind::RepoDeal,
                vec![
                    CanonicalRecord::from(repo_deal(day(2), "Market Repo", 100_000_000.0, 99.5)),
                    CanonicalRecord::from(repo_deal(day(2), " MARKET REVERSE REPO", 50_000_000.0, 100.0)),
                    CanonicalRecord::from(repo_deal(day(2), "Special Repo", 70_000_000.0, 100.0)),
                ],
            )
            .unwrap();

        let values = RepoTransactions::new(&store).calculate(&batch()).unwrap();
        assert_eq!(values["1C1"][&day(2)], 9.95);
        assert_eq!(values["1C2"][&day(2)], 5.0);
    }
}
