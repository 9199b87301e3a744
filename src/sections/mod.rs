//! Report line-item calculators.
//!
//! Each calculator reads one batch from the store, aggregates by value date
//! and returns crore values keyed by line-item code. Calculators share no
//! state and only read, so their order only matters when codes collide.

pub mod application_of_funds;
pub mod call_money;
pub mod outright;
pub mod portfolio_duration;
pub mod repo;
pub mod sources_of_funds;
pub mod stock_position;

use crate::batch::BatchId;
use crate::error::Result;
use crate::query::{DateSeries, TextRule};
use std::collections::BTreeMap;

pub use application_of_funds::ApplicationOfFunds;
pub use call_money::CallMoney;
pub use outright::OutrightTransactions;
pub use portfolio_duration::PortfolioDuration;
pub use repo::RepoTransactions;
pub use sources_of_funds::SourcesOfFunds;
pub use stock_position::StockPosition;

/// Line-item code to dated values.
pub type SectionValues = BTreeMap<String, DateSeries>;

pub trait SectionCalculator {
    fn name(&self) -> &'static str;

    fn calculate(&self, batch_id: &BatchId) -> Result<SectionValues>;
}

// Security classes as spelled across valuation exports.
pub const CENTRAL_GOVT: TextRule = TextRule::OneOfIgnoreCase(&[
    "Central Government Bond",
    "Central Government Bonds",
    "Central Government Securities",
    "Central Government Sec",
    "Central Govt Bonds",
]);

pub const STATE_GOVT: TextRule = TextRule::OneOfIgnoreCase(&[
    "State Government Bond",
    "State Government Bonds",
    "State Government Securities",
    "State Government Sec",
    "State Govt Bonds",
]);

pub const TREASURY_BILL: TextRule =
    TextRule::OneOfIgnoreCase(&["Treasury Bills", "Treasury Bill", "T-Bills"]);

// SLR/NDS instrument names per class.
pub const GOVT_PLEDGE_NAME: TextRule = TextRule::ContainsAny(&["GOI", "GS"]);
pub const SDL_PLEDGE_NAME: TextRule = TextRule::ContainsAny(&["SDL", "SGS", "UDAY"]);

pub const FVLG: TextRule = TextRule::OneOfIgnoreCase(&["FVLG"]);
pub const FVSS: TextRule = TextRule::OneOfIgnoreCase(&["FVSS"]);
pub const SDL_PORTFOLIOS: TextRule =
    TextRule::OneOfIgnoreCase(&["FVLG", "AMRT", "NC/NNC", "NC", "NNC"]);

/// Treasury-bill tenor bucket, matched on FIMMDA sub-category and SLR name.
#[derive(Debug, Clone, Copy)]
pub struct TbillBucket {
    pub code: &'static str,
    pub sub_category: TextRule,
    pub pledge_name: TextRule,
}

pub const TBILL_BUCKETS: [TbillBucket; 3] = [
    TbillBucket {
        code: "2B1a3",
        sub_category: TextRule::OneOfIgnoreCase(&["91 DAYS TBILL"]),
        pledge_name: TextRule::Contains("91 DTB"),
    },
    TbillBucket {
        code: "2B1a4",
        sub_category: TextRule::OneOfIgnoreCase(&["182 DAYS TBILL"]),
        pledge_name: TextRule::Contains("182 DTB"),
    },
    TbillBucket {
        code: "2B1a5",
        sub_category: TextRule::OneOfIgnoreCase(&["364 DAYS TBILL"]),
        pledge_name: TextRule::Contains("364 DTB"),
    },
];

pub const ANY_DTB: TextRule = TextRule::Contains("DTB");

#[cfg(test)]
pub(crate) mod test_support {
    use crate::batch::BatchId;
    use crate::records::*;
    use chrono::NaiveDate;

    pub fn batch() -> BatchId {
        BatchId::from("calc-batch")
    }

    pub fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    pub fn im_deal(date: NaiveDate, portfolio: &str, category: &str, side: &str, qty: f64) -> ImDeal {
        ImDeal {
            upload_batch_id: batch(),
            security_name: None,
            identification_no: None,
            instrument_type: None,
            portfolio: portfolio.to_string(),
            deal_ref: None,
            category: category.to_string(),
            sub_category: None,
            counterparty: None,
            deal_date: None,
            value_date: date,
            maturity_date: None,
            opn_type: Some(side.to_string()),
            quantity: Some(qty),
            market_nominal_value: None,
            price: None,
            rate_yield: None,
            book_value: None,
            accrued_interest_days: None,
            accrued_interest: None,
            currency: None,
            settlement_amount: None,
            dealer: None,
            broker_name: None,
            brokerage: None,
            holding_cost: None,
            profit_loss: None,
            slr_nslr: None,
            remarks: None,
        }
    }

    pub fn repo_deal(date: NaiveDate, instrument: &str, face: f64, leg1: f64) -> RepoDeal {
        RepoDeal {
            upload_batch_id: batch(),
            deal_no: None,
            instrument: instrument.to_string(),
            security_name: None,
            isin: None,
            deal_date: None,
            value_date: date,
            maturity_date: None,
            face_value: Some(face),
            leg1_price: Some(leg1),
            leg2_price: None,
            rate: None,
            tenor: None,
            settlement_amount_leg1: Some(face * leg1 / 100.0),
            settlement_amount_leg2: None,
            counterparty: None,
            remarks: None,
        }
    }

    pub fn mm_deal(date: NaiveDate, name: &str, base: f64) -> MmDeal {
        MmDeal {
            upload_batch_id: batch(),
            deal_no: None,
            instrument_name: name.to_string(),
            instrument_type: None,
            deal_date: None,
            value_date: date,
            maturity_date: None,
            principal: None,
            rate: None,
            tenor: None,
            base_eqvlnt: Some(base),
            counterparty: None,
            status: None,
            remarks: None,
        }
    }

    pub fn mm_outstanding(date: NaiveDate, name: &str, base: Option<f64>, tenor: Option<i64>) -> MmDealOutstanding {
        MmDealOutstanding {
            upload_batch_id: batch(),
            date,
            deal_no: None,
            dealer: None,
            counterparty: None,
            portfolio: None,
            instrument_name: name.to_string(),
            instrument_type: None,
            instrument_category: None,
            deal_date: None,
            value_date: Some(date),
            tenor,
            maturity_date: None,
            operation_type: None,
            currency: None,
            interest_practice: None,
            interest_basis: None,
            benchmark: None,
            spread: None,
            rate: None,
            principal: None,
            base_eqvlnt: base,
            interest_amount: None,
            principal_plus_interest: None,
            status: None,
            remarks: None,
            last_interest_date: None,
            next_interest_date: None,
            accrued_interest: None,
            outstanding_amount: base,
        }
    }

    pub fn valuation(date: NaiveDate, isin: &str, portfolio: &str, category: &str) -> FimmdaVal {
        FimmdaVal {
            upload_batch_id: batch(),
            security_name: None,
            identification_no: isin.to_string(),
            instrument_type: None,
            category: Some(category.to_string()),
            sub_category: None,
            portfolio: portfolio.to_string(),
            slr_nslr: None,
            issuer: None,
            value_date: date,
            maturity_date: None,
            quantity: None,
            face_value: None,
            face_value_per_unit: None,
            book_value: None,
            market_value: None,
            market_price: None,
            wap: None,
            modified_duration: None,
            pvbp: None,
            accrued_interest: None,
            coupon: None,
            current_yield: None,
            market_yield: None,
            appreciation: None,
            depreciation: None,
        }
    }

    pub fn holding(date: NaiveDate, isin: &str, name: &str, repo: f64, rbi: f64) -> SlrNds {
        SlrNds {
            upload_batch_id: batch(),
            isin: isin.to_string(),
            instrument_name: name.to_string(),
            value_date: date,
            own_stock: Some(1000.0),
            repo: Some(repo),
            rbi_refinance: Some(rbi),
            collateral: None,
            lien: None,
            sgf: None,
            derivative: None,
            treps: None,
            deflt: None,
            total_pledged: repo + rbi,
            net_position: 1000.0 - repo - rbi,
        }
    }
}
