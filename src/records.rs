use crate::batch::BatchId;
use crate::coercion::ColumnKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The deal-export families that can be uploaded into a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    ImDeal,
    RepoDeal,
    RepoDealOutstanding,
    MmDeal,
    MmDealOutstanding,
    FimmdaVal,
    SlrNds,
    GSec,
    Sdl,
}

impl SourceKind {
    /// Ingestion order used by the orchestrator.
    pub const ALL: [SourceKind; 9] = [
        SourceKind::ImDeal,
        SourceKind::RepoDeal,
        SourceKind::RepoDealOutstanding,
        SourceKind::MmDeal,
        SourceKind::MmDealOutstanding,
        SourceKind::FimmdaVal,
        SourceKind::SlrNds,
        SourceKind::GSec,
        SourceKind::Sdl,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::ImDeal => "IM Deal",
            SourceKind::RepoDeal => "Repo Deal",
            SourceKind::RepoDealOutstanding => "Repo Deal Outstanding",
            SourceKind::MmDeal => "MM Deal",
            SourceKind::MmDealOutstanding => "MM Deal Outstanding",
            SourceKind::FimmdaVal => "FIMMDA Valuation",
            SourceKind::SlrNds => "SLR/NDS",
            SourceKind::GSec => "G-Sec",
            SourceKind::Sdl => "SDL",
        }
    }

    /// Reference-price sources are deduplicated by ISIN across batches.
    pub fn is_reference_data(&self) -> bool {
        matches!(self, SourceKind::GSec | SourceKind::Sdl)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Canonical field names shared by every column mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    // identifiers and classification
    SecurityName,
    IdentificationNo,
    Isin,
    Instrument,
    InstrumentName,
    InstrumentType,
    InstrumentCategory,
    Description,
    Issuer,
    Portfolio,
    Category,
    SubCategory,
    SlrNslr,
    DealRef,
    Counterparty,
    Dealer,
    BrokerName,
    OpnType,
    OperationType,
    Currency,
    InterestPractice,
    InterestBasis,
    Benchmark,
    Status,
    Segment,
    Remarks,
    // dates
    DealDate,
    ValueDate,
    MaturityDate,
    Date,
    LastInterestDate,
    NextInterestDate,
    // counts
    Tenor,
    AccruedInterestDays,
    // amounts, prices and rates
    Quantity,
    MarketNominalValue,
    Price,
    RateYield,
    Rate,
    BookValue,
    FaceValue,
    FaceValuePerUnit,
    MarketValue,
    MarketPrice,
    Wap,
    ModifiedDuration,
    Pvbp,
    AccruedInterest,
    SettlementAmount,
    Brokerage,
    HoldingCost,
    ProfitLoss,
    Leg1Price,
    Leg2Price,
    SettlementAmountLeg1,
    SettlementAmountLeg2,
    OutstandingAmountLeg1,
    OutstandingAmountLeg2,
    Principal,
    BaseEqvlnt,
    Spread,
    InterestAmount,
    PrincipalPlusInterest,
    OutstandingAmount,
    Coupon,
    CurrentYield,
    MarketYield,
    Ytm,
    Appreciation,
    Depreciation,
    // SLR/NDS holdings, in lakhs
    OwnStock,
    Repo,
    RbiRefinance,
    Collateral,
    Lien,
    Sgf,
    Derivative,
    Treps,
    Deflt,
    TotalPledged,
    NetPosition,
}

impl Field {
    pub fn kind(&self) -> ColumnKind {
        use Field::*;
        match self {
            DealDate | ValueDate | MaturityDate | Date | LastInterestDate | NextInterestDate => {
                ColumnKind::Date
            }
            Tenor | AccruedInterestDays => ColumnKind::Integer,
            SecurityName | IdentificationNo | Isin | Instrument | InstrumentName
            | InstrumentType | InstrumentCategory | Description | Issuer | Portfolio
            | Category | SubCategory | SlrNslr | DealRef | Counterparty | Dealer | BrokerName
            | OpnType | OperationType | Currency | InterestPractice | InterestBasis
            | Benchmark | Status | Segment | Remarks => ColumnKind::Text,
            _ => ColumnKind::Numeric,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImDeal {
    pub upload_batch_id: BatchId,
    pub security_name: Option<String>,
    pub identification_no: Option<String>,
    pub instrument_type: Option<String>,
    pub portfolio: String,
    pub deal_ref: Option<String>,
    pub category: String,
    pub sub_category: Option<String>,
    pub counterparty: Option<String>,
    pub deal_date: Option<NaiveDate>,
    pub value_date: NaiveDate,
    pub maturity_date: Option<NaiveDate>,
    pub opn_type: Option<String>,
    pub quantity: Option<f64>,
    pub market_nominal_value: Option<f64>,
    pub price: Option<f64>,
    pub rate_yield: Option<f64>,
    pub book_value: Option<f64>,
    pub accrued_interest_days: Option<i64>,
    pub accrued_interest: Option<f64>,
    pub currency: Option<String>,
    pub settlement_amount: Option<f64>,
    pub dealer: Option<String>,
    pub broker_name: Option<String>,
    pub brokerage: Option<f64>,
    pub holding_cost: Option<f64>,
    pub profit_loss: Option<f64>,
    pub slr_nslr: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoDeal {
    pub upload_batch_id: BatchId,
    pub deal_no: Option<String>,
    pub instrument: String,
    pub security_name: Option<String>,
    pub isin: Option<String>,
    pub deal_date: Option<NaiveDate>,
    pub value_date: NaiveDate,
    pub maturity_date: Option<NaiveDate>,
    pub face_value: Option<f64>,
    pub leg1_price: Option<f64>,
    pub leg2_price: Option<f64>,
    pub rate: Option<f64>,
    pub tenor: Option<i64>,
    pub settlement_amount_leg1: Option<f64>,
    pub settlement_amount_leg2: Option<f64>,
    pub counterparty: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoDealOutstanding {
    pub upload_batch_id: BatchId,
    pub deal_no: Option<String>,
    pub instrument: Option<String>,
    pub security_name: Option<String>,
    pub isin: Option<String>,
    pub deal_date: Option<NaiveDate>,
    pub value_date: NaiveDate,
    pub maturity_date: Option<NaiveDate>,
    pub face_value: Option<f64>,
    pub leg1_price: Option<f64>,
    pub leg2_price: Option<f64>,
    pub rate: Option<f64>,
    pub tenor: Option<i64>,
    pub settlement_amount_leg1: Option<f64>,
    pub settlement_amount_leg2: Option<f64>,
    pub outstanding_amount_leg1: Option<f64>,
    pub outstanding_amount_leg2: Option<f64>,
    pub counterparty: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MmDeal {
    pub upload_batch_id: BatchId,
    pub deal_no: Option<String>,
    pub instrument_name: String,
    pub instrument_type: Option<String>,
    pub deal_date: Option<NaiveDate>,
    pub value_date: NaiveDate,
    pub maturity_date: Option<NaiveDate>,
    pub principal: Option<f64>,
    pub rate: Option<f64>,
    pub tenor: Option<i64>,
    pub base_eqvlnt: Option<f64>,
    pub counterparty: Option<String>,
    pub status: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MmDealOutstanding {
    pub upload_batch_id: BatchId,
    pub date: NaiveDate,
    pub deal_no: Option<String>,
    pub dealer: Option<String>,
    pub counterparty: Option<String>,
    pub portfolio: Option<String>,
    pub instrument_name: String,
    pub instrument_type: Option<String>,
    pub instrument_category: Option<String>,
    pub deal_date: Option<NaiveDate>,
    pub value_date: Option<NaiveDate>,
    pub tenor: Option<i64>,
    pub maturity_date: Option<NaiveDate>,
    pub operation_type: Option<String>,
    pub currency: Option<String>,
    pub interest_practice: Option<String>,
    pub interest_basis: Option<String>,
    pub benchmark: Option<String>,
    pub spread: Option<f64>,
    pub rate: Option<f64>,
    pub principal: Option<f64>,
    pub base_eqvlnt: Option<f64>,
    pub interest_amount: Option<f64>,
    pub principal_plus_interest: Option<f64>,
    pub status: Option<String>,
    pub remarks: Option<String>,
    pub last_interest_date: Option<NaiveDate>,
    pub next_interest_date: Option<NaiveDate>,
    pub accrued_interest: Option<f64>,
    pub outstanding_amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FimmdaVal {
    pub upload_batch_id: BatchId,
    pub security_name: Option<String>,
    pub identification_no: String,
    pub instrument_type: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub portfolio: String,
    pub slr_nslr: Option<String>,
    pub issuer: Option<String>,
    pub value_date: NaiveDate,
    pub maturity_date: Option<NaiveDate>,
    pub quantity: Option<f64>,
    pub face_value: Option<f64>,
    pub face_value_per_unit: Option<f64>,
    pub book_value: Option<f64>,
    pub market_value: Option<f64>,
    pub market_price: Option<f64>,
    pub wap: Option<f64>,
    pub modified_duration: Option<f64>,
    pub pvbp: Option<f64>,
    pub accrued_interest: Option<f64>,
    pub coupon: Option<f64>,
    pub current_yield: Option<f64>,
    pub market_yield: Option<f64>,
    pub appreciation: Option<f64>,
    pub depreciation: Option<f64>,
}

/// SLR/NDS holding statement. Quantities are face value in lakhs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlrNds {
    pub upload_batch_id: BatchId,
    pub isin: String,
    pub instrument_name: String,
    pub value_date: NaiveDate,
    pub own_stock: Option<f64>,
    pub repo: Option<f64>,
    pub rbi_refinance: Option<f64>,
    pub collateral: Option<f64>,
    pub lien: Option<f64>,
    pub sgf: Option<f64>,
    pub derivative: Option<f64>,
    pub treps: Option<f64>,
    pub deflt: Option<f64>,
    pub total_pledged: f64,
    pub net_position: f64,
}

impl SlrNds {
    pub fn pledge_components(&self) -> [Option<f64>; 8] {
        [
            self.repo,
            self.rbi_refinance,
            self.collateral,
            self.lien,
            self.sgf,
            self.derivative,
            self.treps,
            self.deflt,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GSecPrice {
    pub upload_batch_id: BatchId,
    pub isin: String,
    pub description: Option<String>,
    pub coupon: f64,
    pub maturity_date: Option<NaiveDate>,
    pub price: f64,
    pub ytm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdlPrice {
    pub upload_batch_id: BatchId,
    pub isin: String,
    pub description: Option<String>,
    pub coupon: f64,
    pub maturity_date: Option<NaiveDate>,
    pub price: f64,
    pub ytm: Option<f64>,
    /// Source sheet segment, e.g. `SDL` or `UDAY`.
    pub segment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "record")]
pub enum CanonicalRecord {
    ImDeal(ImDeal),
    RepoDeal(RepoDeal),
    RepoDealOutstanding(RepoDealOutstanding),
    MmDeal(MmDeal),
    MmDealOutstanding(MmDealOutstanding),
    FimmdaVal(FimmdaVal),
    SlrNds(SlrNds),
    GSec(GSecPrice),
    Sdl(SdlPrice),
}

impl CanonicalRecord {
    pub fn kind(&self) -> SourceKind {
        match self {
            CanonicalRecord::ImDeal(_) => SourceKind::ImDeal,
            CanonicalRecord::RepoDeal(_) => SourceKind::RepoDeal,
            CanonicalRecord::RepoDealOutstanding(_) => SourceKind::RepoDealOutstanding,
            CanonicalRecord::MmDeal(_) => SourceKind::MmDeal,
            CanonicalRecord::MmDealOutstanding(_) => SourceKind::MmDealOutstanding,
            CanonicalRecord::FimmdaVal(_) => SourceKind::FimmdaVal,
            CanonicalRecord::SlrNds(_) => SourceKind::SlrNds,
            CanonicalRecord::GSec(_) => SourceKind::GSec,
            CanonicalRecord::Sdl(_) => SourceKind::Sdl,
        }
    }

    pub fn batch_id(&self) -> &BatchId {
        match self {
            CanonicalRecord::ImDeal(r) => &r.upload_batch_id,
            CanonicalRecord::RepoDeal(r) => &r.upload_batch_id,
            CanonicalRecord::RepoDealOutstanding(r) => &r.upload_batch_id,
            CanonicalRecord::MmDeal(r) => &r.upload_batch_id,
            CanonicalRecord::MmDealOutstanding(r) => &r.upload_batch_id,
            CanonicalRecord::FimmdaVal(r) => &r.upload_batch_id,
            CanonicalRecord::SlrNds(r) => &r.upload_batch_id,
            CanonicalRecord::GSec(r) => &r.upload_batch_id,
            CanonicalRecord::Sdl(r) => &r.upload_batch_id,
        }
    }

    /// Natural key for reference-price records.
    pub fn natural_key(&self) -> Option<&str> {
        match self {
            CanonicalRecord::GSec(r) => Some(&r.isin),
            CanonicalRecord::Sdl(r) => Some(&r.isin),
            _ => None,
        }
    }
}

/// Typed access to one variant of [`CanonicalRecord`].
pub trait SourceRecord: Sized {
    const KIND: SourceKind;

    fn from_canonical(record: CanonicalRecord) -> Option<Self>;
}

macro_rules! source_record {
    ($ty:ty, $variant:ident) => {
        impl SourceRecord for $ty {
            const KIND: SourceKind = SourceKind::$variant;

            fn from_canonical(record: CanonicalRecord) -> Option<Self> {
                match record {
                    CanonicalRecord::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$ty> for CanonicalRecord {
            fn from(record: $ty) -> Self {
                CanonicalRecord::$variant(record)
            }
        }
    };
}

source_record!(ImDeal, ImDeal);
source_record!(RepoDeal, RepoDeal);
source_record!(RepoDealOutstanding, RepoDealOutstanding);
source_record!(MmDeal, MmDeal);
source_record!(MmDealOutstanding, MmDealOutstanding);
source_record!(FimmdaVal, FimmdaVal);
source_record!(SlrNds, SlrNds);
source_record!(GSecPrice, GSec);
source_record!(SdlPrice, Sdl);
