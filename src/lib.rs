//! # PDR1 Report Builder
//!
//! Builds the PDR1 regulatory return of a primary dealer from the deal
//! exports of its treasury systems.
//!
//! ## Core Concepts
//!
//! - **Upload batch**: one set of source files, processed together and
//!   tracked through `uploading → processing → completed | failed`
//! - **Source parsers**: locate the header row in loosely laid out
//!   spreadsheets, map column names to canonical fields and coerce values
//! - **Canonical records**: one typed record per source row, always scoped
//!   to the batch that uploaded it
//! - **Section calculators**: aggregate records by value date, net pledged
//!   holdings against book value and express every line item in crores
//!
//! ## Example
//!
//! ```rust,ignore
//! use pdr1_report_builder::*;
//!
//! let store = MemoryStore::new();
//! let config = ReportConfig::default();
//! let files = UploadedFiles::new()
//!     .with(SourceKind::ImDeal, "im_deals.xlsx", std::fs::read("im_deals.xlsx")?)
//!     .with(SourceKind::RepoDeal, "repo.xlsx", std::fs::read("repo.xlsx")?);
//!
//! let result = process_upload(&store, &config, &files)?;
//! for (code, dated) in &result.processed_data {
//!     println!("{code}: {dated:?}");
//! }
//! ```

pub mod batch;
pub mod coercion;
pub mod config;
pub mod error;
pub mod mapper;
pub mod orchestrator;
pub mod parsers;
pub mod query;
pub mod records;
pub mod sections;
pub mod store;
pub mod workbook;

pub use batch::{
    BatchFailure, BatchId, BatchStatus, CalculatedResult, ProcessingCounts, UploadBatch,
};
pub use coercion::{format_date, parse_date, parse_number, Cell};
pub use config::ReportConfig;
pub use error::{ReportError, Result, RowError};
pub use orchestrator::{
    BatchOrchestrator, ProcessResult, ProcessSummary, ProcessedData, UploadedFiles,
};
pub use parsers::{parser_for, Ingestor, ParsedFile, SourceParser};
pub use query::DateSeries;
pub use records::{CanonicalRecord, Field, SourceKind, SourceRecord};
pub use sections::{SectionCalculator, SectionValues};
pub use store::{load, MemoryStore, RecordStore};
pub use workbook::{Sheet, SourceFile, Workbook};

/// Ingests `files` into a new batch and computes every built-in section.
pub fn process_upload(
    store: &dyn RecordStore,
    config: &ReportConfig,
    files: &UploadedFiles,
) -> Result<ProcessResult> {
    BatchOrchestrator::new(store, config).process(files)
}
