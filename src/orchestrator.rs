use crate::batch::{BatchId, BatchStatus, CalculatedResult, ProcessingCounts, UploadBatch};
use crate::coercion::format_date;
use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::parsers::Ingestor;
use crate::query::DateSeries;
use crate::records::{ImDeal, SourceKind};
use crate::sections::{
    ApplicationOfFunds, CallMoney, OutrightTransactions, PortfolioDuration, RepoTransactions,
    SectionCalculator, SectionValues, SourcesOfFunds, StockPosition,
};
use crate::store::{load, RecordStore};
use crate::workbook::SourceFile;
use chrono::{NaiveDate, Utc};
use indexmap::IndexMap;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// The files of one upload, keyed by source.
#[derive(Debug, Clone, Default)]
pub struct UploadedFiles {
    pub files: BTreeMap<SourceKind, SourceFile>,
    pub uploaded_by: Option<String>,
    /// Value date for sheets that carry none.
    pub as_of: Option<NaiveDate>,
}

impl UploadedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        kind: SourceKind,
        file_name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        self.files.insert(kind, SourceFile::new(file_name, bytes));
        self
    }

    pub fn get(&self, kind: SourceKind) -> Option<&SourceFile> {
        self.files.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSummary {
    #[serde(flatten)]
    pub counts: ProcessingCounts,
    pub processing_time_ms: u64,
}

/// Section code to `DD-Mon-YYYY` date to crore value, dates in calendar order.
pub type ProcessedData = BTreeMap<String, IndexMap<String, f64>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub success: bool,
    pub batch_id: BatchId,
    pub summary: ProcessSummary,
    pub processed_data: ProcessedData,
    pub deal_dates: Vec<String>,
}

fn processed_data(values: &SectionValues) -> ProcessedData {
    values
        .iter()
        .filter(|(_, series)| !series.is_empty())
        .map(|(code, series)| {
            let dated = series
                .iter()
                .map(|(date, value)| (format_date(*date), *value))
                .collect();
            (code.clone(), dated)
        })
        .collect()
}

fn flatten(batch_id: &BatchId, values: &SectionValues) -> Vec<CalculatedResult> {
    values
        .iter()
        .flat_map(|(code, series)| {
            series.iter().map(move |(date, value)| CalculatedResult {
                batch_id: batch_id.clone(),
                section_code: code.clone(),
                value_date: *date,
                value: *value,
            })
        })
        .collect()
}

/// Drives one upload from raw files to persisted line-item results.
pub struct BatchOrchestrator<'a> {
    store: &'a dyn RecordStore,
    config: &'a ReportConfig,
    extra: Vec<Box<dyn SectionCalculator + 'a>>,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(store: &'a dyn RecordStore, config: &'a ReportConfig) -> Self {
        Self {
            store,
            config,
            extra: Vec::new(),
        }
    }

    /// Registers a calculator that runs after the built-in sections.
    pub fn with_calculator(mut self, calculator: impl SectionCalculator + 'a) -> Self {
        self.extra.push(Box::new(calculator));
        self
    }

    fn builtin_calculators(&self) -> Vec<Box<dyn SectionCalculator + 'a>> {
        vec![
            Box::new(OutrightTransactions::new(self.store)),
            Box::new(RepoTransactions::new(self.store)),
            Box::new(CallMoney::new(self.store, self.config)),
            Box::new(SourcesOfFunds::new(self.store, self.config)),
            Box::new(ApplicationOfFunds::new(self.store)),
            Box::new(StockPosition::new(self.store)),
            Box::new(PortfolioDuration::new(self.store)),
        ]
    }

    pub fn process(&self, files: &UploadedFiles) -> Result<ProcessResult> {
        self.config.validate()?;
        let started = Instant::now();

        let mut batch = self.store.create_batch(files.uploaded_by.as_deref())?;
        info!(
            "Processing batch {} with {} file(s)",
            batch.id,
            files.files.len()
        );

        match self.run(&mut batch, files) {
            Ok(values) => {
                let summary = ProcessSummary {
                    counts: batch.counts,
                    processing_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                };
                info!(
                    "Batch {} completed: {} rows, {} stored, {} rejected in {} ms",
                    batch.id,
                    summary.counts.total_records,
                    summary.counts.processed_records,
                    summary.counts.error_records,
                    summary.processing_time_ms
                );
                Ok(ProcessResult {
                    success: true,
                    deal_dates: self.deal_dates(&batch.id)?,
                    processed_data: processed_data(&values),
                    batch_id: batch.id,
                    summary,
                })
            }
            Err(err) => {
                error!("Batch {} failed: {}", batch.id, err);
                if let Err(record_err) = batch.fail(&err).and_then(|_| self.store.update_batch(&batch)) {
                    error!("Could not record failure of batch {}: {}", batch.id, record_err);
                }
                Err(ReportError::BatchFailed {
                    batch_id: batch.id.to_string(),
                    message: err.to_string(),
                })
            }
        }
    }

    fn run(&self, batch: &mut UploadBatch, files: &UploadedFiles) -> Result<SectionValues> {
        batch.transition(BatchStatus::Processing)?;
        self.store.update_batch(batch)?;

        let as_of = files
            .as_of
            .or(self.config.default_value_date)
            .unwrap_or_else(|| Utc::now().date_naive());
        let ingestor = Ingestor::new(self.store, self.config);

        for kind in SourceKind::ALL {
            let Some(file) = files.get(kind) else {
                continue;
            };
            let counts = match ingestor.ingest(&batch.id, kind, file, as_of) {
                Ok(counts) => counts,
                // An unreadable money-market file counts as one rejected row.
                Err(err) if matches!(kind, SourceKind::MmDeal | SourceKind::MmDealOutstanding) => {
                    warn!("{}: '{}' could not be read: {}", kind, file.file_name, err);
                    batch.counts.error_records += 1;
                    self.store.update_batch(batch)?;
                    continue;
                }
                Err(err) => return Err(err),
            };
            if counts.error_records > 0 {
                warn!(
                    "{}: {} row(s) in '{}' rejected",
                    kind, counts.error_records, file.file_name
                );
            }
            batch.counts += counts;
            batch.mark_uploaded(kind);
            self.store.update_batch(batch)?;
        }

        let values = self.calculate(&batch.id)?;
        let results = flatten(&batch.id, &values);
        let saved = self.store.save_results(&results)?;
        debug!("Batch {}: {} of {} results saved", batch.id, saved, results.len());

        batch.transition(BatchStatus::Completed)?;
        self.store.update_batch(batch)?;
        Ok(values)
    }

    /// Runs every calculator over an ingested batch and merges their
    /// line items. Empty series are dropped; a later calculator replaces an
    /// earlier one's series for the same code.
    pub fn calculate(&self, batch_id: &BatchId) -> Result<SectionValues> {
        let builtins = self.builtin_calculators();
        let mut merged = SectionValues::new();

        for calculator in builtins.iter().chain(self.extra.iter()) {
            let values = calculator.calculate(batch_id)?;
            debug!(
                "{}: {} line item(s) for batch {}",
                calculator.name(),
                values.len(),
                batch_id
            );
            for (code, series) in values {
                if series.is_empty() {
                    continue;
                }
                if merged.insert(code.clone(), series).is_some() {
                    warn!("{} replaced an earlier value for {}", calculator.name(), code);
                }
            }
        }
        Ok(merged)
    }

    fn deal_dates(&self, batch_id: &BatchId) -> Result<Vec<String>> {
        let deals: Vec<ImDeal> = load(self.store, batch_id)?;
        let dates: BTreeSet<NaiveDate> = deals.iter().map(|deal| deal.value_date).collect();
        Ok(dates.into_iter().map(format_date).collect())
    }

    /// Rebuilds the result of an earlier run from the persisted results.
    pub fn results_for_batch(&self, batch_id: &BatchId) -> Result<ProcessResult> {
        let batch = self
            .store
            .batch(batch_id)?
            .ok_or_else(|| ReportError::BatchNotFound(batch_id.to_string()))?;

        let mut values = SectionValues::new();
        for result in self.store.results(batch_id)? {
            values
                .entry(result.section_code)
                .or_insert_with(DateSeries::new)
                .insert(result.value_date, result.value);
        }
        let dates: BTreeSet<NaiveDate> = values
            .values()
            .flat_map(|series| series.keys().copied())
            .collect();

        Ok(ProcessResult {
            success: batch.status == BatchStatus::Completed,
            batch_id: batch.id,
            summary: ProcessSummary {
                counts: batch.counts,
                processing_time_ms: 0,
            },
            processed_data: processed_data(&values),
            deal_dates: dates.into_iter().map(format_date).collect(),
        })
    }
}
