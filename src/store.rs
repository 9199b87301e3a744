use crate::batch::{BatchId, CalculatedResult, UploadBatch};
use crate::error::{ReportError, Result};
use crate::records::{CanonicalRecord, SourceKind, SourceRecord};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Persistence contract for batches, canonical records and results.
///
/// Every read and write is scoped by batch, except the ISIN uniqueness
/// check on reference-price sources.
pub trait RecordStore: Send + Sync {
    fn create_batch(&self, uploaded_by: Option<&str>) -> Result<UploadBatch>;

    fn batch(&self, id: &BatchId) -> Result<Option<UploadBatch>>;

    fn update_batch(&self, batch: &UploadBatch) -> Result<()>;

    /// Deletes every record of `kind` in the batch, then inserts `records`.
    fn replace_records(
        &self,
        batch_id: &BatchId,
        kind: SourceKind,
        records: Vec<CanonicalRecord>,
    ) -> Result<usize>;

    fn delete_records(&self, batch_id: &BatchId, kind: SourceKind) -> Result<usize>;

    /// Inserts a reference-price record unless its ISIN already exists for
    /// that source in any batch. Returns `Ok(false)` or
    /// `Err(ReportError::DuplicateKey)` when skipped.
    fn insert_reference(&self, batch_id: &BatchId, record: CanonicalRecord) -> Result<bool>;

    fn records(&self, batch_id: &BatchId, kind: SourceKind) -> Result<Vec<CanonicalRecord>>;

    /// Persists results, skipping any (batch, section, date) already stored.
    fn save_results(&self, results: &[CalculatedResult]) -> Result<usize>;

    fn results(&self, batch_id: &BatchId) -> Result<Vec<CalculatedResult>>;
}

/// Loads every record of type `R` for a batch.
pub fn load<R: SourceRecord>(store: &dyn RecordStore, batch_id: &BatchId) -> Result<Vec<R>> {
    Ok(store
        .records(batch_id, R::KIND)?
        .into_iter()
        .filter_map(R::from_canonical)
        .collect())
}

type ResultKey = (BatchId, String, NaiveDate);

#[derive(Default)]
struct StoreState {
    batches: HashMap<BatchId, UploadBatch>,
    records: HashMap<(BatchId, SourceKind), Vec<CanonicalRecord>>,
    results: BTreeMap<ResultKey, f64>,
}

/// In-process [`RecordStore`] guarded by a single read-write lock.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| ReportError::Store("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| ReportError::Store("store lock poisoned".to_string()))
    }
}

fn check_batch(record: &CanonicalRecord, batch_id: &BatchId, kind: SourceKind) -> Result<()> {
    if record.batch_id() != batch_id || record.kind() != kind {
        return Err(ReportError::Store(format!(
            "{} record for batch {} cannot be stored as {} in batch {}",
            record.kind(),
            record.batch_id(),
            kind,
            batch_id
        )));
    }
    Ok(())
}

impl RecordStore for MemoryStore {
    fn create_batch(&self, uploaded_by: Option<&str>) -> Result<UploadBatch> {
        let batch = UploadBatch::new(BatchId::generate(), uploaded_by.map(str::to_string));
        self.write()?.batches.insert(batch.id.clone(), batch.clone());
        Ok(batch)
    }

    fn batch(&self, id: &BatchId) -> Result<Option<UploadBatch>> {
        Ok(self.read()?.batches.get(id).cloned())
    }

    fn update_batch(&self, batch: &UploadBatch) -> Result<()> {
        let mut state = self.write()?;
        match state.batches.get_mut(&batch.id) {
            Some(existing) => {
                *existing = batch.clone();
                Ok(())
            }
            None => Err(ReportError::BatchNotFound(batch.id.to_string())),
        }
    }

    fn replace_records(
        &self,
        batch_id: &BatchId,
        kind: SourceKind,
        records: Vec<CanonicalRecord>,
    ) -> Result<usize> {
        for record in &records {
            check_batch(record, batch_id, kind)?;
        }
        let inserted = records.len();
        self.write()?
            .records
            .insert((batch_id.clone(), kind), records);
        Ok(inserted)
    }

    fn delete_records(&self, batch_id: &BatchId, kind: SourceKind) -> Result<usize> {
        Ok(self
            .write()?
            .records
            .remove(&(batch_id.clone(), kind))
            .map(|records| records.len())
            .unwrap_or(0))
    }

    fn insert_reference(&self, batch_id: &BatchId, record: CanonicalRecord) -> Result<bool> {
        let kind = record.kind();
        check_batch(&record, batch_id, kind)?;
        let Some(key) = record.natural_key().map(str::to_string) else {
            return Err(ReportError::Store(format!(
                "{} records have no natural key",
                kind
            )));
        };

        let mut state = self.write()?;
        let exists = state
            .records
            .iter()
            .filter(|((_, k), _)| *k == kind)
            .flat_map(|(_, records)| records.iter())
            .any(|existing| existing.natural_key() == Some(key.as_str()));
        if exists {
            return Ok(false);
        }

        state
            .records
            .entry((batch_id.clone(), kind))
            .or_default()
            .push(record);
        Ok(true)
    }

    fn records(&self, batch_id: &BatchId, kind: SourceKind) -> Result<Vec<CanonicalRecord>> {
        Ok(self
            .read()?
            .records
            .get(&(batch_id.clone(), kind))
            .cloned()
            .unwrap_or_default())
    }

    fn save_results(&self, results: &[CalculatedResult]) -> Result<usize> {
        let mut state = self.write()?;
        let mut inserted = 0;
        for result in results {
            let key = (
                result.batch_id.clone(),
                result.section_code.clone(),
                result.value_date,
            );
            if let std::collections::btree_map::Entry::Vacant(slot) = state.results.entry(key) {
                slot.insert(result.value);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn results(&self, batch_id: &BatchId) -> Result<Vec<CalculatedResult>> {
        Ok(self
            .read()?
            .results
            .iter()
            .filter(|((batch, _, _), _)| batch == batch_id)
            .map(|((batch, section, date), value)| CalculatedResult {
                batch_id: batch.clone(),
                section_code: section.clone(),
                value_date: *date,
                value: *value,
            })
            .collect())
    }
}
