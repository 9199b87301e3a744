use crate::error::{ReportError, Result};
use crate::records::SourceKind;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::AddAssign;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BatchId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BatchId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }

    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (BatchStatus::Uploading, BatchStatus::Processing)
                | (BatchStatus::Uploading, BatchStatus::Failed)
                | (BatchStatus::Processing, BatchStatus::Completed)
                | (BatchStatus::Processing, BatchStatus::Failed)
        )
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BatchStatus::Uploading => "uploading",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingCounts {
    pub total_records: usize,
    pub processed_records: usize,
    pub error_records: usize,
}

impl AddAssign for ProcessingCounts {
    fn add_assign(&mut self, other: Self) {
        self.total_records += other.total_records;
        self.processed_records += other.processed_records;
        self.error_records += other.error_records;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub message: String,
    /// Full debug rendering of the error chain.
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadBatch {
    pub id: BatchId,
    pub status: BatchStatus,
    pub uploaded: BTreeSet<SourceKind>,
    pub counts: ProcessingCounts,
    pub uploaded_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub error: Option<BatchFailure>,
}

impl UploadBatch {
    pub fn new(id: BatchId, uploaded_by: Option<String>) -> Self {
        Self {
            id,
            status: BatchStatus::Uploading,
            uploaded: BTreeSet::new(),
            counts: ProcessingCounts::default(),
            uploaded_by,
            created_at: Utc::now(),
            processing_started_at: None,
            processing_completed_at: None,
            error: None,
        }
    }

    pub fn transition(&mut self, next: BatchStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(ReportError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        match next {
            BatchStatus::Processing => self.processing_started_at = Some(Utc::now()),
            BatchStatus::Completed | BatchStatus::Failed => {
                self.processing_completed_at = Some(Utc::now())
            }
            BatchStatus::Uploading => {}
        }
        self.status = next;
        Ok(())
    }

    pub fn fail(&mut self, err: &ReportError) -> Result<()> {
        self.transition(BatchStatus::Failed)?;
        self.error = Some(BatchFailure {
            message: err.to_string(),
            detail: format!("{:?}", err),
        });
        Ok(())
    }

    pub fn mark_uploaded(&mut self, kind: SourceKind) {
        self.uploaded.insert(kind);
    }

    pub fn is_uploaded(&self, kind: SourceKind) -> bool {
        self.uploaded.contains(&kind)
    }
}

/// One line-item value for one date in one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedResult {
    pub batch_id: BatchId,
    pub section_code: String,
    pub value_date: NaiveDate,
    pub value: f64,
}
