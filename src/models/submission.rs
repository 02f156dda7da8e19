use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ProcessingStatus, TestDateSource};

/// One uploaded lab-report document and its processing lifecycle.
///
/// Mutated only by the pipeline orchestrator; created by the upload
/// collaborator. Status transitions are monotonic per run
/// (PENDING/FAILED → PROCESSING → COMPLETED|FAILED) and guarded by an
/// atomic conditional update so two runs cannot claim the same record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Operator-assigned test type. When present, classification is skipped.
    pub test_type_id: Option<Uuid>,
    /// Test date, when known. Provenance lives in `test_date_source`: only
    /// an operator-supplied date is authoritative and skips extraction; an
    /// extracted one is cleared and re-derived on every run.
    pub test_date: Option<NaiveDate>,
    pub test_date_source: Option<TestDateSource>,
    pub notes: Option<String>,
    pub file_path: String,
    pub status: ProcessingStatus,
    /// Bounded human-readable processing report.
    pub report: Option<String>,
    pub extracted_text: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubmissionRecord {
    /// A fresh PENDING submission for an uploaded file.
    pub fn new(owner_id: Uuid, file_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            test_type_id: None,
            test_date: None,
            test_date_source: None,
            notes: None,
            file_path: file_path.into(),
            status: ProcessingStatus::Pending,
            report: None,
            extracted_text: None,
            submitted_at: now,
            updated_at: now,
        }
    }

    /// Attach an operator-supplied test date at upload time.
    pub fn with_operator_date(mut self, date: NaiveDate) -> Self {
        self.test_date = Some(date);
        self.test_date_source = Some(TestDateSource::Operator);
        self
    }
}
