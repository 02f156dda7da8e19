use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One analyte measurement extracted from a submission.
///
/// At most one result exists per (submission, analyte) pair; re-processing
/// deletes all prior results for the submission before re-inserting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedResult {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub analyte_id: Uuid,
    /// The exact value string found in the report.
    pub value: String,
    /// Fixed-precision numeric form, when the value parses.
    pub value_numeric: Option<Decimal>,
    /// Unit from the report, falling back to the analyte's standard unit.
    pub unit: String,
    /// Reference-range string as reported, brackets stripped.
    pub reference_range: Option<String>,
    /// Status phrase found at the end of the line, e.g. "Выше нормы".
    pub status_text: Option<String>,
    /// Tri-state abnormality: Some(true)/Some(false)/unknown.
    pub is_abnormal: Option<bool>,
    pub extracted_at: DateTime<Utc>,
}
