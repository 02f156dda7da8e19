//! Pipeline tunables.
//!
//! Values mirror the limits enforced by the storage schema (column widths)
//! and the classification threshold used by the test-type scorer.

pub fn default_log_filter() -> String {
    "labtrail=info".to_string()
}

/// Processing configuration shared by the orchestrator and its helpers.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum stored length of the human-readable processing report.
    pub report_max_len: usize,
    /// Maximum stored length of a truncated failure message.
    pub error_max_len: usize,
    /// Minimum match percentage for test-type classification.
    pub type_score_threshold: f64,
    /// Earliest date accepted by the test-date extractor.
    pub earliest_test_date: chrono::NaiveDate,
    /// Marker inserted between pages of extracted text.
    pub page_break_marker: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            report_max_len: 4000,
            error_max_len: 500,
            type_score_threshold: 50.0,
            earliest_test_date: chrono::NaiveDate::from_ymd_opt(1990, 1, 1)
                .expect("valid constant date"),
            page_break_marker: "<-- Page Break -->".to_string(),
        }
    }
}
