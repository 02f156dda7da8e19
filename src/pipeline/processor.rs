//! Processing orchestrator.
//!
//! Single entry point that drives one submission through the pipeline:
//! claim → extract text → date → scan lines → persist results → classify →
//! finalize. Uses trait-based DI for the document source so the whole run
//! is testable without real PDFs.
//!
//! All failure is communicated through the submission's status and report;
//! `process` never returns an error to its caller.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::db::repository::analyte::{get_all_analytes, get_all_test_types};
use crate::db::repository::result::replace_results;
use crate::db::repository::submission::{
    claim_for_processing, finalize, get_submission, save_extracted_text,
};
use crate::db::DatabaseError;
use crate::models::{ExtractedResult, ProcessingStatus, SubmissionRecord, TestDateSource};

use super::aliases::AliasMap;
use super::classify::determine_test_type;
use super::dates::extract_test_date;
use super::lexicon::CompiledLexicon;
use super::line_match::scan_lines;
use super::pdf::{DocumentSource, ExtractionError};
use super::report::{truncate_chars, ReportBuilder};
use super::ProcessError;

/// What a successful run hands to the final status update.
struct RunOutcome {
    report: String,
    test_type_id: Option<Uuid>,
    test_date: Option<NaiveDate>,
}

/// Drives one submission at a time. Cheap to clone across workers.
#[derive(Clone)]
pub struct SubmissionProcessor {
    source: Arc<dyn DocumentSource>,
    config: PipelineConfig,
    lexicon: Arc<CompiledLexicon>,
}

impl SubmissionProcessor {
    pub fn new(source: Arc<dyn DocumentSource>, config: PipelineConfig, lexicon: CompiledLexicon) -> Self {
        Self {
            source,
            config,
            lexicon: Arc::new(lexicon),
        }
    }

    /// Process one submission end to end.
    ///
    /// Reprocessing a FAILED submission is the retry mechanism; the caller
    /// just invokes this again. A submission another run owns, or one that
    /// no longer exists, is skipped silently.
    pub fn process(&self, conn: &mut Connection, submission_id: Uuid) {
        let submission = match get_submission(conn, submission_id) {
            Ok(s) => s,
            Err(DatabaseError::NotFound { .. }) => {
                tracing::error!(%submission_id, "submission not found, aborting");
                return;
            }
            Err(e) => {
                tracing::error!(%submission_id, error = %e, "failed to fetch submission, aborting");
                return;
            }
        };

        match claim_for_processing(conn, submission_id) {
            Ok(true) => {
                tracing::info!(%submission_id, "claimed submission for processing");
            }
            Ok(false) => {
                tracing::warn!(%submission_id, "submission not claimable, skipping");
                return;
            }
            Err(e) => {
                tracing::error!(%submission_id, error = %e, "claim failed, aborting");
                return;
            }
        }

        let (status, report, test_type_id, test_date) = match self.run(conn, &submission) {
            Ok(outcome) => (
                ProcessingStatus::Completed,
                outcome.report,
                outcome.test_type_id,
                outcome.test_date,
            ),
            Err(e) => {
                tracing::error!(%submission_id, error = %e, "processing run failed");
                let message = failure_message(&e, self.config.error_max_len);
                (ProcessingStatus::Failed, message, None, None)
            }
        };

        match finalize(conn, submission_id, status, &report, test_type_id, test_date) {
            Ok(true) => {
                tracing::info!(%submission_id, status = status.as_str(), "submission finalized");
            }
            Ok(false) => {
                tracing::warn!(%submission_id, "status no longer PROCESSING, not our run to finish");
            }
            Err(e) => {
                tracing::error!(%submission_id, error = %e, "final status update failed");
            }
        }
    }

    fn run(
        &self,
        conn: &mut Connection,
        submission: &SubmissionRecord,
    ) -> Result<RunOutcome, ProcessError> {
        let path = Path::new(&submission.file_path);
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf || !path.exists() {
            return Err(ProcessError::MissingFile);
        }

        let pages = self.source.extract_pages(path)?;
        let page_count = pages.len();
        let text = pages.join(&format!("\n{}\n", self.config.page_break_marker));
        tracing::info!(
            submission_id = %submission.id,
            pages = page_count,
            text_length = text.chars().count(),
            "text extraction complete"
        );

        let mut report = ReportBuilder::new();

        // Only an operator-supplied date skips extraction; a date an earlier
        // run extracted was cleared by the claim.
        let operator_date = match submission.test_date_source {
            Some(TestDateSource::Operator) => submission.test_date,
            _ => None,
        };
        let extracted_date = match operator_date {
            None => {
                let today = Local::now().date_naive();
                match extract_test_date(
                    &text,
                    &self.lexicon,
                    self.config.earliest_test_date,
                    today,
                ) {
                    Some(date) => {
                        report.push(format!("Extracted Test Date: {}", date.format("%d.%m.%Y")));
                        Some(date)
                    }
                    None => {
                        report.push("Could not extract test date from PDF.");
                        None
                    }
                }
            }
            Some(date) => {
                report.push(format!(
                    "Test Date was pre-filled by user: {}",
                    date.format("%d.%m.%Y")
                ));
                None
            }
        };

        save_extracted_text(conn, submission.id, &text, extracted_date)?;

        let analytes = get_all_analytes(conn)?;
        let aliases = AliasMap::build(analytes);
        if aliases.is_empty() {
            tracing::warn!("no analytes defined, nothing can be extracted");
        }

        let outcome = scan_lines(&text, &aliases, &self.lexicon, &self.config.page_break_marker);

        let now = Utc::now();
        let results: Vec<ExtractedResult> = outcome
            .candidates
            .into_iter()
            .map(|c| ExtractedResult {
                id: Uuid::new_v4(),
                submission_id: submission.id,
                analyte_id: c.analyte_id,
                value: c.value,
                value_numeric: c.value_numeric,
                unit: c.unit,
                reference_range: c.reference_range,
                status_text: c.status_text,
                is_abnormal: c.is_abnormal,
                extracted_at: now,
            })
            .collect();
        let found_analytes: HashSet<Uuid> = results.iter().map(|r| r.analyte_id).collect();

        replace_results(conn, submission.id, &results)?;
        tracing::info!(
            submission_id = %submission.id,
            results = results.len(),
            "results persisted"
        );

        report.extend(outcome.details);
        let unrecognized_count = outcome.unrecognized.len();
        report.extend(outcome.unrecognized);
        if unrecognized_count > 0 {
            report.push_front(format!(
                "Found {unrecognized_count} lines that look like unrecognized results (see below)."
            ));
        }

        let test_type_id = match submission.test_type_id {
            None => {
                let types = get_all_test_types(conn)?;
                match determine_test_type(
                    &found_analytes,
                    &types,
                    self.config.type_score_threshold,
                ) {
                    Some((test_type, _score)) => {
                        report.push(format!(
                            "Automatically determined Test Type: {}",
                            test_type.name
                        ));
                        Some(test_type.id)
                    }
                    None => {
                        report.push("Could not automatically determine Test Type.");
                        None
                    }
                }
            }
            Some(_) => {
                report.push("Test Type was pre-selected by user.");
                None
            }
        };

        Ok(RunOutcome {
            report: report.render(page_count, results.len(), self.config.report_max_len),
            test_type_id,
            test_date: extracted_date,
        })
    }
}

/// Bounded failure message stored on the submission.
fn failure_message(err: &ProcessError, max_chars: usize) -> String {
    let message = match err {
        ProcessError::MissingFile => {
            "No valid PDF file associated with this submission.".to_string()
        }
        ProcessError::Extraction(ExtractionError::Io(_)) => {
            "File Not Found Error: PDF file missing.".to_string()
        }
        ProcessError::Extraction(e) => format!("PDF Reading/Extraction Error: {e}"),
        ProcessError::Database(e) => format!("Unexpected Processing Error: {e}"),
    };
    truncate_chars(&message, max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::analyte::{insert_analyte, insert_test_type};
    use crate::db::repository::result::get_results_for_submission;
    use crate::db::repository::submission::insert_submission;
    use crate::db::sqlite::{open_database, open_memory_database};
    use crate::models::{AnalyteDefinition, TestTypeDefinition};
    use crate::pipeline::lexicon::Lexicon;

    struct StubSource(Vec<String>);

    impl DocumentSource for StubSource {
        fn extract_pages(&self, _path: &Path) -> Result<Vec<String>, ExtractionError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    impl DocumentSource for FailingSource {
        fn extract_pages(&self, _path: &Path) -> Result<Vec<String>, ExtractionError> {
            Err(ExtractionError::PdfParsing("startxref not found".into()))
        }
    }

    fn processor(pages: &[&str]) -> SubmissionProcessor {
        SubmissionProcessor::new(
            Arc::new(StubSource(pages.iter().map(|p| p.to_string()).collect())),
            PipelineConfig::default(),
            Lexicon::default().compile().unwrap(),
        )
    }

    fn analyte(name: &str, name_ru: &str, unit: &str) -> AnalyteDefinition {
        AnalyteDefinition {
            id: Uuid::new_v4(),
            name: name.into(),
            name_en: None,
            name_ru: if name_ru.is_empty() {
                None
            } else {
                Some(name_ru.into())
            },
            name_kk: None,
            abbreviations: String::new(),
            unit: unit.into(),
            description: None,
        }
    }

    /// A real file with a .pdf name so the precheck passes; the stub
    /// source never reads it.
    fn placeholder_pdf(dir: &Path) -> String {
        let path = dir.join("report.pdf");
        std::fs::write(&path, b"%PDF-1.4 placeholder").unwrap();
        path.to_string_lossy().into_owned()
    }

    fn seeded_db(conn: &Connection) -> (AnalyteDefinition, AnalyteDefinition) {
        let hb = analyte("Hemoglobin", "Гемоглобин", "г/л");
        let glu = analyte("Glucose", "Глюкоза", "ммоль/л");
        insert_analyte(conn, &hb).unwrap();
        insert_analyte(conn, &glu).unwrap();
        (hb, glu)
    }

    #[test]
    fn completes_and_stores_results() {
        let mut conn = open_memory_database().unwrap();
        let (_, glu) = seeded_db(&conn);
        let dir = tempfile::tempdir().unwrap();

        let submission = SubmissionRecord::new(Uuid::new_v4(), placeholder_pdf(dir.path()));
        insert_submission(&conn, &submission).unwrap();

        let page = "Дата взятия: 05.03.2024\n\
                    Гемоглобин 135 г/л (120-160)\n\
                    Глюкоза 7,2 ммоль/л (3,5-5,5)";
        processor(&[page]).process(&mut conn, submission.id);

        let stored = get_submission(&conn, submission.id).unwrap();
        assert_eq!(stored.status, ProcessingStatus::Completed);
        assert_eq!(stored.test_date, NaiveDate::from_ymd_opt(2024, 3, 5));
        let report = stored.report.unwrap();
        assert!(report.starts_with("PDF processed (1 pages). Parsed 2 results."));
        assert!(report.contains("Extracted Test Date: 05.03.2024"));

        let results = get_results_for_submission(&conn, submission.id).unwrap();
        assert_eq!(results.len(), 2);
        let glucose = results.iter().find(|r| r.analyte_id == glu.id).unwrap();
        assert_eq!(glucose.value, "7.2");
        assert_eq!(glucose.is_abnormal, Some(true));
    }

    #[test]
    fn reprocessing_converges_without_duplicates() {
        let mut conn = open_memory_database().unwrap();
        seeded_db(&conn);
        let dir = tempfile::tempdir().unwrap();

        let submission = SubmissionRecord::new(Uuid::new_v4(), placeholder_pdf(dir.path()));
        insert_submission(&conn, &submission).unwrap();

        let p = processor(&["Гемоглобин 135 г/л (120-160)"]);
        p.process(&mut conn, submission.id);

        // Completed submissions are not claimable; re-queue by hand as an
        // operator would for a re-run.
        conn.execute(
            "UPDATE submissions SET status = 'FAILED' WHERE id = ?1",
            rusqlite::params![submission.id.to_string()],
        )
        .unwrap();
        p.process(&mut conn, submission.id);

        let results = get_results_for_submission(&conn, submission.id).unwrap();
        assert_eq!(results.len(), 1);
        let stored = get_submission(&conn, submission.id).unwrap();
        assert_eq!(stored.status, ProcessingStatus::Completed);
    }

    #[test]
    fn missing_file_fails_with_fixed_message() {
        let mut conn = open_memory_database().unwrap();
        let submission = SubmissionRecord::new(Uuid::new_v4(), "/nonexistent/report.pdf");
        insert_submission(&conn, &submission).unwrap();

        processor(&["unused"]).process(&mut conn, submission.id);

        let stored = get_submission(&conn, submission.id).unwrap();
        assert_eq!(stored.status, ProcessingStatus::Failed);
        assert_eq!(
            stored.report.as_deref(),
            Some("No valid PDF file associated with this submission.")
        );
    }

    #[test]
    fn non_pdf_extension_fails_without_extraction() {
        let mut conn = open_memory_database().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.jpg");
        std::fs::write(&path, b"jpeg bytes").unwrap();

        let submission =
            SubmissionRecord::new(Uuid::new_v4(), path.to_string_lossy().into_owned());
        insert_submission(&conn, &submission).unwrap();

        processor(&["unused"]).process(&mut conn, submission.id);

        let stored = get_submission(&conn, submission.id).unwrap();
        assert_eq!(stored.status, ProcessingStatus::Failed);
        assert_eq!(
            stored.report.as_deref(),
            Some("No valid PDF file associated with this submission.")
        );
    }

    #[test]
    fn extraction_error_fails_with_truncated_message() {
        let mut conn = open_memory_database().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let submission = SubmissionRecord::new(Uuid::new_v4(), placeholder_pdf(dir.path()));
        insert_submission(&conn, &submission).unwrap();

        let p = SubmissionProcessor::new(
            Arc::new(FailingSource),
            PipelineConfig::default(),
            Lexicon::default().compile().unwrap(),
        );
        p.process(&mut conn, submission.id);

        let stored = get_submission(&conn, submission.id).unwrap();
        assert_eq!(stored.status, ProcessingStatus::Failed);
        let report = stored.report.unwrap();
        assert!(report.starts_with("PDF Reading/Extraction Error:"));
        assert!(report.contains("startxref not found"));
    }

    #[test]
    fn operator_date_survives_processing() {
        let mut conn = open_memory_database().unwrap();
        seeded_db(&conn);
        let dir = tempfile::tempdir().unwrap();

        let submission = SubmissionRecord::new(Uuid::new_v4(), placeholder_pdf(dir.path()))
            .with_operator_date(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        insert_submission(&conn, &submission).unwrap();

        // Document carries a different date; the operator's wins.
        processor(&["Дата взятия: 05.03.2024\nГемоглобин 135 г/л"])
            .process(&mut conn, submission.id);

        let stored = get_submission(&conn, submission.id).unwrap();
        assert_eq!(stored.status, ProcessingStatus::Completed);
        assert_eq!(stored.test_date, NaiveDate::from_ymd_opt(2024, 1, 10));
        assert_eq!(stored.test_date_source, Some(TestDateSource::Operator));
        assert!(stored
            .report
            .unwrap()
            .contains("Test Date was pre-filled by user: 10.01.2024"));
    }

    #[test]
    fn extracted_date_is_rederived_on_reprocessing() {
        let mut conn = open_memory_database().unwrap();
        seeded_db(&conn);
        let dir = tempfile::tempdir().unwrap();

        let submission = SubmissionRecord::new(Uuid::new_v4(), placeholder_pdf(dir.path()));
        insert_submission(&conn, &submission).unwrap();

        processor(&["Дата взятия: 05.03.2024\nГемоглобин 135 г/л"])
            .process(&mut conn, submission.id);
        let stored = get_submission(&conn, submission.id).unwrap();
        assert_eq!(stored.test_date, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(stored.test_date_source, Some(TestDateSource::Extracted));

        // Re-run against a corrected document. The date from the first run
        // was extracted, not operator input, so it must not stick.
        conn.execute(
            "UPDATE submissions SET status = 'FAILED' WHERE id = ?1",
            rusqlite::params![submission.id.to_string()],
        )
        .unwrap();
        processor(&["Дата взятия: 10.04.2024\nГемоглобин 135 г/л"])
            .process(&mut conn, submission.id);

        let stored = get_submission(&conn, submission.id).unwrap();
        assert_eq!(stored.status, ProcessingStatus::Completed);
        assert_eq!(stored.test_date, NaiveDate::from_ymd_opt(2024, 4, 10));
        let report = stored.report.unwrap();
        assert!(report.contains("Extracted Test Date: 10.04.2024"));
        assert!(!report.contains("pre-filled"));
    }

    #[test]
    fn document_dated_today_is_accepted() {
        let mut conn = open_memory_database().unwrap();
        seeded_db(&conn);
        let dir = tempfile::tempdir().unwrap();

        let submission = SubmissionRecord::new(Uuid::new_v4(), placeholder_pdf(dir.path()));
        insert_submission(&conn, &submission).unwrap();

        // The plausibility window runs to local tomorrow, so a report
        // printed today parses whatever the wall-clock offset is.
        let today = Local::now().date_naive();
        let page = format!("Дата взятия: {}\nГемоглобин 135 г/л", today.format("%d.%m.%Y"));
        processor(&[&page]).process(&mut conn, submission.id);

        let stored = get_submission(&conn, submission.id).unwrap();
        assert_eq!(stored.test_date, Some(today));
    }

    #[test]
    fn test_type_determined_automatically() {
        let mut conn = open_memory_database().unwrap();
        let (hb, glu) = seeded_db(&conn);
        let cbc = TestTypeDefinition {
            id: Uuid::new_v4(),
            name: "Общий анализ крови".into(),
            description: None,
            typical_analytes: vec![hb.id, glu.id],
        };
        insert_test_type(&conn, &cbc).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let submission = SubmissionRecord::new(Uuid::new_v4(), placeholder_pdf(dir.path()));
        insert_submission(&conn, &submission).unwrap();

        processor(&["Гемоглобин 135 г/л\nГлюкоза 5.0 ммоль/л"])
            .process(&mut conn, submission.id);

        let stored = get_submission(&conn, submission.id).unwrap();
        assert_eq!(stored.test_type_id, Some(cbc.id));
        assert!(stored
            .report
            .unwrap()
            .contains("Automatically determined Test Type: Общий анализ крови"));
    }

    #[test]
    fn operator_type_skips_classification() {
        let mut conn = open_memory_database().unwrap();
        let (hb, _) = seeded_db(&conn);
        let preset = TestTypeDefinition {
            id: Uuid::new_v4(),
            name: "Биохимия".into(),
            description: None,
            typical_analytes: vec![hb.id],
        };
        insert_test_type(&conn, &preset).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut submission = SubmissionRecord::new(Uuid::new_v4(), placeholder_pdf(dir.path()));
        submission.test_type_id = Some(preset.id);
        insert_submission(&conn, &submission).unwrap();

        processor(&["Гемоглобин 135 г/л"]).process(&mut conn, submission.id);

        let stored = get_submission(&conn, submission.id).unwrap();
        assert_eq!(stored.test_type_id, Some(preset.id));
        assert!(stored
            .report
            .unwrap()
            .contains("Test Type was pre-selected by user."));
    }

    #[test]
    fn unclaimable_submission_is_left_alone() {
        let mut conn = open_memory_database().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut submission = SubmissionRecord::new(Uuid::new_v4(), placeholder_pdf(dir.path()));
        submission.status = ProcessingStatus::Processing;
        insert_submission(&conn, &submission).unwrap();

        processor(&["Гемоглобин 135 г/л"]).process(&mut conn, submission.id);

        let stored = get_submission(&conn, submission.id).unwrap();
        assert_eq!(stored.status, ProcessingStatus::Processing);
        assert!(stored.report.is_none());
    }

    #[test]
    fn unrecognized_lines_are_summarized_up_front() {
        let mut conn = open_memory_database().unwrap();
        seeded_db(&conn);
        let dir = tempfile::tempdir().unwrap();
        let submission = SubmissionRecord::new(Uuid::new_v4(), placeholder_pdf(dir.path()));
        insert_submission(&conn, &submission).unwrap();

        processor(&["Неизвестный показатель 12.3 ммоль/л (1-5)"])
            .process(&mut conn, submission.id);

        let report = get_submission(&conn, submission.id)
            .unwrap()
            .report
            .unwrap();
        let body = report.split("---\n").nth(1).unwrap();
        assert!(body.starts_with("Found 1 lines that look like unrecognized results"));
        assert!(body.contains("Possibly unrecognized result"));
    }

    #[test]
    fn racing_runs_resolve_to_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("race.db");
        {
            let conn = open_database(&db_path).unwrap();
            seeded_db(&conn);
            let submission = SubmissionRecord::new(Uuid::new_v4(), placeholder_pdf(dir.path()));
            insert_submission(&conn, &submission).unwrap();

            let p = processor(&["Гемоглобин 135 г/л (120-160)"]);
            let id = submission.id;
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let p = p.clone();
                    let db_path = db_path.clone();
                    std::thread::spawn(move || {
                        let mut conn = open_database(&db_path).unwrap();
                        p.process(&mut conn, id);
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }

            let stored = get_submission(&conn, submission.id).unwrap();
            assert_eq!(stored.status, ProcessingStatus::Completed);
            let results = get_results_for_submission(&conn, submission.id).unwrap();
            assert_eq!(results.len(), 1);
        }
    }
}
