//! Submission lifecycle: the claim pattern lives here.
//!
//! Both state transitions are single conditional UPDATEs. Entering
//! PROCESSING succeeds only from PENDING or FAILED, so two racing runs on
//! the same submission resolve to exactly one owner. Leaving PROCESSING is
//! conditioned on the status still being PROCESSING, so a finished run
//! never clobbers a record another run has since claimed.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::analyte::parse_uuid;
use crate::db::DatabaseError;
use crate::models::{ProcessingStatus, SubmissionRecord, TestDateSource};

pub fn insert_submission(
    conn: &Connection,
    submission: &SubmissionRecord,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO submissions (id, owner_id, test_type_id, test_date, test_date_source,
         notes, file_path, status, report, extracted_text, submitted_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            submission.id.to_string(),
            submission.owner_id.to_string(),
            submission.test_type_id.map(|id| id.to_string()),
            submission.test_date.map(|d| d.to_string()),
            submission.test_date_source.map(|s| s.as_str()),
            submission.notes,
            submission.file_path,
            submission.status.as_str(),
            submission.report,
            submission.extracted_text,
            submission.submitted_at.to_rfc3339(),
            submission.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_submission(conn: &Connection, id: Uuid) -> Result<SubmissionRecord, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, owner_id, test_type_id, test_date, test_date_source, notes, file_path,
         status, report, extracted_text, submitted_at, updated_at
         FROM submissions WHERE id = ?1",
    )?;

    let row = stmt
        .query_row(params![id.to_string()], |row| {
            Ok(SubmissionRow {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                test_type_id: row.get(2)?,
                test_date: row.get(3)?,
                test_date_source: row.get(4)?,
                notes: row.get(5)?,
                file_path: row.get(6)?,
                status: row.get(7)?,
                report: row.get(8)?,
                extracted_text: row.get(9)?,
                submitted_at: row.get(10)?,
                updated_at: row.get(11)?,
            })
        })
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DatabaseError::NotFound {
                entity_type: "submission".into(),
                id: id.to_string(),
            },
            other => DatabaseError::Sqlite(other),
        })?;

    submission_from_row(row)
}

/// Claim a submission for processing.
///
/// Atomic conditional transition PENDING|FAILED → PROCESSING that also
/// clears the previous run's extracted text and report. A test date
/// survives the claim only when its recorded provenance is OPERATOR; a
/// date a previous run extracted is cleared and re-derived.
///
/// Returns false when zero rows changed — another run owns the record,
/// or it no longer exists. Callers must then stand down silently.
pub fn claim_for_processing(conn: &Connection, id: Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE submissions
         SET status = 'PROCESSING', report = NULL, extracted_text = NULL,
             test_date = CASE WHEN test_date_source = 'OPERATOR' THEN test_date END,
             test_date_source = CASE WHEN test_date_source = 'OPERATOR' THEN test_date_source END,
             updated_at = ?2
         WHERE id = ?1 AND status IN ('PENDING', 'FAILED')",
        params![id.to_string(), Utc::now().to_rfc3339()],
    )?;
    Ok(changed == 1)
}

/// Persist the raw extracted text and, when extraction found one, the test
/// date (marked EXTRACTED so the next claim clears it again).
pub fn save_extracted_text(
    conn: &Connection,
    id: Uuid,
    text: &str,
    test_date: Option<NaiveDate>,
) -> Result<(), DatabaseError> {
    match test_date {
        Some(date) => conn.execute(
            "UPDATE submissions SET extracted_text = ?2, test_date = ?3,
             test_date_source = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                id.to_string(),
                text,
                date.to_string(),
                TestDateSource::Extracted.as_str(),
                Utc::now().to_rfc3339()
            ],
        )?,
        None => conn.execute(
            "UPDATE submissions SET extracted_text = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), text, Utc::now().to_rfc3339()],
        )?,
    };
    Ok(())
}

/// Finalize a processing run: PROCESSING → COMPLETED | FAILED.
///
/// Conditioned on the status still being PROCESSING. The determined test
/// type and date are written only on success and only when present.
/// Returns false when zero rows changed (not our run to finish).
pub fn finalize(
    conn: &Connection,
    id: Uuid,
    status: ProcessingStatus,
    report: &str,
    test_type_id: Option<Uuid>,
    test_date: Option<NaiveDate>,
) -> Result<bool, DatabaseError> {
    debug_assert!(matches!(
        status,
        ProcessingStatus::Completed | ProcessingStatus::Failed
    ));

    let now = Utc::now().to_rfc3339();
    let changed = if status == ProcessingStatus::Completed {
        conn.execute(
            "UPDATE submissions
             SET status = ?2, report = ?3, updated_at = ?4,
                 test_type_id = COALESCE(?5, test_type_id),
                 test_date = COALESCE(?6, test_date),
                 test_date_source = CASE WHEN ?6 IS NOT NULL
                     THEN 'EXTRACTED' ELSE test_date_source END
             WHERE id = ?1 AND status = 'PROCESSING'",
            params![
                id.to_string(),
                status.as_str(),
                report,
                now,
                test_type_id.map(|t| t.to_string()),
                test_date.map(|d| d.to_string()),
            ],
        )?
    } else {
        conn.execute(
            "UPDATE submissions SET status = ?2, report = ?3, updated_at = ?4
             WHERE id = ?1 AND status = 'PROCESSING'",
            params![id.to_string(), status.as_str(), report, now],
        )?
    };
    Ok(changed == 1)
}

/// Submissions awaiting processing, oldest first. Used by hosts to
/// re-enqueue work after a restart.
pub fn get_pending_submissions(conn: &Connection) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM submissions WHERE status IN ('PENDING', 'FAILED')
         ORDER BY submitted_at",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(parse_uuid(&row?)?);
    }
    Ok(ids)
}

struct SubmissionRow {
    id: String,
    owner_id: String,
    test_type_id: Option<String>,
    test_date: Option<String>,
    test_date_source: Option<String>,
    notes: Option<String>,
    file_path: String,
    status: String,
    report: Option<String>,
    extracted_text: Option<String>,
    submitted_at: String,
    updated_at: String,
}

fn submission_from_row(row: SubmissionRow) -> Result<SubmissionRecord, DatabaseError> {
    Ok(SubmissionRecord {
        id: parse_uuid(&row.id)?,
        owner_id: parse_uuid(&row.owner_id)?,
        test_type_id: row.test_type_id.as_deref().map(parse_uuid).transpose()?,
        test_date: row
            .test_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        test_date_source: row
            .test_date_source
            .as_deref()
            .map(TestDateSource::from_str)
            .transpose()?,
        notes: row.notes,
        file_path: row.file_path,
        status: ProcessingStatus::from_str(&row.status)?,
        report: row.report,
        extracted_text: row.extracted_text,
        submitted_at: parse_timestamp(&row.submitted_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}
