//! Extracted-result persistence and the longitudinal queries built on it.
//!
//! A processing run replaces the full result set for its submission inside
//! one transaction, so a partial failure never leaves a mix of old and new
//! rows and re-processing converges to the same state.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::analyte::parse_uuid;
use crate::db::DatabaseError;
use crate::models::ExtractedResult;

/// Delete all prior results for the submission and insert the new set,
/// atomically. Returns the number of rows deleted.
pub fn replace_results(
    conn: &mut Connection,
    submission_id: Uuid,
    results: &[ExtractedResult],
) -> Result<usize, DatabaseError> {
    let tx = conn.transaction()?;

    let deleted = tx.execute(
        "DELETE FROM results WHERE submission_id = ?1",
        params![submission_id.to_string()],
    )?;

    for result in results {
        tx.execute(
            "INSERT INTO results (id, submission_id, analyte_id, value, value_numeric,
             unit, reference_range, status_text, is_abnormal, extracted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                result.id.to_string(),
                result.submission_id.to_string(),
                result.analyte_id.to_string(),
                result.value,
                result.value_numeric.map(|v| v.to_string()),
                result.unit,
                result.reference_range,
                result.status_text,
                result.is_abnormal,
                result.extracted_at.to_rfc3339(),
            ],
        )?;
    }

    tx.commit()?;
    Ok(deleted)
}

pub fn get_results_for_submission(
    conn: &Connection,
    submission_id: Uuid,
) -> Result<Vec<ExtractedResult>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_COLUMNS} FROM results r WHERE r.submission_id = ?1 ORDER BY r.extracted_at"
    ))?;
    let rows = stmt.query_map(params![submission_id.to_string()], map_result_row)?;
    collect_results(rows)
}

/// All measurements of one analyte across submissions, newest test first.
/// This is the query behind longitudinal trend views.
pub fn get_results_by_analyte(
    conn: &Connection,
    analyte_id: Uuid,
) -> Result<Vec<ExtractedResult>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_COLUMNS} FROM results r
         JOIN submissions s ON s.id = r.submission_id
         WHERE r.analyte_id = ?1
         ORDER BY s.test_date DESC, r.extracted_at DESC"
    ))?;
    let rows = stmt.query_map(params![analyte_id.to_string()], map_result_row)?;
    collect_results(rows)
}

/// Results flagged abnormal, for operator review screens.
pub fn get_abnormal_results(conn: &Connection) -> Result<Vec<ExtractedResult>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_COLUMNS} FROM results r WHERE r.is_abnormal = 1 ORDER BY r.extracted_at DESC"
    ))?;
    let rows = stmt.query_map([], map_result_row)?;
    collect_results(rows)
}

const SELECT_COLUMNS: &str = "SELECT r.id, r.submission_id, r.analyte_id, r.value, \
     r.value_numeric, r.unit, r.reference_range, r.status_text, r.is_abnormal, r.extracted_at";

struct ResultRow {
    id: String,
    submission_id: String,
    analyte_id: String,
    value: String,
    value_numeric: Option<String>,
    unit: String,
    reference_range: Option<String>,
    status_text: Option<String>,
    is_abnormal: Option<bool>,
    extracted_at: String,
}

fn map_result_row(row: &rusqlite::Row<'_>) -> Result<ResultRow, rusqlite::Error> {
    Ok(ResultRow {
        id: row.get(0)?,
        submission_id: row.get(1)?,
        analyte_id: row.get(2)?,
        value: row.get(3)?,
        value_numeric: row.get(4)?,
        unit: row.get(5)?,
        reference_range: row.get(6)?,
        status_text: row.get(7)?,
        is_abnormal: row.get(8)?,
        extracted_at: row.get(9)?,
    })
}

fn collect_results(
    rows: impl Iterator<Item = Result<ResultRow, rusqlite::Error>>,
) -> Result<Vec<ExtractedResult>, DatabaseError> {
    let mut results = Vec::new();
    for row in rows {
        results.push(result_from_row(row?)?);
    }
    Ok(results)
}

fn result_from_row(row: ResultRow) -> Result<ExtractedResult, DatabaseError> {
    Ok(ExtractedResult {
        id: parse_uuid(&row.id)?,
        submission_id: parse_uuid(&row.submission_id)?,
        analyte_id: parse_uuid(&row.analyte_id)?,
        value: row.value,
        value_numeric: row
            .value_numeric
            .as_deref()
            .and_then(|v| Decimal::from_str(v).ok()),
        unit: row.unit,
        reference_range: row.reference_range,
        status_text: row.status_text,
        is_abnormal: row.is_abnormal,
        extracted_at: DateTime::parse_from_rfc3339(&row.extracted_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::{analyte, submission};
    use crate::models::{AnalyteDefinition, SubmissionRecord};
    use chrono::NaiveDate;

    fn seed(conn: &Connection) -> (Uuid, Uuid) {
        let hb = AnalyteDefinition {
            id: Uuid::new_v4(),
            name: "Hemoglobin".into(),
            name_en: None,
            name_ru: None,
            name_kk: None,
            abbreviations: String::new(),
            unit: "g/L".into(),
            description: None,
        };
        analyte::insert_analyte(conn, &hb).unwrap();
        let record = SubmissionRecord::new(Uuid::new_v4(), "/tmp/a.pdf");
        submission::insert_submission(conn, &record).unwrap();
        (record.id, hb.id)
    }

    fn make_result(submission_id: Uuid, analyte_id: Uuid, value: &str) -> ExtractedResult {
        ExtractedResult {
            id: Uuid::new_v4(),
            submission_id,
            analyte_id,
            value: value.into(),
            value_numeric: Decimal::from_str(value).ok(),
            unit: "g/L".into(),
            reference_range: Some("120-160".into()),
            status_text: None,
            is_abnormal: Some(false),
            extracted_at: Utc::now(),
        }
    }

    #[test]
    fn replace_results_round_trip() {
        let mut conn = open_memory_database().unwrap();
        let (submission_id, analyte_id) = seed(&conn);

        let result = make_result(submission_id, analyte_id, "135");
        replace_results(&mut conn, submission_id, &[result.clone()]).unwrap();

        let loaded = get_results_for_submission(&conn, submission_id).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].value, "135");
        assert_eq!(loaded[0].value_numeric, Decimal::from_str("135").ok());
        assert_eq!(loaded[0].reference_range.as_deref(), Some("120-160"));
        assert_eq!(loaded[0].is_abnormal, Some(false));
    }

    #[test]
    fn replace_results_is_idempotent() {
        let mut conn = open_memory_database().unwrap();
        let (submission_id, analyte_id) = seed(&conn);

        let first = make_result(submission_id, analyte_id, "135");
        replace_results(&mut conn, submission_id, &[first]).unwrap();
        let second = make_result(submission_id, analyte_id, "140");
        let deleted = replace_results(&mut conn, submission_id, &[second]).unwrap();

        assert_eq!(deleted, 1);
        let loaded = get_results_for_submission(&conn, submission_id).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].value, "140");
    }

    #[test]
    fn duplicate_analyte_in_one_run_rejected_atomically() {
        let mut conn = open_memory_database().unwrap();
        let (submission_id, analyte_id) = seed(&conn);

        let keep = make_result(submission_id, analyte_id, "130");
        replace_results(&mut conn, submission_id, &[keep]).unwrap();

        // Two rows for the same (submission, analyte) violate the unique
        // constraint; the transaction must roll back, keeping the old row.
        let a = make_result(submission_id, analyte_id, "135");
        let b = make_result(submission_id, analyte_id, "140");
        assert!(replace_results(&mut conn, submission_id, &[a, b]).is_err());

        let loaded = get_results_for_submission(&conn, submission_id).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].value, "130");
    }

    #[test]
    fn results_by_analyte_ordered_by_test_date() {
        let mut conn = open_memory_database().unwrap();
        let (_, analyte_id) = seed(&conn);

        let owner = Uuid::new_v4();
        let mut older = SubmissionRecord::new(owner, "/tmp/old.pdf");
        older.test_date = NaiveDate::from_ymd_opt(2023, 1, 10);
        let mut newer = SubmissionRecord::new(owner, "/tmp/new.pdf");
        newer.test_date = NaiveDate::from_ymd_opt(2024, 6, 1);
        submission::insert_submission(&conn, &older).unwrap();
        submission::insert_submission(&conn, &newer).unwrap();

        replace_results(&mut conn, older.id, &[make_result(older.id, analyte_id, "118")]).unwrap();
        replace_results(&mut conn, newer.id, &[make_result(newer.id, analyte_id, "142")]).unwrap();

        let trend = get_results_by_analyte(&conn, analyte_id).unwrap();
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].value, "142");
        assert_eq!(trend[1].value, "118");
    }

    #[test]
    fn abnormal_listing_filters_tri_state() {
        let mut conn = open_memory_database().unwrap();
        let (submission_id, analyte_id) = seed(&conn);

        let mut abnormal = make_result(submission_id, analyte_id, "180");
        abnormal.is_abnormal = Some(true);
        replace_results(&mut conn, submission_id, &[abnormal]).unwrap();

        let listed = get_abnormal_results(&conn).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].value, "180");
    }
}
