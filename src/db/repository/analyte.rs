//! Reference-data store: analyte and test-type definitions.
//!
//! Operator-maintained rows, read-only to the pipeline. Loaded fresh at the
//! start of every processing run so edits take effect without a restart.

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{AnalyteDefinition, TestTypeDefinition};

pub fn insert_analyte(conn: &Connection, analyte: &AnalyteDefinition) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO analytes (id, name, name_en, name_ru, name_kk, abbreviations, unit, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            analyte.id.to_string(),
            analyte.name,
            analyte.name_en,
            analyte.name_ru,
            analyte.name_kk,
            analyte.abbreviations,
            analyte.unit,
            analyte.description,
        ],
    )?;
    Ok(())
}

pub fn get_all_analytes(conn: &Connection) -> Result<Vec<AnalyteDefinition>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, name_en, name_ru, name_kk, abbreviations, unit, description
         FROM analytes ORDER BY name",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            AnalyteDefinition {
                id: Uuid::nil(),
                name: row.get(1)?,
                name_en: row.get(2)?,
                name_ru: row.get(3)?,
                name_kk: row.get(4)?,
                abbreviations: row.get(5)?,
                unit: row.get(6)?,
                description: row.get(7)?,
            },
        ))
    })?;

    let mut analytes = Vec::new();
    for row in rows {
        let (id, mut analyte) = row?;
        analyte.id = parse_uuid(&id)?;
        analytes.push(analyte);
    }
    Ok(analytes)
}

pub fn insert_test_type(
    conn: &Connection,
    test_type: &TestTypeDefinition,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO test_types (id, name, description) VALUES (?1, ?2, ?3)",
        params![
            test_type.id.to_string(),
            test_type.name,
            test_type.description,
        ],
    )?;
    for analyte_id in &test_type.typical_analytes {
        conn.execute(
            "INSERT INTO test_type_analytes (test_type_id, analyte_id) VALUES (?1, ?2)",
            params![test_type.id.to_string(), analyte_id.to_string()],
        )?;
    }
    Ok(())
}

/// All test types with their typical-analyte sets, in name order.
pub fn get_all_test_types(conn: &Connection) -> Result<Vec<TestTypeDefinition>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT id, name, description FROM test_types ORDER BY name")?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
        ))
    })?;

    let mut types = Vec::new();
    for row in rows {
        let (id, name, description) = row?;
        let id = parse_uuid(&id)?;

        let mut analyte_stmt = conn.prepare(
            "SELECT analyte_id FROM test_type_analytes WHERE test_type_id = ?1",
        )?;
        let analyte_rows =
            analyte_stmt.query_map(params![id.to_string()], |row| row.get::<_, String>(0))?;

        let mut typical_analytes = Vec::new();
        for analyte_row in analyte_rows {
            typical_analytes.push(parse_uuid(&analyte_row?)?);
        }

        types.push(TestTypeDefinition {
            id,
            name,
            description,
            typical_analytes,
        });
    }
    Ok(types)
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}
