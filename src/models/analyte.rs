use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical identity for a measurable lab quantity (e.g., Hemoglobin).
///
/// Reference data: created and edited by an operator, read-only to the
/// pipeline. The localized names and comma-separated abbreviations all
/// identify the same analyte in free report text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyteDefinition {
    pub id: Uuid,
    /// Primary canonical name, unique across all analytes.
    pub name: String,
    pub name_en: Option<String>,
    pub name_ru: Option<String>,
    pub name_kk: Option<String>,
    /// Comma-separated abbreviations, e.g. "Hb, Hgb".
    pub abbreviations: String,
    /// Standard unit, used when the report line carries no unit of its own.
    pub unit: String,
    pub description: Option<String>,
}

impl AnalyteDefinition {
    /// Every known name and abbreviation, lowercased and deduplicated.
    pub fn all_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for field in [
            Some(&self.name),
            self.name_en.as_ref(),
            self.name_ru.as_ref(),
            self.name_kk.as_ref(),
        ]
        .into_iter()
        .flatten()
        {
            let trimmed = field.trim().to_lowercase();
            if !trimmed.is_empty() {
                names.insert(trimmed);
            }
        }
        for abbr in self.abbreviations.split(',') {
            let trimmed = abbr.trim().to_lowercase();
            if !trimmed.is_empty() {
                names.insert(trimmed);
            }
        }
        names.into_iter().collect()
    }
}

/// Named test category (e.g., "CBC") with the analytes typically found in
/// that kind of report. The typical set drives classification scoring only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestTypeDefinition {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub typical_analytes: Vec<Uuid>,
}
