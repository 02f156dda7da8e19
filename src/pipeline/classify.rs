//! Test-type classification by typical-analyte overlap.

use std::collections::HashSet;

use uuid::Uuid;

use crate::models::TestTypeDefinition;

/// Score each test type by the fraction of its typical analytes found in
/// this run, and pick the best one at or above `threshold` (percent).
///
/// Types with an empty typical set are not scored. Ties are broken by
/// first-encountered order.
pub fn determine_test_type<'a>(
    found_analytes: &HashSet<Uuid>,
    test_types: &'a [TestTypeDefinition],
    threshold: f64,
) -> Option<(&'a TestTypeDefinition, f64)> {
    if found_analytes.is_empty() {
        tracing::warn!("cannot determine test type: no analytes found");
        return None;
    }

    let mut best: Option<(&TestTypeDefinition, f64)> = None;

    for test_type in test_types {
        if test_type.typical_analytes.is_empty() {
            continue;
        }
        let hits = test_type
            .typical_analytes
            .iter()
            .filter(|id| found_analytes.contains(id))
            .count();
        let score = hits as f64 / test_type.typical_analytes.len() as f64 * 100.0;
        tracing::debug!(
            test_type = %test_type.name,
            hits,
            typical = test_type.typical_analytes.len(),
            score,
            "test type scored"
        );

        if score >= threshold && best.map_or(true, |(_, s)| score > s) {
            best = Some((test_type, score));
        }
    }

    match best {
        Some((test_type, score)) => {
            tracing::info!(test_type = %test_type.name, score, "determined test type");
            Some((test_type, score))
        }
        None => {
            tracing::warn!(threshold, "no test type met the classification threshold");
            None
        }
    }
}
