//! Line scanning: the core extraction algorithm.
//!
//! Single pass over the document's lines. Each line is matched against the
//! alias map (longest alias first); a matched line must carry a numeric
//! value after the alias to become a result candidate. The consumed-analyte
//! set is explicit and scoped to one document, enforcing at most one result
//! per analyte per document.

use std::collections::HashSet;

use rust_decimal::Decimal;
use uuid::Uuid;

use super::aliases::AliasMap;
use super::fields::{find_reference_range, find_status_text, find_unit, find_value};
use super::lexicon::CompiledLexicon;
use super::patterns::CANDIDATE_RESULT_PATTERN;
use super::range::{classify_abnormal, parse_reference_range};
use super::report::truncate_chars;

const VALUE_MAX_LEN: usize = 100;
const UNIT_MAX_LEN: usize = 50;
const RANGE_MAX_LEN: usize = 150;
const STATUS_MAX_LEN: usize = 100;

/// One fully extracted result line, not yet persisted.
#[derive(Debug, Clone)]
pub struct ResultCandidate {
    pub analyte_id: Uuid,
    pub analyte_name: String,
    pub alias: String,
    pub value: String,
    pub value_numeric: Option<Decimal>,
    pub unit: String,
    pub reference_range: Option<String>,
    pub status_text: Option<String>,
    pub is_abnormal: Option<bool>,
}

/// Outcome of scanning one document.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub candidates: Vec<ResultCandidate>,
    /// One-line summaries for the processing report, in extraction order.
    pub details: Vec<String>,
    /// Lines that look like results but matched no known alias.
    pub unrecognized: Vec<String>,
}

/// Scan every line of the document text.
///
/// Page-break markers are inert. Lines that match an alias but carry no
/// numeric value after it produce no record and remain eligible for the
/// unrecognized-line pass.
pub fn scan_lines(
    text: &str,
    aliases: &AliasMap,
    lexicon: &CompiledLexicon,
    page_break_marker: &str,
) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    let mut consumed_analytes: HashSet<Uuid> = HashSet::new();
    let mut consumed_lines: HashSet<usize> = HashSet::new();

    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    for (i, &line) in lines.iter().enumerate() {
        if line.is_empty() || line == page_break_marker {
            continue;
        }

        let Some(hit) = aliases.find_in_line(line, &consumed_analytes) else {
            continue;
        };

        let segment = line[hit.end..].trim_start();
        let Some((value, value_end)) = find_value(segment) else {
            tracing::debug!(
                line = i,
                alias = hit.alias,
                analyte = %hit.analyte.name,
                "alias matched but no value follows, not a result line"
            );
            continue;
        };

        let value_numeric = match value.parse::<Decimal>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(value = %value, analyte = %hit.analyte.name, error = %e,
                    "value token is not a valid decimal");
                outcome
                    .details
                    .push(format!("Invalid number '{value}' for {}.", hit.analyte.name));
                continue;
            }
        };

        let remainder = segment[value_end..].trim_start();
        let reference_range = find_reference_range(remainder);
        let unit = find_unit(remainder, &hit.analyte.unit, lexicon);
        let status = find_status_text(line, lexicon);

        // Status text takes precedence over the range-derived verdict.
        let is_abnormal = match (&status, &reference_range, value_numeric) {
            (Some((_, verdict)), _, _) => Some(*verdict),
            (None, Some(range), Some(value)) => {
                let (lower, upper) = parse_reference_range(range);
                classify_abnormal(value, lower, upper)
            }
            _ => None,
        };

        let mut detail = format!(
            "Parsed {} ('{}'): {} {}",
            hit.analyte.name, hit.alias, value, unit
        );
        if let Some(ref range) = reference_range {
            detail.push_str(&format!(" (Ref: {range})"));
        }
        if let Some((ref status_text, _)) = status {
            detail.push_str(&format!(" (Status: {status_text})"));
        } else if let Some(flag) = is_abnormal {
            detail.push_str(&format!(" (Abnormal: {flag})"));
        }

        outcome.candidates.push(ResultCandidate {
            analyte_id: hit.analyte.id,
            analyte_name: hit.analyte.name.clone(),
            alias: hit.alias.to_string(),
            value: truncate_chars(&value, VALUE_MAX_LEN),
            value_numeric,
            unit: truncate_chars(&unit, UNIT_MAX_LEN),
            reference_range: reference_range.map(|r| truncate_chars(&r, RANGE_MAX_LEN)),
            status_text: status.map(|(s, _)| truncate_chars(&s, STATUS_MAX_LEN)),
            is_abnormal,
        });
        outcome.details.push(detail);
        consumed_analytes.insert(hit.analyte.id);
        consumed_lines.insert(i);
    }

    // Secondary heuristic pass: flag lines that look like results but were
    // not extracted, for operator review. Never creates records.
    for (i, &line) in lines.iter().enumerate() {
        if line.is_empty() || line == page_break_marker || consumed_lines.contains(&i) {
            continue;
        }
        if line.split_whitespace().count() < 3 {
            continue;
        }
        if lexicon.header_pattern.is_match(line) {
            continue;
        }
        let Some(caps) = CANDIDATE_RESULT_PATTERN.captures(line) else {
            continue;
        };
        let label = caps[1].trim().to_string();
        if label.chars().count() > 3 && label.chars().any(char::is_alphabetic) {
            tracing::warn!(line = i, text = line, "possibly unrecognized result line");
            outcome
                .unrecognized
                .push(format!("Possibly unrecognized result (line {i}): '{line}'"));
        }
    }

    outcome
}
