//! Per-field finders operating on a text segment.
//!
//! Each finder is a pure function over its input plus the compiled
//! vocabulary; failures are expressed as `None`, never as errors.

use super::lexicon::CompiledLexicon;
use super::patterns::{REF_RANGE_PATTERN, UNIT_PATTERN, VALUE_PATTERN};

/// First decimal-like token in the segment, comma normalized to period.
/// Returns the raw string and the match's end offset so the caller can
/// continue scanning the remainder.
pub fn find_value(segment: &str) -> Option<(String, usize)> {
    let m = VALUE_PATTERN.find(segment)?;
    Some((m.as_str().replace(',', "."), m.end()))
}

/// First recognized unit token, canonicalized; falls back to the
/// caller-supplied default when the segment carries none.
pub fn find_unit(segment: &str, default_unit: &str, lexicon: &CompiledLexicon) -> String {
    match UNIT_PATTERN.find(segment) {
        Some(m) => {
            let unit = m.as_str();
            lexicon
                .canonical_unit(unit)
                .unwrap_or(unit)
                .to_string()
        }
        None => {
            tracing::debug!(segment, default_unit, "no unit found, using default");
            default_unit.to_string()
        }
    }
}

/// First range-shaped match with enclosing brackets/parens stripped.
/// A match with no digit is discarded as a false positive.
pub fn find_reference_range(segment: &str) -> Option<String> {
    let m = REF_RANGE_PATTERN.find(segment)?;
    let cleaned: String = m
        .as_str()
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '[' | ']'))
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.chars().any(|c| c.is_ascii_digit()) {
        Some(cleaned)
    } else {
        tracing::debug!(segment, "range-shaped match without digits ignored");
        None
    }
}

/// Status phrase at the end of the line, with the abnormality verdict it
/// implies. Unrecognized trailing text yields `None`.
pub fn find_status_text(line: &str, lexicon: &CompiledLexicon) -> Option<(String, bool)> {
    let caps = lexicon.status_pattern.captures(line)?;
    let phrase = caps.get(1)?.as_str().trim().to_string();
    let verdict = lexicon.verdict(&phrase)?;
    Some((phrase, verdict))
}
