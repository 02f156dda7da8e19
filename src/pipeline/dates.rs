//! Test-date extraction from report text.
//!
//! A date keyword on a line opens a search window covering that line and
//! the next two; the first date-shaped token that parses and falls inside
//! the plausibility window wins.

use chrono::{Days, NaiveDate};

use super::lexicon::CompiledLexicon;
use super::patterns::DATE_TOKEN_PATTERN;

/// Scan the document for a plausible collection/test date.
///
/// `today` is passed in so the plausibility window (earliest..=tomorrow)
/// is deterministic under test.
pub fn extract_test_date(
    text: &str,
    lexicon: &CompiledLexicon,
    earliest: NaiveDate,
    today: NaiveDate,
) -> Option<NaiveDate> {
    let latest = today.checked_add_days(Days::new(1)).unwrap_or(today);
    let lines: Vec<&str> = text.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        if !lexicon.has_date_keyword(line) {
            continue;
        }
        // The date often sits on the line after its label.
        let window_end = (i + 3).min(lines.len());
        let search_area = lines[i..window_end].join("\n");

        for token in DATE_TOKEN_PATTERN.find_iter(&search_area) {
            let Some(date) = parse_date_token(token.as_str()) else {
                tracing::warn!(token = token.as_str(), "date token did not parse");
                continue;
            };
            if date >= earliest && date <= latest {
                tracing::info!(%date, "extracted test date");
                return Some(date);
            }
            tracing::warn!(%date, "parsed date outside the plausible window");
        }
    }

    tracing::warn!("could not extract a plausible test date");
    None
}

/// Parse a date token day-first: `D.M.Y` (or `D/M/Y`, `D-M-Y`) and the
/// year-first form `Y.M.D`.
fn parse_date_token(token: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = token.split(['.', '/', '-']).collect();
    if parts.len() != 3 {
        return None;
    }

    let (year, month, day) = if parts[0].len() == 4 {
        (parts[0], parts[1], parts[2])
    } else {
        (parts[2], parts[1], parts[0])
    };

    NaiveDate::from_ymd_opt(
        year.parse().ok()?,
        month.parse().ok()?,
        day.parse().ok()?,
    )
}
