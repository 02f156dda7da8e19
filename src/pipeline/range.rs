//! Reference-range parsing and abnormality classification.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

static BOUNDED_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*-\s*(\d+(?:\.\d+)?)\b").expect("bounded range compiles")
});
static UPPER_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:<=|<)\s*(\d+(?:\.\d+)?)\b").expect("upper-only range compiles")
});
static LOWER_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:>=|>)\s*(\d+(?:\.\d+)?)\b").expect("lower-only range compiles")
});

/// Parse a reference-range string into optional numeric bounds.
///
/// Recognized shapes, in order: `A-B` (which covers `0-A`), `<A`/`<=A`
/// (upper bound only), `>A`/`>=A` (lower bound only). Unrecognized shapes
/// are a data-quality event, not an error: they are logged and yield
/// `(None, None)`.
pub fn parse_reference_range(range_str: &str) -> (Option<Decimal>, Option<Decimal>) {
    let normalized = range_str.trim().replace(',', ".");

    if let Some(caps) = BOUNDED_RANGE.captures(&normalized) {
        let lower = Decimal::from_str(&caps[1]).ok();
        let upper = Decimal::from_str(&caps[2]).ok();
        if lower.is_some() && upper.is_some() {
            return (lower, upper);
        }
    }
    if let Some(caps) = UPPER_ONLY.captures(&normalized) {
        if let Ok(upper) = Decimal::from_str(&caps[1]) {
            return (None, Some(upper));
        }
    }
    if let Some(caps) = LOWER_ONLY.captures(&normalized) {
        if let Ok(lower) = Decimal::from_str(&caps[1]) {
            return (Some(lower), None);
        }
    }

    tracing::warn!(range = range_str, "reference range format not recognized");
    (None, None)
}

/// Tri-state abnormality by range comparison.
///
/// `Some(true)` when the value falls below a known lower bound or above a
/// known upper bound; `Some(false)` only when both bounds are known and the
/// value lies within; `None` when the bounds do not permit a verdict.
pub fn classify_abnormal(
    value: Decimal,
    lower: Option<Decimal>,
    upper: Option<Decimal>,
) -> Option<bool> {
    if let Some(lower) = lower {
        if value < lower {
            return Some(true);
        }
    }
    if let Some(upper) = upper {
        if value > upper {
            return Some(true);
        }
    }
    match (lower, upper) {
        (Some(_), Some(_)) => Some(false),
        _ => None,
    }
}
