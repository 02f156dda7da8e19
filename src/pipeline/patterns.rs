//! Precompiled matchers shared by the field extractors.
//!
//! All patterns are immutable statics; matching is a pure function of the
//! input text. The unit list mixes metric and count-based lab units in
//! Russian and English notation, matched case-insensitively as whole words.

use std::sync::LazyLock;

use regex::Regex;

/// Unit token fragments. These are regex fragments, not literals, so
/// spacing/punctuation variants collapse into one entry.
const UNIT_FRAGMENTS: &[&str] = &[
    r"г/л", r"g/l", r"г/дл", r"g/dl", r"%", r"проц\.?", r"фл", r"fl", r"пг", r"pg",
    r"млн[./\s]?мкл", r"млн[./\s]?мка", r"x\s?10\^?12/?л", r"10\^?12/?л", r"10\s?\*\s?12/?л",
    r"х\s?10\s?\*\s?12/?л",
    r"тыс[./\s]?мкл", r"тыс[./\s]?мка", r"x\s?10\^?9/?л", r"10\^?9/?л", r"10\s?\*\s?9/?л",
    r"х\s?10\s?\*\s?9/?л",
    r"сек", r"с", r"seconds?", r"нг/мл", r"ng/ml", r"мкг/л", r"ug/l", r"мкг/дл", r"ug/dl",
    r"мкмоль/л", r"µmol/l", r"umol/l", r"ммоль/л", r"mmol/l", r"Ед/л", r"U/L", r"Е/л",
    r"IU/L", r"МЕ/л", r"МЕ/мл", r"мМЕ/л", r"mIU/L", r"мкМЕ/мл", r"uIU/mL", r"мг/дл",
    r"mg/dl", r"мг/л", r"mg/l", r"мг/сут", r"г/сут", r"мм/час", r"mm/hr", r"мм/ч",
    r"пмоль/л", r"pmol/l", r"нмоль/л", r"nmol/l", r"пг/мл", r"мкг/мл", r"КОЕ/мл",
    r"CFU/ml", r"титр", r"индекс", r"ratio", r"отн\.?\s*ед\.?", r"в п/з", r"/hpf", r"/lpf",
    r"мл/мин", r"ml/min", r"мм",
];

/// First recognized unit token in a segment.
pub static UNIT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // \b only binds next to word characters; fragments that start or end
    // with punctuation ("%", "/hpf") get no boundary on that side.
    let alternation = UNIT_FRAGMENTS
        .iter()
        .map(|f| {
            let start = if f.starts_with(|c: char| c.is_alphanumeric()) {
                r"\b"
            } else {
                ""
            };
            let end = if f.ends_with(|c: char| c.is_alphanumeric() || c == '?') {
                r"\b"
            } else {
                ""
            };
            format!("{start}(?:{f}){end}")
        })
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i)({alternation})")).expect("unit pattern compiles")
});

/// Reference-range shapes: `A-B`, `<A`, `<=A`, `>A`, `>=A`, and the
/// parenthesized/bracketed variants of each.
pub static REF_RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)(?:",
        r"[(\[]?\d+[.,]?\d*\s*-\s*\d+[.,]?\d*[)\]]?",
        r"|[(\[]?(?:<=|>=|<|>)\s*\d+[.,]?\d*[)\]]?",
        r")",
    ))
    .expect("reference range pattern compiles")
});

/// Bare signed decimal number; `,` and `.` both accepted as separator.
pub static VALUE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([-+]?\d+(?:[.,]\d+)?)").expect("value pattern compiles"));

/// Date-shaped token: `D/M/Y` or `Y/M/D` with `.`, `/` or `-` separators.
pub static DATE_TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2}[./-]\d{1,2}[./-]\d{4}|\d{4}[./-]\d{1,2}[./-]\d{1,2})")
        .expect("date token pattern compiles")
});

/// Shape of a plausible result line: a textual label followed by a number,
/// anywhere in the line (labels may sit behind row numbers or punctuation).
/// Used only to flag unrecognized lines for operator review.
pub static CANDIDATE_RESULT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-zA-Zа-яА-ЯёЁ\s()\-]+?)\s+[-+]?\d+(?:[.,]\d+)?")
        .expect("candidate result pattern compiles")
});
