//! Locale-specific vocabulary: status phrases, unit canonicalization,
//! date keywords, table-header prefixes.
//!
//! These lists are heuristic and not exhaustive, so they live in data
//! rather than code: the bundled defaults cover Russian/Kazakh/English
//! reports and can be replaced wholesale from a JSON file.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LexiconError {
    #[error("Failed to read lexicon file {0}: {1}")]
    Read(String, String),

    #[error("Failed to parse lexicon file {0}: {1}")]
    Parse(String, String),

    #[error("Status phrase list does not compile into a pattern: {0}")]
    BadPhrase(String),
}

/// A status phrase and the abnormality verdict it implies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPhrase {
    pub phrase: String,
    pub abnormal: bool,
}

/// Raw, serializable vocabulary. Call [`Lexicon::compile`] before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lexicon {
    pub status_phrases: Vec<StatusPhrase>,
    /// Lowercased reported form → canonical unit string.
    pub unit_canonical: HashMap<String, String>,
    /// Phrases that announce a collection/test date nearby.
    pub date_keywords: Vec<String>,
    /// Table-header prefixes excluded from the unrecognized-line pass.
    pub header_prefixes: Vec<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        let normal = ["В норме", "Норма", "Отрицательно", "Не обнаружено",
            "Within normal range", "Normal", "Negative", "Not detected"];
        let abnormal = ["Ниже нормы", "Выше нормы", "Патология", "Отклонение",
            "Положительно", "Обнаружено", "Below normal", "Above normal",
            "Pathological", "Positive", "Detected"];

        let mut status_phrases = Vec::new();
        for phrase in abnormal {
            status_phrases.push(StatusPhrase {
                phrase: phrase.to_string(),
                abnormal: true,
            });
        }
        for phrase in normal {
            status_phrases.push(StatusPhrase {
                phrase: phrase.to_string(),
                abnormal: false,
            });
        }

        let unit_canonical = [
            ("тыс/мкл", "x10^9/л"),
            ("тыс./мкл", "x10^9/л"),
            ("тыс/мка", "x10^9/л"),
            ("млн/мкл", "x10^12/л"),
            ("млн./мкл", "x10^12/л"),
            ("млн/мка", "x10^12/л"),
            ("мм/ч", "мм/час"),
            ("г/дл", "g/dL"),
            ("пг", "pg"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        let date_keywords = [
            "Дата и время взятия биоматериала",
            "Биоматериалды алу мерзімі",
            "Дата взятия",
            "Дата анализа",
            "Дата исследования",
            "Test Date",
            "Collection Date",
            "Дата поступления образца",
            "Үлгінің келіп түскен күні",
            "Дата регистрации заявки",
            "Жолдаманы тіркеу мерзімі",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        let header_prefixes = [
            "Показатель",
            "Результат",
            "Норма",
            "Ед. изм.",
            "Статус",
            "ГЕМАТОЛОГИЯ",
            "Биохимия",
            "Коагулограмма",
            "Анализ мочи",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        Self {
            status_phrases,
            unit_canonical,
            date_keywords,
            header_prefixes,
        }
    }
}

impl Lexicon {
    /// Load a replacement vocabulary from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, LexiconError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| LexiconError::Read(path.display().to_string(), e.to_string()))?;
        serde_json::from_str(&raw)
            .map_err(|e| LexiconError::Parse(path.display().to_string(), e.to_string()))
    }

    /// Compile the vocabulary into matchers usable by the extractors.
    pub fn compile(&self) -> Result<CompiledLexicon, LexiconError> {
        // Longer phrases first so "Не обнаружено" is never shadowed by
        // "Обнаружено" inside it.
        let mut phrases: Vec<&StatusPhrase> = self.status_phrases.iter().collect();
        phrases.sort_by_key(|p| std::cmp::Reverse(p.phrase.chars().count()));

        let alternation = phrases
            .iter()
            .map(|p| regex::escape(&p.phrase))
            .collect::<Vec<_>>()
            .join("|");
        let status_pattern = Regex::new(&format!(r"(?i)\b({alternation})\s*$"))
            .map_err(|e| LexiconError::BadPhrase(e.to_string()))?;

        let verdict_by_phrase = self
            .status_phrases
            .iter()
            .map(|p| (p.phrase.to_lowercase(), p.abnormal))
            .collect();

        let header_alternation = self
            .header_prefixes
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        let header_pattern = Regex::new(&format!(r"(?i)^({header_alternation})"))
            .map_err(|e| LexiconError::BadPhrase(e.to_string()))?;

        Ok(CompiledLexicon {
            status_pattern,
            verdict_by_phrase,
            unit_canonical: self
                .unit_canonical
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone()))
                .collect(),
            date_keywords: self
                .date_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            header_pattern,
        })
    }
}

/// Compiled form of [`Lexicon`]; immutable, shared across a run.
#[derive(Debug, Clone)]
pub struct CompiledLexicon {
    /// Status vocabulary anchored at end of line.
    pub status_pattern: Regex,
    verdict_by_phrase: HashMap<String, bool>,
    unit_canonical: HashMap<String, String>,
    date_keywords: Vec<String>,
    pub header_pattern: Regex,
}

impl CompiledLexicon {
    /// Abnormality verdict for a recognized status phrase.
    pub fn verdict(&self, phrase: &str) -> Option<bool> {
        self.verdict_by_phrase.get(&phrase.to_lowercase()).copied()
    }

    /// Canonical form of a reported unit, if one is defined.
    pub fn canonical_unit(&self, unit: &str) -> Option<&str> {
        self.unit_canonical
            .get(&unit.to_lowercase())
            .map(String::as_str)
    }

    /// True when the line contains one of the date keywords.
    pub fn has_date_keyword(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        self.date_keywords.iter().any(|k| lower.contains(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled() -> CompiledLexicon {
        Lexicon::default().compile().unwrap()
    }

    #[test]
    fn status_pattern_matches_at_line_end_only() {
        let lexicon = compiled();
        assert!(lexicon.status_pattern.is_match("Глюкоза 7.2 Выше нормы"));
        assert!(!lexicon.status_pattern.is_match("Выше нормы глюкоза 7.2"));
    }

    #[test]
    fn negated_phrase_wins_over_its_suffix() {
        let lexicon = compiled();
        let caps = lexicon
            .status_pattern
            .captures("ВИЧ Не обнаружено")
            .unwrap();
        assert_eq!(caps.get(1).unwrap().as_str(), "Не обнаружено");
        assert_eq!(lexicon.verdict("Не обнаружено"), Some(false));
    }

    #[test]
    fn verdicts_cover_default_vocabulary() {
        let lexicon = compiled();
        assert_eq!(lexicon.verdict("В норме"), Some(false));
        assert_eq!(lexicon.verdict("выше нормы"), Some(true));
        assert_eq!(lexicon.verdict("Positive"), Some(true));
        assert_eq!(lexicon.verdict("not detected"), Some(false));
        assert_eq!(lexicon.verdict("что-то ещё"), None);
    }

    #[test]
    fn unit_canonicalization_table() {
        let lexicon = compiled();
        assert_eq!(lexicon.canonical_unit("тыс./мкл"), Some("x10^9/л"));
        assert_eq!(lexicon.canonical_unit("Г/ДЛ"), Some("g/dL"));
        assert_eq!(lexicon.canonical_unit("g/L"), None);
    }

    #[test]
    fn date_keyword_detection_is_case_insensitive() {
        let lexicon = compiled();
        assert!(lexicon.has_date_keyword("ДАТА ВЗЯТИЯ: 05.03.2024"));
        assert!(lexicon.has_date_keyword("Collection date 2024-03-05"));
        assert!(!lexicon.has_date_keyword("Hemoglobin 135 g/L"));
    }

    #[test]
    fn lexicon_loads_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexicon.json");
        let custom = Lexicon {
            status_phrases: vec![StatusPhrase {
                phrase: "grenzwertig".into(),
                abnormal: true,
            }],
            unit_canonical: HashMap::new(),
            date_keywords: vec!["Entnahmedatum".into()],
            header_prefixes: vec!["Parameter".into()],
        };
        std::fs::write(&path, serde_json::to_string(&custom).unwrap()).unwrap();

        let loaded = Lexicon::from_json_file(&path).unwrap().compile().unwrap();
        assert_eq!(loaded.verdict("grenzwertig"), Some(true));
        assert!(loaded.has_date_keyword("Entnahmedatum: 01.02.2023"));
    }
}
