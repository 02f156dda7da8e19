//! Alias resolution: every known analyte name/abbreviation, lowercased,
//! mapped to its owning analyte.
//!
//! Built fresh for every processing run because the reference data may
//! change between runs. The structure is immutable once built: aliases are
//! pre-sorted longest first, each with a compiled whole-word matcher, so a
//! short abbreviation can never pre-empt a longer alias on the same line.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use uuid::Uuid;

use crate::models::AnalyteDefinition;

struct AliasEntry {
    alias: String,
    pattern: Regex,
    analyte_idx: usize,
}

/// An alias match within a line.
pub struct AliasHit<'a> {
    pub analyte: &'a AnalyteDefinition,
    pub alias: &'a str,
    /// Byte offset just past the matched alias.
    pub end: usize,
}

pub struct AliasMap {
    analytes: Vec<AnalyteDefinition>,
    entries: Vec<AliasEntry>,
}

impl AliasMap {
    /// Build the lookup from operator-maintained analyte definitions.
    ///
    /// Collision policy: when two analytes share an alias, the one with the
    /// longer canonical name wins — longer names are assumed more specific.
    /// An alias that fails to compile into a matcher is logged and skipped.
    pub fn build(analytes: Vec<AnalyteDefinition>) -> Self {
        let mut by_alias: HashMap<String, usize> = HashMap::new();

        for (idx, analyte) in analytes.iter().enumerate() {
            for alias in analyte.all_names() {
                match by_alias.get(&alias) {
                    Some(&existing_idx) => {
                        let existing = &analytes[existing_idx];
                        if analyte.name.chars().count() > existing.name.chars().count() {
                            by_alias.insert(alias, idx);
                        }
                    }
                    None => {
                        by_alias.insert(alias, idx);
                    }
                }
            }
        }

        let mut entries: Vec<AliasEntry> = by_alias
            .into_iter()
            .filter_map(|(alias, analyte_idx)| match word_pattern(&alias) {
                Ok(pattern) => Some(AliasEntry {
                    alias,
                    pattern,
                    analyte_idx,
                }),
                Err(e) => {
                    tracing::error!(alias, error = %e, "alias does not compile, skipping");
                    None
                }
            })
            .collect();

        // Longest first; lexicographic among equals keeps scans deterministic.
        entries.sort_by(|a, b| {
            b.alias
                .chars()
                .count()
                .cmp(&a.alias.chars().count())
                .then_with(|| a.alias.cmp(&b.alias))
        });

        tracing::info!(
            aliases = entries.len(),
            analytes = analytes.len(),
            "alias map built"
        );

        Self { analytes, entries }
    }

    /// Longest alias occurring in the line as a whole word, skipping
    /// analytes already consumed earlier in the document.
    pub fn find_in_line(&self, line: &str, consumed: &HashSet<Uuid>) -> Option<AliasHit<'_>> {
        for entry in &self.entries {
            let analyte = &self.analytes[entry.analyte_idx];
            if consumed.contains(&analyte.id) {
                continue;
            }
            if let Some(m) = entry.pattern.find(line) {
                return Some(AliasHit {
                    analyte,
                    alias: &entry.alias,
                    end: m.end(),
                });
            }
        }
        None
    }

    /// Resolve a single alias, for lookups outside of line scanning.
    pub fn resolve(&self, alias: &str) -> Option<&AnalyteDefinition> {
        let lower = alias.to_lowercase();
        self.entries
            .iter()
            .find(|e| e.alias == lower)
            .map(|e| &self.analytes[e.analyte_idx])
    }

    pub fn alias_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Case-insensitive whole-word matcher for one alias. `\b` only exists
/// next to word characters, so boundaries are added per side only when the
/// alias starts/ends with one (aliases like "а/г к" or "anti-HCV" would
/// otherwise never match).
fn word_pattern(alias: &str) -> Result<Regex, regex::Error> {
    let escaped = regex::escape(alias);
    let start = if alias.starts_with(|c: char| c.is_alphanumeric()) {
        r"\b"
    } else {
        ""
    };
    let end = if alias.ends_with(|c: char| c.is_alphanumeric()) {
        r"\b"
    } else {
        ""
    };
    Regex::new(&format!("(?i){start}{escaped}{end}"))
}
