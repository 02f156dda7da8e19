//! Human-readable processing report, bounded in length.

/// Truncate to at most `max_chars` characters, respecting char boundaries.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Accumulates detail lines during a run and renders the final report.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    details: Vec<String>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, detail: impl Into<String>) {
        self.details.push(detail.into());
    }

    pub fn extend(&mut self, details: impl IntoIterator<Item = String>) {
        self.details.extend(details);
    }

    /// Insert a line at the top of the details, e.g. a warning summary.
    pub fn push_front(&mut self, detail: impl Into<String>) {
        self.details.insert(0, detail.into());
    }

    /// Render the report: header, separator, detail lines; truncated to
    /// the configured maximum.
    pub fn render(&self, page_count: usize, result_count: usize, max_chars: usize) -> String {
        let header = format!("PDF processed ({page_count} pages). Parsed {result_count} results.");
        let full = format!("{header}\n---\n{}", self.details.join("\n"));
        truncate_chars(&full, max_chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "Гемоглобин";
        assert_eq!(truncate_chars(s, 4), "Гемо");
        assert_eq!(truncate_chars(s, 100), s);
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn render_contains_header_and_details() {
        let mut report = ReportBuilder::new();
        report.push("Parsed Hemoglobin ('hb'): 135 g/L");
        report.push_front("Extracted Test Date: 05.03.2024");

        let rendered = report.render(2, 1, 4000);
        assert!(rendered.starts_with("PDF processed (2 pages). Parsed 1 results.\n---\n"));
        let body = rendered.split("---\n").nth(1).unwrap();
        assert!(body.starts_with("Extracted Test Date"));
        assert!(body.contains("Parsed Hemoglobin"));
    }

    #[test]
    fn render_is_bounded() {
        let mut report = ReportBuilder::new();
        for i in 0..1000 {
            report.push(format!("detail line number {i}"));
        }
        let rendered = report.render(1, 1000, 4000);
        assert!(rendered.chars().count() <= 4000);
    }
}
