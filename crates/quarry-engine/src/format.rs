//! Structured and human-readable rendering of search results

use serde::Serialize;

use quarry_domain::SearchResult;

/// Lines of code shown per result before truncation
pub const MAX_LINES_PER_RESULT: usize = 50;

/// Compact shape for external consumers
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FormattedResult {
    pub file: String,
    /// `"start-end"`, 1-based inclusive
    pub lines: String,
    /// `round(score * 100)`
    pub relevance: i32,
    pub code: String,
}

/// Format results in order; pure function of its input
pub fn format_results(results: &[SearchResult]) -> Vec<FormattedResult> {
    results
        .iter()
        .map(|result| FormattedResult {
            file: result.chunk.metadata.path.clone(),
            lines: format!(
                "{}-{}",
                result.chunk.metadata.start_line, result.chunk.metadata.end_line
            ),
            relevance: (result.score * 100.0).round() as i32,
            code: truncate_code(&result.chunk.text),
        })
        .collect()
}

/// Markdown rendering with fenced code and per-result separators
pub fn render_markdown(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results.".to_string();
    }

    let mut out = String::new();
    for (index, result) in results.iter().enumerate() {
        if index > 0 {
            out.push_str("\n---\n\n");
        }
        let formatted = FormattedResult {
            file: result.chunk.metadata.path.clone(),
            lines: format!(
                "{}-{}",
                result.chunk.metadata.start_line, result.chunk.metadata.end_line
            ),
            relevance: (result.score * 100.0).round() as i32,
            code: truncate_code(&result.chunk.text),
        };
        out.push_str(&format!(
            "### {} (lines {}, relevance {}%)\n\n```{}\n{}\n```\n",
            formatted.file, formatted.lines, formatted.relevance, result.chunk.metadata.language,
            formatted.code
        ));
    }
    out
}

fn truncate_code(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= MAX_LINES_PER_RESULT {
        return text.to_string();
    }
    let omitted = lines.len() - MAX_LINES_PER_RESULT;
    let mut out = lines[..MAX_LINES_PER_RESULT].join("\n");
    out.push_str(&format!("\n... ({omitted} more lines)"));
    out
}
