//! Report layout and defensive parsing of model output.
//!
//! Everything here is pure: the synthesizer in the app crate decides which
//! calls to make, and these helpers decide how their results are parsed
//! and laid out as markdown.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::IndexedChunk;

/// Returned in place of a report when a session has no searchable index.
pub const NO_RESEARCH_DATA: &str = "Error: No research data found for this session.";

/// Default upper bound on the number of body sections in a report.
pub const DEFAULT_MAX_SECTIONS: usize = 5;

/// Parse the model's section plan into clean, unique titles.
///
/// The plan is requested as a comma-separated list but is treated as
/// untrusted text: newlines also separate entries, list markers, numbering,
/// quotes and emphasis are stripped, blanks and case-insensitive duplicates
/// are dropped, and the result is capped at `max_sections`.
///
/// ```rust
/// use learning_harness_core::report::parse_section_plan;
///
/// let plan = parse_section_plan("1. **Qubits**, \"Gates\",, qubits", 5);
/// assert_eq!(plan, vec!["Qubits", "Gates"]);
/// ```
pub fn parse_section_plan(raw: &str, max_sections: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut titles = Vec::new();

    for entry in raw.split([',', '\n']) {
        if titles.len() >= max_sections {
            break;
        }
        let title = clean_title(entry);
        if title.is_empty() {
            continue;
        }
        if seen.insert(title.to_lowercase()) {
            titles.push(title);
        }
    }

    titles
}

fn clean_title(entry: &str) -> String {
    let mut s = entry.trim();

    // "1." / "2)" numbering
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &s[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            s = stripped.trim();
        }
    }

    s = s.trim_start_matches(['-', '*', '•', '#']).trim();
    s = s.trim_end_matches('.').trim();
    s = s.trim_matches(['"', '\'', '`', '*', '_']).trim();

    s.to_string()
}

/// Collect unique source ids in first-seen order.
pub fn collect_references(chunks: &[IndexedChunk]) -> Vec<String> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter(|c| seen.insert(c.source_id.as_str()))
        .map(|c| c.source_id.clone())
        .collect()
}

/// Render the `## References` block, one bullet per source.
pub fn render_references(sources: &[String]) -> String {
    let mut out = String::from("\n\n## References\n\n");
    for source in sources {
        out.push_str("- ");
        out.push_str(source);
        out.push('\n');
    }
    out
}

/// Render the report title and the overview / objectives / key concepts
/// block that opens every report.
pub fn render_opening(topic: &str, overview: &str, objectives: &str, key_concepts: &str) -> String {
    format!(
        "# Learning Report: {topic}\n\n\n# Overview of {topic}\n\n{overview}\n\n## Learning Objectives\n{objectives}\n\n## Key Concepts\n{key_concepts}\n",
        topic = topic,
        overview = overview.trim(),
        objectives = objectives.trim(),
        key_concepts = key_concepts.trim(),
    )
}

/// Render retrieved chunks as numbered prompt context.
pub fn format_context(chunks: &[IndexedChunk]) -> String {
    if chunks.is_empty() {
        return "(no research material matched this query)".to_string();
    }
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[{}] ({}, {})\n{}", i + 1, c.category, c.source_id, c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Structured reading of learner feedback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackAnalysis {
    /// Report sections the learner wants changed.
    #[serde(default)]
    pub aspects: Vec<String>,
    /// Concrete changes requested.
    #[serde(default)]
    pub requests: Vec<String>,
}

impl FeedbackAnalysis {
    pub fn is_empty(&self) -> bool {
        self.aspects.is_empty() && self.requests.is_empty()
    }
}

/// Parse a feedback analysis from model output.
///
/// Accepts bare JSON, JSON inside a fenced code block, or JSON surrounded
/// by prose. Returns `None` when no object can be decoded.
pub fn parse_feedback_analysis(raw: &str) -> Option<FeedbackAnalysis> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn chunk(source: &str) -> IndexedChunk {
        IndexedChunk {
            text: format!("text from {}", source),
            source_id: source.to_string(),
            category: Category::Web,
        }
    }

    #[test]
    fn test_references_dedup_first_seen_order() {
        let chunks = vec![chunk("A"), chunk("B"), chunk("A"), chunk("C")];
        assert_eq!(collect_references(&chunks), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_render_references() {
        let rendered = render_references(&["A".to_string(), "B".to_string()]);
        assert_eq!(rendered, "\n\n## References\n\n- A\n- B\n");
    }

    #[test]
    fn test_section_plan_simple() {
        let plan = parse_section_plan("Qubits, Superposition,Entanglement ", 5);
        assert_eq!(plan, vec!["Qubits", "Superposition", "Entanglement"]);
    }

    #[test]
    fn test_section_plan_empty_or_garbage() {
        assert!(parse_section_plan("", 5).is_empty());
        assert!(parse_section_plan(" , ,\n, ", 5).is_empty());
        assert!(parse_section_plan("**", 5).is_empty());
    }

    #[test]
    fn test_section_plan_strips_markers_and_caps() {
        let raw = "- Intro\n2) Basics\n* `Gates`\n\"Algorithms\".\n5. Hardware\nExtra";
        let plan = parse_section_plan(raw, 5);
        assert_eq!(plan, vec!["Intro", "Basics", "Gates", "Algorithms", "Hardware"]);
        assert_eq!(parse_section_plan(raw, 2).len(), 2);
    }

    #[test]
    fn test_section_plan_dedupes_case_insensitively() {
        let plan = parse_section_plan("Qubits, qubits, QUBITS, Gates", 5);
        assert_eq!(plan, vec!["Qubits", "Gates"]);
    }

    #[test]
    fn test_opening_layout() {
        let md = render_opening("Rust", "overview", "objectives", "concepts");
        assert!(md.starts_with("# Learning Report: Rust\n"));
        assert!(md.contains("# Overview of Rust\n\noverview"));
        assert!(md.contains("## Learning Objectives\nobjectives"));
        assert!(md.contains("## Key Concepts\nconcepts"));
    }

    #[test]
    fn test_format_context_numbers_chunks() {
        let ctx = format_context(&[chunk("A"), chunk("B")]);
        assert!(ctx.starts_with("[1] (web, A)\ntext from A"));
        assert!(ctx.contains("[2] (web, B)"));
        assert!(!format_context(&[]).is_empty());
    }

    #[test]
    fn test_feedback_analysis_parsing() {
        let fenced = "```json\n{\"aspects\": [\"Overview\"], \"requests\": [\"shorter\"]}\n```";
        let parsed = parse_feedback_analysis(fenced).unwrap();
        assert_eq!(parsed.aspects, vec!["Overview"]);
        assert_eq!(parsed.requests, vec!["shorter"]);

        let partial = parse_feedback_analysis("{\"requests\": [\"more code\"]}").unwrap();
        assert!(partial.aspects.is_empty());
        assert!(!partial.is_empty());

        assert!(parse_feedback_analysis("no json here").is_none());
        assert!(parse_feedback_analysis("} backwards {").is_none());
    }
}
