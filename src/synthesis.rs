//! Report synthesis.
//!
//! [`Synthesizer::synthesize`] drives a fixed, strictly sequential sequence
//! of retrieval and generation calls and lays the results out as one
//! markdown document:
//!
//! | Stage | Retrieval query | Output |
//! |-------|-----------------|--------|
//! | overview | `overview of {topic}` | `# Overview of {topic}` |
//! | objectives | none | `## Learning Objectives` |
//! | key concepts | `key concepts in {topic}` | `## Key Concepts` |
//! | section plan | none | list of section titles |
//! | per section | `{section} in {topic}` | `## {section}` (+ visual aid, code example) |
//! | assessment | `assessment questions for {topic}` | `## Check Your Understanding` |
//! | resources | `learning resources for {topic}` | `## Additional Resources` |
//! | references | `{topic}` | `## References` |
//!
//! Any failure aborts the whole synthesis; no partial report is returned.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use learning_harness_core::generation::GenerationProvider;
use learning_harness_core::models::{IndexedChunk, Preferences};
use learning_harness_core::report::{
    collect_references, format_context, parse_section_plan, render_opening, render_references,
};
use learning_harness_core::retrieval::Retriever;

use crate::config::ReportConfig;
use crate::error::{LearningError, LearningResult};
use crate::prompts;

pub struct Synthesizer {
    generator: Arc<dyn GenerationProvider>,
    config: ReportConfig,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn GenerationProvider>, config: ReportConfig) -> Self {
        Self { generator, config }
    }

    /// Build the full learning report for `topic`.
    #[instrument(skip(self, index, preferences), fields(depth = preferences.depth_level))]
    pub async fn synthesize(
        &self,
        index: &dyn Retriever,
        topic: &str,
        preferences: &Preferences,
    ) -> LearningResult<String> {
        let level = preferences.knowledge_level();
        let focus = prompts::focus(preferences);
        let k = self.config.retrieval_k;

        let ctx = self.context(index, &format!("overview of {}", topic), k).await?;
        let overview = self.generate(&prompts::overview(topic, &ctx)).await?;

        let objectives = self
            .generate(&prompts::objectives(topic, level, focus))
            .await?;

        let ctx = self.context(index, &format!("key concepts in {}", topic), k).await?;
        let key_concepts = self
            .generate(&prompts::key_concepts(topic, level, &ctx))
            .await?;

        let plan = self.generate(&prompts::section_plan(topic, focus)).await?;
        let sections = parse_section_plan(&plan, self.config.max_sections);
        debug!(sections = ?sections, "section plan");

        let mut markdown = render_opening(topic, &overview, &objectives, &key_concepts);

        let mut language: Option<String> = None;
        for title in &sections {
            let ctx = self.context(index, &format!("{} in {}", title, topic), k).await?;

            let body = self
                .generate(&prompts::section(topic, title, preferences, &ctx))
                .await?;
            markdown.push_str(&format!("\n\n## {}\n\n{}", title, body.trim()));

            if preferences.include_visuals {
                let visual = self
                    .generate(&prompts::visual(topic, title, level, &ctx))
                    .await?;
                markdown.push_str(&format!("\n\n### Visual Aid: {}\n\n{}", title, visual.trim()));
            }

            if preferences.include_code {
                if language.is_none() {
                    let answer = self.generate(&prompts::language(topic)).await?;
                    language = Some(clean_language(&answer));
                }
                let lang = language.as_deref().unwrap_or("text");
                let code = self
                    .generate(&prompts::code_example(topic, title, level, lang, &ctx))
                    .await?;
                markdown.push_str(&format!("\n\n### Code Example: {}\n\n{}", title, code.trim()));
            }
        }

        let ctx = self
            .context(index, &format!("assessment questions for {}", topic), k)
            .await?;
        let assessment = self.generate(&prompts::assessment(topic, level, &ctx)).await?;
        markdown.push_str(&format!(
            "\n\n## Check Your Understanding\n\n{}",
            assessment.trim()
        ));

        let ctx = self
            .context(index, &format!("learning resources for {}", topic), k)
            .await?;
        let resources = self
            .generate(&prompts::resources(topic, level, preferences.include_videos, &ctx))
            .await?;
        markdown.push_str(&format!("\n\n## Additional Resources\n\n{}", resources.trim()));

        let broad = retrieve(index, topic, self.config.references_k).await?;
        markdown.push_str(&render_references(&collect_references(&broad)));

        info!(sections = sections.len(), len = markdown.len(), "report synthesized");
        Ok(markdown)
    }

    /// Retrieve (and optionally compress) context for a stage, formatted for a prompt.
    async fn context(&self, index: &dyn Retriever, query: &str, k: usize) -> LearningResult<String> {
        let chunks = retrieve(index, query, k).await?;
        let chunks = if self.config.compress_context {
            compress(self.generator.as_ref(), query, chunks).await?
        } else {
            chunks
        };
        Ok(format_context(&chunks))
    }

    async fn generate(&self, prompt: &str) -> LearningResult<String> {
        generate(self.generator.as_ref(), prompt).await
    }
}

pub(crate) async fn retrieve(
    index: &dyn Retriever,
    query: &str,
    k: usize,
) -> LearningResult<Vec<IndexedChunk>> {
    index.retrieve(query, k).await.map_err(LearningError::Index)
}

pub(crate) async fn generate(
    generator: &dyn GenerationProvider,
    prompt: &str,
) -> LearningResult<String> {
    generator
        .generate(prompt)
        .await
        .map_err(LearningError::GenerationFailure)
}

/// Keep only the parts of each chunk relevant to `query`.
///
/// Chunks the model answers with `NO_OUTPUT` (or nothing) are dropped.
async fn compress(
    generator: &dyn GenerationProvider,
    query: &str,
    chunks: Vec<IndexedChunk>,
) -> LearningResult<Vec<IndexedChunk>> {
    let mut kept = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let extracted = generate(generator, &prompts::extract_relevant(query, &chunk.text)).await?;
        let extracted = extracted.trim();
        if extracted.is_empty() || extracted == prompts::NO_OUTPUT {
            continue;
        }
        kept.push(IndexedChunk {
            text: extracted.to_string(),
            ..chunk
        });
    }
    Ok(kept)
}

/// Reduce a free-form language answer to a fence tag such as `python`.
fn clean_language(answer: &str) -> String {
    let first = answer
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();
    let word = first
        .trim_matches(|c: char| c == '\'' || c == '"' || c == '`' || c == '*' || c == '.')
        .split_whitespace()
        .next()
        .unwrap_or_default();
    let word = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '+' && c != '#');
    if word.is_empty() {
        "text".to_string()
    } else {
        word.to_lowercase()
    }
}
