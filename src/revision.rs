//! Feedback-driven report revision.
//!
//! A revision is three steps: analyze the feedback into aspects and
//! requests, retrieve context with the raw feedback text, then generate a
//! complete replacement report from feedback, analysis, context and the
//! previous report.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use learning_harness_core::generation::GenerationProvider;
use learning_harness_core::report::{format_context, parse_feedback_analysis, FeedbackAnalysis};
use learning_harness_core::retrieval::Retriever;

use crate::config::ReportConfig;
use crate::error::{LearningError, LearningResult};
use crate::prompts;
use crate::synthesis::{generate, retrieve};

pub struct Reviser {
    generator: Arc<dyn GenerationProvider>,
    config: ReportConfig,
}

impl Reviser {
    pub fn new(generator: Arc<dyn GenerationProvider>, config: ReportConfig) -> Self {
        Self { generator, config }
    }

    /// Produce an updated report from learner feedback.
    ///
    /// # Errors
    ///
    /// [`LearningError::InvalidRequest`] for blank feedback;
    /// [`LearningError::GenerationFailure`] if either generation call fails.
    #[instrument(skip(self, index, feedback, previous_report), fields(feedback_len = feedback.len()))]
    pub async fn revise(
        &self,
        index: &dyn Retriever,
        feedback: &str,
        previous_report: Option<&str>,
    ) -> LearningResult<String> {
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(LearningError::invalid("feedback text must not be empty"));
        }

        let raw_analysis = generate(self.generator.as_ref(), &prompts::feedback_analysis(feedback)).await?;
        let analysis = match parse_feedback_analysis(&raw_analysis) {
            Some(parsed) => render_analysis(&parsed),
            None => {
                warn!("feedback analysis was not valid JSON, passing it through as notes");
                raw_analysis.trim().to_string()
            }
        };
        debug!(%analysis, "feedback analysis");

        let chunks = retrieve(index, feedback, self.config.revision_k).await?;
        let context = format_context(&chunks);

        generate(
            self.generator.as_ref(),
            &prompts::revision(feedback, &analysis, &context, previous_report),
        )
        .await
    }
}

fn render_analysis(analysis: &FeedbackAnalysis) -> String {
    if analysis.is_empty() {
        return "(no specific aspects identified)".to_string();
    }
    let list = |items: &[String]| {
        if items.is_empty() {
            "- (none)".to_string()
        } else {
            items
                .iter()
                .map(|i| format!("- {}", i))
                .collect::<Vec<_>>()
                .join("\n")
        }
    };
    format!(
        "Sections to modify:\n{}\nRequested changes:\n{}",
        list(&analysis.aspects),
        list(&analysis.requests)
    )
}
