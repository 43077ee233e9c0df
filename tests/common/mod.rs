//! Shared stubs for the integration tests.
//!
//! Provides in-process research sources, a bag-of-words embedder and a
//! prompt-aware generator so the full pipeline runs without any network.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use learning_harness::config::{IndexConfig, ReportConfig};
use learning_harness::index::Indexer;
use learning_harness::research::{Aggregator, ResearchSource};
use learning_harness::revision::Reviser;
use learning_harness::service::LearningService;
use learning_harness::session::{InMemorySessionStore, SessionStore};
use learning_harness::synthesis::Synthesizer;
use learning_harness_core::embedding::EmbeddingProvider;
use learning_harness_core::generation::GenerationProvider;
use learning_harness_core::models::{Category, SourceDocument};

// ─── Test research sources ───

pub struct StubSource {
    name: &'static str,
    category: Category,
    docs: Option<Vec<(String, String)>>,
}

#[async_trait]
impl ResearchSource for StubSource {
    fn name(&self) -> &str {
        self.name
    }

    fn category(&self) -> Category {
        self.category
    }

    async fn fetch(&self, _topic: &str) -> Result<Vec<SourceDocument>> {
        match &self.docs {
            Some(docs) => Ok(docs
                .iter()
                .map(|(id, text)| SourceDocument::new(id.clone(), text.clone(), self.category))
                .collect()),
            None => anyhow::bail!("{} unavailable", self.name),
        }
    }
}

pub fn ok_source(
    name: &'static str,
    category: Category,
    docs: &[(&str, &str)],
) -> Arc<dyn ResearchSource> {
    Arc::new(StubSource {
        name,
        category,
        docs: Some(
            docs.iter()
                .map(|(id, text)| (id.to_string(), text.to_string()))
                .collect(),
        ),
    })
}

pub fn failing_source(name: &'static str, category: Category) -> Arc<dyn ResearchSource> {
    Arc::new(StubSource {
        name,
        category,
        docs: None,
    })
}

pub const WEB_1: &str = "https://example.com/qubits";
pub const WEB_2: &str = "https://example.com/quantum-gates";
pub const PAPER: &str = "http://arxiv.org/abs/2101.00001v1";

/// Two web pages and one paper about quantum computing; video always fails.
pub fn quantum_aggregator() -> Aggregator {
    Aggregator::new(
        ok_source(
            "web",
            Category::Web,
            &[
                (WEB_1, "A qubit is the basic unit of quantum information. Unlike a bit, a qubit can be in superposition."),
                (WEB_2, "Quantum gates manipulate qubits. The Hadamard gate creates superposition and CNOT creates entanglement."),
            ],
        ),
        ok_source(
            "academic",
            Category::Academic,
            &[(
                PAPER,
                "Quantum Error Correction Survey\n\nWe review surface codes for protecting qubits from decoherence.",
            )],
        ),
        failing_source("video", Category::Video),
    )
}

pub fn failing_aggregator() -> Aggregator {
    Aggregator::new(
        failing_source("web", Category::Web),
        failing_source("academic", Category::Academic),
        failing_source("video", Category::Video),
    )
}

// ─── Test embedder ───

const DIMS: usize = 32;

/// Hashes each lowercase word into one of a few buckets.
pub struct BagOfWordsEmbedder;

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; DIMS];
                for word in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
                    if word.is_empty() {
                        continue;
                    }
                    let bucket = word.bytes().map(|b| b as usize).sum::<usize>() % DIMS;
                    v[bucket] += 1.0;
                }
                v
            })
            .collect())
    }
}

// ─── Test generator ───

/// Answers each prompt kind with a fixed shape; revisions echo the feedback.
#[derive(Default)]
pub struct ScriptedGenerator {
    pub calls: AtomicUsize,
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if prompt.contains("section titles separated by commas") {
            return Ok("Qubits, Quantum Gates".to_string());
        }
        if prompt.contains("most appropriate programming language") {
            return Ok("Python.".to_string());
        }
        if prompt.starts_with("Analyze this feedback") {
            return Ok(r#"{"aspects": ["Key Concepts"], "requests": ["adjust detail"]}"#.to_string());
        }
        if prompt.starts_with("Based on this user feedback:") {
            let feedback = prompt.lines().nth(1).unwrap_or_default();
            return Ok(format!(
                "# Learning Report: Quantum Computing\n\n\
                 # Overview of Quantum Computing\n\n\
                 Revised to address: {feedback}\n\n\
                 ## Check Your Understanding\n\n1. What is a qubit?\n\n\
                 ## Additional Resources\n\n- Intro course\n\n\
                 ## References\n\n- {WEB_1}\n"
            ));
        }
        Ok("Generated content.".to_string())
    }
}

/// A failing generator.
pub struct BrokenGenerator;

#[async_trait]
impl GenerationProvider for BrokenGenerator {
    fn model_name(&self) -> &str {
        "broken"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        anyhow::bail!("model unavailable")
    }
}

// ─── Service wiring ───

pub fn service_with(
    dir: &Path,
    aggregator: Aggregator,
    generator: Arc<dyn GenerationProvider>,
) -> LearningService {
    service_with_store(dir, Arc::new(InMemorySessionStore::new()), aggregator, generator)
}

pub fn service_with_store(
    dir: &Path,
    store: Arc<dyn SessionStore>,
    aggregator: Aggregator,
    generator: Arc<dyn GenerationProvider>,
) -> LearningService {
    let index_config = IndexConfig {
        dir: dir.to_path_buf(),
        ..Default::default()
    };
    let indexer = Indexer::new(index_config, 8, Arc::new(BagOfWordsEmbedder));
    LearningService::new(
        store,
        aggregator,
        indexer,
        Synthesizer::new(generator.clone(), ReportConfig::default()),
        Reviser::new(generator, ReportConfig::default()),
    )
}

pub fn quantum_service(dir: &Path) -> LearningService {
    service_with(dir, quantum_aggregator(), Arc::new(ScriptedGenerator::default()))
}

/// Where the index of `session_id` lives under `dir`.
pub fn index_file(dir: &Path, session_id: &str) -> std::path::PathBuf {
    dir.join(format!("{}.sqlite", session_id))
}

/// The body of the `## References` section.
pub fn references_section(report: &str) -> &str {
    report
        .split("## References")
        .nth(1)
        .unwrap_or_default()
}
