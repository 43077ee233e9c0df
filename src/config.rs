use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use learning_harness_core::chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use learning_harness_core::report::DEFAULT_MAX_SECTIONS;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("./indexes")
}
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (OpenAI-compatible API root or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            url: None,
            temperature: None,
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResearchConfig {
    #[serde(default = "default_web_results")]
    pub web_results: usize,
    #[serde(default = "default_academic_results")]
    pub academic_results: usize,
    #[serde(default = "default_video_candidates")]
    pub video_candidates: usize,
    #[serde(default = "default_serpapi_url")]
    pub serpapi_url: String,
    #[serde(default = "default_arxiv_url")]
    pub arxiv_url: String,
    #[serde(default = "default_transcript_url")]
    pub transcript_url: String,
    #[serde(default = "default_transcript_lang")]
    pub transcript_lang: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            web_results: default_web_results(),
            academic_results: default_academic_results(),
            video_candidates: default_video_candidates(),
            serpapi_url: default_serpapi_url(),
            arxiv_url: default_arxiv_url(),
            transcript_url: default_transcript_url(),
            transcript_lang: default_transcript_lang(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_web_results() -> usize {
    5
}
fn default_academic_results() -> usize {
    3
}
fn default_video_candidates() -> usize {
    3
}
fn default_serpapi_url() -> String {
    "https://serpapi.com/search.json".to_string()
}
fn default_arxiv_url() -> String {
    "http://export.arxiv.org/api/query".to_string()
}
fn default_transcript_url() -> String {
    "https://www.youtube.com/api/timedtext".to_string()
}
fn default_transcript_lang() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Chunks retrieved per synthesis stage.
    #[serde(default = "default_retrieval_k")]
    pub retrieval_k: usize,
    /// Chunks retrieved for the references section.
    #[serde(default = "default_references_k")]
    pub references_k: usize,
    /// Chunks retrieved for a feedback revision.
    #[serde(default = "default_revision_k")]
    pub revision_k: usize,
    #[serde(default = "default_max_sections")]
    pub max_sections: usize,
    /// Run every retrieved chunk through an extraction call before use.
    #[serde(default)]
    pub compress_context: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            retrieval_k: default_retrieval_k(),
            references_k: default_references_k(),
            revision_k: default_revision_k(),
            max_sections: DEFAULT_MAX_SECTIONS,
            compress_context: false,
        }
    }
}

fn default_retrieval_k() -> usize {
    5
}
fn default_references_k() -> usize {
    10
}
fn default_revision_k() -> usize {
    10
}
fn default_max_sections() -> usize {
    DEFAULT_MAX_SECTIONS
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionsConfig {
    /// Sessions idle longer than this are dropped. `None` keeps them for
    /// the process lifetime.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        // Validate index / chunking
        if self.index.chunk_size == 0 {
            anyhow::bail!("index.chunk_size must be > 0");
        }
        if self.index.chunk_overlap >= self.index.chunk_size {
            anyhow::bail!("index.chunk_overlap must be smaller than index.chunk_size");
        }

        // Validate report
        if self.report.retrieval_k < 1 || self.report.references_k < 1 || self.report.revision_k < 1 {
            anyhow::bail!("report.retrieval_k, references_k and revision_k must be >= 1");
        }
        if self.report.max_sections < 1 {
            anyhow::bail!("report.max_sections must be >= 1");
        }

        // Validate embedding
        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" => {}
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
                other
            ),
        }
        if self.embedding.is_enabled() {
            if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.batch_size == 0 {
                anyhow::bail!("embedding.batch_size must be > 0");
            }
        }

        // Validate generation
        match self.generation.provider.as_str() {
            "disabled" | "openai" | "ollama" => {}
            other => anyhow::bail!(
                "Unknown generation provider: '{}'. Must be disabled, openai, or ollama.",
                other
            ),
        }
        if self.generation.is_enabled() && self.generation.model.is_none() {
            anyhow::bail!(
                "generation.model must be specified when provider is '{}'",
                self.generation.provider
            );
        }

        Ok(())
    }

    /// Fail unless both model providers are configured.
    ///
    /// A config that only passes [`Config::validate`] may leave either
    /// provider disabled, which is enough for `lh questions` but not for
    /// serving or writing reports.
    pub fn require_providers(&self) -> Result<()> {
        let mut missing = Vec::new();
        if !self.embedding.is_enabled() {
            missing.push("[embedding].provider");
        }
        if !self.generation.is_enabled() {
            missing.push("[generation].provider");
        }
        if !missing.is_empty() {
            anyhow::bail!(
                "{} must be openai or ollama, not disabled",
                missing.join(" and ")
            );
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_uses_defaults() {
        let cfg = parse_config("[server]\nbind = \"0.0.0.0:9000\"\n").unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:9000");
        assert_eq!(cfg.index.chunk_size, 1000);
        assert_eq!(cfg.index.chunk_overlap, 100);
        assert_eq!(cfg.research.web_results, 5);
        assert_eq!(cfg.research.academic_results, 3);
        assert_eq!(cfg.report.retrieval_k, 5);
        assert_eq!(cfg.report.revision_k, 10);
        assert!(!cfg.embedding.is_enabled());
        assert!(cfg.sessions.ttl_secs.is_none());
    }

    #[test]
    fn test_full_file() {
        let cfg = parse_config(
            r#"
[server]
bind = "127.0.0.1:8000"

[index]
dir = "/tmp/lh-indexes"
chunk_size = 800
chunk_overlap = 80

[embedding]
provider = "openai"
model = "text-embedding-3-small"
dims = 1536

[generation]
provider = "ollama"
model = "llama3.1"
url = "http://localhost:11434"

[report]
compress_context = true
max_sections = 4

[sessions]
ttl_secs = 3600
"#,
        )
        .unwrap();
        assert_eq!(cfg.index.dir, PathBuf::from("/tmp/lh-indexes"));
        assert_eq!(cfg.embedding.dims, Some(1536));
        assert_eq!(cfg.generation.provider, "ollama");
        assert!(cfg.report.compress_context);
        assert_eq!(cfg.sessions.ttl_secs, Some(3600));
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        let err = parse_config(
            "[server]\nbind = \"x\"\n[index]\nchunk_size = 100\nchunk_overlap = 100\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_rejects_enabled_embedding_without_dims() {
        let err = parse_config(
            "[server]\nbind = \"x\"\n[embedding]\nprovider = \"openai\"\nmodel = \"m\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_rejects_unknown_generation_provider() {
        let err = parse_config("[server]\nbind = \"x\"\n[generation]\nprovider = \"gemini\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("Unknown generation provider"));
    }

    #[test]
    fn test_default_providers_are_not_enough_to_serve() {
        let cfg = parse_config("").unwrap();
        let err = cfg.require_providers().unwrap_err().to_string();
        assert!(err.contains("[embedding].provider"));
        assert!(err.contains("[generation].provider"));
    }

    #[test]
    fn test_require_providers_names_only_missing_one() {
        let cfg = parse_config(
            r#"
[embedding]
provider = "ollama"
model = "nomic-embed-text"
dims = 768
"#,
        )
        .unwrap();
        let err = cfg.require_providers().unwrap_err().to_string();
        assert!(!err.contains("[embedding]"));
        assert!(err.contains("[generation].provider"));

        let cfg = parse_config(
            r#"
[embedding]
provider = "ollama"
model = "nomic-embed-text"
dims = 768

[generation]
provider = "ollama"
model = "llama3.1"
"#,
        )
        .unwrap();
        cfg.require_providers().unwrap();
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_config(Path::new("/definitely/not/here.toml")).is_err());
    }

    #[test]
    fn test_example_file_parses() {
        let cfg = parse_config(include_str!("../config/lh.example.toml")).unwrap();
        assert_eq!(cfg.embedding.provider, "openai");
        assert_eq!(cfg.generation.temperature, Some(0.7));
    }
}
