//! Text generation trait.
//!
//! A [`GenerationProvider`] turns one prompt into free-form text. Concrete
//! backends (OpenAI-compatible chat completions, Ollama) live in the app
//! crate; tests supply scripted implementations.

use anyhow::Result;
use async_trait::async_trait;

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Returns the model identifier used for generation.
    fn model_name(&self) -> &str;

    /// Generate text for a single prompt.
    ///
    /// Implementations return an error for transport failures and for
    /// responses without usable text.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
