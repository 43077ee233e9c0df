//! # Learning Harness
//!
//! Turns a topic into a personalized, retrieval-grounded learning report.
//!
//! Learning Harness researches a topic across web search, arXiv abstracts and
//! a video transcript, indexes the material per session for semantic
//! retrieval, resolves the learner's questionnaire answers into preferences,
//! and drives a language model section by section to write the report. The
//! report can then be revised from free-text feedback.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Research   │──▶│   Indexer   │──▶│ SQLite index │
//! │ Web/arXiv/  │   │ Chunk+Embed │   │ per session  │
//! │   Video     │   └─────────────┘   └──────┬───────┘
//! └─────────────┘                            │ retrieve
//!                    ┌──────────────┐        ▼
//!   answers ────────▶│  Preferences │──▶┌─────────────┐   ┌──────────┐
//!                    └──────────────┘   │ Synthesizer │──▶│  Report  │
//!                                       └─────────────┘   └────┬─────┘
//!                                       ┌─────────────┐        │
//!   feedback ──────────────────────────▶│   Reviser   │◀───────┘
//!                                       └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Public error taxonomy |
//! | [`research`] | Research sources and aggregation |
//! | [`embedding`] | Embedding providers (OpenAI, Ollama) |
//! | [`generation`] | Generation providers (OpenAI, Ollama) |
//! | `http` | Shared JSON client with retry |
//! | [`db`] | Session index database connection and schema |
//! | [`index`] | Per-session semantic index |
//! | [`prompts`] | Prompt templates |
//! | [`synthesis`] | Report synthesis |
//! | [`revision`] | Feedback-driven revision |
//! | [`session`] | Session state and store |
//! | [`service`] | Operation orchestration |
//! | [`server`] | HTTP server |
//!
//! Pure building blocks (chunking, preference resolution, report layout,
//! retrieval traits) live in the `learning-harness-core` crate.

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod generation;
mod http;
pub mod index;
pub mod prompts;
pub mod research;
pub mod revision;
pub mod server;
pub mod service;
pub mod session;
pub mod synthesis;
