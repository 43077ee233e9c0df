//! # Learning Harness Core
//!
//! Shared, I/O-free logic for Learning Harness: data models, text chunking,
//! preference resolution, report layout helpers, and the provider traits
//! (embedding, generation, retrieval) that the application crate implements.
//!
//! This crate contains no tokio, sqlx, HTTP clients, or filesystem access.

pub mod chunk;
pub mod embedding;
pub mod generation;
pub mod models;
pub mod preferences;
pub mod report;
pub mod retrieval;
