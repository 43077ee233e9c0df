//! Per-session semantic index.
//!
//! Documents are chunked, embedded in batches, and stored in one SQLite file
//! per session (`{index.dir}/{session_id}.sqlite`). Vectors are stored as
//! little-endian `f32` BLOBs next to the chunk text, so reopening an index
//! never re-embeds. The embedding model is recorded in `index_meta`, and an
//! index built with a different model refuses to open.
//!
//! # Retrieval
//!
//! Brute-force cosine similarity over every stored vector. Chunks are
//! loaded in insertion order and ranked with a stable sort, so equally
//! similar chunks keep the order they were indexed in.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use learning_harness_core::chunk::chunk_document;
use learning_harness_core::embedding::{blob_to_vec, embed_query, vec_to_blob, EmbeddingProvider};
use learning_harness_core::models::{IndexedChunk, SourceDocument};
use learning_harness_core::retrieval::{rank_by_similarity, Retriever};

use crate::config::IndexConfig;
use crate::db;
use crate::error::{LearningError, LearningResult};

/// Reference to the persisted index of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHandle {
    pub session_id: String,
    pub path: PathBuf,
}

/// Builds and reopens session indexes.
pub struct Indexer {
    config: IndexConfig,
    batch_size: usize,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Indexer {
    pub fn new(config: IndexConfig, batch_size: usize, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            config,
            batch_size: batch_size.max(1),
            embedder,
        }
    }

    /// Path of the index file for `session_id`.
    ///
    /// Rejects ids that could escape the index directory.
    pub fn index_path(&self, session_id: &str) -> LearningResult<PathBuf> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(LearningError::invalid(format!(
                "invalid session id: {:?}",
                session_id
            )));
        }
        Ok(self.config.dir.join(format!("{}.sqlite", session_id)))
    }

    /// Chunk, embed and persist `documents` as the index for `session_id`.
    ///
    /// Any previous index for the session is replaced.
    ///
    /// # Errors
    ///
    /// [`LearningError::EmptyCorpus`] when no document yields a chunk;
    /// [`LearningError::Index`] on embedding or SQLite failure.
    #[instrument(skip(self, documents), fields(documents = documents.len()))]
    pub async fn build_index(
        &self,
        session_id: &str,
        documents: &[SourceDocument],
    ) -> LearningResult<IndexHandle> {
        let path = self.index_path(session_id)?;

        let chunks: Vec<(usize, IndexedChunk)> = documents
            .iter()
            .flat_map(|doc| {
                chunk_document(doc, self.config.chunk_size, self.config.chunk_overlap)
                    .into_iter()
                    .enumerate()
            })
            .collect();
        if chunks.is_empty() {
            return Err(LearningError::EmptyCorpus);
        }

        remove_index_files(&path).map_err(LearningError::Index)?;
        self.write_index(session_id, &path, &chunks)
            .await
            .map_err(LearningError::Index)?;

        info!(chunks = chunks.len(), path = %path.display(), "index built");
        Ok(IndexHandle {
            session_id: session_id.to_string(),
            path,
        })
    }

    async fn write_index(
        &self,
        session_id: &str,
        path: &std::path::Path,
        chunks: &[(usize, IndexedChunk)],
    ) -> anyhow::Result<()> {
        let hashes: Vec<String> = chunks.iter().map(|(_, c)| hash_text(&c.text)).collect();
        let vectors = self.embed_unique(chunks, &hashes).await?;

        let pool = db::connect(path).await?;
        db::migrate(&pool).await?;

        let mut tx = pool.begin().await?;
        for ((chunk_index, chunk), hash) in chunks.iter().zip(&hashes) {
            let vector = vectors
                .get(hash)
                .ok_or_else(|| anyhow::anyhow!("missing embedding for chunk {}", hash))?;
            sqlx::query(
                r#"
                INSERT INTO chunks (source_id, category, chunk_index, text, hash, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.source_id)
            .bind(chunk.category.as_str())
            .bind(*chunk_index as i64)
            .bind(&chunk.text)
            .bind(hash)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        let meta = [
            ("session_id", session_id.to_string()),
            ("model", self.embedder.model_name().to_string()),
            ("dims", self.embedder.dims().to_string()),
            ("created_at", chrono::Utc::now().to_rfc3339()),
        ];
        for (key, value) in meta {
            sqlx::query("INSERT OR REPLACE INTO index_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        pool.close().await;
        Ok(())
    }

    /// Embed each distinct chunk text once, `batch_size` texts per call.
    async fn embed_unique(
        &self,
        chunks: &[(usize, IndexedChunk)],
        hashes: &[String],
    ) -> anyhow::Result<HashMap<String, Vec<f32>>> {
        let mut pending: Vec<(&str, &str)> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for ((_, chunk), hash) in chunks.iter().zip(hashes) {
            if seen.insert(hash.as_str()) {
                pending.push((hash.as_str(), chunk.text.as_str()));
            }
        }

        let mut vectors = HashMap::with_capacity(pending.len());
        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|(_, t)| t.to_string()).collect();
            let embedded = self
                .embedder
                .embed_texts(&texts)
                .await
                .context("embedding batch failed")?;
            if embedded.len() != batch.len() {
                anyhow::bail!(
                    "embedding provider returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                );
            }
            for ((hash, _), vector) in batch.iter().zip(embedded) {
                vectors.insert(hash.to_string(), vector);
            }
            debug!(batch = batch.len(), "embedded chunk batch");
        }
        Ok(vectors)
    }

    /// Delete the index files of `session_id`. Returns `true` if any existed.
    pub fn remove(&self, session_id: &str) -> LearningResult<bool> {
        let path = self.index_path(session_id)?;
        let existed = path.exists();
        remove_index_files(&path).map_err(LearningError::Index)?;
        if existed {
            debug!(session_id, "index removed");
        }
        Ok(existed)
    }

    /// Reopen the persisted index for `session_id` without re-embedding.
    ///
    /// Returns `Ok(None)` when no index file exists.
    pub async fn open(&self, session_id: &str) -> LearningResult<Option<SessionIndex>> {
        let path = self.index_path(session_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let pool = db::connect(&path).await.map_err(LearningError::Index)?;

        let model: Option<String> =
            sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'model'")
                .fetch_optional(&pool)
                .await
                .map_err(|e| LearningError::Index(e.into()))?;
        let expected = self.embedder.model_name();
        if let Some(model) = model.filter(|m| m != expected) {
            pool.close().await;
            return Err(LearningError::Index(anyhow::anyhow!(
                "index for {} was built with model '{}' but the embedder is '{}'; re-run research",
                session_id,
                model,
                expected
            )));
        }

        Ok(Some(SessionIndex {
            pool,
            embedder: self.embedder.clone(),
        }))
    }
}

/// An open session index.
pub struct SessionIndex {
    pool: SqlitePool,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SessionIndex {
    /// Number of stored chunks.
    pub async fn len(&self) -> anyhow::Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

#[async_trait]
impl Retriever for SessionIndex {
    async fn retrieve(&self, query: &str, k: usize) -> anyhow::Result<Vec<IndexedChunk>> {
        let query_vec = embed_query(self.embedder.as_ref(), query).await?;

        let rows = sqlx::query(
            "SELECT source_id, category, text, embedding FROM chunks ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let category: String = row.get("category");
            let blob: Vec<u8> = row.get("embedding");
            entries.push((
                IndexedChunk {
                    text: row.get("text"),
                    source_id: row.get("source_id"),
                    category: category.parse()?,
                },
                blob_to_vec(&blob),
            ));
        }

        Ok(rank_by_similarity(
            &query_vec,
            entries.iter().map(|(c, v)| (c, v.as_slice())),
            k,
        ))
    }
}

fn remove_index_files(path: &std::path::Path) -> anyhow::Result<()> {
    for suffix in ["", "-wal", "-shm"] {
        let file = PathBuf::from(format!("{}{}", path.display(), suffix));
        if file.exists() {
            std::fs::remove_file(&file)
                .with_context(|| format!("failed to remove {}", file.display()))?;
        }
    }
    Ok(())
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
