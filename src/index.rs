//! SQLite-backed vector index.
//!
//! Stores chunks and their embedding BLOBs in `index.sqlite` under the index
//! directory. Similarity queries are brute-force cosine over all stored
//! vectors; the ordering semantics belong to this module alone and callers
//! treat the index as an opaque collaborator.
//!
//! Chunks are only ever replaced wholesale per source path; there is no
//! per-chunk update.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::chunk::{sanitize_metadata, Chunk};
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};

/// A chunk returned from a similarity query, ordered by descending score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub id: String,
    pub path: String,
    pub chunk_index: i64,
    pub text: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub score: f32,
}

pub struct VectorIndex {
    pool: SqlitePool,
}

impl VectorIndex {
    /// Open (or create) the index under `index_dir` and run migrations.
    pub async fn open(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;
        let db_path = index_dir.join("index.sqlite");

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let index = Self { pool };
        index.migrate().await?;
        Ok(index)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                path TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                metadata_json TEXT NOT NULL DEFAULT '{}',
                UNIQUE(path, chunk_index)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunk_vectors (
                chunk_id TEXT PRIMARY KEY,
                embedding BLOB NOT NULL,
                FOREIGN KEY (chunk_id) REFERENCES chunks(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_path ON chunks(path)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Replace every chunk for `path` with the given chunk/vector pairs,
    /// transactionally.
    pub async fn replace_document(&self, path: &str, entries: &[(Chunk, Vec<f32>)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM chunk_vectors WHERE chunk_id IN (SELECT id FROM chunks WHERE path = ?)",
        )
        .bind(path)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM chunks WHERE path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await?;

        for (chunk, vector) in entries {
            let metadata_json =
                serde_json::to_string(&sanitize_metadata(chunk.metadata.clone()))?;

            sqlx::query(
                "INSERT INTO chunks (id, path, chunk_index, text, metadata_json) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.path)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&metadata_json)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO chunk_vectors (chunk_id, embedding) VALUES (?, ?)")
                .bind(&chunk.id)
                .bind(vec_to_blob(vector))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Remove all chunks and vectors for a deleted source path.
    pub async fn delete_document(&self, path: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM chunk_vectors WHERE chunk_id IN (SELECT id FROM chunks WHERE path = ?)",
        )
        .bind(path)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM chunks WHERE path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Brute-force cosine similarity over all stored vectors; descending
    /// score, truncated to `k`.
    pub async fn similarity_search(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.path, c.chunk_index, c.text, c.metadata_json, cv.embedding
            FROM chunk_vectors cv
            JOIN chunks c ON c.id = cv.chunk_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut results: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                let metadata_json: String = row.get("metadata_json");
                let metadata = serde_json::from_str(&metadata_json).unwrap_or_default();

                ScoredChunk {
                    id: row.get("id"),
                    path: row.get("path"),
                    chunk_index: row.get("chunk_index"),
                    text: row.get("text"),
                    metadata,
                    score: cosine_similarity(query_vec, &vec),
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);

        Ok(results)
    }

    /// Number of indexed chunks.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;

    fn entry(path: &str, index: i64, text: &str, vec: Vec<f32>) -> (Chunk, Vec<f32>) {
        let mut chunk = chunk_text(path, text, 1000, 100).remove(0);
        chunk.chunk_index = index;
        (chunk, vec)
    }

    #[tokio::test]
    async fn replace_and_count() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = VectorIndex::open(tmp.path()).await.unwrap();

        let entries = vec![
            entry("a.txt", 0, "alpha", vec![1.0, 0.0]),
            entry("a.txt", 1, "beta", vec![0.0, 1.0]),
        ];

        index.replace_document("a.txt", &entries).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 2);

        // Wholesale replacement, not accumulation.
        index
            .replace_document("a.txt", &entries[..1])
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 1);

        index.close().await;
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = VectorIndex::open(tmp.path()).await.unwrap();

        let entries = vec![
            entry("dirs.txt", 0, "north", vec![1.0, 0.0]),
            entry("dirs.txt", 1, "east", vec![0.0, 1.0]),
            entry("dirs.txt", 2, "northeast", vec![0.7, 0.7]),
        ];
        index.replace_document("dirs.txt", &entries).await.unwrap();

        let results = index.similarity_search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "north");
        assert_eq!(results[1].text, "northeast");
        assert!(results[0].score >= results[1].score);
        assert_eq!(results[0].metadata["source"], "dirs.txt");

        index.close().await;
    }

    #[tokio::test]
    async fn delete_document_removes_chunks_and_vectors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = VectorIndex::open(tmp.path()).await.unwrap();

        let entries = vec![entry("gone.txt", 0, "to be removed", vec![1.0, 0.0])];
        index.replace_document("gone.txt", &entries).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);

        index.delete_document("gone.txt").await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index
            .similarity_search(&[1.0, 0.0], 5)
            .await
            .unwrap()
            .is_empty());

        index.close().await;
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = VectorIndex::open(tmp.path()).await.unwrap();
        index.close().await;
        let index = VectorIndex::open(tmp.path()).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        index.close().await;
    }
}
