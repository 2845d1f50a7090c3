//! Incremental document synchronization.
//!
//! Coordinates the full sync flow: hash diff → load → chunk → embed →
//! index → prune → metadata save. Per-file failures are logged and
//! skipped. There is no rollback: a crash before the metadata save only
//! costs redundant re-embedding on the next run.

use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::chunk::{chunk_text, Chunk};
use crate::config::Config;
use crate::embedding::Embedder;
use crate::hash_store;
use crate::index::VectorIndex;
use crate::loader;

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub files_seen: usize,
    pub added_or_changed: usize,
    pub deleted: usize,
    pub documents_embedded: usize,
    pub documents_unchanged: usize,
    pub chunks_indexed: usize,
    pub files_failed: usize,
}

/// Run one full sync of `docs_dir` into the index.
///
/// The whole docs tree is reloaded and re-chunked every run; the
/// embed-and-write step is skipped for documents whose content hash is
/// unchanged, so a repeat sync with no file changes writes nothing.
pub async fn run_sync(config: &Config, embedder: &dyn Embedder) -> Result<SyncReport> {
    let docs_dir = &config.storage.docs_dir;
    if !docs_dir.exists() {
        bail!("Documents directory does not exist: {}", docs_dir.display());
    }

    let metadata_path = config.metadata_path();
    let previous = hash_store::load(&metadata_path)?;
    let current = hash_store::scan_docs(docs_dir)?;
    let plan = hash_store::diff(&previous, &current);

    println!("sync {}", docs_dir.display());
    println!("  files seen: {}", current.len());
    println!("  added or changed: {}", plan.added_or_changed.len());
    println!("  deleted: {}", plan.deleted.len());

    let index = VectorIndex::open(&config.storage.index_dir).await?;

    let docs = loader::load_documents(docs_dir);

    let mut report = SyncReport {
        files_seen: current.len(),
        added_or_changed: plan.added_or_changed.len(),
        deleted: plan.deleted.len(),
        ..Default::default()
    };

    // Hash entries advance only for files actually processed this run, so a
    // file that failed to load is retried on the next sync.
    let mut new_state: BTreeMap<String, String> = BTreeMap::new();

    for doc in &docs {
        let path_str = doc.path.display().to_string();
        let hash = match current.get(&path_str) {
            Some(h) => h.clone(),
            None => continue,
        };

        if previous.get(&path_str) == Some(&hash) {
            report.documents_unchanged += 1;
            new_state.insert(path_str, hash);
            continue;
        }

        let chunks = chunk_text(
            &path_str,
            &doc.text,
            config.chunking.max_chars,
            config.chunking.overlap_chars,
        );

        match embed_and_store(&index, embedder, &path_str, chunks).await {
            Ok(indexed) => {
                report.documents_embedded += 1;
                report.chunks_indexed += indexed;
                new_state.insert(path_str, hash);
            }
            Err(e) => {
                eprintln!("Warning: failed to index {}: {}", path_str, e);
                report.files_failed += 1;
            }
        }
    }

    report.files_failed += current.len().saturating_sub(docs.len());

    // Deleted files lose both their index chunks and their hash entry.
    for path in &plan.deleted {
        index.delete_document(path).await?;
    }

    hash_store::save(&metadata_path, &new_state)?;

    println!("  documents embedded: {}", report.documents_embedded);
    println!("  documents unchanged: {}", report.documents_unchanged);
    println!("  chunks indexed: {}", report.chunks_indexed);
    if report.files_failed > 0 {
        println!("  files failed: {}", report.files_failed);
    }
    println!("ok");

    index.close().await;
    Ok(report)
}

/// Embed a document's chunks in backend-sized batches and replace its index
/// entry. An empty document simply clears whatever the index held for it.
async fn embed_and_store(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    path: &str,
    chunks: Vec<Chunk>,
) -> Result<usize> {
    let mut entries: Vec<(Chunk, Vec<f32>)> = Vec::with_capacity(chunks.len());

    for batch in chunks.chunks(embedder.batch_size().max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        if vectors.len() != batch.len() {
            bail!(
                "embedding count mismatch: sent {} texts, got {} vectors",
                batch.len(),
                vectors.len()
            );
        }
        for (chunk, vector) in batch.iter().zip(vectors.into_iter()) {
            entries.push((chunk.clone(), vector));
        }
    }

    index.replace_document(path, &entries).await?;
    Ok(entries.len())
}

/// Completeness check result.
#[derive(Debug, Clone, Serialize)]
pub struct CompletenessReport {
    pub status: String,
    pub local_files: usize,
    pub indexed_chunks: i64,
}

/// Compare the count of top-level files in the docs directory against the
/// index's chunk count; `Complete` iff `indexed_chunks >= local_files`.
///
/// This is a coarse health signal, not an audit: chunk counts are not file
/// counts, so a many-chunk document can mask a missing one, and a short
/// document can report `Incomplete` spuriously right after a clean sync.
pub async fn check_completeness(config: &Config) -> Result<CompletenessReport> {
    let report = completeness_of(&config.storage.docs_dir, &config.storage.index_dir).await?;
    println!(
        "[completeness] {} | local files: {}, indexed chunks: {}",
        report.status, report.local_files, report.indexed_chunks
    );
    Ok(report)
}

async fn completeness_of(docs_dir: &Path, index_dir: &Path) -> Result<CompletenessReport> {
    if !docs_dir.is_dir() {
        bail!("Not a directory: {}", docs_dir.display());
    }

    let local_files = std::fs::read_dir(docs_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .count();

    let index = VectorIndex::open(index_dir).await?;
    let indexed_chunks = index.count().await?;
    index.close().await;

    let status = if indexed_chunks >= local_files as i64 {
        "Complete"
    } else {
        "Incomplete"
    };

    Ok(CompletenessReport {
        status: status.to_string(),
        local_files,
        indexed_chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;

    #[tokio::test]
    async fn completeness_both_directions() {
        let tmp = tempfile::TempDir::new().unwrap();
        let docs = tmp.path().join("docs");
        let index_dir = tmp.path().join("index");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("a.txt"), "alpha").unwrap();
        std::fs::write(docs.join("b.txt"), "beta").unwrap();

        // Empty index, two local files: incomplete.
        let report = completeness_of(&docs, &index_dir).await.unwrap();
        assert_eq!(report.status, "Incomplete");
        assert_eq!(report.local_files, 2);
        assert_eq!(report.indexed_chunks, 0);

        // Two chunks indexed from a single file still counts as complete;
        // the metric compares counts, not identity.
        let index = VectorIndex::open(&index_dir).await.unwrap();
        let entries: Vec<_> = ["one", "two"]
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let mut c = chunk_text("a.txt", text, 1000, 100).remove(0);
                c.chunk_index = i as i64;
                (c, vec![1.0f32, 0.0])
            })
            .collect();
        index.replace_document("a.txt", &entries).await.unwrap();
        index.close().await;

        let report = completeness_of(&docs, &index_dir).await.unwrap();
        assert_eq!(report.status, "Complete");
        assert_eq!(report.indexed_chunks, 2);
    }

    #[tokio::test]
    async fn completeness_rejects_missing_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = completeness_of(&tmp.path().join("absent"), &tmp.path().join("index")).await;
        assert!(err.is_err());
    }
}
