//! Persisted path→content-hash map used to detect added, changed, and
//! deleted source files between syncs.
//!
//! The map lives as flat JSON at `<index_dir>/metadata.json`. Absence of a
//! path means "not yet seen" or "deleted since last sync"; the diff computed
//! against the current filesystem scan is transient and never persisted
//! itself.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use walkdir::WalkDir;

/// File extensions the pipeline knows how to load.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["pdf", "txt", "md", "docx"];

/// Sets of paths that changed since the previous sync.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub added_or_changed: Vec<String>,
    pub deleted: Vec<String>,
}

/// Load the persisted hash map, or an empty map if the file is absent.
pub fn load(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read hash map: {}", path.display()))?;
    let map = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse hash map: {}", path.display()))?;
    Ok(map)
}

/// Persist the hash map, unconditionally overwriting the previous file.
pub fn save(path: &Path, map: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(map)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write hash map: {}", path.display()))?;
    Ok(())
}

/// Walk `docs_dir` recursively and hash every supported file.
///
/// Keys are the files' absolute-ish display paths; the BTreeMap makes the
/// result independent of filesystem traversal order.
pub fn scan_docs(docs_dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut current = BTreeMap::new();

    for entry in WalkDir::new(docs_dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !is_supported(path) {
            continue;
        }
        let hash = hash_file(path)
            .with_context(|| format!("Failed to hash file: {}", path.display()))?;
        current.insert(path.display().to_string(), hash);
    }

    Ok(current)
}

/// Compare the previous map against the current scan.
pub fn diff(previous: &BTreeMap<String, String>, current: &BTreeMap<String, String>) -> SyncPlan {
    let added_or_changed = current
        .iter()
        .filter(|(path, hash)| previous.get(*path) != Some(*hash))
        .map(|(path, _)| path.clone())
        .collect();

    let deleted = previous
        .keys()
        .filter(|path| !current.contains_key(*path))
        .cloned()
        .collect();

    SyncPlan {
        added_or_changed,
        deleted,
    }
}

/// True if the file's extension is in [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// Sha256 of the file contents, streamed in 8 KiB reads.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
