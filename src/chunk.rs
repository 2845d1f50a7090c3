//! Sliding-window text chunker.
//!
//! Splits document text into overlapping segments of at most `max_chars`
//! characters, each window advancing by `max_chars - overlap_chars`. Chunks
//! whose trimmed text is empty are dropped, so an empty document yields no
//! chunks at all.
//!
//! Each chunk carries a flat metadata map; [`sanitize_metadata`] guarantees
//! only primitive values (string/number/boolean) reach the index, flattening
//! anything nested into its JSON string form.

use serde_json::{Map, Value};
use uuid::Uuid;

/// A bounded-length text segment, the unit stored in and retrieved from the
/// vector index.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub path: String,
    pub chunk_index: i64,
    pub text: String,
    pub metadata: Map<String, Value>,
}

/// Split `text` into overlapping chunks. Returns chunks with contiguous
/// indices starting at 0; empty or whitespace-only windows are dropped.
pub fn chunk_text(path: &str, text: &str, max_chars: usize, overlap_chars: usize) -> Vec<Chunk> {
    debug_assert!(overlap_chars < max_chars);

    let chars: Vec<char> = text.chars().collect();
    let step = max_chars.saturating_sub(overlap_chars).max(1);
    let mut chunks = Vec::new();
    let mut chunk_index: i64 = 0;
    let mut start = 0usize;

    while start < chars.len() {
        let end = (start + max_chars).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();

        if !trimmed.is_empty() {
            chunks.push(make_chunk(path, chunk_index, trimmed));
            chunk_index += 1;
        }

        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

fn make_chunk(path: &str, index: i64, text: &str) -> Chunk {
    let mut metadata = Map::new();
    metadata.insert("source".to_string(), Value::String(path.to_string()));
    metadata.insert("chunk_index".to_string(), Value::from(index));

    Chunk {
        id: Uuid::new_v4().to_string(),
        path: path.to_string(),
        chunk_index: index,
        text: text.to_string(),
        metadata,
    }
}

/// Flatten a metadata map to primitive-serializable values.
///
/// Strings, numbers, and booleans pass through; arrays, objects, and nulls
/// are replaced with their JSON string form so nothing nested is persisted.
pub fn sanitize_metadata(metadata: Map<String, Value>) -> Map<String, Value> {
    metadata
        .into_iter()
        .map(|(k, v)| {
            let clean = match v {
                Value::String(_) | Value::Number(_) | Value::Bool(_) => v,
                other => Value::String(other.to_string()),
            };
            (k, clean)
        })
        .collect()
}
