use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory of the documents to index.
    pub docs_dir: PathBuf,
    /// Directory holding the vector index (`index.sqlite`) and the hash map
    /// (`metadata.json`).
    pub index_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Result count for plain search when the caller does not pass one.
    #[serde(default = "default_search_k")]
    pub search_k: usize,
    /// Context size for the first answer-generation pass.
    #[serde(default = "default_answer_k")]
    pub answer_k: usize,
    /// Context size for the single escalation retry.
    #[serde(default = "default_escalated_k")]
    pub escalated_k: usize,
    /// Answers shorter than this (in chars) trigger the escalation retry.
    #[serde(default = "default_min_answer_chars")]
    pub min_answer_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_k: default_search_k(),
            answer_k: default_answer_k(),
            escalated_k: default_escalated_k(),
            min_answer_chars: default_min_answer_chars(),
        }
    }
}

fn default_search_k() -> usize {
    5
}
fn default_answer_k() -> usize {
    50
}
fn default_escalated_k() -> usize {
    80
}
fn default_min_answer_chars() -> usize {
    40
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
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
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}
fn default_dims() -> usize {
    3072
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
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_model() -> String {
    "gpt-4o".to_string()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_llm_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Where uploaded files land. Defaults to `<docs_dir>/uploads` so the
    /// sync scheduled after an upload actually sees the new file.
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            upload_dir: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Config {
    pub fn metadata_path(&self) -> PathBuf {
        self.storage.index_dir.join("metadata.json")
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.server
            .upload_dir
            .clone()
            .unwrap_or_else(|| self.storage.docs_dir.join("uploads"))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.max_chars");
    }

    if config.retrieval.search_k == 0 || config.retrieval.answer_k == 0 {
        anyhow::bail!("retrieval.search_k and retrieval.answer_k must be >= 1");
    }
    if config.retrieval.escalated_k < config.retrieval.answer_k {
        anyhow::bail!("retrieval.escalated_k must be >= retrieval.answer_k");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Config {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse(
            r#"
            [storage]
            docs_dir = "./docs"
            index_dir = "./index"
            "#,
        );
        assert_eq!(config.chunking.max_chars, 1000);
        assert_eq!(config.chunking.overlap_chars, 100);
        assert_eq!(config.retrieval.search_k, 5);
        assert_eq!(config.retrieval.answer_k, 50);
        assert_eq!(config.retrieval.escalated_k, 80);
        assert_eq!(config.retrieval.min_answer_chars, 40);
        assert_eq!(config.embedding.model, "text-embedding-3-large");
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.server.bind, "127.0.0.1:8000");
    }

    #[test]
    fn upload_dir_defaults_under_docs() {
        let config = parse(
            r#"
            [storage]
            docs_dir = "/data/docs"
            index_dir = "/data/index"
            "#,
        );
        assert_eq!(config.upload_dir(), PathBuf::from("/data/docs/uploads"));
        assert_eq!(
            config.metadata_path(),
            PathBuf::from("/data/index/metadata.json")
        );
    }
}
