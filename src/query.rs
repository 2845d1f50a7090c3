//! Query engines: nearest-neighbor search and grounded answer generation.
//!
//! Search delegates ordering entirely to the vector index: no re-ranking,
//! no dedup. Answer mode is two-stage: a first pass over `answer_k` chunks,
//! then exactly one retry over `escalated_k` chunks when the first response
//! looks insufficient (sentinel-prefixed or shorter than
//! `min_answer_chars`). The second response is returned unconditionally.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::embedding::Embedder;
use crate::index::{ScoredChunk, VectorIndex};
use crate::llm::Generator;

/// Fixed sentinel for "the context does not contain the answer".
pub const DONT_KNOW: &str = "I don't know.";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Similarity search over the index. `k` falls back to the configured
/// default when not supplied.
pub async fn run_search(
    config: &Config,
    embedder: &dyn Embedder,
    query: &str,
    k: Option<usize>,
) -> Result<Vec<ScoredChunk>> {
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }

    let k = k.unwrap_or(config.retrieval.search_k);
    let query_vec = embedder.embed_query(query).await?;

    let index = VectorIndex::open(&config.storage.index_dir).await?;
    let results = index.similarity_search(&query_vec, k).await?;
    index.close().await;

    Ok(results)
}

/// Grounded answer generation with a single context-expansion retry.
pub async fn run_answer(
    config: &Config,
    embedder: &dyn Embedder,
    generator: &dyn Generator,
    question: &str,
) -> Result<String> {
    if question.trim().is_empty() {
        bail!("question must not be empty");
    }

    let query_vec = embedder.embed_query(question).await?;
    let index = VectorIndex::open(&config.storage.index_dir).await?;

    let first_pass = index
        .similarity_search(&query_vec, config.retrieval.answer_k)
        .await?;
    if first_pass.is_empty() {
        index.close().await;
        return Ok(DONT_KNOW.to_string());
    }

    let prompt = build_prompt(&join_context(&first_pass), question);
    let mut answer = generator.complete(&prompt).await?;

    if needs_escalation(&answer, config.retrieval.min_answer_chars) {
        println!(
            "Expanding context (k={})...",
            config.retrieval.escalated_k
        );
        let second_pass = index
            .similarity_search(&query_vec, config.retrieval.escalated_k)
            .await?;
        let prompt = build_prompt(&join_context(&second_pass), question);
        answer = generator.complete(&prompt).await?;
    }

    index.close().await;
    Ok(answer)
}

/// True when a first-pass answer warrants the one escalation retry: it
/// starts with the sentinel (case-insensitive) or is shorter than
/// `min_chars` characters.
pub fn needs_escalation(answer: &str, min_chars: usize) -> bool {
    answer.to_lowercase().starts_with("i don't know") || answer.chars().count() < min_chars
}

fn join_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Use ONLY the provided context to answer the question accurately and completely.\n\
         If the context implies the answer indirectly, infer it using reasoning.\n\
         If the answer is missing, say \"{}\"\n\n\
         Context:\n{}\n\n\
         Question: {}\n\n\
         Answer:",
        DONT_KNOW, context, question
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Fails the test if the engine reaches the embedding backend.
    struct UnreachableEmbedder;

    #[async_trait]
    impl Embedder for UnreachableEmbedder {
        fn batch_size(&self) -> usize {
            64
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            panic!("embedder must not be called");
        }
    }

    struct UnreachableGenerator;

    #[async_trait]
    impl Generator for UnreachableGenerator {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            panic!("generator must not be called");
        }
    }

    fn test_config() -> Config {
        toml::from_str(
            r#"
            [storage]
            docs_dir = "/tmp/docqa-test-docs"
            index_dir = "/tmp/docqa-test-index"
            "#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn empty_query_is_rejected_before_any_external_call() {
        let config = test_config();
        let err = run_search(&config, &UnreachableEmbedder, "   ", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[tokio::test]
    async fn empty_question_is_rejected_before_any_external_call() {
        let config = test_config();
        let err = run_answer(&config, &UnreachableEmbedder, &UnreachableGenerator, "")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn sentinel_prefix_triggers_escalation() {
        assert!(needs_escalation(DONT_KNOW, 40));
        assert!(needs_escalation("I don't know. The context is silent on this topic entirely.", 40));
        assert!(needs_escalation("i don't know", 40));
    }

    #[test]
    fn short_answer_triggers_escalation() {
        assert!(needs_escalation("Yes.", 40));
        assert!(needs_escalation("", 40));
    }

    #[test]
    fn long_confident_answer_does_not_escalate() {
        let answer = "The deployment runs on three regional clusters behind a shared gateway.";
        assert!(!needs_escalation(answer, 40));
    }

    #[test]
    fn threshold_is_counted_in_chars_not_bytes() {
        let answer = "é".repeat(40);
        assert!(!needs_escalation(&answer, 40));
        let answer = "é".repeat(39);
        assert!(needs_escalation(&answer, 40));
    }

    #[test]
    fn prompt_contains_context_and_question() {
        let prompt = build_prompt("CTX", "What is up?");
        assert!(prompt.contains("Context:\nCTX"));
        assert!(prompt.contains("Question: What is up?"));
        assert!(prompt.contains(DONT_KNOW));
    }
}
