//! # docqa
//!
//! Local-first document ingestion, semantic search, and grounded Q&A.
//!
//! docqa walks a directory of documents (pdf, txt, md, docx), detects
//! added/changed/deleted files by content hash, chunks and embeds the
//! changed ones into a SQLite-backed vector index, and answers queries
//! either by nearest-neighbor search or by a language-model answer grounded
//! in retrieved context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌────────────┐
//! │  Loader  │──▶│  Sync Engine   │──▶│   SQLite    │
//! │ pdf/docx │   │ hash-diff,     │   │ chunks +   │
//! │ txt/md   │   │ chunk, embed   │   │ vectors    │
//! └──────────┘   └───────────────┘   └─────┬──────┘
//!                                          │
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 │ (docqa)  │       │  (axum)  │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`hash_store`] | Path→hash map and sync diffing |
//! | [`loader`] | Multi-format document loading |
//! | [`chunk`] | Sliding-window text chunking |
//! | [`embedding`] | Embedding provider client + vector utilities |
//! | [`llm`] | Chat-completion client for answer generation |
//! | [`index`] | SQLite vector index |
//! | [`sync`] | Incremental sync engine + completeness check |
//! | [`query`] | Search and answer engines |
//! | [`jobs`] | Observable background ingestion |
//! | [`server`] | HTTP API |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod hash_store;
pub mod index;
pub mod jobs;
pub mod llm;
pub mod loader;
pub mod query;
pub mod server;
pub mod sync;
