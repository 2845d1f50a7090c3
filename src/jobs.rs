//! Observable background ingestion.
//!
//! The HTTP layer schedules syncs without blocking the response, but the
//! work is never fire-and-forget: a shared [`IngestTracker`] records the
//! job lifecycle so callers can see whether a sync is running and how the
//! last one ended. Only one sync may run at a time per process, which also
//! keeps concurrent uploads from racing on the metadata file.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::sync::{self, SyncReport};

/// Lifecycle of the (single) ingestion job.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IngestJob {
    Idle,
    Running {
        started_at: i64,
    },
    Completed {
        finished_at: i64,
        report: SyncReport,
    },
    Failed {
        finished_at: i64,
        error: String,
    },
}

impl IngestJob {
    pub fn is_running(&self) -> bool {
        matches!(self, IngestJob::Running { .. })
    }
}

/// Shared handle to the ingestion job state.
#[derive(Clone)]
pub struct IngestTracker {
    inner: Arc<RwLock<IngestJob>>,
}

impl Default for IngestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(IngestJob::Idle)),
        }
    }

    pub async fn snapshot(&self) -> IngestJob {
        self.inner.read().await.clone()
    }

    /// Transition to `Running` unless a sync is already in flight.
    pub async fn try_start(&self) -> bool {
        let mut job = self.inner.write().await;
        if job.is_running() {
            return false;
        }
        *job = IngestJob::Running {
            started_at: Utc::now().timestamp(),
        };
        true
    }

    /// Record the outcome of the running sync.
    pub async fn finish(&self, result: Result<SyncReport>) {
        let mut job = self.inner.write().await;
        *job = match result {
            Ok(report) => IngestJob::Completed {
                finished_at: Utc::now().timestamp(),
                report,
            },
            Err(e) => IngestJob::Failed {
                finished_at: Utc::now().timestamp(),
                error: e.to_string(),
            },
        };
    }

    /// Schedule a sync on the runtime. Returns `false` (and does nothing)
    /// if one is already running.
    pub async fn spawn(&self, config: Arc<Config>, embedder: Arc<dyn Embedder>) -> bool {
        if !self.try_start().await {
            return false;
        }

        let tracker = self.clone();
        tokio::spawn(async move {
            let result = sync::run_sync(&config, embedder.as_ref()).await;
            if result.is_ok() {
                if let Err(e) = sync::check_completeness(&config).await {
                    eprintln!("Warning: completeness check failed: {}", e);
                }
            }
            tracker.finish(result).await;
        });

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_once_until_finished() {
        let tracker = IngestTracker::new();
        assert!(matches!(tracker.snapshot().await, IngestJob::Idle));

        assert!(tracker.try_start().await);
        assert!(!tracker.try_start().await, "second start must be refused");
        assert!(tracker.snapshot().await.is_running());

        tracker.finish(Ok(SyncReport::default())).await;
        assert!(matches!(
            tracker.snapshot().await,
            IngestJob::Completed { .. }
        ));

        // A finished job can be restarted.
        assert!(tracker.try_start().await);
    }

    #[tokio::test]
    async fn failure_is_recorded_with_message() {
        let tracker = IngestTracker::new();
        assert!(tracker.try_start().await);
        tracker
            .finish(Err(anyhow::anyhow!("docs dir missing")))
            .await;

        match tracker.snapshot().await {
            IngestJob::Failed { error, .. } => assert!(error.contains("docs dir missing")),
            other => panic!("expected Failed, got {:?}", other),
        }
    }
}
