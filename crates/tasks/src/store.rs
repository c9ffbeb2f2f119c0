//! Persistence and broadcast seams for the task manager.
//!
//! The manager never talks to the backend or the broker directly; it goes
//! through these traits so unit tests can substitute in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use aibridge_backend::{BackendClient, SearchRequest};
use aibridge_bus::Coordinator;
use aibridge_core::{MemoryMetadata, MemoryRecord, Result, Task};

/// How many open tasks a resync pulls from the backend at most.
const RESYNC_LIMIT: usize = 100;

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Upsert the full task record. Last write wins on conflicting ids.
    async fn persist(&self, task: &Task) -> Result<()>;
    /// Fetch every task with status `pending` or `in_progress`.
    async fn fetch_open(&self) -> Result<Vec<Task>>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Fire-and-forget broadcast.
    async fn publish(&self, channel: &str, payload: Value);
}

/// Production store: tasks live in the shared memory backend as records
/// with `kind = "task"`, keyed by `task_id` in the metadata.
pub struct BackendTaskStore {
    backend: Arc<BackendClient>,
}

impl BackendTaskStore {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl TaskStore for BackendTaskStore {
    async fn persist(&self, task: &Task) -> Result<()> {
        let record = MemoryRecord {
            content: serde_json::to_string(task)?,
            metadata: MemoryMetadata {
                kind: Some("task".to_string()),
                shared: true,
                extra: [
                    ("task_id".to_string(), json!(task.id)),
                    ("status".to_string(), json!(task.status)),
                    ("priority".to_string(), json!(task.priority)),
                ]
                .into_iter()
                .collect(),
                ..Default::default()
            },
            ttl_secs: None,
        };
        self.backend.store_memory(&record).await?;
        Ok(())
    }

    async fn fetch_open(&self) -> Result<Vec<Task>> {
        let request = SearchRequest {
            query: "task".to_string(),
            limit: RESYNC_LIMIT,
            metadata_filter: Some(json!({
                "kind": "task",
                "status": ["pending", "in_progress"],
            })),
        };
        let results = self.backend.search_memory(&request).await?;
        let mut tasks = Vec::with_capacity(results.len());
        for result in results {
            let Some(content) = result.get("content").and_then(|c| c.as_str()) else {
                continue;
            };
            match serde_json::from_str::<Task>(content) {
                Ok(task) => tasks.push(task),
                Err(e) => warn!(error = %e, "Skipping malformed task record from backend"),
            }
        }
        Ok(tasks)
    }
}

/// Production publisher: task lifecycle events go out over the broker.
pub struct BusPublisher {
    coordinator: Arc<Coordinator>,
}

impl BusPublisher {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl EventPublisher for BusPublisher {
    async fn publish(&self, channel: &str, payload: Value) {
        self.coordinator.publish(channel, payload).await;
    }
}
