use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use aibridge_bus::channels;
use aibridge_core::{
    Error, Result, Task, TaskInput, TaskPriority, TaskStatus, TaskType, TaskUpdate,
};

use crate::handlers::TaskHandler;
use crate::store::{EventPublisher, TaskStore};

/// Naive planning assumption used by the completion estimate.
const ASSUMED_DAILY_THROUGHPUT: usize = 3;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct StatusBreakdown {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub blocked: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub total: usize,
    pub by_status: StatusBreakdown,
    /// Completed share of the whole queue, in percent. 0 when empty.
    pub overall_progress: f64,
    pub estimated_completion: DateTime<Utc>,
}

/// In-memory priority queue mirrored to backend storage.
///
/// Owned explicitly and passed by `Arc` into tool handlers, never through
/// global state. All mutation happens behind the queue mutex on the adapter's own
/// event loop; cross-process consistency is eventual via the store and the
/// published lifecycle events (last write wins on conflicting ids).
pub struct TaskManager {
    queue: Mutex<Vec<Task>>,
    /// Single in-flight execution slot; no parallel task execution within
    /// one adapter process.
    active: Mutex<Option<String>>,
    handlers: HashMap<TaskType, Arc<dyn TaskHandler>>,
    store: Arc<dyn TaskStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl TaskManager {
    pub fn new(
        store: Arc<dyn TaskStore>,
        publisher: Arc<dyn EventPublisher>,
        handlers: HashMap<TaskType, Arc<dyn TaskHandler>>,
    ) -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
            active: Mutex::new(None),
            handlers,
            store,
            publisher,
        }
    }

    /// Manager with the stock handler set for every task type.
    pub fn with_default_handlers(
        store: Arc<dyn TaskStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self::new(store, publisher, crate::handlers::default_handlers())
    }

    /// Validate the input, mint an id, insert sorted, persist, broadcast.
    pub async fn create_task(&self, input: TaskInput) -> Result<Task> {
        input.validate()?;

        let now = Utc::now();
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let task = Task {
            id: format!("task-{}-{}", now.timestamp_millis(), &nonce[..8]),
            task_type: input.task_type.unwrap_or(TaskType::Feature),
            title: input.title,
            description: input.description,
            status: TaskStatus::Pending,
            priority: input.priority.unwrap_or(TaskPriority::Medium),
            assignee: input.assignee,
            dependencies: input.dependencies,
            metadata: input.metadata,
            created_at: now,
            updated_at: now,
        };

        {
            let mut queue = self.queue.lock().await;
            queue.push(task.clone());
            // Stable sort: equal priorities keep insertion order.
            queue.sort_by_key(|t| t.priority.rank());
        }

        self.store.persist(&task).await?;
        self.publisher
            .publish(channels::TASKS_CREATED, serde_json::to_value(&task)?)
            .await;
        info!(task_id = %task.id, priority = %task.priority, "Task created");
        Ok(task)
    }

    /// Merge a partial update onto an existing task. The id is never part
    /// of the patch; a missing id leaves the queue untouched.
    pub async fn update_task(&self, id: &str, patch: TaskUpdate) -> Result<Task> {
        let merged = {
            let mut queue = self.queue.lock().await;
            let task = queue
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| Error::NotFound(format!("task {id} not found")))?;

            if let Some(title) = patch.title {
                task.title = title;
            }
            if let Some(description) = patch.description {
                task.description = description;
            }
            if let Some(status) = patch.status {
                task.status = status;
            }
            if let Some(priority) = patch.priority {
                task.priority = priority;
            }
            if let Some(assignee) = patch.assignee {
                task.assignee = Some(assignee);
            }
            if let Some(dependencies) = patch.dependencies {
                task.dependencies = dependencies;
            }
            if let Some(metadata) = patch.metadata {
                task.metadata.extend(metadata);
            }
            task.updated_at = Utc::now();
            let merged = task.clone();
            queue.sort_by_key(|t| t.priority.rank());
            merged
        };

        self.store.persist(&merged).await?;
        self.publisher
            .publish(channels::TASKS_UPDATED, serde_json::to_value(&merged)?)
            .await;
        debug!(task_id = %merged.id, status = %merged.status, "Task updated");
        Ok(merged)
    }

    /// Re-synchronize open tasks from the store (the backend is
    /// authoritative for any id it knows), re-apply the priority sort and
    /// return the open-task snapshot.
    pub async fn task_queue(&self) -> Result<Vec<Task>> {
        let fetched = self.store.fetch_open().await?;
        let mut queue = self.queue.lock().await;
        for remote in fetched {
            match queue.iter_mut().find(|t| t.id == remote.id) {
                Some(local) => *local = remote,
                None => queue.push(remote),
            }
        }
        queue.sort_by_key(|t| t.priority.rank());
        Ok(queue
            .iter()
            .filter(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::InProgress))
            .cloned()
            .collect())
    }

    /// Drive a task through `pending → in_progress → completed` via its
    /// type handler. Handler failure (or a missing handler) leaves the
    /// task `in_progress` for manual correction via [`Self::update_task`].
    pub async fn execute_task(&self, id: &str) -> Result<Task> {
        {
            let mut active = self.active.lock().await;
            if let Some(current) = active.as_ref() {
                return Err(Error::Handler(format!(
                    "task {current} is already executing"
                )));
            }
            *active = Some(id.to_string());
        }

        let result = self.run_execution(id).await;
        *self.active.lock().await = None;
        result
    }

    async fn run_execution(&self, id: &str) -> Result<Task> {
        let started = {
            let mut queue = self.queue.lock().await;
            let task = queue
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| Error::NotFound(format!("task {id} not found")))?;
            task.status = TaskStatus::InProgress;
            task.updated_at = Utc::now();
            task.clone()
        };
        self.store.persist(&started).await?;
        self.publisher
            .publish(channels::TASKS_UPDATED, serde_json::to_value(&started)?)
            .await;

        let handler = self.handlers.get(&started.task_type).ok_or_else(|| {
            warn!(task_id = id, task_type = %started.task_type, "No handler for task type");
            Error::Handler(format!(
                "no handler registered for task type {}",
                started.task_type
            ))
        })?;

        let output = handler.run(&started).await.map_err(|e| {
            warn!(task_id = id, error = %e, "Task handler failed");
            match e {
                Error::Handler(_) => e,
                other => Error::Handler(other.to_string()),
            }
        })?;

        let completed = {
            let mut queue = self.queue.lock().await;
            let task = queue
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| Error::NotFound(format!("task {id} vanished mid-execution")))?;
            task.status = TaskStatus::Completed;
            task.metadata.insert("result".to_string(), output);
            task.updated_at = Utc::now();
            task.clone()
        };
        self.store.persist(&completed).await?;
        self.publisher
            .publish(channels::TASKS_UPDATED, serde_json::to_value(&completed)?)
            .await;
        info!(task_id = id, "Task completed");
        Ok(completed)
    }

    /// Per-status counts over the current in-memory snapshot plus a naive
    /// completion estimate.
    pub async fn track_progress(&self) -> Progress {
        let queue = self.queue.lock().await;
        let mut by_status = StatusBreakdown::default();
        for task in queue.iter() {
            match task.status {
                TaskStatus::Pending => by_status.pending += 1,
                TaskStatus::InProgress => by_status.in_progress += 1,
                TaskStatus::Completed => by_status.completed += 1,
                TaskStatus::Blocked => by_status.blocked += 1,
            }
        }
        let total = queue.len();
        let overall_progress = if total == 0 {
            0.0
        } else {
            by_status.completed as f64 / total as f64 * 100.0
        };
        let days = by_status.pending.div_ceil(ASSUMED_DAILY_THROUGHPUT);
        Progress {
            total,
            by_status,
            overall_progress,
            estimated_completion: Utc::now() + Duration::days(days as i64),
        }
    }

    /// Id of the task currently executing, if any.
    pub async fn active_task(&self) -> Option<String> {
        self.active.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct InMemoryStore {
        tasks: Mutex<HashMap<String, Task>>,
        persist_calls: AtomicUsize,
    }

    #[async_trait]
    impl TaskStore for InMemoryStore {
        async fn persist(&self, task: &Task) -> Result<()> {
            self.persist_calls.fetch_add(1, Ordering::SeqCst);
            self.tasks
                .lock()
                .await
                .insert(task.id.clone(), task.clone());
            Ok(())
        }

        async fn fetch_open(&self) -> Result<Vec<Task>> {
            Ok(self
                .tasks
                .lock()
                .await
                .values()
                .filter(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::InProgress))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, channel: &str, payload: Value) {
            self.events
                .lock()
                .await
                .push((channel.to_string(), payload));
        }
    }

    fn manager() -> (TaskManager, Arc<InMemoryStore>, Arc<RecordingPublisher>) {
        let store = Arc::new(InMemoryStore::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let mgr = TaskManager::with_default_handlers(store.clone(), publisher.clone());
        (mgr, store, publisher)
    }

    fn input(title: &str) -> TaskInput {
        TaskInput {
            title: title.to_string(),
            description: format!("{title} description"),
            ..Default::default()
        }
    }

    fn input_with_priority(title: &str, priority: TaskPriority) -> TaskInput {
        TaskInput {
            priority: Some(priority),
            ..input(title)
        }
    }

    #[tokio::test]
    async fn test_create_task_defaults() {
        let (mgr, store, publisher) = manager();
        let a = mgr.create_task(input("Add caching")).await.unwrap();
        let b = mgr.create_task(input("Fix login")).await.unwrap();

        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
        assert_eq!(a.status, TaskStatus::Pending);
        assert_eq!(a.priority, TaskPriority::Medium);
        assert_eq!(a.task_type, TaskType::Feature);

        // Persisted and broadcast.
        assert!(store.tasks.lock().await.contains_key(&a.id));
        let events = publisher.events.lock().await;
        assert_eq!(events[0].0, channels::TASKS_CREATED);
        assert_eq!(events[0].1["id"], a.id.as_str());
    }

    #[tokio::test]
    async fn test_create_task_requires_title_and_description() {
        let (mgr, store, _) = manager();
        let missing_title = TaskInput {
            description: "d".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            mgr.create_task(missing_title).await,
            Err(Error::Validation(_))
        ));
        assert_eq!(store.persist_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_queue_orders_by_priority_with_stable_ties() {
        let (mgr, _, _) = manager();
        mgr.create_task(input_with_priority("one", TaskPriority::Low))
            .await
            .unwrap();
        mgr.create_task(input_with_priority("two", TaskPriority::Critical))
            .await
            .unwrap();
        mgr.create_task(input_with_priority("three", TaskPriority::Medium))
            .await
            .unwrap();
        mgr.create_task(input_with_priority("four", TaskPriority::High))
            .await
            .unwrap();
        // A second medium task must stay behind the first one.
        mgr.create_task(input_with_priority("five", TaskPriority::Medium))
            .await
            .unwrap();

        let queue = mgr.task_queue().await.unwrap();
        let priorities: Vec<TaskPriority> = queue.iter().map(|t| t.priority).collect();
        assert_eq!(
            priorities,
            vec![
                TaskPriority::Critical,
                TaskPriority::High,
                TaskPriority::Medium,
                TaskPriority::Medium,
                TaskPriority::Low,
            ]
        );
        assert_eq!(queue[2].title, "three");
        assert_eq!(queue[3].title, "five");
    }

    #[tokio::test]
    async fn test_update_task_not_found_leaves_queue_unchanged() {
        let (mgr, _, publisher) = manager();
        mgr.create_task(input("only")).await.unwrap();

        let err = mgr
            .update_task("task-does-not-exist", TaskUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let queue = mgr.task_queue().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].title, "only");
        // Only the create event went out.
        assert_eq!(publisher.events.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_fields_and_keeps_id() {
        let (mgr, _, publisher) = manager();
        let task = mgr.create_task(input("rename me")).await.unwrap();

        let patch = TaskUpdate {
            title: Some("renamed".to_string()),
            priority: Some(TaskPriority::Critical),
            metadata: Some(HashMap::from([("note".to_string(), json!("urgent"))])),
            ..Default::default()
        };
        let merged = mgr.update_task(&task.id, patch).await.unwrap();

        assert_eq!(merged.id, task.id);
        assert_eq!(merged.title, "renamed");
        assert_eq!(merged.priority, TaskPriority::Critical);
        assert_eq!(merged.description, task.description);
        assert_eq!(merged.metadata["note"], "urgent");

        let events = publisher.events.lock().await;
        assert_eq!(events.last().unwrap().0, channels::TASKS_UPDATED);
    }

    #[tokio::test]
    async fn test_execute_drives_lifecycle_to_completed() {
        let (mgr, _, publisher) = manager();
        let task = mgr.create_task(input("Ship it")).await.unwrap();

        let done = mgr.execute_task(&task.id).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.metadata.contains_key("result"));
        assert!(mgr.active_task().await.is_none());

        // The in_progress transition was broadcast before completion.
        let events = publisher.events.lock().await;
        let statuses: Vec<&str> = events
            .iter()
            .filter(|(c, _)| c == channels::TASKS_UPDATED)
            .map(|(_, p)| p["status"].as_str().unwrap())
            .collect();
        assert_eq!(statuses, vec!["in_progress", "completed"]);
    }

    #[tokio::test]
    async fn test_execute_unregistered_type_stays_in_progress() {
        let store = Arc::new(InMemoryStore::default());
        let publisher = Arc::new(RecordingPublisher::default());
        // No handlers at all: every type is unregistered.
        let mgr = TaskManager::new(store, publisher, HashMap::new());

        let task = mgr.create_task(input("orphaned")).await.unwrap();
        let err = mgr.execute_task(&task.id).await.unwrap_err();
        assert!(matches!(err, Error::Handler(_)));

        let queue = mgr.task_queue().await.unwrap();
        assert_eq!(queue[0].status, TaskStatus::InProgress);
        // The active slot was released despite the failure.
        assert!(mgr.active_task().await.is_none());
    }

    #[tokio::test]
    async fn test_execute_not_found() {
        let (mgr, _, _) = manager();
        let err = mgr.execute_task("task-missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(mgr.active_task().await.is_none());
    }

    struct StubHandler(Value);

    #[async_trait]
    impl TaskHandler for StubHandler {
        async fn run(&self, _task: &Task) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_feature_execution_end_to_end() {
        let store = Arc::new(InMemoryStore::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let mut handlers: HashMap<TaskType, Arc<dyn TaskHandler>> = HashMap::new();
        handlers.insert(
            TaskType::Feature,
            Arc::new(StubHandler(json!({"files_created": ["cache.py"]}))),
        );
        let mgr = TaskManager::new(store, publisher, handlers);

        let task = mgr
            .create_task(TaskInput {
                title: "Add caching".to_string(),
                description: "Cache hot lookups".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!task.id.is_empty());
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);

        let done = mgr.execute_task(&task.id).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.metadata["result"]["files_created"], json!(["cache.py"]));
    }

    struct FailingHandler;

    #[async_trait]
    impl TaskHandler for FailingHandler {
        async fn run(&self, _task: &Task) -> Result<Value> {
            Err(Error::Handler("simulated handler crash".to_string()))
        }
    }

    #[tokio::test]
    async fn test_handler_failure_keeps_in_progress() {
        let store = Arc::new(InMemoryStore::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let mut handlers: HashMap<TaskType, Arc<dyn TaskHandler>> = HashMap::new();
        handlers.insert(TaskType::Feature, Arc::new(FailingHandler));
        let mgr = TaskManager::new(store, publisher, handlers);

        let task = mgr.create_task(input("doomed")).await.unwrap();
        let err = mgr.execute_task(&task.id).await.unwrap_err();
        assert!(matches!(err, Error::Handler(_)));

        let queue = mgr.task_queue().await.unwrap();
        assert_eq!(queue[0].status, TaskStatus::InProgress);
    }

    struct GatedHandler {
        gate: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl TaskHandler for GatedHandler {
        async fn run(&self, _task: &Task) -> Result<Value> {
            self.gate.notified().await;
            Ok(json!({}))
        }
    }

    #[tokio::test]
    async fn test_single_active_task() {
        let store = Arc::new(InMemoryStore::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let gate = Arc::new(tokio::sync::Notify::new());
        let mut handlers: HashMap<TaskType, Arc<dyn TaskHandler>> = HashMap::new();
        handlers.insert(TaskType::Feature, Arc::new(GatedHandler { gate: gate.clone() }));
        let mgr = Arc::new(TaskManager::new(store, publisher, handlers));

        let first = mgr.create_task(input("first")).await.unwrap();
        let second = mgr.create_task(input("second")).await.unwrap();

        let mgr_bg = mgr.clone();
        let first_id = first.id.clone();
        let running = tokio::spawn(async move { mgr_bg.execute_task(&first_id).await });

        // Wait until the first execution holds the active slot.
        for _ in 0..100 {
            if mgr.active_task().await.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let err = mgr.execute_task(&second.id).await.unwrap_err();
        assert!(matches!(err, Error::Handler(_)));

        gate.notify_one();
        let done = running.await.unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_track_progress_breakdown() {
        let (mgr, _, _) = manager();
        let mut ids = Vec::new();
        for i in 0..10 {
            let task = mgr.create_task(input(&format!("task {i}"))).await.unwrap();
            ids.push(task.id);
        }
        for id in &ids[0..4] {
            mgr.update_task(
                id,
                TaskUpdate {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }
        for id in &ids[4..6] {
            mgr.update_task(
                id,
                TaskUpdate {
                    status: Some(TaskStatus::InProgress),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }
        mgr.update_task(
            &ids[6],
            TaskUpdate {
                status: Some(TaskStatus::Blocked),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let progress = mgr.track_progress().await;
        assert_eq!(progress.total, 10);
        assert_eq!(
            progress.by_status,
            StatusBreakdown {
                pending: 3,
                in_progress: 2,
                completed: 4,
                blocked: 1,
            }
        );
        assert_eq!(progress.overall_progress, 40.0);
        assert!(progress.estimated_completion > Utc::now());
    }

    #[tokio::test]
    async fn test_track_progress_empty_queue() {
        let (mgr, _, _) = manager();
        let progress = mgr.track_progress().await;
        assert_eq!(progress.total, 0);
        assert_eq!(progress.overall_progress, 0.0);
    }

    #[tokio::test]
    async fn test_task_queue_resyncs_from_store() {
        let (mgr, store, _) = manager();
        mgr.create_task(input("local")).await.unwrap();

        // A record another adapter persisted; the resync must pick it up.
        let now = Utc::now();
        let foreign = Task {
            id: "task-foreign-1".to_string(),
            task_type: TaskType::Bug,
            title: "foreign".to_string(),
            description: "written by another adapter".to_string(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Critical,
            assignee: None,
            dependencies: vec![],
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        };
        store
            .tasks
            .lock()
            .await
            .insert(foreign.id.clone(), foreign);

        let queue = mgr.task_queue().await.unwrap();
        assert_eq!(queue.len(), 2);
        // Critical foreign task sorts first.
        assert_eq!(queue[0].id, "task-foreign-1");
    }
}
