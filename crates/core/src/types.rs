use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Lifecycle state of a tracked task.
///
/// `pending → in_progress` on execution, then `completed` on handler
/// success. `blocked` is only ever entered by an explicit update.
/// `completed` and `blocked` are soft-terminal: nothing transitions out of
/// them automatically, but an explicit update may reopen them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "blocked" => Ok(TaskStatus::Blocked),
            other => Err(Error::Validation(format!("unknown task status: {other}"))),
        }
    }
}

/// Scheduling priority. The ordering is total: critical sorts before high,
/// high before medium, medium before low.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl TaskPriority {
    /// Sort rank, lowest first. Used as the stable-sort key for the queue.
    pub fn rank(&self) -> u8 {
        match self {
            TaskPriority::Critical => 0,
            TaskPriority::High => 1,
            TaskPriority::Medium => 2,
            TaskPriority::Low => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Critical => "critical",
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "critical" => Ok(TaskPriority::Critical),
            "high" => Ok(TaskPriority::High),
            "medium" => Ok(TaskPriority::Medium),
            "low" => Ok(TaskPriority::Low),
            other => Err(Error::Validation(format!("unknown task priority: {other}"))),
        }
    }
}

/// Kind of development work a task represents. Execution dispatches on
/// this to a type-specific handler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Feature,
    Bug,
    Refactor,
    Test,
    Docs,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Feature => "feature",
            TaskType::Bug => "bug",
            TaskType::Refactor => "refactor",
            TaskType::Test => "test",
            TaskType::Docs => "docs",
        }
    }

    pub const ALL: [TaskType; 5] = [
        TaskType::Feature,
        TaskType::Bug,
        TaskType::Refactor,
        TaskType::Test,
        TaskType::Docs,
    ];
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "feature" => Ok(TaskType::Feature),
            "bug" => Ok(TaskType::Bug),
            "refactor" => Ok(TaskType::Refactor),
            "test" => Ok(TaskType::Test),
            "docs" => Ok(TaskType::Docs),
            other => Err(Error::Validation(format!("unknown task type: {other}"))),
        }
    }
}

/// A unit of development work tracked by the bridge.
///
/// The backend copy is authoritative after every persistence round-trip;
/// the in-memory copy exists only for ordering and inspection. `id` is
/// immutable once assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Ordered list of task ids this task depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload accepted by task creation. Title and description are required;
/// everything else has a default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub task_type: Option<TaskType>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl TaskInput {
    /// Reject inputs missing the required fields before any id is minted.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("task title is required".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(Error::Validation("task description is required".to_string()));
        }
        Ok(())
    }
}

/// Partial update merged onto an existing task. `id` is never part of the
/// patch; unset fields leave the record untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, Value>>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.assignee.is_none()
            && self.dependencies.is_none()
            && self.metadata.is_none()
    }
}

/// Structured metadata attached to a stored memory record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMetadata {
    /// Record kind, e.g. "insight", "task", "decision".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Whether the record is visible to other assistants.
    #[serde(default)]
    pub shared: bool,
    /// Free-form fields the backend stores verbatim.
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

/// A record persisted to the shared memory backend. The backend is
/// authoritative once the store call returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub content: String,
    #[serde(default)]
    pub metadata: MemoryMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

/// Ephemeral cross-assistant payload carried over the pub/sub broker.
/// Not persisted unless explicitly mirrored to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationMessage {
    pub from: String,
    /// Target assistant, or "*" for broadcast.
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: Value,
    pub timestamp: DateTime<Utc>,
}

impl CoordinationMessage {
    pub fn broadcast(from: &str, kind: &str, content: Value) -> Self {
        Self {
            from: from.to_string(),
            to: "*".to_string(),
            kind: kind.to_string(),
            content,
            timestamp: Utc::now(),
        }
    }
}

/// A shared finding broadcast on the insights channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightMessage {
    pub from: String,
    pub topic: String,
    pub content: String,
    #[serde(default)]
    pub shared: bool,
    pub timestamp: DateTime<Utc>,
}
