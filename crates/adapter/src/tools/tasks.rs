use async_trait::async_trait;
use serde_json::{json, Value};

use aibridge_core::{Result, TaskInput, TaskUpdate};

use super::required_str;
use crate::{Tool, ToolContext, ToolName, ToolSchema};

/// Create a task in the shared queue.
pub struct CreateTaskTool;

/// Merge a partial update onto an existing task.
pub struct UpdateTaskTool;

/// Snapshot of the open task queue, priority-ordered.
pub struct ListTasksTool;

/// Run a task through its type-specific handler.
pub struct ExecuteTaskTool;

/// Per-status counts and completion estimate.
pub struct TrackProgressTool;

#[async_trait]
impl Tool for CreateTaskTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ToolName::CreateTask,
            description: "Create a development task in the shared queue. The task is \
                persisted to the backend and announced to every assistant.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Short task title."
                    },
                    "description": {
                        "type": "string",
                        "description": "What needs to be done."
                    },
                    "type": {
                        "type": "string",
                        "enum": ["feature", "bug", "refactor", "test", "docs"],
                        "description": "Task kind (default: feature)."
                    },
                    "priority": {
                        "type": "string",
                        "enum": ["critical", "high", "medium", "low"],
                        "description": "Scheduling priority (default: medium)."
                    },
                    "assignee": {
                        "type": "string",
                        "description": "Assistant the task is intended for."
                    },
                    "dependencies": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Task ids that must complete first."
                    },
                    "metadata": {
                        "type": "object",
                        "description": "Free-form metadata stored with the task."
                    }
                },
                "required": ["title", "description"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "title")?;
        required_str(params, "description").map(|_| ())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let input: TaskInput = serde_json::from_value(params)?;
        let task = ctx.tasks()?.create_task(input).await?;
        Ok(serde_json::to_value(&task)?)
    }
}

#[async_trait]
impl Tool for UpdateTaskTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ToolName::UpdateTask,
            description: "Update fields of an existing task. Only the fields present in \
                the call change; the id never does. Use status 'blocked' to park a task \
                and 'pending' to reopen it.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "id": {
                        "type": "string",
                        "description": "Task id."
                    },
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "status": {
                        "type": "string",
                        "enum": ["pending", "in_progress", "completed", "blocked"]
                    },
                    "priority": {
                        "type": "string",
                        "enum": ["critical", "high", "medium", "low"]
                    },
                    "assignee": { "type": "string" },
                    "dependencies": {
                        "type": "array",
                        "items": { "type": "string" }
                    },
                    "metadata": { "type": "object" }
                },
                "required": ["id"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "id").map(|_| ())
    }

    async fn execute(&self, ctx: ToolContext, mut params: Value) -> Result<Value> {
        let id = required_str(&params, "id")?.to_string();
        if let Some(obj) = params.as_object_mut() {
            obj.remove("id");
        }
        let patch: TaskUpdate = serde_json::from_value(params)?;
        let task = ctx.tasks()?.update_task(&id, patch).await?;
        Ok(serde_json::to_value(&task)?)
    }
}

#[async_trait]
impl Tool for ListTasksTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ToolName::ListTasks,
            description: "List open tasks (pending and in_progress), re-synchronized from \
                the backend and ordered by priority.",
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    fn validate(&self, _params: &Value) -> Result<()> {
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, _params: Value) -> Result<Value> {
        let queue = ctx.tasks()?.task_queue().await?;
        Ok(json!({ "tasks": queue, "count": queue.len() }))
    }
}

#[async_trait]
impl Tool for ExecuteTaskTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ToolName::ExecuteTask,
            description: "Execute a task through its type-specific handler. Marks the task \
                in_progress, runs the handler, and stores the result in the task metadata \
                on success. Only one task executes at a time per assistant.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "id": {
                        "type": "string",
                        "description": "Task id to execute."
                    }
                },
                "required": ["id"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "id").map(|_| ())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let id = required_str(&params, "id")?;
        let task = ctx.tasks()?.execute_task(id).await?;
        Ok(serde_json::to_value(&task)?)
    }
}

#[async_trait]
impl Tool for TrackProgressTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ToolName::TrackProgress,
            description: "Report per-status task counts, the overall completion percentage \
                and a rough completion estimate.",
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    fn validate(&self, _params: &Value) -> Result<()> {
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, _params: Value) -> Result<Value> {
        let progress = ctx.tasks()?.track_progress().await;
        Ok(serde_json::to_value(&progress)?)
    }
}
