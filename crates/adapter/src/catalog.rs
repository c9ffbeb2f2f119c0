//! Static catalogs per assistant profile: which tools an adapter exposes,
//! plus its resources and prompts.

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use aibridge_core::{Error, Result};

use crate::registry::ToolRegistry;
use crate::tools::coordination::{CoordinateTool, RequestReviewTool, ShareInsightTool};
use crate::tools::memory::{GetContextTool, SearchMemoryTool, StoreMemoryTool};
use crate::tools::tasks::{
    CreateTaskTool, ExecuteTaskTool, ListTasksTool, TrackProgressTool, UpdateTaskTool,
};
use crate::ToolContext;

/// Capability profile of an assistant. `Project` adds the task-management
/// tool set on top of the shared memory/coordination tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantProfile {
    General,
    Project,
}

impl AssistantProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssistantProfile::General => "general",
            AssistantProfile::Project => "project",
        }
    }
}

impl std::fmt::Display for AssistantProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssistantProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "general" => Ok(AssistantProfile::General),
            "project" => Ok(AssistantProfile::Project),
            other => Err(Error::Validation(format!("unknown profile: {other}"))),
        }
    }
}

/// Build the tool registry for a profile.
pub fn registry_for(profile: AssistantProfile) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(StoreMemoryTool))?;
    registry.register(Arc::new(SearchMemoryTool))?;
    registry.register(Arc::new(GetContextTool))?;
    registry.register(Arc::new(ShareInsightTool))?;
    registry.register(Arc::new(CoordinateTool))?;
    registry.register(Arc::new(RequestReviewTool))?;

    if profile == AssistantProfile::Project {
        registry.register(Arc::new(CreateTaskTool))?;
        registry.register(Arc::new(UpdateTaskTool))?;
        registry.register(Arc::new(ListTasksTool))?;
        registry.register(Arc::new(ExecuteTaskTool))?;
        registry.register(Arc::new(TrackProgressTool))?;
    }

    Ok(registry)
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceDef {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "mimeType")]
    pub mime_type: &'static str,
}

const ASSISTANT_RESOURCE: ResourceDef = ResourceDef {
    uri: "bridge://assistant",
    name: "Assistant identity",
    description: "Identity and profile of this adapter.",
    mime_type: "application/json",
};

const QUEUE_RESOURCE: ResourceDef = ResourceDef {
    uri: "bridge://tasks/queue",
    name: "Task queue",
    description: "Open tasks, priority-ordered, re-synced from the backend.",
    mime_type: "application/json",
};

const PROGRESS_RESOURCE: ResourceDef = ResourceDef {
    uri: "bridge://progress",
    name: "Progress report",
    description: "Per-status task counts and completion estimate.",
    mime_type: "application/json",
};

pub fn resources(profile: AssistantProfile) -> Vec<ResourceDef> {
    match profile {
        AssistantProfile::General => vec![ASSISTANT_RESOURCE],
        AssistantProfile::Project => {
            vec![ASSISTANT_RESOURCE, QUEUE_RESOURCE, PROGRESS_RESOURCE]
        }
    }
}

/// Resolve a resource URI to its JSON text content.
pub async fn read_resource(
    profile: AssistantProfile,
    uri: &str,
    ctx: &ToolContext,
) -> Result<String> {
    match uri {
        "bridge://assistant" => Ok(serde_json::to_string_pretty(&json!({
            "assistant": ctx.assistant,
            "profile": profile.as_str(),
        }))?),
        "bridge://tasks/queue" => {
            let queue = ctx.tasks()?.task_queue().await?;
            Ok(serde_json::to_string_pretty(&queue)?)
        }
        "bridge://progress" => {
            let progress = ctx.tasks()?.track_progress().await;
            Ok(serde_json::to_string_pretty(&progress)?)
        }
        other => Err(Error::NotFound(format!("unknown resource: {other}"))),
    }
}

/// Prompt catalog in wire shape.
pub fn prompt_list() -> Vec<Value> {
    vec![
        json!({
            "name": "task_breakdown",
            "description": "Break a goal into prioritized bridge tasks.",
            "arguments": [
                { "name": "goal", "description": "The goal to decompose.", "required": true }
            ]
        }),
        json!({
            "name": "code_review",
            "description": "Review finished work from another assistant.",
            "arguments": [
                { "name": "summary", "description": "What was changed.", "required": true },
                { "name": "files", "description": "Touched files.", "required": false }
            ]
        }),
    ]
}

/// Render a prompt with the caller's arguments.
pub fn render_prompt(name: &str, args: &Value) -> Result<(String, String)> {
    let arg = |key: &str| -> Result<String> {
        args.get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::Validation(format!("prompt argument '{key}' is required")))
    };

    match name {
        "task_breakdown" => {
            let goal = arg("goal")?;
            Ok((
                "Break a goal into prioritized bridge tasks.".to_string(),
                format!(
                    "Break the following goal into concrete development tasks. For each \
                     task call create_task with a type (feature/bug/refactor/test/docs), \
                     a priority, and dependencies between the tasks where ordering \
                     matters.\n\nGoal: {goal}"
                ),
            ))
        }
        "code_review" => {
            let summary = arg("summary")?;
            let files = args
                .get("files")
                .and_then(|v| v.as_str())
                .unwrap_or("(not listed)");
            Ok((
                "Review finished work from another assistant.".to_string(),
                format!(
                    "Review the following change for correctness and for conflicts with \
                     work you have in flight. Share findings with share_insight.\n\n\
                     Summary: {summary}\nFiles: {files}"
                ),
            ))
        }
        other => Err(Error::NotFound(format!("unknown prompt: {other}"))),
    }
}
