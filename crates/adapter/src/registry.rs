//! Typed tool registry.
//!
//! Tool names are an enum, not free strings: unknown identifiers are
//! rejected when a call-string fails to parse, and duplicate registration
//! is rejected up front rather than silently replacing a handler.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use aibridge_core::{Error, Result};

use crate::{Tool, ToolContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    StoreMemory,
    SearchMemory,
    GetContext,
    ShareInsight,
    Coordinate,
    RequestReview,
    CreateTask,
    UpdateTask,
    ListTasks,
    ExecuteTask,
    TrackProgress,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::StoreMemory => "store_memory",
            ToolName::SearchMemory => "search_memory",
            ToolName::GetContext => "get_context",
            ToolName::ShareInsight => "share_insight",
            ToolName::Coordinate => "coordinate",
            ToolName::RequestReview => "request_review",
            ToolName::CreateTask => "create_task",
            ToolName::UpdateTask => "update_task",
            ToolName::ListTasks => "list_tasks",
            ToolName::ExecuteTask => "execute_task",
            ToolName::TrackProgress => "track_progress",
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "store_memory" => Ok(ToolName::StoreMemory),
            "search_memory" => Ok(ToolName::SearchMemory),
            "get_context" => Ok(ToolName::GetContext),
            "share_insight" => Ok(ToolName::ShareInsight),
            "coordinate" => Ok(ToolName::Coordinate),
            "request_review" => Ok(ToolName::RequestReview),
            "create_task" => Ok(ToolName::CreateTask),
            "update_task" => Ok(ToolName::UpdateTask),
            "list_tasks" => Ok(ToolName::ListTasks),
            "execute_task" => Ok(ToolName::ExecuteTask),
            "track_progress" => Ok(ToolName::TrackProgress),
            other => Err(Error::Handler(format!("unknown tool: {other}"))),
        }
    }
}

pub struct ToolRegistry {
    /// Registration order is the catalog order.
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.schema().name;
        if self.tools.iter().any(|t| t.schema().name == name) {
            return Err(Error::Config(format!("tool {name} registered twice")));
        }
        debug!(tool = %name, "Registering tool");
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: ToolName) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.schema().name == name)
    }

    pub fn tool_names(&self) -> Vec<ToolName> {
        self.tools.iter().map(|t| t.schema().name).collect()
    }

    /// Tool catalog in wire format: name, description, input schema.
    pub fn schemas(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|tool| {
                let schema = tool.schema();
                json!({
                    "name": schema.name.as_str(),
                    "description": schema.description,
                    "inputSchema": schema.parameters,
                })
            })
            .collect()
    }

    /// Resolve a call-string, validate the arguments and run the handler.
    pub async fn execute(&self, name: &str, ctx: ToolContext, params: Value) -> Result<Value> {
        let parsed: ToolName = name.parse()?;
        let tool = self
            .get(parsed)
            .ok_or_else(|| Error::Handler(format!("tool {parsed} not in this catalog")))?;

        if let Err(e) = tool.validate(&params) {
            warn!(tool = %parsed, error = %e, "Tool validation failed");
            return Err(e);
        }

        debug!(tool = %parsed, "Executing tool");
        tool.execute(ctx, params).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
