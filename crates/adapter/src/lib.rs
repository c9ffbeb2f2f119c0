//! Protocol adapter: the tool-invocation protocol served over stdio.
//!
//! One adapter process speaks for one external AI assistant. The adapter
//! itself is stateless across calls; persistent state lives in the task
//! manager and the backend, and this crate only frames requests, dispatches
//! them through a typed tool registry, and wraps results or errors as
//! content blocks.

pub mod catalog;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod tools;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use aibridge_backend::BackendClient;
use aibridge_bus::Coordinator;
use aibridge_core::{Error, Result};
use aibridge_tasks::TaskManager;

pub use catalog::AssistantProfile;
pub use registry::{ToolName, ToolRegistry};
pub use server::AdapterServer;

/// Shared handles a tool may need. All of them optional: the catalog only
/// registers tools whose backing services are wired, and a missing handle
/// still fails soft as a handler error rather than a crash.
#[derive(Clone, Default)]
pub struct ToolContext {
    pub assistant: String,
    pub backend: Option<Arc<BackendClient>>,
    pub coordinator: Option<Arc<Coordinator>>,
    pub tasks: Option<Arc<TaskManager>>,
}

impl ToolContext {
    pub fn backend(&self) -> Result<&Arc<BackendClient>> {
        self.backend
            .as_ref()
            .ok_or_else(|| Error::Handler("backend client not available".to_string()))
    }

    pub fn coordinator(&self) -> Result<&Arc<Coordinator>> {
        self.coordinator
            .as_ref()
            .ok_or_else(|| Error::Handler("coordinator not available".to_string()))
    }

    pub fn tasks(&self) -> Result<&Arc<TaskManager>> {
        self.tasks
            .as_ref()
            .ok_or_else(|| Error::Handler("task manager not available".to_string()))
    }
}

pub struct ToolSchema {
    pub name: ToolName,
    pub description: &'static str,
    pub parameters: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;
    fn validate(&self, params: &Value) -> Result<()>;
    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value>;
}
