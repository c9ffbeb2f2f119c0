use async_trait::async_trait;
use serde_json::{json, Value};

use aibridge_backend::SearchRequest;
use aibridge_core::{MemoryMetadata, MemoryRecord, Result};

use super::required_str;
use crate::{Tool, ToolContext, ToolName, ToolSchema};

/// Persist a memory record to the shared backend.
pub struct StoreMemoryTool;

/// Full-text search over shared memory.
pub struct SearchMemoryTool;

/// Fetch aggregated context for a topic.
pub struct GetContextTool;

#[async_trait]
impl Tool for StoreMemoryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ToolName::StoreMemory,
            description: "Store a memory record in the shared backend so it survives this \
                session and is searchable by every assistant. Use for decisions, findings, \
                and project facts worth keeping.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "content": {
                        "type": "string",
                        "description": "The content to remember."
                    },
                    "metadata": {
                        "type": "object",
                        "description": "Structured metadata: kind, language, path, project, tags (array), shared (bool)."
                    },
                    "ttl_secs": {
                        "type": "integer",
                        "description": "Optional time-to-live in seconds."
                    }
                },
                "required": ["content"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "content").map(|_| ())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let metadata: MemoryMetadata = params
            .get("metadata")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        let record = MemoryRecord {
            content: required_str(&params, "content")?.to_string(),
            metadata,
            ttl_secs: params.get("ttl_secs").and_then(|v| v.as_u64()),
        };
        ctx.backend()?.store_memory(&record).await
    }
}

#[async_trait]
impl Tool for SearchMemoryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ToolName::SearchMemory,
            description: "Search shared memory with a full-text query and optional metadata \
                filter. Returns the most relevant records from every assistant.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Full-text search query."
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of results (default: 10)."
                    },
                    "metadata_filter": {
                        "type": "object",
                        "description": "Exact-match filter on metadata fields, e.g. {\"kind\": \"task\"}."
                    }
                },
                "required": ["query"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "query").map(|_| ())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let request = SearchRequest {
            query: required_str(&params, "query")?.to_string(),
            limit: params.get("limit").and_then(|v| v.as_u64()).unwrap_or(10) as usize,
            metadata_filter: params.get("metadata_filter").cloned(),
        };
        let results = ctx.backend()?.search_memory(&request).await?;
        Ok(json!({ "results": results }))
    }
}

#[async_trait]
impl Tool for GetContextTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ToolName::GetContext,
            description: "Fetch aggregated backend context for a topic before starting work \
                on it: related memories, open tasks, and recent insights.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "topic": {
                        "type": "string",
                        "description": "Topic to gather context for."
                    },
                    "depth": {
                        "type": "integer",
                        "description": "How many hops of related records to include (default: 1)."
                    },
                    "include_types": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Restrict to these record kinds."
                    }
                },
                "required": ["topic"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "topic").map(|_| ())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let topic = required_str(&params, "topic")?;
        let depth = params.get("depth").and_then(|v| v.as_u64()).unwrap_or(1) as u32;
        let include_types: Vec<String> = params
            .get("include_types")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        ctx.backend()?.get_context(topic, depth, &include_types).await
    }
}
