use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use aibridge_bus::channels;
use aibridge_core::{CoordinationMessage, InsightMessage, MemoryMetadata, MemoryRecord, Result};

use super::required_str;
use crate::{Tool, ToolContext, ToolName, ToolSchema};

/// Broadcast a finding on the insights channel, optionally mirroring it
/// to the backend so it outlives the broadcast.
pub struct ShareInsightTool;

/// Send a coordination request to another assistant (or everyone).
pub struct CoordinateTool;

/// Ask other assistants for a review of finished work.
pub struct RequestReviewTool;

#[async_trait]
impl Tool for ShareInsightTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ToolName::ShareInsight,
            description: "Share an insight with the other assistants. Broadcast is \
                fire-and-forget; set 'shared' to also persist it to the backend so it can \
                be found later.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "topic": {
                        "type": "string",
                        "description": "Short topic, e.g. 'auth flow'."
                    },
                    "content": {
                        "type": "string",
                        "description": "The insight itself."
                    },
                    "tags": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Tags used when the insight is mirrored to memory."
                    },
                    "shared": {
                        "type": "boolean",
                        "description": "Also persist to the backend (default: false)."
                    }
                },
                "required": ["topic", "content"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "topic")?;
        required_str(params, "content").map(|_| ())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let shared = params.get("shared").and_then(|v| v.as_bool()).unwrap_or(false);
        let insight = InsightMessage {
            from: ctx.assistant.clone(),
            topic: required_str(&params, "topic")?.to_string(),
            content: required_str(&params, "content")?.to_string(),
            shared,
            timestamp: Utc::now(),
        };

        ctx.coordinator()?
            .publish(channels::INSIGHTS, serde_json::to_value(&insight)?)
            .await;

        let mut mirrored = false;
        if shared {
            let tags = params
                .get("tags")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            let record = MemoryRecord {
                content: format!("[{}] {}", insight.topic, insight.content),
                metadata: MemoryMetadata {
                    kind: Some("insight".to_string()),
                    tags,
                    shared: true,
                    ..Default::default()
                },
                ttl_secs: None,
            };
            ctx.backend()?.store_memory(&record).await?;
            mirrored = true;
        }

        Ok(json!({ "published": true, "mirrored": mirrored }))
    }
}

#[async_trait]
impl Tool for CoordinateTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ToolName::Coordinate,
            description: "Send a coordination request to another assistant, e.g. a handoff, \
                a question, or a conflict warning. Use to '*' to address everyone.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "to": {
                        "type": "string",
                        "description": "Target assistant name, or '*' for broadcast (default: '*')."
                    },
                    "type": {
                        "type": "string",
                        "description": "Request kind, e.g. 'handoff', 'question', 'conflict'."
                    },
                    "content": {
                        "description": "Request payload, any JSON shape."
                    }
                },
                "required": ["type", "content"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "type")?;
        if params.get("content").is_none() {
            return Err(aibridge_core::Error::Validation(
                "'content' is required".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let message = CoordinationMessage {
            from: ctx.assistant.clone(),
            to: params
                .get("to")
                .and_then(|v| v.as_str())
                .unwrap_or("*")
                .to_string(),
            kind: required_str(&params, "type")?.to_string(),
            content: params.get("content").cloned().unwrap_or(Value::Null),
            timestamp: Utc::now(),
        };
        ctx.coordinator()?
            .publish(channels::COORDINATION, serde_json::to_value(&message)?)
            .await;
        Ok(json!({ "published": true, "to": message.to }))
    }
}

#[async_trait]
impl Tool for RequestReviewTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: ToolName::RequestReview,
            description: "Request a review of finished work from the other assistants. \
                Broadcast on the reviews channel; include enough context to review from.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "summary": {
                        "type": "string",
                        "description": "What was done and what to look at."
                    },
                    "task_id": {
                        "type": "string",
                        "description": "Related task id, if any."
                    },
                    "files": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Touched files."
                    }
                },
                "required": ["summary"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "summary").map(|_| ())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let payload = json!({
            "from": ctx.assistant,
            "summary": required_str(&params, "summary")?,
            "task_id": params.get("task_id").cloned().unwrap_or(Value::Null),
            "files": params.get("files").cloned().unwrap_or_else(|| json!([])),
            "timestamp": Utc::now(),
        });
        ctx.coordinator()?.publish(channels::REVIEWS, payload).await;
        Ok(json!({ "published": true }))
    }
}
