use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use aibridge_core::Result;

use crate::catalog::{self, AssistantProfile};
use crate::protocol::{
    error_result, text_result, JsonRpcRequest, JsonRpcResponse, Method, INVALID_PARAMS,
    METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::registry::ToolRegistry;
use crate::ToolContext;

/// Serves the tool-invocation protocol on a duplex line transport
/// (stdio in production). One request is handled at a time, in arrival
/// order; there is no concurrent dispatch within an adapter.
pub struct AdapterServer {
    profile: AssistantProfile,
    registry: ToolRegistry,
    ctx: ToolContext,
}

impl AdapterServer {
    pub fn new(profile: AssistantProfile, ctx: ToolContext) -> Result<Self> {
        Ok(Self {
            profile,
            registry: catalog::registry_for(profile)?,
            ctx,
        })
    }

    /// Read newline-delimited requests until EOF or shutdown.
    pub async fn run<R, W>(
        &self,
        reader: R,
        mut writer: W,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(profile = %self.profile, "Adapter server ready");
        let mut lines = BufReader::new(reader).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(response) = self.handle_line(&line).await {
                            writer.write_all(response.as_bytes()).await?;
                            writer.write_all(b"\n").await?;
                            writer.flush().await?;
                        }
                    }
                    Ok(None) => {
                        info!("Input stream closed, stopping adapter server");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "Input stream read error");
                        break;
                    }
                },
                _ = shutdown.recv() => {
                    info!("Adapter server shutting down");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Handle one frame. Returns the serialized response, or `None` for
    /// blank lines and notifications.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let request = match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => request,
            Err(e) => {
                // Malformed frame: answer, don't crash.
                return respond(JsonRpcResponse::failure(
                    Value::Null,
                    PARSE_ERROR,
                    format!("malformed frame: {e}"),
                ));
            }
        };

        let Some(id) = request.id else {
            debug!(method = %request.method, "Ignoring notification");
            return None;
        };

        let method = match request.method.parse::<Method>() {
            Ok(method) => method,
            Err(e) => {
                return respond(JsonRpcResponse::failure(id, METHOD_NOT_FOUND, e.to_string()))
            }
        };
        let params = request.params.unwrap_or(Value::Null);

        respond(self.dispatch(method, id, params).await)
    }

    async fn dispatch(&self, method: Method, id: Value, params: Value) -> JsonRpcResponse {
        match method {
            Method::Initialize => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": "2024-11-05",
                    "serverInfo": {
                        "name": "aibridge",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                    "capabilities": {
                        "tools": {},
                        "resources": {},
                        "prompts": {},
                    }
                }),
            ),

            Method::ToolsList => {
                JsonRpcResponse::success(id, json!({ "tools": self.registry.schemas() }))
            }

            Method::ToolsCall => {
                let Some(name) = params.get("name").and_then(|v| v.as_str()) else {
                    return JsonRpcResponse::failure(id, INVALID_PARAMS, "'name' is required");
                };
                let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
                // Handler failures become error content blocks, never
                // transport failures.
                match self.registry.execute(name, self.ctx.clone(), arguments).await {
                    Ok(value) => JsonRpcResponse::success(id, text_result(&value)),
                    Err(e) => JsonRpcResponse::success(id, error_result(&e.to_string())),
                }
            }

            Method::ResourcesList => JsonRpcResponse::success(
                id,
                json!({ "resources": catalog::resources(self.profile) }),
            ),

            Method::ResourcesRead => {
                let Some(uri) = params.get("uri").and_then(|v| v.as_str()) else {
                    return JsonRpcResponse::failure(id, INVALID_PARAMS, "'uri' is required");
                };
                match catalog::read_resource(self.profile, uri, &self.ctx).await {
                    Ok(text) => JsonRpcResponse::success(
                        id,
                        json!({
                            "contents": [{
                                "uri": uri,
                                "mimeType": "application/json",
                                "text": text,
                            }]
                        }),
                    ),
                    Err(e) => JsonRpcResponse::failure(id, INVALID_PARAMS, e.to_string()),
                }
            }

            Method::PromptsList => {
                JsonRpcResponse::success(id, json!({ "prompts": catalog::prompt_list() }))
            }

            Method::PromptsGet => {
                let Some(name) = params.get("name").and_then(|v| v.as_str()) else {
                    return JsonRpcResponse::failure(id, INVALID_PARAMS, "'name' is required");
                };
                let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
                match catalog::render_prompt(name, &args) {
                    Ok((description, text)) => JsonRpcResponse::success(
                        id,
                        json!({
                            "description": description,
                            "messages": [{
                                "role": "user",
                                "content": { "type": "text", "text": text }
                            }]
                        }),
                    ),
                    Err(e) => JsonRpcResponse::failure(id, INVALID_PARAMS, e.to_string()),
                }
            }
        }
    }
}

fn respond(response: JsonRpcResponse) -> Option<String> {
    match serde_json::to_string(&response) {
        Ok(line) => Some(line),
        Err(e) => {
            error!(error = %e, "Failed to serialize response");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(profile: AssistantProfile) -> AdapterServer {
        let ctx = ToolContext {
            assistant: "claude".to_string(),
            ..Default::default()
        };
        AdapterServer::new(profile, ctx).unwrap()
    }

    async fn call(server: &AdapterServer, line: &str) -> Value {
        let response = server.handle_line(line).await.unwrap();
        serde_json::from_str(&response).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_frame_answers_parse_error() {
        let srv = server(AssistantProfile::General);
        let resp = call(&srv, "{not json").await;
        assert_eq!(resp["error"]["code"], PARSE_ERROR);
        assert_eq!(resp["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_blank_lines_and_notifications_ignored() {
        let srv = server(AssistantProfile::General);
        assert!(srv.handle_line("").await.is_none());
        assert!(srv.handle_line("   ").await.is_none());
        let notification = r#"{"jsonrpc":"2.0","method":"tools/list"}"#;
        assert!(srv.handle_line(notification).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let srv = server(AssistantProfile::General);
        let resp = call(&srv, r#"{"jsonrpc":"2.0","id":1,"method":"tools/delete"}"#).await;
        assert_eq!(resp["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_initialize_reports_capabilities() {
        let srv = server(AssistantProfile::General);
        let resp = call(&srv, r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#).await;
        assert_eq!(resp["result"]["serverInfo"]["name"], "aibridge");
        assert!(resp["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_tools_list_respects_profile() {
        let general = server(AssistantProfile::General);
        let resp = call(&general, r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).await;
        let tools = resp["result"]["tools"].as_array().unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert!(names.contains(&"store_memory"));
        assert!(!names.contains(&"create_task"));

        let project = server(AssistantProfile::Project);
        let resp = call(&project, r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).await;
        let tools = resp["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 11);
        assert!(tools.iter().all(|t| t["inputSchema"].is_object()));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_block() {
        let srv = server(AssistantProfile::General);
        let line = r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"rm_rf","arguments":{}}}"#;
        let resp = call(&srv, line).await;
        // A successful JSON-RPC response whose content is flagged as error.
        assert!(resp["error"].is_null());
        assert_eq!(resp["result"]["isError"], true);
        let text = resp["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("unknown tool"));
    }

    #[tokio::test]
    async fn test_validation_failure_is_error_block() {
        let srv = server(AssistantProfile::Project);
        let line = r#"{"jsonrpc":"2.0","id":8,"method":"tools/call","params":{"name":"create_task","arguments":{"title":"no description"}}}"#;
        let resp = call(&srv, line).await;
        assert_eq!(resp["result"]["isError"], true);
        let text = resp["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("description"));
    }

    #[tokio::test]
    async fn test_handler_failure_is_error_block_not_transport_failure() {
        // No coordinator wired: the handler fails, the transport must not.
        let srv = server(AssistantProfile::General);
        let line = r#"{"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"name":"share_insight","arguments":{"topic":"t","content":"c"}}}"#;
        let resp = call(&srv, line).await;
        assert!(resp["error"].is_null());
        assert_eq!(resp["result"]["isError"], true);
    }

    #[tokio::test]
    async fn test_tools_call_missing_name_is_invalid_params() {
        let srv = server(AssistantProfile::General);
        let line = r#"{"jsonrpc":"2.0","id":10,"method":"tools/call","params":{"arguments":{}}}"#;
        let resp = call(&srv, line).await;
        assert_eq!(resp["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_resources_roundtrip() {
        let srv = server(AssistantProfile::Project);
        let resp = call(&srv, r#"{"jsonrpc":"2.0","id":1,"method":"resources/list"}"#).await;
        let uris: Vec<&str> = resp["result"]["resources"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["uri"].as_str().unwrap())
            .collect();
        assert!(uris.contains(&"bridge://tasks/queue"));

        let line = r#"{"jsonrpc":"2.0","id":2,"method":"resources/read","params":{"uri":"bridge://assistant"}}"#;
        let resp = call(&srv, line).await;
        let text = resp["result"]["contents"][0]["text"].as_str().unwrap();
        assert!(text.contains("claude"));
    }

    #[tokio::test]
    async fn test_prompts_roundtrip() {
        let srv = server(AssistantProfile::General);
        let resp = call(&srv, r#"{"jsonrpc":"2.0","id":1,"method":"prompts/list"}"#).await;
        assert_eq!(resp["result"]["prompts"].as_array().unwrap().len(), 2);

        let line = r#"{"jsonrpc":"2.0","id":2,"method":"prompts/get","params":{"name":"task_breakdown","arguments":{"goal":"ship"}}}"#;
        let resp = call(&srv, line).await;
        let text = resp["result"]["messages"][0]["content"]["text"]
            .as_str()
            .unwrap();
        assert!(text.contains("ship"));
    }

    #[tokio::test]
    async fn test_run_loop_answers_and_stops_at_eof() {
        let srv = server(AssistantProfile::General);
        let (shutdown_tx, _) = broadcast::channel(1);
        let shutdown_rx = shutdown_tx.subscribe();

        let input: &[u8] =
            b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\nnot json\n";
        let mut output = Vec::new();
        srv.run(input, &mut output, shutdown_rx).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        let mut lines = text.lines();
        let first: Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert!(first["result"]["tools"].is_array());
        // The malformed second frame got an answer instead of a crash.
        let second: Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(second["error"]["code"], PARSE_ERROR);
    }
}
