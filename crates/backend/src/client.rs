use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use aibridge_core::{Error, MemoryRecord, Result};

/// A cached bearer token. Owned exclusively by one [`BackendClient`];
/// never shared across processes.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

#[derive(Debug, Deserialize)]
struct InitializeResponse {
    access_token: String,
    expires_in: i64,
}

/// Parameters for `memory/search`.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_filter: Option<Value>,
}

pub struct BackendClient {
    client: Client,
    base_url: String,
    api_key: String,
    assistant_id: String,
    session: Mutex<Option<AuthSession>>,
}

impl BackendClient {
    pub fn new(base_url: &str, api_key: &str, assistant_id: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            assistant_id: assistant_id.to_string(),
            session: Mutex::new(None),
        }
    }

    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    /// Ensure a valid session exists and return its bearer token.
    ///
    /// The whole check-then-refresh runs under the session mutex, so two
    /// racing calls before expiry cost exactly one network round-trip.
    /// Concurrent calls issued right after expiry are serialized too and
    /// the second finds the first one's fresh token.
    pub async fn authenticate(&self) -> Result<String> {
        let mut session = self.session.lock().await;
        if let Some(cached) = session.as_ref() {
            if cached.is_valid() {
                return Ok(cached.access_token.clone());
            }
        }

        debug!(assistant = %self.assistant_id, "Requesting backend session");
        let payload = json!({
            "assistant_id": self.assistant_id,
            "metadata": {
                "client": "aibridge",
                "version": env!("CARGO_PKG_VERSION"),
            }
        });
        let resp = self
            .client
            .post(format!("{}/initialize", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(Error::backend_unreachable)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let init: InitializeResponse = resp
            .json()
            .await
            .map_err(|e| Error::Backend {
                status: status.as_u16(),
                body: format!("malformed initialize response: {e}"),
            })?;

        let fresh = AuthSession {
            access_token: init.access_token,
            expires_at: Utc::now() + Duration::seconds(init.expires_in),
        };
        debug!(assistant = %self.assistant_id, expires_at = %fresh.expires_at, "Backend session established");
        let token = fresh.access_token.clone();
        *session = Some(fresh);
        Ok(token)
    }

    /// POST a JSON payload to a backend operation, authenticating first and
    /// mapping any non-success response to a typed backend error.
    async fn call(&self, op: &str, payload: Value) -> Result<Value> {
        let token = self.authenticate().await?;
        let resp = self
            .client
            .post(format!("{}/{}", self.base_url, op))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(Error::backend_unreachable)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(op, status = status.as_u16(), "Backend call failed");
            return Err(Error::Backend {
                status: status.as_u16(),
                body,
            });
        }

        resp.json().await.map_err(|e| Error::Backend {
            status: status.as_u16(),
            body: format!("malformed response body: {e}"),
        })
    }

    /// Persist a memory record. The backend is authoritative afterwards.
    pub async fn store_memory(&self, record: &MemoryRecord) -> Result<Value> {
        let payload = serde_json::to_value(record)?;
        self.call("memory/store", payload).await
    }

    /// Full-text search over stored memory, optionally filtered by
    /// metadata fields.
    pub async fn search_memory(&self, request: &SearchRequest) -> Result<Vec<Value>> {
        let payload = serde_json::to_value(request)?;
        let result = self.call("memory/search", payload).await?;
        let results = result
            .get("results")
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(results)
    }

    /// Fetch aggregated context for a topic.
    pub async fn get_context(
        &self,
        topic: &str,
        depth: u32,
        include_types: &[String],
    ) -> Result<Value> {
        let payload = json!({
            "topic": topic,
            "depth": depth,
            "include_types": include_types,
        });
        self.call("context", payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct MockState {
        init_calls: Arc<AtomicUsize>,
        store_calls: Arc<AtomicUsize>,
        /// Token lifetime handed out by /initialize.
        expires_in: i64,
    }

    async fn mock_initialize(State(state): State<MockState>) -> Json<Value> {
        let n = state.init_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Json(json!({
            "access_token": format!("token-{n}"),
            "expires_in": state.expires_in,
        }))
    }

    async fn mock_store(
        State(state): State<MockState>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        state.store_calls.fetch_add(1, Ordering::SeqCst);
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Json(json!({ "id": "mem-1", "auth": auth, "echo": body }))
    }

    async fn mock_search(Json(_body): Json<Value>) -> Json<Value> {
        Json(json!({ "results": [{"content": "hit"}] }))
    }

    async fn spawn_mock(state: MockState) -> String {
        let app = Router::new()
            .route("/initialize", post(mock_initialize))
            .route("/memory/store", post(mock_store))
            .route("/memory/search", post(mock_search))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_authenticate_caches_token() {
        let state = MockState {
            expires_in: 3600,
            ..Default::default()
        };
        let counter = state.init_calls.clone();
        let base = spawn_mock(state).await;

        let client = BackendClient::new(&base, "key", "claude");
        let first = client.authenticate().await.unwrap();
        let second = client.authenticate().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_authenticate_refreshes_expired_token() {
        let state = MockState {
            expires_in: 0, // expires immediately
            ..Default::default()
        };
        let counter = state.init_calls.clone();
        let base = spawn_mock(state).await;

        let client = BackendClient::new(&base, "key", "claude");
        let first = client.authenticate().await.unwrap();
        let second = client.authenticate().await.unwrap();

        assert_ne!(first, second);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_store_memory_sends_bearer_token() {
        let state = MockState {
            expires_in: 3600,
            ..Default::default()
        };
        let base = spawn_mock(state).await;

        let client = BackendClient::new(&base, "key", "claude");
        let record = MemoryRecord {
            content: "learned a thing".to_string(),
            metadata: Default::default(),
            ttl_secs: None,
        };
        let result = client.store_memory(&record).await.unwrap();
        assert_eq!(result["auth"], "Bearer token-1");
        assert_eq!(result["echo"]["content"], "learned a thing");
    }

    #[tokio::test]
    async fn test_search_memory_unwraps_results() {
        let state = MockState {
            expires_in: 3600,
            ..Default::default()
        };
        let base = spawn_mock(state).await;

        let client = BackendClient::new(&base, "key", "claude");
        let results = client
            .search_memory(&SearchRequest {
                query: "thing".to_string(),
                limit: 5,
                metadata_filter: None,
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["content"], "hit");
    }

    #[tokio::test]
    async fn test_non_success_maps_to_backend_error() {
        // No route for /context exists, so axum answers 404. That must
        // surface as a typed backend error, not a transport panic.
        let state = MockState {
            expires_in: 3600,
            ..Default::default()
        };
        let base = spawn_mock(state).await;

        let client = BackendClient::new(&base, "key", "claude");
        let err = client.get_context("caching", 1, &[]).await.unwrap_err();
        match err {
            Error::Backend { status, .. } => assert_ne!(status, 0),
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend_maps_to_status_zero() {
        let client = BackendClient::new("http://127.0.0.1:1", "key", "claude");
        let err = client.authenticate().await.unwrap_err();
        match err {
            Error::Backend { status, .. } => assert_eq!(status, 0),
            other => panic!("expected backend error, got {other:?}"),
        }
    }
}
