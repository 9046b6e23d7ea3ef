//! Minimal streamable-http tool client.
//!
//! One call runs `initialize`, `notifications/initialized` and `tools/call`
//! against `<base>/mcp`. Any failure along the way collapses to `None` for
//! the caller; there are no retries inside a call.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::join_all;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};
use wayfarer_core::config::ToolsConfig;

pub const SESSION_HEADER: &str = "mcp-session-id";
const ACCEPT_STREAMABLE: &str = "application/json, text/event-stream";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolCallPhase {
    Init,
    Handshaking,
    Invoking,
    Succeeded,
    Failed,
}

impl ToolCallPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Handshaking => "handshaking",
            Self::Invoking => "invoking",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ToolCallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ToolCallError {
    #[error("{phase}: transport error: {source}")]
    Transport { phase: ToolCallPhase, source: reqwest::Error },
    #[error("{phase}: server returned {status}")]
    Status { phase: ToolCallPhase, status: u16 },
    #[error("{phase}: response carried no JSON-RPC result")]
    MissingResult { phase: ToolCallPhase },
    #[error("{phase}: timed out after {timeout:?}")]
    Timeout { phase: ToolCallPhase, timeout: Duration },
}

impl ToolCallError {
    pub fn phase(&self) -> ToolCallPhase {
        match self {
            Self::Transport { phase, .. }
            | Self::Status { phase, .. }
            | Self::MissingResult { phase }
            | Self::Timeout { phase, .. } => *phase,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    /// Server base URL, without the `/mcp` suffix.
    pub endpoint: String,
    pub tool_name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(endpoint: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self { endpoint: endpoint.into(), tool_name: tool_name.into(), arguments }
    }
}

pub struct ToolClient {
    http: Client,
    timeout: Duration,
    protocol_version: String,
    client_name: String,
    client_version: String,
    servers: BTreeMap<String, String>,
    next_id: AtomicU64,
}

impl ToolClient {
    pub fn from_config(config: &ToolsConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            timeout,
            protocol_version: config.protocol_version.clone(),
            client_name: config.client_name.clone(),
            client_version: config.client_version.clone(),
            servers: config.servers.clone(),
            next_id: AtomicU64::new(0),
        })
    }

    pub fn server_url(&self, server_key: &str) -> Option<&str> {
        self.servers.get(server_key).map(String::as_str)
    }

    pub fn server_keys(&self) -> impl Iterator<Item = &str> {
        self.servers.keys().map(String::as_str)
    }

    fn rpc_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Calls `tool_name` on `endpoint`; `None` on any failure.
    pub async fn call_tool(
        &self,
        endpoint: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Option<Value> {
        match self.try_call_tool(endpoint, tool_name, arguments).await {
            Ok(value) => {
                debug!(
                    event_name = "agent.tools.call_succeeded",
                    endpoint,
                    tool_name,
                    phase = %ToolCallPhase::Succeeded,
                    "tool call succeeded"
                );
                Some(value)
            }
            Err(error) => {
                warn!(
                    event_name = "agent.tools.call_failed",
                    endpoint,
                    tool_name,
                    failed_in = %error.phase(),
                    phase = %ToolCallPhase::Failed,
                    error = %error,
                    "tool call failed"
                );
                None
            }
        }
    }

    /// Resolves `server_key` through the configured registry first.
    pub async fn call_server_tool(
        &self,
        server_key: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Option<Value> {
        let Some(endpoint) = self.server_url(server_key) else {
            warn!(
                event_name = "agent.tools.unknown_server",
                server_key,
                tool_name,
                "no tool server registered under this key"
            );
            return None;
        };
        self.call_tool(endpoint, tool_name, arguments).await
    }

    /// Runs `calls` concurrently; results keep input order.
    pub async fn call_many(&self, calls: Vec<ToolCall>) -> Vec<Option<Value>> {
        if calls.is_empty() {
            return Vec::new();
        }
        let futures = calls.into_iter().map(|call| async move {
            self.call_tool(&call.endpoint, &call.tool_name, call.arguments).await
        });
        join_all(futures).await
    }

    pub async fn try_call_tool(
        &self,
        endpoint: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<Value, ToolCallError> {
        let mut phase = ToolCallPhase::Init;
        let call = self.run_call(&mut phase, endpoint, tool_name, arguments);
        let outcome = tokio::time::timeout(self.timeout, call).await;
        match outcome {
            Ok(result) => result,
            Err(_) => Err(ToolCallError::Timeout { phase, timeout: self.timeout }),
        }
    }

    async fn run_call(
        &self,
        phase: &mut ToolCallPhase,
        endpoint: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<Value, ToolCallError> {
        let url = format!("{}/mcp", endpoint.trim_end_matches('/'));
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_STREAMABLE));

        *phase = ToolCallPhase::Handshaking;
        let init = json!({
            "jsonrpc": "2.0",
            "id": self.rpc_id(),
            "method": "initialize",
            "params": {
                "protocolVersion": self.protocol_version,
                "capabilities": {},
                "clientInfo": {"name": self.client_name, "version": self.client_version},
            },
        });
        let response = self
            .http
            .post(&url)
            .headers(headers.clone())
            .json(&init)
            .send()
            .await
            .map_err(|source| ToolCallError::Transport { phase: *phase, source })?;
        if !response.status().is_success() {
            return Err(ToolCallError::Status { phase: *phase, status: response.status().as_u16() });
        }
        if let Some(session) = response.headers().get(SESSION_HEADER) {
            headers.insert(SESSION_HEADER, session.clone());
        }
        let body = response
            .text()
            .await
            .map_err(|source| ToolCallError::Transport { phase: *phase, source })?;
        if parse_sse_result(&body).is_none() {
            return Err(ToolCallError::MissingResult { phase: *phase });
        }

        // The notification has no id and its response is not inspected.
        let initialized = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        self.http
            .post(&url)
            .headers(headers.clone())
            .json(&initialized)
            .send()
            .await
            .map_err(|source| ToolCallError::Transport { phase: *phase, source })?;

        *phase = ToolCallPhase::Invoking;
        let invoke = json!({
            "jsonrpc": "2.0",
            "id": self.rpc_id(),
            "method": "tools/call",
            "params": {"name": tool_name, "arguments": normalize_arguments(arguments)},
        });
        let response = self
            .http
            .post(&url)
            .headers(headers)
            .json(&invoke)
            .send()
            .await
            .map_err(|source| ToolCallError::Transport { phase: *phase, source })?;
        if !response.status().is_success() {
            return Err(ToolCallError::Status { phase: *phase, status: response.status().as_u16() });
        }
        let body = response
            .text()
            .await
            .map_err(|source| ToolCallError::Transport { phase: *phase, source })?;

        let result =
            parse_sse_result(&body).ok_or(ToolCallError::MissingResult { phase: *phase })?;
        *phase = ToolCallPhase::Succeeded;
        Ok(unwrap_tool_payload(result))
    }
}

fn normalize_arguments(arguments: Value) -> Value {
    match arguments {
        Value::Null => json!({}),
        other => other,
    }
}

/// Last JSON-RPC `result` in a response body.
///
/// Bodies framed as server-sent events are scanned from the end for `data:`
/// lines; a plain JSON body is accepted as-is.
pub fn parse_sse_result(body: &str) -> Option<Value> {
    let trimmed = body.trim();
    if trimmed.starts_with('{') {
        if let Ok(mut message) = serde_json::from_str::<Value>(trimmed) {
            if let Some(result) = message.get_mut("result") {
                return Some(result.take());
            }
        }
    }

    for line in trimmed.lines().rev() {
        let Some(payload) = line.trim().strip_prefix("data:") else {
            continue;
        };
        let payload = payload.trim();
        if payload.is_empty() || payload == "[DONE]" {
            continue;
        }
        if let Ok(mut message) = serde_json::from_str::<Value>(payload) {
            if let Some(result) = message.get_mut("result") {
                return Some(result.take());
            }
        }
    }
    None
}

/// First text item of a `tools/call` result, decoded as JSON when possible.
///
/// Results without text content are returned unchanged.
pub fn unwrap_tool_payload(result: Value) -> Value {
    let text = result
        .get("content")
        .and_then(Value::as_array)
        .and_then(|items| {
            items.iter().find(|item| item.get("type").and_then(Value::as_str) == Some("text"))
        })
        .and_then(|item| item.get("text"))
        .and_then(Value::as_str);

    match text {
        Some(text) => serde_json::from_str(text).unwrap_or_else(|_| json!({ "raw": text })),
        None => result,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_sse_result, unwrap_tool_payload, ToolCallError, ToolCallPhase, ToolClient};
    use wayfarer_core::config::AppConfig;

    #[test]
    fn sse_body_yields_last_result() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"a\":1}}\n\n\
                    data: {\"jsonrpc\":\"2.0\",\"method\":\"log\"}\n\
                    data: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"b\":2}}\n\ndata: [DONE]\n";
        assert_eq!(parse_sse_result(body), Some(json!({"b": 2})));
    }

    #[test]
    fn plain_json_body_is_accepted() {
        let body = "{\"jsonrpc\":\"2.0\",\"id\":3,\"result\":{\"ok\":true}}";
        assert_eq!(parse_sse_result(body), Some(json!({"ok": true})));
    }

    #[test]
    fn body_without_result_is_none() {
        assert_eq!(parse_sse_result("data: {\"error\":{\"code\":-32601}}\n"), None);
        assert_eq!(parse_sse_result("not json"), None);
    }

    #[test]
    fn text_content_is_decoded_or_wrapped() {
        let json_text = json!({"content": [{"type": "text", "text": "{\"fare\": 420}"}]});
        assert_eq!(unwrap_tool_payload(json_text), json!({"fare": 420}));

        let plain = json!({"content": [{"type": "image"}, {"type": "text", "text": "sold out"}]});
        assert_eq!(unwrap_tool_payload(plain), json!({"raw": "sold out"}));

        let structured = json!({"structuredContent": {"x": 1}});
        assert_eq!(unwrap_tool_payload(structured.clone()), structured);
    }

    #[test]
    fn error_reports_the_phase_it_failed_in() {
        let error = ToolCallError::Status { phase: ToolCallPhase::Invoking, status: 502 };
        assert_eq!(error.phase(), ToolCallPhase::Invoking);
        assert_eq!(error.to_string(), "invoking: server returned 502");
    }

    #[tokio::test]
    async fn unknown_server_key_is_absorbed() {
        let client = match ToolClient::from_config(&AppConfig::default().tools) {
            Ok(client) => client,
            Err(error) => panic!("client build failed: {error}"),
        };
        assert!(client.server_url("japan").is_some());
        assert!(client.call_server_tool("mars", "search", json!({})).await.is_none());
        assert!(client.call_many(Vec::new()).await.is_empty());
    }
}
