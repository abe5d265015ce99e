//! MCP streamable HTTP client
//!
//! [`McpHttpClient`] talks to one endpoint. Every request is an independent
//! POST; the server may answer with a JSON body or with an event stream, and
//! both are decoded the same way.
//!
//! # Timeouts
//!
//! Each JSON-RPC exchange (request, response headers and body) is bounded by
//! the request timeout, 30 seconds unless changed with
//! [`McpHttpClient::with_request_timeout`]. An elapsed timeout surfaces as
//! [`McpError::Timeout`].
//!
//! # Retry Policy
//!
//! The client does **not** retry. [`McpError::is_retryable`] tells callers
//! which failures are worth another attempt.
//!
//! # Example
//!
//! ```rust,no_run
//! use toolmesh_core::ToolCallRequest;
//! use toolmesh_mcp::McpHttpClient;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = McpHttpClient::new("http://localhost:8000/mcp")?;
//! for tool in client.list_tools().await? {
//!     println!("{}", tool.signature());
//! }
//!
//! let result = client
//!     .call_tool(&ToolCallRequest::new("add").with_argument("a", 3).with_argument("b", 5))
//!     .await?;
//! println!("{}", result.to_text());
//! # Ok(())
//! # }
//! ```

use futures::StreamExt;
use reqwest::{Client, StatusCode, header};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::error::Error as _;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use toolmesh_core::{ToolCallRequest, ToolCallResult, ToolDescriptor};
use tracing::{debug, warn};
use url::Url;

use crate::error::{McpError, McpResult};
use crate::jsonrpc::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId, ResponsePayload};
use crate::protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeParams, InitializeResult,
    LATEST_PROTOCOL_VERSION, ListToolsParams, ListToolsResult, methods,
};

/// Default timeout for one JSON-RPC exchange
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const ACCEPT_BOTH: &str = "application/json, text/event-stream";

/// Error bodies longer than this are cut in [`McpError::HttpStatus`].
const MAX_ERROR_BODY: usize = 512;

/// Client for one MCP streamable HTTP endpoint.
///
/// Cheap to clone; clones share the connection pool and the id counter.
#[derive(Clone)]
pub struct McpHttpClient {
    endpoint: Url,
    http: Client,
    timeout: Duration,
    next_id: Arc<AtomicI64>,
    client_info: Implementation,
}

impl fmt::Debug for McpHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpHttpClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl McpHttpClient {
    /// Create a client for the endpoint URL (including the mount path).
    pub fn new(endpoint: impl AsRef<str>) -> McpResult<Self> {
        Self::from_url(Url::parse(endpoint.as_ref())?)
    }

    pub fn from_url(endpoint: Url) -> McpResult<Self> {
        let http = Client::builder()
            .user_agent(format!("toolmesh/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| McpError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            http,
            timeout: DEFAULT_TIMEOUT,
            next_id: Arc::new(AtomicI64::new(1)),
            client_info: Implementation {
                name: "toolmesh".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Identity sent in `initialize`.
    pub fn with_client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.client_info = Implementation {
            name: name.into(),
            version: version.into(),
        };
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn request_timeout(&self) -> Duration {
        self.timeout
    }

    // =========================================================================
    // MCP Operations
    // =========================================================================

    /// Perform the `initialize` handshake and send `notifications/initialized`.
    pub async fn initialize(&self) -> McpResult<InitializeResult> {
        let params = InitializeParams {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: json!({}),
            client_info: self.client_info.clone(),
        };
        let value = self
            .request(methods::INITIALIZE, Some(serde_json::to_value(params)?))
            .await?;
        let result: InitializeResult = serde_json::from_value(value)?;

        self.notify(methods::INITIALIZED, None).await?;

        debug!(
            endpoint = %self.endpoint,
            server = %result.server_info.name,
            server_version = %result.server_info.version,
            protocol_version = %result.protocol_version,
            "Initialized MCP session"
        );
        Ok(result)
    }

    /// Initialize, then collect every page of `tools/list` in server order.
    pub async fn list_tools(&self) -> McpResult<Vec<ToolDescriptor>> {
        self.initialize().await?;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen_cursors = HashSet::new();

        loop {
            let params = ListToolsParams {
                cursor: cursor.clone(),
            };
            let value = self
                .request(methods::TOOLS_LIST, Some(serde_json::to_value(params)?))
                .await?;
            let page: ListToolsResult = serde_json::from_value(value)?;
            tools.extend(page.tools.into_iter().map(ToolDescriptor::from));

            match page.next_cursor {
                Some(next) if !next.is_empty() => {
                    if !seen_cursors.insert(next.clone()) {
                        return Err(McpError::protocol(format!(
                            "server repeated tools/list cursor '{}'",
                            next
                        )));
                    }
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        debug!(endpoint = %self.endpoint, tools = tools.len(), "Listed tools");
        Ok(tools)
    }

    /// Invoke one tool. A tool-level failure is an `Ok` carrying
    /// [`ToolCallResult::Failure`]; `Err` means the exchange itself failed.
    pub async fn call_tool(&self, request: &ToolCallRequest) -> McpResult<ToolCallResult> {
        let params = serde_json::to_value(CallToolParams::from(request))?;
        let value = self.request(methods::TOOLS_CALL, Some(params)).await?;
        let result: CallToolResult = serde_json::from_value(value)?;
        Ok(result.into())
    }

    /// `ping`; succeeds when the endpoint answers.
    pub async fn ping(&self) -> McpResult<()> {
        self.request(methods::PING, None).await.map(|_| ())
    }

    // =========================================================================
    // JSON-RPC Exchange
    // =========================================================================

    /// Send one request and return its `result`.
    pub async fn request(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = JsonRpcRequest::new(id.clone(), method, params);

        debug!(endpoint = %self.endpoint, method = %method, id = %id, "Sending request");

        let response = tokio::time::timeout(self.timeout, self.exchange(&request))
            .await
            .map_err(|_| McpError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            })??;

        match response.payload {
            ResponsePayload::Result(result) => Ok(result),
            ResponsePayload::Error(error) => Err(McpError::JsonRpc {
                code: error.code,
                message: error.message,
            }),
        }
    }

    /// Send a notification; the body of the reply is ignored.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        let notification = JsonRpcNotification::new(method, params);
        let response = self
            .http
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .header(header::ACCEPT, ACCEPT_BOTH)
            .json(&notification)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_error_response(status, response).await);
        }
        Ok(())
    }

    async fn exchange(&self, request: &JsonRpcRequest) -> McpResult<JsonRpcResponse> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(header::ACCEPT, ACCEPT_BOTH)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_error_response(status, response).await);
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let message = if content_type.starts_with("text/event-stream") {
            read_event_stream(response, &request.id).await?
        } else if content_type.starts_with("application/json") {
            let message: JsonRpcResponse =
                response.json().await.map_err(|e| self.transport_error(e))?;
            if message.id != request.id {
                return Err(McpError::protocol(format!(
                    "response id {} does not match request id {}",
                    message.id, request.id
                )));
            }
            message
        } else {
            return Err(McpError::protocol(format!(
                "unexpected content type '{}'",
                content_type
            )));
        };

        Ok(message)
    }

    fn transport_error(&self, error: reqwest::Error) -> McpError {
        if error.is_timeout() {
            McpError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else if error.is_decode() {
            McpError::protocol(format!("Failed to decode response: {}", error_chain(&error)))
        } else {
            McpError::Transport(error_chain(&error))
        }
    }
}

/// Read events until the response to `id` arrives. Other messages the
/// server interleaves on the stream are skipped.
async fn read_event_stream(
    response: reqwest::Response,
    id: &RequestId,
) -> McpResult<JsonRpcResponse> {
    let mut stream = response.bytes_stream();
    let mut pending: Vec<u8> = Vec::new();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| McpError::Transport(format!("Stream error: {}", e)))?;
        pending.extend_from_slice(&chunk);

        // A chunk may end inside a multi-byte character; keep the tail
        let valid = match std::str::from_utf8(&pending) {
            Ok(text) => text.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                return Err(McpError::protocol(format!("Invalid UTF-8 in event stream: {}", e)));
            }
        };
        buffer.push_str(&String::from_utf8_lossy(&pending[..valid]));
        pending.drain(..valid);
        if buffer.contains('\r') {
            buffer = buffer.replace("\r\n", "\n");
        }

        while let Some(event) = parse_sse_event(&mut buffer) {
            if event.data.is_empty() || event.event.as_deref().is_some_and(|e| e != "message") {
                continue;
            }
            match serde_json::from_str::<JsonRpcResponse>(&event.data) {
                Ok(message) if message.id == *id => return Ok(message),
                Ok(message) => debug!(id = %message.id, "Skipping response for another request"),
                Err(e) => warn!(error = %e, "Skipping event that is not a JSON-RPC response"),
            }
        }
    }

    Err(McpError::protocol("event stream ended without a response"))
}

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SseEvent {
    event: Option<String>,
    data: String,
}

/// Take the next complete event off the front of `buffer`.
///
/// Expects `\n` line endings. Comment lines (keep-alives) are dropped, so a
/// comment-only block yields an event with empty data.
fn parse_sse_event(buffer: &mut String) -> Option<SseEvent> {
    let event_end = buffer.find("\n\n")?;
    let block: String = buffer.drain(..event_end + 2).collect();

    let mut event = None;
    let mut data = String::new();

    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => {
                if !data.is_empty() {
                    data.push('\n');
                }
                data.push_str(value);
            }
            _ => {}
        }
    }

    Some(SseEvent { event, data })
}

async fn handle_error_response(status: StatusCode, response: reqwest::Response) -> McpError {
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    McpError::HttpStatus {
        status: status.as_u16(),
        body,
    }
}

fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = McpHttpClient::new("http://localhost:8000/mcp").unwrap();
        assert_eq!(client.endpoint().path(), "/mcp");
        assert_eq!(client.request_timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            McpHttpClient::new("not a valid url"),
            Err(McpError::Url(_))
        ));
    }

    #[test]
    fn test_parse_sse_event() {
        let mut buffer = String::from(
            "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\nevent: mess",
        );

        let event = parse_sse_event(&mut buffer).unwrap();
        assert_eq!(event.event.as_deref(), Some("message"));
        assert_eq!(event.data, r#"{"jsonrpc":"2.0","id":1,"result":{}}"#);
        assert_eq!(buffer, "event: mess");
        assert!(parse_sse_event(&mut buffer).is_none());
    }

    #[test]
    fn test_parse_sse_multiline_data_and_comments() {
        let mut buffer = String::from(": keep-alive\n\ndata: {\"a\":\ndata: 1}\n\n");

        let keep_alive = parse_sse_event(&mut buffer).unwrap();
        assert!(keep_alive.data.is_empty());

        let event = parse_sse_event(&mut buffer).unwrap();
        assert_eq!(event.event, None);
        assert_eq!(event.data, "{\"a\":\n1}");
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        // Port 9 (discard) on localhost is closed in test environments
        let client = McpHttpClient::new("http://127.0.0.1:9/mcp")
            .unwrap()
            .with_request_timeout(Duration::from_secs(5));
        let err = client.ping().await.unwrap_err();
        assert!(err.is_unavailable(), "unexpected error: {err}");
    }
}
