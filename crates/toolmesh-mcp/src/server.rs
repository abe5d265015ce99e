//! MCP streamable HTTP server
//!
//! Exposes a [`ToolRegistry`] over one mounted path. Every POST carries one
//! JSON-RPC message and is answered independently: no session id is issued
//! or expected, and the only shared state is the read-only registry.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use toolmesh_mcp::{McpServer, McpServerConfig, shutdown_signal};
//! use toolmesh_tools::{ToolRegistry, standard::math};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = ToolRegistry::new();
//!     math::register(&mut registry)?;
//!
//!     let server = McpServer::new(Arc::new(registry), McpServerConfig::default());
//!     let listener = server.bind().await?;
//!     server.serve(listener, shutdown_signal()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Shutdown
//!
//! When the shutdown future completes the server stops accepting
//! connections, answers further requests on open connections with
//! `503 Service Unavailable`, and waits for in-flight requests. If they have
//! not finished within `shutdown_timeout` the server returns anyway.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::post,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::convert::Infallible;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use toolmesh_core::ToolCallRequest;
use toolmesh_tools::{Dispatcher, ToolRegistry};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::{debug, info, warn};

use crate::config::{McpServerConfig, ResponseMode};
use crate::error::McpResult;
use crate::jsonrpc::{IncomingMessage, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
use crate::protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeParams, InitializeResult,
    LATEST_PROTOCOL_VERSION, ListToolsParams, ListToolsResult, SUPPORTED_PROTOCOL_VERSIONS,
    ServerCapabilities, ToolsCapability, WireTool, empty_result, methods,
};

/// Server identity reported by `initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub instructions: Option<String>,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "toolmesh".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
        }
    }
}

/// Stateless MCP tool server.
pub struct McpServer {
    dispatcher: Dispatcher,
    info: ServerInfo,
    config: McpServerConfig,
}

#[derive(Clone)]
struct AppState {
    dispatcher: Dispatcher,
    info: Arc<ServerInfo>,
    mode: ResponseMode,
    page_size: Option<usize>,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>, config: McpServerConfig) -> Self {
        let dispatcher = Dispatcher::new(registry).with_call_timeout(config.call_timeout);
        Self {
            dispatcher,
            info: ServerInfo::default(),
            config,
        }
    }

    pub fn with_info(mut self, info: ServerInfo) -> Self {
        self.info = info;
        self
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Router without a drain gate (never rejects with 503).
    pub fn router(&self) -> Router {
        self.router_with_drain(CancellationToken::new())
    }

    /// Router that answers `503` once `draining` is cancelled.
    pub fn router_with_drain(&self, draining: CancellationToken) -> Router {
        let state = AppState {
            dispatcher: self.dispatcher.clone(),
            info: Arc::new(self.info.clone()),
            mode: self.config.response_mode,
            page_size: self.config.page_size,
        };

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route(
                &self.config.path,
                post(handle_post)
                    .get(method_not_allowed)
                    .delete(method_not_allowed),
            )
            .with_state(state)
            .layer(middleware::from_fn_with_state(draining, reject_when_draining))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.config.max_body_size))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Bind a listener on the configured host and port.
    pub async fn bind(&self) -> McpResult<TcpListener> {
        Ok(TcpListener::bind(self.config.bind_address()).await?)
    }

    /// Serve on `listener` until `shutdown` completes and the drain finishes
    /// (or the drain deadline passes).
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> McpResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        let draining = CancellationToken::new();
        let router = self.router_with_drain(draining.clone());

        info!(
            address = %local_addr,
            path = %self.config.path,
            mode = %self.config.response_mode,
            tools = self.dispatcher.registry().len(),
            server = %self.info.name,
            "MCP server listening"
        );

        let trigger = draining.clone();
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            shutdown.await;
            info!("Draining in-flight requests");
            trigger.cancel();
        });

        let drain_timeout = self.config.shutdown_timeout;
        let deadline = async move {
            draining.cancelled().await;
            tokio::time::sleep(drain_timeout).await;
        };

        tokio::select! {
            result = server.into_future() => {
                result?;
                info!("MCP server stopped");
            }
            _ = deadline => {
                warn!(
                    timeout_ms = drain_timeout.as_millis() as u64,
                    "Drain deadline elapsed, stopping with requests still in flight"
                );
            }
        }
        Ok(())
    }
}

// =============================================================================
// Route Handlers
// =============================================================================

/// POST <path> - one JSON-RPC message
async fn handle_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if !is_json_content_type(&headers) {
        return rpc_error_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RequestId::Null,
            JsonRpcError::invalid_request("Content-Type must be application/json"),
        );
    }

    let mode = state.mode;
    if !accepts(&headers, mode) {
        return rpc_error_response(
            StatusCode::NOT_ACCEPTABLE,
            RequestId::Null,
            JsonRpcError::invalid_request(format!("Accept must admit {}", mode.content_type())),
        );
    }

    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            return rpc_error_response(
                StatusCode::BAD_REQUEST,
                RequestId::Null,
                JsonRpcError::parse_error(e),
            );
        }
    };

    let request = match IncomingMessage::classify(value) {
        Ok(IncomingMessage::Request(request)) => request,
        Ok(IncomingMessage::Notification(notification)) => {
            debug!(method = %notification.method, "Notification received");
            return StatusCode::ACCEPTED.into_response();
        }
        Ok(IncomingMessage::Response) => return StatusCode::ACCEPTED.into_response(),
        Err((id, error)) => return rpc_error_response(StatusCode::BAD_REQUEST, id, error),
    };

    match mode {
        ResponseMode::Json => Json(state.handle_request(request).await).into_response(),
        ResponseMode::Sse => {
            // Headers go out before the dispatch runs; the single event follows
            let stream = async_stream::stream! {
                let response = state.handle_request(request).await;
                yield Ok::<Event, Infallible>(response_event(&response));
            };
            Sse::new(stream)
                .keep_alive(KeepAlive::default())
                .into_response()
        }
    }
}

/// GET/DELETE <path> - no standing stream and no sessions to delete
async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        Json(JsonRpcResponse::error(
            RequestId::Null,
            JsonRpcError::invalid_request("only POST is supported on a stateless endpoint"),
        )),
    )
        .into_response()
}

async fn reject_when_draining(
    State(draining): State<CancellationToken>,
    request: Request,
    next: Next,
) -> Response {
    if draining.is_cancelled() {
        debug!(uri = %request.uri(), "Rejecting request, server is draining");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONNECTION, "close")],
            Json(JsonRpcResponse::error(
                RequestId::Null,
                JsonRpcError::internal("server is shutting down"),
            )),
        )
            .into_response();
    }
    next.run(request).await
}

// =============================================================================
// Method Handlers
// =============================================================================

impl AppState {
    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;
        let params = params.unwrap_or(Value::Null);

        debug!(id = %id, method = %method, "Handling request");
        let outcome = match method.as_str() {
            methods::INITIALIZE => self.initialize(params),
            methods::PING => Ok(empty_result()),
            methods::TOOLS_LIST => self.list_tools(params),
            methods::TOOLS_CALL => self.call_tool(params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        match outcome {
            Ok(result) => JsonRpcResponse::result(id, result),
            Err(error) => {
                debug!(id = %id, method = %method, code = error.code, "Request failed: {}", error.message);
                JsonRpcResponse::error(id, error)
            }
        }
    }

    fn initialize(&self, params: Value) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = parse_params(params)?;
        let protocol_version =
            if SUPPORTED_PROTOCOL_VERSIONS.contains(&params.protocol_version.as_str()) {
                params.protocol_version
            } else {
                LATEST_PROTOCOL_VERSION.to_string()
            };

        debug!(
            client = %params.client_info.name,
            client_version = %params.client_info.version,
            protocol_version = %protocol_version,
            "Client initialized"
        );

        to_value(InitializeResult {
            protocol_version,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: Implementation {
                name: self.info.name.clone(),
                version: self.info.version.clone(),
            },
            instructions: self.info.instructions.clone(),
        })
    }

    fn list_tools(&self, params: Value) -> Result<Value, JsonRpcError> {
        let params: ListToolsParams = if params.is_null() {
            ListToolsParams::default()
        } else {
            parse_params(params)?
        };

        let tools = self.dispatcher.list_tools();
        let start = match params.cursor {
            None => 0,
            Some(cursor) => cursor
                .parse::<usize>()
                .ok()
                .filter(|&offset| offset <= tools.len())
                .ok_or_else(|| JsonRpcError::invalid_params(format!("unknown cursor '{}'", cursor)))?,
        };
        let end = self
            .page_size
            .map_or(tools.len(), |size| start.saturating_add(size).min(tools.len()));

        to_value(ListToolsResult {
            tools: tools[start..end].iter().map(WireTool::from).collect(),
            next_cursor: (end < tools.len()).then(|| end.to_string()),
        })
    }

    async fn call_tool(&self, params: Value) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = parse_params(params)?;
        let request = ToolCallRequest::from(params);
        let result = self.dispatcher.dispatch(&request).await;
        to_value(CallToolResult::from(result))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(params).map_err(JsonRpcError::invalid_params)
}

fn to_value<T: Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(JsonRpcError::internal)
}

fn rpc_error_response(status: StatusCode, id: RequestId, error: JsonRpcError) -> Response {
    (status, Json(JsonRpcResponse::error(id, error))).into_response()
}

fn response_event(response: &JsonRpcResponse) -> Event {
    Event::default()
        .event("message")
        .json_data(response)
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to encode response event");
            Event::default().event("message").data(
                r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error: response encoding failed"}}"#,
            )
        })
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false)
}

/// Whether the client accepts the encoding configured at startup. A missing
/// Accept header admits anything.
fn accepts(headers: &HeaderMap, mode: ResponseMode) -> bool {
    let accept = match headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) {
        Some(accept) if !accept.trim().is_empty() => accept.to_ascii_lowercase(),
        _ => return true,
    };

    accept
        .split(',')
        .filter_map(|part| part.split(';').next())
        .map(str::trim)
        .any(|media| match mode {
            ResponseMode::Json => matches!(media, "application/json" | "application/*" | "*/*"),
            ResponseMode::Sse => matches!(media, "text/event-stream" | "text/*" | "*/*"),
        })
}
