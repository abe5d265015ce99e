//! # toolmesh MCP
//!
//! Model Context Protocol over the streamable HTTP transport: JSON-RPC 2.0
//! messages POSTed to one mounted path, answered either with a buffered JSON
//! body or a `text/event-stream` carrying a single `message` event.
//!
//! ## Features
//!
//! - `server`: [`McpServer`], an axum service exposing a
//!   [`ToolRegistry`](toolmesh_tools::ToolRegistry) statelessly, with graceful drain
//! - `client`: [`McpHttpClient`], a reqwest client that performs the
//!   `initialize` handshake, follows `tools/list` pagination and decodes
//!   both response encodings
//!
//! Both are enabled by default.

pub mod config;
pub mod error;
pub mod jsonrpc;
pub mod protocol;
pub mod shutdown;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "server")]
pub mod server;

pub use config::{ConfigError, McpServerConfig, McpServerConfigBuilder, ResponseMode};
pub use error::{McpError, McpResult};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeResult, LATEST_PROTOCOL_VERSION,
    ListToolsResult, WireTool,
};
pub use shutdown::shutdown_signal;

#[cfg(feature = "client")]
pub use client::McpHttpClient;
#[cfg(feature = "server")]
pub use server::{McpServer, ServerInfo};
