//! # toolmesh
//!
//! Tool servers, tool aggregation and a tool-calling reasoning loop over the
//! Model Context Protocol.
//!
//! ## Components
//!
//! - **[core]**: tool descriptors, call requests and structured results
//! - **[tools]**: the server-side [`ToolRegistry`] and [`Dispatcher`], plus the
//!   built-in math and weather tools
//! - **[mcp]**: the streamable HTTP [`McpServer`] and [`McpHttpClient`]
//! - **[agent]**: the [`ToolAggregator`], the [`ReasoningLoop`] and the [`Gateway`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use toolmesh::{McpServer, McpServerConfig, ToolRegistry, shutdown_signal};
//! use toolmesh::tools::standard::math;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = ToolRegistry::new();
//! math::register(&mut registry)?;
//!
//! let server = McpServer::new(Arc::new(registry), McpServerConfig::default());
//! let listener = server.bind().await?;
//! server.serve(listener, shutdown_signal()).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Module aliases for namespaced access
// ============================================================================

pub use toolmesh_agent as agent;
pub use toolmesh_core as core;
pub use toolmesh_mcp as mcp;
pub use toolmesh_tools as tools;

// ============================================================================
// Common types at the top level
// ============================================================================

pub use toolmesh_core::{
    Arguments, ContentItem, EndpointId, FailureReason, ParamSpec, ParamType, ToolCallRequest,
    ToolCallResult, ToolDescriptor, TransportKind,
};
pub use toolmesh_tools::{Dispatcher, ToolHandler, ToolRegistry};

pub use toolmesh_mcp::{
    McpError, McpHttpClient, McpServer, McpServerConfig, ResponseMode, shutdown_signal,
};

pub use toolmesh_agent::{
    AgentConfig, AgentError, AggregatedCatalog, ChatCompletionsOracle, Conversation, Decision,
    DecisionOracle, Gateway, ReasoningLoop, RunOptions, ToolAggregator, ToolIntent,
};
