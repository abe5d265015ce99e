//! Error types for aggregation and reasoning runs.

use thiserror::Error;
use toolmesh_core::FailureReason;

/// Errors raised by the aggregator, the oracle and the reasoning loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    /// No endpoint in the current catalog owns this tool.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The owning endpoint could not be reached for a call.
    #[error("Endpoint '{endpoint}' unavailable: {message}")]
    EndpointUnavailable { endpoint: String, message: String },

    /// Two endpoints (or one endpoint twice) offer the same tool name.
    #[error("Tool '{name}' is offered by both '{first}' and '{second}'")]
    DuplicateTool {
        name: String,
        first: String,
        second: String,
    },

    /// Every configured endpoint failed during catalog construction.
    #[error("No tool endpoints available ({unreachable} unreachable)")]
    NoEndpointsAvailable { unreachable: usize },

    #[error("No tool endpoints configured")]
    NoEndpointsConfigured,

    /// The decision oracle failed (transport, HTTP status, malformed reply).
    #[error("Decision oracle failed: {0}")]
    Oracle(String),

    /// The oracle returned neither intents nor an answer.
    #[error("Invalid decision: {0}")]
    InvalidDecision(String),

    #[error("Timed out waiting for the decision oracle")]
    OracleTimeout,

    #[error("Timed out waiting for tool calls")]
    ToolTimeout,

    #[error("Run cancelled")]
    Cancelled,

    #[error("No answer after {max_rounds} tool rounds")]
    RoundLimitExceeded { max_rounds: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AgentError {
    pub fn config(message: impl Into<String>) -> Self {
        AgentError::Config(message.into())
    }

    pub fn oracle(message: impl Into<String>) -> Self {
        AgentError::Oracle(message.into())
    }

    /// Get the error code suitable for logging or reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            AgentError::ToolNotFound(_) => "TOOL_NOT_FOUND",
            AgentError::EndpointUnavailable { .. } => "ENDPOINT_UNAVAILABLE",
            AgentError::DuplicateTool { .. } => "DUPLICATE_TOOL",
            AgentError::NoEndpointsAvailable { .. } => "NO_ENDPOINTS_AVAILABLE",
            AgentError::NoEndpointsConfigured => "NO_ENDPOINTS_CONFIGURED",
            AgentError::Oracle(_) => "ORACLE_ERROR",
            AgentError::InvalidDecision(_) => "INVALID_DECISION",
            AgentError::OracleTimeout => "ORACLE_TIMEOUT",
            AgentError::ToolTimeout => "TOOL_TIMEOUT",
            AgentError::Cancelled => "CANCELLED",
            AgentError::RoundLimitExceeded { .. } => "ROUND_LIMIT_EXCEEDED",
            AgentError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Fatal errors end a reasoning run. Routing and per-call network
    /// faults are not: they are fed back to the oracle as failed results.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AgentError::ToolNotFound(_) | AgentError::EndpointUnavailable { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AgentError::OracleTimeout | AgentError::ToolTimeout)
    }

    /// Structured reason for a tool-result message.
    pub fn to_failure_reason(&self) -> FailureReason {
        match self {
            AgentError::ToolNotFound(name) => FailureReason::ToolNotFound { name: name.clone() },
            AgentError::EndpointUnavailable { endpoint, message } => {
                FailureReason::EndpointUnavailable {
                    endpoint: endpoint.clone(),
                    message: message.clone(),
                }
            }
            other => FailureReason::ExecutionFailed {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

impl From<serde_yaml::Error> for AgentError {
    fn from(err: serde_yaml::Error) -> Self {
        AgentError::Config(format!("invalid YAML: {}", err))
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::Config(format!("IO error: {}", err))
    }
}
