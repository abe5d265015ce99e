//! MCP error types

use thiserror::Error;
use toolmesh_core::FailureReason;

use crate::config::ConfigError;

/// MCP operation result type
pub type McpResult<T> = Result<T, McpError>;

/// Errors that can occur while serving or calling an MCP endpoint
#[derive(Debug, Error)]
pub enum McpError {
    /// The request could not be delivered or the connection broke
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request did not complete within its time budget
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The server answered with a non-success HTTP status
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The server answered with a JSON-RPC error object
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc { code: i64, message: String },

    /// The peer violated the protocol (wrong content type, missing result, ...)
    #[error("MCP protocol error: {0}")]
    Protocol(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (bind, accept)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Server configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl McpError {
    pub fn protocol(message: impl Into<String>) -> Self {
        McpError::Protocol(message.into())
    }

    /// Check if this error is retryable
    ///
    /// Returns true for transient errors that may succeed on retry. Nothing
    /// in toolmesh retries automatically; this is for callers that want to.
    pub fn is_retryable(&self) -> bool {
        match self {
            McpError::Transport(_) | McpError::Timeout { .. } => true,
            McpError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Check if the error means the endpoint could not be reached at all,
    /// as opposed to answering badly.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            McpError::Transport(_) | McpError::Timeout { .. } | McpError::HttpStatus { .. }
        )
    }

    /// Convert into the structured reason for a failed tool call routed to
    /// `endpoint`.
    pub fn to_failure_reason(&self, endpoint: &str) -> FailureReason {
        if self.is_unavailable() {
            FailureReason::EndpointUnavailable {
                endpoint: endpoint.to_string(),
                message: self.to_string(),
            }
        } else {
            FailureReason::ExecutionFailed {
                message: format!("{}: {}", endpoint, self),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(McpError::Transport("connection refused".into()).is_retryable());
        assert!(McpError::Timeout { timeout_ms: 10 }.is_retryable());
        assert!(
            McpError::HttpStatus {
                status: 503,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(
            !McpError::HttpStatus {
                status: 404,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(
            !McpError::JsonRpc {
                code: -32601,
                message: "Method not found".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_failure_reason_mapping() {
        let reason = McpError::Transport("connection refused".into()).to_failure_reason("math");
        assert_eq!(reason.code(), "endpoint_unavailable");

        let reason = McpError::protocol("missing result").to_failure_reason("math");
        assert_eq!(reason.code(), "execution_failed");
    }
}
