//! Error types for tool registration and execution.

use thiserror::Error;

use crate::call::FailureReason;

/// Result type for tool handlers.
pub type ToolResult<T> = std::result::Result<T, ToolError>;

/// Errors raised while dispatching or executing a tool.
///
/// These never escape the server as protocol errors: the dispatcher converts
/// every variant into a [`FailureReason`] inside a failed result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid argument '{parameter}': {message}")]
    InvalidArgument { parameter: String, message: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Tool '{tool}' timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },
}

impl ToolError {
    pub fn invalid_argument(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::InvalidArgument {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Convert into the structured reason carried by a failed result.
    pub fn to_failure_reason(&self) -> FailureReason {
        match self {
            ToolError::UnknownTool(name) => FailureReason::UnknownTool { name: name.clone() },
            ToolError::InvalidArgument { parameter, message } => FailureReason::InvalidArgument {
                parameter: parameter.clone(),
                message: message.clone(),
            },
            ToolError::DivisionByZero => FailureReason::DivisionByZero,
            ToolError::NotFound(resource) => FailureReason::NotFound {
                resource: resource.clone(),
            },
            ToolError::ExecutionFailed(message) => FailureReason::ExecutionFailed {
                message: message.clone(),
            },
            ToolError::Timeout { tool, timeout_ms } => FailureReason::Timeout {
                operation: format!("tools/call {}", tool),
                timeout_ms: *timeout_ms,
            },
        }
    }
}

impl From<ToolError> for FailureReason {
    fn from(err: ToolError) -> Self {
        err.to_failure_reason()
    }
}

/// Errors raised when registering a tool. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateName(String),

    #[error("Invalid tool name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Tool '{tool}' declares parameter '{parameter}' more than once")]
    DuplicateParameter { tool: String, parameter: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_to_failure_reason() {
        assert_eq!(
            ToolError::UnknownTool("sqrt".into()).to_failure_reason(),
            FailureReason::UnknownTool {
                name: "sqrt".into()
            }
        );
        assert_eq!(
            FailureReason::from(ToolError::DivisionByZero),
            FailureReason::DivisionByZero
        );

        let reason = ToolError::Timeout {
            tool: "slow".into(),
            timeout_ms: 50,
        }
        .to_failure_reason();
        assert_eq!(reason.code(), "timeout");
    }

    #[test]
    fn test_error_display() {
        let err = ToolError::invalid_argument("b", "missing required parameter");
        assert_eq!(
            err.to_string(),
            "Invalid argument 'b': missing required parameter"
        );
        assert_eq!(
            RegistryError::DuplicateName("add".into()).to_string(),
            "Tool 'add' is already registered"
        );
    }
}
