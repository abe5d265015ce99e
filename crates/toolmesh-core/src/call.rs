//! Tool call requests and results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Argument map of a tool call: parameter name to JSON value.
pub type Arguments = Map<String, Value>;

/// A single tool invocation. Created fresh per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl ToolCallRequest {
    /// Create a request without arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Arguments::new(),
        }
    }

    /// Create a request from a JSON value.
    ///
    /// Anything other than an object (including `null`) yields an empty map,
    /// so validation reports the missing parameters instead of a decoding error.
    pub fn from_value(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Arguments::new(),
        };
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Add one argument (builder style).
    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Look up an argument, treating JSON `null` as absent.
    pub fn argument(&self, key: &str) -> Option<&Value> {
        self.arguments.get(key).filter(|v| !v.is_null())
    }
}

/// Structured reference carried by a `resource` content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub uri: String,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// One item of tool output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: ResourceRef,
    },
}

impl ContentItem {
    /// Plain text item.
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text { text: text.into() }
    }

    /// Text payload, if this is a text item.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentItem::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Categorized failure reasons for a tool call.
///
/// Failures are data, not exceptions: they travel back to the caller (and on
/// to the decision oracle) inside [`ToolCallResult::Failure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureReason {
    /// No tool with this name is registered on the server
    UnknownTool { name: String },
    /// A required parameter is missing or a supplied one has the wrong type
    InvalidArgument { parameter: String, message: String },
    /// Division with a zero divisor
    DivisionByZero,
    /// The requested resource (city, record, ...) does not exist
    NotFound { resource: String },
    /// The handler failed for a reason it did not classify
    ExecutionFailed { message: String },
    /// No endpoint in the aggregated catalog owns this tool
    ToolNotFound { name: String },
    /// The owning endpoint could not be reached
    EndpointUnavailable { endpoint: String, message: String },
    /// The operation exceeded its time budget
    Timeout { operation: String, timeout_ms: u64 },
}

impl FailureReason {
    /// Get a human-readable error message
    pub fn message(&self) -> String {
        match self {
            FailureReason::UnknownTool { name } => format!("Unknown tool: {}", name),
            FailureReason::InvalidArgument { parameter, message } => {
                format!("Invalid argument '{}': {}", parameter, message)
            }
            FailureReason::DivisionByZero => "Division by zero".to_string(),
            FailureReason::NotFound { resource } => format!("Not found: {}", resource),
            FailureReason::ExecutionFailed { message } => {
                format!("Execution failed: {}", message)
            }
            FailureReason::ToolNotFound { name } => {
                format!("Tool '{}' is not in the catalog", name)
            }
            FailureReason::EndpointUnavailable { endpoint, message } => {
                format!("Endpoint '{}' unavailable: {}", endpoint, message)
            }
            FailureReason::Timeout {
                operation,
                timeout_ms,
            } => format!("Timeout after {}ms: {}", timeout_ms, operation),
        }
    }

    /// Short machine-readable code, matching the serde tag.
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::UnknownTool { .. } => "unknown_tool",
            FailureReason::InvalidArgument { .. } => "invalid_argument",
            FailureReason::DivisionByZero => "division_by_zero",
            FailureReason::NotFound { .. } => "not_found",
            FailureReason::ExecutionFailed { .. } => "execution_failed",
            FailureReason::ToolNotFound { .. } => "tool_not_found",
            FailureReason::EndpointUnavailable { .. } => "endpoint_unavailable",
            FailureReason::Timeout { .. } => "timeout",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// The outcome of a tool call: content on success or a structured reason on
/// failure. Never partially filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolCallResult {
    Success { content: Vec<ContentItem> },
    Failure { reason: FailureReason },
}

impl ToolCallResult {
    pub fn success(content: Vec<ContentItem>) -> Self {
        ToolCallResult::Success { content }
    }

    /// Success with a single text item.
    pub fn text(text: impl Into<String>) -> Self {
        ToolCallResult::Success {
            content: vec![ContentItem::text(text)],
        }
    }

    pub fn failed(reason: FailureReason) -> Self {
        ToolCallResult::Failure { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolCallResult::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ToolCallResult::Failure { .. })
    }

    /// Content items; empty for failures.
    pub fn content(&self) -> &[ContentItem] {
        match self {
            ToolCallResult::Success { content } => content,
            ToolCallResult::Failure { .. } => &[],
        }
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            ToolCallResult::Success { .. } => None,
            ToolCallResult::Failure { reason } => Some(reason),
        }
    }

    /// Text rendering for display or for feeding back to a language model:
    /// text items joined by newlines, or the failure message.
    pub fn to_text(&self) -> String {
        match self {
            ToolCallResult::Success { content } => content
                .iter()
                .map(|item| match item {
                    ContentItem::Text { text } => text.clone(),
                    ContentItem::Image { mime_type, .. } => format!("[image {}]", mime_type),
                    ContentItem::Resource { resource } => resource
                        .text
                        .clone()
                        .unwrap_or_else(|| format!("[resource {}]", resource.uri)),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            ToolCallResult::Failure { reason } => format!("Error: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_argument_is_absent() {
        let request = ToolCallRequest::from_value("get_weather", json!({ "location": null }));
        assert!(request.argument("location").is_none());
    }

    #[test]
    fn test_non_object_arguments_become_empty() {
        let request = ToolCallRequest::from_value("add", json!([1, 2]));
        assert!(request.arguments.is_empty());
    }

    #[test]
    fn test_failure_reason_wire_shape() {
        let reason = FailureReason::InvalidArgument {
            parameter: "a".into(),
            message: "expected number".into(),
        };
        let value = serde_json::to_value(&reason).unwrap();
        assert_eq!(value["type"], "invalid_argument");
        assert_eq!(value["parameter"], "a");

        let unit = serde_json::to_value(FailureReason::DivisionByZero).unwrap();
        assert_eq!(unit, json!({ "type": "division_by_zero" }));
        let back: FailureReason = serde_json::from_value(unit).unwrap();
        assert_eq!(back, FailureReason::DivisionByZero);
    }

    #[test]
    fn test_code_matches_serde_tag() {
        let reasons = vec![
            FailureReason::UnknownTool { name: "x".into() },
            FailureReason::NotFound {
                resource: "Atlantis".into(),
            },
            FailureReason::Timeout {
                operation: "call".into(),
                timeout_ms: 5,
            },
        ];
        for reason in reasons {
            let value = serde_json::to_value(&reason).unwrap();
            assert_eq!(value["type"], reason.code());
        }
    }

    #[test]
    fn test_content_item_serialization() {
        let item = ContentItem::Image {
            data: "aGk=".into(),
            mime_type: "image/png".into(),
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "image");
        assert_eq!(value["mimeType"], "image/png");

        let resource: ContentItem = serde_json::from_value(json!({
            "type": "resource",
            "resource": { "uri": "file:///tmp/report.txt" }
        }))
        .unwrap();
        assert!(matches!(resource, ContentItem::Resource { .. }));
    }

    #[test]
    fn test_result_text_rendering() {
        assert_eq!(ToolCallResult::text("96").to_text(), "96");
        assert_eq!(
            ToolCallResult::failed(FailureReason::DivisionByZero).to_text(),
            "Error: Division by zero"
        );
        assert!(ToolCallResult::failed(FailureReason::DivisionByZero).content().is_empty());
    }
}
