//! MCP message payloads for the tools capability.
//!
//! Only what a stateless tool server needs: `initialize`, `tools/list` and
//! `tools/call`. Field names follow the MCP wire format (camelCase).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use toolmesh_core::{
    Arguments, ContentItem, FailureReason, ToolCallRequest, ToolCallResult, ToolDescriptor,
};

/// Protocol revision this implementation speaks.
pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";

/// Revisions accepted from clients; anything else is answered with the latest.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26"];

pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const PING: &str = "ping";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const INITIALIZED: &str = "notifications/initialized";
}

/// Name and version of a client or server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    pub client_info: Implementation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    #[serde(default)]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: Implementation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// A tool as it appears in a `tools/list` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
}

impl From<&ToolDescriptor> for WireTool {
    fn from(descriptor: &ToolDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            description: Some(descriptor.description.clone()).filter(|d| !d.is_empty()),
            input_schema: descriptor.input_schema(),
        }
    }
}

impl From<WireTool> for ToolDescriptor {
    fn from(tool: WireTool) -> Self {
        ToolDescriptor::from_input_schema(
            tool.name,
            tool.description.unwrap_or_default(),
            &tool.input_schema,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListToolsParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    pub tools: Vec<WireTool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Arguments>,
}

impl From<&ToolCallRequest> for CallToolParams {
    fn from(request: &ToolCallRequest) -> Self {
        Self {
            name: request.name.clone(),
            arguments: Some(request.arguments.clone()),
        }
    }
}

impl From<CallToolParams> for ToolCallRequest {
    fn from(params: CallToolParams) -> Self {
        ToolCallRequest {
            name: params.name,
            arguments: params.arguments.unwrap_or_default(),
        }
    }
}

/// Result of `tools/call`.
///
/// A failed call is still a successful JSON-RPC response: `isError` is set,
/// `content` holds the readable message and `structuredContent` the
/// serialized [`FailureReason`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<ContentItem>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

impl From<ToolCallResult> for CallToolResult {
    fn from(result: ToolCallResult) -> Self {
        match result {
            ToolCallResult::Success { content } => Self {
                content,
                is_error: false,
                structured_content: None,
            },
            ToolCallResult::Failure { reason } => Self {
                content: vec![ContentItem::text(reason.message())],
                is_error: true,
                structured_content: serde_json::to_value(&reason).ok(),
            },
        }
    }
}

impl From<CallToolResult> for ToolCallResult {
    fn from(result: CallToolResult) -> Self {
        if !result.is_error {
            return ToolCallResult::Success {
                content: result.content,
            };
        }

        // Servers other than ours only send text; keep it as the message
        let reason = result
            .structured_content
            .and_then(|value| serde_json::from_value::<FailureReason>(value).ok())
            .unwrap_or_else(|| FailureReason::ExecutionFailed {
                message: result
                    .content
                    .iter()
                    .filter_map(ContentItem::as_text)
                    .collect::<Vec<_>>()
                    .join("\n"),
            });
        ToolCallResult::Failure { reason }
    }
}

/// Empty object, the result of `ping`.
pub fn empty_result() -> Value {
    Value::Object(Map::new())
}
