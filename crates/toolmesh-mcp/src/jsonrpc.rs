//! JSON-RPC 2.0 envelope types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Request identifier. `Null` only appears on error responses to messages
/// whose id could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
    Null,
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => f.write_str(s),
            RequestId::Null => f.write_str("null"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A message without an id; never answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(detail: impl fmt::Display) -> Self {
        Self::new(PARSE_ERROR, format!("Parse error: {}", detail))
    }

    pub fn invalid_request(detail: impl fmt::Display) -> Self {
        Self::new(INVALID_REQUEST, format!("Invalid request: {}", detail))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    pub fn invalid_params(detail: impl fmt::Display) -> Self {
        Self::new(INVALID_PARAMS, format!("Invalid params: {}", detail))
    }

    pub fn internal(detail: impl fmt::Display) -> Self {
        Self::new(INTERNAL_ERROR, format!("Internal error: {}", detail))
    }
}

/// Exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponsePayload {
    Result(Value),
    Error(JsonRpcError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(flatten)]
    pub payload: ResponsePayload,
}

impl JsonRpcResponse {
    pub fn result(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: ResponsePayload::Result(result),
        }
    }

    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: ResponsePayload::Error(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, ResponsePayload::Error(_))
    }
}

/// Shape of one incoming message, decided from which members are present.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    /// A response sent by the client (to a server-initiated request)
    Response,
}

impl IncomingMessage {
    /// Classify and decode a parsed JSON value.
    ///
    /// Arrays (batches) are rejected. On failure the returned error carries
    /// the id when it could be read, so the reply can still be correlated.
    pub fn classify(value: Value) -> Result<Self, (RequestId, JsonRpcError)> {
        let object = match value {
            Value::Object(object) => object,
            Value::Array(_) => {
                return Err((
                    RequestId::Null,
                    JsonRpcError::invalid_request("batch requests are not supported"),
                ));
            }
            _ => {
                return Err((
                    RequestId::Null,
                    JsonRpcError::invalid_request("expected a JSON object"),
                ));
            }
        };

        let id = object
            .get("id")
            .cloned()
            .and_then(|id| serde_json::from_value::<RequestId>(id).ok())
            .unwrap_or(RequestId::Null);

        if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err((id, JsonRpcError::invalid_request("jsonrpc must be \"2.0\"")));
        }

        let has_id = object.contains_key("id");
        let has_method = object.contains_key("method");
        let is_response = object.contains_key("result") || object.contains_key("error");

        let value = Value::Object(object);
        match (has_method, has_id) {
            (true, true) => serde_json::from_value(value)
                .map(IncomingMessage::Request)
                .map_err(|e| (id, JsonRpcError::invalid_request(e))),
            (true, false) => serde_json::from_value(value)
                .map(IncomingMessage::Notification)
                .map_err(|e| (id, JsonRpcError::invalid_request(e))),
            (false, true) if is_response => Ok(IncomingMessage::Response),
            _ => Err((id, JsonRpcError::invalid_request("not a request, notification or response"))),
        }
    }
}
