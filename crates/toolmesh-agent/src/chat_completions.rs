//! Decision oracle backed by an OpenAI-compatible chat-completions API.
//!
//! Defaults target Gemini's OpenAI-compatible endpoint with
//! `gemini-2.5-flash` at temperature 0. Any server that implements
//! `POST /chat/completions` with function calling works.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use toolmesh_core::ToolDescriptor;
use tracing::debug;
use url::Url;

use crate::conversation::{Conversation, MessageBody};
use crate::error::{AgentError, AgentResult};
use crate::oracle::{Decision, DecisionOracle, ToolIntent};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_SYSTEM_PROMPT: &str = "you are a helpful assistant that can answer user questions based on the information from the available tools.";
pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct OracleConfig {
    pub base_url: Url,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub system_prompt: String,
    pub request_timeout: Duration,
}

impl fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleConfig")
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .field("temperature", &self.temperature)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl OracleConfig {
    pub fn new(base_url: &str, model: impl Into<String>) -> AgentResult<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            model: model.into(),
            api_key: None,
            temperature: 0.0,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            request_timeout: DEFAULT_ORACLE_TIMEOUT,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// `Url::join` drops the last path segment unless the base ends with '/'.
fn parse_base_url(base_url: &str) -> AgentResult<Url> {
    let normalized = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };
    Url::parse(&normalized)
        .map_err(|e| AgentError::config(format!("invalid oracle base_url '{}': {}", base_url, e)))
}

pub struct ChatCompletionsOracle {
    http: Client,
    endpoint: Url,
    config: OracleConfig,
}

impl fmt::Debug for ChatCompletionsOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCompletionsOracle")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.config.model)
            .finish()
    }
}

impl ChatCompletionsOracle {
    pub fn new(config: OracleConfig) -> AgentResult<Self> {
        let endpoint = config
            .base_url
            .join("chat/completions")
            .map_err(|e| AgentError::config(format!("invalid oracle endpoint: {}", e)))?;
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(format!("toolmesh/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AgentError::oracle(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            config,
        })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    fn build_request<'a>(
        &'a self,
        conversation: &Conversation,
        tools: &[ToolDescriptor],
    ) -> ChatRequest<'a> {
        let mut messages = vec![ChatMessage::text("system", &self.config.system_prompt)];
        messages.extend(conversation.messages().iter().map(|m| match &m.body {
            MessageBody::User { text } => ChatMessage::text("user", text),
            MessageBody::Assistant { text, intents } if intents.is_empty() => {
                ChatMessage::text("assistant", text.as_deref().unwrap_or_default())
            }
            MessageBody::Assistant { text, intents } => ChatMessage {
                role: "assistant".to_string(),
                content: text.clone(),
                tool_calls: intents.iter().map(ChatToolCall::from).collect(),
                tool_call_id: None,
            },
            MessageBody::ToolResult {
                intent_id, result, ..
            } => ChatMessage {
                role: "tool".to_string(),
                content: Some(result.to_text()),
                tool_calls: Vec::new(),
                tool_call_id: Some(intent_id.clone()),
            },
        }));

        ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages,
            tools: tools.iter().map(ChatTool::from).collect(),
        }
    }
}

#[async_trait]
impl DecisionOracle for ChatCompletionsOracle {
    async fn decide(
        &self,
        conversation: &Conversation,
        tools: &[ToolDescriptor],
    ) -> AgentResult<Decision> {
        let request = self.build_request(conversation, tools);
        debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Requesting decision"
        );

        let mut builder = self.http.post(self.endpoint.clone()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AgentError::OracleTimeout
            } else {
                AgentError::oracle(format!("request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::oracle(format!("HTTP {}: {}", status, body)));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::oracle(format!("unreadable response: {}", e)))?;
        decision_from_reply(reply)
    }
}

fn decision_from_reply(reply: ChatResponse) -> AgentResult<Decision> {
    let message = reply
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| AgentError::InvalidDecision("response has no choices".to_string()))?;

    if !message.tool_calls.is_empty() {
        let intents = message
            .tool_calls
            .into_iter()
            .map(ToolIntent::try_from)
            .collect::<AgentResult<Vec<_>>>()?;
        return Ok(Decision::CallTools(intents));
    }

    match message.content {
        Some(text) if !text.trim().is_empty() => Ok(Decision::Answer(text)),
        _ => Err(AgentError::InvalidDecision(
            "response has neither tool calls nor content".to_string(),
        )),
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatTool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ChatToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(text.to_string()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: ChatFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatFunctionCall {
    name: String,
    /// JSON-encoded argument object
    #[serde(default)]
    arguments: String,
}

impl From<&ToolIntent> for ChatToolCall {
    fn from(intent: &ToolIntent) -> Self {
        Self {
            id: intent.id.clone(),
            kind: function_kind(),
            function: ChatFunctionCall {
                name: intent.name.clone(),
                arguments: Value::Object(intent.arguments.clone()).to_string(),
            },
        }
    }
}

impl TryFrom<ChatToolCall> for ToolIntent {
    type Error = AgentError;

    fn try_from(call: ChatToolCall) -> AgentResult<Self> {
        let arguments = if call.function.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|e| {
                AgentError::InvalidDecision(format!(
                    "arguments for '{}' are not JSON: {}",
                    call.function.name, e
                ))
            })?
        };
        let Value::Object(arguments) = arguments else {
            return Err(AgentError::InvalidDecision(format!(
                "arguments for '{}' are not an object",
                call.function.name
            )));
        };

        let intent = ToolIntent::new(call.function.name).with_arguments(arguments);
        Ok(if call.id.is_empty() {
            intent
        } else {
            intent.with_id(call.id)
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: Value,
}

impl From<&ToolDescriptor> for ChatTool {
    fn from(descriptor: &ToolDescriptor) -> Self {
        Self {
            kind: "function",
            function: ChatFunction {
                name: descriptor.name.clone(),
                description: descriptor.description.clone(),
                parameters: descriptor.input_schema(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Message;
    use serde_json::json;
    use toolmesh_core::{FailureReason, ParamSpec, ParamType, ToolCallResult};
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn add_descriptor() -> ToolDescriptor {
        ToolDescriptor::new("add", "Add two numbers together.")
            .with_param(ParamSpec::required("a", ParamType::Number, "The first number to add."))
            .with_param(ParamSpec::required("b", ParamType::Number, "The second number to add."))
    }

    async fn oracle_for(server: &MockServer) -> ChatCompletionsOracle {
        let config = OracleConfig::new(&format!("{}/v1", server.uri()), "test-model")
            .unwrap()
            .with_api_key("secret");
        ChatCompletionsOracle::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_tool_calls_become_intents() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(bearer_token("secret"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "temperature": 0.0,
                "tools": [{"type": "function", "function": {"name": "add"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_abc",
                            "type": "function",
                            "function": {"name": "add", "arguments": "{\"a\":3,\"b\":5}"}
                        }]
                    }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let oracle = oracle_for(&server).await;
        let decision = oracle
            .decide(&Conversation::new("what's (3 + 5) x 12?"), &[add_descriptor()])
            .await
            .unwrap();

        assert_eq!(
            decision,
            Decision::call(
                ToolIntent::new("add")
                    .with_id("call_abc")
                    .with_argument("a", 3)
                    .with_argument("b", 5)
            )
        );
    }

    #[tokio::test]
    async fn test_content_becomes_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "The answer is 96."}}]
            })))
            .mount(&server)
            .await;

        let decision = oracle_for(&server)
            .await
            .decide(&Conversation::new("q"), &[])
            .await
            .unwrap();
        assert_eq!(decision, Decision::answer("The answer is 96."));
    }

    #[tokio::test]
    async fn test_http_error_is_oracle_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let err = oracle_for(&server)
            .await
            .decide(&Conversation::new("q"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Oracle(ref m) if m.contains("429") && m.contains("quota")));
    }

    #[test]
    fn test_conversation_mapping() {
        let intent = ToolIntent::new("add")
            .with_id("call_1")
            .with_argument("a", 3)
            .with_argument("b", 5);
        let mut conversation = Conversation::new("what's (3 + 5) x 12?");
        conversation.push(Message::tool_calls(vec![intent.clone()]));
        conversation.push(Message::tool_result(
            &intent,
            ToolCallResult::failed(FailureReason::DivisionByZero),
        ));

        let oracle = ChatCompletionsOracle::new(
            OracleConfig::new("http://localhost:1/v1", "m").unwrap(),
        )
        .unwrap();
        let request = serde_json::to_value(oracle.build_request(&conversation, &[add_descriptor()])).unwrap();

        let messages = request["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], DEFAULT_SYSTEM_PROMPT);
        assert_eq!(messages[1], json!({"role": "user", "content": "what's (3 + 5) x 12?"}));
        assert_eq!(messages[2]["content"], Value::Null);
        assert_eq!(messages[2]["tool_calls"][0]["function"]["name"], "add");
        assert_eq!(
            serde_json::from_str::<Value>(messages[2]["tool_calls"][0]["function"]["arguments"].as_str().unwrap()).unwrap(),
            json!({"a": 3, "b": 5})
        );
        assert_eq!(
            messages[3],
            json!({"role": "tool", "content": "Error: Division by zero", "tool_call_id": "call_1"})
        );
        assert_eq!(
            request["tools"][0]["function"]["parameters"]["required"],
            json!(["a", "b"])
        );
    }

    #[test]
    fn test_malformed_replies() {
        let reply: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(decision_from_reply(reply), Err(AgentError::InvalidDecision(_))));

        let reply: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": ""}}]
        }))
        .unwrap();
        assert!(matches!(decision_from_reply(reply), Err(AgentError::InvalidDecision(_))));

        let reply: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "tool_calls": [
                {"id": "x", "function": {"name": "add", "arguments": "[1, 2]"}}
            ]}}]
        }))
        .unwrap();
        assert!(matches!(decision_from_reply(reply), Err(AgentError::InvalidDecision(_))));
    }

    #[test]
    fn test_base_url_normalization() {
        let config = OracleConfig::new("https://api.example.com/v1", "m").unwrap();
        let oracle = ChatCompletionsOracle::new(config).unwrap();
        assert_eq!(
            oracle.endpoint.as_str(),
            "https://api.example.com/v1/chat/completions"
        );
        assert!(OracleConfig::new("not a url", "m").is_err());
    }
}
