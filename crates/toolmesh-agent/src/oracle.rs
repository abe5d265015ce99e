//! Decision oracle interface.
//!
//! The reasoning loop does not know how decisions are made. It hands the
//! conversation and the catalog's descriptors to a [`DecisionOracle`] and
//! gets back either tool intents or a final answer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use toolmesh_core::{Arguments, ToolCallRequest, ToolDescriptor};
use uuid::Uuid;

use crate::conversation::Conversation;
use crate::error::AgentResult;

/// One tool invocation the oracle asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolIntent {
    /// Correlates the intent with its tool-result message
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl ToolIntent {
    /// New intent with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.into(),
            arguments: Arguments::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    pub fn with_arguments(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }

    /// Fresh request for this intent.
    pub fn to_request(&self) -> ToolCallRequest {
        ToolCallRequest {
            name: self.name.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

/// What the oracle decided for one step.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    CallTools(Vec<ToolIntent>),
    Answer(String),
}

impl Decision {
    pub fn call(intent: ToolIntent) -> Self {
        Decision::CallTools(vec![intent])
    }

    pub fn answer(text: impl Into<String>) -> Self {
        Decision::Answer(text.into())
    }
}

/// Decides, per step, between calling tools and answering.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn decide(
        &self,
        conversation: &Conversation,
        tools: &[ToolDescriptor],
    ) -> AgentResult<Decision>;
}
