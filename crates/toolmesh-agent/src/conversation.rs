//! Per-run conversation state.
//!
//! A [`Conversation`] is append-only and owned by a single reasoning run.
//! It is discarded when the run ends; callers only see it inside a
//! [`RunOutcome`](crate::RunOutcome) or [`RunError`](crate::RunError).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use toolmesh_core::ToolCallResult;
use uuid::Uuid;

use crate::oracle::ToolIntent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    ToolResult,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::ToolResult => write!(f, "tool_result"),
        }
    }
}

/// Role-specific message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum MessageBody {
    User {
        text: String,
    },
    /// Either a final text or the tool intents issued in one step.
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        intents: Vec<ToolIntent>,
    },
    ToolResult {
        intent_id: String,
        tool: String,
        result: ToolCallResult,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(flatten)]
    pub body: MessageBody,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn now(body: MessageBody) -> Self {
        Self {
            body,
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::now(MessageBody::User { text: text.into() })
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::now(MessageBody::Assistant {
            text: Some(text.into()),
            intents: Vec::new(),
        })
    }

    pub fn tool_calls(intents: Vec<ToolIntent>) -> Self {
        Self::now(MessageBody::Assistant {
            text: None,
            intents,
        })
    }

    pub fn tool_result(intent: &ToolIntent, result: ToolCallResult) -> Self {
        Self::now(MessageBody::ToolResult {
            intent_id: intent.id.clone(),
            tool: intent.name.clone(),
            result,
        })
    }

    pub fn role(&self) -> Role {
        match self.body {
            MessageBody::User { .. } => Role::User,
            MessageBody::Assistant { .. } => Role::Assistant,
            MessageBody::ToolResult { .. } => Role::ToolResult,
        }
    }

    /// Text of a user or assistant message.
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            MessageBody::User { text } => Some(text),
            MessageBody::Assistant { text, .. } => text.as_deref(),
            MessageBody::ToolResult { .. } => None,
        }
    }

    pub fn intents(&self) -> &[ToolIntent] {
        match &self.body {
            MessageBody::Assistant { intents, .. } => intents,
            _ => &[],
        }
    }

    pub fn tool_call_result(&self) -> Option<&ToolCallResult> {
        match &self.body {
            MessageBody::ToolResult { result, .. } => Some(result),
            _ => None,
        }
    }
}

/// Ordered, append-only message sequence of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    id: Uuid,
    messages: Vec<Message>,
}

impl Conversation {
    /// Start a conversation seeded with the user's query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: vec![Message::user(query)],
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The seeding query.
    pub fn query(&self) -> &str {
        self.messages
            .first()
            .and_then(Message::text)
            .unwrap_or_default()
    }

    /// Tool-result messages in append order.
    pub fn tool_results(&self) -> impl Iterator<Item = (&str, &ToolCallResult)> {
        self.messages.iter().filter_map(|m| match &m.body {
            MessageBody::ToolResult { tool, result, .. } => Some((tool.as_str(), result)),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
