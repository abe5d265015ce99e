//! Tool server endpoint identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Wire transport used to reach a tool server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// MCP streamable HTTP: JSON-RPC over POST, JSON or event-stream replies
    #[default]
    StreamableHttp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::StreamableHttp => f.write_str("streamable_http"),
        }
    }
}

/// Static identity of one tool server for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointId {
    pub name: String,
    #[serde(rename = "url")]
    pub address: Url,
    #[serde(default)]
    pub transport: TransportKind,
}

impl EndpointId {
    pub fn new(name: impl Into<String>, address: Url) -> Self {
        Self {
            name: name.into(),
            address,
            transport: TransportKind::StreamableHttp,
        }
    }

    /// Parse the address from a string.
    pub fn parse(name: impl Into<String>, address: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(name, Url::parse(address)?))
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}
