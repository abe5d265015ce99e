//! Client side of one tool endpoint.
//!
//! The aggregator only sees [`ToolTransport`]; [`HttpToolTransport`] is the
//! streamable HTTP implementation, and tests can inject their own.

use async_trait::async_trait;
use std::time::Duration;
use toolmesh_core::{EndpointId, ToolCallRequest, ToolCallResult, ToolDescriptor, TransportKind};
use toolmesh_mcp::{McpError, McpHttpClient};

use crate::error::{AgentError, AgentResult};

/// A connection to one tool server.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Identity of the endpoint this transport reaches.
    fn endpoint(&self) -> &EndpointId;

    /// Fetch the endpoint's full catalog in server order.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError>;

    /// Invoke one tool. Tool-level failures are `Ok(Failure)`.
    async fn call_tool(&self, request: &ToolCallRequest) -> Result<ToolCallResult, McpError>;
}

/// [`ToolTransport`] over MCP streamable HTTP.
#[derive(Debug, Clone)]
pub struct HttpToolTransport {
    endpoint: EndpointId,
    client: McpHttpClient,
}

impl HttpToolTransport {
    pub fn new(endpoint: EndpointId, request_timeout: Duration) -> AgentResult<Self> {
        let client = match endpoint.transport {
            TransportKind::StreamableHttp => McpHttpClient::from_url(endpoint.address.clone())
                .map_err(|e| AgentError::config(format!("endpoint '{}': {}", endpoint.name, e)))?
                .with_request_timeout(request_timeout),
        };
        Ok(Self { endpoint, client })
    }

    pub fn client(&self) -> &McpHttpClient {
        &self.client
    }
}

#[async_trait]
impl ToolTransport for HttpToolTransport {
    fn endpoint(&self) -> &EndpointId {
        &self.endpoint
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        self.client.list_tools().await
    }

    async fn call_tool(&self, request: &ToolCallRequest) -> Result<ToolCallResult, McpError> {
        self.client.call_tool(request).await
    }
}
