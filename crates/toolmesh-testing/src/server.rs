//! Loopback MCP servers.
//!
//! Each server binds `127.0.0.1:0` and runs on a spawned task until it is
//! stopped or the handle is dropped.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use toolmesh_core::EndpointId;
use toolmesh_mcp::{McpHttpClient, McpResult, McpServer, McpServerConfig, ResponseMode};
use toolmesh_tools::ToolRegistry;
use tracing::debug;

/// A running tool server.
pub struct TestServer {
    addr: SocketAddr,
    path: String,
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<McpResult<()>>>,
}

impl TestServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}{}", self.addr, self.path)
    }

    /// Endpoint identity for client configuration.
    pub fn endpoint(&self, name: &str) -> EndpointId {
        match EndpointId::parse(name, &self.url()) {
            Ok(endpoint) => endpoint,
            Err(e) => panic!("loopback url is always valid: {e}"),
        }
    }

    pub fn client(&self) -> McpHttpClient {
        match McpHttpClient::new(&self.url()) {
            Ok(client) => client,
            Err(e) => panic!("loopback url is always valid: {e}"),
        }
    }

    /// Trigger graceful shutdown and wait for the server task.
    pub async fn stop(mut self) -> McpResult<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or(Ok(())),
            None => Ok(()),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Test server configuration: loopback, short drain.
pub fn test_config(mode: ResponseMode) -> McpServerConfig {
    McpServerConfig::builder()
        .host("127.0.0.1")
        .port(0)
        .response_mode(mode)
        .shutdown_timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|e| panic!("test config is valid: {e}"))
}

pub async fn spawn_tool_server(registry: Arc<ToolRegistry>, mode: ResponseMode) -> TestServer {
    spawn_with_config(registry, test_config(mode)).await
}

pub async fn spawn_with_config(registry: Arc<ToolRegistry>, config: McpServerConfig) -> TestServer {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(e) => panic!("cannot bind loopback port: {e}"),
    };
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(e) => panic!("bound listener has an address: {e}"),
    };
    let path = config.path.clone();
    let (stop, stopped) = oneshot::channel::<()>();

    let server = McpServer::new(registry, config);
    let handle = tokio::spawn(server.serve(listener, async move {
        let _ = stopped.await;
    }));
    debug!(address = %addr, path = %path, "Test tool server started");

    TestServer {
        addr,
        path,
        stop: Some(stop),
        handle: Some(handle),
    }
}

/// An endpoint on a loopback port nothing listens on.
pub fn unreachable_endpoint(name: &str) -> EndpointId {
    // Bind and release so the port is known to be free.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .unwrap_or(9);
    match EndpointId::parse(name, &format!("http://127.0.0.1:{}/mcp", port)) {
        Ok(endpoint) => endpoint,
        Err(e) => panic!("loopback url is always valid: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::math_registry;

    #[tokio::test]
    async fn test_spawned_server_lists_tools() {
        let server = spawn_tool_server(math_registry(), ResponseMode::Json).await;
        let tools = server.client().list_tools().await.unwrap();
        assert_eq!(tools.len(), 4);
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_refuses() {
        let endpoint = unreachable_endpoint("gone");
        let client = McpHttpClient::from_url(endpoint.address).unwrap();
        let err = client.list_tools().await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
