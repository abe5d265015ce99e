//! Tool aggregator: one namespace over many tool endpoints.
//!
//! Catalog construction lists every endpoint in parallel, each with its own
//! timeout. A failed endpoint is recorded and skipped; the merge fails only
//! on a name collision or when no endpoint answered. The merged catalog is
//! published as one `Arc` swap, so readers never see a partial merge.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use toolmesh_core::{EndpointId, ToolCallRequest, ToolCallResult};
use tracing::{debug, info, warn};

use crate::catalog::AggregatedCatalog;
use crate::error::{AgentError, AgentResult};
use crate::transport::{HttpToolTransport, ToolTransport};

/// Default time budget for listing one endpoint.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time budget for one routed tool call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorConfig {
    pub fetch_timeout: Duration,
    pub call_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

pub struct ToolAggregator {
    transports: Vec<Arc<dyn ToolTransport>>,
    by_endpoint: HashMap<String, Arc<dyn ToolTransport>>,
    catalog: RwLock<Arc<AggregatedCatalog>>,
    config: AggregatorConfig,
}

impl std::fmt::Debug for ToolAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolAggregator")
            .field("endpoints", &self.by_endpoint.keys().collect::<Vec<_>>())
            .field("tools", &self.catalog().len())
            .field("config", &self.config)
            .finish()
    }
}

impl ToolAggregator {
    /// Connect to streamable HTTP endpoints and build the first catalog.
    pub async fn connect(endpoints: Vec<EndpointId>, config: AggregatorConfig) -> AgentResult<Self> {
        let transports = endpoints
            .into_iter()
            .map(|endpoint| {
                HttpToolTransport::new(endpoint, config.call_timeout)
                    .map(|t| Arc::new(t) as Arc<dyn ToolTransport>)
            })
            .collect::<AgentResult<Vec<_>>>()?;
        Self::from_transports(transports, config).await
    }

    /// Build from already constructed transports, in configuration order.
    pub async fn from_transports(
        transports: Vec<Arc<dyn ToolTransport>>,
        config: AggregatorConfig,
    ) -> AgentResult<Self> {
        let mut by_endpoint = HashMap::with_capacity(transports.len());
        for transport in &transports {
            let name = transport.endpoint().name.clone();
            if by_endpoint.insert(name.clone(), transport.clone()).is_some() {
                return Err(AgentError::config(format!(
                    "endpoint name '{}' is configured twice",
                    name
                )));
            }
        }

        let catalog = fetch_catalog(&transports, config.fetch_timeout).await?;
        log_catalog(&catalog);

        Ok(Self {
            transports,
            by_endpoint,
            catalog: RwLock::new(Arc::new(catalog)),
            config,
        })
    }

    /// Current catalog snapshot.
    pub fn catalog(&self) -> Arc<AggregatedCatalog> {
        self.catalog
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Re-list every endpoint and publish the new catalog.
    ///
    /// On failure the previous snapshot stays published.
    pub async fn refresh(&self) -> AgentResult<Arc<AggregatedCatalog>> {
        let catalog = match fetch_catalog(&self.transports, self.config.fetch_timeout).await {
            Ok(catalog) => Arc::new(catalog),
            Err(e) => {
                warn!(error = %e, "Catalog refresh failed, keeping previous snapshot");
                return Err(e);
            }
        };
        log_catalog(&catalog);

        *self
            .catalog
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = catalog.clone();
        Ok(catalog)
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn endpoints(&self) -> Vec<&EndpointId> {
        self.transports.iter().map(|t| t.endpoint()).collect()
    }

    /// Route a call to the endpoint that owns the tool. No retries.
    ///
    /// Fails with `ToolNotFound` when the catalog has no such tool and with
    /// `EndpointUnavailable` when the call cannot complete. Protocol-level
    /// rejections from a reachable endpoint come back as failed results.
    pub async fn invoke(&self, request: &ToolCallRequest) -> AgentResult<ToolCallResult> {
        let catalog = self.catalog();
        let entry = catalog
            .get(&request.name)
            .ok_or_else(|| AgentError::ToolNotFound(request.name.clone()))?;
        let endpoint = entry.endpoint.name.as_str();
        let transport = self
            .by_endpoint
            .get(endpoint)
            .ok_or_else(|| AgentError::ToolNotFound(request.name.clone()))?;

        debug!(tool = %request.name, endpoint = %endpoint, "Routing tool call");

        let outcome = tokio::time::timeout(self.config.call_timeout, transport.call_tool(request)).await;
        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) if e.is_unavailable() => {
                warn!(tool = %request.name, endpoint = %endpoint, error = %e, "Tool call could not complete");
                Err(AgentError::EndpointUnavailable {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                })
            }
            Ok(Err(e)) => {
                warn!(tool = %request.name, endpoint = %endpoint, error = %e, "Endpoint rejected tool call");
                Ok(ToolCallResult::failed(e.to_failure_reason(endpoint)))
            }
            Err(_) => Err(AgentError::EndpointUnavailable {
                endpoint: endpoint.to_string(),
                message: format!(
                    "no reply within {}",
                    humantime::format_duration(self.config.call_timeout)
                ),
            }),
        }
    }
}

async fn fetch_catalog(
    transports: &[Arc<dyn ToolTransport>],
    fetch_timeout: Duration,
) -> AgentResult<AggregatedCatalog> {
    let fetches = transports.iter().map(|transport| async move {
        let endpoint = transport.endpoint().clone();
        let listing = match tokio::time::timeout(fetch_timeout, transport.list_tools()).await {
            Ok(Ok(tools)) => {
                debug!(endpoint = %endpoint.name, tools = tools.len(), "Listed endpoint");
                Ok(tools)
            }
            Ok(Err(e)) => {
                warn!(endpoint = %endpoint.name, address = %endpoint.address, error = %e, "Endpoint unavailable");
                Err(e.to_string())
            }
            Err(_) => {
                warn!(endpoint = %endpoint.name, address = %endpoint.address, "Endpoint listing timed out");
                Err(format!(
                    "no tool listing within {}",
                    humantime::format_duration(fetch_timeout)
                ))
            }
        };
        (endpoint, listing)
    });

    AggregatedCatalog::merge(join_all(fetches).await)
}

fn log_catalog(catalog: &AggregatedCatalog) {
    info!(
        tools = catalog.len(),
        endpoints = catalog.available_endpoints().len(),
        unavailable = catalog.unavailable_endpoints().len(),
        "Published tool catalog"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use toolmesh_core::{FailureReason, ToolDescriptor};
    use toolmesh_mcp::McpError;

    /// In-memory endpoint whose availability can be flipped.
    struct FakeEndpoint {
        endpoint: EndpointId,
        tools: Vec<ToolDescriptor>,
        up: AtomicBool,
        calls: AtomicUsize,
    }

    impl FakeEndpoint {
        fn new(name: &str, tools: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                endpoint: EndpointId::parse(name, &format!("http://{}.invalid/mcp", name)).unwrap(),
                tools: tools
                    .iter()
                    .map(|t| ToolDescriptor::new(*t, "fake"))
                    .collect(),
                up: AtomicBool::new(true),
                calls: AtomicUsize::new(0),
            })
        }

        fn set_up(&self, up: bool) {
            self.up.store(up, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ToolTransport for FakeEndpoint {
        fn endpoint(&self) -> &EndpointId {
            &self.endpoint
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
            if !self.up.load(Ordering::SeqCst) {
                return Err(McpError::Transport("connection refused".into()));
            }
            Ok(self.tools.clone())
        }

        async fn call_tool(&self, request: &ToolCallRequest) -> Result<ToolCallResult, McpError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.up.load(Ordering::SeqCst) {
                return Err(McpError::Transport("connection refused".into()));
            }
            if request.name == "reject" {
                return Err(McpError::JsonRpc {
                    code: -32602,
                    message: "Invalid params".into(),
                });
            }
            Ok(ToolCallResult::text(format!("{}@{}", request.name, self.endpoint.name)))
        }
    }

    fn transports(endpoints: &[&Arc<FakeEndpoint>]) -> Vec<Arc<dyn ToolTransport>> {
        endpoints
            .iter()
            .map(|e| Arc::clone(*e) as Arc<dyn ToolTransport>)
            .collect()
    }

    #[tokio::test]
    async fn test_routes_to_owner() {
        let math = FakeEndpoint::new("math", &["add", "multiply"]);
        let weather = FakeEndpoint::new("weather", &["get_weather"]);
        let aggregator =
            ToolAggregator::from_transports(transports(&[&math, &weather]), AggregatorConfig::default())
                .await
                .unwrap();

        let result = aggregator
            .invoke(&ToolCallRequest::new("get_weather"))
            .await
            .unwrap();
        assert_eq!(result.to_text(), "get_weather@weather");
        assert_eq!(math.calls.load(Ordering::SeqCst), 0);
        assert_eq!(weather.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_routed() {
        let math = FakeEndpoint::new("math", &["add"]);
        let aggregator = ToolAggregator::from_transports(transports(&[&math]), AggregatorConfig::default())
            .await
            .unwrap();

        let err = aggregator
            .invoke(&ToolCallRequest::new("sqrt"))
            .await
            .unwrap_err();
        assert_eq!(err, AgentError::ToolNotFound("sqrt".into()));
        assert_eq!(math.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_call_on_dead_endpoint_is_unavailable_without_retry() {
        let math = FakeEndpoint::new("math", &["add"]);
        let aggregator = ToolAggregator::from_transports(transports(&[&math]), AggregatorConfig::default())
            .await
            .unwrap();
        math.set_up(false);

        let err = aggregator
            .invoke(&ToolCallRequest::new("add"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::EndpointUnavailable { ref endpoint, .. } if endpoint == "math"));
        assert_eq!(math.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_protocol_rejection_is_failed_result() {
        let math = FakeEndpoint::new("math", &["reject"]);
        let aggregator = ToolAggregator::from_transports(transports(&[&math]), AggregatorConfig::default())
            .await
            .unwrap();

        let result = aggregator
            .invoke(&ToolCallRequest::new("reject"))
            .await
            .unwrap();
        assert!(matches!(
            result.failure_reason(),
            Some(FailureReason::ExecutionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_refresh_swaps_and_keeps_snapshot_on_failure() {
        let math = FakeEndpoint::new("math", &["add"]);
        let weather = FakeEndpoint::new("weather", &["get_weather"]);
        weather.set_up(false);

        let aggregator =
            ToolAggregator::from_transports(transports(&[&math, &weather]), AggregatorConfig::default())
                .await
                .unwrap();
        let first = aggregator.catalog();
        assert_eq!(first.tool_names(), ["add"]);
        assert!(first.is_partial());

        weather.set_up(true);
        let second = aggregator.refresh().await.unwrap();
        assert_eq!(second.tool_names(), ["add", "get_weather"]);
        // Earlier snapshots are unaffected by the swap
        assert_eq!(first.len(), 1);

        math.set_up(false);
        weather.set_up(false);
        let err = aggregator.refresh().await.unwrap_err();
        assert_eq!(err, AgentError::NoEndpointsAvailable { unreachable: 2 });
        assert_eq!(aggregator.catalog().tool_names(), ["add", "get_weather"]);
    }

    #[tokio::test]
    async fn test_collision_prevents_construction() {
        let math = FakeEndpoint::new("math", &["add"]);
        let calc = FakeEndpoint::new("calc", &["add"]);
        let err = ToolAggregator::from_transports(transports(&[&math, &calc]), AggregatorConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_TOOL");
    }

    #[tokio::test]
    async fn test_duplicate_endpoint_names_rejected() {
        let a = FakeEndpoint::new("math", &["add"]);
        let b = FakeEndpoint::new("math", &["multiply"]);
        let err = ToolAggregator::from_transports(transports(&[&a, &b]), AggregatorConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }

    struct HangingEndpoint {
        endpoint: EndpointId,
    }

    #[async_trait]
    impl ToolTransport for HangingEndpoint {
        fn endpoint(&self) -> &EndpointId {
            &self.endpoint
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
            std::future::pending().await
        }

        async fn call_tool(&self, _request: &ToolCallRequest) -> Result<ToolCallResult, McpError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_endpoint_does_not_block_catalog() {
        let math = FakeEndpoint::new("math", &["add"]);
        let hanging: Arc<dyn ToolTransport> = Arc::new(HangingEndpoint {
            endpoint: EndpointId::parse("slow", "http://slow.invalid/mcp").unwrap(),
        });

        let config = AggregatorConfig {
            fetch_timeout: Duration::from_secs(2),
            ..AggregatorConfig::default()
        };
        let aggregator = ToolAggregator::from_transports(
            vec![hanging, Arc::clone(&math) as Arc<dyn ToolTransport>],
            config,
        )
        .await
        .unwrap();

        let catalog = aggregator.catalog();
        assert_eq!(catalog.tool_names(), ["add"]);
        assert_eq!(catalog.unavailable_endpoints()[0].endpoint.name, "slow");
        assert!(catalog.unavailable_endpoints()[0].reason.contains("2s"));
    }
}
