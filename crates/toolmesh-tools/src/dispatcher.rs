//! Stateless tool dispatcher.
//!
//! One `dispatch` call looks the tool up, validates arguments, runs the
//! handler under a timeout and folds every outcome into a [`ToolCallResult`].
//! Nothing is retained between calls; concurrent dispatches share only the
//! read-only registry.

use std::sync::Arc;
use std::time::{Duration, Instant};
use toolmesh_core::{ContentItem, ToolCallRequest, ToolCallResult, ToolDescriptor, ToolError, ToolResult};

use crate::registry::ToolRegistry;
use crate::validation::validate_arguments;

/// Default per-call execution budget.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    call_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.registry.list_tools()
    }

    /// Execute one call. Never fails: errors become `Failure` results.
    pub async fn dispatch(&self, request: &ToolCallRequest) -> ToolCallResult {
        let start = Instant::now();
        let result = match self.try_dispatch(request).await {
            Ok(content) => ToolCallResult::success(content),
            Err(err) => ToolCallResult::failed(err.to_failure_reason()),
        };

        match result.failure_reason() {
            None => tracing::debug!(
                tool = %request.name,
                duration_ms = start.elapsed().as_millis() as u64,
                "Tool call succeeded"
            ),
            Some(reason) => tracing::debug!(
                tool = %request.name,
                duration_ms = start.elapsed().as_millis() as u64,
                reason = reason.code(),
                "Tool call failed: {}",
                reason
            ),
        }
        result
    }

    /// Execute one call, surfacing the typed error.
    pub async fn try_dispatch(&self, request: &ToolCallRequest) -> ToolResult<Vec<ContentItem>> {
        let tool = self
            .registry
            .get(&request.name)
            .ok_or_else(|| ToolError::UnknownTool(request.name.clone()))?;

        let arguments = validate_arguments(&tool.descriptor, &request.arguments)?;

        match tokio::time::timeout(self.call_timeout, tool.handler.call(&arguments)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ToolError::Timeout {
                tool: request.name.clone(),
                timeout_ms: self.call_timeout.as_millis() as u64,
            }),
        }
    }
}
