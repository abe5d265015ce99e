//! Gateway: one reasoning run per query.
//!
//! [`Gateway::invoke`] is the library entry point. [`Gateway::router`]
//! exposes the same thing over HTTP:
//!
//! - `POST /invoke` with `{"query": "..."}` returns `{"response": "..."}`
//! - `GET /health` reports the catalog the runs will see

use axum::{
    Json, Router,
    extract::{Request, State, rejection::JsonRejection},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::error::{AgentError, AgentResult};
use crate::reasoning::{ReasoningLoop, RunOptions};

/// Default grace period for in-flight runs on shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Clone)]
pub struct Gateway {
    reasoning: Arc<ReasoningLoop>,
}

impl Gateway {
    pub fn new(reasoning: Arc<ReasoningLoop>) -> Self {
        Self { reasoning }
    }

    pub fn reasoning(&self) -> &Arc<ReasoningLoop> {
        &self.reasoning
    }

    /// Run one full loop and return the final answer.
    pub async fn invoke(&self, query: &str) -> AgentResult<String> {
        self.invoke_with(query, RunOptions::default()).await
    }

    pub async fn invoke_with(&self, query: &str, options: RunOptions) -> AgentResult<String> {
        let outcome = self.reasoning.run_with(query, options).await?;
        Ok(outcome.answer)
    }

    pub fn router(&self) -> Router {
        self.router_with_drain(CancellationToken::new())
    }

    /// Router that answers 503 once `draining` is cancelled.
    pub fn router_with_drain(&self, draining: CancellationToken) -> Router {
        Router::new()
            .route("/invoke", post(invoke_handler))
            .route("/health", get(health_handler))
            .with_state(self.clone())
            .layer(middleware::from_fn_with_state(draining, reject_when_draining))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Serve until `shutdown` completes, then drain for up to `drain_timeout`.
    pub async fn serve<F>(
        self,
        listener: TcpListener,
        shutdown: F,
        drain_timeout: Duration,
    ) -> AgentResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        let draining = CancellationToken::new();
        let router = self.router_with_drain(draining.clone());

        info!(
            address = %local_addr,
            tools = self.reasoning.aggregator().catalog().len(),
            "Gateway listening"
        );

        let trigger = draining.clone();
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            shutdown.await;
            info!("Draining in-flight runs");
            trigger.cancel();
        });

        let deadline = async move {
            draining.cancelled().await;
            tokio::time::sleep(drain_timeout).await;
        };

        tokio::select! {
            result = server.into_future() => {
                result?;
                info!("Gateway stopped");
            }
            _ = deadline => {
                warn!(
                    timeout_ms = drain_timeout.as_millis() as u64,
                    "Drain deadline elapsed, stopping with runs still in flight"
                );
            }
        }
        Ok(())
    }
}

/// HTTP status for a terminal run error.
pub fn status_for(error: &AgentError) -> StatusCode {
    match error {
        e if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
        AgentError::NoEndpointsAvailable { .. } | AgentError::NoEndpointsConfigured => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, error: &AgentError) -> Response {
    let body = ErrorBody {
        error: error.error_code().to_string(),
        message: error.to_string(),
    };
    (status, Json(body)).into_response()
}

/// POST /invoke
async fn invoke_handler(
    State(gateway): State<Gateway>,
    payload: Result<Json<InvokeRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let body = ErrorBody {
                error: "INVALID_REQUEST".to_string(),
                message: rejection.body_text(),
            };
            return (rejection.status(), Json(body)).into_response();
        }
    };

    if request.query.trim().is_empty() {
        let body = ErrorBody {
            error: "INVALID_QUERY".to_string(),
            message: "query must not be empty".to_string(),
        };
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }

    match gateway.invoke(&request.query).await {
        Ok(response) => Json(InvokeResponse { response }).into_response(),
        Err(e) => error_response(status_for(&e), &e),
    }
}

/// GET /health
async fn health_handler(State(gateway): State<Gateway>) -> Json<serde_json::Value> {
    let catalog = gateway.reasoning.aggregator().catalog();
    let unavailable: Vec<_> = catalog
        .unavailable_endpoints()
        .iter()
        .map(|u| serde_json::json!({"endpoint": u.endpoint.name, "reason": u.reason}))
        .collect();
    let status = if catalog.is_partial() { "degraded" } else { "healthy" };

    Json(serde_json::json!({
        "status": status,
        "service": "toolmesh-gateway",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "tools": catalog.len(),
        "unavailable": unavailable,
    }))
}

async fn reject_when_draining(
    State(draining): State<CancellationToken>,
    request: Request,
    next: Next,
) -> Response {
    if draining.is_cancelled() {
        let body = ErrorBody {
            error: "SHUTTING_DOWN".to_string(),
            message: "gateway is shutting down".to_string(),
        };
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONNECTION, "close")],
            Json(body),
        )
            .into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{AggregatorConfig, ToolAggregator};
    use crate::conversation::Conversation;
    use crate::oracle::{Decision, DecisionOracle, ToolIntent};
    use crate::reasoning::LoopConfig;
    use crate::transport::ToolTransport;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use rstest::rstest;
    use toolmesh_core::{EndpointId, ToolCallRequest, ToolCallResult, ToolDescriptor};
    use toolmesh_mcp::McpError;
    use tower::ServiceExt;

    struct Echo {
        endpoint: EndpointId,
    }

    #[async_trait]
    impl ToolTransport for Echo {
        fn endpoint(&self) -> &EndpointId {
            &self.endpoint
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
            Ok(vec![ToolDescriptor::new("echo", "Echo the text argument")])
        }

        async fn call_tool(&self, request: &ToolCallRequest) -> Result<ToolCallResult, McpError> {
            let text = request
                .argument("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            Ok(ToolCallResult::text(text))
        }
    }

    /// Echoes the query through the tool, then answers with the tool output.
    struct EchoOracle;

    #[async_trait]
    impl DecisionOracle for EchoOracle {
        async fn decide(&self, conversation: &Conversation, _tools: &[ToolDescriptor]) -> AgentResult<Decision> {
            if conversation.query() == "hang" {
                return std::future::pending().await;
            }
            if conversation.query() == "broken" {
                return Err(AgentError::oracle("backend returned 500"));
            }
            match conversation.tool_results().last() {
                Some((_, result)) => Ok(Decision::answer(format!("echo: {}", result.to_text()))),
                None => Ok(Decision::call(
                    ToolIntent::new("echo").with_argument("text", conversation.query()),
                )),
            }
        }
    }

    async fn gateway() -> Gateway {
        let transport: Arc<dyn ToolTransport> = Arc::new(Echo {
            endpoint: EndpointId::parse("echo", "http://echo.invalid/mcp").unwrap(),
        });
        let aggregator = ToolAggregator::from_transports(vec![transport], AggregatorConfig::default())
            .await
            .unwrap();
        let reasoning = ReasoningLoop::new(Arc::new(aggregator), Arc::new(EchoOracle)).with_config(LoopConfig {
            max_rounds: 10,
            run_timeout: Some(Duration::from_millis(200)),
        });
        Gateway::new(Arc::new(reasoning))
    }

    fn post_invoke(query: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/invoke")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::json!({"query": query}).to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invoke_returns_answer() {
        let answer = gateway().await.invoke("hello").await.unwrap();
        assert_eq!(answer, "echo: hello");
    }

    #[tokio::test]
    async fn test_http_invoke() {
        let response = gateway().await.router().oneshot(post_invoke("hi there")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["response"], "echo: hi there");
    }

    #[rstest]
    #[case("hang", StatusCode::GATEWAY_TIMEOUT, "ORACLE_TIMEOUT")]
    #[case("broken", StatusCode::INTERNAL_SERVER_ERROR, "ORACLE_ERROR")]
    #[case("  ", StatusCode::BAD_REQUEST, "INVALID_QUERY")]
    #[tokio::test]
    async fn test_http_errors(#[case] query: &str, #[case] status: StatusCode, #[case] code: &str) {
        let response = gateway().await.router().oneshot(post_invoke(query)).await.unwrap();
        assert_eq!(response.status(), status);
        assert_eq!(json_body(response).await["error"], code);
    }

    #[rstest]
    #[case("not json", StatusCode::BAD_REQUEST)]
    #[case(r#"{"question": "hi"}"#, StatusCode::UNPROCESSABLE_ENTITY)]
    #[tokio::test]
    async fn test_malformed_body_gets_json_error(#[case] body: &'static str, #[case] status: StatusCode) {
        let request = Request::builder()
            .method("POST")
            .uri("/invoke")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = gateway().await.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), status);

        let body = json_body(response).await;
        assert_eq!(body["error"], "INVALID_REQUEST");
        assert!(!body["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = gateway().await.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["tools"], 1);
    }

    #[tokio::test]
    async fn test_draining_rejects() {
        let draining = CancellationToken::new();
        let router = gateway().await.router_with_drain(draining.clone());
        draining.cancel();

        let response = router.oneshot(post_invoke("late")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&AgentError::ToolTimeout), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            status_for(&AgentError::NoEndpointsAvailable { unreachable: 2 }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_for(&AgentError::Cancelled), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
