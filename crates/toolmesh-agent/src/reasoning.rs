//! The reasoning loop.
//!
//! ```text
//! AwaitingDecision ──answer──▶ Done
//!        │  ▲
//!  intents│  │results appended in intent order
//!        ▼  │
//!   DispatchingTool
//! ```
//!
//! Each run owns its [`Conversation`]. Intents from one decision are
//! dispatched concurrently, but their results are appended in the order
//! the oracle issued them. A run ends with an answer or a [`RunError`]; the
//! oracle wait and the tool wait both observe the caller's cancellation
//! token and deadline.

use futures::future::join_all;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use toolmesh_core::ToolCallResult;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregator::ToolAggregator;
use crate::conversation::{Conversation, Message};
use crate::error::AgentError;
use crate::oracle::{Decision, DecisionOracle, ToolIntent};

/// Default cap on tool rounds per run.
pub const DEFAULT_MAX_ROUNDS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    AwaitingDecision,
    DispatchingTool,
    Done,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::AwaitingDecision => write!(f, "awaiting_decision"),
            LoopState::DispatchingTool => write!(f, "dispatching_tool"),
            LoopState::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Tool rounds allowed before the run fails with `RoundLimitExceeded`
    pub max_rounds: usize,
    /// Whole-run budget, combined with any caller deadline
    pub run_timeout: Option<Duration>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            run_timeout: None,
        }
    }
}

/// Per-run cancellation and deadline.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub cancel: Option<CancellationToken>,
    pub deadline: Option<Instant>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }
}

/// A completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub answer: String,
    pub conversation: Conversation,
    pub rounds: usize,
    pub tool_calls: usize,
}

/// A failed run, with the conversation as it stood.
///
/// After an interruption the conversation holds every complete step plus
/// the intents that were in flight; their results are never appended.
#[derive(Debug, Clone, Error)]
#[error("run {run_id} failed while {state}: {error}")]
pub struct RunError {
    pub run_id: Uuid,
    pub error: AgentError,
    pub state: LoopState,
    pub conversation: Conversation,
    pub rounds: usize,
}

impl From<RunError> for AgentError {
    fn from(err: RunError) -> Self {
        err.error
    }
}

enum Interrupt {
    Cancelled,
    DeadlineElapsed,
}

pub struct ReasoningLoop {
    aggregator: Arc<ToolAggregator>,
    oracle: Arc<dyn DecisionOracle>,
    config: LoopConfig,
}

impl ReasoningLoop {
    pub fn new(aggregator: Arc<ToolAggregator>, oracle: Arc<dyn DecisionOracle>) -> Self {
        Self {
            aggregator,
            oracle,
            config: LoopConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn aggregator(&self) -> &Arc<ToolAggregator> {
        &self.aggregator
    }

    pub async fn run(&self, query: &str) -> Result<RunOutcome, RunError> {
        self.run_with(query, RunOptions::default()).await
    }

    pub async fn run_with(&self, query: &str, options: RunOptions) -> Result<RunOutcome, RunError> {
        let run_id = Uuid::new_v4();
        let cancel = options.cancel.unwrap_or_default();
        let deadline = match (options.deadline, self.config.run_timeout) {
            (Some(deadline), Some(timeout)) => Some(deadline.min(Instant::now() + timeout)),
            (Some(deadline), None) => Some(deadline),
            (None, Some(timeout)) => Some(Instant::now() + timeout),
            (None, None) => None,
        };

        let catalog = self.aggregator.catalog();
        let tools = catalog.descriptors();
        let mut conversation = Conversation::new(query);
        let mut rounds = 0;
        let mut tool_calls = 0;

        info!(run_id = %run_id, tools = tools.len(), max_rounds = self.config.max_rounds, "Reasoning run started");

        let fail = |error: AgentError, state: LoopState, conversation: Conversation, rounds: usize| {
            warn!(run_id = %run_id, state = %state, rounds, error = %error, "Reasoning run failed");
            RunError {
                run_id,
                error,
                state,
                conversation,
                rounds,
            }
        };

        loop {
            debug!(run_id = %run_id, state = %LoopState::AwaitingDecision, messages = conversation.len(), "Consulting oracle");
            let decided =
                interruptible(&cancel, deadline, self.oracle.decide(&conversation, &tools)).await;
            let decision = match decided {
                Ok(Ok(decision)) => decision,
                Ok(Err(e)) => {
                    return Err(fail(e, LoopState::AwaitingDecision, conversation, rounds));
                }
                Err(Interrupt::Cancelled) => {
                    return Err(fail(AgentError::Cancelled, LoopState::AwaitingDecision, conversation, rounds));
                }
                Err(Interrupt::DeadlineElapsed) => {
                    return Err(fail(AgentError::OracleTimeout, LoopState::AwaitingDecision, conversation, rounds));
                }
            };

            let intents = match decision {
                Decision::Answer(answer) if !answer.trim().is_empty() => {
                    conversation.push(Message::assistant(answer.clone()));
                    info!(run_id = %run_id, state = %LoopState::Done, rounds, tool_calls, "Reasoning run finished");
                    return Ok(RunOutcome {
                        run_id,
                        answer,
                        conversation,
                        rounds,
                        tool_calls,
                    });
                }
                Decision::CallTools(intents) if !intents.is_empty() => intents,
                _ => {
                    let error = AgentError::InvalidDecision("neither tool intents nor an answer".to_string());
                    return Err(fail(error, LoopState::AwaitingDecision, conversation, rounds));
                }
            };

            if rounds >= self.config.max_rounds {
                let error = AgentError::RoundLimitExceeded {
                    max_rounds: self.config.max_rounds,
                };
                return Err(fail(error, LoopState::AwaitingDecision, conversation, rounds));
            }
            rounds += 1;

            debug!(
                run_id = %run_id,
                state = %LoopState::DispatchingTool,
                round = rounds,
                tools = ?intents.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
                "Dispatching tool intents"
            );
            conversation.push(Message::tool_calls(intents.clone()));

            let dispatch = join_all(intents.iter().map(|intent| self.dispatch(run_id, intent)));
            let results = match interruptible(&cancel, deadline, dispatch).await {
                Ok(results) => results,
                Err(Interrupt::Cancelled) => {
                    return Err(fail(AgentError::Cancelled, LoopState::DispatchingTool, conversation, rounds));
                }
                Err(Interrupt::DeadlineElapsed) => {
                    return Err(fail(AgentError::ToolTimeout, LoopState::DispatchingTool, conversation, rounds));
                }
            };

            // join_all preserves input order, so this is intent order
            for (intent, result) in intents.iter().zip(results) {
                conversation.push(Message::tool_result(intent, result));
            }
            tool_calls += intents.len();
        }
    }

    async fn dispatch(&self, run_id: Uuid, intent: &ToolIntent) -> ToolCallResult {
        match self.aggregator.invoke(&intent.to_request()).await {
            Ok(result) => {
                debug!(run_id = %run_id, tool = %intent.name, intent_id = %intent.id, success = result.is_success(), "Tool call finished");
                result
            }
            Err(e) => {
                debug!(run_id = %run_id, tool = %intent.name, intent_id = %intent.id, error = %e, "Tool call failed");
                ToolCallResult::failed(e.to_failure_reason())
            }
        }
    }
}

/// Await `future` unless the token is cancelled or the deadline passes first.
async fn interruptible<F: Future>(
    cancel: &CancellationToken,
    deadline: Option<Instant>,
    future: F,
) -> Result<F::Output, Interrupt> {
    let expiry = async move {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
        _ = expiry => Err(Interrupt::DeadlineElapsed),
        output = future => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregatorConfig;
    use crate::conversation::Role;
    use crate::transport::ToolTransport;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use toolmesh_core::{EndpointId, FailureReason, ToolCallRequest, ToolDescriptor};
    use toolmesh_mcp::McpError;

    /// Endpoint whose tools sleep for `delay_ms` argument then echo their name.
    struct SleepyEndpoint {
        endpoint: EndpointId,
    }

    #[async_trait]
    impl ToolTransport for SleepyEndpoint {
        fn endpoint(&self) -> &EndpointId {
            &self.endpoint
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
            Ok(vec![
                ToolDescriptor::new("fast", "fast"),
                ToolDescriptor::new("slow", "slow"),
            ])
        }

        async fn call_tool(&self, request: &ToolCallRequest) -> Result<ToolCallResult, McpError> {
            let delay = request
                .argument("delay_ms")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(ToolCallResult::text(request.name.clone()))
        }
    }

    /// Oracle replaying a fixed list of decisions.
    struct Script(Mutex<VecDeque<Decision>>);

    impl Script {
        fn new(decisions: Vec<Decision>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(decisions.into())))
        }
    }

    #[async_trait]
    impl DecisionOracle for Script {
        async fn decide(
            &self,
            _conversation: &Conversation,
            _tools: &[ToolDescriptor],
        ) -> crate::AgentResult<Decision> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::oracle("script exhausted"))
        }
    }

    /// Oracle that never answers.
    struct Silent;

    #[async_trait]
    impl DecisionOracle for Silent {
        async fn decide(
            &self,
            _conversation: &Conversation,
            _tools: &[ToolDescriptor],
        ) -> crate::AgentResult<Decision> {
            std::future::pending().await
        }
    }

    async fn aggregator() -> Arc<ToolAggregator> {
        let transport: Arc<dyn ToolTransport> = Arc::new(SleepyEndpoint {
            endpoint: EndpointId::parse("sleepy", "http://sleepy.invalid/mcp").unwrap(),
        });
        Arc::new(
            ToolAggregator::from_transports(vec![transport], AggregatorConfig::default())
                .await
                .unwrap(),
        )
    }

    fn intent(name: &str, id: &str, delay_ms: u64) -> ToolIntent {
        ToolIntent::new(name)
            .with_id(id)
            .with_argument("delay_ms", delay_ms)
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_intent_order() {
        let oracle = Script::new(vec![
            Decision::CallTools(vec![intent("slow", "1", 500), intent("fast", "2", 0)]),
            Decision::answer("done"),
        ]);
        let reasoning = ReasoningLoop::new(aggregator().await, oracle);

        let outcome = reasoning.run("go").await.unwrap();
        assert_eq!(outcome.answer, "done");
        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.tool_calls, 2);

        let tools: Vec<_> = outcome.conversation.tool_results().map(|(t, _)| t).collect();
        assert_eq!(tools, ["slow", "fast"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_fed_back() {
        let oracle = Script::new(vec![
            Decision::call(intent("sqrt", "1", 0)),
            Decision::answer("I can't take square roots."),
        ]);
        let outcome = ReasoningLoop::new(aggregator().await, oracle)
            .run("sqrt 2")
            .await
            .unwrap();

        let (_, result) = outcome.conversation.tool_results().next().unwrap();
        assert_eq!(
            result.failure_reason(),
            Some(&FailureReason::ToolNotFound {
                name: "sqrt".into()
            })
        );
    }

    #[tokio::test]
    async fn test_round_limit() {
        let decisions = (0..5).map(|i| Decision::call(intent("fast", &i.to_string(), 0))).collect();
        let reasoning = ReasoningLoop::new(aggregator().await, Script::new(decisions)).with_config(LoopConfig {
            max_rounds: 3,
            run_timeout: None,
        });

        let err = reasoning.run("loop forever").await.unwrap_err();
        assert_eq!(err.error, AgentError::RoundLimitExceeded { max_rounds: 3 });
        assert_eq!(err.rounds, 3);
        assert_eq!(err.conversation.tool_results().count(), 3);
    }

    #[tokio::test]
    async fn test_empty_decision_is_invalid() {
        let oracle = Script::new(vec![Decision::CallTools(Vec::new())]);
        let err = ReasoningLoop::new(aggregator().await, oracle)
            .run("q")
            .await
            .unwrap_err();
        assert!(matches!(err.error, AgentError::InvalidDecision(_)));
        assert_eq!(err.state, LoopState::AwaitingDecision);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_while_waiting_for_oracle() {
        let reasoning = ReasoningLoop::new(aggregator().await, Arc::new(Silent));
        let err = reasoning
            .run_with("q", RunOptions::new().with_timeout(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert_eq!(err.error, AgentError::OracleTimeout);
        assert_eq!(err.conversation.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_while_dispatching() {
        let oracle = Script::new(vec![Decision::call(intent("slow", "1", 60_000))]);
        let reasoning = ReasoningLoop::new(aggregator().await, oracle).with_config(LoopConfig {
            max_rounds: 10,
            run_timeout: Some(Duration::from_secs(1)),
        });

        let err = reasoning.run("q").await.unwrap_err();
        assert_eq!(err.error, AgentError::ToolTimeout);
        assert_eq!(err.state, LoopState::DispatchingTool);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_dispatch_keeps_consistent_conversation() {
        let oracle = Script::new(vec![
            Decision::call(intent("fast", "1", 0)),
            Decision::CallTools(vec![intent("slow", "2", 60_000), intent("fast", "3", 0)]),
        ]);
        let reasoning = ReasoningLoop::new(aggregator().await, oracle);
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            })
        };

        let err = reasoning
            .run_with("q", RunOptions::new().with_cancellation(token))
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert_eq!(err.error, AgentError::Cancelled);
        assert_eq!(err.state, LoopState::DispatchingTool);
        assert_eq!(err.rounds, 2);

        let roles: Vec<_> = err.conversation.messages().iter().map(Message::role).collect();
        assert_eq!(
            roles,
            [Role::User, Role::Assistant, Role::ToolResult, Role::Assistant]
        );
        assert_eq!(err.conversation.last().unwrap().intents().len(), 2);
    }
}
