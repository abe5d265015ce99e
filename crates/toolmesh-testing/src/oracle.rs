//! Deterministic decision oracles.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use toolmesh_agent::{AgentError, AgentResult, Conversation, Decision, DecisionOracle, ToolIntent};
use toolmesh_core::ToolDescriptor;

/// One scripted oracle step.
#[derive(Debug, Clone)]
pub enum Step {
    Decide(Decision),
    Fail(AgentError),
    /// Never returns; the run must be cancelled or time out
    Hang,
    /// Sleep, then decide
    Delay(Duration, Decision),
}

/// Oracle that replays a fixed script and records what it was shown.
///
/// Once the script is exhausted every call fails with an oracle error.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    steps: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<Seen>>,
}

/// What the oracle received on one call.
#[derive(Debug, Clone)]
pub struct Seen {
    pub conversation: Conversation,
    pub tools: Vec<String>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, decision: Decision) -> Self {
        self.step(Step::Decide(decision))
    }

    /// Request these intents in one step.
    pub fn then_call(self, intents: impl IntoIterator<Item = ToolIntent>) -> Self {
        self.then(Decision::CallTools(intents.into_iter().collect()))
    }

    pub fn then_answer(self, answer: impl Into<String>) -> Self {
        self.then(Decision::answer(answer))
    }

    pub fn then_fail(self, error: AgentError) -> Self {
        self.step(Step::Fail(error))
    }

    pub fn then_hang(self) -> Self {
        self.step(Step::Hang)
    }

    pub fn step(self, step: Step) -> Self {
        self.lock_steps().push_back(step);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Number of `decide` calls so far.
    pub fn calls(&self) -> usize {
        self.lock_seen().len()
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.lock_seen().clone()
    }

    pub fn remaining(&self) -> usize {
        self.lock_steps().len()
    }

    fn lock_steps(&self) -> std::sync::MutexGuard<'_, VecDeque<Step>> {
        self.steps.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_seen(&self) -> std::sync::MutexGuard<'_, Vec<Seen>> {
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    async fn decide(&self, conversation: &Conversation, tools: &[ToolDescriptor]) -> AgentResult<Decision> {
        self.lock_seen().push(Seen {
            conversation: conversation.clone(),
            tools: tools.iter().map(|t| t.name.clone()).collect(),
        });

        let step = self.lock_steps().pop_front();
        match step {
            Some(Step::Decide(decision)) => Ok(decision),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Hang) => std::future::pending().await,
            Some(Step::Delay(delay, decision)) => {
                tokio::time::sleep(delay).await;
                Ok(decision)
            }
            None => Err(AgentError::oracle("scripted oracle exhausted")),
        }
    }
}

type DecideFn = dyn Fn(&Conversation, &[ToolDescriptor]) -> AgentResult<Decision> + Send + Sync;

/// Oracle backed by a synchronous closure.
pub struct FnOracle(Box<DecideFn>);

impl FnOracle {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Conversation, &[ToolDescriptor]) -> AgentResult<Decision> + Send + Sync + 'static,
    {
        Self(Box::new(f))
    }
}

#[async_trait]
impl DecisionOracle for FnOracle {
    async fn decide(&self, conversation: &Conversation, tools: &[ToolDescriptor]) -> AgentResult<Decision> {
        (self.0)(conversation, tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_replays_in_order_and_records() {
        let oracle = ScriptedOracle::new()
            .then_call([ToolIntent::new("add")])
            .then_answer("8");
        let conversation = Conversation::new("3 + 5?");
        let tools = [ToolDescriptor::new("add", "Add two numbers")];

        assert!(matches!(
            oracle.decide(&conversation, &tools).await.unwrap(),
            Decision::CallTools(ref intents) if intents[0].name == "add"
        ));
        assert_eq!(oracle.decide(&conversation, &tools).await.unwrap(), Decision::answer("8"));
        assert!(oracle.decide(&conversation, &tools).await.is_err());

        assert_eq!(oracle.calls(), 3);
        assert_eq!(oracle.seen()[0].tools, ["add"]);
        assert_eq!(oracle.remaining(), 0);
    }

    #[tokio::test]
    async fn test_fn_oracle() {
        let oracle = FnOracle::new(|conversation, _| Ok(Decision::answer(conversation.query().to_uppercase())));
        let decision = oracle.decide(&Conversation::new("hi"), &[]).await.unwrap();
        assert_eq!(decision, Decision::answer("HI"));
    }
}
