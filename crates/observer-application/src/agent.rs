//! The boundary between the observer and the agents it watches.

use async_trait::async_trait;
use observer_core::decision::DecisionContext;
use serde_json::Value;

/// An agent whose raw output can be observed.
///
/// The observer never looks inside an agent; it only runs it and hands the
/// returned value to the adapter chain. Implementations are free to call
/// models, tools or other agents.
#[async_trait]
pub trait ObservedAgent: Send + Sync {
    /// Identifier stamped on every record this agent produces.
    fn agent_id(&self) -> &str;

    /// Runs the agent on `task` and returns its raw output.
    async fn run(&self, task: &str, context: &DecisionContext) -> anyhow::Result<Value>;
}
