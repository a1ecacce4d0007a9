//! Observer service.
//!
//! This module provides the `ObserverService`, which owns one engine
//! instance: the session manager, the adapter chain that turns raw agent
//! output into decision drafts, and the analytics engine.

use anyhow::Context;
use chrono::Utc;
use futures::future::join_all;
use observer_core::adapter::AdapterChain;
use observer_core::analytics::{AnalyticsEngine, MetricSnapshot, RecordFilter};
use observer_core::config::ObserverConfig;
use observer_core::decision::{DecisionContext, DecisionRecord, OutcomeUpdate};
use observer_core::error::{ObserverError, Result};
use observer_core::session::{SessionGuard, SessionHandle, SessionManager, SessionStore, SessionSummary};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::agent::ObservedAgent;

/// Entry point for observing agents and analysing their decisions.
///
/// `ObserverService` is responsible for:
/// - Normalising raw agent output through the adapter chain
/// - Recording the resulting decisions into sessions
/// - Scoped sessions that close on every exit path, including cancellation
/// - Metric snapshots over recorded decisions
///
/// Every dependency is injected; nothing is read from global state. Cloning
/// the service yields another reference to the same sessions.
#[derive(Clone)]
pub struct ObserverService {
    config: ObserverConfig,
    manager: SessionManager,
    adapters: AdapterChain,
    analytics: AnalyticsEngine,
}

impl ObserverService {
    /// Creates a new `ObserverService`.
    ///
    /// # Arguments
    ///
    /// * `config` - Session and analytics configuration
    /// * `store` - The backend sessions are persisted through
    /// * `adapters` - The chain used to normalise raw agent output
    pub fn new(config: ObserverConfig, store: Arc<dyn SessionStore>, adapters: AdapterChain) -> Self {
        let manager = SessionManager::new(store, config.sessions.clone());
        let analytics = AnalyticsEngine::new(config.analytics.clone());
        Self {
            config,
            manager,
            adapters,
            analytics,
        }
    }

    /// Builds the store named by `config` and uses the default adapter chain.
    pub fn with_defaults(config: ObserverConfig) -> Result<Self> {
        config.validate()?;
        let store = observer_infrastructure::build_store(&config.storage)?;
        Ok(Self::new(config, store, observer_adapters::default_chain()))
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    pub fn adapters(&self) -> &AdapterChain {
        &self.adapters
    }

    /// Opens a session closed when the returned guard is dropped.
    pub fn open_session(&self, label: impl Into<String>) -> Result<SessionGuard> {
        self.manager.open_session(label)
    }

    /// Normalises `raw` and records it into the session.
    ///
    /// Nothing is appended when normalisation fails.
    ///
    /// # Errors
    ///
    /// - `UnknownInput` / `UnsupportedFormat` / `InvalidRecord` from the chain
    /// - Anything [`SessionManager::record`] returns
    pub fn observe(&self, handle: &SessionHandle, agent_id: &str, raw: &Value) -> Result<DecisionRecord> {
        let draft = self.adapters.normalize(agent_id, raw).inspect_err(|e| {
            tracing::debug!(session_id = %handle.id(), agent_id, error = %e, "Could not normalise agent output");
        })?;
        self.manager.record(handle, draft)
    }

    /// Runs `agent` on `task` and records its output.
    ///
    /// The task and context are attached to the record when the agent's
    /// output does not carry its own.
    pub async fn observe_agent(
        &self,
        handle: &SessionHandle,
        agent: &dyn ObservedAgent,
        task: &str,
        context: &DecisionContext,
    ) -> anyhow::Result<DecisionRecord> {
        let agent_id = agent.agent_id();
        let raw = agent
            .run(task, context)
            .await
            .with_context(|| format!("agent '{}' failed on task", agent_id))?;

        let mut draft = self.adapters.normalize(agent_id, &raw)?;
        if draft.task.is_none() {
            draft.task = Some(task.to_string());
        }
        for (key, value) in context {
            draft.context.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Ok(self.manager.record(handle, draft)?)
    }

    /// Runs several agents concurrently into the same session.
    ///
    /// Results are returned in the order of `agents`; one agent failing does
    /// not affect the others.
    pub async fn observe_agents(
        &self,
        handle: &SessionHandle,
        agents: &[Arc<dyn ObservedAgent>],
        task: &str,
        context: &DecisionContext,
    ) -> Vec<anyhow::Result<DecisionRecord>> {
        let runs = agents
            .iter()
            .map(|agent| self.observe_agent(handle, agent.as_ref(), task, context));
        join_all(runs).await
    }

    /// Runs `f` inside a fresh session and closes the session afterwards.
    ///
    /// The session is closed when `f` returns `Ok`, when it returns `Err`, and
    /// when the returned future is dropped before completion. The error of
    /// `f` takes precedence over a close failure.
    pub async fn scoped<T, E, F, Fut>(&self, label: impl Into<String>, f: F) -> std::result::Result<T, E>
    where
        E: From<ObserverError>,
        F: FnOnce(SessionHandle) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let guard = self.manager.open_session(label)?;
        let result = f(guard.handle().clone()).await;
        if result.is_err() {
            tracing::warn!(session_id = %guard.id(), "Closing session after error");
        }
        let closed = guard.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Sets the outcome of a recorded decision, with optional performance
    /// metrics.
    pub fn update_outcome(
        &self,
        session_id: &str,
        record_id: &str,
        update: impl Into<OutcomeUpdate>,
    ) -> Result<DecisionRecord> {
        self.manager.update_outcome(session_id, record_id, update)
    }

    /// Computes every metric over the records matching `filter`.
    pub fn snapshot(&self, filter: &RecordFilter) -> Result<MetricSnapshot> {
        let records = self.manager.snapshot(filter)?;
        Ok(self.analytics.snapshot(&records, None))
    }

    pub fn session_summary(&self, session_id: &str) -> Result<SessionSummary> {
        self.manager.session_summary(session_id)
    }

    /// Summaries of every session held by this engine, oldest first.
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let now = Utc::now();
        Ok(self
            .manager
            .sessions()?
            .iter()
            .map(|session| session.summary(now))
            .collect())
    }

    /// Reloads sessions a durable store still reports as open.
    pub fn recover_open_sessions(&self) -> Result<usize> {
        self.manager.recover_open_sessions()
    }

    /// Loads the whole stored history so reports cover past runs.
    pub fn load_history(&self) -> Result<usize> {
        self.manager.load_stored_sessions()
    }
}
