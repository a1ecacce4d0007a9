//! End-to-end behaviour of `ObserverService` over the in-memory store.

use async_trait::async_trait;
use observer_adapters::default_chain;
use observer_application::{ObservedAgent, ObserverService};
use observer_core::analytics::{RecordFilter, SuccessRate};
use observer_core::config::{ObserverConfig, StorageBackend};
use observer_core::decision::{DecisionContext, OutcomeStatus, OutcomeUpdate, PerformanceMetrics};
use observer_core::error::ObserverError;
use observer_core::session::{SessionHandle, SessionState};
use observer_infrastructure::InMemorySessionStore;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn service() -> ObserverService {
    ObserverService::new(
        ObserverConfig::default(),
        Arc::new(InMemorySessionStore::new()),
        default_chain(),
    )
}

struct ScriptedAgent {
    id: String,
    output: Value,
}

impl ScriptedAgent {
    fn new(id: &str, output: Value) -> Self {
        Self {
            id: id.to_string(),
            output,
        }
    }
}

#[async_trait]
impl ObservedAgent for ScriptedAgent {
    fn agent_id(&self) -> &str {
        &self.id
    }

    async fn run(&self, _task: &str, _context: &DecisionContext) -> anyhow::Result<Value> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(self.output.clone())
    }
}

struct BrokenAgent;

#[async_trait]
impl ObservedAgent for BrokenAgent {
    fn agent_id(&self) -> &str {
        "broken"
    }

    async fn run(&self, _task: &str, _context: &DecisionContext) -> anyhow::Result<Value> {
        anyhow::bail!("model unavailable")
    }
}

fn state_of(service: &ObserverService, session_id: &str) -> SessionState {
    service.manager().session(session_id).unwrap().state
}

#[tokio::test]
async fn test_scoped_closes_on_success() {
    let service = service();
    let (session_id, record) = service
        .scoped("ok", |handle: SessionHandle| {
            let service = service.clone();
            async move {
                let record = service.observe(&handle, "planner", &json!({"decision": "buy", "options": ["buy", "sell"]}))?;
                Ok::<_, ObserverError>((handle.id().to_string(), record))
            }
        })
        .await
        .unwrap();

    assert_eq!(record.chosen, "buy");
    assert_eq!(state_of(&service, &session_id), SessionState::Closed);
}

#[tokio::test]
async fn test_scoped_closes_on_error_and_keeps_the_error() {
    let service = service();
    let seen = Arc::new(Mutex::new(None));

    let captured = seen.clone();
    let result: anyhow::Result<()> = service
        .scoped("failing", |handle: SessionHandle| async move {
            *captured.lock().unwrap() = Some(handle.id().to_string());
            anyhow::bail!("agent crashed")
        })
        .await;

    assert_eq!(result.unwrap_err().to_string(), "agent crashed");
    let session_id = seen.lock().unwrap().clone().unwrap();
    assert_eq!(state_of(&service, &session_id), SessionState::Closed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scoped_closes_when_cancelled() {
    let service = service();
    let seen = Arc::new(Mutex::new(None));

    let captured = seen.clone();
    let inner = service.clone();
    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        service.scoped("slow", move |handle: SessionHandle| async move {
            *captured.lock().unwrap() = Some(handle.id().to_string());
            inner.observe(&handle, "planner", &json!("wait"))?;
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, ObserverError>(())
        }),
    )
    .await;

    assert!(outcome.is_err(), "the scoped future should have timed out");
    let session_id = seen.lock().unwrap().clone().unwrap();
    let session = service.manager().session(&session_id).unwrap();
    assert_eq!(session.state, SessionState::Closed);
    assert_eq!(session.records.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_agents_share_a_session() {
    let service = service();
    let agents: Vec<Arc<dyn ObservedAgent>> = vec![
        Arc::new(ScriptedAgent::new("simple", json!({"decision": "hold", "options": ["buy", "hold"]}))),
        Arc::new(ScriptedAgent::new(
            "swarm",
            json!({
                "execution_path": [
                    {"agent": "analyst", "action": "buy", "confidence": 0.8},
                    {"agent": "risk", "action": "hold", "confidence": 0.6}
                ],
                "result": "buy"
            }),
        )),
        Arc::new(BrokenAgent),
    ];
    let mut context = DecisionContext::new();
    context.insert("ticker".into(), json!("ACME"));

    let guard = service.open_session("parallel").unwrap();
    let results = service
        .observe_agents(guard.handle(), &agents, "trade ACME", &context)
        .await;
    let session_id = guard.id().to_string();
    guard.close().unwrap();

    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert!(results[2].as_ref().unwrap_err().to_string().contains("broken"));

    let session = service.manager().session(&session_id).unwrap();
    assert_eq!(session.records.len(), 2);
    for record in &session.records {
        assert_eq!(record.task.as_deref(), Some("trade ACME"));
        assert_eq!(record.context.get("ticker"), Some(&json!("ACME")));
    }
    assert!(session.records[0].timestamp < session.records[1].timestamp);
}

#[tokio::test]
async fn test_unrecognised_output_leaves_session_unchanged() {
    let service = service();
    let guard = service.open_session("strict").unwrap();

    let err = service.observe(guard.handle(), "planner", &json!(42)).unwrap_err();
    assert!(err.is_unknown_input());
    let err = service
        .observe(guard.handle(), "planner", &json!({"options": ["a", "b"]}))
        .unwrap_err();
    assert!(err.is_unsupported_format());

    assert!(service.manager().session(guard.id()).unwrap().records.is_empty());
}

#[tokio::test]
async fn test_record_after_close_is_rejected() {
    let service = service();
    let guard = service.open_session("short").unwrap();
    let handle = guard.handle().clone();
    guard.close().unwrap();

    let err = service
        .observe(&handle, "planner", &json!({"decision": "buy"}))
        .unwrap_err();
    assert!(err.is_invalid_session_state());
    assert!(service.manager().session(handle.id()).unwrap().records.is_empty());
}

#[tokio::test]
async fn test_snapshot_reflects_outcomes() {
    let service = service();
    let guard = service.open_session("graded").unwrap();
    let mut ids = Vec::new();
    for choice in ["buy", "buy", "sell"] {
        let raw = json!({"decision": choice, "options": ["buy", "sell"], "context": {"ticker": "ACME"}});
        ids.push(service.observe(guard.handle(), "planner", &raw).unwrap().id);
    }
    let session_id = guard.id().to_string();
    guard.close().unwrap();

    service.update_outcome(&session_id, &ids[0], OutcomeStatus::Success).unwrap();
    service.update_outcome(&session_id, &ids[1], OutcomeStatus::Success).unwrap();
    service.update_outcome(&session_id, &ids[2], OutcomeStatus::Failure).unwrap();
    let err = service
        .update_outcome(&session_id, &ids[2], OutcomeStatus::Success)
        .unwrap_err();
    assert!(matches!(err, ObserverError::OutcomeAlreadyFinal { .. }));

    let snapshot = service.snapshot(&RecordFilter::default()).unwrap();
    assert_eq!(snapshot.session_count, 1);
    assert!(matches!(
        snapshot.success_rate,
        SuccessRate::Measured { successes: 2, failures: 1, .. }
    ));
    assert_eq!(snapshot.patterns.len(), 1);
    assert_eq!(snapshot.patterns[0].chosen, "buy");

    let summaries = service.list_sessions().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].decision_count, 3);
    assert_eq!(summaries[0].agents, vec!["planner"]);
}

#[tokio::test]
async fn test_measurements_flow_into_records_and_summaries() {
    let service = service();
    let guard = service.open_session("measured").unwrap();
    let first = service
        .observe(
            guard.handle(),
            "planner",
            &json!({"decision": "buy", "metadata": {"response_time": 0.2, "token_usage": 100}}),
        )
        .unwrap();
    let second = service
        .observe(
            guard.handle(),
            "swarm",
            &json!({
                "execution_path": [
                    {"agent": "risk", "action": "hold", "confidence": 0.6,
                     "data": {"volatility": 0.3},
                     "considered_actions": [{"name": "sell", "pros": ["locks gains"], "feasibility_score": 4}]}
                ],
                "result": "sell",
                "dependencies": [first.id.clone()],
                "metrics": {"response_time": 0.6, "token_usage": 300}
            }),
        )
        .unwrap();
    assert_eq!(second.dependencies, vec![first.id.clone()]);
    assert!(!second.outside_options);
    assert_eq!(second.steps[0].evidence["data"], json!({"volatility": 0.3}));
    assert_eq!(second.steps[0].alternatives[0].advantages, vec!["locks gains"]);

    let mut metrics = PerformanceMetrics::new();
    metrics.insert("pnl".to_string(), json!(-40));
    let graded = service
        .update_outcome(
            guard.id(),
            &second.id,
            OutcomeUpdate::new(OutcomeStatus::Failure).with_metrics(metrics.clone()),
        )
        .unwrap();
    assert_eq!(graded.performance_metrics, Some(metrics));

    let summary = service.session_summary(guard.id()).unwrap();
    assert_eq!(summary.averages.response_time_ms, Some(400.0));
    assert_eq!(summary.averages.token_usage, Some(200.0));
}

#[tokio::test]
async fn test_history_survives_a_new_service() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = ObserverConfig::default();
    config.storage.backend = StorageBackend::JsonDir;
    config.storage.path = Some(temp_dir.path().to_path_buf());

    let first = ObserverService::with_defaults(config.clone()).unwrap();
    let session_id = first
        .scoped("persisted", |handle: SessionHandle| {
            let first = first.clone();
            async move {
                first.observe(&handle, "planner", &json!("go"))?;
                Ok::<_, ObserverError>(handle.id().to_string())
            }
        })
        .await
        .unwrap();

    let second = ObserverService::with_defaults(config).unwrap();
    assert!(second.list_sessions().unwrap().is_empty());
    assert_eq!(second.load_history().unwrap(), 1);
    let summary = second.session_summary(&session_id).unwrap();
    assert_eq!(summary.state, SessionState::Closed);
    assert_eq!(summary.decision_count, 1);
}
