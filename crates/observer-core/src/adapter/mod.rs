//! Adapter contract for normalising raw agent output.
//!
//! Each agent family gets one [`DecisionAdapter`]. Adapters are tried in order
//! through an [`AdapterChain`]: an adapter that does not recognise the input
//! returns `UnknownInput` and the chain moves on; an adapter that recognises
//! the family but rejects the shape returns `UnsupportedFormat` and the chain
//! stops there.

use crate::decision::DecisionDraft;
use crate::error::{ObserverError, Result};
use serde_json::Value;
use std::sync::Arc;

/// Converts one agent family's raw output into a [`DecisionDraft`].
///
/// # Implementation Notes
///
/// Implementations must be pure: the same `(agent_id, raw)` pair always
/// yields an equal draft. Identifiers and timestamps are assigned later by
/// the session manager, never by an adapter.
pub trait DecisionAdapter: Send + Sync {
    /// Short family name used in errors and logs.
    fn name(&self) -> &str;

    /// Normalises `raw` into a draft.
    ///
    /// # Errors
    ///
    /// - `UnknownInput`: the input does not belong to this family
    /// - `UnsupportedFormat`: the family is recognised but the shape is invalid
    fn normalize(&self, agent_id: &str, raw: &Value) -> Result<DecisionDraft>;
}

/// Ordered chain of responsibility over adapters.
#[derive(Clone, Default)]
pub struct AdapterChain {
    adapters: Vec<Arc<dyn DecisionAdapter>>,
}

impl AdapterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an adapter; earlier adapters take precedence.
    pub fn with<A>(mut self, adapter: A) -> Self
    where
        A: DecisionAdapter + 'static,
    {
        self.adapters.push(Arc::new(adapter));
        self
    }

    pub fn push(&mut self, adapter: Arc<dyn DecisionAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Runs the chain and validates the resulting draft.
    ///
    /// Returns `UnknownInput` if no adapter recognised the input. A draft that
    /// fails validation is reported as `InvalidRecord` and never returned.
    pub fn normalize(&self, agent_id: &str, raw: &Value) -> Result<DecisionDraft> {
        for adapter in &self.adapters {
            match adapter.normalize(agent_id, raw) {
                Ok(draft) => {
                    draft.validate()?;
                    tracing::debug!(
                        adapter = adapter.name(),
                        agent_id,
                        options = draft.options.len(),
                        "Normalized agent output"
                    );
                    return Ok(draft);
                }
                Err(ObserverError::UnknownInput(_)) => continue,
                Err(e) => {
                    tracing::debug!(adapter = adapter.name(), error = %e, "Adapter rejected input");
                    return Err(e);
                }
            }
        }
        Err(ObserverError::unknown_input(format!(
            "no adapter recognised the output of agent '{}' (tried: {})",
            agent_id,
            self.names().join(", ")
        )))
    }
}

impl std::fmt::Debug for AdapterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterChain")
            .field("adapters", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Recognises objects carrying `pick`.
    struct PickAdapter;

    impl DecisionAdapter for PickAdapter {
        fn name(&self) -> &str {
            "pick"
        }

        fn normalize(&self, agent_id: &str, raw: &Value) -> Result<DecisionDraft> {
            let Some(pick) = raw.get("pick") else {
                return Err(ObserverError::unknown_input("no pick"));
            };
            let pick = pick
                .as_str()
                .ok_or_else(|| ObserverError::unsupported_format("pick", "pick is not a string"))?;
            Ok(DecisionDraft::new(agent_id, pick).with_options(["a", "b"]))
        }
    }

    /// Recognises everything and always answers `a`.
    struct FallbackAdapter;

    impl DecisionAdapter for FallbackAdapter {
        fn name(&self) -> &str {
            "fallback"
        }

        fn normalize(&self, agent_id: &str, _raw: &Value) -> Result<DecisionDraft> {
            Ok(DecisionDraft::new(agent_id, "a").with_options(["a"]))
        }
    }

    #[test]
    fn test_first_recognising_adapter_wins() {
        let chain = AdapterChain::new().with(PickAdapter).with(FallbackAdapter);
        let draft = chain.normalize("agent", &json!({"pick": "b"})).unwrap();
        assert_eq!(draft.chosen, "b");

        let draft = chain.normalize("agent", &json!({"other": 1})).unwrap();
        assert_eq!(draft.chosen, "a");
    }

    #[test]
    fn test_unsupported_format_stops_the_chain() {
        let chain = AdapterChain::new().with(PickAdapter).with(FallbackAdapter);
        let err = chain.normalize("agent", &json!({"pick": 3})).unwrap_err();
        assert!(err.is_unsupported_format());
    }

    #[test]
    fn test_no_match_is_unknown_input() {
        let chain = AdapterChain::new().with(PickAdapter);
        let err = chain.normalize("agent", &json!([1, 2])).unwrap_err();
        assert!(err.is_unknown_input());
        assert!(err.to_string().contains("pick"));

        assert!(AdapterChain::new().normalize("agent", &json!({})).is_err());
    }

    #[test]
    fn test_invalid_draft_is_never_returned() {
        let chain = AdapterChain::new().with(PickAdapter);
        let err = chain.normalize("agent", &json!({"pick": "z"})).unwrap_err();
        assert!(err.is_invalid_record());
    }
}
