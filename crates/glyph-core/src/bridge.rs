//! Direct capability execution: resolve an invocation name, run it and classify the outcome.
//!
//! This is the one place where capability failures are caught. Nothing here returns `Err`; callers
//! get an [`ExecutionOutcome`] and can branch on [`FailureKind`].

use crate::catalog::{Capability, CapabilityCatalogReader};
use crate::error::RouterError;
use crate::state::RegistryState;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Leading marker a capability puts on its text output to signal failure.
pub const ERROR_MARKER: &str = "[ERROR] ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// No capability answers to the name. Retrying will not help.
    Resolution,
    /// The capability was found but failed while building or running.
    Invocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub success: bool,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl ExecutionOutcome {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            raw_text: None,
            error: None,
            failure: None,
        }
    }

    pub fn failed(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            raw_text: None,
            error: Some(error.into()),
            failure: Some(kind),
        }
    }

    fn from_error(err: RouterError) -> Self {
        let kind = match err {
            RouterError::NotFound(_) => FailureKind::Resolution,
            _ => FailureKind::Invocation,
        };
        Self::failed(kind, err.to_string())
    }
}

/// Classify a capability's concatenated text output.
pub fn outcome_from_text(text: String) -> ExecutionOutcome {
    if text.starts_with(ERROR_MARKER) {
        let mut outcome = ExecutionOutcome::failed(FailureKind::Invocation, text.clone());
        outcome.raw_text = Some(text);
        return outcome;
    }
    let data = serde_json::from_str::<Value>(&text)
        .unwrap_or_else(|_| json!({ "rawOutput": text, "type": "text_result" }));
    let mut outcome = ExecutionOutcome::ok(data);
    outcome.raw_text = Some(text);
    outcome
}

/// Catalog first, then generated executors.
pub fn resolve_capability(
    state: &RegistryState,
    catalog: &dyn CapabilityCatalogReader,
    name: &str,
) -> Result<Arc<dyn Capability>, RouterError> {
    if let Some(entry) = catalog.entries().into_iter().find(|e| e.declares(name)) {
        if let Some(capability) = entry.resolve(name)? {
            return Ok(capability);
        }
        tracing::debug!(
            target: "glyph::bridge",
            name = %name,
            capability_id = %entry.capability_id,
            "declared name not produced by factory"
        );
    }
    state
        .artifacts
        .executor(name)
        .ok_or_else(|| RouterError::NotFound(name.to_string()))
}

fn new_call_id() -> String {
    format!("direct-{}", uuid::Uuid::new_v4())
}

/// Resolve `name` and run it with `params`.
pub async fn execute_direct(
    state: &RegistryState,
    catalog: &dyn CapabilityCatalogReader,
    name: &str,
    params: Value,
) -> ExecutionOutcome {
    let capability = match resolve_capability(state, catalog, name) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(target: "glyph::bridge", name = %name, error = %e, "resolution failed");
            return ExecutionOutcome::from_error(e);
        }
    };

    let call_id = new_call_id();
    tracing::debug!(target: "glyph::bridge", name = %name, call_id = %call_id, "executing");
    match capability.execute(&call_id, params).await {
        Ok(result) => {
            let outcome = outcome_from_text(result.joined_text());
            if !outcome.success {
                tracing::warn!(target: "glyph::bridge", name = %name, call_id = %call_id, "capability reported error");
            }
            outcome
        }
        Err(e) => {
            tracing::warn!(target: "glyph::bridge", name = %name, call_id = %call_id, error = %e, "execution failed");
            ExecutionOutcome::from_error(RouterError::Execution(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_marker_fails_with_raw_text() {
        let outcome = outcome_from_text("[ERROR] disk full".to_string());
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("[ERROR] disk full"));
        assert_eq!(outcome.raw_text.as_deref(), Some("[ERROR] disk full"));
        assert_eq!(outcome.failure, Some(FailureKind::Invocation));
        assert_eq!(outcome.data, Value::Null);
    }

    #[test]
    fn json_and_plain_text() {
        let outcome = outcome_from_text("{\"a\":1}".to_string());
        assert_eq!(outcome.data, json!({ "a": 1 }));
        assert_eq!(outcome.raw_text.as_deref(), Some("{\"a\":1}"));
        let outcome = outcome_from_text("hello".to_string());
        assert!(outcome.success);
        assert_eq!(outcome.data, json!({ "rawOutput": "hello", "type": "text_result" }));
        assert_eq!(outcome.raw_text.as_deref(), Some("hello"));
        assert!(outcome.error.is_none());
        // marker must lead the text
        assert!(outcome_from_text(" [ERROR] x".to_string()).success);
    }

    #[test]
    fn not_found_is_a_resolution_failure() {
        let outcome = ExecutionOutcome::from_error(RouterError::NotFound("nope".to_string()));
        assert_eq!(outcome.error.as_deref(), Some("not found: nope"));
        assert_eq!(outcome.failure, Some(FailureKind::Resolution));
    }

    #[test]
    fn call_ids_are_prefixed_and_unique() {
        let a = new_call_id();
        assert!(a.starts_with("direct-"));
        assert_ne!(a, new_call_id());
    }
}
