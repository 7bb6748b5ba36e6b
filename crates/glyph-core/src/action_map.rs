//! Action maps translate a UI action on a rendered card back into a capability invocation.
//!
//! Each map owns one invocation-name prefix. When no map describes its own actions, a description is
//! generated from the capability catalog: one bullet per action suffix under the tool's prefix.

use crate::catalog::{action_suffix, capability_metadata, CapabilityCatalogReader, CapabilityMetadata};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

/// Capability invocation produced by an action map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedAction {
    pub tool_name: String,
    pub params: Value,
}

pub trait ActionMap: Send + Sync {
    /// Invocation-name prefix this map owns (e.g. `finance_`).
    fn prefix(&self) -> &str;

    fn name(&self) -> &str;

    /// Translate `action` into an invocation, or `None` to decline.
    fn map_action(&self, action: &str, payload: &Value, card_data: &Value) -> Option<MappedAction>;

    /// Hand-written action description. `None` falls back to the generated one.
    fn describe_actions(&self) -> Option<String> {
        None
    }
}

/// One map per prefix; registering a prefix again replaces the previous map.
#[derive(Default)]
pub struct ActionMapRegistry {
    maps: RwLock<HashMap<String, Arc<dyn ActionMap>>>,
}

impl ActionMapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the map previously registered for the same prefix.
    pub fn register(&self, map: Arc<dyn ActionMap>) -> Option<Arc<dyn ActionMap>> {
        self.maps
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(map.prefix().to_string(), map)
    }

    pub fn unregister(&self, prefix: &str) -> bool {
        self.maps
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(prefix)
            .is_some()
    }

    /// Map whose prefix is the longest literal prefix of `tool_name`.
    pub fn find_by_tool_name(&self, tool_name: &str) -> Option<Arc<dyn ActionMap>> {
        let guard = self.maps.read().ok()?;
        guard
            .iter()
            .filter(|(prefix, _)| tool_name.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, map)| Arc::clone(map))
    }

    pub fn prefixes(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .maps
            .read()
            .map(|g| g.keys().cloned().collect())
            .unwrap_or_default();
        out.sort();
        out
    }
}

/// Delegate to the map owning `tool_name`. `None` when no map matches or the map declines.
pub fn map_action(
    registry: &ActionMapRegistry,
    tool_name: &str,
    action: &str,
    payload: &Value,
    card_data: &Value,
) -> Option<MappedAction> {
    registry
        .find_by_tool_name(tool_name)?
        .map_action(action, payload, card_data)
}

/// Action description for `tool_name`: the matching map's own text when it has one, otherwise
/// generated from the catalog. Empty when the tool is unknown to both.
pub fn describe_actions(
    registry: &ActionMapRegistry,
    catalog: &dyn CapabilityCatalogReader,
    tool_name: &str,
) -> String {
    if let Some(text) = registry
        .find_by_tool_name(tool_name)
        .and_then(|m| m.describe_actions())
    {
        return text;
    }
    generated_description(catalog, tool_name)
}

fn generated_description(catalog: &dyn CapabilityCatalogReader, tool_name: &str) -> String {
    let Some(entry) = catalog.entries().into_iter().find(|e| e.declares(tool_name)) else {
        return String::new();
    };
    let prefix = entry.prefix();

    let mut seen = HashSet::new();
    let mut lines = Vec::new();
    for meta in capability_metadata(catalog) {
        let Some(action) = action_suffix(&meta.name, &prefix) else {
            continue;
        };
        if !seen.insert(action.to_string()) {
            continue;
        }
        lines.push(describe_line(action, &meta));
    }
    lines.join("\n")
}

fn describe_line(action: &str, meta: &CapabilityMetadata) -> String {
    format!(
        "- {} — {}. {}",
        action,
        first_sentence(&meta.description),
        payload_shape(&meta.parameters)
    )
}

/// First sentence without its closing period.
fn first_sentence(description: &str) -> String {
    let text = description.trim();
    let end = text
        .char_indices()
        .find(|(i, c)| {
            *c == '\n' || (*c == '.' && text[i + 1..].chars().next().map_or(true, char::is_whitespace))
        })
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let sentence = text[..end].trim().trim_end_matches('.');
    if sentence.is_empty() {
        "No description".to_string()
    } else {
        sentence.to_string()
    }
}

/// `Payload: { key: type, optional?: type }` from a JSON-schema object, or `No payload needed.`
fn payload_shape(parameters: &Value) -> String {
    let Some(props) = parameters.get("properties").and_then(Value::as_object) else {
        return "No payload needed.".to_string();
    };
    if props.is_empty() {
        return "No payload needed.".to_string();
    }
    let required: HashSet<&str> = parameters
        .get("required")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let fields: Vec<String> = props
        .iter()
        .map(|(key, schema)| {
            let marker = if required.contains(key.as_str()) { "" } else { "?" };
            format!("{}{}: {}", key, marker, schema_type(schema))
        })
        .collect();
    format!("Payload: {{ {} }}", fields.join(", "))
}

fn schema_type(schema: &Value) -> String {
    match schema.get("type") {
        Some(Value::String(t)) => t.clone(),
        Some(Value::Array(types)) => {
            let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
            if names.is_empty() {
                "any".to_string()
            } else {
                names.join(" | ")
            }
        }
        _ => "any".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FinanceActions;

    impl ActionMap for FinanceActions {
        fn prefix(&self) -> &str {
            "finance_"
        }
        fn name(&self) -> &str {
            "finance"
        }
        fn map_action(&self, action: &str, _payload: &Value, card: &Value) -> Option<MappedAction> {
            (action == "drill_down").then(|| MappedAction {
                tool_name: "finance_analyze_ticker".to_string(),
                params: json!({ "ticker": card.get("ticker").cloned().unwrap_or(Value::Null) }),
            })
        }
    }

    struct RoutineActions;

    impl ActionMap for RoutineActions {
        fn prefix(&self) -> &str {
            "finance_routine_"
        }
        fn name(&self) -> &str {
            "routines"
        }
        fn map_action(&self, _action: &str, _payload: &Value, _card: &Value) -> Option<MappedAction> {
            None
        }
        fn describe_actions(&self) -> Option<String> {
            Some("- rerun — Run the routine again. No payload needed.".to_string())
        }
    }

    #[test]
    fn longest_prefix_wins() {
        let registry = ActionMapRegistry::new();
        registry.register(Arc::new(FinanceActions));
        registry.register(Arc::new(RoutineActions));
        assert_eq!(registry.find_by_tool_name("finance_routine_run").unwrap().name(), "routines");
        assert_eq!(registry.find_by_tool_name("finance_scan").unwrap().name(), "finance");
        assert!(registry.find_by_tool_name("fs_list_directory").is_none());
    }

    #[test]
    fn reregistering_a_prefix_replaces() {
        let registry = ActionMapRegistry::new();
        assert!(registry.register(Arc::new(FinanceActions)).is_none());
        assert!(registry.register(Arc::new(FinanceActions)).is_some());
        assert_eq!(registry.prefixes(), vec!["finance_".to_string()]);
    }

    #[test]
    fn map_action_delegates() {
        let registry = ActionMapRegistry::new();
        registry.register(Arc::new(FinanceActions));
        let mapped = map_action(&registry, "finance_scan", "drill_down", &json!({}), &json!({ "ticker": "MSFT" }))
            .expect("mapped");
        assert_eq!(mapped.tool_name, "finance_analyze_ticker");
        assert_eq!(mapped.params, json!({ "ticker": "MSFT" }));
        assert!(map_action(&registry, "finance_scan", "unknown", &json!({}), &json!({})).is_none());
    }

    #[test]
    fn first_sentence_stops_at_period() {
        assert_eq!(first_sentence("List files. Also reads."), "List files");
        assert_eq!(first_sentence("Version 1.2 parser"), "Version 1.2 parser");
        assert_eq!(first_sentence(""), "No description");
    }

    #[test]
    fn payload_shape_marks_optional_fields() {
        let schema = json!({
            "type": "object",
            "properties": { "path": { "type": "string" }, "limit": { "type": "integer" } },
            "required": ["path"]
        });
        assert_eq!(payload_shape(&schema), "Payload: { limit?: integer, path: string }");
        assert_eq!(payload_shape(&json!({ "type": "object" })), "No payload needed.");
    }
}
