//! Capability catalog seam.
//!
//! The host process owns the list of capabilities it exposes. The router only reads it through
//! [`CapabilityCatalogReader`], so tests and embedders can hand in an isolated catalog instead of
//! relying on process-global state.
//!
//! Invocation names follow the `<prefix><action>` convention (e.g. `fs_list_directory` has prefix
//! `fs_` and action suffix `list_directory`). [`capability_prefix`] derives the prefix a catalog
//! entry owns from the names it declares.

use crate::error::RouterError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Error type returned across the capability boundary.
pub type CapabilityError = Box<dyn std::error::Error + Send + Sync>;

/// One content block of a capability result. Only `type == "text"` blocks carry text the router reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(text.into()),
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == "text" && self.text.is_some()
    }
}

/// Result returned by [`Capability::execute`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityResult {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

impl CapabilityResult {
    /// Single text block result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Concatenation of every text block, in order.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.is_text())
            .filter_map(|b| b.text.as_deref())
            .collect()
    }
}

/// A capability the host exposes. Implementations live outside this crate.
#[async_trait::async_trait]
pub trait Capability: Send + Sync {
    /// Literal invocation name (e.g. `fs_list_directory`).
    fn name(&self) -> &str;

    /// Human-readable description; the first sentence is used in action descriptions.
    fn description(&self) -> &str {
        ""
    }

    /// JSON-schema-like parameter object (`{"type":"object","properties":{..},"required":[..]}`).
    fn parameters(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    /// Run the capability. A leading `"[ERROR] "` in the returned text signals failure.
    async fn execute(&self, call_id: &str, params: Value) -> Result<CapabilityResult, CapabilityError>;
}

/// Context handed to catalog factories. The router always passes an empty one.
#[derive(Debug, Clone, Default)]
pub struct FactoryContext {
    pub values: HashMap<String, Value>,
}

/// Builds the capabilities of one catalog entry (one or many per entry).
pub type CapabilityFactory =
    Arc<dyn Fn(&FactoryContext) -> Result<Vec<Arc<dyn Capability>>, CapabilityError> + Send + Sync>;

/// One entry of the host catalog.
#[derive(Clone)]
pub struct CatalogEntry {
    pub capability_id: String,
    pub declared_names: Vec<String>,
    pub factory: CapabilityFactory,
}

impl fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("capability_id", &self.capability_id)
            .field("declared_names", &self.declared_names)
            .finish_non_exhaustive()
    }
}

impl CatalogEntry {
    pub fn new(
        capability_id: impl Into<String>,
        declared_names: Vec<String>,
        factory: CapabilityFactory,
    ) -> Self {
        Self {
            capability_id: capability_id.into(),
            declared_names,
            factory,
        }
    }

    /// Entry whose factory hands back clones of already-built capabilities.
    /// Declared names are taken from the capabilities themselves.
    pub fn from_capabilities(capability_id: impl Into<String>, capabilities: Vec<Arc<dyn Capability>>) -> Self {
        let declared_names = capabilities.iter().map(|c| c.name().to_string()).collect();
        let factory: CapabilityFactory = Arc::new(
            move |_: &FactoryContext| -> Result<Vec<Arc<dyn Capability>>, CapabilityError> { Ok(capabilities.clone()) },
        );
        Self::new(capability_id, declared_names, factory)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.declared_names.iter().any(|n| n == name)
    }

    /// Prefix owned by this entry. See [`capability_prefix`].
    pub fn prefix(&self) -> String {
        capability_prefix(&self.capability_id, &self.declared_names)
    }

    /// Invoke the factory with an empty context.
    pub fn instantiate(&self) -> Result<Vec<Arc<dyn Capability>>, RouterError> {
        (self.factory)(&FactoryContext::default()).map_err(|e| RouterError::Factory {
            capability_id: self.capability_id.clone(),
            message: e.to_string(),
        })
    }

    /// Instantiate and pick the capability whose own name equals `name`.
    pub fn resolve(&self, name: &str) -> Result<Option<Arc<dyn Capability>>, RouterError> {
        Ok(self.instantiate()?.into_iter().find(|c| c.name() == name))
    }
}

/// Read-only view of the host's capability catalog.
pub trait CapabilityCatalogReader: Send + Sync {
    fn entries(&self) -> Vec<CatalogEntry>;

    /// Every declared invocation name across all entries.
    fn declared_names(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .flat_map(|e| e.declared_names)
            .collect()
    }
}

/// Catalog the host populates at startup (or tests populate per case).
#[derive(Default)]
pub struct InMemoryCatalog {
    entries: RwLock<Vec<CatalogEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, entry: CatalogEntry) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    pub fn with_entry(self, entry: CatalogEntry) -> Self {
        self.add(entry);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|g| g.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CapabilityCatalogReader for InMemoryCatalog {
    fn entries(&self) -> Vec<CatalogEntry> {
        self.entries.read().map(|g| g.clone()).unwrap_or_default()
    }
}

/// `{ name, description, parameters }` triple for prompt builders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityMetadata {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl CapabilityMetadata {
    pub fn of(capability: &dyn Capability) -> Self {
        Self {
            name: capability.name().to_string(),
            description: capability.description().to_string(),
            parameters: capability.parameters(),
        }
    }
}

/// Metadata for every capability the catalog can build. Entries whose factory fails are skipped.
pub fn capability_metadata(catalog: &dyn CapabilityCatalogReader) -> Vec<CapabilityMetadata> {
    let mut out = Vec::new();
    for entry in catalog.entries() {
        match entry.instantiate() {
            Ok(caps) => out.extend(caps.iter().map(|c| CapabilityMetadata::of(c.as_ref()))),
            Err(e) => {
                tracing::warn!(
                    target: "glyph::catalog",
                    capability_id = %entry.capability_id,
                    error = %e,
                    "skipping capability metadata"
                );
            }
        }
    }
    out
}

/// Prefix owned by a capability.
///
/// - one declared name: everything up to and including its last `_`
/// - several names: their longest common prefix, cut back to its last `_`
/// - otherwise (no names, no underscore, nothing left after trimming): `capability_id + "_"`
pub fn capability_prefix(capability_id: &str, declared_names: &[String]) -> String {
    let fallback = || format!("{}_", capability_id);
    let common = match declared_names {
        [] => return fallback(),
        [only] => only.as_str(),
        [first, rest @ ..] => rest
            .iter()
            .fold(first.as_str(), |acc, name| common_prefix(acc, name)),
    };
    match common.rfind('_') {
        Some(idx) => common[..=idx].to_string(),
        None => fallback(),
    }
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let end = a
        .char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map(|((i, _), _)| i)
        .unwrap_or_else(|| a.len().min(b.len()));
    &a[..end]
}

/// Action suffix of `name` under `prefix`, if `name` starts with it and something remains.
pub fn action_suffix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    name.strip_prefix(prefix).filter(|s| !s.is_empty())
}

/// Distinct action suffixes among `names` that start with `prefix`.
pub fn observed_suffixes<'a, I>(names: I, prefix: &str) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .filter_map(|n| action_suffix(n, prefix))
        .map(str::to_string)
        .collect()
}

/// Lowercase slug: ASCII alphanumerics kept, every other run collapsed to one `_`, edges trimmed.
pub fn slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prefix_of_single_name_stops_at_last_underscore() {
        assert_eq!(capability_prefix("x", &names(&["foo_bar_baz"])), "foo_bar_");
    }

    #[test]
    fn prefix_without_names_or_underscore_falls_back_to_id() {
        assert_eq!(capability_prefix("notes", &[]), "notes_");
        assert_eq!(capability_prefix("notes", &names(&["search"])), "notes_");
    }

    #[test]
    fn prefix_of_many_names_is_trimmed_common_prefix() {
        let declared = names(&["media_search", "media_scan", "media_get_details"]);
        assert_eq!(capability_prefix("media", &declared), "media_");

        let declared = names(&["kb_query_fast", "kb_query_deep"]);
        assert_eq!(capability_prefix("kb", &declared), "kb_query_");
    }

    #[test]
    fn prefix_of_disjoint_names_falls_back_to_id() {
        let declared = names(&["alpha_run", "beta_run"]);
        assert_eq!(capability_prefix("mixed", &declared), "mixed_");
    }

    #[test]
    fn observed_suffixes_are_distinct_and_skip_bare_prefix() {
        let all = ["notes_add", "notes_list", "notes_add", "notes_", "other_add"];
        let got = observed_suffixes(all.iter().copied(), "notes_");
        assert_eq!(got.into_iter().collect::<Vec<_>>(), vec!["add", "list"]);
    }

    #[test]
    fn slug_collapses_separators() {
        assert_eq!(slug("Code-Assistant  Bridge"), "code_assistant_bridge");
        assert_eq!(slug("__weird__"), "weird");
    }

    #[test]
    fn joined_text_ignores_non_text_blocks() {
        let result = CapabilityResult {
            content: vec![
                ContentBlock::text("{\"a\":"),
                ContentBlock {
                    kind: "image".to_string(),
                    text: None,
                },
                ContentBlock::text("1}"),
            ],
        };
        assert_eq!(result.joined_text(), "{\"a\":1}");
    }
}
