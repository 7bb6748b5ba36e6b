//! Catalog manifest: a JSON file describing the capabilities a host would expose, so the probe can
//! exercise discovery and action descriptions without the real capabilities.
//!
//! ```json
//! { "capabilities": [
//!     { "capabilityId": "notes", "tools": [
//!         { "name": "notes_add", "description": "Add a note.", "parameters": { "type": "object" } }
//!     ] }
//! ] }
//! ```

use async_trait::async_trait;
use glyph_core::{Capability, CapabilityError, CapabilityResult, CatalogEntry, InMemoryCatalog, ERROR_MARKER};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct CatalogManifest {
    #[serde(default)]
    pub capabilities: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub capability_id: String,
    #[serde(default)]
    pub tools: Vec<ManifestTool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_schema")]
    pub parameters: Value,
}

fn empty_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Stand-in for a manifest tool. Metadata only; executing it reports an error.
struct StubCapability(ManifestTool);

#[async_trait]
impl Capability for StubCapability {
    fn name(&self) -> &str {
        &self.0.name
    }

    fn description(&self) -> &str {
        &self.0.description
    }

    fn parameters(&self) -> Value {
        self.0.parameters.clone()
    }

    async fn execute(&self, _call_id: &str, _params: Value) -> Result<CapabilityResult, CapabilityError> {
        Ok(CapabilityResult::text(format!("{}{} is a probe stub", ERROR_MARKER, self.0.name)))
    }
}

impl CatalogManifest {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text)?)
    }

    pub fn into_catalog(self) -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        for entry in self.capabilities {
            let caps: Vec<Arc<dyn Capability>> = entry
                .tools
                .into_iter()
                .map(|t| Arc::new(StubCapability(t)) as Arc<dyn Capability>)
                .collect();
            catalog.add(CatalogEntry::from_capabilities(entry.capability_id, caps));
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyph_core::CapabilityCatalogReader;

    #[test]
    fn manifest_builds_declared_names() {
        let manifest = CatalogManifest::parse(
            r#"{ "capabilities": [
                { "capabilityId": "notes", "tools": [ { "name": "notes_add" }, { "name": "notes_list" } ] },
                { "capabilityId": "empty" }
            ] }"#,
        )
        .expect("parse");
        let catalog = manifest.into_catalog();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.declared_names(), vec!["notes_add", "notes_list"]);
        assert_eq!(catalog.entries()[0].prefix(), "notes_");
    }

    #[test]
    fn missing_fields_fail_to_parse() {
        assert!(CatalogManifest::parse(r#"{ "capabilities": [ { "tools": [] } ] }"#).is_err());
    }
}
