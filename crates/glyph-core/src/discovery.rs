//! Dynamic signature discovery.
//!
//! Every capability prefix in the host catalog that has no hand-written detection rule gets a
//! synthesized `system_auto_*` signature, so results from capabilities unknown at build time still
//! route to a usable template instead of falling through to "no match".

use crate::catalog::{observed_suffixes, slug, CapabilityCatalogReader};
use crate::signatures::{builtin::SYSTEM_AUTO_PREFIX, CoverageStatus, SignatureKey, TemplateDescriptor};
use crate::state::RegistryState;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Prefixes covered by hand-written rules in [`crate::detect`]; discovery never maps these.
pub const KNOWN_PREFIXES: &[&str] = &[
    "finance_",
    "fs_",
    "media_",
    "workspace_",
    "travel_",
    "city_",
    "meal_",
    "skill_",
    "package_",
];

pub fn is_known_prefix(prefix: &str) -> bool {
    KNOWN_PREFIXES.contains(&prefix)
}

/// `prefix → signature` for discovered capabilities. First registration wins.
#[derive(Debug, Default)]
pub struct DynamicPrefixMap {
    map: RwLock<HashMap<String, SignatureKey>>,
}

impl DynamicPrefixMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the mapping unless the prefix is known or already mapped. Returns whether it was stored.
    pub fn insert_if_absent(&self, prefix: &str, key: SignatureKey) -> bool {
        if is_known_prefix(prefix) {
            return false;
        }
        let mut guard = self.map.write().unwrap_or_else(PoisonError::into_inner);
        if guard.contains_key(prefix) {
            return false;
        }
        guard.insert(prefix.to_string(), key);
        true
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.map.read().map(|g| g.contains_key(prefix)).unwrap_or(false)
    }

    /// Mapping for the longest registered prefix that `name` starts with.
    pub fn longest_match(&self, name: &str) -> Option<SignatureKey> {
        let guard = self.map.read().ok()?;
        guard
            .iter()
            .filter(|(prefix, _)| name.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, key)| key.clone())
    }

    /// Snapshot sorted by prefix.
    pub fn entries(&self) -> Vec<(String, SignatureKey)> {
        let mut out: Vec<(String, SignatureKey)> = self
            .map
            .read()
            .map(|g| g.iter().map(|(p, k)| (p.clone(), k.clone())).collect())
            .unwrap_or_default();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn len(&self) -> usize {
        self.map.read().map(|g| g.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Family synthesized for a discovered capability.
pub fn auto_family(capability_id: &str) -> String {
    format!("system_{}", slug(capability_id))
}

/// Signature id synthesized for a discovered prefix (trailing `_` dropped before slugging).
pub fn auto_signature_id(prefix: &str) -> String {
    let bare = prefix.strip_suffix('_').unwrap_or(prefix);
    format!("{}{}", SYSTEM_AUTO_PREFIX, slug(bare))
}

/// Scan the catalog and register a signature for every new, unknown prefix that has at least one
/// observed action suffix. Cheap and idempotent for prefixes already handled.
/// Returns the descriptors created by this pass.
pub fn discover_signatures(
    state: &RegistryState,
    catalog: &dyn CapabilityCatalogReader,
    template_id: &str,
) -> Vec<TemplateDescriptor> {
    let entries = catalog.entries();
    let all_names: Vec<&str> = entries
        .iter()
        .flat_map(|e| e.declared_names.iter().map(String::as_str))
        .collect();

    let mut created = Vec::new();
    for entry in &entries {
        let prefix = entry.prefix();
        if is_known_prefix(&prefix) || state.dynamic_prefixes.contains(&prefix) {
            continue;
        }
        let suffixes = observed_suffixes(all_names.iter().copied(), &prefix);
        if suffixes.is_empty() {
            tracing::trace!(
                target: "glyph::discovery",
                capability_id = %entry.capability_id,
                prefix = %prefix,
                "no action suffixes observed; skipping"
            );
            continue;
        }
        let descriptor = TemplateDescriptor::new(
            auto_family(&entry.capability_id),
            auto_signature_id(&prefix),
            template_id,
            suffixes,
            CoverageStatus::Covered,
        );
        if !state.dynamic_prefixes.insert_if_absent(&prefix, descriptor.key()) {
            continue;
        }
        state.signatures.register(descriptor.clone());
        tracing::info!(
            target: "glyph::discovery",
            capability_id = %entry.capability_id,
            prefix = %prefix,
            signature_id = %descriptor.signature_id,
            actions = descriptor.supported_actions.len(),
            "registered dynamic signature"
        );
        created.push(descriptor);
    }
    created
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Capability, CapabilityError, CapabilityFactory, CatalogEntry, FactoryContext, InMemoryCatalog};
    use std::sync::Arc;

    fn entry(id: &str, names: &[&str]) -> CatalogEntry {
        let factory: CapabilityFactory =
            Arc::new(|_: &FactoryContext| -> Result<Vec<Arc<dyn Capability>>, CapabilityError> { Ok(Vec::new()) });
        CatalogEntry::new(id, names.iter().map(|s| s.to_string()).collect(), factory)
    }

    #[test]
    fn discovers_unknown_prefix_once() {
        let state = RegistryState::new();
        let catalog = InMemoryCatalog::new()
            .with_entry(entry("Topic Research", &["research_topic_search", "research_topic_summarize"]));

        let created = discover_signatures(&state, &catalog, "SystemAutoTable");
        assert_eq!(created.len(), 1);
        let d = &created[0];
        assert_eq!(d.family, "system_topic_research");
        assert_eq!(d.signature_id, "system_auto_research_topic");
        assert_eq!(d.coverage_status, CoverageStatus::Covered);
        assert!(d.supported_actions.contains("search"));
        assert!(d.supported_actions.contains("summarize"));
        assert!(state.signatures.get(&d.family, &d.signature_id).is_some());

        assert!(discover_signatures(&state, &catalog, "SystemAutoTable").is_empty());
        assert_eq!(state.dynamic_prefixes.len(), 1);
    }

    #[test]
    fn known_prefixes_are_never_mapped() {
        let state = RegistryState::new();
        let catalog = InMemoryCatalog::new().with_entry(entry("fs", &["fs_list_directory", "fs_read_file"]));
        assert!(discover_signatures(&state, &catalog, "SystemAutoTable").is_empty());
        assert!(state.dynamic_prefixes.is_empty());
    }

    #[test]
    fn prefix_without_suffixes_is_skipped() {
        let state = RegistryState::new();
        let catalog = InMemoryCatalog::new().with_entry(entry("bare", &[]));
        assert!(discover_signatures(&state, &catalog, "SystemAutoTable").is_empty());
    }

    #[test]
    fn first_mapping_wins_and_longest_prefix_matches() {
        let map = DynamicPrefixMap::new();
        assert!(map.insert_if_absent("notes_", SignatureKey::new("a", "one")));
        assert!(!map.insert_if_absent("notes_", SignatureKey::new("b", "two")));
        assert!(map.insert_if_absent("notes_deep_", SignatureKey::new("c", "three")));
        assert!(!map.insert_if_absent("fs_", SignatureKey::new("d", "four")));

        assert_eq!(map.longest_match("notes_deep_search").unwrap().signature_id, "three");
        assert_eq!(map.longest_match("notes_add").unwrap().signature_id, "one");
        assert!(map.longest_match("other_add").is_none());
    }
}
