//! Signature registry: `(family, signature_id) → TemplateDescriptor`, plus runtime data hints.
//!
//! A descriptor names the pre-built template that renders a capability result. The registry is
//! bootstrapped with the hand-authored templates below; dynamic discovery adds `system_auto_*`
//! descriptors at runtime.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

/// Action every descriptor supports whether or not it declares it.
pub const REFRESH_ACTION: &str = "refresh";

/// Identifiers of the built-in families and signatures.
pub mod builtin {
    pub const FINANCE: &str = "finance";
    pub const DATA: &str = "data";
    pub const FILESYSTEM: &str = "filesystem";
    pub const MEDIA: &str = "media";
    pub const WORKSPACE: &str = "workspace";
    pub const TRAVEL: &str = "travel";
    pub const MEAL: &str = "meal";
    pub const PACKAGES: &str = "packages";

    pub const RANKED_LIST: &str = "finance_ranked_list";
    pub const TICKER_DETAIL: &str = "finance_ticker_detail";
    pub const MARKET_SNAPSHOT: &str = "finance_market_snapshot";
    pub const ROUTINE_REPORT: &str = "finance_routine_report";
    pub const ROUTINE_INSPECTOR: &str = "finance_routine_inspector";
    pub const TABLE_EXPLORER: &str = "data_table_explorer";
    pub const FILESYSTEM_LISTING: &str = "filesystem_listing";
    pub const MEDIA_GALLERY: &str = "media_gallery";
    pub const WORKSPACE_OVERVIEW: &str = "workspace_overview";
    pub const TRAVEL_ITINERARY: &str = "travel_itinerary";
    pub const MEAL_PLAN: &str = "meal_plan";
    pub const PACKAGE_CATALOG: &str = "package_catalog";

    /// Prefix of every signature synthesized by dynamic discovery.
    pub const SYSTEM_AUTO_PREFIX: &str = "system_auto_";
}

/// Whether a signature's action set is considered complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageStatus {
    Covered,
    Partial,
}

/// Identity of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureKey {
    pub family: String,
    pub signature_id: String,
}

impl SignatureKey {
    pub fn new(family: impl Into<String>, signature_id: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            signature_id: signature_id.into(),
        }
    }
}

/// Which template renders a result, and which actions that template can trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDescriptor {
    pub family: String,
    pub signature_id: String,
    pub template_id: String,
    #[serde(default)]
    pub supported_actions: BTreeSet<String>,
    pub coverage_status: CoverageStatus,
}

impl TemplateDescriptor {
    pub fn new<I, S>(
        family: impl Into<String>,
        signature_id: impl Into<String>,
        template_id: impl Into<String>,
        supported_actions: I,
        coverage_status: CoverageStatus,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            family: family.into(),
            signature_id: signature_id.into(),
            template_id: template_id.into(),
            supported_actions: supported_actions.into_iter().map(Into::into).collect(),
            coverage_status,
        }
    }

    pub fn key(&self) -> SignatureKey {
        SignatureKey::new(self.family.clone(), self.signature_id.clone())
    }

    pub fn is_system_auto(&self) -> bool {
        self.signature_id.starts_with(builtin::SYSTEM_AUTO_PREFIX)
    }

    pub fn is_action_covered(&self, action: &str) -> bool {
        is_action_covered(self, action)
    }
}

/// True when `action` is declared by the descriptor or is `"refresh"`.
pub fn is_action_covered(descriptor: &TemplateDescriptor, action: &str) -> bool {
    action == REFRESH_ACTION || descriptor.supported_actions.contains(action)
}

/// The hand-authored templates shipped with the router.
pub fn builtin_descriptors() -> Vec<TemplateDescriptor> {
    use builtin::*;
    use CoverageStatus::{Covered, Partial};
    vec![
        TemplateDescriptor::new(FINANCE, RANKED_LIST, "RankedPicksTable", ["scan", "predict", "top_picks", "sort"], Covered),
        TemplateDescriptor::new(FINANCE, TICKER_DETAIL, "TickerDetailCard", ["analyze_ticker", "quote", "watch"], Covered),
        TemplateDescriptor::new(FINANCE, MARKET_SNAPSHOT, "MarketRegimeSnapshot", ["market_regime", "regime_history"], Covered),
        TemplateDescriptor::new(FINANCE, ROUTINE_REPORT, "RoutineExecutionReport", ["run_routine", "routine_status", "rerun"], Covered),
        TemplateDescriptor::new(FINANCE, ROUTINE_INSPECTOR, "RoutineInspector", ["inspect_routine", "routine_logs"], Partial),
        TemplateDescriptor::new(DATA, TABLE_EXPLORER, "TableExplorer", ["filter", "sort", "export"], Partial),
        TemplateDescriptor::new(FILESYSTEM, FILESYSTEM_LISTING, "FileBrowser", ["list_directory", "read_file", "search_files", "open"], Covered),
        TemplateDescriptor::new(MEDIA, MEDIA_GALLERY, "MediaGallery", ["search", "browse", "get_details", "list_collections"], Covered),
        TemplateDescriptor::new(WORKSPACE, WORKSPACE_OVERVIEW, "WorkspaceOverview", ["inspect", "git_status", "list_projects"], Partial),
        TemplateDescriptor::new(TRAVEL, TRAVEL_ITINERARY, "TravelItinerary", ["research", "attractions", "weather", "plan_trip"], Covered),
        TemplateDescriptor::new(MEAL, MEAL_PLAN, "MealPlanner", ["plan_week", "find_recipes", "shopping_list", "swap_meal"], Covered),
        TemplateDescriptor::new(PACKAGES, PACKAGE_CATALOG, "PackageCatalog", ["search", "install", "info", "list_installed"], Covered),
    ]
}

/// Upsert-by-identity store of template descriptors.
#[derive(Debug, Default)]
pub struct SignatureRegistry {
    entries: RwLock<BTreeMap<SignatureKey, TemplateDescriptor>>,
}

impl SignatureRegistry {
    /// Empty registry (no built-ins).
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in descriptors loaded.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.bootstrap();
        registry
    }

    /// Load the built-in descriptors. Re-running overwrites them with identical data.
    pub fn bootstrap(&self) {
        for descriptor in builtin_descriptors() {
            self.register(descriptor);
        }
    }

    pub fn register(&self, descriptor: TemplateDescriptor) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(descriptor.key(), descriptor);
    }

    pub fn get(&self, family: &str, signature_id: &str) -> Option<TemplateDescriptor> {
        self.get_key(&SignatureKey::new(family, signature_id))
    }

    pub fn get_key(&self, key: &SignatureKey) -> Option<TemplateDescriptor> {
        self.entries.read().ok()?.get(key).cloned()
    }

    /// All descriptors ordered by `(family, signature_id)`.
    pub fn list_all(&self) -> Vec<TemplateDescriptor> {
        self.entries
            .read()
            .map(|g| g.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns true iff the descriptor existed.
    pub fn unregister(&self, family: &str, signature_id: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&SignatureKey::new(family, signature_id))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|g| g.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Last-resort shape rule: matches when every required key is a top-level key of the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeDataHint {
    pub family: String,
    pub signature_id: String,
    pub required_keys: Vec<String>,
}

impl RuntimeDataHint {
    pub fn new<I, S>(family: impl Into<String>, signature_id: impl Into<String>, required_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            family: family.into(),
            signature_id: signature_id.into(),
            required_keys: required_keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn key(&self) -> SignatureKey {
        SignatureKey::new(self.family.clone(), self.signature_id.clone())
    }

    pub fn matches(&self, object: &Map<String, Value>) -> bool {
        self.required_keys.iter().all(|k| object.contains_key(k))
    }
}

/// Ordered list of runtime hints. First registered hint wins during matching.
#[derive(Debug, Default)]
pub struct HintRegistry {
    hints: RwLock<Vec<RuntimeDataHint>>,
}

impl HintRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the hint. Returns false (and stores nothing) for an empty key list or an exact duplicate.
    pub fn register(&self, hint: RuntimeDataHint) -> bool {
        if hint.required_keys.is_empty() {
            return false;
        }
        let mut guard = self.hints.write().unwrap_or_else(PoisonError::into_inner);
        if guard.contains(&hint) {
            return false;
        }
        guard.push(hint);
        true
    }

    /// Removes every hint for the signature; returns how many were removed.
    pub fn unregister(&self, family: &str, signature_id: &str) -> usize {
        let mut guard = self.hints.write().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|h| !(h.family == family && h.signature_id == signature_id));
        before - guard.len()
    }

    pub fn hints(&self) -> Vec<RuntimeDataHint> {
        self.hints.read().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn first_match(&self, object: &Map<String, Value>) -> Option<SignatureKey> {
        self.hints
            .read()
            .ok()?
            .iter()
            .find(|h| h.matches(object))
            .map(RuntimeDataHint::key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bootstrap_is_idempotent() {
        let registry = SignatureRegistry::with_builtins();
        let count = registry.len();
        assert_eq!(count, builtin_descriptors().len());
        registry.bootstrap();
        assert_eq!(registry.len(), count);
    }

    #[test]
    fn register_upserts_and_unregister_reports_existence() {
        let registry = SignatureRegistry::new();
        registry.register(TemplateDescriptor::new("f", "s", "A", ["x"], CoverageStatus::Partial));
        registry.register(TemplateDescriptor::new("f", "s", "B", ["y"], CoverageStatus::Covered));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("f", "s").unwrap().template_id, "B");
        assert!(registry.unregister("f", "s"));
        assert!(!registry.unregister("f", "s"));
    }

    #[test]
    fn refresh_is_always_covered() {
        for descriptor in builtin_descriptors() {
            assert!(!descriptor.supported_actions.contains(REFRESH_ACTION));
            assert!(is_action_covered(&descriptor, REFRESH_ACTION));
        }
        let bare = TemplateDescriptor::new("f", "s", "T", Vec::<String>::new(), CoverageStatus::Partial);
        assert!(bare.is_action_covered("refresh"));
        assert!(!bare.is_action_covered("delete"));
    }

    #[test]
    fn hints_reject_empty_and_duplicates() {
        let hints = HintRegistry::new();
        assert!(!hints.register(RuntimeDataHint::new("f", "s", Vec::<String>::new())));
        assert!(hints.register(RuntimeDataHint::new("f", "s", ["a", "b"])));
        assert!(!hints.register(RuntimeDataHint::new("f", "s", ["a", "b"])));
        // same keys in a different order are a distinct hint
        assert!(hints.register(RuntimeDataHint::new("f", "s", ["b", "a"])));
        assert_eq!(hints.hints().len(), 2);
        assert_eq!(hints.unregister("f", "s"), 2);
    }

    #[test]
    fn first_registered_hint_wins() {
        let hints = HintRegistry::new();
        hints.register(RuntimeDataHint::new("one", "first", ["id"]));
        hints.register(RuntimeDataHint::new("two", "second", ["id", "score"]));
        let payload = json!({ "id": 1, "score": 2 });
        let key = hints.first_match(payload.as_object().unwrap()).unwrap();
        assert_eq!(key.signature_id, "first");
    }
}
