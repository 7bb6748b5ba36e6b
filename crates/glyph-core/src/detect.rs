//! Detection engine: pick a template descriptor from an invocation name, a payload, or both.
//!
//! Every public entry point re-scans the catalog first (see [`crate::discovery`]).
//! `by_tool_name` tries, in order: hand-written prefix rules, the capability-suffix fallback, and the
//! discovered prefix map (longest prefix wins). `by_data_shape` tries structural predicates in a fixed
//! order, then runtime hints. `infer` combines both; within one family the payload shape refines the
//! name (the same tool can return a list or a detail view).

use crate::catalog::{observed_suffixes, CapabilityCatalogReader};
use crate::config::RouterConfig;
use crate::discovery::discover_signatures;
use crate::signatures::{builtin::*, SignatureKey, TemplateDescriptor};
use crate::state::RegistryState;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A known signature described by the action suffixes its capability exposes. A capability under an
/// unrelated prefix that exposes enough of these suffixes borrows the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySuffixEntry {
    pub family: String,
    pub signature_id: String,
    /// Canonical invocation name of the hand-authored capability behind this signature.
    pub fallback_name: String,
    pub action_suffixes: Vec<String>,
}

impl CapabilitySuffixEntry {
    pub fn new(family: &str, signature_id: &str, fallback_name: &str, action_suffixes: &[&str]) -> Self {
        Self {
            family: family.to_string(),
            signature_id: signature_id.to_string(),
            fallback_name: fallback_name.to_string(),
            action_suffixes: action_suffixes.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn key(&self) -> SignatureKey {
        SignatureKey::new(self.family.clone(), self.signature_id.clone())
    }
}

pub static DEFAULT_SUFFIX_CATALOG: Lazy<Vec<CapabilitySuffixEntry>> = Lazy::new(|| {
    vec![
        CapabilitySuffixEntry::new(FILESYSTEM, FILESYSTEM_LISTING, "fs_list_directory", &["list_directory", "read_file", "search_files", "file_info"]),
        CapabilitySuffixEntry::new(MEDIA, MEDIA_GALLERY, "media_search", &["search", "browse", "get_details", "list_collections"]),
        CapabilitySuffixEntry::new(MEAL, MEAL_PLAN, "meal_plan_week", &["plan_week", "find_recipes", "shopping_list"]),
        CapabilitySuffixEntry::new(PACKAGES, PACKAGE_CATALOG, "package_search", &["search", "install", "info", "list_installed"]),
        CapabilitySuffixEntry::new(TRAVEL, TRAVEL_ITINERARY, "city_research", &["research", "attractions", "weather", "plan_trip"]),
        CapabilitySuffixEntry::new(WORKSPACE, WORKSPACE_OVERVIEW, "workspace_inspect", &["inspect", "git_status", "list_projects"]),
    ]
});

/// Single-signature families keyed by invocation-name prefix. Evaluated after the finance rule.
const PREFIX_RULES: &[(&str, &str, &str)] = &[
    ("fs_", FILESYSTEM, FILESYSTEM_LISTING),
    ("media_", MEDIA, MEDIA_GALLERY),
    ("workspace_", WORKSPACE, WORKSPACE_OVERVIEW),
    ("travel_", TRAVEL, TRAVEL_ITINERARY),
    ("city_", TRAVEL, TRAVEL_ITINERARY),
    ("meal_", MEAL, MEAL_PLAN),
    ("skill_", PACKAGES, PACKAGE_CATALOG),
    ("package_", PACKAGES, PACKAGE_CATALOG),
];

const FINANCE_PREFIX: &str = "finance_";
const RANKED_ARRAY_FIELDS: &[&str] = &["top_picks", "picks", "predictions"];
const NAMED_LIST_FIELDS: &[&str] = &["items", "entries", "files"];

/// Hand-written name rules. Pure: depends on `name` only.
pub fn tool_name_rule(name: &str) -> Option<(&'static str, &'static str)> {
    if let Some(rest) = name.strip_prefix(FINANCE_PREFIX) {
        let rest = rest.to_ascii_lowercase();
        let signature = if rest.contains("regime") {
            MARKET_SNAPSHOT
        } else if rest.contains("routine") {
            ROUTINE_REPORT
        } else {
            RANKED_LIST
        };
        return Some((FINANCE, signature));
    }
    PREFIX_RULES
        .iter()
        .find(|(prefix, _, _)| name.starts_with(prefix))
        .map(|(_, family, signature)| (*family, *signature))
}

/// Built-in structural predicates, in priority order. Pure: depends on `payload` only.
pub fn data_shape_rule(payload: &Value) -> Option<(&'static str, &'static str)> {
    if let Value::Array(items) = payload {
        return all_named(items).then_some((FILESYSTEM, FILESYSTEM_LISTING));
    }
    let obj = payload.as_object()?;

    if NAMED_LIST_FIELDS
        .iter()
        .any(|f| array_field(obj, f).is_some_and(|a| all_named(a)))
    {
        return Some((FILESYSTEM, FILESYSTEM_LISTING));
    }
    if obj.contains_key("single_ticker_data") {
        return Some((FINANCE, TICKER_DETAIL));
    }
    if RANKED_ARRAY_FIELDS.iter().any(|f| array_field(obj, f).is_some()) {
        return Some((FINANCE, RANKED_LIST));
    }
    if obj.contains_key("ticker") {
        return Some((FINANCE, TICKER_DETAIL));
    }
    if obj.contains_key("regime") || obj.contains_key("regimeConfidence") {
        return Some((FINANCE, MARKET_SNAPSHOT));
    }
    let has_steps = obj.contains_key("steps");
    if has_steps && (obj.contains_key("status") || obj.contains_key("routine")) {
        return Some((FINANCE, ROUTINE_REPORT));
    }
    if obj.contains_key("rows") && obj.contains_key("columns") {
        return Some((DATA, TABLE_EXPLORER));
    }
    if has_steps && (obj.contains_key("logs") || obj.contains_key("failure")) {
        return Some((FINANCE, ROUTINE_INSPECTOR));
    }
    if obj.contains_key("gallery") || array_field(obj, "media").is_some() || obj.contains_key("albums") {
        return Some((MEDIA, MEDIA_GALLERY));
    }
    if obj.contains_key("workspace_root") || array_field(obj, "projects").is_some() {
        return Some((WORKSPACE, WORKSPACE_OVERVIEW));
    }
    if obj.contains_key("itinerary") || (obj.contains_key("city") && obj.contains_key("attractions")) {
        return Some((TRAVEL, TRAVEL_ITINERARY));
    }
    if ["meals", "meal_plan", "recipes"].iter().any(|k| obj.contains_key(*k)) {
        return Some((MEAL, MEAL_PLAN));
    }
    if array_field(obj, "packages").is_some() || array_field(obj, "skills").is_some() {
        return Some((PACKAGES, PACKAGE_CATALOG));
    }
    None
}

fn array_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Vec<Value>> {
    obj.get(key).and_then(Value::as_array)
}

/// Non-empty array whose elements are all objects carrying a `name` key.
fn all_named(items: &[Value]) -> bool {
    !items.is_empty()
        && items
            .iter()
            .all(|v| v.as_object().is_some_and(|o| o.contains_key("name")))
}

/// Borrowed view over router state used for one detection call.
pub struct Detector<'a> {
    state: &'a RegistryState,
    catalog: &'a dyn CapabilityCatalogReader,
    suffix_catalog: &'a [CapabilitySuffixEntry],
    config: &'a RouterConfig,
}

impl<'a> Detector<'a> {
    pub fn new(
        state: &'a RegistryState,
        catalog: &'a dyn CapabilityCatalogReader,
        suffix_catalog: &'a [CapabilitySuffixEntry],
        config: &'a RouterConfig,
    ) -> Self {
        Self {
            state,
            catalog,
            suffix_catalog,
            config,
        }
    }

    fn lookup(&self, family: &str, signature_id: &str) -> Option<TemplateDescriptor> {
        self.state.signatures.get(family, signature_id)
    }

    fn refresh_discovery(&self) {
        if self.config.discovery_enabled {
            discover_signatures(self.state, self.catalog, &self.config.auto_template_id);
        }
    }

    pub fn by_tool_name(&self, name: &str) -> Option<TemplateDescriptor> {
        self.refresh_discovery();
        self.match_tool_name(name)
    }

    fn match_tool_name(&self, name: &str) -> Option<TemplateDescriptor> {
        if let Some(d) = tool_name_rule(name).and_then(|(f, s)| self.lookup(f, s)) {
            tracing::trace!(target: "glyph::detect", name = %name, signature_id = %d.signature_id, "name rule");
            return Some(d);
        }
        if let Some(d) = self.suffix_fallback(name) {
            return Some(d);
        }
        let key = self.state.dynamic_prefixes.longest_match(name)?;
        let d = self.state.signatures.get_key(&key)?;
        tracing::trace!(target: "glyph::detect", name = %name, signature_id = %d.signature_id, "dynamic prefix");
        Some(d)
    }

    /// Let a foreign prefix borrow a known signature when its capability exposes enough of that
    /// signature's action suffixes.
    fn suffix_fallback(&self, name: &str) -> Option<TemplateDescriptor> {
        let entries = self.catalog.entries();
        let owner = entries.iter().find(|e| e.declares(name))?;
        let prefix = owner.prefix();
        let observed = observed_suffixes(
            entries
                .iter()
                .flat_map(|e| e.declared_names.iter().map(String::as_str)),
            &prefix,
        );
        if observed.is_empty() {
            return None;
        }

        for candidate in self.suffix_catalog {
            let needed = self
                .config
                .suffix_min_matches
                .min(candidate.action_suffixes.len())
                .max(1);
            let hits = candidate
                .action_suffixes
                .iter()
                .filter(|s| observed.contains(s.as_str()))
                .count();
            if hits < needed {
                continue;
            }
            if let Some(d) = self.state.signatures.get_key(&candidate.key()) {
                tracing::debug!(
                    target: "glyph::detect",
                    name = %name,
                    prefix = %prefix,
                    fallback_name = %candidate.fallback_name,
                    hits,
                    "capability-suffix fallback"
                );
                return Some(d);
            }
        }
        None
    }

    pub fn by_data_shape(&self, payload: &Value) -> Option<TemplateDescriptor> {
        self.refresh_discovery();
        self.match_data_shape(payload)
    }

    fn match_data_shape(&self, payload: &Value) -> Option<TemplateDescriptor> {
        if let Some(d) = data_shape_rule(payload).and_then(|(f, s)| self.lookup(f, s)) {
            return Some(d);
        }
        let key = self.state.hints.first_match(payload.as_object()?)?;
        self.state.signatures.get_key(&key)
    }

    pub fn infer(&self, name: Option<&str>, payload: Option<&Value>) -> Option<TemplateDescriptor> {
        self.refresh_discovery();
        let from_tool = name.and_then(|n| self.match_tool_name(n));
        match (from_tool, payload) {
            (Some(tool), Some(payload)) => match self.match_data_shape(payload) {
                Some(data) if data.family == tool.family && data.signature_id != tool.signature_id => {
                    tracing::trace!(
                        target: "glyph::detect",
                        from = %tool.signature_id,
                        to = %data.signature_id,
                        "payload shape refined signature"
                    );
                    Some(data)
                }
                _ => Some(tool),
            },
            (Some(tool), None) => Some(tool),
            (None, payload) => payload.and_then(|p| self.match_data_shape(p)),
        }
    }
}
