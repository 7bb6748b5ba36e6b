//! `SignatureRouter`: one handle over registry state, the host catalog and configuration.
//!
//! Embedders that prefer free functions can use [`crate::detect::Detector`], [`crate::normalize`]
//! and [`crate::bridge`] directly against their own [`RegistryState`].

use crate::action_map::{self, ActionMap, MappedAction};
use crate::bridge::{self, ExecutionOutcome};
use crate::catalog::{capability_metadata, CapabilityCatalogReader, CapabilityMetadata};
use crate::config::RouterConfig;
use crate::detect::{CapabilitySuffixEntry, Detector, DEFAULT_SUFFIX_CATALOG};
use crate::discovery::discover_signatures;
use crate::normalize::normalize;
use crate::signatures::TemplateDescriptor;
use crate::state::RegistryState;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Descriptor picked for a result and the payload reshaped for its template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedResult {
    pub descriptor: TemplateDescriptor,
    pub payload: Value,
}

pub struct SignatureRouter {
    state: Arc<RegistryState>,
    catalog: Arc<dyn CapabilityCatalogReader>,
    suffix_catalog: Vec<CapabilitySuffixEntry>,
    config: RouterConfig,
}

impl SignatureRouter {
    pub fn new(catalog: Arc<dyn CapabilityCatalogReader>) -> Self {
        Self::with_config(catalog, RouterConfig::default())
    }

    pub fn with_config(catalog: Arc<dyn CapabilityCatalogReader>, config: RouterConfig) -> Self {
        let config = config.sanitized();
        Self {
            state: Arc::new(RegistryState::from_config(&config)),
            catalog,
            suffix_catalog: DEFAULT_SUFFIX_CATALOG.clone(),
            config,
        }
    }

    /// Share existing state (e.g. one state for several routers over different catalogs).
    pub fn with_state(mut self, state: Arc<RegistryState>) -> Self {
        self.state = state;
        self
    }

    /// Replace the default capability-suffix catalog.
    pub fn with_suffix_catalog(mut self, entries: Vec<CapabilitySuffixEntry>) -> Self {
        self.suffix_catalog = entries;
        self
    }

    pub fn state(&self) -> &RegistryState {
        &self.state
    }

    pub fn shared_state(&self) -> Arc<RegistryState> {
        Arc::clone(&self.state)
    }

    pub fn catalog(&self) -> &dyn CapabilityCatalogReader {
        self.catalog.as_ref()
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn detector(&self) -> Detector<'_> {
        Detector::new(&self.state, self.catalog.as_ref(), &self.suffix_catalog, &self.config)
    }

    /// Run discovery now instead of waiting for the next detection call.
    pub fn discover(&self) -> Vec<TemplateDescriptor> {
        discover_signatures(&self.state, self.catalog.as_ref(), &self.config.auto_template_id)
    }

    pub fn by_tool_name(&self, name: &str) -> Option<TemplateDescriptor> {
        self.detector().by_tool_name(name)
    }

    pub fn by_data_shape(&self, payload: &Value) -> Option<TemplateDescriptor> {
        self.detector().by_data_shape(payload)
    }

    pub fn infer(&self, name: Option<&str>, payload: Option<&Value>) -> Option<TemplateDescriptor> {
        self.detector().infer(name, payload)
    }

    /// Detect, then normalize. `None` means the generative fallback renderer should take over.
    pub fn route(&self, name: Option<&str>, payload: Option<&Value>) -> Option<RoutedResult> {
        let descriptor = self.infer(name, payload)?;
        let empty = Value::Object(Map::new());
        let payload = normalize(&descriptor, payload.unwrap_or(&empty));
        tracing::debug!(
            target: "glyph::detect",
            tool = name.unwrap_or_default(),
            family = %descriptor.family,
            signature_id = %descriptor.signature_id,
            template_id = %descriptor.template_id,
            "routed"
        );
        Some(RoutedResult { descriptor, payload })
    }

    pub fn register_action_map(&self, map: Arc<dyn ActionMap>) -> Option<Arc<dyn ActionMap>> {
        self.state.action_maps.register(map)
    }

    pub fn map_action(&self, tool_name: &str, action: &str, payload: &Value, card_data: &Value) -> Option<MappedAction> {
        action_map::map_action(&self.state.action_maps, tool_name, action, payload, card_data)
    }

    pub fn describe_actions(&self, tool_name: &str) -> String {
        action_map::describe_actions(&self.state.action_maps, self.catalog.as_ref(), tool_name)
    }

    pub fn capability_metadata(&self) -> Vec<CapabilityMetadata> {
        capability_metadata(self.catalog.as_ref())
    }

    pub async fn execute_direct(&self, name: &str, params: Value) -> ExecutionOutcome {
        bridge::execute_direct(&self.state, self.catalog.as_ref(), name, params).await
    }
}
