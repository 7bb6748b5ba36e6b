//! All mutable router state in one place, passed by reference into detection and execution.

use crate::action_map::ActionMapRegistry;
use crate::artifacts::ArtifactStore;
use crate::config::RouterConfig;
use crate::discovery::DynamicPrefixMap;
use crate::signatures::{HintRegistry, SignatureRegistry};

pub struct RegistryState {
    pub signatures: SignatureRegistry,
    pub hints: HintRegistry,
    pub action_maps: ActionMapRegistry,
    pub dynamic_prefixes: DynamicPrefixMap,
    pub artifacts: ArtifactStore,
}

impl RegistryState {
    /// State with the built-in signatures loaded.
    pub fn new() -> Self {
        Self::from_config(&RouterConfig::default())
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            signatures: SignatureRegistry::with_builtins(),
            hints: HintRegistry::new(),
            action_maps: ActionMapRegistry::new(),
            dynamic_prefixes: DynamicPrefixMap::new(),
            artifacts: ArtifactStore::with_candidate_cap(config.candidate_cap),
        }
    }

    /// State with no signatures at all. Useful for isolated fixtures.
    pub fn empty() -> Self {
        Self {
            signatures: SignatureRegistry::new(),
            hints: HintRegistry::new(),
            action_maps: ActionMapRegistry::new(),
            dynamic_prefixes: DynamicPrefixMap::new(),
            artifacts: ArtifactStore::new(),
        }
    }
}

impl Default for RegistryState {
    fn default() -> Self {
        Self::new()
    }
}
