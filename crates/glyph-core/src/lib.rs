//! Glyph core: route capability results to pre-built UI templates.
//!
//! Given an invocation name and/or the JSON a capability returned, the router picks a
//! [`TemplateDescriptor`] and reshapes the payload into the layout that template expects.
//! Capabilities unknown at build time are picked up by dynamic discovery over the injected
//! [`CapabilityCatalogReader`].

pub mod action_map;
pub mod artifacts;
pub mod bridge;
pub mod catalog;
pub mod config;
pub mod detect;
pub mod discovery;
mod error;
pub mod normalize;
pub mod router;
pub mod signatures;
pub mod state;

pub use action_map::{describe_actions, map_action, ActionMap, ActionMapRegistry, MappedAction};
pub use artifacts::{ArtifactStore, MAX_CANDIDATES};
pub use bridge::{execute_direct, outcome_from_text, ExecutionOutcome, FailureKind, ERROR_MARKER};
pub use catalog::{
    capability_metadata, capability_prefix, Capability, CapabilityCatalogReader, CapabilityError,
    CapabilityFactory, CapabilityMetadata, CapabilityResult, CatalogEntry, ContentBlock, FactoryContext,
    InMemoryCatalog,
};
pub use config::RouterConfig;
pub use detect::{CapabilitySuffixEntry, Detector, DEFAULT_SUFFIX_CATALOG};
pub use discovery::{discover_signatures, DynamicPrefixMap, KNOWN_PREFIXES};
pub use error::RouterError;
pub use normalize::normalize;
pub use router::{RoutedResult, SignatureRouter};
pub use signatures::{
    builtin_descriptors, is_action_covered, CoverageStatus, HintRegistry, RuntimeDataHint, SignatureKey,
    SignatureRegistry, TemplateDescriptor,
};
pub use state::RegistryState;
