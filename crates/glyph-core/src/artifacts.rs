//! Generated-artifact store: generated capability executors, generated template source and
//! candidate templates per signature.

use crate::catalog::Capability;
use crate::signatures::{SignatureKey, TemplateDescriptor};
use dashmap::DashMap;
use std::sync::Arc;

/// Hard ceiling on candidate templates kept per signature.
pub const MAX_CANDIDATES: usize = 5;

pub struct ArtifactStore {
    /// invocation name -> generated executor
    executors: DashMap<String, Arc<dyn Capability>>,
    /// signature_id -> template source
    templates: DashMap<String, String>,
    candidates: DashMap<SignatureKey, Vec<String>>,
    candidate_cap: usize,
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::with_candidate_cap(MAX_CANDIDATES)
    }
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a lower candidate cap. Values above [`MAX_CANDIDATES`] are clamped.
    pub fn with_candidate_cap(cap: usize) -> Self {
        Self {
            executors: DashMap::new(),
            templates: DashMap::new(),
            candidates: DashMap::new(),
            candidate_cap: cap.clamp(1, MAX_CANDIDATES),
        }
    }

    pub fn candidate_cap(&self) -> usize {
        self.candidate_cap
    }

    pub fn register_executor(&self, name: impl Into<String>, executor: Arc<dyn Capability>) {
        let name = name.into();
        tracing::debug!(target: "glyph::artifacts", name = %name, "generated executor registered");
        self.executors.insert(name, executor);
    }

    pub fn unregister_executor(&self, name: &str) -> bool {
        self.executors.remove(name).is_some()
    }

    pub fn executor(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.executors.get(name).map(|e| Arc::clone(e.value()))
    }

    pub fn register_template_source(&self, signature_id: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(signature_id.into(), source.into());
    }

    pub fn unregister_template_source(&self, signature_id: &str) -> bool {
        self.templates.remove(signature_id).is_some()
    }

    pub fn template_source(&self, signature_id: &str) -> Option<String> {
        self.templates.get(signature_id).map(|s| s.value().clone())
    }

    /// Appends a candidate for the descriptor's signature. Returns false when the list is full;
    /// earlier candidates are never displaced.
    pub fn register_candidate(&self, descriptor: &TemplateDescriptor, source: impl Into<String>) -> bool {
        let mut list = self.candidates.entry(descriptor.key()).or_default();
        if list.len() >= self.candidate_cap {
            tracing::debug!(
                target: "glyph::artifacts",
                signature_id = %descriptor.signature_id,
                "candidate dropped: list full"
            );
            return false;
        }
        list.push(source.into());
        true
    }

    pub fn candidates(&self, descriptor: &TemplateDescriptor) -> Vec<String> {
        self.candidates
            .get(&descriptor.key())
            .map(|l| l.value().clone())
            .unwrap_or_default()
    }
}
