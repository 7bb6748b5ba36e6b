//! Execution bridge test: resolution order, output classification and failure kinds.
//!
//! Run with: `cargo test --test bridge_test`

use async_trait::async_trait;
use glyph_core::{
    Capability, CapabilityError, CapabilityFactory, CapabilityResult, CatalogEntry, FactoryContext, FailureKind,
    InMemoryCatalog, RegistryState, SignatureRouter,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Replies with fixed text and remembers the call ids it saw.
struct Echo {
    name: &'static str,
    reply: &'static str,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Echo {
    fn new(name: &'static str, reply: &'static str) -> Self {
        Self {
            name,
            reply,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Capability for Echo {
    fn name(&self) -> &str {
        self.name
    }

    async fn execute(&self, call_id: &str, _params: Value) -> Result<CapabilityResult, CapabilityError> {
        self.calls.lock().expect("calls lock").push(call_id.to_string());
        Ok(CapabilityResult::text(self.reply))
    }
}

/// Returns its params back as JSON.
struct Mirror;

#[async_trait]
impl Capability for Mirror {
    fn name(&self) -> &str {
        "notes_mirror"
    }

    async fn execute(&self, _call_id: &str, params: Value) -> Result<CapabilityResult, CapabilityError> {
        Ok(CapabilityResult::text(params.to_string()))
    }
}

struct Broken;

#[async_trait]
impl Capability for Broken {
    fn name(&self) -> &str {
        "notes_broken"
    }

    async fn execute(&self, _call_id: &str, _params: Value) -> Result<CapabilityResult, CapabilityError> {
        Err("socket closed".into())
    }
}

fn cap(c: impl Capability + 'static) -> Arc<dyn Capability> {
    Arc::new(c)
}

fn router_with(caps: Vec<Arc<dyn Capability>>) -> SignatureRouter {
    let catalog = InMemoryCatalog::new().with_entry(CatalogEntry::from_capabilities("notes", caps));
    SignatureRouter::new(Arc::new(catalog))
}

#[tokio::test]
async fn unknown_name_is_not_found() {
    let router = router_with(Vec::new());
    let outcome = router.execute_direct("nope_run", json!({})).await;
    assert!(!outcome.success);
    assert_eq!(outcome.data, Value::Null);
    assert!(outcome.error.as_deref().is_some_and(|e| e.contains("not found")));
    assert_eq!(outcome.failure, Some(FailureKind::Resolution));
}

#[tokio::test]
async fn error_marker_is_a_failure() {
    let router = router_with(vec![cap(Echo::new("notes_write", "[ERROR] disk full"))]);
    let outcome = router.execute_direct("notes_write", json!({ "text": "x" })).await;
    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("[ERROR] disk full"));
    assert_eq!(outcome.raw_text.as_deref(), Some("[ERROR] disk full"));
    assert_eq!(outcome.failure, Some(FailureKind::Invocation));
}

#[tokio::test]
async fn json_text_is_parsed_and_plain_text_is_wrapped() {
    let router = router_with(vec![cap(Mirror), cap(Echo::new("notes_greet", "hello there"))]);

    let outcome = router.execute_direct("notes_mirror", json!({ "a": [1, 2] })).await;
    assert!(outcome.success);
    assert_eq!(outcome.data, json!({ "a": [1, 2] }));
    assert_eq!(outcome.raw_text.as_deref(), Some("{\"a\":[1,2]}"));

    let outcome = router.execute_direct("notes_greet", json!({})).await;
    assert!(outcome.success);
    assert_eq!(outcome.data, json!({ "rawOutput": "hello there", "type": "text_result" }));
    assert_eq!(outcome.raw_text.as_deref(), Some("hello there"));
}

#[tokio::test]
async fn execution_error_is_an_invocation_failure() {
    let router = router_with(vec![cap(Broken)]);
    let outcome = router.execute_direct("notes_broken", json!({})).await;
    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(FailureKind::Invocation));
    assert!(outcome.error.as_deref().is_some_and(|e| e.contains("socket closed")));
}

#[tokio::test]
async fn factory_error_is_an_invocation_failure() {
    let factory: CapabilityFactory = Arc::new(
        |_: &FactoryContext| -> Result<Vec<Arc<dyn Capability>>, CapabilityError> { Err("missing api key".into()) },
    );
    let catalog = InMemoryCatalog::new().with_entry(CatalogEntry::new("keyed", vec!["keyed_call".into()], factory));
    let router = SignatureRouter::new(Arc::new(catalog));

    let outcome = router.execute_direct("keyed_call", json!({})).await;
    assert_eq!(outcome.failure, Some(FailureKind::Invocation));
    assert!(outcome.error.as_deref().is_some_and(|e| e.contains("missing api key")));
}

#[tokio::test]
async fn generated_executor_is_used_when_catalog_misses() {
    let router = router_with(Vec::new());
    let echo = Echo::new("gen_summarize", "{\"ok\":true}");
    let calls = Arc::clone(&echo.calls);
    router.state().artifacts.register_executor("gen_summarize", Arc::new(echo));

    let outcome = router.execute_direct("gen_summarize", json!({})).await;
    assert!(outcome.success);
    assert_eq!(outcome.data, json!({ "ok": true }));

    let seen = calls.lock().expect("calls lock").clone();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].starts_with("direct-"));

    assert!(router.state().artifacts.unregister_executor("gen_summarize"));
    let outcome = router.execute_direct("gen_summarize", json!({})).await;
    assert_eq!(outcome.failure, Some(FailureKind::Resolution));
}

#[tokio::test]
async fn catalog_wins_over_generated_executor() {
    let router = router_with(vec![cap(Echo::new("notes_ping", "\"catalog\""))]);
    router
        .state()
        .artifacts
        .register_executor("notes_ping", Arc::new(Echo::new("notes_ping", "\"generated\"")));
    let outcome = router.execute_direct("notes_ping", json!({})).await;
    assert_eq!(outcome.data, json!("catalog"));
}

/// Counts factory invocations: every call rebuilds from the catalog.
#[tokio::test]
async fn factory_runs_per_call_with_empty_context() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&builds);
    let factory: CapabilityFactory = Arc::new(
        move |ctx: &FactoryContext| -> Result<Vec<Arc<dyn Capability>>, CapabilityError> {
            assert!(ctx.values.is_empty());
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![cap(Echo::new("count_tick", "1"))])
        },
    );
    let catalog = Arc::new(InMemoryCatalog::new().with_entry(CatalogEntry::new("count", vec!["count_tick".into()], factory)));
    let state = RegistryState::new();

    for _ in 0..2 {
        let outcome = glyph_core::execute_direct(&state, catalog.as_ref(), "count_tick", json!({})).await;
        assert_eq!(outcome.data, json!(1));
    }
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}
