//! Integration test verifying that `#[instrument]` annotations produce
//! the expected spans on `MemoryKeyStore` operations.

#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use keygrant_storage::{KeyId, KeyReader, KeyStore, MemoryKeyStore, testutil::make_new_key};
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

// ---------------------------------------------------------------------------
// Collecting layer: records span names as they are created
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }
}

fn install_collector() -> (Arc<Mutex<Vec<String>>>, tracing::subscriber::DefaultGuard) {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);
    let subscriber = tracing_subscriber::registry().with(collector);
    (spans, tracing::subscriber::set_default(subscriber))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_key_creates_span() {
    let (spans, _guard) = install_collector();

    let store = MemoryKeyStore::new();
    store.add_key(&KeyId::from("k"), make_new_key("t", "pk")).await.expect("add should succeed");

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "add_key"), "expected an 'add_key' span, got: {recorded:?}");
}

#[tokio::test]
async fn get_key_creates_span() {
    let (spans, _guard) = install_collector();

    let store = MemoryKeyStore::new();
    let _ = store.get_key(&KeyId::from("missing")).await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "get_key"), "expected a 'get_key' span, got: {recorded:?}");
}

#[tokio::test]
async fn all_key_operations_produce_distinct_spans() {
    let (spans, _guard) = install_collector();

    let store = MemoryKeyStore::new();
    let kid = KeyId::from("k");
    store.add_key(&kid, make_new_key("t", "pk")).await.expect("add");
    let _ = store.get_key(&kid).await;
    store.delete_key(&kid).await.expect("delete");

    let recorded = spans.lock().expect("lock poisoned");
    for name in ["add_key", "get_key", "delete_key"] {
        assert!(
            recorded.iter().any(|s| s == name),
            "missing span '{name}', recorded: {recorded:?}"
        );
    }
}
