//! Verifies that service operations and the scope-mutation transaction are
//! instrumented, and that token material never reaches span fields.

#![allow(clippy::expect_used)]

use std::{
    fmt::Write as _,
    sync::{Arc, Mutex},
};

use gatehouse_authn::{IdentityCredential, MemoryIdentityVerifier, Principal};
use gatehouse_authz::{AuthService, AuthServiceConfig, CallContext, Scope};
use gatehouse_storage::MemoryBackend;
use tracing::{
    Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
    fields: Arc<Mutex<String>>,
}

struct FieldRecorder<'a>(&'a mut String);

impl Visit for FieldRecorder<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let _ = write!(self.0, "{}={:?} ", field.name(), value);
    }
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
        attrs.record(&mut FieldRecorder(&mut self.fields.lock().expect("lock poisoned")));
    }
}

fn install() -> (SpanCollector, tracing::subscriber::DefaultGuard) {
    let collector = SpanCollector::default();
    let subscriber = tracing_subscriber::registry().with(collector.clone());
    (collector, tracing::subscriber::set_default(subscriber))
}

fn assert_span(collector: &SpanCollector, name: &str) {
    let recorded = collector.spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == name), "expected a '{name}' span, got: {recorded:?}");
}

#[tokio::test]
async fn service_operations_create_spans() {
    let (collector, _guard) = install();

    let verifier = MemoryIdentityVerifier::new();
    verifier.register("gho_alice", "alice");
    let service = AuthService::new(
        Arc::new(MemoryBackend::new()),
        Arc::new(verifier),
        AuthServiceConfig::default(),
    )
    .expect("service");

    let token = service
        .authenticate(&CallContext::new(), &IdentityCredential::new("gho_alice"))
        .await
        .expect("authenticate");
    let alice = CallContext::new().with_token(token.expose_secret());

    service.create_acl(&alice, "repo-a").await.expect("create_acl");
    service
        .set_scope(&alice, "repo-a", &Principal::from("carol"), Scope::Writer)
        .await
        .expect("set_scope");
    service.authorize(&alice, "repo-a", Scope::Reader).await.expect("authorize");
    service.get_acl(&alice, "repo-a").await.expect("get_acl");

    for name in ["authenticate", "create_acl", "set_scope", "authorize", "get_acl", "transact"] {
        assert_span(&collector, name);
    }

    let fields = collector.fields.lock().expect("lock poisoned");
    assert!(fields.contains("repo-a"), "resource should be recorded: {fields}");
    assert!(!fields.contains(token.expose_secret()), "token leaked into span fields");
    assert!(!fields.contains("gho_alice"), "credential leaked into span fields");
}
