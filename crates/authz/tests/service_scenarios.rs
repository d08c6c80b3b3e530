//! End-to-end behavior of the authorization service.
//!
//! Every test drives [`AuthService`] through real tokens issued by the
//! service itself, against a shared in-memory store.
#![allow(clippy::expect_used, clippy::panic)]

use std::{sync::Arc, time::Duration};

use gatehouse_authn::{IdentityCredential, MemoryIdentityVerifier, Principal};
use gatehouse_authz::{AuthService, AuthServiceConfig, AuthzError, CallContext, Scope};
use gatehouse_storage::{MemoryBackend, StorageBackend, testutil::FaultyBackend};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    store: Arc<MemoryBackend>,
    service: AuthService<MemoryBackend>,
}

fn harness() -> Harness {
    harness_with(AuthServiceConfig::builder().key_prefix("gh").build().expect("valid config"))
}

fn harness_with(config: AuthServiceConfig) -> Harness {
    let verifier = MemoryIdentityVerifier::new();
    for name in ["alice", "bob", "carol", "dave", "eve"] {
        verifier.register(format!("gho_{name}"), name);
    }

    let store = Arc::new(MemoryBackend::new());
    let service =
        AuthService::new(Arc::clone(&store), Arc::new(verifier), config).expect("service");
    Harness { store, service }
}

impl Harness {
    async fn login(&self, name: &str) -> CallContext {
        let token = self
            .service
            .authenticate(&CallContext::new(), &IdentityCredential::new(format!("gho_{name}")))
            .await
            .expect("authenticate");
        CallContext::new().with_token(token.expose_secret())
    }

    async fn stored_acl_bytes(&self, resource: &str) -> Option<Vec<u8>> {
        self.store
            .get(format!("gh/acls/{resource}").as_bytes())
            .await
            .expect("read")
            .map(|value| value.to_vec())
    }
}

fn p(name: &str) -> Principal {
    Principal::from(name)
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_credential_is_identity_failure() {
    let h = harness();

    let result =
        h.service.authenticate(&CallContext::new(), &IdentityCredential::new("gho_mallory")).await;

    assert!(matches!(result, Err(AuthzError::IdentityVerificationFailed(_))), "got {result:?}");
}

#[tokio::test]
async fn forged_token_is_unauthenticated() {
    let h = harness();
    let alice = h.login("alice").await;
    h.service.create_acl(&alice, "R").await.expect("create");

    let forged = CallContext::new().with_token("0".repeat(64));
    let result = h.service.authorize(&forged, "R", Scope::Reader).await;

    assert!(matches!(result, Err(AuthzError::Unauthenticated(_))), "got {result:?}");
}

#[tokio::test(start_paused = true)]
async fn expired_token_is_unauthenticated() {
    let h = harness_with(
        AuthServiceConfig::builder()
            .key_prefix("gh")
            .token_ttl(Duration::from_secs(60))
            .build()
            .expect("valid config"),
    );
    let alice = h.login("alice").await;
    h.service.create_acl(&alice, "R").await.expect("create");

    tokio::time::advance(Duration::from_secs(59)).await;
    assert!(h.service.authorize(&alice, "R", Scope::Owner).await.expect("authorize"));

    tokio::time::advance(Duration::from_secs(1)).await;
    let result = h.service.authorize(&alice, "R", Scope::Owner).await;
    assert!(matches!(result, Err(AuthzError::Unauthenticated(_))), "got {result:?}");
}

#[tokio::test]
async fn revoked_token_stops_resolving_but_others_survive() {
    let h = harness();
    let first = h.login("alice").await;
    let second = h.login("alice").await;
    h.service.create_acl(&first, "R").await.expect("create");

    h.service.revoke_token(&first).await.expect("revoke");

    let result = h.service.authorize(&first, "R", Scope::Reader).await;
    assert!(matches!(result, Err(AuthzError::Unauthenticated(_))), "got {result:?}");
    assert!(h.service.authorize(&second, "R", Scope::Owner).await.expect("authorize"));

    let again = h.service.revoke_token(&first).await;
    assert!(matches!(again, Err(AuthzError::Unauthenticated(_))), "got {again:?}");
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn owner_holds_every_lower_scope() {
    let h = harness();
    let alice = h.login("alice").await;
    h.service.create_acl(&alice, "R").await.expect("create");

    for required in Scope::ALL {
        assert!(
            h.service.authorize(&alice, "R", required).await.expect("authorize"),
            "owner should satisfy {required}"
        );
    }
}

#[tokio::test]
async fn reader_cannot_write() {
    let h = harness();
    let alice = h.login("alice").await;
    let carol = h.login("carol").await;
    h.service.create_acl(&alice, "R").await.expect("create");
    h.service.set_scope(&alice, "R", &p("carol"), Scope::Reader).await.expect("grant");

    assert!(h.service.authorize(&carol, "R", Scope::Reader).await.expect("authorize"));
    assert!(!h.service.authorize(&carol, "R", Scope::Writer).await.expect("authorize"));
    assert!(!h.service.authorize(&carol, "R", Scope::Owner).await.expect("authorize"));
}

#[tokio::test]
async fn admin_passes_checks_on_empty_and_missing_acls() {
    let h = harness();
    h.service.admins().grant(&p("bob")).await.expect("grant admin");
    let alice = h.login("alice").await;
    let bob = h.login("bob").await;

    // An ACL emptied of its only owner.
    h.service.create_acl(&alice, "emptied").await.expect("create");
    h.service.set_scope(&alice, "emptied", &p("alice"), Scope::None).await.expect("drop owner");
    assert!(h.service.acls().read_only().get("emptied").await.expect("read").is_empty());

    for required in Scope::ALL {
        assert!(h.service.authorize(&bob, "emptied", required).await.expect("authorize"));
        assert!(h.service.authorize(&bob, "never-created", required).await.expect("authorize"));
    }
}

#[tokio::test]
async fn missing_acl_is_acl_not_found_for_non_admin() {
    let h = harness();
    let carol = h.login("carol").await;

    let result = h.service.authorize(&carol, "nonexistent-repo", Scope::Reader).await;

    assert!(
        matches!(result, Err(AuthzError::AclNotFound { ref resource }) if resource == "nonexistent-repo"),
        "got {result:?}"
    );
}

// ---------------------------------------------------------------------------
// Scope mutation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn writer_cannot_grant_and_acl_is_unchanged() {
    let h = harness();
    let alice = h.login("alice").await;
    let dave = h.login("dave").await;
    h.service.create_acl(&alice, "R").await.expect("create");
    h.service.set_scope(&alice, "R", &p("dave"), Scope::Writer).await.expect("grant");
    let before = h.stored_acl_bytes("R").await;

    let result = h.service.set_scope(&dave, "R", &p("carol"), Scope::Writer).await;

    assert!(
        matches!(
            result,
            Err(AuthzError::NotAuthorized { ref principal, required: Scope::Owner, .. })
                if principal.as_str() == "dave"
        ),
        "got {result:?}"
    );
    assert_eq!(h.stored_acl_bytes("R").await, before);
}

#[tokio::test]
async fn admin_may_change_any_acl() {
    let h = harness();
    h.service.admins().grant(&p("bob")).await.expect("grant admin");
    let alice = h.login("alice").await;
    let bob = h.login("bob").await;
    h.service.create_acl(&alice, "R").await.expect("create");

    h.service.set_scope(&bob, "R", &p("carol"), Scope::Writer).await.expect("admin grant");

    assert_eq!(
        h.service.get_scope(&alice, "R", &p("carol")).await.expect("get_scope"),
        Scope::Writer
    );
}

#[tokio::test]
async fn set_scope_on_missing_acl_fails() {
    let h = harness();
    let alice = h.login("alice").await;

    let result = h.service.set_scope(&alice, "ghost", &p("carol"), Scope::Reader).await;

    assert!(matches!(result, Err(AuthzError::AclNotFound { .. })), "got {result:?}");
    assert_eq!(h.stored_acl_bytes("ghost").await, None);
}

#[tokio::test]
async fn create_acl_is_insert_if_absent() {
    let h = harness();
    let alice = h.login("alice").await;
    let eve = h.login("eve").await;

    assert!(h.service.create_acl(&alice, "R").await.expect("create"));
    assert!(!h.service.create_acl(&eve, "R").await.expect("create again"));

    let acl = h.service.get_acl(&alice, "R").await.expect("get_acl");
    assert_eq!(acl.owners().collect::<Vec<_>>(), vec![&p("alice")]);
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_scope_requires_reader() {
    let h = harness();
    let alice = h.login("alice").await;
    let carol = h.login("carol").await;
    let eve = h.login("eve").await;
    h.service.create_acl(&alice, "R").await.expect("create");
    h.service.set_scope(&alice, "R", &p("carol"), Scope::Reader).await.expect("grant");

    assert_eq!(h.service.get_scope(&carol, "R", &p("alice")).await.expect("read"), Scope::Owner);
    assert_eq!(h.service.get_scope(&carol, "R", &p("eve")).await.expect("read"), Scope::None);

    let result = h.service.get_scope(&eve, "R", &p("alice")).await;
    assert!(
        matches!(result, Err(AuthzError::NotAuthorized { required: Scope::Reader, .. })),
        "got {result:?}"
    );
}

#[tokio::test]
async fn get_acl_requires_owner_or_admin() {
    let h = harness();
    h.service.admins().grant(&p("bob")).await.expect("grant admin");
    let alice = h.login("alice").await;
    let bob = h.login("bob").await;
    let carol = h.login("carol").await;
    h.service.create_acl(&alice, "R").await.expect("create");
    h.service.set_scope(&alice, "R", &p("carol"), Scope::Writer).await.expect("grant");

    let acl = h.service.get_acl(&bob, "R").await.expect("admin read");
    assert_eq!(acl.len(), 2);
    assert_eq!(acl.scope_of(&p("carol")), Scope::Writer);

    let result = h.service.get_acl(&carol, "R").await;
    assert!(
        matches!(result, Err(AuthzError::NotAuthorized { required: Scope::Owner, .. })),
        "got {result:?}"
    );

    let missing = h.service.get_acl(&bob, "ghost").await;
    assert!(matches!(missing, Err(AuthzError::AclNotFound { .. })), "got {missing:?}");
}

// ---------------------------------------------------------------------------
// Admin management
// ---------------------------------------------------------------------------

#[tokio::test]
async fn only_admins_change_admin_records() {
    let h = harness();
    h.service.admins().grant(&p("bob")).await.expect("bootstrap admin");
    let bob = h.login("bob").await;
    let carol = h.login("carol").await;

    let denied = h.service.set_admin(&carol, &p("carol"), true).await;
    assert!(matches!(denied, Err(AuthzError::NotAuthorized { .. })), "got {denied:?}");
    assert!(!h.service.admins().is_admin(&p("carol")).await.expect("read"));

    h.service.set_admin(&bob, &p("carol"), true).await.expect("grant");
    assert!(h.service.admins().is_admin(&p("carol")).await.expect("read"));

    h.service.set_admin(&carol, &p("bob"), false).await.expect("revoke");
    assert_eq!(h.service.admins().list().await.expect("list"), vec![p("carol")]);
}

#[tokio::test]
async fn resource_named_like_admin_does_not_grant_admin() {
    let h = harness();
    let bob = h.login("bob").await;
    let carol = h.login("carol").await;

    // bob owns a resource literally named "bob"; that must not make him an admin.
    h.service.create_acl(&bob, "bob").await.expect("create");

    assert!(!h.service.admins().is_admin(&p("bob")).await.expect("read"));
    h.service.create_acl(&carol, "R").await.expect("create");
    assert!(!h.service.authorize(&bob, "R", Scope::Reader).await.expect("authorize"));
}

// ---------------------------------------------------------------------------
// Storage faults inside the scope mutation transaction
// ---------------------------------------------------------------------------

struct FaultyHarness {
    store: Arc<FaultyBackend>,
    service: AuthService<FaultyBackend>,
    alice: CallContext,
    bob: CallContext,
}

/// alice owns `R`, bob is an admin without an ACL entry.
async fn faulty_harness() -> FaultyHarness {
    let verifier = MemoryIdentityVerifier::new();
    verifier.register("gho_alice", "alice");
    verifier.register("gho_bob", "bob");

    let store = Arc::new(FaultyBackend::new());
    let config = AuthServiceConfig::builder().key_prefix("gh").build().expect("valid config");
    let service =
        AuthService::new(Arc::clone(&store), Arc::new(verifier), config).expect("service");
    service.admins().grant(&p("bob")).await.expect("grant admin");

    let mut contexts = Vec::new();
    for credential in ["gho_alice", "gho_bob"] {
        let token = service
            .authenticate(&CallContext::new(), &IdentityCredential::new(credential))
            .await
            .expect("authenticate");
        contexts.push(CallContext::new().with_token(token.expose_secret()));
    }
    let bob = contexts.pop().expect("bob");
    let alice = contexts.pop().expect("alice");
    service.create_acl(&alice, "R").await.expect("create");

    FaultyHarness { store, service, alice, bob }
}

impl FaultyHarness {
    async fn stored_acl(&self) -> Option<Vec<u8>> {
        self.store.inner().get(b"gh/acls/R").await.expect("read").map(|value| value.to_vec())
    }
}

#[tokio::test]
async fn acl_read_failure_in_set_scope_is_storage_unavailable() {
    let h = faulty_harness().await;
    let before = h.stored_acl().await;
    h.store.fail_reads_with_prefix(b"gh/acls/".to_vec());

    let result = h.service.set_scope(&h.alice, "R", &p("carol"), Scope::Writer).await;

    assert!(matches!(result, Err(AuthzError::StorageUnavailable(_))), "got {result:?}");
    assert_eq!(h.stored_acl().await, before);
}

#[tokio::test]
async fn admin_read_failure_in_set_scope_is_storage_unavailable() {
    let h = faulty_harness().await;
    let before = h.stored_acl().await;
    h.store.fail_reads_with_prefix(b"gh/admins/".to_vec());

    // bob's authority rests on his admin record, which cannot be read.
    let result = h.service.set_scope(&h.bob, "R", &p("carol"), Scope::Writer).await;
    assert!(matches!(result, Err(AuthzError::StorageUnavailable(_))), "got {result:?}");
    assert_eq!(h.stored_acl().await, before);

    // The owner's change never reads an admin record.
    h.service.set_scope(&h.alice, "R", &p("carol"), Scope::Writer).await.expect("owner change");
}

#[tokio::test]
async fn commit_failure_in_set_scope_leaves_acl_unchanged() {
    let h = faulty_harness().await;
    let before = h.stored_acl().await;
    h.store.set_fail_writes(true);

    let result = h.service.set_scope(&h.alice, "R", &p("carol"), Scope::Writer).await;
    assert!(matches!(result, Err(AuthzError::StorageUnavailable(_))), "got {result:?}");

    h.store.clear_faults();
    assert_eq!(h.stored_acl().await, before);
    assert_eq!(
        h.service.get_scope(&h.alice, "R", &p("carol")).await.expect("get_scope"),
        Scope::None
    );
}

#[tokio::test]
async fn admin_record_read_failure_in_set_admin_is_storage_unavailable() {
    let h = faulty_harness().await;
    h.store.fail_reads_with_prefix(b"gh/admins/".to_vec());

    let result = h.service.set_admin(&h.bob, &p("carol"), true).await;
    assert!(matches!(result, Err(AuthzError::StorageUnavailable(_))), "got {result:?}");

    h.store.clear_faults();
    assert!(!h.service.admins().is_admin(&p("carol")).await.expect("read"));
}
