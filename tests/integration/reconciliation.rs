//! Reconciliation passes over the local mirror.

use crate::common::fixtures::{ALICE_PATH, BOB_PATH, alice};
use crate::common::{corp_service, empty_directory, service};
use directory_identity::mirror::TrackedFields;
use directory_identity::{
    IdentityMirror, InMemoryMirror, MirroredIdentity, ReconciliationOutcome, spawn_periodic_sync,
};
use std::sync::Arc;
use std::time::Duration;

/// Bob's tracked fields exactly as the fixture directory holds them.
fn bob_fields() -> TrackedFields {
    TrackedFields {
        full_name: Some("Bob".into()),
        email: Some("bob@corp.com".into()),
        phone: None,
        department: Some("Engineering".into()),
        title: Some("Engineer".into()),
        manager: Some(ALICE_PATH.into()),
        directory_path: Some(BOB_PATH.into()),
    }
}

#[tokio::test]
async fn test_absent_user_is_disabled() {
    let (directory, mirror, service) = corp_service();
    mirror.upsert(MirroredIdentity::directory("dave")).await.unwrap();

    let outcome = service.sync_all().await;

    assert_eq!(
        outcome,
        ReconciliationOutcome {
            updated: 0,
            disabled: 1,
            errors: 0
        }
    );
    assert!(mirror.get("dave").await.unwrap().unwrap().disabled);
    assert_eq!(directory.stats().open_sessions, 0);
}

#[tokio::test]
async fn test_matching_user_is_not_updated() {
    let (_, mirror, service) = corp_service();
    mirror
        .upsert(MirroredIdentity::directory("bob").with_fields(bob_fields()))
        .await
        .unwrap();

    let outcome = service.sync_all().await;

    assert_eq!(outcome, ReconciliationOutcome::default());
    let bob = mirror.get("bob").await.unwrap().unwrap();
    assert_eq!(bob.fields, bob_fields());
    assert!(bob.last_synced.is_some());
}

#[tokio::test]
async fn test_changed_user_is_updated() {
    let (_, mirror, service) = corp_service();
    let mut stale = bob_fields();
    stale.title = Some("Intern".into());
    mirror
        .upsert(MirroredIdentity::directory("bob").with_fields(stale))
        .await
        .unwrap();

    let outcome = service.sync_all().await;

    assert_eq!(outcome.updated, 1);
    assert_eq!(
        mirror.get("bob").await.unwrap().unwrap().fields.title.as_deref(),
        Some("Engineer")
    );
}

#[tokio::test]
async fn test_out_of_scope_user_is_disabled() {
    let (_, mirror, service) = corp_service();
    mirror.upsert(MirroredIdentity::directory("carol")).await.unwrap();

    let outcome = service.sync_all().await;
    assert_eq!(outcome.disabled, 1);
}

#[tokio::test]
async fn test_local_identities_are_ignored() {
    let (_, mirror, service) = corp_service();
    mirror.upsert(MirroredIdentity::local("root")).await.unwrap();

    let outcome = service.sync_all().await;

    assert_eq!(outcome, ReconciliationOutcome::default());
    let root = mirror.get("root").await.unwrap().unwrap();
    assert!(!root.disabled);
    assert!(root.last_synced.is_none());
}

#[tokio::test]
async fn test_member_failure_does_not_abort_batch() {
    let (_, mirror, service) = corp_service();
    for username in ["alice", "bob", "dave", "erin"] {
        mirror.upsert(MirroredIdentity::directory(username)).await.unwrap();
    }
    mirror.fail_writes_for("bob").await;

    let outcome = service.sync_all().await;

    assert_eq!(
        outcome,
        ReconciliationOutcome {
            updated: 1,
            disabled: 2,
            errors: 1
        }
    );
    assert!(mirror.get("erin").await.unwrap().unwrap().disabled);
}

#[tokio::test]
async fn test_unreachable_directory_counts_one_error() {
    let (directory, mirror, service) = corp_service();
    mirror.upsert(MirroredIdentity::directory("alice")).await.unwrap();
    directory.set_unreachable(true);

    let outcome = service.sync_all().await;

    assert_eq!(outcome, ReconciliationOutcome::failed());
    assert!(!mirror.get("alice").await.unwrap().unwrap().disabled);
}

#[tokio::test]
async fn test_outcome_serializes_as_counters() {
    let outcome = ReconciliationOutcome {
        updated: 2,
        disabled: 1,
        errors: 0,
    };
    let value = serde_json::to_value(outcome).unwrap();
    assert_eq!(value, serde_json::json!({"updated": 2, "disabled": 1, "errors": 0}));
}

#[tokio::test]
async fn test_periodic_sync_runs_immediately() {
    let directory = empty_directory();
    directory.add_entry(alice().build());
    let mirror = InMemoryMirror::with_identities([
        MirroredIdentity::directory("alice"),
        MirroredIdentity::directory("dave"),
    ]);
    let service = Arc::new(service(&directory, &mirror));

    let handle = spawn_periodic_sync(Arc::clone(&service), Duration::from_secs(3600));

    let mut disabled = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if mirror.get("dave").await.unwrap().unwrap().disabled {
            disabled = true;
            break;
        }
    }
    handle.abort();

    assert!(disabled, "first pass should run without waiting for the interval");
    let alice = mirror.get("alice").await.unwrap().unwrap();
    assert_eq!(alice.fields.directory_path.as_deref(), Some(ALICE_PATH));
}
