//! Authentication against the directory.
//!
//! Every failure mode (unknown user, out-of-scope user, wrong password,
//! unreachable directory, locally disabled user) must come back as `false`.

use crate::common::builders::UserEntryBuilder;
use crate::common::fixtures::{ALICE_PASSWORD, BOB_PASSWORD, alice};
use crate::common::{corp_service, empty_directory, service};
use directory_identity::mirror::TrackedFields;
use directory_identity::{IdentityMirror, IdentitySource, InMemoryMirror, MirroredIdentity};

#[tokio::test]
async fn test_correct_password_authenticates() {
    let (_, _, service) = corp_service();

    assert!(service.authenticate("alice", ALICE_PASSWORD).await);
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let (_, _, service) = corp_service();

    assert!(!service.authenticate("alice", "wrong-pw").await);
}

#[tokio::test]
async fn test_unknown_and_out_of_scope_users_are_rejected() {
    let (directory, _, service) = corp_service();

    assert!(!service.authenticate("mallory", "anything").await);
    // Carol's password is right but Legal is not an allowed scope
    assert!(!service.authenticate("carol", "carol-pw").await);
    assert_eq!(directory.stats().binds, 1, "only the service account bound");
}

#[tokio::test]
async fn test_filter_metacharacters_in_username_match_nothing() {
    let (_, _, service) = corp_service();

    assert!(!service.authenticate("*", ALICE_PASSWORD).await);
    assert!(!service.authenticate("alice)(id=*", ALICE_PASSWORD).await);
}

#[tokio::test]
async fn test_disposable_session_is_closed_and_shared_session_kept() {
    let (directory, _, service) = corp_service();
    service.connect().await.unwrap();

    assert!(service.authenticate("alice", ALICE_PASSWORD).await);
    assert!(!service.authenticate("alice", "wrong-pw").await);

    let stats = directory.stats();
    assert_eq!(stats.open_sessions, 1);
    assert_eq!(stats.connects, 3);
    assert!(service.connection().is_connected().await);
}

#[tokio::test]
async fn test_principal_name_preferred_for_bind() {
    let directory = empty_directory();
    directory.add_entry(
        UserEntryBuilder::new("erin", "CN=Erin,OU=Sales,DC=corp")
            .principal("erin@sales.corp.example")
            .build(),
    );
    directory.add_credentials("erin@sales.corp.example", "erin-pw");
    directory.add_credentials("erin@corp", "stale-pw");
    let service = service(&directory, &InMemoryMirror::new());

    assert!(service.authenticate("erin", "erin-pw").await);
    assert!(!service.authenticate("erin", "stale-pw").await);
}

#[tokio::test]
async fn test_directory_path_used_without_account_name() {
    let directory = empty_directory();
    directory.add_entry(
        UserEntryBuilder::new("frank", "CN=Frank,OU=Eng,DC=corp")
            .without("sAMAccountName")
            .build(),
    );
    directory.add_credentials("CN=Frank,OU=Eng,DC=corp", "frank-pw");
    let service = service(&directory, &InMemoryMirror::new());

    assert!(service.authenticate("frank", "frank-pw").await);
}

#[tokio::test]
async fn test_locally_disabled_user_is_rejected() {
    let (_, mirror, service) = corp_service();
    let mut alice = MirroredIdentity::directory("alice");
    alice.disabled = true;
    mirror.upsert(alice).await.unwrap();

    assert!(!service.authenticate("alice", ALICE_PASSWORD).await);
    assert!(service.authenticate("bob", BOB_PASSWORD).await);
}

#[tokio::test]
async fn test_unreadable_mirror_does_not_block_login() {
    let (_, mirror, service) = corp_service();
    mirror.set_unavailable(true).await;

    assert!(service.authenticate("alice", ALICE_PASSWORD).await);
}

#[tokio::test]
async fn test_unreachable_directory_is_rejected() {
    let (directory, _, service) = corp_service();
    directory.set_unreachable(true);

    assert!(!service.authenticate("alice", ALICE_PASSWORD).await);
    assert!(service.connect().await.is_err());

    directory.set_unreachable(false);
    assert!(service.authenticate("alice", ALICE_PASSWORD).await);
}

#[tokio::test]
async fn test_bad_service_credentials_reject_everyone() {
    let directory = empty_directory();
    directory.add_entry(alice().build());
    directory.add_credentials("alice@corp", ALICE_PASSWORD);
    let config = crate::common::config().with_bind_credentials(crate::common::SERVICE_IDENTITY, "expired");
    let service = directory_identity::DirectoryService::new(config, directory, InMemoryMirror::new());

    assert!(!service.authenticate("alice", ALICE_PASSWORD).await);
    let err = service.connect().await.unwrap_err();
    assert!(err.is_invalid_credentials());
}

#[tokio::test]
async fn test_login_inserts_mirrored_identity() {
    let (_, mirror, service) = corp_service();

    let identity = service
        .authenticate_and_upsert("alice", ALICE_PASSWORD)
        .await
        .expect("alice logs in");

    assert_eq!(identity.username, "alice");
    assert_eq!(identity.source, IdentitySource::Directory);
    assert_eq!(identity.fields.email.as_deref(), Some("alice@corp.com"));
    assert_eq!(identity.fields.full_name.as_deref(), Some("Alice"));
    assert!(identity.last_synced.is_some());
    assert_eq!(mirror.get("alice").await.unwrap(), Some(identity));
}

#[tokio::test]
async fn test_login_refreshes_existing_identity() {
    let (_, mirror, service) = corp_service();
    mirror
        .upsert(MirroredIdentity::directory("bob").with_fields(TrackedFields {
            email: Some("old@corp.com".into()),
            ..Default::default()
        }))
        .await
        .unwrap();

    let identity = service
        .authenticate_and_upsert("bob", BOB_PASSWORD)
        .await
        .unwrap();
    assert_eq!(identity.fields.email.as_deref(), Some("bob@corp.com"));
    assert_eq!(
        identity.fields.manager.as_deref(),
        Some(crate::common::fixtures::ALICE_PATH)
    );
    assert_eq!(mirror.len().await, 1);
}

#[tokio::test]
async fn test_failed_login_does_not_touch_mirror() {
    let (_, mirror, service) = corp_service();

    assert!(service.authenticate_and_upsert("alice", "wrong-pw").await.is_none());
    assert!(mirror.is_empty().await);
}

#[tokio::test]
async fn test_login_does_not_take_over_local_account() {
    let (_, mirror, service) = corp_service();
    mirror.upsert(MirroredIdentity::local("alice")).await.unwrap();

    assert!(service.authenticate_and_upsert("alice", ALICE_PASSWORD).await.is_none());
    let stored = mirror.get("alice").await.unwrap().unwrap();
    assert_eq!(stored.source, IdentitySource::Local);
}

#[tokio::test]
async fn test_mirror_write_failure_still_logs_in() {
    let (_, mirror, service) = corp_service();
    mirror.fail_writes_for("alice").await;

    let identity = service.authenticate_and_upsert("alice", ALICE_PASSWORD).await;
    assert!(identity.is_some());
    assert!(mirror.get("alice").await.unwrap().is_none());
}
