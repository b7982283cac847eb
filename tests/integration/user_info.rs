//! Scoped profile lookups.

use crate::common::builders::UserEntryBuilder;
use crate::common::fixtures::{ALICE_PATH, alice};
use crate::common::{config, corp_service, empty_directory, service};
use directory_identity::{DirectoryService, InMemoryMirror, RawDirectoryEntry};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_user_info_for_in_scope_user() {
    let (_, _, service) = corp_service();

    let record = service.get_user_info("alice").await.expect("alice is in scope");
    assert_eq!(record.account_id.as_deref(), Some("alice"));
    assert_eq!(record.display_name.as_deref(), Some("Alice"));
    assert_eq!(record.email.as_deref(), Some("alice@corp.com"));
    assert!(record.directory_path.as_deref().unwrap().contains("OU=Eng"));
    assert_eq!(record.phone, None);
}

#[tokio::test]
async fn test_user_info_out_of_scope_or_missing() {
    let (_, _, service) = corp_service();

    assert!(service.get_user_info("carol").await.is_none());
    assert!(service.get_user_info("nobody").await.is_none());
}

#[tokio::test]
async fn test_first_in_scope_duplicate_wins() {
    let directory = empty_directory();
    directory.add_entry(UserEntryBuilder::new("gina", "CN=Gina,OU=Legal,DC=corp").build());
    directory.add_entry(UserEntryBuilder::new("gina", "CN=Gina,OU=Sales,DC=corp").build());
    let service = service(&directory, &InMemoryMirror::new());

    let record = service.get_user_info("gina").await.unwrap();
    assert_eq!(record.directory_path.as_deref(), Some("CN=Gina,OU=Sales,DC=corp"));
}

#[tokio::test]
async fn test_record_is_independent_of_entry_shape() {
    let typed = empty_directory();
    typed.add_entry(alice().build());
    let flat = empty_directory();
    flat.add_entry(alice().build_object());

    let from_typed = service(&typed, &InMemoryMirror::new())
        .get_user_info("alice")
        .await
        .unwrap();
    let from_flat = service(&flat, &InMemoryMirror::new())
        .get_user_info("alice")
        .await
        .unwrap();
    assert_eq!(from_typed, from_flat);
}

#[tokio::test]
async fn test_json_fixtures_decode_to_same_record() {
    let flat = RawDirectoryEntry::from_json(include_str!("../fixtures/alice_object.json")).unwrap();
    let typed =
        RawDirectoryEntry::from_json(include_str!("../fixtures/alice_attributes.json")).unwrap();

    let directory = empty_directory();
    directory.add_entry(flat);
    let config = config().with_filter_template("(sAMAccountName=%(user)s)");
    let service = DirectoryService::new(config.clone(), directory, InMemoryMirror::new());
    let record = service.get_user_info("alice").await.unwrap();

    assert_eq!(record.surname.as_deref(), Some("Liddell"));
    assert_eq!(record.email.as_deref(), Some("alice@corp.com"));
    assert_eq!(record.phone.as_deref(), Some("+1 555 0100"));
    assert_eq!(
        record,
        directory_identity::identity::extract(&typed, &config.attribute_map)
    );
}

#[tokio::test]
async fn test_lookup_reconnects_after_server_reset() {
    let (directory, _, service) = corp_service();
    service.connect().await.unwrap();
    assert!(service.get_user_info("alice").await.is_some());

    directory.reset_sessions();
    assert!(service.get_user_info("alice").await.is_some());
    assert_eq!(directory.stats().connects, 2);
}

#[tokio::test]
async fn test_transport_failure_then_recovery() {
    let (directory, _, service) = corp_service();

    directory.fail_searches(true);
    assert!(service.get_user_info("alice").await.is_none());
    assert!(!service.connection().is_connected().await);

    directory.fail_searches(false);
    let record = service.get_user_info("alice").await.unwrap();
    assert_eq!(record.directory_path.as_deref(), Some(ALICE_PATH));
}

#[tokio::test(start_paused = true)]
async fn test_hung_search_times_out() {
    let (directory, _, _) = corp_service();
    directory.set_search_delay(Some(Duration::from_secs(120)));
    let config = config().with_operation_timeout(Duration::from_secs(5));
    let service = DirectoryService::new(config, directory, InMemoryMirror::new());

    assert!(service.get_user_info("alice").await.is_none());
}

#[tokio::test]
async fn test_concurrent_lookups_share_one_connection() {
    let (directory, _, service) = corp_service();
    let service = Arc::new(service);

    let lookups = (0..16).map(|i| {
        let service = Arc::clone(&service);
        async move {
            let username = if i % 2 == 0 { "alice" } else { "bob" };
            service.get_user_info(username).await
        }
    });
    let results = futures::future::join_all(lookups).await;

    assert!(results.iter().all(Option::is_some));
    let stats = directory.stats();
    assert_eq!(stats.connects, 1);
    assert_eq!(stats.searches, 16);
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let (directory, _, service) = corp_service();
    assert!(service.connect().await.unwrap());

    service.disconnect().await;
    service.disconnect().await;
    assert_eq!(directory.stats().open_sessions, 0);

    // Next operation reconnects on demand
    assert!(service.get_user_info("bob").await.is_some());
    assert_eq!(directory.stats().connects, 2);
}
