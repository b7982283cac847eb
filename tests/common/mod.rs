//! Shared helpers for the directory integration tests.
//!
//! Every test builds its own [`InMemoryDirectory`] and [`InMemoryMirror`], so
//! tests never share state and can run in parallel.

pub mod builders;
pub mod fixtures;

use directory_identity::{DirectoryConfig, DirectoryService, InMemoryDirectory, InMemoryMirror};

pub const SERVICE_IDENTITY: &str = "CN=svc-directory,OU=Service,DC=corp";
pub const SERVICE_SECRET: &str = "svc-secret";
pub const SCOPES: &str = "OU=Sales,DC=corp|OU=Eng,DC=corp";

pub type TestService = DirectoryService<InMemoryDirectory, InMemoryMirror>;

/// Route `log` output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Configuration matching the corporate fixture directory.
pub fn config() -> DirectoryConfig {
    DirectoryConfig::new("ldap://dc1.corp", "DC=corp", SCOPES)
        .with_filter_template("(id=%(user)s)")
        .with_bind_credentials(SERVICE_IDENTITY, SERVICE_SECRET)
}

/// A directory that accepts the service account and nothing else yet.
pub fn empty_directory() -> InMemoryDirectory {
    let directory = InMemoryDirectory::new();
    directory.add_credentials(SERVICE_IDENTITY, SERVICE_SECRET);
    directory
}

pub fn service(directory: &InMemoryDirectory, mirror: &InMemoryMirror) -> TestService {
    init_logging();
    DirectoryService::new(config(), directory.clone(), mirror.clone())
}

/// The corporate fixture directory with a fresh service and mirror.
pub fn corp_service() -> (InMemoryDirectory, InMemoryMirror, TestService) {
    let directory = fixtures::corp_directory();
    let mirror = InMemoryMirror::new();
    let service = service(&directory, &mirror);
    (directory, mirror, service)
}
