//! The corporate fixture directory.
//!
//! Scopes are Sales and Eng. Alice manages Bob (Eng, in scope) and Carol
//! (Legal, out of scope). Alice binds as `alice@corp`, the principal built from
//! her account name and the `DC=corp` suffix.

use super::builders::{UserEntryBuilder, organizational_unit};
use super::empty_directory;
use directory_identity::{InMemoryDirectory, RawDirectoryEntry};

pub const ALICE_PATH: &str = "CN=Alice,OU=Eng,DC=corp";
pub const BOB_PATH: &str = "CN=Bob,OU=Eng,DC=corp";
pub const CAROL_PATH: &str = "CN=Carol,OU=Legal,DC=corp";
pub const ALICE_PASSWORD: &str = "correct-pw";
pub const BOB_PASSWORD: &str = "bob-pw";

pub fn alice() -> UserEntryBuilder {
    UserEntryBuilder::new("alice", ALICE_PATH)
        .name("Alice")
        .mail("alice@corp.com")
        .title("Engineering Manager")
        .department("Engineering")
}

pub fn bob() -> UserEntryBuilder {
    UserEntryBuilder::new("bob", BOB_PATH)
        .name("Bob")
        .mail("bob@corp.com")
        .title("Engineer")
        .department("Engineering")
        .manager(ALICE_PATH)
}

pub fn carol() -> UserEntryBuilder {
    UserEntryBuilder::new("carol", CAROL_PATH)
        .name("Carol")
        .mail("carol@corp.com")
        .department("Legal")
        .manager(ALICE_PATH)
}

pub fn organizational_units() -> Vec<RawDirectoryEntry> {
    vec![
        organizational_unit("Eng", "OU=Eng,DC=corp", Some("Engineering")),
        organizational_unit("Sales", "OU=Sales,DC=corp", None),
        organizational_unit("Legal", "OU=Legal,DC=corp", Some("Legal and compliance")),
    ]
}

pub fn corp_directory() -> InMemoryDirectory {
    let directory = empty_directory();
    directory.add_entry(alice().build());
    directory.add_entry(bob().build());
    directory.add_entry(carol().build());
    for unit in organizational_units() {
        directory.add_entry(unit);
    }

    directory.add_credentials("alice@corp", ALICE_PASSWORD);
    directory.add_credentials("bob@corp", BOB_PASSWORD);
    directory.add_credentials("carol@corp", "carol-pw");
    directory
}
