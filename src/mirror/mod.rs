//! Local identity mirror.
//!
//! The host application keeps its own copy of every directory user that has
//! logged in. This module defines the seam the directory service uses to read
//! and refresh that copy: [`IdentityMirror`], implemented by the host's store.
//! [`InMemoryMirror`] is provided for development and testing.
//!
//! # Example
//!
//! ```rust
//! use directory_identity::mirror::{IdentityMirror, InMemoryMirror, MirroredIdentity};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mirror = InMemoryMirror::new();
//! mirror.upsert(MirroredIdentity::directory("alice")).await?;
//!
//! mirror.set_disabled("alice", true).await?;
//! let alice = mirror.get("alice").await?.unwrap();
//! assert!(alice.disabled);
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod in_memory;

pub use errors::MirrorError;
pub use in_memory::InMemoryMirror;

use crate::identity::IdentityRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Where a mirrored identity originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySource {
    /// Created locally, never reconciled
    Local,
    /// Created from a directory login, subject to reconciliation
    Directory,
}

/// The fields reconciliation compares and overwrites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedFields {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub title: Option<String>,
    pub manager: Option<String>,
    pub directory_path: Option<String>,
}

impl From<&IdentityRecord> for TrackedFields {
    fn from(record: &IdentityRecord) -> Self {
        Self {
            full_name: record.display_name.clone(),
            email: record.email.clone(),
            phone: record.phone.clone(),
            department: record.department.clone(),
            title: record.title.clone(),
            manager: record.manager_ref.clone(),
            directory_path: record.directory_path.clone(),
        }
    }
}

/// One user as held by the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirroredIdentity {
    pub username: String,
    #[serde(flatten)]
    pub fields: TrackedFields,
    pub disabled: bool,
    pub source: IdentitySource,
    pub last_synced: Option<DateTime<Utc>>,
}

impl MirroredIdentity {
    /// A bare directory-sourced identity with no profile fields.
    pub fn directory(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            fields: TrackedFields::default(),
            disabled: false,
            source: IdentitySource::Directory,
            last_synced: None,
        }
    }

    pub fn local(username: impl Into<String>) -> Self {
        Self {
            source: IdentitySource::Local,
            ..Self::directory(username)
        }
    }

    pub fn with_fields(mut self, fields: TrackedFields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_last_synced(mut self, at: DateTime<Utc>) -> Self {
        self.last_synced = Some(at);
        self
    }

    pub fn is_directory_sourced(&self) -> bool {
        self.source == IdentitySource::Directory
    }
}

/// Store holding the locally mirrored identities.
///
/// Usernames are unique across sources; directory operations only ever touch
/// [`IdentitySource::Directory`] records.
pub trait IdentityMirror: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Every directory-sourced identity, in a stable order.
    fn list_directory_identities(
        &self,
    ) -> impl Future<Output = Result<Vec<MirroredIdentity>, Self::Error>> + Send;

    fn get(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<MirroredIdentity>, Self::Error>> + Send;

    /// Insert or replace an identity, returning the stored value.
    fn upsert(
        &self,
        identity: MirroredIdentity,
    ) -> impl Future<Output = Result<MirroredIdentity, Self::Error>> + Send;

    /// Set the disabled flag of an existing identity.
    fn set_disabled(
        &self,
        username: &str,
        disabled: bool,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Record that an identity was checked against the directory at `at`.
    fn touch_synced(
        &self,
        username: &str,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
