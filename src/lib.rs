//! Directory-service identity resolution for Rust.
//!
//! Authenticates users against an LDAP directory (Active Directory in
//! practice), extracts normalized identity records, resolves subordinates
//! through manager references, and reconciles a locally mirrored copy of
//! directory users against the directory's current state.
//!
//! # Core Components
//!
//! - [`DirectoryService`] - Facade exposing every directory operation
//! - [`ConnectionManager`] - Shared, self-healing directory connection
//! - [`IdentityMirror`] - Trait for the host's local identity store
//! - [`scope::is_in_scope`] - Organizational scope allow-list matching
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use directory_identity::{DirectoryConfig, DirectoryService, spawn_periodic_sync};
//! use directory_identity::mirror::InMemoryMirror;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let Some(config) = DirectoryConfig::discover(&DirectoryConfig::default_candidates(".")) else {
//!     return;
//! };
//! let interval = config.sync_interval();
//! let service = Arc::new(DirectoryService::ldap(config, InMemoryMirror::new()));
//!
//! let _schedule = spawn_periodic_sync(Arc::clone(&service), interval);
//! let authenticated = service.authenticate("alice", "wonderland").await;
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod entry;
pub mod error;
pub mod filter;
pub mod identity;
pub mod mirror;
pub mod reconcile;
pub mod scope;
pub mod search;
pub mod service;
pub mod subordinates;

// Re-export commonly used types for convenience
pub use config::{AttributeMap, DirectoryConfig, ScopeConfiguration};
pub use connection::{
    ConnectionManager, DirectoryConnector, DirectorySession, InMemoryDirectory, LdapConnector,
};
pub use entry::{FieldValue, RawAttribute, RawDirectoryEntry};
pub use error::{ConfigurationError, DirectoryError, DirectoryResult};
pub use identity::{IdentityRecord, OrganizationalUnit, SubordinateRecord};
pub use mirror::{IdentityMirror, IdentitySource, InMemoryMirror, MirrorError, MirroredIdentity};
pub use reconcile::{ReconciliationOutcome, spawn_periodic_sync};
pub use scope::is_in_scope;
pub use search::MultiBaseSearchResolver;
pub use service::DirectoryService;
pub use subordinates::SubordinateResolver;
