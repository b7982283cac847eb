//! The directory service facade.
//!
//! [`DirectoryService`] is what host applications hold. It owns the shared
//! connection and a handle to the local mirror, and exposes the directory
//! operations as plain-data calls. Expected failures never surface as errors:
//! a missing user, a wrong password or an unreachable directory all come back as
//! `false`, `None` or an empty list, and the cause is logged. With the
//! integration disabled every operation returns its "not available" value
//! without touching the network.
//!
//! # Example
//!
//! ```rust,no_run
//! use directory_identity::config::DirectoryConfig;
//! use directory_identity::mirror::InMemoryMirror;
//! use directory_identity::DirectoryService;
//!
//! # async fn example() {
//! let config = DirectoryConfig::new(
//!     "ldap://dc1.corp.example:389",
//!     "DC=corp,DC=example",
//!     "OU=Eng,DC=corp,DC=example",
//! )
//! .with_bind_credentials("svc-directory@corp.example", "s3cret");
//!
//! let service = DirectoryService::ldap(config, InMemoryMirror::new());
//! if service.authenticate("alice", "wonderland").await {
//!     let profile = service.get_user_info("alice").await;
//!     println!("{:?}", profile);
//! }
//! # }
//! ```

use crate::config::DirectoryConfig;
use crate::connection::{ConnectionManager, DirectoryConnector, LdapConnector};
use crate::entry::RawDirectoryEntry;
use crate::error::DirectoryResult;
use crate::filter::ORGANIZATIONAL_UNIT_FILTER;
use crate::identity::{
    IdentityRecord, OrganizationalUnit, SubordinateRecord, bind_identity, extract,
};
use crate::mirror::{IdentityMirror, MirroredIdentity, TrackedFields};
use crate::reconcile::{ReconciliationJob, ReconciliationOutcome};
use crate::search::MultiBaseSearchResolver;
use crate::subordinates::SubordinateResolver;
use chrono::Utc;
use log::{debug, info, trace, warn};
use std::sync::Arc;

pub struct DirectoryService<C: DirectoryConnector, M: IdentityMirror> {
    config: Arc<DirectoryConfig>,
    connection: ConnectionManager<C>,
    mirror: M,
}

impl<M: IdentityMirror> DirectoryService<LdapConnector, M> {
    /// A service talking LDAP, with connects bounded by the operation timeout.
    pub fn ldap(config: DirectoryConfig, mirror: M) -> Self {
        let connector = match config.operation_timeout() {
            Some(timeout) => LdapConnector::new().with_connect_timeout(timeout),
            None => LdapConnector::new(),
        };
        Self::new(config, connector, mirror)
    }
}

impl<C: DirectoryConnector, M: IdentityMirror> DirectoryService<C, M> {
    pub fn new(config: DirectoryConfig, connector: C, mirror: M) -> Self {
        let config = Arc::new(config);
        if !config.is_enabled() {
            info!("Directory integration not configured, operations will report unavailable");
        }

        Self {
            connection: ConnectionManager::new(connector, Arc::clone(&config)),
            config,
            mirror,
        }
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.connection
    }

    pub fn mirror(&self) -> &M {
        &self.mirror
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    /// Establish the shared connection. `Ok(false)` when the integration is
    /// disabled.
    pub async fn connect(&self) -> DirectoryResult<bool> {
        self.connection.connect().await
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    /// Verify `password` for `username` against the directory.
    ///
    /// The user must be found within the configured scopes, bind successfully
    /// on a disposable connection, and not be disabled in the local mirror.
    pub async fn authenticate(&self, username: &str, password: &str) -> bool {
        if !self.is_enabled() {
            return false;
        }
        if username.trim().is_empty() || password.is_empty() {
            debug!("Refusing directory authentication with empty username or password");
            return false;
        }

        let Some(entry) = self.find_user_entry(username).await else {
            info!("Directory user {} not found in allowed scopes", username);
            return false;
        };

        let suffix = self.config.principal_suffix();
        let Some(identity) = bind_identity(&entry, &self.config.attribute_map, suffix.as_deref())
        else {
            warn!("No bindable identity for directory user {}", username);
            trace!("Entry without bindable identity: {}", entry.to_json());
            return false;
        };

        debug!("Verifying credentials for {} as {}", username, identity);
        if let Err(e) = self.connection.verify_credentials(&identity, password).await {
            if e.is_invalid_credentials() {
                info!("Directory rejected credentials for {}", username);
            } else {
                warn!("Credential check for {} failed: {}", username, e);
            }
            return false;
        }

        match self.mirror.get(username).await {
            Ok(Some(mirrored)) if mirrored.disabled => {
                info!("Directory user {} is disabled locally", username);
                false
            }
            Ok(_) => {
                info!("Directory user {} authenticated", username);
                true
            }
            Err(e) => {
                warn!(
                    "Could not read disabled flag for {}, allowing login: {}",
                    username, e
                );
                true
            }
        }
    }

    /// Normalized profile of `username`, if found within the allowed scopes.
    pub async fn get_user_info(&self, username: &str) -> Option<IdentityRecord> {
        if !self.is_enabled() {
            return None;
        }

        let entry = self.find_user_entry(username).await?;
        let record = extract(&entry, &self.config.attribute_map);
        debug!("Resolved directory profile for {}", username);
        Some(record)
    }

    /// Every organizational unit under the search root.
    pub async fn get_organization_structure(&self) -> Vec<OrganizationalUnit> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let path_attribute = &self.config.attribute_map.directory_path;
        let attributes = vec![
            "ou".to_string(),
            "description".to_string(),
            path_attribute.clone(),
        ];
        let result = match self.connection.session().await {
            Ok(mut session) => {
                session
                    .search(&self.config.base_root, ORGANIZATIONAL_UNIT_FILTER, &attributes)
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(entries) => entries
                .iter()
                .map(|entry| OrganizationalUnit::from_entry(entry, path_attribute))
                .collect(),
            Err(e) => {
                warn!("Failed to read organization structure: {}", e);
                Vec::new()
            }
        }
    }

    /// In-scope users whose manager is `username`.
    pub async fn get_subordinates(&self, username: &str) -> Vec<SubordinateRecord> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let Some(manager) = self.find_user_entry(username).await else {
            debug!("Manager {} not found, no subordinates", username);
            return Vec::new();
        };

        SubordinateResolver::new(&self.connection)
            .resolve(&manager)
            .await
            .subordinates
    }

    /// Reconcile every directory-sourced mirrored identity.
    pub async fn sync_all(&self) -> ReconciliationOutcome {
        if !self.is_enabled() {
            return ReconciliationOutcome::default();
        }
        ReconciliationJob::new(&self.connection, &self.mirror).run().await
    }

    /// Authenticate and record the user in the local mirror.
    ///
    /// Returns the mirrored identity on success. A profile lookup failure after
    /// a successful bind still logs the user in, with a bare record when none
    /// exists yet. A username already held by a local account is not taken over.
    pub async fn authenticate_and_upsert(
        &self,
        username: &str,
        password: &str,
    ) -> Option<MirroredIdentity> {
        if !self.authenticate(username, password).await {
            return None;
        }

        let existing = match self.mirror.get(username).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!("Could not read mirrored identity for {}: {}", username, e);
                None
            }
        };
        if let Some(local) = existing.as_ref().filter(|i| !i.is_directory_sourced()) {
            warn!(
                "Username {} belongs to a local account, not mirroring directory login",
                local.username
            );
            return None;
        }

        let now = Utc::now();
        let identity = match self.get_user_info(username).await {
            Some(record) => existing
                .unwrap_or_else(|| MirroredIdentity::directory(username))
                .with_fields(TrackedFields::from(&record))
                .with_last_synced(now),
            None => match existing {
                Some(existing) => return Some(existing),
                None => MirroredIdentity::directory(username).with_last_synced(now),
            },
        };

        match self.mirror.upsert(identity.clone()).await {
            Ok(stored) => Some(stored),
            Err(e) => {
                warn!("Could not mirror directory user {}: {}", username, e);
                Some(identity)
            }
        }
    }

    async fn find_user_entry(&self, username: &str) -> Option<RawDirectoryEntry> {
        MultiBaseSearchResolver::new(&self.connection)
            .search(
                self.config.scopes.as_slice(),
                &self.config.user_filter(username),
                &self.config.lookup_attributes(),
            )
            .await
    }
}
