//! In-memory identity mirror.
//!
//! A thread-safe [`IdentityMirror`] over a `HashMap` guarded by a tokio `RwLock`,
//! for tests and for hosts that do not persist identities. Individual usernames
//! can be made to fail writes, which exercises per-user error isolation in
//! reconciliation.

use super::{IdentityMirror, MirrorError, MirroredIdentity};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MirrorState {
    identities: HashMap<String, MirroredIdentity>,
    failing_writes: HashSet<String>,
    unavailable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryMirror {
    state: Arc<RwLock<MirrorState>>,
}

impl InMemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mirror pre-populated with `identities`.
    pub fn with_identities<I>(identities: I) -> Self
    where
        I: IntoIterator<Item = MirroredIdentity>,
    {
        let identities = identities
            .into_iter()
            .map(|identity| (identity.username.clone(), identity))
            .collect();
        Self {
            state: Arc::new(RwLock::new(MirrorState {
                identities,
                ..Default::default()
            })),
        }
    }

    /// Make every write for `username` fail.
    pub async fn fail_writes_for(&self, username: impl Into<String>) {
        self.state.write().await.failing_writes.insert(username.into());
    }

    /// Make every operation fail as if the store were offline.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.identities.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.state.write().await.identities.clear();
    }
}

impl MirrorState {
    fn check_available(&self) -> Result<(), MirrorError> {
        if self.unavailable {
            Err(MirrorError::unavailable("in-memory mirror switched off"))
        } else {
            Ok(())
        }
    }

    fn check_writable(&self, username: &str) -> Result<(), MirrorError> {
        self.check_available()?;
        if self.failing_writes.contains(username) {
            return Err(MirrorError::internal(format!(
                "write rejected for '{}'",
                username
            )));
        }
        Ok(())
    }

    fn existing(&mut self, username: &str) -> Result<&mut MirroredIdentity, MirrorError> {
        self.identities
            .get_mut(username)
            .ok_or_else(|| MirrorError::user_not_found(username))
    }
}

impl IdentityMirror for InMemoryMirror {
    type Error = MirrorError;

    async fn list_directory_identities(&self) -> Result<Vec<MirroredIdentity>, MirrorError> {
        let state = self.state.read().await;
        state.check_available()?;

        let mut identities: Vec<MirroredIdentity> = state
            .identities
            .values()
            .filter(|identity| identity.is_directory_sourced())
            .cloned()
            .collect();
        identities.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(identities)
    }

    async fn get(&self, username: &str) -> Result<Option<MirroredIdentity>, MirrorError> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state.identities.get(username).cloned())
    }

    async fn upsert(&self, identity: MirroredIdentity) -> Result<MirroredIdentity, MirrorError> {
        let mut state = self.state.write().await;
        state.check_writable(&identity.username)?;
        state
            .identities
            .insert(identity.username.clone(), identity.clone());
        Ok(identity)
    }

    async fn set_disabled(&self, username: &str, disabled: bool) -> Result<(), MirrorError> {
        let mut state = self.state.write().await;
        state.check_writable(username)?;
        state.existing(username)?.disabled = disabled;
        Ok(())
    }

    async fn touch_synced(&self, username: &str, at: DateTime<Utc>) -> Result<(), MirrorError> {
        let mut state = self.state.write().await;
        state.check_writable(username)?;
        state.existing(username)?.last_synced = Some(at);
        Ok(())
    }
}
