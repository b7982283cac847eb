//! Reconciliation of the local mirror against the directory.
//!
//! A pass walks every directory-sourced mirrored identity one at a time, looks
//! the user up again, and disables, refreshes, or just stamps the local record.
//! A failure for one user is counted and the pass moves on.

use crate::connection::{ConnectionManager, DirectoryConnector};
use crate::error::DirectoryError;
use crate::identity::extract;
use crate::mirror::{IdentityMirror, MirroredIdentity, TrackedFields};
use crate::search::MultiBaseSearchResolver;
use crate::service::DirectoryService;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

const MIN_SYNC_PERIOD: Duration = Duration::from_secs(1);

/// Counters reported by one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationOutcome {
    pub updated: usize,
    pub disabled: usize,
    pub errors: usize,
}

impl ReconciliationOutcome {
    /// Outcome of a pass that could not start.
    pub fn failed() -> Self {
        Self {
            errors: 1,
            ..Self::default()
        }
    }
}

/// What a pass did to one mirrored identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberAction {
    /// Tracked fields rewritten and the disabled flag cleared
    Updated,
    /// No directory entry any more; flagged disabled
    Disabled,
    /// Already in step; only the sync timestamp moved
    Unchanged,
}

#[derive(Debug, thiserror::Error)]
enum MemberError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("mirror write failed: {0}")]
    Mirror(String),
}

/// One sequential reconciliation pass.
pub struct ReconciliationJob<'a, C: DirectoryConnector, M: IdentityMirror> {
    connection: &'a ConnectionManager<C>,
    mirror: &'a M,
}

impl<'a, C: DirectoryConnector, M: IdentityMirror> ReconciliationJob<'a, C, M> {
    pub fn new(connection: &'a ConnectionManager<C>, mirror: &'a M) -> Self {
        Self { connection, mirror }
    }

    /// Connect, reconcile every directory-sourced identity, disconnect.
    pub async fn run(&self) -> ReconciliationOutcome {
        match self.connection.connect().await {
            Ok(true) => {}
            Ok(false) => return ReconciliationOutcome::default(),
            Err(e) => {
                error!("Directory reconciliation could not connect: {}", e);
                return ReconciliationOutcome::failed();
            }
        }

        let pass = Uuid::new_v4();
        info!("Starting directory reconciliation pass {}", pass);
        let outcome = self.reconcile_all(pass).await;
        self.connection.disconnect().await;

        info!(
            "Directory reconciliation pass {} finished: {} updated, {} disabled, {} errors",
            pass, outcome.updated, outcome.disabled, outcome.errors
        );
        outcome
    }

    async fn reconcile_all(&self, pass: Uuid) -> ReconciliationOutcome {
        let identities = match self.mirror.list_directory_identities().await {
            Ok(identities) => identities,
            Err(e) => {
                error!("Pass {} could not list mirrored identities: {}", pass, e);
                return ReconciliationOutcome::failed();
            }
        };
        debug!("Pass {} reconciling {} identities", pass, identities.len());

        let mut outcome = ReconciliationOutcome::default();
        for identity in &identities {
            match self.reconcile_member(identity, Utc::now()).await {
                Ok(MemberAction::Updated) => outcome.updated += 1,
                Ok(MemberAction::Disabled) => outcome.disabled += 1,
                Ok(MemberAction::Unchanged) => {}
                Err(e) => {
                    warn!("Pass {} failed for {}: {}", pass, identity.username, e);
                    outcome.errors += 1;
                }
            }
        }
        outcome
    }

    async fn reconcile_member(
        &self,
        identity: &MirroredIdentity,
        now: DateTime<Utc>,
    ) -> Result<MemberAction, MemberError> {
        let config = self.connection.config();
        let username = identity.username.as_str();

        let entry = MultiBaseSearchResolver::new(self.connection)
            .try_search(
                config.scopes.as_slice(),
                &config.user_filter(username),
                &config.lookup_attributes(),
            )
            .await?;

        let Some(entry) = entry else {
            info!("{} no longer in the directory, disabling", username);
            self.mirror
                .set_disabled(username, true)
                .await
                .map_err(|e| MemberError::Mirror(e.to_string()))?;
            return Ok(MemberAction::Disabled);
        };

        let fields = TrackedFields::from(&extract(&entry, &config.attribute_map));
        if fields != identity.fields || identity.disabled {
            debug!("Refreshing {} from the directory", username);
            let refreshed = MirroredIdentity {
                fields,
                disabled: false,
                last_synced: Some(now),
                ..identity.clone()
            };
            self.mirror
                .upsert(refreshed)
                .await
                .map_err(|e| MemberError::Mirror(e.to_string()))?;
            return Ok(MemberAction::Updated);
        }

        self.mirror
            .touch_synced(username, now)
            .await
            .map_err(|e| MemberError::Mirror(e.to_string()))?;
        Ok(MemberAction::Unchanged)
    }
}

/// Run [`DirectoryService::sync_all`] now and then every `period`.
///
/// Periods under one second are raised to one second. Abort the returned
/// handle to stop the schedule.
pub fn spawn_periodic_sync<C, M>(
    service: Arc<DirectoryService<C, M>>,
    period: Duration,
) -> JoinHandle<()>
where
    C: DirectoryConnector + 'static,
    M: IdentityMirror + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period.max(MIN_SYNC_PERIOD));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let outcome = service.sync_all().await;
            debug!("Scheduled reconciliation finished: {:?}", outcome);
        }
    })
}
