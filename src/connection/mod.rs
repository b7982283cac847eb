//! Directory connection management.
//!
//! The [`DirectoryConnector`] and [`DirectorySession`] traits abstract the
//! transport: [`LdapConnector`] talks to a real server, [`InMemoryDirectory`]
//! serves scripted entries for tests and local development.
//!
//! [`ConnectionManager`] owns the one shared, long-lived session bound as the
//! service account. Every use of it goes through [`ConnectionManager::session`],
//! which holds a mutex for the duration of the operation and transparently
//! reconnects when the previous session is gone or dead. User password checks
//! never touch the shared session: they bind on a disposable session opened by
//! [`ConnectionManager::verify_credentials`].

pub mod in_memory;
pub mod ldap;

pub use in_memory::InMemoryDirectory;
pub use ldap::{LdapConnector, LdapSession};

use crate::config::DirectoryConfig;
use crate::entry::RawDirectoryEntry;
use crate::error::{DirectoryError, DirectoryResult};
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// Opens sessions against a directory endpoint.
pub trait DirectoryConnector: Send + Sync {
    type Session: DirectorySession;

    /// Open an unauthenticated session to `url`.
    fn open(&self, url: &str) -> impl Future<Output = DirectoryResult<Self::Session>> + Send;
}

/// One open session with the directory.
pub trait DirectorySession: Send {
    /// Simple bind. A rejected bind is a [`DirectoryError::Bind`].
    fn bind(
        &mut self,
        identity: &str,
        secret: &str,
    ) -> impl Future<Output = DirectoryResult<()>> + Send;

    /// Subtree search under `base`, returning every hit.
    fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[String],
    ) -> impl Future<Output = DirectoryResult<Vec<RawDirectoryEntry>>> + Send;

    fn unbind(&mut self) -> impl Future<Output = DirectoryResult<()>> + Send;

    /// Whether the underlying transport is still usable.
    fn is_alive(&self) -> bool;
}

/// Run `future`, failing with [`DirectoryError::Timeout`] once `timeout` elapses.
pub(crate) async fn with_timeout<T, F>(
    timeout: Option<Duration>,
    operation: &'static str,
    future: F,
) -> DirectoryResult<T>
where
    F: Future<Output = DirectoryResult<T>>,
{
    match timeout {
        Some(duration) => tokio::time::timeout(duration, future)
            .await
            .map_err(|_| DirectoryError::Timeout {
                operation,
                duration,
            })?,
        None => future.await,
    }
}

/// Owner of the shared service-account session.
pub struct ConnectionManager<C: DirectoryConnector> {
    connector: C,
    config: Arc<DirectoryConfig>,
    session: Mutex<Option<C::Session>>,
    connecting: AtomicBool,
}

impl<C: DirectoryConnector> ConnectionManager<C> {
    pub fn new(connector: C, config: Arc<DirectoryConfig>) -> Self {
        Self {
            connector,
            config,
            session: Mutex::new(None),
            connecting: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Whether a connection attempt is currently in flight.
    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::SeqCst)
    }

    /// Whether the shared session exists and is alive.
    pub async fn is_connected(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(DirectorySession::is_alive)
    }

    /// Establish the shared session, replacing any existing one.
    ///
    /// Returns `Ok(false)` without touching the network when the integration is
    /// disabled.
    pub async fn connect(&self) -> DirectoryResult<bool> {
        if !self.config.is_enabled() {
            debug!("Directory integration disabled, skipping connect");
            return Ok(false);
        }

        let mut slot = self.session.lock().await;
        if let Some(mut previous) = slot.take() {
            if let Err(e) = previous.unbind().await {
                debug!("Ignoring unbind failure on replaced session: {}", e);
            }
        }

        self.open_into(&mut slot).await?;
        Ok(true)
    }

    /// Close the shared session. Idempotent and infallible.
    pub async fn disconnect(&self) {
        let mut slot = self.session.lock().await;
        if let Some(mut session) = slot.take() {
            match session.unbind().await {
                Ok(()) => info!("Disconnected from directory {}", self.config.url),
                Err(e) => debug!("Ignoring unbind failure on disconnect: {}", e),
            }
        }
    }

    /// Lock the shared session, reconnecting first when it is missing or dead.
    pub async fn session(&self) -> DirectoryResult<SessionGuard<'_, C::Session>> {
        if !self.config.is_enabled() {
            return Err(DirectoryError::Disabled);
        }

        let mut slot = self.session.lock().await;
        if slot.as_ref().is_some_and(|session| !session.is_alive()) {
            warn!("Directory session is no longer alive, reconnecting");
            slot.take();
        }
        if slot.is_none() {
            self.open_into(&mut slot).await?;
        }

        Ok(SessionGuard {
            slot,
            timeout: self.config.operation_timeout(),
        })
    }

    /// Bind as `identity` on a fresh session that is closed afterwards whatever
    /// the outcome.
    pub async fn verify_credentials(&self, identity: &str, secret: &str) -> DirectoryResult<()> {
        if !self.config.is_enabled() {
            return Err(DirectoryError::Disabled);
        }

        let timeout = self.config.operation_timeout();
        let mut session =
            with_timeout(timeout, "connect", self.connector.open(&self.config.url)).await?;
        let result = with_timeout(timeout, "bind", session.bind(identity, secret)).await;

        if let Err(e) = session.unbind().await {
            debug!("Ignoring unbind failure on credential check session: {}", e);
        }
        result
    }

    async fn open_into(&self, slot: &mut MutexGuard<'_, Option<C::Session>>) -> DirectoryResult<()> {
        self.connecting.store(true, Ordering::SeqCst);
        let result = self.open_bound().await;
        self.connecting.store(false, Ordering::SeqCst);

        match result {
            Ok(session) => {
                info!("Connected to directory {}", self.config.url);
                **slot = Some(session);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to connect to directory {}: {}", self.config.url, e);
                **slot = None;
                Err(e)
            }
        }
    }

    async fn open_bound(&self) -> DirectoryResult<C::Session> {
        let timeout = self.config.operation_timeout();
        let mut session =
            with_timeout(timeout, "connect", self.connector.open(&self.config.url)).await?;

        if !self.config.bind_identity.is_empty() {
            let bound = with_timeout(
                timeout,
                "bind",
                session.bind(&self.config.bind_identity, &self.config.bind_secret),
            )
            .await;
            if let Err(e) = bound {
                if let Err(unbind) = session.unbind().await {
                    debug!("Ignoring unbind failure after rejected service bind: {}", unbind);
                }
                return Err(e);
            }
        }

        Ok(session)
    }
}

/// Exclusive access to the live shared session.
///
/// Connection-level failures drop the session so the next caller reconnects.
pub struct SessionGuard<'a, S: DirectorySession> {
    slot: MutexGuard<'a, Option<S>>,
    timeout: Option<Duration>,
}

impl<S: DirectorySession> SessionGuard<'_, S> {
    pub async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[String],
    ) -> DirectoryResult<Vec<RawDirectoryEntry>> {
        let timeout = self.timeout;
        let session = self.slot.as_mut().ok_or(DirectoryError::NotConnected)?;
        let result = with_timeout(timeout, "search", session.search(base, filter, attributes)).await;

        if let Err(e) = &result {
            if e.is_connection_level() {
                warn!("Dropping directory session after failed search: {}", e);
                self.invalidate();
            }
        }
        result
    }

    /// Discard the session; the next [`ConnectionManager::session`] reconnects.
    pub fn invalidate(&mut self) {
        self.slot.take();
    }
}
