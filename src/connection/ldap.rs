//! LDAP transport backed by `ldap3`.

use super::{DirectoryConnector, DirectorySession};
use crate::entry::RawDirectoryEntry;
use crate::error::{DirectoryError, DirectoryResult, FILTER_ERROR};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, LdapResult, Scope, SearchEntry};
use log::{debug, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Opens plain or TLS LDAP sessions depending on the URL scheme.
#[derive(Debug, Clone, Default)]
pub struct LdapConnector {
    connect_timeout: Option<Duration>,
    starttls: bool,
}

impl LdapConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Upgrade `ldap://` connections with StartTLS.
    pub fn with_starttls(mut self, starttls: bool) -> Self {
        self.starttls = starttls;
        self
    }

    fn settings(&self) -> LdapConnSettings {
        let settings = LdapConnSettings::new().set_starttls(self.starttls);
        match self.connect_timeout {
            Some(timeout) => settings.set_conn_timeout(timeout),
            None => settings,
        }
    }
}

impl DirectoryConnector for LdapConnector {
    type Session = LdapSession;

    async fn open(&self, url: &str) -> DirectoryResult<LdapSession> {
        debug!("Opening LDAP connection to {}", url);

        let (conn, ldap) = LdapConnAsync::with_settings(self.settings(), url)
            .await
            .map_err(|e| DirectoryError::Connect {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let alive = Arc::new(AtomicBool::new(true));
        let driver_alive = Arc::clone(&alive);
        let driver_url = url.to_string();
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("LDAP connection to {} terminated: {}", driver_url, e);
            }
            driver_alive.store(false, Ordering::SeqCst);
        });

        Ok(LdapSession { ldap, alive })
    }
}

/// A live `ldap3` handle plus a flag cleared when its driver task exits.
pub struct LdapSession {
    ldap: Ldap,
    alive: Arc<AtomicBool>,
}

impl DirectorySession for LdapSession {
    async fn bind(&mut self, identity: &str, secret: &str) -> DirectoryResult<()> {
        let result = self
            .ldap
            .simple_bind(identity, secret)
            .await
            .map_err(transport_error)?;

        if result.rc != 0 {
            return Err(DirectoryError::Bind {
                identity: identity.to_string(),
                code: result.rc,
                message: result.text,
            });
        }
        Ok(())
    }

    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[String],
    ) -> DirectoryResult<Vec<RawDirectoryEntry>> {
        let attrs: Vec<&str> = attributes.iter().map(String::as_str).collect();
        let result = self
            .ldap
            .search(base, Scope::Subtree, filter, attrs)
            .await
            .map_err(|e| match e {
                // Rejected client-side; the connection is untouched
                LdapError::FilterParsing => DirectoryError::Search {
                    base: base.to_string(),
                    filter: filter.to_string(),
                    code: FILTER_ERROR,
                    message: e.to_string(),
                },
                other => transport_error(other),
            })?;

        let (entries, _) = result.success().map_err(|e| match e {
            LdapError::LdapResult { result } => search_error(base, filter, result),
            other => transport_error(other),
        })?;

        Ok(entries
            .into_iter()
            .map(|entry| RawDirectoryEntry::from(SearchEntry::construct(entry)))
            .collect())
    }

    async fn unbind(&mut self) -> DirectoryResult<()> {
        self.alive.store(false, Ordering::SeqCst);
        self.ldap.unbind().await.map_err(transport_error)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

fn transport_error(error: LdapError) -> DirectoryError {
    DirectoryError::Transport(error.to_string())
}

fn search_error(base: &str, filter: &str, result: LdapResult) -> DirectoryError {
    DirectoryError::Search {
        base: base.to_string(),
        filter: filter.to_string(),
        code: result.rc,
        message: result.text,
    }
}
