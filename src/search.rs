//! Multi-base search emulation.
//!
//! The directory cannot search several disjoint subtrees in one query, so the
//! resolver searches the whole domain once and keeps the first hit, in result
//! order, whose path falls within a configured scope.

use crate::connection::{ConnectionManager, DirectoryConnector};
use crate::entry::RawDirectoryEntry;
use crate::error::DirectoryResult;
use crate::scope::is_in_scope;
use log::{debug, trace, warn};

/// Locates single entries across the configured scopes.
pub struct MultiBaseSearchResolver<'a, C: DirectoryConnector> {
    connection: &'a ConnectionManager<C>,
}

impl<'a, C: DirectoryConnector> MultiBaseSearchResolver<'a, C> {
    pub fn new(connection: &'a ConnectionManager<C>) -> Self {
        Self { connection }
    }

    /// First in-scope entry matching `filter`, or `None`.
    ///
    /// Search failures are logged and reported as not found.
    pub async fn search<S: AsRef<str>>(
        &self,
        scopes: &[S],
        filter: &str,
        attributes: &[String],
    ) -> Option<RawDirectoryEntry> {
        match self.try_search(scopes, filter, attributes).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Directory search {} failed, treating as not found: {}", filter, e);
                None
            }
        }
    }

    /// Same as [`search`](Self::search) but surfaces transport and search
    /// errors to callers that count them.
    pub async fn try_search<S: AsRef<str>>(
        &self,
        scopes: &[S],
        filter: &str,
        attributes: &[String],
    ) -> DirectoryResult<Option<RawDirectoryEntry>> {
        let config = self.connection.config();
        let entries = {
            let mut session = self.connection.session().await?;
            session
                .search(&config.base_root, filter, attributes)
                .await?
        };

        debug!(
            "Search {} under {} returned {} entries",
            filter,
            config.base_root,
            entries.len()
        );
        Ok(first_in_scope(
            entries,
            scopes,
            &config.attribute_map.directory_path,
        ))
    }
}

/// First entry, in order, whose resolved path is within `scopes`.
pub fn first_in_scope<S: AsRef<str>>(
    entries: Vec<RawDirectoryEntry>,
    scopes: &[S],
    path_attribute: &str,
) -> Option<RawDirectoryEntry> {
    entries.into_iter().find(|entry| match entry.resolved_path(path_attribute) {
        Some(path) => is_in_scope(path, scopes),
        None => {
            trace!("Skipping entry without a path: {}", entry.to_json());
            false
        }
    })
}
