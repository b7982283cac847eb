//! Subordinate resolution over the manager-reference graph.
//!
//! Candidate filters from [`SubordinateFilter::CHAIN`] are tried in order against
//! the whole domain. The first filter that returns any raw entries decides the
//! result: its hits are extracted and scope-filtered, and later filters are not
//! tried even when scope filtering leaves nothing.

use crate::connection::{ConnectionManager, DirectoryConnector};
use crate::entry::RawDirectoryEntry;
use crate::error::DirectoryError;
use crate::filter::{SubordinateFilter, subordinate_filters};
use crate::identity::{SubordinateRecord, extract};
use crate::scope::is_in_scope;
use log::{debug, warn};

/// Outcome of one subordinate lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubordinateResolution {
    /// Strategy whose query returned raw hits, if any did
    pub strategy: Option<SubordinateFilter>,
    /// Raw entries returned by that strategy before scope filtering
    pub raw_hits: usize,
    pub subordinates: Vec<SubordinateRecord>,
}

pub struct SubordinateResolver<'a, C: DirectoryConnector> {
    connection: &'a ConnectionManager<C>,
}

impl<'a, C: DirectoryConnector> SubordinateResolver<'a, C> {
    pub fn new(connection: &'a ConnectionManager<C>) -> Self {
        Self { connection }
    }

    /// Resolve the in-scope subordinates of the manager described by `manager`.
    pub async fn resolve(&self, manager: &RawDirectoryEntry) -> SubordinateResolution {
        let config = self.connection.config();
        let fields = &config.attribute_map;

        let Some(manager_path) = manager.resolved_path(&fields.directory_path) else {
            debug!("Manager entry has no directory path, no subordinates");
            return SubordinateResolution::default();
        };
        let manager_name = manager.first_value(&fields.display_name);
        let attributes = config.lookup_attributes();

        for (strategy, filter) in subordinate_filters(manager_path, manager_name) {
            debug!("Trying {} filter {}", strategy.label(), filter);

            let result = match self.connection.session().await {
                Ok(mut session) => {
                    session
                        .search(&config.base_root, &filter, &attributes)
                        .await
                }
                Err(e) => Err(e),
            };

            let entries = match result {
                Ok(entries) => entries,
                // A lost connection ends the chain rather than advancing to the next filter
                Err(e) if e.is_connection_level() || matches!(e, DirectoryError::Disabled) => {
                    warn!("Subordinate lookup for {} aborted: {}", manager_path, e);
                    return SubordinateResolution::default();
                }
                Err(e) => {
                    warn!("Subordinate {} search failed, trying next: {}", strategy.label(), e);
                    continue;
                }
            };

            if entries.is_empty() {
                continue;
            }

            let raw_hits = entries.len();
            let subordinates: Vec<SubordinateRecord> = entries
                .iter()
                .map(|entry| extract(entry, fields))
                .filter(|record| {
                    record
                        .directory_path
                        .as_deref()
                        .is_some_and(|path| is_in_scope(path, config.scopes.as_slice()))
                })
                .filter_map(SubordinateRecord::from_identity)
                .collect();

            debug!(
                "{} filter matched {} entries, {} in scope",
                strategy.label(),
                raw_hits,
                subordinates.len()
            );
            return SubordinateResolution {
                strategy: Some(strategy),
                raw_hits,
                subordinates,
            };
        }

        SubordinateResolution::default()
    }
}
