//! LDAP filter construction.
//!
//! User lookups substitute the username into the configured template. Subordinate
//! lookups walk an ordered list of [`SubordinateFilter`] strategies, each producing
//! one manager-reference filter.

use crate::config::USERNAME_PLACEHOLDER;

/// Object class restricting subordinate lookups to user entries.
pub const USER_OBJECT_CLASS_FILTER: &str = "(objectClass=user)";

/// Filter matching organizational units.
pub const ORGANIZATIONAL_UNIT_FILTER: &str = "(objectClass=organizationalUnit)";

/// Escape a value for use inside an LDAP filter (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    ldap3::ldap_escape(value).into_owned()
}

/// Substitute `username` into the first placeholder of `template`.
///
/// The username is escaped so that filter metacharacters match literally.
pub fn user_filter(template: &str, username: &str) -> String {
    template.replacen(USERNAME_PLACEHOLDER, &escape_filter_value(username), 1)
}

/// Strategies for finding entries whose manager reference points at a manager.
///
/// Evaluated in [`SubordinateFilter::CHAIN`] order; resolution stops at the first
/// strategy whose query returns any raw entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubordinateFilter {
    /// Manager reference equals the manager's path as resolved
    ExactManager,
    /// Same, with filter metacharacters in the path escaped
    EscapedManager,
    /// Manager reference starts with `cn=<manager name>`
    ManagerNamePrefix,
}

impl SubordinateFilter {
    pub const CHAIN: [SubordinateFilter; 3] = [
        SubordinateFilter::ExactManager,
        SubordinateFilter::EscapedManager,
        SubordinateFilter::ManagerNamePrefix,
    ];

    /// Build the filter for this strategy.
    ///
    /// Returns `None` when the strategy has nothing to work with, e.g. a name
    /// prefix search for a manager without a display name.
    pub fn build(&self, manager_path: &str, manager_name: Option<&str>) -> Option<String> {
        match self {
            SubordinateFilter::ExactManager => Some(format!(
                "(&(manager={}){})",
                manager_path, USER_OBJECT_CLASS_FILTER
            )),
            SubordinateFilter::EscapedManager => Some(format!(
                "(&(manager={}){})",
                escape_filter_value(manager_path),
                USER_OBJECT_CLASS_FILTER
            )),
            SubordinateFilter::ManagerNamePrefix => {
                let name = manager_name.map(str::trim).filter(|name| !name.is_empty())?;
                Some(format!(
                    "(&(manager=cn={}*){})",
                    escape_filter_value(name),
                    USER_OBJECT_CLASS_FILTER
                ))
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SubordinateFilter::ExactManager => "exact manager reference",
            SubordinateFilter::EscapedManager => "escaped manager reference",
            SubordinateFilter::ManagerNamePrefix => "manager name prefix",
        }
    }
}

/// The ordered candidate filters for one manager.
pub fn subordinate_filters(
    manager_path: &str,
    manager_name: Option<&str>,
) -> Vec<(SubordinateFilter, String)> {
    SubordinateFilter::CHAIN
        .iter()
        .filter_map(|strategy| {
            strategy
                .build(manager_path, manager_name)
                .map(|filter| (*strategy, filter))
        })
        .collect()
}
