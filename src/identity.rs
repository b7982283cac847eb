//! Canonical identity records and attribute extraction.
//!
//! [`extract`] turns a [`RawDirectoryEntry`] of either shape into an
//! [`IdentityRecord`]. Unset attributes become `None`; multi-valued attributes
//! keep only their first value.

use crate::config::AttributeMap;
use crate::entry::RawDirectoryEntry;
use serde::{Deserialize, Serialize};

/// Normalized identity for one directory user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub account_id: Option<String>,
    pub display_name: Option<String>,
    pub given_name: Option<String>,
    pub surname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub title: Option<String>,
    /// Path of the user's manager
    pub manager_ref: Option<String>,
    /// The entry's location in the directory tree; the only input to scope matching
    pub directory_path: Option<String>,
}

/// A subordinate surfaced to callers. Always scope-filtered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubordinateRecord {
    pub account_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub title: Option<String>,
    pub department: Option<String>,
    pub directory_path: String,
}

impl SubordinateRecord {
    /// Narrow an identity to a subordinate; entries without an account id or a
    /// path cannot be surfaced.
    pub fn from_identity(record: IdentityRecord) -> Option<Self> {
        Some(Self {
            account_id: record.account_id?,
            name: record.display_name,
            email: record.email,
            title: record.title,
            department: record.department,
            directory_path: record.directory_path?,
        })
    }
}

/// One organizational unit from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationalUnit {
    pub name: Option<String>,
    pub description: Option<String>,
    pub path: Option<String>,
}

impl OrganizationalUnit {
    pub fn from_entry(entry: &RawDirectoryEntry, path_attribute: &str) -> Self {
        Self {
            name: owned(entry.first_value("ou")),
            description: owned(entry.first_value("description")),
            path: owned(entry.resolved_path(path_attribute)),
        }
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Normalize a raw entry into an identity record.
pub fn extract(entry: &RawDirectoryEntry, fields: &AttributeMap) -> IdentityRecord {
    let value = |name: &str| owned(entry.first_value(name));

    IdentityRecord {
        account_id: value(&fields.account_id),
        display_name: value(&fields.display_name),
        given_name: value(&fields.given_name),
        surname: value(&fields.surname),
        email: value(&fields.email),
        phone: value(&fields.phone),
        department: value(&fields.department),
        title: value(&fields.title),
        manager_ref: value(&fields.manager_ref),
        directory_path: owned(entry.resolved_path(&fields.directory_path)),
    }
}

/// Identity to bind as when verifying a user's password.
///
/// Prefers the principal name, then `<account>@<suffix>`, then the entry's path.
pub fn bind_identity(
    entry: &RawDirectoryEntry,
    fields: &AttributeMap,
    principal_suffix: Option<&str>,
) -> Option<String> {
    if let Some(principal) = non_empty(entry.first_value(&fields.principal_name)) {
        return Some(principal.to_string());
    }

    if let (Some(account), Some(suffix)) = (
        non_empty(entry.first_value(&fields.account_id)),
        principal_suffix,
    ) {
        return Some(format!("{}@{}", account, suffix));
    }

    non_empty(entry.resolved_path(&fields.directory_path)).map(str::to_string)
}
