//! Raw directory entries as delivered by a transport.
//!
//! Directory transports hand back search hits in one of two shapes: a flat object
//! keyed by field name, or a list of `{type, values}` attribute pairs. Both are
//! decoded once, at the transport boundary, into [`RawDirectoryEntry`]; everything
//! downstream reads values through [`RawDirectoryEntry::first_value`] without
//! caring which shape arrived.

use crate::error::DirectoryError;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A value in the flat object shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(String),
    Multi(Vec<String>),
}

impl FieldValue {
    /// First value; multi-valued fields are truncated.
    pub fn first(&self) -> Option<&str> {
        match self {
            FieldValue::Single(value) => Some(value.as_str()),
            FieldValue::Multi(values) => values.first().map(String::as_str),
        }
    }
}

/// Flat property bag shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dn: Option<String>,
    pub object: BTreeMap<String, FieldValue>,
}

/// One `{type, values}` attribute pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttribute {
    #[serde(rename = "type", alias = "name")]
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

impl RawAttribute {
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Typed attribute-list shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeListEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dn: Option<String>,
    pub attributes: Vec<RawAttribute>,
}

/// A single search hit in whichever shape the transport produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDirectoryEntry {
    Object(ObjectEntry),
    Attributes(AttributeListEntry),
}

impl RawDirectoryEntry {
    /// Build a flat-object entry.
    pub fn object<I, K>(dn: Option<&str>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        RawDirectoryEntry::Object(ObjectEntry {
            dn: dn.map(str::to_string),
            object: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        })
    }

    /// Build an attribute-list entry.
    pub fn attributes(dn: Option<&str>, attributes: Vec<RawAttribute>) -> Self {
        RawDirectoryEntry::Attributes(AttributeListEntry {
            dn: dn.map(str::to_string),
            attributes,
        })
    }

    /// Decode a JSON entry in either shape.
    pub fn from_json_value(value: Value) -> Result<Self, DirectoryError> {
        serde_json::from_value(value).map_err(|e| DirectoryError::EntryParse {
            message: e.to_string(),
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, DirectoryError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| DirectoryError::EntryParse {
            message: e.to_string(),
        })?;
        Self::from_json_value(value)
    }

    /// The entry's own distinguished name, when the transport supplied one.
    pub fn dn(&self) -> Option<&str> {
        match self {
            RawDirectoryEntry::Object(entry) => entry.dn.as_deref(),
            RawDirectoryEntry::Attributes(entry) => entry.dn.as_deref(),
        }
        .filter(|dn| !dn.is_empty())
    }

    /// First value of the named attribute, matched case-insensitively.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        match self {
            RawDirectoryEntry::Object(entry) => entry
                .object
                .get(name)
                .or_else(|| {
                    entry
                        .object
                        .iter()
                        .find(|(key, _)| key.eq_ignore_ascii_case(name))
                        .map(|(_, value)| value)
                })
                .and_then(FieldValue::first),
            RawDirectoryEntry::Attributes(entry) => entry
                .attributes
                .iter()
                .find(|attr| attr.name.eq_ignore_ascii_case(name))
                .and_then(|attr| attr.values.first())
                .map(String::as_str),
        }
    }

    /// Every value of the named attribute, matched case-insensitively.
    pub fn values(&self, name: &str) -> Vec<&str> {
        match self {
            RawDirectoryEntry::Object(entry) => entry
                .object
                .iter()
                .filter(|(key, _)| key.eq_ignore_ascii_case(name))
                .flat_map(|(_, value)| match value {
                    FieldValue::Single(value) => vec![value.as_str()],
                    FieldValue::Multi(values) => values.iter().map(String::as_str).collect(),
                })
                .collect(),
            RawDirectoryEntry::Attributes(entry) => entry
                .attributes
                .iter()
                .filter(|attr| attr.name.eq_ignore_ascii_case(name))
                .flat_map(|attr| attr.values.iter().map(String::as_str))
                .collect(),
        }
    }

    /// The entry's location in the tree: the path attribute when present,
    /// otherwise the transport-level DN.
    pub fn resolved_path(&self, path_attribute: &str) -> Option<&str> {
        self.first_value(path_attribute)
            .filter(|path| !path.is_empty())
            .or_else(|| self.dn())
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<ldap3::SearchEntry> for RawDirectoryEntry {
    fn from(entry: ldap3::SearchEntry) -> Self {
        let mut attributes: Vec<RawAttribute> = entry
            .attrs
            .into_iter()
            .map(|(name, values)| RawAttribute { name, values })
            .collect();

        // Binary values are carried base64-encoded
        attributes.extend(entry.bin_attrs.into_iter().map(|(name, values)| RawAttribute {
            name,
            values: values
                .iter()
                .map(|value| base64::engine::general_purpose::STANDARD.encode(value))
                .collect(),
        }));

        attributes.sort_by(|a, b| a.name.cmp(&b.name));

        RawDirectoryEntry::Attributes(AttributeListEntry {
            dn: Some(entry.dn),
            attributes,
        })
    }
}
