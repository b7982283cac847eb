//! Builders for directory entries used across tests.

use directory_identity::{FieldValue, RawAttribute, RawDirectoryEntry};

/// Fluent builder for a user entry.
///
/// Produces either raw shape from the same attribute set, so tests can check
/// that behavior does not depend on which shape the transport delivered.
#[derive(Debug, Clone)]
pub struct UserEntryBuilder {
    path: String,
    attributes: Vec<(String, Vec<String>)>,
}

impl UserEntryBuilder {
    /// A user entry with `id`, `sAMAccountName`, `objectClass` and path set.
    pub fn new(id: &str, path: &str) -> Self {
        Self {
            path: path.to_string(),
            attributes: vec![
                ("id".to_string(), vec![id.to_string()]),
                ("sAMAccountName".to_string(), vec![id.to_string()]),
                (
                    "objectClass".to_string(),
                    vec!["top".to_string(), "person".to_string(), "user".to_string()],
                ),
                ("distinguishedName".to_string(), vec![path.to_string()]),
            ],
        }
    }

    pub fn attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.retain(|(existing, _)| existing != name);
        self.attributes.push((name.to_string(), vec![value.to_string()]));
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.attributes.retain(|(existing, _)| existing != name);
        self
    }

    pub fn name(self, name: &str) -> Self {
        self.attribute("cn", name)
    }

    pub fn mail(self, mail: &str) -> Self {
        self.attribute("mail", mail)
    }

    pub fn title(self, title: &str) -> Self {
        self.attribute("title", title)
    }

    pub fn department(self, department: &str) -> Self {
        self.attribute("department", department)
    }

    pub fn manager(self, manager_path: &str) -> Self {
        self.attribute("manager", manager_path)
    }

    pub fn principal(self, upn: &str) -> Self {
        self.attribute("userPrincipalName", upn)
    }

    /// `{type, values}` attribute-list shape.
    pub fn build(self) -> RawDirectoryEntry {
        RawDirectoryEntry::attributes(
            Some(&self.path),
            self.attributes
                .into_iter()
                .map(|(name, values)| RawAttribute::new(name, values))
                .collect(),
        )
    }

    /// Flat object shape with lowercased keys.
    pub fn build_object(self) -> RawDirectoryEntry {
        RawDirectoryEntry::object(
            Some(&self.path),
            self.attributes.into_iter().map(|(name, mut values)| {
                let value = if values.len() == 1 {
                    FieldValue::Single(values.remove(0))
                } else {
                    FieldValue::Multi(values)
                };
                (name.to_lowercase(), value)
            }),
        )
    }
}

/// An organizational unit entry.
pub fn organizational_unit(name: &str, path: &str, description: Option<&str>) -> RawDirectoryEntry {
    let mut attributes = vec![
        RawAttribute::new("ou", [name]),
        RawAttribute::new("objectClass", ["top", "organizationalUnit"]),
        RawAttribute::new("distinguishedName", [path]),
    ];
    if let Some(description) = description {
        attributes.push(RawAttribute::new("description", [description]));
    }
    RawDirectoryEntry::attributes(Some(path), attributes)
}
