use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use skyward_core::{AppError, AppResult, ResourceKind};

/// Tenant identity returned by a domain lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Backend identifier.
    pub id: String,
    /// Unique domain name.
    pub name: String,
}

/// Project inside a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Backend identifier.
    pub id: String,
    /// Project display name.
    pub name: String,
}

/// Role returned by role listings.
///
/// Malformed backend data may omit the display name; such roles cannot be
/// addressed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Backend identifier.
    pub id: String,
    /// Human-readable role name, when present.
    pub display_name: Option<String>,
}

/// Namespace a role listing is drawn from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoleScope {
    /// Predefined roles shared by every domain.
    Global,
    /// Custom roles defined by one domain.
    Domain(String),
}

impl RoleScope {
    /// Returns the domain filter for the listing, `None` for global roles.
    #[must_use]
    pub fn domain_id(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::Domain(domain_id) => Some(domain_id.as_str()),
        }
    }
}

/// Scope an agency role attachment is granted in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttachmentScope {
    /// Role granted on a single project.
    Project(String),
    /// Role granted on the whole domain.
    Domain(String),
}

impl AttachmentScope {
    /// Returns the path segment naming the scope kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Project(_) => "projects",
            Self::Domain(_) => "domains",
        }
    }

    /// Returns the scope identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Project(id) | Self::Domain(id) => id.as_str(),
        }
    }
}

/// Display-name to identifier mapping for one resource kind.
///
/// Inserting an existing name replaces its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameIndex {
    kind: ResourceKind,
    entries: BTreeMap<String, String>,
}

impl NameIndex {
    /// Creates an empty index for the given resource kind.
    #[must_use]
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    #[cfg(test)]
    fn from_entries<I, N, V>(kind: ResourceKind, entries: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let mut index = Self::new(kind);
        for (name, id) in entries {
            index.insert(name, id);
        }
        index
    }

    /// Inserts a mapping and returns the identifier it replaced.
    pub fn insert(&mut self, name: impl Into<String>, id: impl Into<String>) -> Option<String> {
        self.entries.insert(name.into(), id.into())
    }

    /// Overlays `other` on top of this index; its entries shadow existing names.
    #[must_use]
    pub fn overlay(mut self, other: NameIndex) -> Self {
        self.entries.extend(other.entries);
        self
    }

    /// Returns the identifier for a name, if known.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Returns the identifier for a declared name or a reference error.
    pub fn resolve(&self, name: &str) -> AppResult<&str> {
        self.get(name).ok_or_else(|| AppError::Reference {
            kind: self.kind,
            name: name.to_owned(),
        })
    }

    /// Returns the number of names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, id)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, id)| (name.as_str(), id.as_str()))
    }
}
