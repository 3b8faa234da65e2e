use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use skyward_core::{AppResult, NonEmptyString};

/// One declared project together with the roles granted on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRoles {
    /// Project display name.
    pub project: NonEmptyString,
    /// Role display names granted on the project.
    pub roles: BTreeSet<NonEmptyString>,
}

/// Declared project-role grants of an agency.
///
/// Entry order is irrelevant. Repeated projects are merged by role union and
/// projects without roles are dropped, so two sets describing the same grants
/// compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ProjectRoles>", into = "Vec<ProjectRoles>")]
pub struct ProjectRoleSet {
    projects: BTreeMap<NonEmptyString, BTreeSet<NonEmptyString>>,
}

impl ProjectRoleSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a validated set from raw project and role names.
    pub fn parse<I, P, R, N>(entries: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = (P, R)>,
        P: Into<String>,
        R: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let mut set = Self::new();
        for (project, roles) in entries {
            let project = NonEmptyString::new(project)?;
            let roles = roles
                .into_iter()
                .map(NonEmptyString::new)
                .collect::<AppResult<Vec<_>>>()?;
            set.insert(project, roles);
        }
        Ok(set)
    }

    /// Grants roles on a project, merging with any existing grants.
    pub fn insert(
        &mut self,
        project: NonEmptyString,
        roles: impl IntoIterator<Item = NonEmptyString>,
    ) {
        let roles: BTreeSet<NonEmptyString> = roles.into_iter().collect();
        if roles.is_empty() {
            return;
        }
        self.projects.entry(project).or_default().extend(roles);
    }

    /// Returns the roles declared for a project.
    #[must_use]
    pub fn roles_for(&self, project: &str) -> Option<&BTreeSet<NonEmptyString>> {
        self.projects.get(project)
    }

    /// Returns the number of projects with at least one role.
    #[must_use]
    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    /// Returns whether no grant is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Expands every project into its `(project, role)` pairs.
    #[must_use]
    pub fn pairs(&self) -> BTreeSet<ProjectRolePair> {
        self.projects
            .iter()
            .flat_map(|(project, roles)| {
                roles
                    .iter()
                    .map(move |role| ProjectRolePair::new(project.clone(), role.clone()))
            })
            .collect()
    }

    /// Computes the attachments that turn `self` into `target`.
    #[must_use]
    pub fn diff(&self, target: &ProjectRoleSet) -> ProjectRoleDiff {
        ProjectRoleDiff::between(self, target)
    }
}

impl From<Vec<ProjectRoles>> for ProjectRoleSet {
    fn from(entries: Vec<ProjectRoles>) -> Self {
        let mut set = Self::new();
        for entry in entries {
            set.insert(entry.project, entry.roles);
        }
        set
    }
}

impl From<ProjectRoleSet> for Vec<ProjectRoles> {
    fn from(set: ProjectRoleSet) -> Self {
        set.projects
            .into_iter()
            .map(|(project, roles)| ProjectRoles { project, roles })
            .collect()
    }
}

/// Composite key of a single project-role attachment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectRolePair {
    project: NonEmptyString,
    role: NonEmptyString,
}

impl ProjectRolePair {
    /// Creates a pair from validated names.
    #[must_use]
    pub fn new(project: NonEmptyString, role: NonEmptyString) -> Self {
        Self { project, role }
    }

    /// Returns the project display name.
    #[must_use]
    pub fn project(&self) -> &str {
        self.project.as_str()
    }

    /// Returns the role display name.
    #[must_use]
    pub fn role(&self) -> &str {
        self.role.as_str()
    }
}

impl Display for ProjectRolePair {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "role '{}' on project '{}'", self.role, self.project)
    }
}

/// Attachments to remove and to add when moving between two declared sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectRoleDiff {
    to_delete: BTreeSet<ProjectRolePair>,
    to_add: BTreeSet<ProjectRolePair>,
}

impl ProjectRoleDiff {
    /// Computes the symmetric difference of the flattened pair sets.
    #[must_use]
    pub fn between(current: &ProjectRoleSet, target: &ProjectRoleSet) -> Self {
        let current_pairs = current.pairs();
        let target_pairs = target.pairs();

        Self {
            to_delete: current_pairs.difference(&target_pairs).cloned().collect(),
            to_add: target_pairs.difference(&current_pairs).cloned().collect(),
        }
    }

    /// Pairs present in the current set only.
    #[must_use]
    pub fn to_delete(&self) -> &BTreeSet<ProjectRolePair> {
        &self.to_delete
    }

    /// Pairs present in the target set only.
    #[must_use]
    pub fn to_add(&self) -> &BTreeSet<ProjectRolePair> {
        &self.to_add
    }

    /// Returns whether both sets describe the same grants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_add.is_empty()
    }
}
