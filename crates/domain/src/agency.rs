use serde::{Deserialize, Serialize};
use skyward_core::{AppError, AppResult, NonEmptyString};

use crate::ProjectRoleSet;

/// Agency record as reported by the identity backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agency {
    /// Backend identifier.
    pub id: String,
    /// Agency name.
    pub name: String,
    /// Identifier of the owning domain.
    pub domain_id: String,
    /// Identifier of the trusted domain.
    pub trust_domain_id: Option<String>,
    /// Name of the trusted domain.
    pub trust_domain_name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Validity period as reported by the backend.
    pub duration: Option<String>,
    /// Expiry timestamp as reported by the backend.
    pub expire_time: Option<String>,
    /// Creation timestamp as reported by the backend.
    pub create_time: Option<String>,
}

/// Raw declared agency configuration, as read from a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AgencyDefinitionInput {
    /// Agency name.
    pub name: String,
    /// Name of the domain trusted by the agency.
    pub trust_domain_name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Project-role grants.
    #[serde(default)]
    pub project_roles: ProjectRoleSet,
    /// Domain-scoped role names; accepted but never attached.
    #[serde(default)]
    pub domain_roles: Vec<String>,
}

/// Validated declared agency configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AgencyDefinitionInput")]
pub struct AgencyDefinition {
    name: NonEmptyString,
    trust_domain_name: NonEmptyString,
    description: Option<String>,
    project_roles: ProjectRoleSet,
    domain_roles: Vec<String>,
}

impl AgencyDefinition {
    /// Creates a validated agency definition.
    pub fn new(input: AgencyDefinitionInput) -> AppResult<Self> {
        let AgencyDefinitionInput {
            name,
            trust_domain_name,
            description,
            project_roles,
            domain_roles,
        } = input;

        let description = description.and_then(|value| {
            let trimmed = value.trim().to_owned();
            (!trimmed.is_empty()).then_some(trimmed)
        });

        let domain_roles = domain_roles
            .into_iter()
            .map(NonEmptyString::new)
            .map(|role| role.map(String::from))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Self {
            name: NonEmptyString::new(name)?,
            trust_domain_name: NonEmptyString::new(trust_domain_name)?,
            description,
            project_roles,
            domain_roles,
        })
    }

    /// Returns the agency name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the trusted domain name.
    #[must_use]
    pub fn trust_domain_name(&self) -> &NonEmptyString {
        &self.trust_domain_name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the declared project-role grants.
    #[must_use]
    pub fn project_roles(&self) -> &ProjectRoleSet {
        &self.project_roles
    }

    /// Returns the declared domain-scoped role names.
    #[must_use]
    pub fn domain_roles(&self) -> &[String] {
        &self.domain_roles
    }

    /// Rejects changes to attributes that are fixed at creation.
    pub fn ensure_immutable_fields_unchanged(&self, target: &AgencyDefinition) -> AppResult<()> {
        if self.name != target.name {
            return Err(AppError::Validation(format!(
                "agency name is immutable: '{}' cannot become '{}'",
                self.name, target.name
            )));
        }

        if self.trust_domain_name != target.trust_domain_name {
            return Err(AppError::Validation(format!(
                "agency trust domain is immutable: '{}' cannot become '{}'",
                self.trust_domain_name, target.trust_domain_name
            )));
        }

        Ok(())
    }
}

impl TryFrom<AgencyDefinitionInput> for AgencyDefinition {
    type Error = AppError;

    fn try_from(input: AgencyDefinitionInput) -> Result<Self, Self::Error> {
        Self::new(input)
    }
}

/// Observed agency state after a lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgencySnapshot {
    /// Backend record.
    pub agency: Agency,
    /// Region the provider operates in.
    pub region: String,
    /// Project-role grants currently attached.
    pub project_roles: ProjectRoleSet,
}

impl AgencySnapshot {
    /// Rebuilds the declared configuration that matches the observed state.
    pub fn to_definition(&self) -> AppResult<AgencyDefinition> {
        AgencyDefinition::new(AgencyDefinitionInput {
            name: self.agency.name.clone(),
            trust_domain_name: self.agency.trust_domain_name.clone(),
            description: self.agency.description.clone(),
            project_roles: self.project_roles.clone(),
            domain_roles: Vec::new(),
        })
    }
}

/// Lifecycle state of a managed agency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgencyState {
    /// No backend record exists.
    Absent,
    /// Record creation and initial grants are in progress.
    Creating,
    /// Record exists and matches the last applied configuration.
    Present,
    /// Attributes or grants are being reconciled.
    Updating,
    /// Record removal is in progress.
    Deleting,
}

impl AgencyState {
    /// Returns a stable name for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Creating => "creating",
            Self::Present => "present",
            Self::Updating => "updating",
            Self::Deleting => "deleting",
        }
    }

    /// Validates and performs a transition.
    ///
    /// Any state may fall back to `Absent` when the backend reports the
    /// agency missing.
    pub fn transition(self, next: AgencyState) -> AppResult<AgencyState> {
        let allowed = matches!(
            (self, next),
            (_, Self::Absent)
                | (Self::Absent, Self::Creating)
                | (Self::Creating, Self::Present)
                | (Self::Present, Self::Updating | Self::Deleting)
                | (Self::Updating, Self::Present)
        );

        if allowed {
            Ok(next)
        } else {
            Err(AppError::Internal(format!(
                "invalid agency state transition from {} to {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }
}
