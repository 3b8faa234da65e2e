use serde::{Deserialize, Serialize};
use skyward_core::{AppError, AppResult, NonEmptyString};

/// Raw declared container cluster configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClusterDefinitionInput {
    /// Cluster name.
    pub name: String,
    /// Optional description, the only attribute that can change later.
    #[serde(default)]
    pub description: Option<String>,
    /// VPC identifier.
    pub vpc: String,
    /// Subnet identifier.
    pub subnet: String,
    /// Region the cluster lives in.
    pub region: String,
    /// Optional availability zone.
    #[serde(default)]
    pub az: Option<String>,
    /// Optional security group identifier.
    #[serde(default)]
    pub security_group_id: Option<String>,
}

/// Validated declared container cluster configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ClusterDefinitionInput")]
pub struct ClusterDefinition {
    name: NonEmptyString,
    description: Option<String>,
    vpc: NonEmptyString,
    subnet: NonEmptyString,
    region: NonEmptyString,
    az: Option<String>,
    security_group_id: Option<String>,
}

impl ClusterDefinition {
    /// Creates a validated cluster definition.
    pub fn new(input: ClusterDefinitionInput) -> AppResult<Self> {
        Ok(Self {
            name: NonEmptyString::new(input.name)?,
            description: trimmed(input.description),
            vpc: NonEmptyString::new(input.vpc)?,
            subnet: NonEmptyString::new(input.subnet)?,
            region: NonEmptyString::new(input.region)?,
            az: trimmed(input.az),
            security_group_id: trimmed(input.security_group_id),
        })
    }

    /// Returns the cluster name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the VPC identifier.
    #[must_use]
    pub fn vpc(&self) -> &NonEmptyString {
        &self.vpc
    }

    /// Returns the subnet identifier.
    #[must_use]
    pub fn subnet(&self) -> &NonEmptyString {
        &self.subnet
    }

    /// Returns the region.
    #[must_use]
    pub fn region(&self) -> &NonEmptyString {
        &self.region
    }

    /// Returns the optional availability zone.
    #[must_use]
    pub fn az(&self) -> Option<&str> {
        self.az.as_deref()
    }

    /// Returns the optional security group identifier.
    #[must_use]
    pub fn security_group_id(&self) -> Option<&str> {
        self.security_group_id.as_deref()
    }
}

impl TryFrom<ClusterDefinitionInput> for ClusterDefinition {
    type Error = AppError;

    fn try_from(input: ClusterDefinitionInput) -> Result<Self, Self::Error> {
        Self::new(input)
    }
}

/// Container cluster as reported by the container engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Backend identifier.
    pub id: String,
    /// Cluster name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// VPC identifier, when reported.
    pub vpc: Option<String>,
    /// Subnet identifier, when reported.
    pub subnet: Option<String>,
    /// Region, when reported.
    pub region: Option<String>,
    /// Availability zone.
    pub az: Option<String>,
    /// Security group identifier.
    pub security_group_id: Option<String>,
    /// Backend-reported status.
    pub status: Option<String>,
}

impl Cluster {
    /// Rejects a declared change to anything but the description.
    ///
    /// Attributes the backend did not report are not compared.
    pub fn ensure_only_description_changed(&self, target: &ClusterDefinition) -> AppResult<()> {
        let changed = [
            ("name", self.name != target.name().as_str()),
            ("vpc", differs(self.vpc.as_deref(), Some(target.vpc().as_str()))),
            ("subnet", differs(self.subnet.as_deref(), Some(target.subnet().as_str()))),
            ("region", differs(self.region.as_deref(), Some(target.region().as_str()))),
            ("az", differs(self.az.as_deref(), target.az())),
            (
                "security_group_id",
                differs(self.security_group_id.as_deref(), target.security_group_id()),
            ),
        ];

        match changed.iter().find(|(_, differs)| *differs) {
            Some((field, _)) => Err(AppError::Validation(format!(
                "cluster {field} cannot be changed after creation"
            ))),
            None => Ok(()),
        }
    }
}

fn differs(observed: Option<&str>, declared: Option<&str>) -> bool {
    observed.is_some_and(|observed| Some(observed) != declared)
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim().to_owned();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}
