//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod agency;
mod cluster;
mod identity;
mod project_role;

pub use agency::{Agency, AgencyDefinition, AgencyDefinitionInput, AgencySnapshot, AgencyState};
pub use cluster::{Cluster, ClusterDefinition, ClusterDefinitionInput};
pub use identity::{AttachmentScope, Domain, NameIndex, Project, Role, RoleScope};
pub use project_role::{ProjectRoleDiff, ProjectRolePair, ProjectRoleSet, ProjectRoles};
