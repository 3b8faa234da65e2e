use async_trait::async_trait;

use skyward_core::AppResult;
use skyward_domain::{Agency, AttachmentScope, Domain, Project, Role, RoleScope};

/// Opaque continuation token returned by a paged listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageToken(String);

impl PageToken {
    /// Wraps a backend continuation value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw continuation value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Token for the following page, `None` on the last page.
    pub next: Option<PageToken>,
}

/// Input payload for creating an agency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAgencyInput {
    /// Agency name.
    pub name: String,
    /// Owning domain identifier.
    pub domain_id: String,
    /// Name of the trusted domain.
    pub trust_domain_name: String,
    /// Optional description.
    pub description: Option<String>,
}

/// Input payload for updating an agency; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateAgencyInput {
    /// Name of the trusted domain.
    pub trust_domain_name: Option<String>,
    /// Description; an empty string clears it.
    pub description: Option<String>,
}

/// Port for the identity service backing agencies, projects and roles.
///
/// Implementations report a missing resource as a backend error with status
/// 404 so callers can tell it apart from other failures.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Lists domains with the given name.
    async fn list_domains(&self, name: &str, page: Option<PageToken>) -> AppResult<Page<Domain>>;

    /// Lists projects of a domain.
    async fn list_projects(
        &self,
        domain_id: &str,
        page: Option<PageToken>,
    ) -> AppResult<Page<Project>>;

    /// Lists roles of a namespace.
    async fn list_roles(&self, scope: &RoleScope, page: Option<PageToken>)
    -> AppResult<Page<Role>>;

    /// Creates an agency.
    async fn create_agency(&self, input: CreateAgencyInput) -> AppResult<Agency>;

    /// Fetches one agency.
    async fn get_agency(&self, agency_id: &str) -> AppResult<Agency>;

    /// Updates mutable agency attributes.
    async fn update_agency(&self, agency_id: &str, input: UpdateAgencyInput) -> AppResult<Agency>;

    /// Deletes an agency.
    async fn delete_agency(&self, agency_id: &str) -> AppResult<()>;

    /// Grants a role to an agency within a scope.
    async fn attach_role(
        &self,
        agency_id: &str,
        scope: &AttachmentScope,
        role_id: &str,
    ) -> AppResult<()>;

    /// Revokes a role from an agency within a scope.
    async fn detach_role(
        &self,
        agency_id: &str,
        scope: &AttachmentScope,
        role_id: &str,
    ) -> AppResult<()>;

    /// Lists roles granted to an agency within a scope.
    async fn list_attached_roles(
        &self,
        agency_id: &str,
        scope: &AttachmentScope,
    ) -> AppResult<Vec<Role>>;
}
