use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use skyward_core::{AppError, AppResult, NonEmptyString, ProviderIdentity, ResourceKind};
use skyward_domain::{
    AgencyDefinition, AgencySnapshot, AgencyState, AttachmentScope, NameIndex, ProjectRolePair,
    ProjectRoleSet,
};

use crate::identity_lookup_service::IdentityLookupService;
use crate::identity_ports::{CreateAgencyInput, IdentityBackend, UpdateAgencyInput};
use crate::retry_policy::{OperationTimeouts, RetryPolicy, classify_backend_error, retry_until};


/// Application service reconciling declared agencies with the identity backend.
#[derive(Clone)]
pub struct AgencyService {
    backend: Arc<dyn IdentityBackend>,
    lookup: IdentityLookupService,
    provider: ProviderIdentity,
    timeouts: OperationTimeouts,
}

/// Resolved identifiers needed to apply project-role attachments.
struct AttachmentCatalog {
    projects: NameIndex,
    roles: NameIndex,
}

impl AttachmentCatalog {
    fn resolve(&self, pair: &ProjectRolePair) -> AppResult<(AttachmentScope, String)> {
        let project_id = self.projects.resolve(pair.project())?;
        let role_id = self.roles.resolve(pair.role())?;
        Ok((
            AttachmentScope::Project(project_id.to_owned()),
            role_id.to_owned(),
        ))
    }
}

impl AgencyService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        backend: Arc<dyn IdentityBackend>,
        provider: ProviderIdentity,
        timeouts: OperationTimeouts,
    ) -> Self {
        Self {
            lookup: IdentityLookupService::new(backend.clone()),
            backend,
            provider,
            timeouts,
        }
    }

    /// Creates the agency and attaches every declared project role.
    ///
    /// Attachments issued before a failure are left in place. Once the agency
    /// record exists, any later failure is reported as
    /// [`AppError::PartiallyCreated`] carrying its identifier.
    pub async fn create(&self, definition: &AgencyDefinition) -> AppResult<AgencySnapshot> {
        let state = transition(
            definition.name().as_str(),
            AgencyState::Absent,
            AgencyState::Creating,
        )?;
        let deadline = Instant::now() + self.timeouts.create;

        let (agency_id, domain_id) = within(
            deadline,
            self.timeouts.create,
            "create agency",
            self.create_record(definition),
        )
        .await?;

        let configured = async {
            within(
                deadline,
                self.timeouts.create,
                "create agency",
                self.attach_declared(&agency_id, &domain_id, definition),
            )
            .await?;
            transition(&agency_id, state, AgencyState::Present)?;
            self.import(&agency_id).await
        }
        .await;

        configured.map_err(|error| {
            warn!(agency_id = %agency_id, "agency was created but is not fully configured");
            AppError::PartiallyCreated {
                kind: ResourceKind::Agency,
                id: agency_id.clone(),
                source: Box::new(error),
            }
        })
    }

    /// Reads the agency and rebuilds its attached project roles.
    ///
    /// Returns `None` when the backend no longer knows the agency.
    pub async fn read(&self, agency_id: &str) -> AppResult<Option<AgencySnapshot>> {
        let agency = match self.backend.get_agency(agency_id).await {
            Ok(agency) => agency,
            Err(error) if error.is_backend_not_found() => {
                info!(agency_id, "agency no longer exists");
                return Ok(None);
            }
            Err(error) => {
                return Err(error.with_context(format!("reading agency '{agency_id}'")));
            }
        };
        debug!(agency_id, name = %agency.name, "retrieved agency");

        let projects = self
            .lookup
            .project_index(&agency.domain_id)
            .await
            .map_err(|error| error.with_context("querying the projects"))?;

        let mut project_roles = ProjectRoleSet::new();
        for (project_name, project_id) in projects.iter() {
            let scope = AttachmentScope::Project(project_id.to_owned());
            let attached = match self.backend.list_attached_roles(agency_id, &scope).await {
                Ok(roles) => roles,
                Err(error) if error.is_backend_not_found() => Vec::new(),
                Err(error) => {
                    return Err(error.with_context(format!(
                        "querying the roles attached on project '{project_name}'"
                    )));
                }
            };
            if attached.is_empty() {
                continue;
            }

            let Ok(project) = NonEmptyString::new(project_name) else {
                warn!(project_id, "skipping attached roles of a project with a blank name");
                continue;
            };

            let roles = attached.into_iter().filter_map(|role| {
                match role.display_name.map(NonEmptyString::new) {
                    Some(Ok(display_name)) => Some(display_name),
                    _ => {
                        debug!(role_id = %role.id, "skipping attached role without display name");
                        None
                    }
                }
            });
            project_roles.insert(project, roles);
        }

        Ok(Some(AgencySnapshot {
            agency,
            region: self.provider.region().to_owned(),
            project_roles,
        }))
    }

    /// Reads an agency that is expected to exist, for example on import.
    pub async fn import(&self, agency_id: &str) -> AppResult<AgencySnapshot> {
        self.read(agency_id).await?.ok_or_else(|| AppError::NotFound {
            kind: ResourceKind::Agency,
            name: agency_id.to_owned(),
        })
    }

    /// Moves the agency from the `current` configuration to `target`.
    ///
    /// Returns `None` when the agency disappeared while being updated.
    pub async fn update(
        &self,
        agency_id: &str,
        current: &AgencyDefinition,
        target: &AgencyDefinition,
    ) -> AppResult<Option<AgencySnapshot>> {
        current.ensure_immutable_fields_unchanged(target)?;
        let state = transition(agency_id, AgencyState::Present, AgencyState::Updating)?;

        if current.description() != target.description() {
            let input = UpdateAgencyInput {
                trust_domain_name: Some(target.trust_domain_name().as_str().to_owned()),
                description: Some(target.description().unwrap_or_default().to_owned()),
            };
            debug!(agency_id, ?input, "updating agency attributes");

            let backend = self.backend.as_ref();
            let result = retry_until(
                &RetryPolicy::with_timeout(self.timeouts.update),
                "update agency",
                classify_backend_error,
                || backend.update_agency(agency_id, input.clone()),
            )
            .await;

            match result {
                Ok(_) => {}
                Err(error) if error.is_backend_not_found() => {
                    transition(agency_id, state, AgencyState::Absent)?;
                    return Ok(None);
                }
                Err(error) => {
                    return Err(error.with_context(format!("updating agency '{agency_id}'")));
                }
            }
        }

        let diff = current.project_roles().diff(target.project_roles());
        if !diff.is_empty() {
            info!(
                agency_id,
                detach = diff.to_delete().len(),
                attach = diff.to_add().len(),
                "reconciling project roles"
            );

            let domain_id = self
                .lookup
                .resolve_domain_id(&self.provider)
                .await
                .map_err(|error| error.with_context("resolving the owning domain"))?;
            let catalog = self.load_catalog(&domain_id).await?;

            for pair in diff.to_delete() {
                self.detach(agency_id, &catalog, pair).await?;
            }
            for pair in diff.to_add() {
                self.attach(agency_id, &catalog, pair).await?;
            }
        }

        self.warn_unapplied_domain_roles(agency_id, target);
        transition(agency_id, state, AgencyState::Present)?;
        self.read(agency_id).await
    }

    /// Deletes the agency; an agency that is already gone counts as deleted.
    pub async fn delete(&self, agency_id: &str) -> AppResult<()> {
        let state = transition(agency_id, AgencyState::Present, AgencyState::Deleting)?;
        debug!(agency_id, "deleting agency");

        let backend = self.backend.as_ref();
        let result = retry_until(
            &RetryPolicy::with_timeout(self.timeouts.delete),
            "delete agency",
            classify_backend_error,
            || backend.delete_agency(agency_id),
        )
        .await;

        match result {
            Ok(()) => {}
            Err(error) if error.is_backend_not_found() => {
                info!(agency_id, "deleting an unavailable agency");
            }
            Err(error) => {
                return Err(error.with_context(format!("deleting agency '{agency_id}'")));
            }
        }

        transition(agency_id, state, AgencyState::Absent)?;
        Ok(())
    }

    async fn create_record(&self, definition: &AgencyDefinition) -> AppResult<(String, String)> {
        let domain_id = self
            .lookup
            .resolve_domain_id(&self.provider)
            .await
            .map_err(|error| error.with_context("resolving the owning domain"))?;

        let agency = self
            .backend
            .create_agency(CreateAgencyInput {
                name: definition.name().as_str().to_owned(),
                domain_id: domain_id.clone(),
                trust_domain_name: definition.trust_domain_name().as_str().to_owned(),
                description: definition.description().map(str::to_owned),
            })
            .await
            .map_err(|error| error.with_context(format!("creating agency '{}'", definition.name())))?;
        info!(agency_id = %agency.id, name = %agency.name, "agency created");

        Ok((agency.id, domain_id))
    }

    async fn attach_declared(
        &self,
        agency_id: &str,
        domain_id: &str,
        definition: &AgencyDefinition,
    ) -> AppResult<()> {
        self.warn_unapplied_domain_roles(agency_id, definition);

        let catalog = self.load_catalog(domain_id).await?;
        debug!(
            agency_id,
            projects = definition.project_roles().project_count(),
            "attaching declared project roles"
        );
        for pair in definition.project_roles().pairs() {
            self.attach(agency_id, &catalog, &pair).await?;
        }
        Ok(())
    }

    async fn load_catalog(&self, domain_id: &str) -> AppResult<AttachmentCatalog> {
        let projects = self
            .lookup
            .project_index(domain_id)
            .await
            .map_err(|error| error.with_context("querying the projects"))?;
        let roles = self
            .lookup
            .all_roles(domain_id)
            .await
            .map_err(|error| error.with_context("querying the roles"))?;

        Ok(AttachmentCatalog { projects, roles })
    }

    async fn attach(
        &self,
        agency_id: &str,
        catalog: &AttachmentCatalog,
        pair: &ProjectRolePair,
    ) -> AppResult<()> {
        let (scope, role_id) = catalog.resolve(pair)?;
        self.backend
            .attach_role(agency_id, &scope, &role_id)
            .await
            .map_err(|error| {
                error.with_context(format!("attaching {pair} to agency '{agency_id}'"))
            })?;
        debug!(agency_id, %pair, "attached role");
        Ok(())
    }

    async fn detach(
        &self,
        agency_id: &str,
        catalog: &AttachmentCatalog,
        pair: &ProjectRolePair,
    ) -> AppResult<()> {
        let (scope, role_id) = catalog.resolve(pair)?;
        self.backend
            .detach_role(agency_id, &scope, &role_id)
            .await
            .map_err(|error| {
                error.with_context(format!("detaching {pair} from agency '{agency_id}'"))
            })?;
        debug!(agency_id, %pair, "detached role");
        Ok(())
    }

    fn warn_unapplied_domain_roles(&self, agency_id: &str, definition: &AgencyDefinition) {
        if !definition.domain_roles().is_empty() {
            warn!(
                agency_id,
                domain_roles = ?definition.domain_roles(),
                "domain-scoped roles are declared but not attached"
            );
        }
    }
}

fn transition(agency: &str, from: AgencyState, to: AgencyState) -> AppResult<AgencyState> {
    let next = from.transition(to)?;
    debug!(agency, from = from.as_str(), to = next.as_str(), "agency state");
    Ok(next)
}

async fn within<T>(
    deadline: Instant,
    timeout: Duration,
    operation: &str,
    future: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    tokio::time::timeout_at(deadline, future)
        .await
        .unwrap_or_else(|_| {
            Err(AppError::Timeout {
                operation: operation.to_owned(),
                timeout,
                last_error: None,
            })
        })
}
