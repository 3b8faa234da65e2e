use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use skyward_core::{AppError, AppResult, BackendError, ProviderIdentity, ResourceKind};
use skyward_domain::{NameIndex, RoleScope};

use crate::identity_ports::{IdentityBackend, PageToken};


/// Resolves names to backend identifiers for domains, projects and roles.
///
/// Every call lists the backend afresh; nothing is cached between calls.
#[derive(Clone)]
pub struct IdentityLookupService {
    backend: Arc<dyn IdentityBackend>,
}

impl IdentityLookupService {
    /// Creates a lookup service over an identity backend.
    #[must_use]
    pub fn new(backend: Arc<dyn IdentityBackend>) -> Self {
        Self { backend }
    }

    /// Returns the owning domain identifier of the provider account.
    ///
    /// A pre-configured identifier short-circuits the lookup. Otherwise the
    /// configured domain name must match exactly one domain.
    pub async fn resolve_domain_id(&self, identity: &ProviderIdentity) -> AppResult<String> {
        if let Some(domain_id) = identity.domain_id() {
            return Ok(domain_id.to_owned());
        }

        let name = identity.domain_name().ok_or_else(|| {
            AppError::Configuration(
                "a domain name is required to look up the domain id".to_owned(),
            )
        })?;

        let mut cursor = PageCursor::new(ResourceKind::Domain);
        let mut domains = Vec::new();
        while let Some(page_token) = cursor.next_request() {
            let page = self
                .backend
                .list_domains(name, page_token)
                .await
                .map_err(|error| error.with_context(format!("listing domains named '{name}'")))?;
            domains.extend(page.items);
            cursor.advance(page.next)?;
        }

        match domains.as_slice() {
            [] => Err(AppError::NotFound {
                kind: ResourceKind::Domain,
                name: name.to_owned(),
            }),
            [domain] => Ok(domain.id.clone()),
            matches => Err(AppError::AmbiguousResult {
                kind: ResourceKind::Domain,
                name: name.to_owned(),
                count: matches.len(),
            }),
        }
    }

    /// Returns project name to identifier mappings for a domain.
    pub async fn project_index(&self, domain_id: &str) -> AppResult<NameIndex> {
        let mut cursor = PageCursor::new(ResourceKind::Project);
        let mut index = NameIndex::new(ResourceKind::Project);
        while let Some(page_token) = cursor.next_request() {
            let page = self
                .backend
                .list_projects(domain_id, page_token)
                .await
                .map_err(|error| {
                    error.with_context(format!("listing projects of domain '{domain_id}'"))
                })?;

            for project in page.items {
                if let Some(previous_id) = index.insert(project.name.as_str(), project.id.as_str())
                {
                    debug!(
                        project = %project.name,
                        previous_id = %previous_id,
                        project_id = %project.id,
                        "duplicate project name, keeping the later entry"
                    );
                }
            }
            cursor.advance(page.next)?;
        }

        debug!(domain_id, projects = index.len(), "listed projects");
        Ok(index)
    }

    /// Returns role display name to identifier mappings for one namespace.
    ///
    /// Roles without a display name are skipped.
    pub async fn role_index(&self, scope: &RoleScope) -> AppResult<NameIndex> {
        let mut cursor = PageCursor::new(ResourceKind::Role);
        let mut index = NameIndex::new(ResourceKind::Role);
        while let Some(page_token) = cursor.next_request() {
            let page = self.backend.list_roles(scope, page_token).await?;

            for role in page.items {
                match role.display_name {
                    Some(display_name) => {
                        index.insert(display_name, role.id);
                    }
                    None => debug!(role_id = %role.id, "skipping role without display name"),
                }
            }
            cursor.advance(page.next)?;
        }

        debug!(
            domain_id = scope.domain_id().unwrap_or("<global>"),
            roles = index.len(),
            "listed roles"
        );
        Ok(index)
    }

    /// Returns global roles overlaid with the custom roles of a domain.
    ///
    /// A custom role shadows a global role with the same display name.
    pub async fn all_roles(&self, domain_id: &str) -> AppResult<NameIndex> {
        let global = self
            .role_index(&RoleScope::Global)
            .await
            .map_err(|error| error.with_context("listing global roles"))?;

        let custom = self
            .role_index(&RoleScope::Domain(domain_id.to_owned()))
            .await
            .map_err(|error| error.with_context("listing domain's custom roles"))?;

        Ok(global.overlay(custom))
    }
}

/// Walks continuation tokens and rejects a backend that hands out a token twice.
struct PageCursor {
    kind: ResourceKind,
    pending: Option<Option<PageToken>>,
    seen: HashSet<PageToken>,
}

impl PageCursor {
    fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            pending: Some(None),
            seen: HashSet::new(),
        }
    }

    fn next_request(&mut self) -> Option<Option<PageToken>> {
        self.pending.take()
    }

    fn advance(&mut self, next: Option<PageToken>) -> AppResult<()> {
        let Some(token) = next else {
            return Ok(());
        };

        if !self.seen.insert(token.clone()) {
            return Err(AppError::Backend(BackendError::malformed(format!(
                "{} listing repeated page token '{}'",
                self.kind,
                token.as_str()
            ))));
        }

        self.pending = Some(Some(token));
        Ok(())
    }
}
