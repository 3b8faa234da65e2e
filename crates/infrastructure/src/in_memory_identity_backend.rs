use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use skyward_application::{
    CreateAgencyInput, IdentityBackend, Page, PageToken, UpdateAgencyInput,
};
use skyward_core::{AppError, AppResult, BackendError};
use skyward_domain::{Agency, AttachmentScope, Domain, Project, Role, RoleScope};

const DEFAULT_PAGE_SIZE: usize = 50;

/// Names a dry-run identity backend starts out with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InMemoryIdentitySeed {
    /// Domain names.
    #[serde(default)]
    pub domains: Vec<String>,
    /// Project names per domain name.
    #[serde(default)]
    pub projects: HashMap<String, Vec<String>>,
    /// Global role display names.
    #[serde(default)]
    pub global_roles: Vec<String>,
    /// Custom role display names per domain name.
    #[serde(default)]
    pub custom_roles: HashMap<String, Vec<String>>,
}

type AttachmentKey = (String, &'static str, String, String);

/// In-process identity backend with offset paging.
#[derive(Debug)]
pub struct InMemoryIdentityBackend {
    page_size: usize,
    domains: Vec<Domain>,
    projects: HashMap<String, Vec<Project>>,
    global_roles: Vec<Role>,
    custom_roles: HashMap<String, Vec<Role>>,
    agencies: RwLock<HashMap<String, Agency>>,
    attachments: RwLock<BTreeSet<AttachmentKey>>,
}

impl InMemoryIdentityBackend {
    /// Creates a backend holding the seeded domains, projects and roles.
    #[must_use]
    pub fn new(seed: InMemoryIdentitySeed) -> Self {
        let domains: Vec<Domain> = seed
            .domains
            .into_iter()
            .map(|name| Domain {
                id: new_id(),
                name,
            })
            .collect();
        let domain_id = |name: &str| {
            domains
                .iter()
                .find(|domain| domain.name == name)
                .map(|domain| domain.id.clone())
        };

        let projects = seed
            .projects
            .into_iter()
            .filter_map(|(domain, names)| {
                let projects: Vec<Project> = names
                    .into_iter()
                    .map(|name| Project { id: new_id(), name })
                    .collect();
                domain_id(&domain).map(|id| (id, projects))
            })
            .collect();
        let custom_roles = seed
            .custom_roles
            .into_iter()
            .filter_map(|(domain, names)| {
                let roles: Vec<Role> = names.into_iter().map(named_role).collect();
                domain_id(&domain).map(|id| (id, roles))
            })
            .collect();

        Self {
            page_size: DEFAULT_PAGE_SIZE,
            global_roles: seed.global_roles.into_iter().map(named_role).collect(),
            projects,
            custom_roles,
            domains,
            agencies: RwLock::new(HashMap::new()),
            attachments: RwLock::new(BTreeSet::new()),
        }
    }

    /// Overrides the listing page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn known_role(&self, role_id: &str) -> Option<&Role> {
        self.global_roles
            .iter()
            .chain(self.custom_roles.values().flatten())
            .find(|role| role.id == role_id)
    }

    fn page<T: Clone>(&self, items: &[T], page: Option<PageToken>) -> AppResult<Page<T>> {
        let offset = match page {
            Some(token) => token.as_str().parse::<usize>().map_err(|_| {
                BackendError::status(400, format!("invalid page marker '{}'", token.as_str()))
            })?,
            None => 0,
        };
        let end = offset.saturating_add(self.page_size).min(items.len());

        Ok(Page {
            items: items.get(offset..end).map(<[T]>::to_vec).unwrap_or_default(),
            next: (end < items.len()).then(|| PageToken::new(end.to_string())),
        })
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn named_role(display_name: String) -> Role {
    Role {
        id: new_id(),
        display_name: Some(display_name),
    }
}

fn not_found(kind: &str, id: &str) -> AppError {
    BackendError::status(404, format!("{kind} '{id}' not found")).into()
}

fn attachment_key(agency_id: &str, scope: &AttachmentScope, role_id: &str) -> AttachmentKey {
    (
        agency_id.to_owned(),
        scope.kind(),
        scope.id().to_owned(),
        role_id.to_owned(),
    )
}

#[async_trait]
impl IdentityBackend for InMemoryIdentityBackend {
    async fn list_domains(&self, name: &str, page: Option<PageToken>) -> AppResult<Page<Domain>> {
        let matches: Vec<Domain> = self
            .domains
            .iter()
            .filter(|domain| domain.name == name)
            .cloned()
            .collect();
        self.page(&matches, page)
    }

    async fn list_projects(
        &self,
        domain_id: &str,
        page: Option<PageToken>,
    ) -> AppResult<Page<Project>> {
        let projects = self.projects.get(domain_id).map(Vec::as_slice).unwrap_or_default();
        self.page(projects, page)
    }

    async fn list_roles(
        &self,
        scope: &RoleScope,
        page: Option<PageToken>,
    ) -> AppResult<Page<Role>> {
        let roles = match scope {
            RoleScope::Global => self.global_roles.as_slice(),
            RoleScope::Domain(domain_id) => self
                .custom_roles
                .get(domain_id)
                .map(Vec::as_slice)
                .unwrap_or_default(),
        };
        self.page(roles, page)
    }

    async fn create_agency(&self, input: CreateAgencyInput) -> AppResult<Agency> {
        let trust_domain_id = self
            .domains
            .iter()
            .find(|domain| domain.name == input.trust_domain_name)
            .map(|domain| domain.id.clone());

        let mut agencies = self.agencies.write().await;
        if agencies.values().any(|agency| {
            agency.domain_id == input.domain_id && agency.name == input.name
        }) {
            return Err(BackendError::status(
                409,
                format!("agency '{}' already exists", input.name),
            )
            .into());
        }

        let agency = Agency {
            id: new_id(),
            name: input.name,
            domain_id: input.domain_id,
            trust_domain_id,
            trust_domain_name: input.trust_domain_name,
            description: input.description.filter(|value| !value.is_empty()),
            duration: Some("FOREVER".to_owned()),
            expire_time: None,
            create_time: Some(Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
        };
        agencies.insert(agency.id.clone(), agency.clone());
        Ok(agency)
    }

    async fn get_agency(&self, agency_id: &str) -> AppResult<Agency> {
        self.agencies
            .read()
            .await
            .get(agency_id)
            .cloned()
            .ok_or_else(|| not_found("agency", agency_id))
    }

    async fn update_agency(&self, agency_id: &str, input: UpdateAgencyInput) -> AppResult<Agency> {
        let mut agencies = self.agencies.write().await;
        let agency = agencies
            .get_mut(agency_id)
            .ok_or_else(|| not_found("agency", agency_id))?;

        if let Some(trust_domain_name) = input.trust_domain_name {
            agency.trust_domain_name = trust_domain_name;
        }
        if let Some(description) = input.description {
            agency.description = (!description.is_empty()).then_some(description);
        }
        Ok(agency.clone())
    }

    async fn delete_agency(&self, agency_id: &str) -> AppResult<()> {
        if self.agencies.write().await.remove(agency_id).is_none() {
            return Err(not_found("agency", agency_id));
        }

        self.attachments
            .write()
            .await
            .retain(|(stored_agency_id, ..)| stored_agency_id != agency_id);
        Ok(())
    }

    async fn attach_role(
        &self,
        agency_id: &str,
        scope: &AttachmentScope,
        role_id: &str,
    ) -> AppResult<()> {
        if !self.agencies.read().await.contains_key(agency_id) {
            return Err(not_found("agency", agency_id));
        }
        if self.known_role(role_id).is_none() {
            return Err(not_found("role", role_id));
        }

        self.attachments
            .write()
            .await
            .insert(attachment_key(agency_id, scope, role_id));
        Ok(())
    }

    async fn detach_role(
        &self,
        agency_id: &str,
        scope: &AttachmentScope,
        role_id: &str,
    ) -> AppResult<()> {
        let removed = self
            .attachments
            .write()
            .await
            .remove(&attachment_key(agency_id, scope, role_id));
        if removed {
            Ok(())
        } else {
            Err(not_found("role attachment", role_id))
        }
    }

    async fn list_attached_roles(
        &self,
        agency_id: &str,
        scope: &AttachmentScope,
    ) -> AppResult<Vec<Role>> {
        if !self.agencies.read().await.contains_key(agency_id) {
            return Err(not_found("agency", agency_id));
        }

        let attachments = self.attachments.read().await;
        Ok(attachments
            .iter()
            .filter(|(stored_agency_id, kind, scope_id, _)| {
                stored_agency_id == agency_id && *kind == scope.kind() && scope_id == scope.id()
            })
            .filter_map(|(_, _, _, role_id)| self.known_role(role_id).cloned())
            .collect())
    }
}
