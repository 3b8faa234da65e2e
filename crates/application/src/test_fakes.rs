use std::collections::{BTreeSet, HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use skyward_core::{AppError, AppResult, BackendError};
use skyward_domain::{Agency, AttachmentScope, Domain, Project, Role, RoleScope};

use crate::identity_ports::{
    CreateAgencyInput, IdentityBackend, Page, PageToken, UpdateAgencyInput,
};

/// Identity backend double with offset-based paging and failure injection.
#[derive(Default)]
pub(crate) struct FakeIdentityBackend {
    pub page_size: usize,
    pub domains: Vec<Domain>,
    pub projects: HashMap<String, Vec<Project>>,
    pub global_roles: Vec<Role>,
    pub custom_roles: HashMap<String, Vec<Role>>,
    pub failing_role_scope: Option<RoleScope>,
    pub looping_project_pages: bool,
    pub agencies: Mutex<HashMap<String, Agency>>,
    pub attachments: Mutex<BTreeSet<(String, String, String)>>,
    pub calls: Mutex<Vec<String>>,
    pub update_failures: Mutex<VecDeque<AppError>>,
    pub delete_failures: Mutex<VecDeque<AppError>>,
    pub failing_attach_role: Mutex<Option<String>>,
    pub missing_attached_role_names: bool,
}

impl FakeIdentityBackend {
    pub(crate) fn role(id: &str, display_name: &str) -> Role {
        Role {
            id: id.to_owned(),
            display_name: Some(display_name.to_owned()),
        }
    }

    pub(crate) fn project(id: &str, name: &str) -> Project {
        Project {
            id: id.to_owned(),
            name: name.to_owned(),
        }
    }

    fn role_name(&self, role_id: &str) -> Option<String> {
        self.global_roles
            .iter()
            .chain(self.custom_roles.values().flatten())
            .find(|role| role.id == role_id)
            .and_then(|role| role.display_name.clone())
    }

    async fn record(&self, call: String) {
        self.calls.lock().await.push(call);
    }

    pub(crate) async fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

fn paginate<T: Clone>(items: &[T], page: Option<PageToken>, page_size: usize) -> AppResult<Page<T>> {
    if page_size == 0 {
        return Ok(Page {
            items: items.to_vec(),
            next: None,
        });
    }

    let offset = match page {
        Some(token) => token
            .as_str()
            .parse::<usize>()
            .map_err(|error| AppError::from(BackendError::status(400, error.to_string())))?,
        None => 0,
    };
    let end = (offset + page_size).min(items.len());
    let next = (end < items.len()).then(|| PageToken::new(end.to_string()));

    Ok(Page {
        items: items.get(offset..end).map(<[T]>::to_vec).unwrap_or_default(),
        next,
    })
}

fn not_found(what: &str) -> AppError {
    AppError::from(BackendError::status(404, format!("{what} not found")))
}

#[async_trait]
impl IdentityBackend for FakeIdentityBackend {
    async fn list_domains(&self, name: &str, page: Option<PageToken>) -> AppResult<Page<Domain>> {
        let matches: Vec<Domain> = self
            .domains
            .iter()
            .filter(|domain| domain.name == name)
            .cloned()
            .collect();
        paginate(&matches, page, self.page_size)
    }

    async fn list_projects(
        &self,
        domain_id: &str,
        page: Option<PageToken>,
    ) -> AppResult<Page<Project>> {
        if self.looping_project_pages {
            return Ok(Page {
                items: Vec::new(),
                next: Some(PageToken::new("again")),
            });
        }

        let projects = self.projects.get(domain_id).cloned().unwrap_or_default();
        paginate(&projects, page, self.page_size)
    }

    async fn list_roles(
        &self,
        scope: &RoleScope,
        page: Option<PageToken>,
    ) -> AppResult<Page<Role>> {
        if self.failing_role_scope.as_ref() == Some(scope) {
            return Err(AppError::from(BackendError::status(500, "role listing failed")));
        }

        let roles = match scope {
            RoleScope::Global => self.global_roles.clone(),
            RoleScope::Domain(domain_id) => {
                self.custom_roles.get(domain_id).cloned().unwrap_or_default()
            }
        };
        paginate(&roles, page, self.page_size)
    }

    async fn create_agency(&self, input: CreateAgencyInput) -> AppResult<Agency> {
        let agency = Agency {
            id: format!("agency-{}", input.name),
            name: input.name,
            domain_id: input.domain_id,
            trust_domain_id: Some("trust-domain-id".to_owned()),
            trust_domain_name: input.trust_domain_name,
            description: input.description,
            duration: Some("FOREVER".to_owned()),
            expire_time: None,
            create_time: Some("2026-10-16T08:00:00.000000".to_owned()),
        };
        self.record(format!("create:{}", agency.id)).await;
        self.agencies
            .lock()
            .await
            .insert(agency.id.clone(), agency.clone());
        Ok(agency)
    }

    async fn get_agency(&self, agency_id: &str) -> AppResult<Agency> {
        self.agencies
            .lock()
            .await
            .get(agency_id)
            .cloned()
            .ok_or_else(|| not_found("agency"))
    }

    async fn update_agency(&self, agency_id: &str, input: UpdateAgencyInput) -> AppResult<Agency> {
        self.record(format!("update:{agency_id}")).await;
        if let Some(error) = self.update_failures.lock().await.pop_front() {
            return Err(error);
        }

        let mut agencies = self.agencies.lock().await;
        let agency = agencies
            .get_mut(agency_id)
            .ok_or_else(|| not_found("agency"))?;
        if let Some(trust_domain_name) = input.trust_domain_name {
            agency.trust_domain_name = trust_domain_name;
        }
        if let Some(description) = input.description {
            agency.description = (!description.is_empty()).then_some(description);
        }
        Ok(agency.clone())
    }

    async fn delete_agency(&self, agency_id: &str) -> AppResult<()> {
        self.record(format!("delete:{agency_id}")).await;
        if let Some(error) = self.delete_failures.lock().await.pop_front() {
            return Err(error);
        }

        self.agencies
            .lock()
            .await
            .remove(agency_id)
            .map(|_| ())
            .ok_or_else(|| not_found("agency"))
    }

    async fn attach_role(
        &self,
        agency_id: &str,
        scope: &AttachmentScope,
        role_id: &str,
    ) -> AppResult<()> {
        self.record(format!("attach:{}:{role_id}", scope.id())).await;
        let mut failing_attach_role = self.failing_attach_role.lock().await;
        if failing_attach_role.as_deref() == Some(role_id) {
            *failing_attach_role = None;
            return Err(AppError::from(BackendError::status(500, "attach failed")));
        }
        drop(failing_attach_role);

        self.attachments.lock().await.insert((
            agency_id.to_owned(),
            scope.id().to_owned(),
            role_id.to_owned(),
        ));
        Ok(())
    }

    async fn detach_role(
        &self,
        agency_id: &str,
        scope: &AttachmentScope,
        role_id: &str,
    ) -> AppResult<()> {
        self.record(format!("detach:{}:{role_id}", scope.id())).await;
        let removed = self.attachments.lock().await.remove(&(
            agency_id.to_owned(),
            scope.id().to_owned(),
            role_id.to_owned(),
        ));
        if removed {
            Ok(())
        } else {
            Err(not_found("attachment"))
        }
    }

    async fn list_attached_roles(
        &self,
        agency_id: &str,
        scope: &AttachmentScope,
    ) -> AppResult<Vec<Role>> {
        let attachments = self.attachments.lock().await;
        let roles: Vec<Role> = attachments
            .iter()
            .filter(|(stored_agency_id, scope_id, _)| {
                stored_agency_id == agency_id && scope_id == scope.id()
            })
            .map(|(_, _, role_id)| Role {
                id: role_id.clone(),
                display_name: if self.missing_attached_role_names {
                    None
                } else {
                    self.role_name(role_id)
                },
            })
            .collect();

        if roles.is_empty() {
            return Err(not_found("role attachments"));
        }
        Ok(roles)
    }
}
