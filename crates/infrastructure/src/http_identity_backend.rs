use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use skyward_application::{
    CreateAgencyInput, IdentityBackend, Page, PageToken, UpdateAgencyInput,
};
use skyward_core::{AppResult, BackendError};
use skyward_domain::{Agency, AttachmentScope, Domain, Project, Role, RoleScope};

use crate::http_api_client::{HttpApiClient, endpoint_url, parse_endpoint};

#[cfg(test)]
mod tests;

/// Default base of the agency API.
pub const DEFAULT_AGENCY_ENDPOINT: &str = "https://iam.myhwclouds.com:443/v3.0/";
/// Default base of the identity API.
pub const DEFAULT_IDENTITY_ENDPOINT: &str = "https://iam.myhwclouds.com:443/v3/";
/// Default base of the auth API.
pub const DEFAULT_AUTH_ENDPOINT: &str = "https://iam.myhwclouds.com:443/v3/auth/";

/// Base URLs of the identity service APIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityEndpoints {
    agency: Url,
    identity: Url,
    auth: Url,
}

impl IdentityEndpoints {
    /// Parses the three endpoint bases.
    pub fn parse(agency: &str, identity: &str, auth: &str) -> AppResult<Self> {
        Ok(Self {
            agency: parse_endpoint("agency", agency)?,
            identity: parse_endpoint("identity", identity)?,
            auth: parse_endpoint("auth", auth)?,
        })
    }

    /// Returns the public cloud defaults.
    pub fn defaults() -> AppResult<Self> {
        Self::parse(
            DEFAULT_AGENCY_ENDPOINT,
            DEFAULT_IDENTITY_ENDPOINT,
            DEFAULT_AUTH_ENDPOINT,
        )
    }
}

/// Identity backend speaking the identity service REST API.
pub struct HttpIdentityBackend {
    client: HttpApiClient,
    endpoints: IdentityEndpoints,
}

impl HttpIdentityBackend {
    /// Creates a backend over an authenticated client.
    #[must_use]
    pub fn new(client: HttpApiClient, endpoints: IdentityEndpoints) -> Self {
        Self { client, endpoints }
    }

    fn agency_url(&self, segments: &[&str]) -> AppResult<Url> {
        let mut path = vec!["OS-AGENCY"];
        path.extend_from_slice(segments);
        endpoint_url(&self.endpoints.agency, &path)
    }

    fn attachment_url(
        &self,
        agency_id: &str,
        scope: &AttachmentScope,
        role_id: Option<&str>,
    ) -> AppResult<Url> {
        let mut segments = vec![scope.kind(), scope.id(), "agencies", agency_id, "roles"];
        segments.extend(role_id);
        self.agency_url(&segments)
    }

    async fn list_page<B>(&self, first: Url, page: Option<PageToken>) -> AppResult<B>
    where
        B: for<'de> Deserialize<'de>,
    {
        let url = match page {
            Some(token) => {
                let next = Url::parse(token.as_str()).map_err(|error| {
                    BackendError::malformed(format!(
                        "invalid next page link '{}': {error}",
                        token.as_str()
                    ))
                })?;
                // The auth token must only travel to the configured endpoint.
                if next.origin() != first.origin() {
                    return Err(BackendError::malformed(format!(
                        "next page link '{next}' leaves {}",
                        first.origin().ascii_serialization()
                    ))
                    .into());
                }
                next
            }
            None => first,
        };

        let response = self
            .client
            .execute(self.client.request(Method::GET, url), StatusCode::OK)
            .await?;
        HttpApiClient::decode(response).await
    }

    async fn agency_response(
        &self,
        method: Method,
        url: Url,
        body: Option<&AgencyEnvelope<AgencyRequestBody<'_>>>,
        expected: StatusCode,
    ) -> AppResult<Agency> {
        let mut builder = self.client.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = self.client.execute(builder, expected).await?;
        let envelope: AgencyEnvelope<AgencyBody> = HttpApiClient::decode(response).await?;
        Ok(envelope.agency.into())
    }
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    #[serde(default)]
    next: Option<String>,
}

impl Links {
    fn next_token(self) -> Option<PageToken> {
        self.next
            .filter(|next| !next.trim().is_empty())
            .map(PageToken::new)
    }
}

#[derive(Debug, Deserialize)]
struct DomainList {
    domains: Vec<Domain>,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Deserialize)]
struct ProjectList {
    projects: Vec<Project>,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Deserialize)]
struct RoleList {
    roles: Vec<Role>,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Serialize, Deserialize)]
struct AgencyEnvelope<T> {
    agency: T,
}

#[derive(Debug, Default, Serialize)]
struct AgencyRequestBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    domain_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trust_domain_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct AgencyBody {
    id: String,
    name: String,
    domain_id: String,
    #[serde(default)]
    trust_domain_id: Option<String>,
    trust_domain_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    expire_time: Option<String>,
    #[serde(default)]
    create_time: Option<String>,
}

impl From<AgencyBody> for Agency {
    fn from(body: AgencyBody) -> Self {
        Self {
            id: body.id,
            name: body.name,
            domain_id: body.domain_id,
            trust_domain_id: non_blank(body.trust_domain_id),
            trust_domain_name: body.trust_domain_name,
            description: non_blank(body.description),
            duration: non_blank(body.duration),
            expire_time: non_blank(body.expire_time),
            create_time: non_blank(body.create_time),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[async_trait]
impl IdentityBackend for HttpIdentityBackend {
    async fn list_domains(&self, name: &str, page: Option<PageToken>) -> AppResult<Page<Domain>> {
        let mut first = endpoint_url(&self.endpoints.auth, &["domains"])?;
        first.query_pairs_mut().append_pair("name", name);

        let list: DomainList = self.list_page(first, page).await?;
        Ok(Page {
            items: list.domains,
            next: list.links.next_token(),
        })
    }

    async fn list_projects(
        &self,
        domain_id: &str,
        page: Option<PageToken>,
    ) -> AppResult<Page<Project>> {
        let mut first = endpoint_url(&self.endpoints.identity, &["projects"])?;
        first.query_pairs_mut().append_pair("domain_id", domain_id);

        let list: ProjectList = self.list_page(first, page).await?;
        Ok(Page {
            items: list.projects,
            next: list.links.next_token(),
        })
    }

    async fn list_roles(
        &self,
        scope: &RoleScope,
        page: Option<PageToken>,
    ) -> AppResult<Page<Role>> {
        let mut first = endpoint_url(&self.endpoints.identity, &["roles"])?;
        if let Some(domain_id) = scope.domain_id() {
            first.query_pairs_mut().append_pair("domain_id", domain_id);
        }

        let list: RoleList = self.list_page(first, page).await?;
        Ok(Page {
            items: list.roles,
            next: list.links.next_token(),
        })
    }

    async fn create_agency(&self, input: CreateAgencyInput) -> AppResult<Agency> {
        let body = AgencyEnvelope {
            agency: AgencyRequestBody {
                name: Some(input.name.as_str()),
                domain_id: Some(input.domain_id.as_str()),
                trust_domain_name: Some(input.trust_domain_name.as_str()),
                description: input.description.as_deref(),
            },
        };

        let agency = self
            .agency_response(
                Method::POST,
                self.agency_url(&["agencies"])?,
                Some(&body),
                StatusCode::CREATED,
            )
            .await?;
        debug!(agency_id = %agency.id, "identity service created agency");
        Ok(agency)
    }

    async fn get_agency(&self, agency_id: &str) -> AppResult<Agency> {
        self.agency_response(
            Method::GET,
            self.agency_url(&["agencies", agency_id])?,
            None,
            StatusCode::OK,
        )
        .await
    }

    async fn update_agency(&self, agency_id: &str, input: UpdateAgencyInput) -> AppResult<Agency> {
        let body = AgencyEnvelope {
            agency: AgencyRequestBody {
                trust_domain_name: input.trust_domain_name.as_deref(),
                description: input.description.as_deref(),
                ..AgencyRequestBody::default()
            },
        };

        self.agency_response(
            Method::PUT,
            self.agency_url(&["agencies", agency_id])?,
            Some(&body),
            StatusCode::OK,
        )
        .await
    }

    async fn delete_agency(&self, agency_id: &str) -> AppResult<()> {
        let url = self.agency_url(&["agencies", agency_id])?;
        self.client
            .execute(
                self.client.request(Method::DELETE, url),
                StatusCode::NO_CONTENT,
            )
            .await?;
        Ok(())
    }

    async fn attach_role(
        &self,
        agency_id: &str,
        scope: &AttachmentScope,
        role_id: &str,
    ) -> AppResult<()> {
        let url = self.attachment_url(agency_id, scope, Some(role_id))?;
        self.client
            .execute(self.client.request(Method::PUT, url), StatusCode::NO_CONTENT)
            .await?;
        Ok(())
    }

    async fn detach_role(
        &self,
        agency_id: &str,
        scope: &AttachmentScope,
        role_id: &str,
    ) -> AppResult<()> {
        let url = self.attachment_url(agency_id, scope, Some(role_id))?;
        self.client
            .execute(
                self.client.request(Method::DELETE, url),
                StatusCode::NO_CONTENT,
            )
            .await?;
        Ok(())
    }

    async fn list_attached_roles(
        &self,
        agency_id: &str,
        scope: &AttachmentScope,
    ) -> AppResult<Vec<Role>> {
        let url = self.attachment_url(agency_id, scope, None)?;
        let response = self
            .client
            .execute(self.client.request(Method::GET, url), StatusCode::OK)
            .await?;
        let list: RoleList = HttpApiClient::decode(response).await?;
        Ok(list.roles)
    }
}
