use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use skyward_application::ClusterBackend;
use skyward_core::AppResult;
use skyward_domain::{Cluster, ClusterDefinition};

use crate::http_api_client::{HttpApiClient, endpoint_url, parse_endpoint};

const CLUSTER_KIND: &str = "cluster";
const CLUSTER_API_VERSION: &str = "v1";

/// Container cluster backend speaking the container engine REST API.
pub struct HttpClusterBackend {
    client: HttpApiClient,
    endpoint: Url,
}

impl HttpClusterBackend {
    /// Creates a backend rooted at the container engine endpoint.
    pub fn new(client: HttpApiClient, endpoint: &str) -> AppResult<Self> {
        Ok(Self {
            client,
            endpoint: parse_endpoint("container engine", endpoint)?,
        })
    }

    fn cluster_url(&self, cluster_id: Option<&str>) -> AppResult<Url> {
        let mut segments = vec!["clusters"];
        segments.extend(cluster_id);
        endpoint_url(&self.endpoint, &segments)
    }

    async fn cluster_response<B: Serialize + Sync>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        expected: StatusCode,
    ) -> AppResult<Cluster> {
        let mut builder = self.client.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = self.client.execute(builder, expected).await?;
        let body: ClusterBody = HttpApiClient::decode(response).await?;
        Ok(body.into())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClusterRequest<'a, S> {
    kind: &'static str,
    api_version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata<'a>>,
    spec: S,
}

#[derive(Debug, Serialize)]
struct Metadata<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateSpec<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    vpc: &'a str,
    subnet: &'a str,
    region: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    az: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    security_group_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct UpdateSpec<'a> {
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClusterBody {
    metadata: MetadataBody,
    #[serde(default)]
    spec: SpecBody,
    #[serde(default)]
    status: Option<StatusBody>,
}

#[derive(Debug, Deserialize)]
struct MetadataBody {
    uid: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct SpecBody {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    vpc: Option<String>,
    #[serde(default)]
    subnet: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    az: Option<String>,
    #[serde(default)]
    security_group_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(default)]
    phase: Option<String>,
}

impl From<ClusterBody> for Cluster {
    fn from(body: ClusterBody) -> Self {
        Self {
            id: body.metadata.uid,
            name: body.metadata.name,
            description: reported(body.spec.description),
            vpc: reported(body.spec.vpc),
            subnet: reported(body.spec.subnet),
            region: reported(body.spec.region),
            az: reported(body.spec.az),
            security_group_id: reported(body.spec.security_group_id),
            status: body.status.and_then(|status| status.phase),
        }
    }
}

fn reported(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

#[async_trait]
impl ClusterBackend for HttpClusterBackend {
    async fn create_cluster(&self, definition: &ClusterDefinition) -> AppResult<Cluster> {
        let body = ClusterRequest {
            kind: CLUSTER_KIND,
            api_version: CLUSTER_API_VERSION,
            metadata: Some(Metadata {
                name: definition.name().as_str(),
            }),
            spec: CreateSpec {
                description: definition.description(),
                vpc: definition.vpc().as_str(),
                subnet: definition.subnet().as_str(),
                region: definition.region().as_str(),
                az: definition.az(),
                security_group_id: definition.security_group_id(),
            },
        };

        let cluster = self
            .cluster_response(
                Method::POST,
                self.cluster_url(None)?,
                Some(&body),
                StatusCode::CREATED,
            )
            .await?;
        debug!(cluster_id = %cluster.id, "container engine created cluster");
        Ok(cluster)
    }

    async fn get_cluster(&self, cluster_id: &str) -> AppResult<Cluster> {
        self.cluster_response::<()>(
            Method::GET,
            self.cluster_url(Some(cluster_id))?,
            None,
            StatusCode::OK,
        )
        .await
    }

    async fn update_cluster(&self, cluster_id: &str, description: &str) -> AppResult<Cluster> {
        let body = ClusterRequest {
            kind: CLUSTER_KIND,
            api_version: CLUSTER_API_VERSION,
            metadata: None,
            spec: UpdateSpec { description },
        };

        self.cluster_response(
            Method::PUT,
            self.cluster_url(Some(cluster_id))?,
            Some(&body),
            StatusCode::OK,
        )
        .await
    }

    async fn delete_cluster(&self, cluster_id: &str) -> AppResult<()> {
        let url = self.cluster_url(Some(cluster_id))?;
        self.client
            .execute(self.client.request(Method::DELETE, url), StatusCode::OK)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockito::{Matcher, Server, ServerGuard};

    use skyward_application::ClusterBackend;
    use skyward_domain::{ClusterDefinition, ClusterDefinitionInput};

    use crate::http_api_client::HttpApiClient;

    use super::HttpClusterBackend;

    const CLUSTER_BODY: &str = r#"{"kind":"cluster","apiVersion":"v1","metadata":{"uid":"c-1","name":"build"},"spec":{"description":"ci","vpc":"vpc-1","subnet":"subnet-1","region":"eu-west-0"},"status":{"phase":"Available"}}"#;

    fn backend(server: &ServerGuard) -> HttpClusterBackend {
        let client = match HttpApiClient::new("token-123", Duration::from_secs(5)) {
            Ok(client) => client,
            Err(error) => panic!("client must build: {error}"),
        };
        match HttpClusterBackend::new(client, &format!("{}/api/v3/projects/p-1", server.url()))
        {
            Ok(backend) => backend,
            Err(error) => panic!("backend must build: {error}"),
        }
    }

    #[tokio::test]
    async fn create_posts_kind_and_spec() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v3/projects/p-1/clusters")
            .match_header("x-auth-token", "token-123")
            .match_body(Matcher::Json(serde_json::json!({
                "kind": "cluster",
                "apiVersion": "v1",
                "metadata": { "name": "build" },
                "spec": {
                    "description": "ci",
                    "vpc": "vpc-1",
                    "subnet": "subnet-1",
                    "region": "eu-west-0",
                }
            })))
            .with_status(201)
            .with_body(CLUSTER_BODY)
            .create_async()
            .await;
        let definition = match ClusterDefinition::new(ClusterDefinitionInput {
            name: "build".to_owned(),
            description: Some("ci".to_owned()),
            vpc: "vpc-1".to_owned(),
            subnet: "subnet-1".to_owned(),
            region: "eu-west-0".to_owned(),
            az: None,
            security_group_id: None,
        }) {
            Ok(definition) => definition,
            Err(error) => panic!("invalid cluster definition: {error}"),
        };

        let cluster = backend(&server).create_cluster(&definition).await;

        let Ok(cluster) = cluster else {
            panic!("create must succeed");
        };
        assert_eq!(cluster.id, "c-1");
        assert_eq!(cluster.status.as_deref(), Some("Available"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn update_sends_description_only() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/v3/projects/p-1/clusters/c-1")
            .match_body(Matcher::Json(serde_json::json!({
                "kind": "cluster",
                "apiVersion": "v1",
                "spec": { "description": "ci" }
            })))
            .with_status(200)
            .with_body(CLUSTER_BODY)
            .create_async()
            .await;

        let cluster = backend(&server).update_cluster("c-1", "ci").await;

        assert!(matches!(cluster, Ok(ref cluster) if cluster.description.as_deref() == Some("ci")));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn omitted_network_fields_are_unreported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v3/projects/p-1/clusters/c-1")
            .with_status(200)
            .with_body(r#"{"metadata":{"uid":"c-1","name":"build"},"spec":{"description":"ci","vpc":""}}"#)
            .create_async()
            .await;

        let result = backend(&server).get_cluster("c-1").await;

        let Ok(cluster) = result else {
            panic!("get must succeed");
        };
        assert_eq!((cluster.vpc, cluster.subnet, cluster.region), (None, None, None));
        assert_eq!(cluster.description.as_deref(), Some("ci"));
    }

    #[tokio::test]
    async fn missing_cluster_maps_to_not_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v3/projects/p-1/clusters/c-404")
            .with_status(404)
            .create_async()
            .await;

        let result = backend(&server).get_cluster("c-404").await;

        assert!(matches!(result, Err(ref error) if error.is_backend_not_found()));
    }
}
