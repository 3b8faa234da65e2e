use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use skyward_application::ClusterBackend;
use skyward_core::{AppError, AppResult, BackendError};
use skyward_domain::{Cluster, ClusterDefinition};

/// In-process container cluster backend.
#[derive(Debug, Default)]
pub struct InMemoryClusterBackend {
    clusters: RwLock<HashMap<String, Cluster>>,
}

impl InMemoryClusterBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(cluster_id: &str) -> AppError {
    BackendError::status(404, format!("cluster '{cluster_id}' not found")).into()
}

#[async_trait]
impl ClusterBackend for InMemoryClusterBackend {
    async fn create_cluster(&self, definition: &ClusterDefinition) -> AppResult<Cluster> {
        let cluster = Cluster {
            id: Uuid::new_v4().to_string(),
            name: definition.name().as_str().to_owned(),
            description: definition.description().map(str::to_owned),
            vpc: Some(definition.vpc().as_str().to_owned()),
            subnet: Some(definition.subnet().as_str().to_owned()),
            region: Some(definition.region().as_str().to_owned()),
            az: definition.az().map(str::to_owned),
            security_group_id: definition.security_group_id().map(str::to_owned),
            status: Some("Available".to_owned()),
        };

        self.clusters
            .write()
            .await
            .insert(cluster.id.clone(), cluster.clone());
        Ok(cluster)
    }

    async fn get_cluster(&self, cluster_id: &str) -> AppResult<Cluster> {
        self.clusters
            .read()
            .await
            .get(cluster_id)
            .cloned()
            .ok_or_else(|| not_found(cluster_id))
    }

    async fn update_cluster(&self, cluster_id: &str, description: &str) -> AppResult<Cluster> {
        let mut clusters = self.clusters.write().await;
        let cluster = clusters
            .get_mut(cluster_id)
            .ok_or_else(|| not_found(cluster_id))?;
        cluster.description = (!description.is_empty()).then(|| description.to_owned());
        Ok(cluster.clone())
    }

    async fn delete_cluster(&self, cluster_id: &str) -> AppResult<()> {
        self.clusters
            .write()
            .await
            .remove(cluster_id)
            .map(|_| ())
            .ok_or_else(|| not_found(cluster_id))
    }
}
