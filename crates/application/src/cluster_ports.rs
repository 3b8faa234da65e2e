use async_trait::async_trait;

use skyward_core::AppResult;
use skyward_domain::{Cluster, ClusterDefinition};

/// Port for the container engine managing clusters.
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Creates a cluster.
    async fn create_cluster(&self, definition: &ClusterDefinition) -> AppResult<Cluster>;

    /// Fetches one cluster; a missing cluster is a backend 404.
    async fn get_cluster(&self, cluster_id: &str) -> AppResult<Cluster>;

    /// Replaces the cluster description.
    async fn update_cluster(&self, cluster_id: &str, description: &str) -> AppResult<Cluster>;

    /// Deletes a cluster.
    async fn delete_cluster(&self, cluster_id: &str) -> AppResult<()>;
}
