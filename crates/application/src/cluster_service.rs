use std::sync::Arc;

use tracing::{debug, info};

use skyward_core::{AppError, AppResult};
use skyward_domain::{Cluster, ClusterDefinition};

use crate::cluster_ports::ClusterBackend;
use crate::retry_policy::{OperationTimeouts, RetryPolicy, classify_backend_error, retry_until};

/// Application service for container cluster lifecycle operations.
#[derive(Clone)]
pub struct ClusterService {
    backend: Arc<dyn ClusterBackend>,
    timeouts: OperationTimeouts,
}

impl ClusterService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(backend: Arc<dyn ClusterBackend>, timeouts: OperationTimeouts) -> Self {
        Self { backend, timeouts }
    }

    /// Creates a cluster.
    pub async fn create(&self, definition: &ClusterDefinition) -> AppResult<Cluster> {
        let cluster = tokio::time::timeout(
            self.timeouts.create,
            self.backend.create_cluster(definition),
        )
        .await
        .map_err(|_| AppError::Timeout {
            operation: "create cluster".to_owned(),
            timeout: self.timeouts.create,
            last_error: None,
        })?
        .map_err(|error| error.with_context(format!("creating cluster '{}'", definition.name())))?;

        info!(cluster_id = %cluster.id, name = %cluster.name, "cluster created");
        Ok(cluster)
    }

    /// Reads a cluster, returning `None` when it no longer exists.
    pub async fn read(&self, cluster_id: &str) -> AppResult<Option<Cluster>> {
        match self.backend.get_cluster(cluster_id).await {
            Ok(cluster) => Ok(Some(cluster)),
            Err(error) if error.is_backend_not_found() => {
                info!(cluster_id, "cluster no longer exists");
                Ok(None)
            }
            Err(error) => Err(error.with_context(format!("reading cluster '{cluster_id}'"))),
        }
    }

    /// Moves the observed `current` cluster to the declared description.
    ///
    /// Any other declared change is rejected.
    pub async fn update(
        &self,
        current: &Cluster,
        target: &ClusterDefinition,
    ) -> AppResult<Option<Cluster>> {
        let cluster_id = current.id.as_str();
        current.ensure_only_description_changed(target)?;

        if current.description.as_deref() != target.description() {
            let description = target.description().unwrap_or_default();
            debug!(cluster_id, description, "updating cluster description");

            let backend = self.backend.as_ref();
            let result = retry_until(
                &RetryPolicy::with_timeout(self.timeouts.update),
                "update cluster",
                classify_backend_error,
                || backend.update_cluster(cluster_id, description),
            )
            .await;

            match result {
                Ok(_) => {}
                Err(error) if error.is_backend_not_found() => return Ok(None),
                Err(error) => {
                    return Err(error.with_context(format!("updating cluster '{cluster_id}'")));
                }
            }
        }

        self.read(cluster_id).await
    }

    /// Deletes a cluster; a cluster that is already gone counts as deleted.
    pub async fn delete(&self, cluster_id: &str) -> AppResult<()> {
        let backend = self.backend.as_ref();
        let result = retry_until(
            &RetryPolicy::with_timeout(self.timeouts.delete),
            "delete cluster",
            classify_backend_error,
            || backend.delete_cluster(cluster_id),
        )
        .await;

        match result {
            Ok(()) => {
                info!(cluster_id, "cluster deleted");
                Ok(())
            }
            Err(error) if error.is_backend_not_found() => {
                info!(cluster_id, "deleting an unavailable cluster");
                Ok(())
            }
            Err(error) => Err(error.with_context(format!("deleting cluster '{cluster_id}'"))),
        }
    }
}
