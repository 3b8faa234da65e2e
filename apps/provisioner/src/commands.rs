use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use skyward_application::{AgencyService, ClusterService};
use skyward_core::{AppError, AppResult, ResourceKind};
use skyward_domain::{AgencyDefinition, ClusterDefinition};

use crate::state_file::{self, ResourceState};

pub async fn apply_agency(service: &AgencyService, manifest: &Path, state: &Path) -> AppResult<()> {
    let definition: AgencyDefinition = read_manifest(manifest)?;

    let recorded = match state_file::load(state)? {
        Some(recorded) => service.read(&recorded.id).await?,
        None => None,
    };

    let snapshot = match recorded {
        Some(current) => {
            let agency_id = current.agency.id.clone();
            info!(agency_id = %agency_id, "updating recorded agency");
            service
                .update(&agency_id, &current.to_definition()?, &definition)
                .await?
                .ok_or(AppError::NotFound {
                    kind: ResourceKind::Agency,
                    name: agency_id,
                })?
        }
        None => {
            info!(name = %definition.name(), "creating agency");
            match service.create(&definition).await {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    if let Some(agency_id) = error.created_id() {
                        warn!(agency_id, "recording incomplete agency, apply again to finish it");
                        state_file::save(state, &ResourceState::applied_now(agency_id))?;
                    }
                    return Err(error);
                }
            }
        }
    };

    state_file::save(state, &ResourceState::applied_now(snapshot.agency.id.as_str()))?;
    print_json(&snapshot)
}

pub async fn read_agency(service: &AgencyService, agency_id: &str) -> AppResult<()> {
    match service.read(agency_id).await? {
        Some(snapshot) => print_json(&snapshot),
        None => {
            warn!(agency_id, "agency does not exist");
            print_json(&serde_json::Value::Null)
        }
    }
}

pub async fn import_agency(
    service: &AgencyService,
    agency_id: &str,
    state: Option<&Path>,
) -> AppResult<()> {
    let snapshot = service.import(agency_id).await?;
    if let Some(state) = state {
        state_file::save(state, &ResourceState::applied_now(snapshot.agency.id.as_str()))?;
    }
    print_json(&snapshot)
}

pub async fn delete_agency(service: &AgencyService, state: &Path) -> AppResult<()> {
    let Some(recorded) = state_file::load(state)? else {
        warn!(state = %state.display(), "no agency recorded, nothing to delete");
        return Ok(());
    };

    service.delete(&recorded.id).await?;
    info!(agency_id = %recorded.id, "agency deleted");
    state_file::clear(state)
}

pub async fn apply_cluster(
    service: &ClusterService,
    manifest: &Path,
    state: &Path,
) -> AppResult<()> {
    let definition: ClusterDefinition = read_manifest(manifest)?;

    let recorded = match state_file::load(state)? {
        Some(recorded) => service.read(&recorded.id).await?,
        None => None,
    };

    let cluster = match recorded {
        Some(current) => {
            info!(cluster_id = %current.id, "updating recorded cluster");
            service
                .update(&current, &definition)
                .await?
                .ok_or_else(|| AppError::NotFound {
                    kind: ResourceKind::Cluster,
                    name: current.id.clone(),
                })?
        }
        None => {
            info!(name = %definition.name(), "creating cluster");
            service.create(&definition).await?
        }
    };

    state_file::save(state, &ResourceState::applied_now(cluster.id.as_str()))?;
    print_json(&cluster)
}

pub async fn read_cluster(service: &ClusterService, cluster_id: &str) -> AppResult<()> {
    match service.read(cluster_id).await? {
        Some(cluster) => print_json(&cluster),
        None => {
            warn!(cluster_id, "cluster does not exist");
            print_json(&serde_json::Value::Null)
        }
    }
}

pub async fn delete_cluster(service: &ClusterService, state: &Path) -> AppResult<()> {
    let Some(recorded) = state_file::load(state)? else {
        warn!(state = %state.display(), "no cluster recorded, nothing to delete");
        return Ok(());
    };

    service.delete(&recorded.id).await?;
    info!(cluster_id = %recorded.id, "cluster deleted");
    state_file::clear(state)
}

pub fn read_manifest<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let contents = fs::read_to_string(path).map_err(|error| {
        AppError::Validation(format!(
            "failed to read manifest '{}': {error}",
            path.display()
        ))
    })?;

    serde_json::from_str(&contents).map_err(|error| {
        AppError::Validation(format!("invalid manifest '{}': {error}", path.display()))
    })
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let output = serde_json::to_string_pretty(value)
        .map_err(|error| AppError::Internal(format!("failed to encode output: {error}")))?;
    println!("{output}");
    Ok(())
}
