//! Skyward provisioner command line.

#![forbid(unsafe_code)]

mod commands;
mod config;
mod state_file;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use skyward_application::{AgencyService, ClusterBackend, ClusterService, IdentityBackend};
use skyward_core::{AppError, AppResult};
use skyward_infrastructure::{
    HttpApiClient, HttpClusterBackend, HttpIdentityBackend, IdentityEndpoints,
    InMemoryClusterBackend, InMemoryIdentityBackend, InMemoryIdentitySeed,
};

use crate::config::{BackendKind, ProvisionerConfig};

#[derive(Debug, Parser)]
#[command(name = "skyward-provisioner")]
#[command(version, about = "Provision agencies and container clusters", long_about = None)]
struct Cli {
    #[command(subcommand)]
    resource: Resource,
}

#[derive(Debug, Subcommand)]
enum Resource {
    /// Manage cross-tenant trust agencies.
    #[command(subcommand)]
    Agency(AgencyCommand),
    /// Manage container clusters.
    #[command(subcommand)]
    Cluster(ClusterCommand),
}

#[derive(Debug, Subcommand)]
enum AgencyCommand {
    /// Create or update the agency declared in a manifest.
    Apply {
        #[arg(long, value_name = "FILE")]
        manifest: PathBuf,
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
    /// Print the observed state of an agency.
    Read {
        #[arg(long)]
        id: String,
    },
    /// Adopt an existing agency, optionally recording it in a state file.
    Import {
        #[arg(long)]
        id: String,
        #[arg(long, value_name = "FILE")]
        state: Option<PathBuf>,
    },
    /// Delete the agency recorded in a state file.
    Delete {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum ClusterCommand {
    /// Create or update the cluster declared in a manifest.
    Apply {
        #[arg(long, value_name = "FILE")]
        manifest: PathBuf,
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
    /// Print the observed state of a cluster.
    Read {
        #[arg(long)]
        id: String,
    },
    /// Delete the cluster recorded in a state file.
    Delete {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = ProvisionerConfig::load()?;
    info!(
        region = %config.provider.region(),
        backend = ?config.backend,
        "skyward-provisioner started"
    );

    match cli.resource {
        Resource::Agency(command) => {
            let service = AgencyService::new(
                identity_backend(&config)?,
                config.provider.clone(),
                config.timeouts,
            );
            match command {
                AgencyCommand::Apply { manifest, state } => {
                    commands::apply_agency(&service, &manifest, &state).await
                }
                AgencyCommand::Read { id } => commands::read_agency(&service, &id).await,
                AgencyCommand::Import { id, state } => {
                    commands::import_agency(&service, &id, state.as_deref()).await
                }
                AgencyCommand::Delete { state } => commands::delete_agency(&service, &state).await,
            }
        }
        Resource::Cluster(command) => {
            let service = ClusterService::new(cluster_backend(&config)?, config.timeouts);
            match command {
                ClusterCommand::Apply { manifest, state } => {
                    commands::apply_cluster(&service, &manifest, &state).await
                }
                ClusterCommand::Read { id } => commands::read_cluster(&service, &id).await,
                ClusterCommand::Delete { state } => {
                    commands::delete_cluster(&service, &state).await
                }
            }
        }
    }
}

fn identity_backend(config: &ProvisionerConfig) -> AppResult<Arc<dyn IdentityBackend>> {
    match config.backend {
        BackendKind::Http => {
            let endpoints = IdentityEndpoints::parse(
                &config.agency_endpoint,
                &config.identity_endpoint,
                &config.auth_endpoint,
            )?;
            Ok(Arc::new(HttpIdentityBackend::new(
                http_client(config)?,
                endpoints,
            )))
        }
        BackendKind::Memory => {
            let seed = match &config.memory_seed_file {
                Some(path) => commands::read_manifest(path)?,
                None => InMemoryIdentitySeed {
                    domains: config.provider.domain_name().map(str::to_owned).into_iter().collect(),
                    ..InMemoryIdentitySeed::default()
                },
            };
            Ok(Arc::new(InMemoryIdentityBackend::new(seed)))
        }
    }
}

fn cluster_backend(config: &ProvisionerConfig) -> AppResult<Arc<dyn ClusterBackend>> {
    match config.backend {
        BackendKind::Http => {
            let endpoint = config.cce_endpoint.as_deref().ok_or_else(|| {
                AppError::Configuration(
                    "SKYWARD_CCE_ENDPOINT is required to manage clusters".to_owned(),
                )
            })?;
            Ok(Arc::new(HttpClusterBackend::new(http_client(config)?, endpoint)?))
        }
        BackendKind::Memory => Ok(Arc::new(InMemoryClusterBackend::new())),
    }
}

fn http_client(config: &ProvisionerConfig) -> AppResult<HttpApiClient> {
    let auth_token = config.auth_token.as_deref().ok_or_else(|| {
        AppError::Configuration("SKYWARD_AUTH_TOKEN is required for the http backend".to_owned())
    })?;
    HttpApiClient::new(auth_token, config.http_timeout)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
