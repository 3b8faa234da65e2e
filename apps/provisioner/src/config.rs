use std::env;
use std::path::PathBuf;
use std::time::Duration;

use skyward_application::OperationTimeouts;
use skyward_core::{AppError, AppResult, ProviderIdentity};
use skyward_infrastructure::{
    DEFAULT_AGENCY_ENDPOINT, DEFAULT_AUTH_ENDPOINT, DEFAULT_IDENTITY_ENDPOINT,
};

/// Backend implementation selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Remote REST APIs.
    Http,
    /// In-process backends for dry runs.
    Memory,
}

/// Provisioner settings read from the environment.
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    pub auth_token: Option<String>,
    pub provider: ProviderIdentity,
    pub agency_endpoint: String,
    pub identity_endpoint: String,
    pub auth_endpoint: String,
    pub cce_endpoint: Option<String>,
    pub http_timeout: Duration,
    pub timeouts: OperationTimeouts,
    pub backend: BackendKind,
    pub memory_seed_file: Option<PathBuf>,
}

impl ProvisionerConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let optional = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let backend = match optional("SKYWARD_BACKEND").as_deref() {
            None | Some("http") => BackendKind::Http,
            Some("memory") => BackendKind::Memory,
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "invalid SKYWARD_BACKEND value '{other}': expected 'http' or 'memory'"
                )));
            }
        };

        let region = optional("SKYWARD_REGION")
            .ok_or_else(|| AppError::Configuration("SKYWARD_REGION is required".to_owned()))?;
        let provider = ProviderIdentity::new(
            region,
            optional("SKYWARD_DOMAIN_ID"),
            optional("SKYWARD_DOMAIN_NAME"),
        )?;

        let auth_token = optional("SKYWARD_AUTH_TOKEN");
        if backend == BackendKind::Http && auth_token.is_none() {
            return Err(AppError::Configuration(
                "SKYWARD_AUTH_TOKEN is required for the http backend".to_owned(),
            ));
        }

        let timeouts = OperationTimeouts {
            create: parse_seconds(&optional, "SKYWARD_CREATE_TIMEOUT_SECONDS", 600)?,
            update: parse_seconds(&optional, "SKYWARD_UPDATE_TIMEOUT_SECONDS", 600)?,
            delete: parse_seconds(&optional, "SKYWARD_DELETE_TIMEOUT_SECONDS", 300)?,
        };

        Ok(Self {
            auth_token,
            provider,
            agency_endpoint: optional("SKYWARD_IAM_AGENCY_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_AGENCY_ENDPOINT.to_owned()),
            identity_endpoint: optional("SKYWARD_IAM_IDENTITY_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_IDENTITY_ENDPOINT.to_owned()),
            auth_endpoint: optional("SKYWARD_IAM_AUTH_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_AUTH_ENDPOINT.to_owned()),
            cce_endpoint: optional("SKYWARD_CCE_ENDPOINT"),
            http_timeout: parse_seconds(&optional, "SKYWARD_HTTP_TIMEOUT_SECONDS", 30)?,
            timeouts,
            backend,
            memory_seed_file: optional("SKYWARD_MEMORY_SEED_FILE").map(PathBuf::from),
        })
    }
}

fn parse_seconds(
    optional: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> AppResult<Duration> {
    let seconds = match optional(name) {
        Some(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        })?,
        None => default,
    };

    if seconds == 0 {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    Ok(Duration::from_secs(seconds))
}
