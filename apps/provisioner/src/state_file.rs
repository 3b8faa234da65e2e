use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use skyward_core::{AppError, AppResult};

/// Identifier of a provisioned resource, persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    pub id: String,
    pub applied_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn applied_now(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            applied_at: Utc::now(),
        }
    }
}

/// Reads the state file; a missing or empty file means nothing is recorded.
pub fn load(path: &Path) -> AppResult<Option<ResourceState>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(AppError::Internal(format!(
                "failed to read state file '{}': {error}",
                path.display()
            )));
        }
    };

    if contents.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&contents).map(Some).map_err(|error| {
        AppError::Validation(format!(
            "invalid state file '{}': {error}",
            path.display()
        ))
    })
}

pub fn save(path: &Path, state: &ResourceState) -> AppResult<()> {
    let contents = serde_json::to_string_pretty(state)
        .map_err(|error| AppError::Internal(format!("failed to encode state: {error}")))?;

    fs::write(path, contents).map_err(|error| {
        AppError::Internal(format!(
            "failed to write state file '{}': {error}",
            path.display()
        ))
    })
}

pub fn clear(path: &Path) -> AppResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => Err(AppError::Internal(format!(
            "failed to remove state file '{}': {error}",
            path.display()
        ))),
    }
}
