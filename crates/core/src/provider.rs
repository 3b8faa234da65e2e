use serde::{Deserialize, Serialize};

use crate::{AppResult, NonEmptyString};

/// Region and owning-domain settings of the configured provider account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    region: NonEmptyString,
    domain_id: Option<String>,
    domain_name: Option<String>,
}

impl ProviderIdentity {
    /// Creates provider settings; blank domain values are treated as absent.
    pub fn new(
        region: impl Into<String>,
        domain_id: Option<String>,
        domain_name: Option<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            region: NonEmptyString::new(region)?,
            domain_id: normalize(domain_id),
            domain_name: normalize(domain_name),
        })
    }

    /// Returns the region the provider operates in.
    #[must_use]
    pub fn region(&self) -> &str {
        self.region.as_str()
    }

    /// Returns the pre-configured domain identifier, if any.
    #[must_use]
    pub fn domain_id(&self) -> Option<&str> {
        self.domain_id.as_deref()
    }

    /// Returns the domain name used to look up the identifier.
    #[must_use]
    pub fn domain_name(&self) -> Option<&str> {
        self.domain_name.as_deref()
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim().to_owned();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}
