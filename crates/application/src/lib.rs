//! Application services and ports.

#![forbid(unsafe_code)]

mod agency_service;
mod cluster_ports;
mod cluster_service;
mod identity_lookup_service;
mod identity_ports;
mod retry_policy;

#[cfg(test)]
mod test_fakes;

pub use agency_service::AgencyService;
pub use cluster_ports::ClusterBackend;
pub use cluster_service::ClusterService;
pub use identity_lookup_service::IdentityLookupService;
pub use identity_ports::{
    CreateAgencyInput, IdentityBackend, Page, PageToken, UpdateAgencyInput,
};
pub use retry_policy::{
    OperationTimeouts, RetryDecision, RetryPolicy, classify_backend_error, retry_until,
};
