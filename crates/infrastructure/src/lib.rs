//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_api_client;
mod http_cluster_backend;
mod http_identity_backend;
mod in_memory_cluster_backend;
mod in_memory_identity_backend;

pub use http_api_client::{HttpApiClient, parse_endpoint};
pub use http_cluster_backend::HttpClusterBackend;
pub use http_identity_backend::{
    DEFAULT_AGENCY_ENDPOINT, DEFAULT_AUTH_ENDPOINT, DEFAULT_IDENTITY_ENDPOINT,
    HttpIdentityBackend, IdentityEndpoints,
};
pub use in_memory_cluster_backend::InMemoryClusterBackend;
pub use in_memory_identity_backend::{InMemoryIdentityBackend, InMemoryIdentitySeed};
