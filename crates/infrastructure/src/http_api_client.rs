use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use skyward_core::{AppError, AppResult, BackendError};

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Authenticated JSON client shared by the HTTP backends.
#[derive(Clone)]
pub struct HttpApiClient {
    http_client: reqwest::Client,
    auth_token: String,
}

impl HttpApiClient {
    /// Creates a client sending `auth_token` with every request.
    pub fn new(auth_token: impl Into<String>, request_timeout: Duration) -> AppResult<Self> {
        let auth_token = auth_token.into();
        if auth_token.trim().is_empty() {
            return Err(AppError::Configuration(
                "an auth token is required for the http backend".to_owned(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|error| {
                AppError::Internal(format!("failed to build http client: {error}"))
            })?;

        Ok(Self {
            http_client,
            auth_token,
        })
    }

    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header(AUTH_TOKEN_HEADER, self.auth_token.as_str())
    }

    /// Sends a request and fails unless the response carries `expected`.
    pub(crate) async fn execute(
        &self,
        builder: RequestBuilder,
        expected: StatusCode,
    ) -> AppResult<Response> {
        let request = builder.build().map_err(|error| {
            AppError::Internal(format!("failed to build http request: {error}"))
        })?;
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending request");

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| BackendError::transport(format!("{method} {url}: {error}")))?;

        let status = response.status();
        if status == expected {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<response body unavailable>".to_owned());
        Err(BackendError::status(
            status.as_u16(),
            format!("{method} {url} returned {status}: {body}"),
        )
        .into())
    }

    /// Decodes a JSON response body.
    pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> AppResult<T> {
        let url = response.url().clone();
        let bytes = response.bytes().await.map_err(|error| {
            BackendError::transport(format!("reading response of {url}: {error}"))
        })?;

        serde_json::from_slice(&bytes).map_err(|error| {
            BackendError::malformed(format!("decoding response of {url}: {error}")).into()
        })
    }
}

/// Appends percent-encoded path segments to a base endpoint.
pub(crate) fn endpoint_url(base: &Url, segments: &[&str]) -> AppResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| AppError::Configuration(format!("endpoint '{base}' cannot be a base url")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Parses a configured endpoint, adding the trailing slash the joins rely on.
pub fn parse_endpoint(name: &str, value: &str) -> AppResult<Url> {
    let mut url = Url::parse(value.trim()).map_err(|error| {
        AppError::Configuration(format!("invalid {name} endpoint '{value}': {error}"))
    })?;

    if url.cannot_be_a_base() {
        return Err(AppError::Configuration(format!(
            "invalid {name} endpoint '{value}': not a base url"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
