//! Minimal Microsoft Graph client shared by the directory and mail adapters.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::PortError;

/// Bearer-authenticated client rooted at a Graph base URL.
#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    base_url: String,
    token: String,
}

impl GraphClient {
    /// Creates a client for `base_url` (e.g. `https://graph.microsoft.com/v1.0`).
    #[must_use]
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Absolute URL for a path below the base.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(&self.token)
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(&self.token)
    }

    pub(crate) fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(&self.token)
    }

    /// Sends the request and decodes a JSON body from a successful response.
    pub(crate) async fn json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, PortError> {
        let response = Self::send(request).await?;
        Ok(response.json().await?)
    }

    /// Sends the request, mapping unsuccessful statuses to [`PortError`].
    pub(crate) async fn send(request: RequestBuilder) -> Result<Response, PortError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "graph response");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, body))
    }
}

/// Maps an unsuccessful HTTP status to the port error taxonomy.
pub(crate) fn status_error(status: StatusCode, body: String) -> PortError {
    match status {
        StatusCode::NOT_FOUND => PortError::NotFound(body),
        StatusCode::CONFLICT => PortError::Conflict(body),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
            PortError::Transient(body)
        }
        s if s.is_server_error() => PortError::Transient(body),
        s => PortError::Rejected { status: s.as_u16(), body },
    }
}

/// One page of a Graph collection.
#[derive(serde::Deserialize)]
pub(crate) struct Page<T> {
    pub value: Vec<T>,
}
