//! Blob retrieval over HTTP from a storage container.

use reqwest::Client;
use tracing::debug;

use super::graph::status_error;
use crate::ports::{BlobStore, PortFuture};

/// Fetches `<container>/<key>[?query]` with a plain GET.
pub struct HttpBlobStore {
    client: Client,
    container_url: String,
    query: Option<String>,
}

impl HttpBlobStore {
    /// Creates a store for the container; `query` is appended verbatim (e.g. a SAS token).
    #[must_use]
    pub fn new(container_url: &str, query: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            container_url: container_url.trim_end_matches('/').to_string(),
            query: query.map(|q| q.trim_start_matches('?').to_string()),
        }
    }

    fn blob_url(&self, key: &str) -> String {
        let key = key.trim_start_matches('/');
        match &self.query {
            Some(query) => format!("{}/{key}?{query}", self.container_url),
            None => format!("{}/{key}", self.container_url),
        }
    }
}

impl BlobStore for HttpBlobStore {
    fn fetch<'a>(&'a self, key: &'a str) -> PortFuture<'a, Vec<u8>> {
        Box::pin(async move {
            debug!(key, "fetching blob");
            let response = self.client.get(self.blob_url(key)).send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(status_error(status, body));
            }
            Ok(response.bytes().await?.to_vec())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_url_appends_query() {
        let store = HttpBlobStore::new("https://blobs.example/docs/", Some("?sv=1&sig=x"));
        assert_eq!(store.blob_url("/a/b.pdf"), "https://blobs.example/docs/a/b.pdf?sv=1&sig=x");

        let store = HttpBlobStore::new("https://blobs.example/docs", None);
        assert_eq!(store.blob_url("k"), "https://blobs.example/docs/k");
    }
}
