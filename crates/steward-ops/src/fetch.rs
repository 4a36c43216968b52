//! Byte fetcher for manifest and archive locators.
//!
//! Supported locators:
//! - `http://` and `https://` URLs (a non-empty key is sent as a bearer token)
//! - `file://` URLs
//! - plain filesystem paths

use std::time::Duration;

use crate::error::FetchError;

/// Metadata describing a fetched source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    /// Locator the bytes came from.
    pub locator: String,

    /// Number of bytes fetched.
    pub len: usize,

    /// Content type reported by the remote, if any.
    pub content_type: Option<String>,
}

/// Resolves locators to raw bytes.
///
/// Cloning is cheap; the underlying HTTP client is shared.
#[derive(Debug, Clone)]
pub struct Fetcher {
    http: reqwest::Client,
}

impl Fetcher {
    /// Create a new fetcher.
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { http }
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Shared HTTP client.
    pub fn client(&self) -> &reqwest::Client {
        &self.http
    }

    /// Fetch the bytes behind `locator`.
    pub async fn fetch(
        &self,
        locator: &str,
        key: &str,
    ) -> Result<(Vec<u8>, FetchMetadata), FetchError> {
        if is_remote(locator) {
            self.fetch_remote(locator, key).await
        } else {
            fetch_local(locator).await
        }
    }

    async fn fetch_remote(
        &self,
        locator: &str,
        key: &str,
    ) -> Result<(Vec<u8>, FetchMetadata), FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            locator: locator.to_string(),
            message: e.to_string(),
        };

        let mut request = self.http.get(locator);
        if !key.is_empty() {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                locator: locator.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(transport)?.to_vec();

        tracing::debug!(locator = %locator, bytes = body.len(), "Fetched remote source");

        let metadata = FetchMetadata {
            locator: locator.to_string(),
            len: body.len(),
            content_type,
        };
        Ok((body, metadata))
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn is_remote(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

async fn fetch_local(locator: &str) -> Result<(Vec<u8>, FetchMetadata), FetchError> {
    let path = locator.strip_prefix("file://").unwrap_or(locator);
    let body = tokio::fs::read(path).await.map_err(|source| FetchError::Io {
        locator: locator.to_string(),
        source,
    })?;

    tracing::debug!(locator = %locator, bytes = body.len(), "Read local source");

    let metadata = FetchMetadata {
        locator: locator.to_string(),
        len: body.len(),
        content_type: None,
    };
    Ok((body, metadata))
}
