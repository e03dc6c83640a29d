//! Remote artifact download.
//!
//! Each download is bounded twice: reqwest's per-request timeout, and an
//! outer tokio timer that aborts the whole future should the client-level
//! timeout not fire. Failures are never retried.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use reqwest::Client;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::{BackendConfig, DEFAULT_TIMEOUT_MS};
use crate::error::{Error, Result};

use super::{ArtifactReference, encode_chunked};

// ============================================================================
// Constants
// ============================================================================

/// `User-Agent` sent with every request.
pub(crate) const USER_AGENT: &str = concat!("CADAgent-Bridge/", env!("CARGO_PKG_VERSION"));

/// Default raw chunk size for encoding.
const DEFAULT_CHUNK_BYTES: usize = 96 * 1024;

// ============================================================================
// ArtifactFetcher
// ============================================================================

/// Downloads remote artifacts and normalizes them to inline form.
#[derive(Debug, Clone)]
pub struct ArtifactFetcher {
    /// HTTP client.
    client: Client,
    /// Request bound.
    timeout: Duration,
    /// Raw bytes encoded per chunk.
    chunk_bytes: usize,
}

impl Default for ArtifactFetcher {
    fn default() -> Self {
        Self {
            client: Client::new(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }
}

impl ArtifactFetcher {
    /// Creates a fetcher using the backend timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            timeout: config.timeout(),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        })
    }

    /// Sets the raw chunk size used for encoding.
    #[inline]
    #[must_use]
    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes;
        self
    }

    /// Sets the request bound.
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the request bound.
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Normalizes a reference to base64 text.
    ///
    /// Inline data is returned unchanged; remote data is downloaded.
    ///
    /// # Errors
    ///
    /// See [`ArtifactFetcher::fetch`].
    pub async fn resolve(&self, reference: &ArtifactReference) -> Result<String> {
        match reference {
            ArtifactReference::Inline(data) => Ok(data.clone()),
            ArtifactReference::Remote(url) => {
                let bytes = self.fetch(url).await?;
                Ok(encode_chunked(&bytes, self.chunk_bytes))
            }
        }
    }

    /// Downloads raw bytes.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the download exceeds the request bound
    /// - [`Error::Transfer`] for a non-success status or network failure
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);

        match timeout(self.timeout, self.download(url)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(url, timeout_ms, "Artifact download aborted by timer");
                Err(Error::timeout("artifact download", timeout_ms))
            }
        }
    }

    /// Issues the request and reads the body.
    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                Error::timeout("artifact download", timeout_ms)
            } else {
                Error::transfer(format!("Failed to download model file: {e}"))
            }
        };

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_err)?;

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "Artifact download rejected");
            return Err(Error::transfer(format!(
                "Failed to download model file: HTTP {}",
                status.as_u16()
            )));
        }

        let bytes = response.bytes().await.map_err(map_err)?;
        debug!(url, size = bytes.len(), "Artifact downloaded");
        Ok(bytes.to_vec())
    }
}

// ============================================================================
// Tests
// ============================================================================
