//! Backend configuration and protocol timings.
//!
//! [`BackendConfig`] is delivered by the host in the `init` event and read by
//! the artifact pipeline and the direct REST client. [`Timings`] collects every
//! timer constant of the bridge so tests can shrink them.
//!
//! # Example
//!
//! ```ignore
//! use cadagent_bridge::config::{BackendConfig, Timings};
//!
//! let config = BackendConfig::default();
//! let url = config.endpoint_url(&config.endpoints.parameters_put, Some(&model_id))?;
//! assert_eq!(Timings::default().debounce_window.as_millis(), 300);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ModelId;

// ============================================================================
// Constants
// ============================================================================

/// Production backend.
pub const DEFAULT_BASE_URL: &str = "https://api.cadagentpro.com";

/// Default request timeout for backend calls and artifact downloads.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Placeholder substituted with the model id in endpoint templates.
const MODEL_ID_PLACEHOLDER: &str = "{model_id}";

// ============================================================================
// Endpoints
// ============================================================================

/// Named endpoint path templates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// New model generation.
    pub generate: String,
    /// Iteration on an existing model.
    pub iterate: String,
    /// Parameter listing.
    pub parameters_get: String,
    /// Parameter update.
    pub parameters_put: String,
    /// Health check.
    pub status: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            generate: "/api/v1/direct/generate".to_string(),
            iterate: "/api/v1/direct/iterate/{model_id}".to_string(),
            parameters_get: "/api/v1/parameters/{model_id}".to_string(),
            parameters_put: "/api/v1/direct/parameters/{model_id}".to_string(),
            status: "/api/v1/status".to_string(),
        }
    }
}

// ============================================================================
// BackendConfig
// ============================================================================

/// Remote generation service configuration.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Service root, e.g. `https://api.cadagentpro.com`.
    #[serde(alias = "backend_url")]
    pub base_url: Url,

    /// Endpoint path templates.
    pub endpoints: Endpoints,

    /// Request timeout in milliseconds.
    pub timeout_ms: u64,

    /// Bearer token for the backend, if any.
    pub auth_token: Option<String>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .field("endpoints", &self.endpoints)
            .field("timeout_ms", &self.timeout_ms)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            endpoints: Endpoints::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            auth_token: None,
        }
    }
}

/// Parses [`DEFAULT_BASE_URL`].
fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).unwrap_or_else(|_| unreachable!("default base url is valid"))
}

impl BackendConfig {
    /// Creates a config pointing at `base_url` with default endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if `base_url` does not parse.
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            ..Self::default()
        })
    }

    /// Sets the request timeout.
    #[inline]
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sets the bearer token.
    #[inline]
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Returns the request timeout as a [`Duration`].
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolves an endpoint template against the base URL.
    ///
    /// The template is appended to the base path, so a base such as
    /// `https://gw.example.com/cadagent` keeps its prefix. `{model_id}` is
    /// replaced by the percent-encoded model id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the template needs a model id and none is
    /// given.
    pub fn endpoint_url(&self, template: &str, model_id: Option<&ModelId>) -> Result<Url> {
        let path = if template.contains(MODEL_ID_PLACEHOLDER) {
            let model_id = model_id.ok_or_else(|| {
                Error::config(format!("Endpoint '{template}' requires a model id"))
            })?;
            template.replace(
                MODEL_ID_PLACEHOLDER,
                &urlencoding::encode(model_id.as_str()),
            )
        } else {
            template.to_string()
        };

        let prefix = self.base_url.path().trim_end_matches('/');
        let mut url = self.base_url.clone();
        url.set_path(&format!("{prefix}/{}", path.trim_start_matches('/')));
        Ok(url)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a non-HTTP base URL or a zero timeout.
    pub fn validate(&self) -> Result<()> {
        match self.base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::config(format!(
                    "Backend URL must be http(s), got '{other}'"
                )));
            }
        }
        if self.timeout_ms == 0 {
            return Err(Error::config("Backend timeout must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Timings
// ============================================================================

/// Timer constants of the bridge.
///
/// The progress phase offsets are elapsed-time heuristics only; the protocol
/// carries no mid-flight progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Interval between bridge availability checks.
    pub poll_interval: Duration,
    /// Maximum availability checks before giving up.
    pub poll_attempts: u32,
    /// Delay between handshake attempts.
    pub handshake_delay: Duration,
    /// Maximum handshake attempts.
    pub handshake_attempts: u32,
    /// Offset from action start at which Planning is shown.
    pub planning_after: Duration,
    /// Offset from action start at which Generating is shown.
    pub generating_after: Duration,
    /// How long Completed stays visible before the indicator is removed.
    pub completed_grace: Duration,
    /// Parameter edit coalescing window.
    pub debounce_window: Duration,
    /// Raw byte chunk size used when encoding downloaded artifacts.
    pub encode_chunk_bytes: usize,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(300),
            poll_attempts: 40,
            handshake_delay: Duration::from_millis(300),
            handshake_attempts: 10,
            planning_after: Duration::from_secs(5),
            generating_after: Duration::from_secs(10),
            completed_grace: Duration::from_secs(2),
            debounce_window: Duration::from_millis(300),
            encode_chunk_bytes: 96 * 1024,
        }
    }
}

impl Timings {
    /// Validates the timings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a count or chunk size is zero, or when
    /// Generating would be shown before Planning.
    pub fn validate(&self) -> Result<()> {
        if self.poll_attempts == 0 || self.handshake_attempts == 0 {
            return Err(Error::config("Attempt counts must be greater than zero"));
        }
        if self.encode_chunk_bytes == 0 {
            return Err(Error::config("Encode chunk size must be greater than zero"));
        }
        if self.generating_after < self.planning_after {
            return Err(Error::config(
                "Generating offset must not precede the Planning offset",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_config() {
        let config = BackendConfig::default();
        assert_eq!(config.base_url.as_str(), "https://api.cadagentpro.com/");
        assert_eq!(config.timeout_ms, 60_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_from_init_payload() {
        let json = r#"{"backend_url": "http://localhost:8000", "timeout_ms": 5000}"#;
        let config: BackendConfig = serde_json::from_str(json).expect("parse");
        assert_eq!(config.base_url.as_str(), "http://localhost:8000/");
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.endpoints, Endpoints::default());
    }

    #[test]
    fn test_endpoint_url_substitutes_model_id() {
        let config = BackendConfig::new("http://localhost:8000").expect("config");
        let model = ModelId::new("abc 1").expect("model");
        let url = config
            .endpoint_url(&config.endpoints.parameters_put, Some(&model))
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/v1/direct/parameters/abc%201"
        );
    }

    #[test]
    fn test_endpoint_url_keeps_base_path_prefix() {
        let model = ModelId::new("M1").expect("model");
        for base in ["https://gw.example.com/cadagent", "https://gw.example.com/cadagent/"] {
            let config = BackendConfig::new(base).expect("config");
            let url = config
                .endpoint_url(&config.endpoints.parameters_get, Some(&model))
                .expect("url");
            assert_eq!(
                url.as_str(),
                "https://gw.example.com/cadagent/api/v1/parameters/M1"
            );
        }
    }

    #[test]
    fn test_endpoint_url_requires_model_id() {
        let config = BackendConfig::default();
        let result = config.endpoint_url(&config.endpoints.iterate, None);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_scheme_and_zero_timeout() {
        let config = BackendConfig::new("ftp://example.com").expect("config");
        assert!(config.validate().is_err());

        let config = BackendConfig::default().with_timeout_ms(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_hides_auth_token() {
        let config = BackendConfig::default().with_auth_token("super-secret");
        assert!(!format!("{config:?}").contains("super-secret"));
    }

    #[test]
    fn test_default_timings() {
        let timings = Timings::default();
        assert_eq!(timings.poll_interval, Duration::from_millis(300));
        assert_eq!(timings.poll_attempts, 40);
        assert_eq!(timings.handshake_attempts, 10);
        assert_eq!(timings.planning_after, Duration::from_secs(5));
        assert_eq!(timings.generating_after, Duration::from_secs(10));
        assert_eq!(timings.completed_grace, Duration::from_secs(2));
        assert_eq!(timings.debounce_window, Duration::from_millis(300));
        assert!(timings.validate().is_ok());
    }

    #[test]
    fn test_timings_validate() {
        let timings = Timings {
            planning_after: Duration::from_secs(10),
            generating_after: Duration::from_secs(5),
            ..Timings::default()
        };
        assert!(timings.validate().is_err());
    }
}
