//! Direct REST client for the generation backend.
//!
//! Used for parameter traffic when the controller is configured to bypass
//! the host bridge.
//!
//! # Request Headers
//!
//! | Header | When |
//! |--------|------|
//! | `Idempotency-Key` | every `POST`/`PUT`, fresh UUID v4 per request |
//! | `Authorization: Bearer` | when `auth_token` is configured |
//! | `Content-Type: application/json` | requests with a body |
//! | `User-Agent` | always |
//!
//! # Special Responses
//!
//! `413 Payload Too Large` with a `Location` header is a success whose
//! artifact is only available at that location. Any other non-2xx status
//! is a failure carrying `HTTP <code>: <reason>`, replaced by the JSON
//! `error` field when the body has one.

// ============================================================================
// Imports
// ============================================================================

use reqwest::header::{HeaderValue, LOCATION};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::artifact::fetch::USER_AGENT;
use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::identifiers::{Credential, IdempotencyKey, ModelId};
use crate::parameters::{self, ParameterDescriptor, ParameterUpdate};
use crate::protocol::CompletionPayload;

// ============================================================================
// Constants
// ============================================================================

/// Idempotency header name.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

// ============================================================================
// BackendClient
// ============================================================================

/// REST client bound to one [`BackendConfig`].
#[derive(Debug, Clone)]
pub struct BackendClient {
    /// HTTP client.
    client: Client,
    /// Service configuration.
    config: BackendConfig,
}

/// Body of a parameter update.
#[derive(Serialize)]
struct UpdateBody<'a> {
    updates: &'a [ParameterUpdate],
    #[serde(serialize_with = "expose_or_empty")]
    anthropic_api_key: Option<&'a Credential>,
}

fn expose_or_empty<S: serde::Serializer>(
    credential: &Option<&Credential>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(credential.map_or("", |c| c.expose()))
}

impl BackendClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration is invalid
    /// - [`Error::Http`] if the client cannot be built
    pub fn new(config: BackendConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client, config })
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Pushes parameter values.
    ///
    /// The reply may carry an inline artifact, a remote one, or none.
    ///
    /// # Errors
    ///
    /// - [`Error::Backend`] if the backend reports failure
    /// - [`Error::Http`] on network failure
    /// - [`Error::Decode`] if the reply is malformed
    pub async fn update_parameters(
        &self,
        model_id: &ModelId,
        updates: &[ParameterUpdate],
        credential: Option<&Credential>,
    ) -> Result<CompletionPayload> {
        let url = self
            .config
            .endpoint_url(&self.config.endpoints.parameters_put, Some(model_id))?;
        let body = UpdateBody {
            updates,
            anthropic_api_key: credential,
        };

        let value = self
            .request(Method::PUT, url, Some(serde_json::to_value(&body)?))
            .await?;

        let payload: CompletionPayload = serde_json::from_value(value)
            .map_err(|e| Error::decode("parameter update reply", e.to_string()))?;

        match payload.failure() {
            Some(text) => Err(Error::backend(text)),
            None => Ok(payload),
        }
    }

    /// Lists the parameters of a model.
    ///
    /// # Errors
    ///
    /// - [`Error::Backend`] if the backend reports failure
    /// - [`Error::Decode`] if the listing is malformed
    pub async fn get_parameters(&self, model_id: &ModelId) -> Result<Vec<ParameterDescriptor>> {
        let url = self
            .config
            .endpoint_url(&self.config.endpoints.parameters_get, Some(model_id))?;
        let value = self.request(Method::GET, url, None).await?;

        if value.get("success").and_then(Value::as_bool) == Some(false) {
            let text = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Failed to load parameters");
            return Err(Error::backend(text));
        }
        parameters::from_listing(&value, "get_parameters")
    }

    /// Issues a request and folds the HTTP outcome into a JSON reply.
    async fn request(&self, method: Method, url: url::Url, body: Option<Value>) -> Result<Value> {
        let mutating = method == Method::POST || method == Method::PUT;
        let mut builder = self
            .client
            .request(method.clone(), url.clone())
            .timeout(self.config.timeout());

        if mutating {
            let key = IdempotencyKey::generate();
            builder = builder.header(IDEMPOTENCY_HEADER, key.to_string());
            debug!(%method, %url, idempotency_key = %key, "Backend request");
        } else {
            debug!(%method, %url, "Backend request");
        }

        if let Some(token) = &self.config.auth_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::PAYLOAD_TOO_LARGE
            && let Some(location) = response.headers().get(LOCATION).and_then(header_text)
        {
            debug!(%location, "Artifact offloaded to presigned location");
            return Ok(json!({
                "success": true,
                "presigned_url": location,
                "large_file": true,
            }));
        }

        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("Unknown");
            let mut failure = json!({
                "success": false,
                "error": format!("HTTP {}: {reason}", status.as_u16()),
            });
            if let Ok(Value::Object(fields)) = response.json::<Value>().await
                && let Some(target) = failure.as_object_mut()
            {
                target.extend(fields);
                target.insert("success".to_string(), Value::Bool(false));
            }
            warn!(status = status.as_u16(), error = %failure["error"], "Backend request failed");
            return Ok(failure);
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(json!({ "success": true }));
        }
        serde_json::from_str(&text).map_err(|e| Error::decode("backend reply", e.to_string()))
    }
}

/// Reads a header as text, ignoring empty values.
fn header_text(value: &HeaderValue) -> Option<String> {
    value
        .to_str()
        .ok()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use regex::Regex;
    use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::artifact::ArtifactReference;
    use crate::identifiers::ParameterId;

    fn client(server: &MockServer) -> BackendClient {
        let config = BackendConfig::new(&server.uri())
            .expect("config")
            .with_auth_token("backend-token");
        BackendClient::new(config).expect("client")
    }

    fn updates() -> Vec<ParameterUpdate> {
        vec![ParameterUpdate {
            id: ParameterId::new("width"),
            value: 25.0,
        }]
    }

    fn model() -> ModelId {
        ModelId::new("M1").expect("model")
    }

    #[tokio::test]
    async fn test_update_sends_idempotency_key_and_auth() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/direct/parameters/M1"))
            .and(header_exists(IDEMPOTENCY_HEADER))
            .and(header("authorization", "Bearer backend-token"))
            .and(body_partial_json(json!({
                "updates": [{"id": "width", "value": 25.0}],
                "anthropic_api_key": "sk-ant-test-key"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "model_id": "M1",
                "step_file": "U1RFUA=="
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server);
        let credential = Credential::new("sk-ant-test-key").expect("credential");
        for _ in 0..2 {
            let payload = client
                .update_parameters(&model(), &updates(), Some(&credential))
                .await
                .expect("update");
            assert!(matches!(payload.artifact(), Some(ArtifactReference::Inline(_))));
        }

        let shape = Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
            .expect("regex");
        let keys: Vec<String> = server
            .received_requests()
            .await
            .expect("recording")
            .iter()
            .filter_map(|r| r.headers.get(IDEMPOTENCY_HEADER))
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();
        assert_eq!(keys.len(), 2);
        assert_ne!(keys[0], keys[1]);
        assert!(keys.iter().all(|k| shape.is_match(k)));
    }

    #[tokio::test]
    async fn test_payload_too_large_yields_remote_artifact() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(413).insert_header("Location", "https://cdn.example/m1.step"),
            )
            .mount(&server)
            .await;

        let payload = client(&server)
            .update_parameters(&model(), &updates(), None)
            .await
            .expect("update");
        assert!(payload.large_file);
        assert_eq!(
            payload.artifact(),
            Some(ArtifactReference::remote("https://cdn.example/m1.step"))
        );
    }

    #[tokio::test]
    async fn test_http_failure_merges_json_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(json!({"error": "rate limit exceeded"})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .update_parameters(&model(), &updates(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend { ref message } if message == "rate limit exceeded"));
        assert!(err.user_message().contains("rate limit"));
    }

    #[tokio::test]
    async fn test_http_failure_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server)
            .update_parameters(&model(), &updates(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend { ref message } if message.starts_with("HTTP 500")));
    }

    #[tokio::test]
    async fn test_get_parameters_without_success_flag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/parameters/M1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "parameters": [
                    {"id": "w", "name": "width", "full_path": "Body.width", "value": 20.0},
                    {"id": "o", "name": "origin_x", "full_path": "Body.origin", "value": 0.0}
                ]
            })))
            .mount(&server)
            .await;

        let list = client(&server).get_parameters(&model()).await.expect("list");
        assert_eq!(list.len(), 2);
        assert_eq!(parameters::editable(&list).len(), 1);

        let requests = server.received_requests().await.expect("recording");
        assert!(requests[0].headers.get(IDEMPOTENCY_HEADER).is_none());
    }
}
