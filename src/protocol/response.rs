//! Host call responses.
//!
//! The host answers an action with flat text. Most actions reply with a JSON
//! object; the handshake replies with the bare sentinel `pong`.
//!
//! # Formats
//!
//! Asynchronous acknowledgement:
//! ```json
//! { "success": true, "processing": true, "message": "generation started" }
//! ```
//!
//! Completed result:
//! ```json
//! { "success": true, "model_id": "M1", "step_file": "...", "parameters": [ ... ] }
//! ```
//!
//! Failure:
//! ```json
//! { "success": false, "error": "No API key provided" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Handshake reply that confirms bidirectional communication.
pub const PONG_SENTINEL: &str = "pong";

// ============================================================================
// HostResponse
// ============================================================================

/// A settled host reply.
///
/// Keeps the raw text alongside its JSON decoding. Text that is not JSON is
/// held as a JSON string.
#[derive(Debug, Clone, PartialEq)]
pub struct HostResponse {
    /// Reply exactly as the host returned it.
    raw: String,
    /// Decoded reply.
    value: Value,
}

impl HostResponse {
    /// Wraps raw host text.
    #[must_use]
    pub fn from_text(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let value = serde_json::from_str(&raw).unwrap_or_else(|_| Value::String(raw.clone()));
        Self { raw, value }
    }

    /// Returns the raw reply text.
    #[inline]
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the decoded reply.
    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns `true` if the reply is the handshake sentinel.
    #[inline]
    #[must_use]
    pub fn is_pong(&self) -> bool {
        self.raw.trim() == PONG_SENTINEL
    }

    /// Returns `true` if the reply reports success.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.get_bool("success")
    }

    /// Returns `true` if the reply only acknowledges asynchronous processing.
    #[inline]
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.get_bool("processing")
    }

    /// Returns `true` if the reply is a finished, successful result.
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_success() && !self.is_processing()
    }

    /// Returns the failure text, preferring `error` over `message`.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.get_optional_string("error")
            .or_else(|| self.get_optional_string("message"))
    }

    /// Converts a `success: false` reply into an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] carrying the host's message.
    pub fn into_result(self, action: &str) -> Result<Self> {
        if self.value.is_object() && !self.is_success() {
            let message = self
                .error_message()
                .unwrap_or_else(|| "Host reported failure".to_string());
            return Err(Error::transport(action, message));
        }
        Ok(self)
    }

    /// Decodes the reply into a typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the shape does not match.
    pub fn decode<T: DeserializeOwned>(&self, context: &str) -> Result<T> {
        serde_json::from_value(self.value.clone())
            .map_err(|e| Error::decode(context, e.to_string()))
    }

    /// Gets a non-empty string value.
    #[inline]
    #[must_use]
    pub fn get_optional_string(&self, key: &str) -> Option<String> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Gets a boolean value.
    ///
    /// Returns false if key not found or not a boolean.
    #[inline]
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.value
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pong_sentinel() {
        let response = HostResponse::from_text("pong");
        assert!(response.is_pong());
        assert_eq!(response.value(), &Value::String("pong".into()));

        assert!(!HostResponse::from_text(r#"{"success": true}"#).is_pong());
    }

    #[test]
    fn test_processing_ack() {
        let response =
            HostResponse::from_text(r#"{"success": true, "processing": true, "message": "generation started"}"#);
        assert!(response.is_success());
        assert!(response.is_processing());
        assert!(!response.is_completed());
    }

    #[test]
    fn test_completed_result() {
        let response =
            HostResponse::from_text(r#"{"success": true, "model_id": "M1", "step_file": "AAAA"}"#);
        assert!(response.is_completed());
        assert_eq!(response.get_optional_string("model_id").as_deref(), Some("M1"));
    }

    #[test]
    fn test_into_result_error() {
        let response = HostResponse::from_text(r#"{"success": false, "error": "No API key provided"}"#);
        assert_eq!(response.error_message().as_deref(), Some("No API key provided"));

        let err = response.into_result("validate_api_key").unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert!(err.to_string().contains("No API key provided"));
    }

    #[test]
    fn test_into_result_passes_plain_text() {
        let response = HostResponse::from_text("ok");
        assert!(response.into_result("html_ready").is_ok());
    }

    #[test]
    fn test_get_helpers_defaults() {
        let response = HostResponse::from_text(r#"{"name": "", "flag": "yes"}"#);
        assert_eq!(response.get_optional_string("missing"), None);
        assert_eq!(response.get_optional_string("name"), None);
        assert!(!response.get_bool("flag"));
    }
}
