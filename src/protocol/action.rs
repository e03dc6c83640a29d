//! Outbound actions issued to the host bridge.
//!
//! The host accepts an action name plus a flat text payload. Each variant of
//! [`Action`] maps to exactly one host action; the payload is the JSON text of
//! the variant's fields.
//!
//! | Action | Payload | Async effect |
//! |--------|---------|--------------|
//! | `html_ready` | `timestamp` | host emits `init` |
//! | `ping` | `timestamp`, `attempt` | reply `pong` |
//! | `validate_api_key` | `api_key` | `api_validation_result` |
//! | `store_api_key` | `api_key` | - |
//! | `get_cached_api_key` | - | - |
//! | `clear_cached_api_key` | - | - |
//! | `generate_model` | `prompt`, `anthropic_api_key` | `generation_complete` |
//! | `iterate_model` | `model_id`, `prompt`, `anthropic_api_key` | `iteration_complete` |
//! | `get_parameters` | `model_id` | - |
//! | `update_parameters` | `model_id`, `updates` | `parameters_updated` |
//! | `import_step_file` | `step_file_data`, `model_id`, `is_iteration` | - |
//! | `step_import_from_background` | same as `import_step_file` | `generation_complete` |
//! | `show_notification` | `message`, `type` | - |

// ============================================================================
// Imports
// ============================================================================

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::artifact::ImportRequest;
use crate::error::Result;
use crate::identifiers::{Credential, ModelId};
use crate::parameters::ParameterUpdate;

// ============================================================================
// Action
// ============================================================================

/// All outbound host actions.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum Action {
    /// Readiness ping, fire-and-forget.
    HtmlReady {
        /// Milliseconds since the Unix epoch.
        timestamp: u64,
    },

    /// Handshake request.
    Ping {
        /// Milliseconds since the Unix epoch.
        timestamp: u64,
        /// One-based handshake attempt.
        attempt: u32,
    },

    /// Submit a credential for validation.
    ValidateApiKey {
        /// Candidate credential.
        api_key: Credential,
    },

    /// Persist a validated credential.
    StoreApiKey {
        /// Validated credential.
        api_key: Credential,
    },

    /// Retrieve a previously stored credential.
    GetCachedApiKey,

    /// Forget the stored credential.
    ClearCachedApiKey,

    /// Generate a new model.
    GenerateModel {
        /// Trimmed user prompt.
        prompt: String,
        /// Credential, empty when the host should use its own default.
        #[serde(serialize_with = "credential_or_empty")]
        anthropic_api_key: Option<Credential>,
    },

    /// Iterate on the active model.
    IterateModel {
        /// Active model.
        model_id: ModelId,
        /// Trimmed user prompt.
        prompt: String,
        /// Credential, empty when the host should use its own default.
        #[serde(serialize_with = "credential_or_empty")]
        anthropic_api_key: Option<Credential>,
    },

    /// Fetch parameters of a model.
    GetParameters {
        /// Model to query.
        model_id: ModelId,
    },

    /// Push edited parameter values.
    UpdateParameters {
        /// Model to update.
        model_id: ModelId,
        /// Latest value per parameter id.
        updates: Vec<ParameterUpdate>,
    },

    /// Import an inline artifact.
    ImportStepFile(ImportRequest),

    /// Relay a deferred artifact for import on the host's privileged context.
    StepImportFromBackground(ImportRequest),

    /// Show a native notification.
    ShowNotification {
        /// Notification text.
        message: String,
        /// Severity.
        #[serde(rename = "type")]
        severity: Severity,
    },
}

/// Serializes a missing credential as an empty string.
fn credential_or_empty<S: Serializer>(
    credential: &Option<Credential>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(credential.as_ref().map_or("", Credential::expose))
}

impl Action {
    /// Returns the host action name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::HtmlReady { .. } => "html_ready",
            Self::Ping { .. } => "ping",
            Self::ValidateApiKey { .. } => "validate_api_key",
            Self::StoreApiKey { .. } => "store_api_key",
            Self::GetCachedApiKey => "get_cached_api_key",
            Self::ClearCachedApiKey => "clear_cached_api_key",
            Self::GenerateModel { .. } => "generate_model",
            Self::IterateModel { .. } => "iterate_model",
            Self::GetParameters { .. } => "get_parameters",
            Self::UpdateParameters { .. } => "update_parameters",
            Self::ImportStepFile(_) => "import_step_file",
            Self::StepImportFromBackground(_) => "step_import_from_background",
            Self::ShowNotification { .. } => "show_notification",
        }
    }

    /// Serializes the payload to the flat text form the host accepts.
    ///
    /// Actions without fields produce `{}`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn payload(&self) -> Result<String> {
        let mut envelope = serde_json::to_value(self)?;
        let data = envelope
            .get_mut("data")
            .map(Value::take)
            .unwrap_or_else(|| Value::Object(Default::default()));
        Ok(serde_json::to_string(&data)?)
    }
}

// ============================================================================
// Severity
// ============================================================================

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational.
    #[default]
    Info,
    /// Warning.
    Warning,
    /// Error.
    Error,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::identifiers::ParameterId;

    #[test]
    fn test_ping_payload() {
        let action = Action::Ping {
            timestamp: 1700,
            attempt: 3,
        };
        assert_eq!(action.name(), "ping");
        let payload: Value = serde_json::from_str(&action.payload().expect("payload"))
            .expect("json");
        assert_eq!(payload["timestamp"], 1700);
        assert_eq!(payload["attempt"], 3);
    }

    #[test]
    fn test_unit_action_payload_is_empty_object() {
        let action = Action::GetCachedApiKey;
        assert_eq!(action.name(), "get_cached_api_key");
        assert_eq!(action.payload().expect("payload"), "{}");
    }

    #[test]
    fn test_generate_without_credential_sends_empty_string() {
        let action = Action::GenerateModel {
            prompt: "create a cube".into(),
            anthropic_api_key: None,
        };
        let payload: Value = serde_json::from_str(&action.payload().expect("payload"))
            .expect("json");
        assert_eq!(payload["prompt"], "create a cube");
        assert_eq!(payload["anthropic_api_key"], "");
    }

    #[test]
    fn test_iterate_payload_carries_model_and_secret() {
        let action = Action::IterateModel {
            model_id: ModelId::new("M1").expect("model"),
            prompt: "add a hole".into(),
            anthropic_api_key: Credential::new("sk-ant-1234567890"),
        };
        let payload: Value = serde_json::from_str(&action.payload().expect("payload"))
            .expect("json");
        assert_eq!(payload["model_id"], "M1");
        assert_eq!(payload["anthropic_api_key"], "sk-ant-1234567890");

        // Debug output stays masked.
        assert!(!format!("{action:?}").contains("1234567890"));
    }

    #[test]
    fn test_update_parameters_payload() {
        let action = Action::UpdateParameters {
            model_id: ModelId::new("M1").expect("model"),
            updates: vec![ParameterUpdate {
                id: ParameterId::new("width"),
                value: 42.5,
            }],
        };
        let payload: Value = serde_json::from_str(&action.payload().expect("payload"))
            .expect("json");
        assert_eq!(payload["updates"][0]["id"], "width");
        assert_eq!(payload["updates"][0]["value"], 42.5);
    }

    #[test]
    fn test_notification_severity_field() {
        let action = Action::ShowNotification {
            message: "Saved".into(),
            severity: Severity::Warning,
        };
        let payload: Value = serde_json::from_str(&action.payload().expect("payload"))
            .expect("json");
        assert_eq!(payload["type"], "warning");
    }

    #[test]
    fn test_import_actions_share_payload_shape() {
        let request = ImportRequest::new("U1RFUA==", ModelId::new("M1"), true);
        let direct = Action::ImportStepFile(request.clone());
        let relay = Action::StepImportFromBackground(request);
        assert_eq!(direct.name(), "import_step_file");
        assert_eq!(relay.name(), "step_import_from_background");
        assert_eq!(
            direct.payload().expect("payload"),
            relay.payload().expect("payload")
        );
    }
}
