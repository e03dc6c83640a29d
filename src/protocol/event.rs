//! Push events delivered by the host.
//!
//! Events are single-shot notifications carrying a serialized payload. The
//! vocabulary is closed: [`EventKind`] lists every name the host may send and
//! each has its own acknowledgement token. Names outside the vocabulary are
//! acknowledged with [`EventAck::Unknown`].
//!
//! # Event Types
//!
//! | Name | Payload | Terminal |
//! |------|---------|----------|
//! | `api_validation_result` | [`ValidationPayload`] | no |
//! | `init` | [`InitPayload`] | no |
//! | `generation_complete` | [`CompletionPayload`] | yes |
//! | `step_ready_for_import` | [`CompletionPayload`] | no |
//! | `iteration_complete` | [`CompletionPayload`] | yes |
//! | `parameters_updated` | [`CompletionPayload`] | yes |
//! | `error` | [`ErrorPayload`] | yes |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::artifact::ArtifactReference;
use crate::error::{Error, Result};
use crate::identifiers::{ModelId, blank_model_id_as_none};
use crate::parameters::ParameterDescriptor;

// ============================================================================
// HostEvent
// ============================================================================

/// A raw push event as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEvent {
    /// Event name.
    pub name: String,
    /// Serialized payload.
    pub data: String,
}

impl HostEvent {
    /// Creates a new event.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Returns the event kind, or `None` for names outside the vocabulary.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_name(&self.name)
    }

    /// Decodes the payload into a typed event.
    ///
    /// An empty payload decodes as an empty object.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownEvent`] if the name is outside the vocabulary
    /// - [`Error::Decode`] if the payload does not match the event's shape
    pub fn parse(&self) -> Result<ParsedEvent> {
        let kind = self
            .kind()
            .ok_or_else(|| Error::unknown_event(&self.name))?;

        let parsed = match kind {
            EventKind::ApiValidationResult => {
                ParsedEvent::ApiValidationResult(self.decode_payload(kind)?)
            }
            EventKind::Init => ParsedEvent::Init(self.decode_payload(kind)?),
            EventKind::GenerationComplete => {
                ParsedEvent::GenerationComplete(self.decode_payload(kind)?)
            }
            EventKind::StepReadyForImport => {
                ParsedEvent::StepReadyForImport(self.decode_payload(kind)?)
            }
            EventKind::IterationComplete => {
                ParsedEvent::IterationComplete(self.decode_payload(kind)?)
            }
            EventKind::ParametersUpdated => {
                ParsedEvent::ParametersUpdated(self.decode_payload(kind)?)
            }
            EventKind::Error => ParsedEvent::Error(self.decode_payload(kind)?),
        };

        Ok(parsed)
    }

    /// Decodes the payload text for `kind`.
    fn decode_payload<T: DeserializeOwned>(&self, kind: EventKind) -> Result<T> {
        let text = if self.data.trim().is_empty() {
            "{}"
        } else {
            self.data.as_str()
        };
        serde_json::from_str(text).map_err(|e| Error::decode(kind.name(), e.to_string()))
    }
}

// ============================================================================
// EventKind
// ============================================================================

/// Closed vocabulary of push events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Credential validation outcome.
    ApiValidationResult,
    /// Host initialization with backend configuration.
    Init,
    /// New model finished.
    GenerationComplete,
    /// Deferred artifact ready to be relayed for import.
    StepReadyForImport,
    /// Iteration finished.
    IterationComplete,
    /// Parameter update finished.
    ParametersUpdated,
    /// Operation failed.
    Error,
}

impl EventKind {
    /// Every kind, in dispatch order.
    pub const ALL: [Self; 7] = [
        Self::ApiValidationResult,
        Self::Init,
        Self::GenerationComplete,
        Self::StepReadyForImport,
        Self::IterationComplete,
        Self::ParametersUpdated,
        Self::Error,
    ];

    /// Looks up a kind by wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ApiValidationResult => "api_validation_result",
            Self::Init => "init",
            Self::GenerationComplete => "generation_complete",
            Self::StepReadyForImport => "step_ready_for_import",
            Self::IterationComplete => "iteration_complete",
            Self::ParametersUpdated => "parameters_updated",
            Self::Error => "error",
        }
    }

    /// Returns `true` if the event ends the in-flight operation.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::GenerationComplete
                | Self::IterationComplete
                | Self::ParametersUpdated
                | Self::Error
        )
    }

    /// Returns the acknowledgement returned to the host for this kind.
    #[must_use]
    pub const fn ack(self) -> EventAck {
        match self {
            Self::ApiValidationResult => EventAck::ApiValidationResult,
            Self::Init => EventAck::Init,
            Self::GenerationComplete => EventAck::GenerationComplete,
            Self::StepReadyForImport => EventAck::StepReadyForImport,
            Self::IterationComplete => EventAck::IterationComplete,
            Self::ParametersUpdated => EventAck::ParametersUpdated,
            Self::Error => EventAck::Error,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// EventAck
// ============================================================================

/// Delivery acknowledgement returned to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventAck {
    /// `api_validation_result` delivered.
    ApiValidationResult,
    /// `init` delivered.
    Init,
    /// `generation_complete` delivered.
    GenerationComplete,
    /// `step_ready_for_import` delivered.
    StepReadyForImport,
    /// `iteration_complete` delivered.
    IterationComplete,
    /// `parameters_updated` delivered.
    ParametersUpdated,
    /// `error` delivered.
    Error,
    /// Name outside the vocabulary.
    Unknown,
}

impl EventAck {
    /// Returns the token text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApiValidationResult => "API_VALIDATION_RESULT_ACK",
            Self::Init => "INIT_ACK",
            Self::GenerationComplete => "GENERATION_COMPLETE_ACK",
            Self::StepReadyForImport => "STEP_READY_FOR_IMPORT_ACK",
            Self::IterationComplete => "ITERATION_COMPLETE_ACK",
            Self::ParametersUpdated => "PARAMETERS_UPDATED_ACK",
            Self::Error => "ERROR_ACK",
            Self::Unknown => "UNKNOWN_ACTION",
        }
    }
}

impl fmt::Display for EventAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Typed push events.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    /// Credential validation outcome.
    ApiValidationResult(ValidationPayload),
    /// Host initialization.
    Init(InitPayload),
    /// New model finished.
    GenerationComplete(CompletionPayload),
    /// Deferred artifact ready for relay.
    StepReadyForImport(CompletionPayload),
    /// Iteration finished.
    IterationComplete(CompletionPayload),
    /// Parameter update finished.
    ParametersUpdated(CompletionPayload),
    /// Operation failed.
    Error(ErrorPayload),
}

impl ParsedEvent {
    /// Returns the kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ApiValidationResult(_) => EventKind::ApiValidationResult,
            Self::Init(_) => EventKind::Init,
            Self::GenerationComplete(_) => EventKind::GenerationComplete,
            Self::StepReadyForImport(_) => EventKind::StepReadyForImport,
            Self::IterationComplete(_) => EventKind::IterationComplete,
            Self::ParametersUpdated(_) => EventKind::ParametersUpdated,
            Self::Error(_) => EventKind::Error,
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// `api_validation_result` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ValidationPayload {
    /// Whether the credential was accepted.
    pub success: bool,
    /// Rejection reason.
    pub error: Option<String>,
    /// Informational text.
    pub message: Option<String>,
}

/// `init` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InitPayload {
    /// Backend root the host talks to.
    pub backend_url: Option<String>,
    /// Host add-in version.
    pub version: Option<String>,
    /// Greeting text.
    pub message: Option<String>,
    /// Whether the host holds a stored credential.
    pub has_cached_api_key: bool,
    /// Where the stored credential came from.
    pub cached_key_source: Option<String>,
}

/// Result of a generate, iterate, or parameter update.
///
/// Shared by push events, legacy immediate replies and direct REST replies.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompletionPayload {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Resulting model.
    #[serde(deserialize_with = "blank_model_id_as_none")]
    pub model_id: Option<ModelId>,
    /// Updated parameter set.
    pub parameters: Option<Vec<ParameterDescriptor>>,
    /// Planner notes to show in the chat.
    pub planning_summary: Option<String>,
    /// Whether the host already imported the artifact.
    pub imported: bool,
    /// Whether a previous model was superseded.
    pub model_replaced: bool,
    /// Whether the result belongs to an iteration.
    pub is_iteration: bool,
    /// Informational text.
    pub message: Option<String>,
    /// Failure text.
    pub error: Option<String>,
    /// Inline artifact (base64).
    pub step_file: Option<String>,
    /// Inline artifact under the relay field name.
    pub step_file_data: Option<String>,
    /// Remote artifact location.
    pub presigned_url: Option<String>,
    /// Set when the artifact is only available remotely.
    pub large_file: bool,
}

impl Default for CompletionPayload {
    fn default() -> Self {
        Self {
            success: true,
            model_id: None,
            parameters: None,
            planning_summary: None,
            imported: false,
            model_replaced: false,
            is_iteration: false,
            message: None,
            error: None,
            step_file: None,
            step_file_data: None,
            presigned_url: None,
            large_file: false,
        }
    }
}

impl CompletionPayload {
    /// Returns the artifact reference carried by this result.
    ///
    /// Inline bytes win over a remote location.
    #[must_use]
    pub fn artifact(&self) -> Option<ArtifactReference> {
        let inline = self
            .step_file
            .as_deref()
            .or(self.step_file_data.as_deref())
            .filter(|data| !data.is_empty());

        if let Some(data) = inline {
            return Some(ArtifactReference::inline(data));
        }

        self.presigned_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(ArtifactReference::remote)
    }

    /// Returns `true` if an artifact still has to be imported by this side.
    #[inline]
    #[must_use]
    pub fn needs_import(&self) -> bool {
        !self.imported && self.artifact().is_some()
    }

    /// Returns the failure text, if the result reports one.
    #[must_use]
    pub fn failure(&self) -> Option<String> {
        if self.success {
            return None;
        }
        Some(
            self.error
                .clone()
                .or_else(|| self.message.clone())
                .unwrap_or_else(|| "Operation failed".to_string()),
        )
    }
}

/// `error` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ErrorPayload {
    /// Failure text.
    pub message: Option<String>,
    /// Alternate failure field.
    pub error: Option<String>,
}

impl ErrorPayload {
    /// Returns the failure text.
    #[must_use]
    pub fn text(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_lookup_round_trips_names() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(EventKind::from_name("unexpected"), None);
    }

    #[test]
    fn test_ack_tokens_are_distinct() {
        let mut tokens: Vec<&str> = EventKind::ALL.iter().map(|k| k.ack().as_str()).collect();
        tokens.push(EventAck::Unknown.as_str());
        let count = tokens.len();
        tokens.sort_unstable();
        tokens.dedup();
        assert_eq!(tokens.len(), count);
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(EventKind::GenerationComplete.is_terminal());
        assert!(EventKind::IterationComplete.is_terminal());
        assert!(EventKind::ParametersUpdated.is_terminal());
        assert!(EventKind::Error.is_terminal());
        assert!(!EventKind::Init.is_terminal());
        assert!(!EventKind::StepReadyForImport.is_terminal());
        assert!(!EventKind::ApiValidationResult.is_terminal());
    }

    #[test]
    fn test_generation_complete_parsing() {
        let event = HostEvent::new(
            "generation_complete",
            r#"{
                "success": true,
                "model_id": "M1",
                "imported": true,
                "planning_summary": "A 20mm cube",
                "parameters": [
                    {"id": "p1", "name": "width", "full_path": "Body.width", "value": 20.0}
                ]
            }"#,
        );

        match event.parse().expect("parse") {
            ParsedEvent::GenerationComplete(payload) => {
                assert_eq!(payload.model_id.as_ref().map(ModelId::as_str), Some("M1"));
                assert!(payload.imported);
                assert!(!payload.needs_import());
                assert_eq!(payload.parameters.map(|p| p.len()), Some(1));
            }
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_completion_prefers_inline_artifact() {
        let payload: CompletionPayload = serde_json::from_str(
            r#"{"step_file_data": "QUJD", "presigned_url": "https://cdn/x.step"}"#,
        )
        .expect("parse");
        assert!(payload.success);
        assert!(matches!(payload.artifact(), Some(ArtifactReference::Inline(_))));
    }

    #[test]
    fn test_completion_remote_artifact() {
        let payload: CompletionPayload = serde_json::from_str(
            r#"{"large_file": true, "presigned_url": "https://cdn/x.step", "model_id": "M2"}"#,
        )
        .expect("parse");
        assert!(matches!(payload.artifact(), Some(ArtifactReference::Remote(_))));
        assert!(payload.needs_import());
    }

    #[test]
    fn test_completion_blank_model_id_is_absent() {
        let payload: CompletionPayload =
            serde_json::from_str(r#"{"success": true, "model_id": "  ", "imported": true}"#)
                .expect("parse");
        assert!(payload.model_id.is_none());
        assert!(payload.imported);
    }

    #[test]
    fn test_completion_failure_text() {
        let payload: CompletionPayload =
            serde_json::from_str(r#"{"success": false, "error": "bad key"}"#).expect("parse");
        assert_eq!(payload.failure().as_deref(), Some("bad key"));
    }

    #[test]
    fn test_empty_payload_decodes_as_object() {
        let event = HostEvent::new("error", "");
        match event.parse().expect("parse") {
            ParsedEvent::Error(payload) => assert_eq!(payload.text(), "Unknown error"),
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_payload_is_decode_error() {
        let event = HostEvent::new("iteration_complete", "{not json");
        assert_eq!(event.kind(), Some(EventKind::IterationComplete));
        assert!(matches!(event.parse(), Err(Error::Decode { .. })));
    }

    #[test]
    fn test_unknown_event_name() {
        let event = HostEvent::new("custom_event", "{}");
        assert_eq!(event.kind(), None);
        assert!(matches!(event.parse(), Err(Error::UnknownEvent { .. })));
    }

    #[test]
    fn test_init_payload() {
        let event = HostEvent::new(
            "init",
            r#"{"type": "init", "backend_url": "http://localhost:8000", "has_cached_api_key": true, "cached_key_source": "memory"}"#,
        );
        match event.parse().expect("parse") {
            ParsedEvent::Init(payload) => {
                assert_eq!(payload.backend_url.as_deref(), Some("http://localhost:8000"));
                assert!(payload.has_cached_api_key);
            }
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }
}
