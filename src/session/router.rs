//! Push event dispatch.
//!
//! Every named event maps to exactly one handler. Terminal events end the
//! in-flight operation whatever their outcome; a payload that fails to decode
//! on a terminal event ends it too, so the processing gate is never left set.

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, info, warn};
use url::Url;

use crate::artifact::{ArtifactFetcher, ArtifactReference, ImportOutcome, ImportRequest};
use crate::backend::BackendClient;
use crate::error::{Error, Result, friendly_message};
use crate::feedback::{ChatRole, UiEvent};
use crate::identifiers::ModelId;
use crate::parameters::ParameterDescriptor;
use crate::protocol::{
    Action, CompletionPayload, ErrorPayload, EventAck, EventKind, HostEvent, InitPayload,
    ParsedEvent, ValidationPayload,
};

use super::{Controller, ParameterRoute};

/// Leading text of host-reported import failures.
const IMPORT_FAILURE_PREFIX: &str = "Import failed";

// ============================================================================
// Dispatch
// ============================================================================

impl Controller {
    /// Handles a push event inline and returns its acknowledgement token.
    ///
    /// [`Controller::handle_event`] queues events for this method; call it
    /// directly only when ordering against the queue does not matter.
    pub async fn dispatch_event(&self, event: HostEvent) -> EventAck {
        let Some(kind) = event.kind() else {
            warn!(name = %event.name, "Unknown push event");
            return EventAck::Unknown;
        };

        debug!(event = %kind, size = event.data.len(), "Dispatching push event");

        match event.parse() {
            Ok(parsed) => self.route(parsed).await,
            Err(e) => self.on_decode_failure(kind, &e),
        }

        kind.ack()
    }

    /// Routes a decoded event to its handler.
    async fn route(&self, event: ParsedEvent) {
        match event {
            ParsedEvent::ApiValidationResult(payload) => {
                if let Err(e) = self.apply_validation(payload).await {
                    warn!(error = %e, "Credential validation failed");
                }
            }
            ParsedEvent::Init(payload) => self.on_init(payload).await,
            ParsedEvent::GenerationComplete(payload) => {
                self.finish_completion(EventKind::GenerationComplete, payload)
                    .await;
            }
            ParsedEvent::StepReadyForImport(payload) => self.on_step_ready(payload).await,
            ParsedEvent::IterationComplete(payload) => {
                self.finish_completion(EventKind::IterationComplete, payload)
                    .await;
            }
            ParsedEvent::ParametersUpdated(payload) => {
                self.finish_completion(EventKind::ParametersUpdated, payload)
                    .await;
            }
            ParsedEvent::Error(payload) => self.on_error(payload),
        }
    }

    /// Reports an undecodable payload.
    fn on_decode_failure(&self, kind: EventKind, err: &Error) {
        warn!(event = %kind, error = %err, "Push event payload could not be decoded");

        if kind.is_terminal() || kind == EventKind::StepReadyForImport {
            self.fail_operation(err);
        } else {
            self.inner.feedback.error(err.user_message());
        }
    }
}

// ============================================================================
// Credential Events
// ============================================================================

impl Controller {
    /// Applies a credential verdict.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the credential was rejected.
    pub(crate) async fn apply_validation(&self, payload: ValidationPayload) -> Result<()> {
        if !payload.success {
            let rejected = self.inner.session.lock().reject_pending();
            let reason = payload
                .error
                .or(payload.message)
                .unwrap_or_else(|| "API key validation failed".to_string());
            info!(had_pending = rejected.is_some(), "Credential rejected");

            // The host repeats an immediate verdict as an event.
            if rejected.is_some() {
                self.inner.feedback.error(friendly_message(&reason));
            }
            self.inner
                .feedback
                .emit(UiEvent::CredentialPrompt { open: true });
            return Err(Error::validation(reason));
        }

        let accepted = self.inner.session.lock().accept_pending();
        self.inner
            .feedback
            .emit(UiEvent::CredentialPrompt { open: false });

        let Some(credential) = accepted else {
            debug!("Validation success without a staged credential");
            return Ok(());
        };

        info!(credential = %credential, "Credential accepted");
        self.inner.feedback.chat(
            ChatRole::System,
            payload
                .message
                .unwrap_or_else(|| "API key saved".to_string()),
        );

        let store = Action::StoreApiKey {
            api_key: credential,
        };
        if let Err(e) = self.inner.transport.send(&store).await {
            warn!(error = %e, "Failed to persist credential");
        }
        Ok(())
    }
}

// ============================================================================
// Init
// ============================================================================

impl Controller {
    /// Adopts the host's backend configuration and restores the credential.
    async fn on_init(&self, payload: InitPayload) {
        info!(
            version = payload.version.as_deref().unwrap_or("unknown"),
            backend = payload.backend_url.as_deref().unwrap_or("unchanged"),
            cached_key = payload.has_cached_api_key,
            "Host initialized"
        );

        if let Some(base_url) = payload.backend_url.as_deref()
            && let Err(e) = self.rebase_backend(base_url)
        {
            warn!(base_url, error = %e, "Backend URL rejected, keeping previous");
        }

        if let Some(message) = payload.message {
            self.inner.feedback.chat(ChatRole::System, message);
        }

        if payload.has_cached_api_key {
            debug!(
                source = payload.cached_key_source.as_deref().unwrap_or("unknown"),
                "Restoring cached credential"
            );
            if let Err(e) = self.load_cached_credential().await {
                warn!(error = %e, "Failed to restore cached credential");
                self.inner
                    .feedback
                    .emit(UiEvent::CredentialPrompt { open: true });
            }
        } else if self.inner.session.lock().credential().is_none() {
            self.inner
                .feedback
                .emit(UiEvent::CredentialPrompt { open: true });
        }
    }

    /// Points the backend configuration at a new root.
    ///
    /// Endpoints, timeout and token are kept. Nothing is replaced unless the
    /// new configuration and its clients are all valid.
    fn rebase_backend(&self, base_url: &str) -> Result<()> {
        let mut config = self.inner.backend.read().clone();
        config.base_url = Url::parse(base_url)?;
        config.validate()?;

        let fetcher =
            ArtifactFetcher::new(&config)?.with_chunk_bytes(self.inner.timings.encode_chunk_bytes);
        let rest = match self.inner.route {
            ParameterRoute::Direct => Some(BackendClient::new(config.clone())?),
            ParameterRoute::HostBridge => None,
        };

        *self.inner.fetcher.write() = fetcher;
        *self.inner.rest.write() = rest;
        *self.inner.backend.write() = config;
        debug!(base_url, "Backend configuration updated");
        Ok(())
    }
}

// ============================================================================
// Completion
// ============================================================================

impl Controller {
    /// Finalizes a generate, iterate or parameter update result.
    ///
    /// Always ends the operation.
    pub(crate) async fn finish_completion(&self, kind: EventKind, payload: CompletionPayload) {
        if let Some(reason) = payload.failure() {
            warn!(event = %kind, reason, "Operation reported failure");
            self.end_operation();
            self.inner.feedback.error(friendly_message(&reason));
            return;
        }

        let model_id = payload
            .model_id
            .clone()
            .or_else(|| self.active_model_id());

        if payload.needs_import()
            && let Some(reference) = payload.artifact()
        {
            let is_iteration = kind != EventKind::GenerationComplete || payload.is_iteration;
            match self
                .import_artifact(&reference, model_id.clone(), is_iteration)
                .await
            {
                Ok(outcome) => self.inner.feedback.chat(ChatRole::System, outcome.summary()),
                Err(e) => {
                    self.fail_operation(&e);
                    return;
                }
            }
        } else if kind == EventKind::ParametersUpdated && payload.artifact().is_none() {
            self.inner
                .feedback
                .chat(ChatRole::System, "Parameters updated");
        } else if payload.imported {
            let text = if payload.model_replaced {
                "Model imported successfully (previous model replaced)"
            } else {
                "Model imported successfully"
            };
            self.inner.feedback.chat(ChatRole::System, text);
        }

        let model_changed = self.adopt_model(model_id.as_ref());
        self.adopt_parameters(payload.parameters, model_changed).await;

        if let Some(summary) = payload.planning_summary.filter(|s| !s.trim().is_empty()) {
            self.inner.feedback.chat(ChatRole::Assistant, summary);
        }

        info!(event = %kind, model_id = ?model_id, "Operation completed");
        self.end_operation();
    }

    /// Sets the active model. Returns `true` if it changed.
    fn adopt_model(&self, model_id: Option<&ModelId>) -> bool {
        let Some(model_id) = model_id else {
            return false;
        };
        let mut session = self.inner.session.lock();
        let changed = session.active_model_id() != Some(model_id);
        session.set_active_model(model_id.clone());
        changed
    }

    /// Presents the result's parameters, fetching them when absent.
    async fn adopt_parameters(
        &self,
        parameters: Option<Vec<ParameterDescriptor>>,
        model_changed: bool,
    ) {
        if let Some(list) = parameters {
            self.apply_parameters(list);
            return;
        }

        let known = !self.inner.session.lock().parameters().is_empty();
        if known && !model_changed {
            return;
        }

        if let Err(e) = self.fetch_parameters().await {
            warn!(error = %e, "Failed to load parameters");
        }
    }
}

// ============================================================================
// Deferred Import & Errors
// ============================================================================

impl Controller {
    /// Relays a deferred artifact to the host's privileged import path.
    ///
    /// The host answers with `generation_complete` or `error`; only a failed
    /// relay ends the operation here.
    async fn on_step_ready(&self, payload: CompletionPayload) {
        let Some(reference) = payload.artifact() else {
            self.fail_operation(&Error::transfer("No model file data received"));
            return;
        };

        let model_id = payload
            .model_id
            .clone()
            .or_else(|| self.active_model_id());

        let outcome = match self.relay_import(&reference, &payload, model_id.clone()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.fail_operation(&e);
                return;
            }
        };
        self.inner.feedback.chat(ChatRole::System, outcome.summary());

        self.adopt_model(outcome.model_id.as_ref().or(model_id.as_ref()));
        if let Some(list) = payload.parameters {
            self.apply_parameters(list);
        }
        if let Some(summary) = payload.planning_summary.filter(|s| !s.trim().is_empty()) {
            self.inner.feedback.chat(ChatRole::Assistant, summary);
        }
    }

    /// Normalizes and relays a deferred artifact.
    ///
    /// A reply without a JSON object counts as a plain success.
    async fn relay_import(
        &self,
        reference: &ArtifactReference,
        payload: &CompletionPayload,
        model_id: Option<ModelId>,
    ) -> Result<ImportOutcome> {
        let data = self.resolve_artifact(reference).await?;
        let action = Action::StepImportFromBackground(ImportRequest::new(
            data,
            model_id,
            payload.is_iteration,
        ));

        let reply = self
            .inner
            .transport
            .send(&action)
            .await
            .map_err(|e| Error::transfer(format!("{IMPORT_FAILURE_PREFIX}: {e}")))?;

        let outcome = if reply.value().is_object() {
            reply
                .decode::<ImportOutcome>(action.name())?
                .into_result()?
        } else {
            ImportOutcome {
                success: true,
                ..ImportOutcome::default()
            }
        };
        debug!(replaced = outcome.model_replaced, "Deferred artifact relayed");
        Ok(outcome)
    }

    /// Ends the operation with the host's failure text.
    ///
    /// Import failures are shown as reported.
    fn on_error(&self, payload: ErrorPayload) {
        let text = payload.text();
        warn!(error = %text, "Host reported error");
        self.end_operation();

        let shown = if text.starts_with(IMPORT_FAILURE_PREFIX) {
            text
        } else {
            friendly_message(&text)
        };
        self.inner.feedback.error(shown);
    }
}

// ============================================================================
// Tests
// ============================================================================
