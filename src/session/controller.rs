//! Session controller.
//!
//! The [`Controller`] owns the [`Session`], the progress indicator, the
//! parameter editor and the artifact pipeline, and exposes every
//! user-triggered operation. Push events from the host enter through
//! [`Controller::handle_event`] and are dispatched in arrival order by a
//! background task (see the `router` module).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cadagent_bridge::{BridgeTransport, Controller, Feedback};
//!
//! let (feedback, mut ui) = Feedback::channel();
//! let controller = Controller::builder()
//!     .transport(Arc::new(BridgeTransport::new(host)))
//!     .feedback(feedback)
//!     .build()?;
//!
//! controller.connect().await;
//! controller.submit_prompt("create a 20mm cube").await?;
//! ```
//!
//! # Operations
//!
//! | Operation | Gate | Outbound action |
//! |-----------|------|-----------------|
//! | `submit_prompt` | processing | `generate_model` / `iterate_model` |
//! | `commit_parameter_updates` | processing + model | `update_parameters` or REST `PUT` |
//! | `fetch_parameters` | model | `get_parameters` or REST `GET` |
//! | `submit_credential` | - | `validate_api_key` |
//! | `load_cached_credential` | - | `get_cached_api_key` |
//! | `clear_credential` | - | `clear_cached_api_key` |
//! | `import_artifact` | - | `import_step_file` |
//! | `notify` | - | `show_notification` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::artifact::{ArtifactFetcher, ArtifactReference, ImportOutcome, ImportRequest};
use crate::backend::BackendClient;
use crate::config::{BackendConfig, Timings};
use crate::error::{Error, Result, friendly_message};
use crate::feedback::{ChatRole, Feedback, UiEvent};
use crate::identifiers::{Credential, ModelId, ParameterId};
use crate::parameters::{
    self, Debouncer, EditSource, ParameterDescriptor, ParameterEditor, ParameterUpdate,
    ParameterView,
};
use crate::progress::ProgressReporter;
use crate::protocol::{
    Action, CompletionPayload, EventAck, EventKind, HostEvent, HostResponse, Severity,
};
use crate::transport::{Bootstrap, ConnectionStatus, Transport};

use super::Session;

// ============================================================================
// ParameterRoute
// ============================================================================

/// Where parameter traffic goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterRoute {
    /// Through the host bridge (`get_parameters` / `update_parameters`).
    #[default]
    HostBridge,
    /// Directly to the backend REST API.
    Direct,
}

// ============================================================================
// ControllerBuilder
// ============================================================================

/// Builder for a [`Controller`].
#[derive(Default)]
pub struct ControllerBuilder {
    /// Host transport.
    transport: Option<Arc<dyn Transport>>,
    /// UI sink.
    feedback: Option<Feedback>,
    /// Timer constants.
    timings: Timings,
    /// Initial backend configuration.
    backend: BackendConfig,
    /// Parameter traffic route.
    route: ParameterRoute,
}

impl fmt::Debug for ControllerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerBuilder")
            .field("transport", &self.transport.is_some())
            .field("feedback", &self.feedback.is_some())
            .field("timings", &self.timings)
            .field("backend", &self.backend)
            .field("route", &self.route)
            .finish()
    }
}

impl ControllerBuilder {
    /// Creates a builder with default timings and backend.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host transport.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the UI sink.
    #[inline]
    #[must_use]
    pub fn feedback(mut self, feedback: Feedback) -> Self {
        self.feedback = Some(feedback);
        self
    }

    /// Overrides the timer constants.
    #[inline]
    #[must_use]
    pub fn timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Sets the backend configuration used until the host sends `init`.
    #[inline]
    #[must_use]
    pub fn backend(mut self, config: BackendConfig) -> Self {
        self.backend = config;
        self
    }

    /// Sets where parameter traffic goes.
    #[inline]
    #[must_use]
    pub fn parameter_route(mut self, route: ParameterRoute) -> Self {
        self.route = route;
        self
    }

    /// Builds the controller and spawns its background tasks.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if transport or feedback is missing, or the
    ///   timings or backend configuration are invalid
    /// - [`Error::Http`] if an HTTP client cannot be built
    pub fn build(self) -> Result<Controller> {
        let transport = self.transport.ok_or_else(|| {
            Error::config(
                "Transport is required. Use .transport() to set it.\n\
                 Example: Controller::builder().transport(Arc::new(BridgeTransport::new(host)))",
            )
        })?;
        let feedback = self.feedback.ok_or_else(|| {
            Error::config(
                "Feedback sink is required. Use .feedback() to set it.\n\
                 Example: let (feedback, ui) = Feedback::channel();",
            )
        })?;

        self.timings.validate()?;
        self.backend.validate()?;

        let fetcher = ArtifactFetcher::new(&self.backend)?
            .with_chunk_bytes(self.timings.encode_chunk_bytes);
        let rest = match self.route {
            ParameterRoute::Direct => Some(BackendClient::new(self.backend.clone())?),
            ParameterRoute::HostBridge => None,
        };

        let (debouncer, batches) = Debouncer::spawn(self.timings.debounce_window);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(ControllerInner {
            bootstrap: Bootstrap::new(Arc::clone(&transport), self.timings, feedback.clone()),
            progress: ProgressReporter::new(feedback.clone(), self.timings),
            transport,
            feedback,
            timings: self.timings,
            route: self.route,
            session: Mutex::new(Session::new()),
            backend: RwLock::new(self.backend),
            fetcher: RwLock::new(fetcher),
            rest: RwLock::new(rest),
            editor: Mutex::new(ParameterEditor::new()),
            debouncer,
            events: events_tx,
        });

        tokio::spawn(run_event_loop(Arc::downgrade(&inner), events_rx));
        tokio::spawn(run_commit_loop(Arc::downgrade(&inner), batches));

        debug!(route = ?inner.route, "Controller built");
        Ok(Controller { inner })
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Shared controller state.
pub(crate) struct ControllerInner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) feedback: Feedback,
    pub(crate) timings: Timings,
    pub(crate) route: ParameterRoute,
    pub(crate) session: Mutex<Session>,
    pub(crate) backend: RwLock<BackendConfig>,
    pub(crate) fetcher: RwLock<ArtifactFetcher>,
    pub(crate) rest: RwLock<Option<BackendClient>>,
    pub(crate) progress: ProgressReporter,
    pub(crate) editor: Mutex<ParameterEditor>,
    pub(crate) bootstrap: Bootstrap,
    debouncer: Debouncer,
    events: mpsc::UnboundedSender<HostEvent>,
}

/// Drives the chat panel session against the host.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Controller {
    pub(crate) inner: Arc<ControllerInner>,
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("session", &*self.inner.session.lock())
            .field("route", &self.inner.route)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Controller - Accessors
// ============================================================================

impl Controller {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::new()
    }

    /// Returns a snapshot of the session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.session.lock().clone()
    }

    /// Returns `true` while a gated operation is in flight.
    #[inline]
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.inner.session.lock().is_processing()
    }

    /// Returns the active model.
    #[must_use]
    pub fn active_model_id(&self) -> Option<ModelId> {
        self.inner.session.lock().active_model_id().cloned()
    }

    /// Returns the current backend configuration.
    #[must_use]
    pub fn backend_config(&self) -> BackendConfig {
        self.inner.backend.read().clone()
    }

    /// Returns the progress reporter.
    #[inline]
    #[must_use]
    pub fn progress(&self) -> &ProgressReporter {
        &self.inner.progress
    }

    /// Returns the presented parameters.
    #[must_use]
    pub fn parameter_views(&self) -> Vec<ParameterView> {
        self.inner.editor.lock().views().to_vec()
    }

    /// Returns the timer constants.
    #[inline]
    #[must_use]
    pub fn timings(&self) -> Timings {
        self.inner.timings
    }
}

// ============================================================================
// Controller - Connection
// ============================================================================

impl Controller {
    /// Runs availability polling and the handshake.
    pub async fn connect(&self) -> ConnectionStatus {
        self.inner.bootstrap.run().await
    }

    /// Returns the connection status.
    #[inline]
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.inner.bootstrap.status()
    }

    /// Subscribes to connection status changes.
    #[inline]
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.bootstrap.subscribe()
    }
}

// ============================================================================
// Controller - Root Actions
// ============================================================================

impl Controller {
    /// Submits a prompt: Generate without an active model, Iterate with one.
    ///
    /// The reply is normally an acknowledgement; the result arrives later as
    /// a push event. A reply that already holds a completed result is
    /// finalized right away.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] / [`Error::EmptyPrompt`] without sending anything
    /// - Any transport failure, after it has been surfaced to the user
    pub async fn submit_prompt(&self, prompt: &str) -> Result<()> {
        let (action, operation) = {
            let mut session = self.inner.session.lock();
            let action = session.root_action(prompt)?;
            let operation = session.begin()?;
            (action, operation)
        };

        let name = action.name();
        info!(action = name, operation, "Root action started");

        self.inner.feedback.chat(ChatRole::User, prompt.trim());
        self.inner.feedback.prompt_input(false);
        self.inner.progress.start();

        let kind = match &action {
            Action::IterateModel { .. } => EventKind::IterationComplete,
            _ => EventKind::GenerationComplete,
        };

        let reply = self
            .inner
            .transport
            .send(&action)
            .await
            .and_then(|reply| reply.into_result(name));

        self.settle_immediate(operation, kind, reply).await
    }

    /// Handles the immediate reply of a gated action.
    pub(crate) async fn settle_immediate(
        &self,
        operation: u64,
        kind: EventKind,
        reply: Result<HostResponse>,
    ) -> Result<()> {
        if !self.inner.session.lock().is_current(operation) {
            debug!(operation, "Late reply ignored, operation already finished");
            return Ok(());
        }

        match reply {
            Err(e) => {
                self.fail_operation(&e);
                Err(e)
            }
            Ok(reply) if reply.is_processing() || !reply.is_completed() => {
                debug!(operation, "Acknowledged, awaiting push event");
                Ok(())
            }
            Ok(reply) => {
                debug!(operation, "Completed result in immediate reply");
                match reply.decode::<CompletionPayload>(kind.name()) {
                    Ok(payload) => {
                        self.finish_completion(kind, payload).await;
                        Ok(())
                    }
                    Err(e) => {
                        self.fail_operation(&e);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Releases the gate and closes the progress indicator.
    pub(crate) fn end_operation(&self) {
        let released = self.inner.session.lock().finish();
        self.inner.progress.complete();
        self.inner.feedback.prompt_input(true);
        if released {
            debug!("Processing gate released");
        }
    }

    /// Ends the operation and surfaces the failure.
    pub(crate) fn fail_operation(&self, err: &Error) {
        warn!(error = %err, "Operation failed");
        self.end_operation();
        self.inner.feedback.error(err.user_message());
    }
}

// ============================================================================
// Controller - Credentials
// ============================================================================

impl Controller {
    /// Submits a credential for validation.
    ///
    /// The outcome normally arrives as `api_validation_result`; an immediate
    /// verdict in the reply is applied right away.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the credential is blank or rejected
    /// - Any transport failure
    pub async fn submit_credential(&self, secret: &str) -> Result<()> {
        let credential =
            Credential::new(secret).ok_or_else(|| Error::validation("API key is empty"))?;
        debug!(credential = %credential, "Validating credential");

        self.inner
            .session
            .lock()
            .stage_credential(credential.clone());

        let action = Action::ValidateApiKey {
            api_key: credential,
        };

        let reply = match self.inner.transport.send(&action).await {
            Ok(reply) => reply,
            Err(e) => {
                self.inner.session.lock().reject_pending();
                self.inner.feedback.error(e.user_message());
                return Err(e);
            }
        };

        if reply.value().get("success").is_some() && !reply.is_processing() {
            let payload = reply.decode(EventKind::ApiValidationResult.name())?;
            return self.apply_validation(payload).await;
        }
        Ok(())
    }

    /// Restores a credential from the host's store.
    ///
    /// Returns `true` if one was adopted; otherwise the entry form is opened.
    ///
    /// # Errors
    ///
    /// Returns any transport failure.
    pub async fn load_cached_credential(&self) -> Result<bool> {
        let reply = self.inner.transport.send(&Action::GetCachedApiKey).await?;

        let restored = reply
            .get_optional_string("api_key")
            .and_then(Credential::new);

        match restored {
            Some(credential) => {
                info!(credential = %credential, "Restored cached credential");
                self.inner.session.lock().restore_credential(credential);
                self.inner
                    .feedback
                    .emit(UiEvent::CredentialPrompt { open: false });
                Ok(true)
            }
            None => {
                debug!("No cached credential");
                self.inner
                    .feedback
                    .emit(UiEvent::CredentialPrompt { open: true });
                Ok(false)
            }
        }
    }

    /// Forgets the credential locally and in the host's store.
    ///
    /// # Errors
    ///
    /// Returns any transport failure; the local credential is dropped anyway.
    pub async fn clear_credential(&self) -> Result<()> {
        self.inner.session.lock().clear_credential();
        self.inner
            .feedback
            .emit(UiEvent::CredentialPrompt { open: true });

        self.inner
            .transport
            .send(&Action::ClearCachedApiKey)
            .await?
            .into_result(Action::ClearCachedApiKey.name())?;
        info!("Credential cleared");
        Ok(())
    }
}

// ============================================================================
// Controller - Parameters
// ============================================================================

impl Controller {
    /// Fetches the active model's parameters and presents them.
    ///
    /// # Errors
    ///
    /// - [`Error::NoActiveModel`] without an active model
    /// - Any transport, backend or decode failure
    pub async fn fetch_parameters(&self) -> Result<Vec<ParameterView>> {
        let model_id = self.active_model_id().ok_or(Error::NoActiveModel)?;
        let list = self.load_parameters(&model_id).await?;
        Ok(self.apply_parameters(list))
    }

    /// Loads a model's parameters over the configured route.
    async fn load_parameters(&self, model_id: &ModelId) -> Result<Vec<ParameterDescriptor>> {
        match self.inner.route {
            ParameterRoute::HostBridge => {
                let action = Action::GetParameters {
                    model_id: model_id.clone(),
                };
                let reply = self.inner.transport.send(&action).await?;
                parameters::from_listing(reply.value(), action.name())
            }
            ParameterRoute::Direct => {
                let client = self.rest_client()?;
                client.get_parameters(model_id).await
            }
        }
    }

    /// Stores a parameter set and presents its editable part.
    pub(crate) fn apply_parameters(&self, list: Vec<ParameterDescriptor>) -> Vec<ParameterView> {
        let views = self.inner.editor.lock().load(&list).to_vec();
        debug!(total = list.len(), editable = views.len(), "Parameters applied");
        self.inner.session.lock().set_parameters(list);
        self.inner.feedback.emit(UiEvent::Parameters(views.clone()));
        views
    }

    /// Applies an edit from either control and schedules a debounced update.
    ///
    /// Returns `false` for an unknown, hidden or non-finite edit.
    pub fn edit_parameter(&self, id: &ParameterId, value: f64, source: EditSource) -> bool {
        let Some(value) = self.inner.editor.lock().edit(id, value) else {
            debug!(%id, value, "Edit ignored");
            return false;
        };

        self.inner.feedback.emit(UiEvent::ParameterValue {
            id: id.clone(),
            value,
            source,
        });
        self.inner.debouncer.push(id.clone(), value)
    }

    /// Pushes a batch of parameter values.
    ///
    /// # Errors
    ///
    /// - [`Error::NoActiveModel`] / [`Error::Busy`] without sending anything
    /// - Any transport or backend failure, after it has been surfaced
    pub async fn commit_parameter_updates(&self, updates: Vec<ParameterUpdate>) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let (model_id, credential, operation) = {
            let mut session = self.inner.session.lock();
            let model_id = session
                .active_model_id()
                .cloned()
                .ok_or(Error::NoActiveModel)?;
            let operation = session.begin()?;
            (model_id, session.credential().cloned(), operation)
        };

        info!(model_id = %model_id, count = updates.len(), operation, "Parameter update started");
        self.inner.feedback.prompt_input(false);
        self.inner.progress.start();

        match self.inner.route {
            ParameterRoute::HostBridge => {
                let action = Action::UpdateParameters { model_id, updates };
                let reply = self
                    .inner
                    .transport
                    .send(&action)
                    .await
                    .and_then(|reply| reply.into_result(action.name()));
                self.settle_immediate(operation, EventKind::ParametersUpdated, reply)
                    .await
            }
            ParameterRoute::Direct => {
                let result = match self.rest_client() {
                    Ok(client) => {
                        client
                            .update_parameters(&model_id, &updates, credential.as_ref())
                            .await
                    }
                    Err(e) => Err(e),
                };
                match result {
                    Ok(mut payload) => {
                        if payload.model_id.is_none() {
                            payload.model_id = Some(model_id);
                        }
                        self.finish_completion(EventKind::ParametersUpdated, payload)
                            .await;
                        Ok(())
                    }
                    Err(e) => {
                        self.fail_operation(&e);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Returns the REST client for the direct route.
    fn rest_client(&self) -> Result<BackendClient> {
        self.inner
            .rest
            .read()
            .clone()
            .ok_or_else(|| Error::config("Direct backend route is not configured"))
    }
}

// ============================================================================
// Controller - Artifacts & Notifications
// ============================================================================

impl Controller {
    /// Normalizes an artifact to inline form and imports it into the host.
    ///
    /// # Errors
    ///
    /// - [`Error::Transfer`] if the download or the host import fails
    /// - [`Error::Timeout`] if the download exceeds the backend timeout
    pub async fn import_artifact(
        &self,
        reference: &ArtifactReference,
        model_id: Option<ModelId>,
        is_iteration: bool,
    ) -> Result<ImportOutcome> {
        let data = self.resolve_artifact(reference).await?;
        let action = Action::ImportStepFile(ImportRequest::new(data, model_id, is_iteration));

        let reply = self
            .inner
            .transport
            .send(&action)
            .await
            .map_err(|e| Error::transfer(format!("Import failed: {e}")))?;

        let outcome: ImportOutcome = reply.decode(action.name())?;
        let outcome = outcome.into_result()?;
        info!(replaced = outcome.model_replaced, "Artifact imported");
        Ok(outcome)
    }

    /// Downloads a remote artifact if needed.
    pub(crate) async fn resolve_artifact(&self, reference: &ArtifactReference) -> Result<String> {
        let fetcher = self.inner.fetcher.read().clone();
        fetcher.resolve(reference).await
    }

    /// Shows a native notification. Error text is made user-friendly first.
    ///
    /// # Errors
    ///
    /// Returns any transport failure.
    pub async fn notify(&self, message: &str, severity: Severity) -> Result<()> {
        let message = match severity {
            Severity::Error => friendly_message(message),
            _ => message.to_string(),
        };
        let action = Action::ShowNotification { message, severity };
        self.inner.transport.send(&action).await?;
        Ok(())
    }
}

// ============================================================================
// Controller - Events
// ============================================================================

impl Controller {
    /// Accepts a push event and returns its acknowledgement token.
    ///
    /// Handling happens in the background, in arrival order.
    pub fn handle_event(&self, event: HostEvent) -> EventAck {
        let Some(kind) = event.kind() else {
            warn!(name = %event.name, "Unknown push event");
            return EventAck::Unknown;
        };

        if self.inner.events.send(event).is_err() {
            error!(event = %kind, "Event loop stopped, event dropped");
        }
        kind.ack()
    }
}

// ============================================================================
// Background Tasks
// ============================================================================

/// Dispatches queued push events one at a time.
async fn run_event_loop(inner: Weak<ControllerInner>, mut events: mpsc::UnboundedReceiver<HostEvent>) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        Controller { inner }.dispatch_event(event).await;
    }
    debug!("Event loop terminated");
}

/// Commits debounced parameter batches.
async fn run_commit_loop(
    inner: Weak<ControllerInner>,
    mut batches: mpsc::UnboundedReceiver<Vec<ParameterUpdate>>,
) {
    while let Some(batch) = batches.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let controller = Controller { inner };
        if let Err(e) = controller.commit_parameter_updates(batch).await
            && e.is_rejection()
        {
            warn!(error = %e, "Parameter update rejected");
            controller.inner.feedback.error(e.user_message());
        }
    }
    debug!("Commit loop terminated");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    /// Transport that records actions and replies with fixed text.
    struct RecordingTransport {
        reply: &'static str,
        sent: Mutex<Vec<Action>>,
    }

    impl RecordingTransport {
        fn new(reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                reply,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn names(&self) -> Vec<&'static str> {
            self.sent.lock().iter().map(Action::name).collect()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn is_available(&self) -> bool {
            true
        }

        async fn send(&self, action: &Action) -> Result<HostResponse> {
            self.sent.lock().push(action.clone());
            Ok(HostResponse::from_text(self.reply))
        }
    }

    fn controller(transport: Arc<RecordingTransport>) -> (Controller, mpsc::UnboundedReceiver<UiEvent>) {
        let (feedback, rx) = Feedback::channel();
        let controller = Controller::builder()
            .transport(transport)
            .feedback(feedback)
            .build()
            .expect("controller");
        (controller, rx)
    }

    #[tokio::test]
    async fn test_build_requires_transport_and_feedback() {
        let err = Controller::builder().build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let err = Controller::builder()
            .transport(RecordingTransport::new("{}"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_processing_gate_rejects_second_prompt() {
        let transport = RecordingTransport::new(r#"{"success": true, "processing": true}"#);
        let (controller, _ui) = controller(Arc::clone(&transport));

        controller.submit_prompt("create a cube").await.expect("first");
        assert!(controller.is_processing());

        let err = controller.submit_prompt("create a sphere").await.unwrap_err();
        assert!(matches!(err, Error::Busy));
        assert_eq!(transport.names(), vec!["generate_model"]);
    }

    #[tokio::test]
    async fn test_empty_prompt_sends_nothing() {
        let transport = RecordingTransport::new("{}");
        let (controller, _ui) = controller(Arc::clone(&transport));

        assert!(matches!(
            controller.submit_prompt("   ").await,
            Err(Error::EmptyPrompt)
        ));
        assert!(transport.names().is_empty());
        assert!(!controller.is_processing());
    }

    #[tokio::test]
    async fn test_transport_failure_releases_gate() {
        let transport = RecordingTransport::new(r#"{"success": false, "error": "No API key provided"}"#);
        let (controller, mut ui) = controller(transport);

        let err = controller.submit_prompt("create a cube").await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert!(!controller.is_processing());

        let mut saw_error = false;
        while let Ok(event) = ui.try_recv() {
            if let UiEvent::ChatMessage { role: ChatRole::Error, text } = event {
                assert_eq!(text, "No API key provided");
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn test_parameter_commit_requires_model() {
        let transport = RecordingTransport::new("{}");
        let (controller, _ui) = controller(Arc::clone(&transport));

        let updates = vec![ParameterUpdate {
            id: ParameterId::new("w"),
            value: 1.0,
        }];
        assert!(matches!(
            controller.commit_parameter_updates(updates).await,
            Err(Error::NoActiveModel)
        ));
        assert!(transport.names().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_event_is_acknowledged() {
        let (controller, _ui) = controller(RecordingTransport::new("{}"));
        let ack = controller.handle_event(HostEvent::new("custom_event", "{}"));
        assert_eq!(ack, EventAck::Unknown);
        assert_eq!(ack.as_str(), "UNKNOWN_ACTION");
    }

    #[tokio::test]
    async fn test_error_notification_is_friendly() {
        let transport = RecordingTransport::new("{}");
        let (controller, _ui) = controller(Arc::clone(&transport));

        controller
            .notify("HTTP 429: Too Many Requests", Severity::Error)
            .await
            .expect("notify");

        match transport.sent.lock().first() {
            Some(Action::ShowNotification { message, severity }) => {
                assert_eq!(*severity, Severity::Error);
                assert!(message.contains("rate limit"));
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cached_credential_is_restored() {
        let transport =
            RecordingTransport::new(r#"{"success": true, "api_key": "sk-ant-cached-0001"}"#);
        let (controller, _ui) = controller(transport);

        assert!(controller.load_cached_credential().await.expect("load"));
        assert_eq!(
            controller.session().credential().map(Credential::expose),
            Some("sk-ant-cached-0001")
        );
    }
}
