//! Session state and the controller that owns it.
//!
//! [`Session`] is the single source of truth for the credential, the active
//! model, the processing gate and the current parameter set. It is owned by
//! the [`Controller`] and mutated only by action initiators and the event
//! router; the transport never touches it.
//!
//! # Processing Gate
//!
//! `processing` is the only mutual exclusion in the crate. It is set before
//! a generate, iterate or parameter update is issued and cleared once that
//! operation's terminal outcome has been handled. A second request while it
//! is held is rejected locally with [`Error::Busy`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `controller` | [`Controller`], [`ControllerBuilder`], action initiators |
//! | `router` | Push event dispatch table |

// ============================================================================
// Submodules
// ============================================================================

/// Controller and action initiators.
pub mod controller;

/// Push event dispatch.
pub mod router;

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};
use crate::identifiers::{Credential, ModelId};
use crate::parameters::ParameterDescriptor;
use crate::protocol::Action;

pub use controller::{Controller, ControllerBuilder, ParameterRoute};

// ============================================================================
// Session
// ============================================================================

/// Controller-owned session state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Validated credential.
    credential: Option<Credential>,
    /// Credential awaiting validation.
    pending_credential: Option<Credential>,
    /// Model the next prompt iterates on.
    active_model_id: Option<ModelId>,
    /// Processing gate.
    processing: bool,
    /// Current parameter set, positional ones included.
    parameters: Vec<ParameterDescriptor>,
    /// Sequence number of the latest gated operation.
    operation: u64,
}

impl Session {
    /// Creates an empty session.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the validated credential.
    #[inline]
    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Returns the credential awaiting validation.
    #[inline]
    #[must_use]
    pub fn pending_credential(&self) -> Option<&Credential> {
        self.pending_credential.as_ref()
    }

    /// Returns the active model.
    #[inline]
    #[must_use]
    pub fn active_model_id(&self) -> Option<&ModelId> {
        self.active_model_id.as_ref()
    }

    /// Returns `true` while a gated operation is in flight.
    #[inline]
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// Returns the current parameter set.
    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Builds the root action for a prompt.
    ///
    /// Iterate when a model is active, Generate otherwise.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] while processing
    /// - [`Error::EmptyPrompt`] if the prompt is blank
    pub fn root_action(&self, prompt: &str) -> Result<Action> {
        if self.processing {
            return Err(Error::Busy);
        }
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(Error::EmptyPrompt);
        }

        let anthropic_api_key = self.credential.clone();
        Ok(match &self.active_model_id {
            Some(model_id) => Action::IterateModel {
                model_id: model_id.clone(),
                prompt: prompt.to_string(),
                anthropic_api_key,
            },
            None => Action::GenerateModel {
                prompt: prompt.to_string(),
                anthropic_api_key,
            },
        })
    }

    /// Takes the processing gate and returns the operation's sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if the gate is already held.
    pub fn begin(&mut self) -> Result<u64> {
        if self.processing {
            return Err(Error::Busy);
        }
        self.processing = true;
        self.operation += 1;
        Ok(self.operation)
    }

    /// Releases the processing gate. Returns `true` if it was held.
    pub fn finish(&mut self) -> bool {
        std::mem::replace(&mut self.processing, false)
    }

    /// Returns `true` if `operation` is still the one holding the gate.
    #[inline]
    #[must_use]
    pub fn is_current(&self, operation: u64) -> bool {
        self.processing && self.operation == operation
    }

    /// Sets the active model.
    pub fn set_active_model(&mut self, model_id: ModelId) {
        self.active_model_id = Some(model_id);
    }

    /// Replaces the parameter set.
    pub fn set_parameters(&mut self, parameters: Vec<ParameterDescriptor>) {
        self.parameters = parameters;
    }

    /// Stages a credential for validation.
    pub fn stage_credential(&mut self, credential: Credential) {
        self.pending_credential = Some(credential);
    }

    /// Promotes the staged credential. Returns the new credential.
    pub fn accept_pending(&mut self) -> Option<Credential> {
        let accepted = self.pending_credential.take()?;
        self.credential = Some(accepted.clone());
        Some(accepted)
    }

    /// Discards the staged credential; the validated one is untouched.
    pub fn reject_pending(&mut self) -> Option<Credential> {
        self.pending_credential.take()
    }

    /// Adopts a credential restored from the host's store.
    pub fn restore_credential(&mut self, credential: Credential) {
        self.credential = Some(credential);
    }

    /// Forgets the validated credential.
    pub fn clear_credential(&mut self) -> Option<Credential> {
        self.credential.take()
    }
}

// ============================================================================
// Tests
// ============================================================================
