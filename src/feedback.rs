//! UI-facing feedback channel.
//!
//! The controller never renders anything itself. Every user-visible effect
//! (chat lines, progress indicator, parameter controls, connection badge) is
//! published as a [`UiEvent`] on an unbounded channel that the embedding UI
//! drains.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::trace;

use crate::identifiers::ParameterId;
use crate::parameters::{EditSource, ParameterView};
use crate::progress::ProgressState;
use crate::transport::ConnectionStatus;

// ============================================================================
// ChatRole
// ============================================================================

/// Author of a chat line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    /// Text typed by the user.
    User,
    /// Result text from the generation service.
    Assistant,
    /// Informational text from the panel itself.
    System,
    /// Failure text.
    Error,
}

// ============================================================================
// UiEvent
// ============================================================================

/// A single user-visible effect.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Connection badge changed.
    ConnectionStatus(ConnectionStatus),

    /// Append a chat line.
    ChatMessage {
        /// Author.
        role: ChatRole,
        /// Line text.
        text: String,
    },

    /// Enable or disable the prompt submission control.
    PromptInput {
        /// Whether submission is allowed.
        enabled: bool,
    },

    /// Progress indicator shown or changed.
    Progress {
        /// Current state.
        state: ProgressState,
        /// Time since the action started.
        elapsed: Duration,
    },

    /// Progress indicator removed.
    ProgressRemoved,

    /// Replace the editable parameter controls.
    Parameters(Vec<ParameterView>),

    /// One parameter's controls now show `value`.
    ParameterValue {
        /// Edited parameter.
        id: ParameterId,
        /// Displayed value.
        value: f64,
        /// Control the edit came from.
        source: EditSource,
    },

    /// Open or close the credential entry form.
    CredentialPrompt {
        /// Whether the form is shown.
        open: bool,
    },
}

// ============================================================================
// Feedback
// ============================================================================

/// Sending half of the UI channel.
///
/// Emitting never fails: once the UI side is gone, events are dropped.
#[derive(Debug, Clone)]
pub struct Feedback {
    /// Channel to the UI.
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl Feedback {
    /// Creates a feedback sink and the receiver the UI drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publishes an event.
    pub fn emit(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            trace!("UI receiver dropped, event discarded");
        }
    }

    /// Appends a chat line.
    #[inline]
    pub fn chat(&self, role: ChatRole, text: impl Into<String>) {
        self.emit(UiEvent::ChatMessage {
            role,
            text: text.into(),
        });
    }

    /// Appends a failure line.
    #[inline]
    pub fn error(&self, text: impl Into<String>) {
        self.chat(ChatRole::Error, text);
    }

    /// Enables or disables prompt submission.
    #[inline]
    pub fn prompt_input(&self, enabled: bool) {
        self.emit(UiEvent::PromptInput { enabled });
    }

    /// Returns `true` while the UI side is still listening.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_receiver() {
        let (feedback, mut rx) = Feedback::channel();
        feedback.chat(ChatRole::User, "create a cube");
        feedback.prompt_input(false);

        assert_eq!(
            rx.try_recv().expect("chat"),
            UiEvent::ChatMessage {
                role: ChatRole::User,
                text: "create a cube".into()
            }
        );
        assert_eq!(
            rx.try_recv().expect("prompt"),
            UiEvent::PromptInput { enabled: false }
        );
    }

    #[test]
    fn test_emit_after_receiver_dropped_is_silent() {
        let (feedback, rx) = Feedback::channel();
        drop(rx);
        assert!(!feedback.is_connected());
        feedback.error("ignored");
    }
}
