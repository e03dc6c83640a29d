//! CADAgent Bridge - chat panel core for driving a host CAD application.
//!
//! This library implements the bridge protocol and session controller that
//! sit between a chat panel and its CAD host: prompts are relayed to a remote
//! generation service through the host, results come back as push events, and
//! generated STEP artifacts are imported into the open design.
//!
//! # Architecture
//!
//! - **Host bridge**: the host exposes one entry point that takes an action
//!   name and a JSON payload, and returns either a value or a deferred reply
//! - **Push events**: the host notifies the panel through named events, each
//!   acknowledged with its own token
//! - **Controller**: owns the session, the processing gate, progress, the
//!   parameter editor and the artifact pipeline
//!
//! Key design principles:
//!
//! - The return contract of the host is normalized once, in [`BridgeTransport`]
//! - Only one generate, iterate or parameter update is in flight at a time
//! - Artifacts reach the host import boundary in inline form only
//! - UI effects flow out through a single [`Feedback`] channel
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use cadagent_bridge::{BridgeTransport, ChannelBridge, Controller, Feedback, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // The host side drains `calls` and resolves each one by id
//!     let (bridge, _calls) = ChannelBridge::new();
//!     bridge.attach();
//!
//!     let (feedback, _ui) = Feedback::channel();
//!     let controller = Controller::builder()
//!         .transport(Arc::new(BridgeTransport::new(bridge)))
//!         .feedback(feedback)
//!         .build()?;
//!
//!     controller.connect().await;
//!     controller.submit_prompt("create a 20mm cube").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`session`] | [`Session`], [`Controller`], push event routing |
//! | [`transport`] | Host bridge, adapter, channel bridge, bootstrap |
//! | [`protocol`] | Actions, responses and push events |
//! | [`progress`] | Progress indicator state machine |
//! | [`parameters`] | Parameter descriptors, ranges, debounced sync |
//! | [`artifact`] | Artifact references, download and encoding |
//! | [`backend`] | Direct REST client |
//! | [`config`] | Backend configuration and timer constants |
//! | [`feedback`] | UI events |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers and the masked credential |

// ============================================================================
// Modules
// ============================================================================

/// Remote artifact normalization.
///
/// Inline bytes pass through; remote locations are downloaded and encoded.
pub mod artifact;

/// Direct REST client for the generation backend.
pub mod backend;

/// Backend configuration and timer constants.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// UI events published by the controller.
pub mod feedback;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Editable model parameters.
pub mod parameters;

/// Progress indicator.
pub mod progress;

/// Host protocol message types.
pub mod protocol;

/// Session state and controller.
///
/// Use [`Controller::builder()`] to create a controller.
pub mod session;

/// Host bridge transport.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Session types
pub use session::{Controller, ControllerBuilder, ParameterRoute, Session};

// Transport types
pub use transport::{
    Bootstrap, BridgeTransport, ChannelBridge, ConnectionStatus, DeferredReply, HostBridge,
    HostCall, HostOutcome, HostReply, Transport,
};

// Protocol types
pub use protocol::{
    Action, CompletionPayload, EventAck, EventKind, HostEvent, HostResponse, ParsedEvent,
    Severity,
};

// Domain types
pub use artifact::{ArtifactFetcher, ArtifactReference, ImportOutcome, ImportRequest};
pub use backend::BackendClient;
pub use config::{BackendConfig, Endpoints, Timings};
pub use feedback::{ChatRole, Feedback, UiEvent};
pub use parameters::{EditSource, ParameterDescriptor, ParameterUpdate, ParameterView, SliderRange};
pub use progress::{ProgressReporter, ProgressState};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CallId, Credential, IdempotencyKey, ModelId, ParameterId};
