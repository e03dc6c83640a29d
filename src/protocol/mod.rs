//! Host bridge protocol message types.
//!
//! This module defines the messages exchanged between the chat panel
//! (this crate) and the host add-in.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Action` | Panel → Host | Named request with flat text payload |
//! | `HostResponse` | Host → Panel | Immediate or deferred reply to an action |
//! | `HostEvent` | Host → Panel | Asynchronous push notification |
//! | `EventAck` | Panel → Host | Delivery token returned per event |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `action` | Outbound action vocabulary |
//! | `event` | Push events, payloads and acknowledgements |
//! | `response` | Host replies |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound action definitions.
pub mod action;

/// Push event message types.
pub mod event;

/// Host reply wrapper.
pub mod response;

// ============================================================================
// Re-exports
// ============================================================================

pub use action::{Action, Severity};
pub use event::{
    CompletionPayload, ErrorPayload, EventAck, EventKind, HostEvent, InitPayload, ParsedEvent,
    ValidationPayload,
};
pub use response::{HostResponse, PONG_SENTINEL};
