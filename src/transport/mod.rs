//! Host bridge transport layer.
//!
//! This module turns the host's raw message entry point into a single
//! asynchronous request contract and establishes the connection.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Controller     │      Action (name + text)    │  Host add-in    │
//! │                 │─────────────────────────────►│                 │
//! │  Transport      │◄─────────────────────────────│  entry point    │
//! │  (async)        │   immediate or deferred      │                 │
//! │                 │           reply              │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Bootstrap::wait_for_bridge` - Poll until the entry point exists
//! 2. `Bootstrap::handshake` - Ping until `pong` comes back
//! 3. `html_ready` - Host replies with the `init` event
//! 4. `Transport::send` - Actions for the rest of the session
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bridge` | Raw host entry point and reply shapes |
//! | `adapter` | Uniform async `Transport` over a bridge |
//! | `channel` | Bridge settled over a channel by another thread |
//! | `bootstrap` | Availability polling and handshake |

// ============================================================================
// Submodules
// ============================================================================

/// Raw host bridge contract.
pub mod bridge;

/// Uniform async transport.
pub mod adapter;

/// Channel-backed host bridge.
pub mod channel;

/// Connection bootstrap.
pub mod bootstrap;

// ============================================================================
// Re-exports
// ============================================================================

pub use adapter::{BridgeTransport, Transport};
pub use bootstrap::{Bootstrap, ConnectionStatus};
pub use bridge::{DeferredReply, HostBridge, HostOutcome, HostReply};
pub use channel::{ChannelBridge, HostCall};
