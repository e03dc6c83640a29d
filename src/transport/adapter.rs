//! Uniform async transport over the host bridge.
//!
//! [`Transport`] is the single seam the session controller talks through.
//! [`BridgeTransport`] implements it over any [`HostBridge`], normalizing
//! immediate and deferred host replies into one `async fn`.
//!
//! # Failure Mapping
//!
//! | Condition | Error |
//! |-----------|-------|
//! | Entry point missing | [`Error::BridgeUnavailable`] |
//! | Call threw synchronously | [`Error::Transport`] |
//! | Deferred reply rejected | [`Error::Transport`] |
//! | Payload serialization failed | [`Error::Json`] |
//!
//! No retry happens here; callers decide.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{Action, HostResponse};

use super::bridge::{HostBridge, HostReply};

// ============================================================================
// Transport
// ============================================================================

/// Sends actions to the host and yields their settled reply.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns `true` when the host entry point is callable.
    fn is_available(&self) -> bool;

    /// Sends an action and waits for the host's reply.
    ///
    /// # Errors
    ///
    /// See the module-level failure mapping.
    async fn send(&self, action: &Action) -> Result<HostResponse>;
}

// ============================================================================
// BridgeTransport
// ============================================================================

/// [`Transport`] over a raw [`HostBridge`].
#[derive(Debug, Clone)]
pub struct BridgeTransport<B> {
    /// The host entry point.
    bridge: B,
}

impl<B: HostBridge> BridgeTransport<B> {
    /// Wraps a host bridge.
    #[inline]
    #[must_use]
    pub fn new(bridge: B) -> Self {
        Self { bridge }
    }

    /// Returns the wrapped bridge.
    #[inline]
    #[must_use]
    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    /// Invokes the host, mapping a synchronous throw to a transport error.
    fn invoke(&self, name: &str, payload: &str) -> Result<HostReply> {
        if !self.bridge.is_available() {
            return Err(Error::bridge_unavailable(format!(
                "no callable host entry point for '{name}'"
            )));
        }

        self.bridge.call(name, payload).map_err(|reason| {
            warn!(action = name, error = %reason, "Host call threw");
            Error::transport(name, reason)
        })
    }
}

#[async_trait]
impl<B: HostBridge> Transport for BridgeTransport<B> {
    fn is_available(&self) -> bool {
        self.bridge.is_available()
    }

    async fn send(&self, action: &Action) -> Result<HostResponse> {
        let name = action.name();
        let payload = action.payload()?;

        trace!(action = name, payload_len = payload.len(), "Sending action");

        let reply = self.invoke(name, &payload)?;
        let deferred = !reply.is_immediate();

        let text = reply.settle().await.map_err(|reason| {
            warn!(action = name, error = %reason, "Host call rejected");
            Error::transport(name, reason)
        })?;

        debug!(action = name, deferred, reply_len = text.len(), "Action settled");
        Ok(HostResponse::from_text(text))
    }
}

// ============================================================================
// Tests
// ============================================================================
