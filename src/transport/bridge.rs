//! Raw host bridge contract.
//!
//! The host exposes a single entry point that takes an action name and a flat
//! text payload. Depending on the host build, a call either returns its reply
//! right away or hands back a value that settles later. [`HostReply`] models
//! both; [`super::BridgeTransport`] folds them into one async contract.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::oneshot;

// ============================================================================
// Types
// ============================================================================

/// Outcome of a host call as reported by the host: reply text or rejection reason.
pub type HostOutcome = StdResult<String, String>;

/// A reply that settles later.
pub type DeferredReply = BoxFuture<'static, HostOutcome>;

// ============================================================================
// HostReply
// ============================================================================

/// What a host call hands back.
pub enum HostReply {
    /// Already-computed reply text.
    Immediate(String),
    /// Reply that settles later (or rejects).
    Deferred(DeferredReply),
}

impl std::fmt::Debug for HostReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate(text) => f.debug_tuple("Immediate").field(&text.len()).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl HostReply {
    /// Creates an immediate reply.
    #[inline]
    #[must_use]
    pub fn immediate(text: impl Into<String>) -> Self {
        Self::Immediate(text.into())
    }

    /// Creates a deferred reply from any future.
    #[inline]
    #[must_use]
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = HostOutcome> + Send + 'static,
    {
        Self::Deferred(future.boxed())
    }

    /// Creates a deferred reply settled through a oneshot channel.
    ///
    /// A dropped sender settles as a rejection.
    #[must_use]
    pub fn from_receiver(rx: oneshot::Receiver<HostOutcome>) -> Self {
        Self::deferred(async move {
            rx.await
                .unwrap_or_else(|_| Err("host dropped the pending call".to_string()))
        })
    }

    /// Returns `true` if the reply is already computed.
    #[inline]
    #[must_use]
    pub fn is_immediate(&self) -> bool {
        matches!(self, Self::Immediate(_))
    }

    /// Waits for the reply to settle.
    pub async fn settle(self) -> HostOutcome {
        match self {
            Self::Immediate(text) => Ok(text),
            Self::Deferred(future) => future.await,
        }
    }
}

// ============================================================================
// HostBridge
// ============================================================================

/// The host's message entry point.
///
/// Implementations must not block; long work belongs behind a
/// [`HostReply::Deferred`].
pub trait HostBridge: Send + Sync {
    /// Returns `true` when the entry point exists and is callable.
    fn is_available(&self) -> bool;

    /// Invokes the entry point.
    ///
    /// `Err` means the call threw synchronously.
    fn call(&self, action: &str, payload: &str) -> StdResult<HostReply, String>;
}

impl<T: HostBridge + ?Sized> HostBridge for Arc<T> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn call(&self, action: &str, payload: &str) -> StdResult<HostReply, String> {
        (**self).call(action, payload)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_immediate_settles_to_text() {
        let reply = HostReply::immediate("pong");
        assert!(reply.is_immediate());
        assert_eq!(reply.settle().await, Ok("pong".to_string()));
    }

    #[tokio::test]
    async fn test_deferred_settles_later() {
        let (tx, rx) = oneshot::channel();
        let reply = HostReply::from_receiver(rx);
        assert!(!reply.is_immediate());

        tx.send(Ok(r#"{"success": true}"#.to_string()))
            .expect("receiver alive");
        assert_eq!(reply.settle().await, Ok(r#"{"success": true}"#.to_string()));
    }

    #[tokio::test]
    async fn test_dropped_sender_rejects() {
        let (tx, rx) = oneshot::channel::<HostOutcome>();
        drop(tx);
        let outcome = HostReply::from_receiver(rx).settle().await;
        assert!(outcome.is_err());
    }
}
