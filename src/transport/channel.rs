//! Channel-backed host bridge.
//!
//! Embedders whose host runs on another thread (a web view IPC pump, a
//! scripting bridge) receive outbound calls as [`HostCall`] messages and
//! settle them later through [`ChannelBridge::resolve`]. Every call is
//! correlated by a fresh [`CallId`] and settled exactly once.
//!
//! # Lifecycle
//!
//! ```text
//! call() ──► pending map ──► HostCall on channel
//!                               │
//! resolve(id, outcome) ◄────────┘  (or detach(): every pending call rejects)
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::identifiers::CallId;

use super::bridge::{HostBridge, HostOutcome, HostReply};

// ============================================================================
// Constants
// ============================================================================

/// Maximum unsettled calls before new ones throw.
const MAX_PENDING_CALLS: usize = 100;

// ============================================================================
// Types
// ============================================================================

/// Map of call ids to settlement channels.
type PendingMap = FxHashMap<CallId, oneshot::Sender<HostOutcome>>;

// ============================================================================
// HostCall
// ============================================================================

/// An outbound call awaiting settlement by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCall {
    /// Correlation token to pass back to [`ChannelBridge::resolve`].
    pub id: CallId,
    /// Action name.
    pub action: String,
    /// Flat text payload.
    pub payload: String,
}

// ============================================================================
// ChannelBridge
// ============================================================================

/// [`HostBridge`] whose calls are settled asynchronously over a channel.
///
/// Cheap to clone; clones share the pending map.
#[derive(Clone)]
pub struct ChannelBridge {
    /// Outbound call channel.
    outbound: mpsc::UnboundedSender<HostCall>,
    /// Unsettled calls.
    pending: Arc<Mutex<PendingMap>>,
    /// Whether the host side is attached.
    attached: Arc<AtomicBool>,
}

impl std::fmt::Debug for ChannelBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelBridge")
            .field("pending", &self.pending_count())
            .field("attached", &self.attached.load(Ordering::Acquire))
            .finish()
    }
}

impl ChannelBridge {
    /// Creates a detached bridge and the receiver the host reads calls from.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostCall>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let bridge = Self {
            outbound,
            pending: Arc::new(Mutex::new(PendingMap::default())),
            attached: Arc::new(AtomicBool::new(false)),
        };
        (bridge, rx)
    }

    /// Marks the host entry point as present.
    pub fn attach(&self) {
        self.attached.store(true, Ordering::Release);
        debug!("Host entry point attached");
    }

    /// Marks the host entry point as gone and rejects every pending call.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);

        let drained: Vec<_> = self.pending.lock().drain().collect();
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err("host detached".to_string()));
        }

        debug!(failed = count, "Host entry point detached");
    }

    /// Settles a pending call.
    ///
    /// Returns `false` if no call with `id` is pending (already settled or
    /// never issued); the outcome is dropped.
    pub fn resolve(&self, id: CallId, outcome: HostOutcome) -> bool {
        let Some(tx) = self.pending.lock().remove(&id) else {
            warn!(%id, "Settlement for unknown call");
            return false;
        };

        trace!(%id, ok = outcome.is_ok(), "Call settled");
        // The caller may have stopped waiting; late results are ignored.
        let _ = tx.send(outcome);
        true
    }

    /// Returns the number of unsettled calls.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl HostBridge for ChannelBridge {
    fn is_available(&self) -> bool {
        self.attached.load(Ordering::Acquire) && !self.outbound.is_closed()
    }

    fn call(&self, action: &str, payload: &str) -> StdResult<HostReply, String> {
        let id = CallId::generate();
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock();
            if pending.len() >= MAX_PENDING_CALLS {
                warn!(pending = pending.len(), max = MAX_PENDING_CALLS, "Too many pending calls");
                return Err(format!(
                    "Too many pending calls: {}/{}",
                    pending.len(),
                    MAX_PENDING_CALLS
                ));
            }
            pending.insert(id, tx);
        }

        let call = HostCall {
            id,
            action: action.to_string(),
            payload: payload.to_string(),
        };

        if self.outbound.send(call).is_err() {
            self.pending.lock().remove(&id);
            return Err("host channel closed".to_string());
        }

        trace!(%id, action, "Call issued");
        Ok(HostReply::from_receiver(rx))
    }
}

// ============================================================================
// Tests
// ============================================================================
