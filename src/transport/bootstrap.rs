//! Connection bootstrap.
//!
//! Two phases run before the session is usable:
//!
//! | Phase | Cadence | Bound | On exhaustion |
//! |-------|---------|-------|---------------|
//! | Availability polling | `poll_interval` (300 ms) | `poll_attempts` (40) | continue to handshake |
//! | Ping handshake | `handshake_delay` (300 ms) | `handshake_attempts` (10) | status `Error`, stop |
//!
//! A successful handshake is a `ping` reply equal to the `pong` sentinel.
//! Exhaustion is reported but never fatal: the session stays alive and later
//! actions simply fail until the host comes back.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Timings;
use crate::feedback::{Feedback, UiEvent};
use crate::protocol::Action;

use super::adapter::Transport;

// ============================================================================
// ConnectionStatus
// ============================================================================

/// Host connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// Bootstrap in progress.
    #[default]
    Connecting,
    /// Handshake confirmed.
    Connected,
    /// Handshake exhausted its attempts.
    Error,
}

impl ConnectionStatus {
    /// Returns `true` once the handshake has succeeded.
    #[inline]
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Error => "Error",
        })
    }
}

// ============================================================================
// Bootstrap
// ============================================================================

/// Runs availability polling and the ping handshake.
pub struct Bootstrap {
    /// Transport under test.
    transport: Arc<dyn Transport>,
    /// Polling and handshake cadence.
    timings: Timings,
    /// Published status.
    status: watch::Sender<ConnectionStatus>,
    /// UI sink.
    feedback: Feedback,
}

impl fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrap")
            .field("status", &*self.status.borrow())
            .field("timings", &self.timings)
            .finish_non_exhaustive()
    }
}

impl Bootstrap {
    /// Creates a bootstrap in the `Connecting` state.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, timings: Timings, feedback: Feedback) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Connecting);
        Self {
            transport,
            timings,
            status,
            feedback,
        }
    }

    /// Returns the current status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Subscribes to status changes.
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Runs both phases and returns the final status.
    ///
    /// On success, `html_ready` is sent so the host emits `init`.
    pub async fn run(&self) -> ConnectionStatus {
        self.publish(ConnectionStatus::Connecting);

        if !self.wait_for_bridge().await {
            warn!(
                attempts = self.timings.poll_attempts,
                "Host bridge not found, attempting handshake anyway"
            );
        }

        let status = if self.handshake().await {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Error
        };
        self.publish(status);

        if status.is_connected() {
            self.announce_ready().await;
        }

        status
    }

    /// Polls for the host entry point. Returns `true` once found.
    pub async fn wait_for_bridge(&self) -> bool {
        for attempt in 1..=self.timings.poll_attempts {
            if self.transport.is_available() {
                debug!(attempt, "Host bridge available");
                return true;
            }
            sleep(self.timings.poll_interval).await;
        }
        false
    }

    /// Pings until the sentinel comes back. Returns `true` on success.
    pub async fn handshake(&self) -> bool {
        let attempts = self.timings.handshake_attempts;

        for attempt in 1..=attempts {
            let ping = Action::Ping {
                timestamp: now_millis(),
                attempt,
            };

            match self.transport.send(&ping).await {
                Ok(reply) if reply.is_pong() => {
                    info!(attempt, "Host handshake confirmed");
                    return true;
                }
                Ok(reply) => {
                    warn!(attempt, reply = %reply.raw(), "Unexpected handshake reply");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Handshake attempt failed");
                }
            }

            if attempt < attempts {
                sleep(self.timings.handshake_delay).await;
            }
        }

        warn!(attempts, "Host handshake exhausted");
        false
    }

    /// Sends the fire-and-forget readiness ping.
    async fn announce_ready(&self) {
        let ready = Action::HtmlReady {
            timestamp: now_millis(),
        };
        if let Err(e) = self.transport.send(&ready).await {
            warn!(error = %e, "Readiness ping failed");
        }
    }

    /// Publishes a status to watchers and the UI.
    fn publish(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
        self.feedback.emit(UiEvent::ConnectionStatus(status));
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::error::{Error, Result};
    use crate::protocol::HostResponse;

    /// Transport that becomes available after `appears_after` checks and
    /// answers pings with `pong` from `pong_from` onwards.
    struct ScriptedTransport {
        checks: AtomicU32,
        appears_after: u32,
        pong_from: Option<u32>,
        sent: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(appears_after: u32, pong_from: Option<u32>) -> Self {
            Self {
                checks: AtomicU32::new(0),
                appears_after,
                pong_from,
                sent: Mutex::new(Vec::new()),
            }
        }

        fn pings(&self) -> usize {
            self.sent.lock().iter().filter(|a| *a == "ping").count()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn is_available(&self) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst) + 1 >= self.appears_after
        }

        async fn send(&self, action: &Action) -> Result<HostResponse> {
            self.sent.lock().push(action.name().to_string());
            match action {
                Action::Ping { attempt, .. } => match self.pong_from {
                    Some(from) if *attempt >= from => Ok(HostResponse::from_text("pong")),
                    _ => Err(Error::transport("ping", "no reply")),
                },
                _ => Ok(HostResponse::from_text("{}")),
            }
        }
    }

    fn bootstrap(transport: Arc<ScriptedTransport>) -> (Bootstrap, Feedback) {
        let (feedback, _rx) = Feedback::channel();
        (
            Bootstrap::new(transport, Timings::default(), feedback.clone()),
            feedback,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_connects_and_announces_ready() {
        let transport = Arc::new(ScriptedTransport::new(3, Some(2)));
        let (bootstrap, _feedback) = bootstrap(Arc::clone(&transport));
        let mut watcher = bootstrap.subscribe();

        assert_eq!(bootstrap.run().await, ConnectionStatus::Connected);
        assert_eq!(*watcher.borrow_and_update(), ConnectionStatus::Connected);
        assert_eq!(transport.pings(), 2);
        assert_eq!(
            transport.sent.lock().last().map(String::as_str),
            Some("html_ready")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_gives_up_after_ten_attempts() {
        let transport = Arc::new(ScriptedTransport::new(1, None));
        let (bootstrap, _feedback) = bootstrap(Arc::clone(&transport));

        let started = tokio::time::Instant::now();
        assert_eq!(bootstrap.run().await, ConnectionStatus::Error);
        assert_eq!(transport.pings(), 10);
        // Nine inter-attempt delays.
        let expected = Timings::default().handshake_delay * 9;
        assert!(started.elapsed() >= expected);
        assert!(started.elapsed() < expected + std::time::Duration::from_millis(100));
        assert!(!transport.sent.lock().iter().any(|a| a == "html_ready"));

        // No retries continue in the background.
        tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        assert_eq!(transport.pings(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_is_bounded() {
        let transport = Arc::new(ScriptedTransport::new(u32::MAX, Some(1)));
        let (bootstrap, _feedback) = bootstrap(Arc::clone(&transport));

        let started = tokio::time::Instant::now();
        assert!(!bootstrap.wait_for_bridge().await);
        assert_eq!(transport.checks.load(Ordering::SeqCst), 40);
        assert!(started.elapsed() >= Timings::default().poll_interval * 40);
    }

    #[test]
    fn test_default_status_is_connecting() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Connecting);
        assert!(!ConnectionStatus::Error.is_connected());
        assert_eq!(ConnectionStatus::Connected.to_string(), "Connected");
    }
}
