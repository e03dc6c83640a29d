//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use cadagent_bridge::{
    BridgeTransport, ChatRole, Controller, Feedback, HostBridge, HostReply, Timings, UiEvent,
};

/// Installs a test log subscriber once; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A call the fake host received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub action: String,
    pub payload: Value,
}

/// Host bridge that answers immediately from a per-action script.
pub struct FakeHost {
    available: AtomicBool,
    replies: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        let mut replies = HashMap::new();
        replies.insert("ping".to_string(), "pong".to_string());
        Arc::new(Self {
            available: AtomicBool::new(true),
            replies: Mutex::new(replies),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Scripts the reply text for an action.
    pub fn reply(&self, action: &str, text: impl Into<String>) {
        self.replies.lock().insert(action.to_string(), text.into());
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.action.clone()).collect()
    }

    pub fn calls_to(&self, action: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.action == action)
            .cloned()
            .collect()
    }
}

impl HostBridge for FakeHost {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    fn call(&self, action: &str, payload: &str) -> Result<HostReply, String> {
        let payload = serde_json::from_str(payload).unwrap_or(Value::Null);
        self.calls.lock().push(RecordedCall {
            action: action.to_string(),
            payload,
        });

        let reply = self
            .replies
            .lock()
            .get(action)
            .cloned()
            .unwrap_or_else(|| r#"{"success": true}"#.to_string());
        Ok(HostReply::immediate(reply))
    }
}

/// Builds a controller over a fake host.
pub fn controller(host: &Arc<FakeHost>) -> (Controller, mpsc::UnboundedReceiver<UiEvent>) {
    init_tracing();
    controller_with(host, Timings::default())
}

/// Builds a controller over a fake host with custom timings.
pub fn controller_with(
    host: &Arc<FakeHost>,
    timings: Timings,
) -> (Controller, mpsc::UnboundedReceiver<UiEvent>) {
    let (feedback, ui) = Feedback::channel();
    let controller = Controller::builder()
        .transport(Arc::new(BridgeTransport::new(Arc::clone(host))))
        .feedback(feedback)
        .timings(timings)
        .build()
        .expect("controller");
    (controller, ui)
}

/// Drains every UI event published so far.
pub fn drain(ui: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
    let mut events = Vec::new();
    while let Ok(event) = ui.try_recv() {
        events.push(event);
    }
    events
}

/// Returns the chat lines of one role.
pub fn chat_lines(events: &[UiEvent], wanted: ChatRole) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            UiEvent::ChatMessage { role, text } if *role == wanted => Some(text.clone()),
            _ => None,
        })
        .collect()
}

/// Polls `condition` until it holds or the attempts run out.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
