//! Parameter editing and debounced update batching.
//!
//! Each editable parameter has two controls: a coarse slider and a precise
//! numeric entry. [`ParameterEditor`] keeps them on one value. Every accepted
//! edit is pushed into a [`Debouncer`], which waits for input to pause for
//! the debounce window and then emits one batch holding the latest value per
//! parameter id, in first-edit order.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::identifiers::ParameterId;

use super::{ParameterDescriptor, ParameterUpdate, ParameterView, views};

// ============================================================================
// EditSource
// ============================================================================

/// Control an edit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditSource {
    /// Coarse slider.
    Slider,
    /// Precise numeric entry.
    Entry,
}

impl EditSource {
    /// Returns the control that must be updated to follow this edit.
    #[inline]
    #[must_use]
    pub fn counterpart(self) -> Self {
        match self {
            Self::Slider => Self::Entry,
            Self::Entry => Self::Slider,
        }
    }
}

// ============================================================================
// ParameterEditor
// ============================================================================

/// Shared value of each parameter's two controls.
#[derive(Debug, Clone, Default)]
pub struct ParameterEditor {
    /// Presented parameters, in descriptor order.
    views: Vec<ParameterView>,
}

impl ParameterEditor {
    /// Creates an empty editor.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the presented parameters, dropping positional ones.
    pub fn load(&mut self, descriptors: &[ParameterDescriptor]) -> &[ParameterView] {
        self.views = views(descriptors);
        &self.views
    }

    /// Returns the presented parameters.
    #[inline]
    #[must_use]
    pub fn views(&self) -> &[ParameterView] {
        &self.views
    }

    /// Returns the displayed value of a parameter.
    #[must_use]
    pub fn value(&self, id: &ParameterId) -> Option<f64> {
        self.views.iter().find(|v| &v.id == id).map(|v| v.value)
    }

    /// Applies an edit from either control.
    ///
    /// Returns the accepted value, or `None` for an unknown or hidden
    /// parameter or a non-finite value.
    pub fn edit(&mut self, id: &ParameterId, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        let view = self.views.iter_mut().find(|v| &v.id == id)?;
        view.value = value;
        Some(value)
    }
}

// ============================================================================
// Batch
// ============================================================================

/// Latest value per id, in first-edit order.
#[derive(Debug, Default)]
struct Batch {
    updates: Vec<ParameterUpdate>,
}

impl Batch {
    fn merge(&mut self, update: ParameterUpdate) {
        match self.updates.iter_mut().find(|u| u.id == update.id) {
            Some(existing) => existing.value = update.value,
            None => self.updates.push(update),
        }
    }
}

// ============================================================================
// Debouncer
// ============================================================================

/// Coalesces bursts of edits into single update batches.
///
/// Dropping every clone of the debouncer flushes any pending batch and ends
/// the background task.
#[derive(Debug, Clone)]
pub struct Debouncer {
    /// Edit input.
    tx: mpsc::UnboundedSender<ParameterUpdate>,
}

impl Debouncer {
    /// Spawns the debounce task and returns the batch receiver.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn(window: Duration) -> (Self, mpsc::UnboundedReceiver<Vec<ParameterUpdate>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(window, rx, batch_tx));
        (Self { tx }, batch_rx)
    }

    /// Schedules an edit. Returns `false` if the task has stopped.
    pub fn push(&self, id: ParameterId, value: f64) -> bool {
        self.tx.send(ParameterUpdate { id, value }).is_ok()
    }
}

/// Debounce loop: each edit restarts the window.
async fn run(
    window: Duration,
    mut edits: mpsc::UnboundedReceiver<ParameterUpdate>,
    batches: mpsc::UnboundedSender<Vec<ParameterUpdate>>,
) {
    while let Some(first) = edits.recv().await {
        let mut batch = Batch::default();
        batch.merge(first);
        let mut closed = false;

        loop {
            tokio::select! {
                next = edits.recv() => match next {
                    Some(update) => {
                        trace!(id = %update.id, value = update.value, "Edit coalesced");
                        batch.merge(update);
                    }
                    None => {
                        closed = true;
                        break;
                    }
                },
                () = sleep(window) => break,
            }
        }

        debug!(count = batch.updates.len(), "Parameter batch ready");
        if batches.send(batch.updates).is_err() || closed {
            break;
        }
    }
    trace!("Debouncer stopped");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, name: &str, value: f64) -> ParameterDescriptor {
        ParameterDescriptor {
            id: ParameterId::new(id),
            display_name: name.to_string(),
            hierarchical_path: format!("Body.{name}"),
            current_value: value,
            unit: None,
            step_hint: None,
        }
    }

    #[test]
    fn test_editor_keeps_controls_in_sync() {
        let mut editor = ParameterEditor::new();
        editor.load(&[descriptor("w", "width", 20.0), descriptor("o", "origin", 0.0)]);
        assert_eq!(editor.views().len(), 1);

        let id = ParameterId::new("w");
        assert_eq!(editor.edit(&id, 42.5), Some(42.5));
        assert_eq!(editor.value(&id), Some(42.5));

        assert_eq!(editor.edit(&ParameterId::new("o"), 1.0), None);
        assert_eq!(editor.edit(&id, f64::NAN), None);
        assert_eq!(EditSource::Slider.counterpart(), EditSource::Entry);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_latest_value() {
        let (debouncer, mut batches) = Debouncer::spawn(Duration::from_millis(300));
        let width = ParameterId::new("width");
        let depth = ParameterId::new("depth");

        for value in [10.0, 11.0, 12.0] {
            assert!(debouncer.push(width.clone(), value));
            sleep(Duration::from_millis(100)).await;
        }
        assert!(debouncer.push(depth.clone(), 5.0));
        assert!(debouncer.push(width.clone(), 13.0));

        let batch = batches.recv().await.expect("batch");
        assert_eq!(
            batch,
            vec![
                ParameterUpdate { id: width, value: 13.0 },
                ParameterUpdate { id: depth, value: 5.0 },
            ]
        );
        assert!(batches.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_splits_batches() {
        let (debouncer, mut batches) = Debouncer::spawn(Duration::from_millis(300));
        let id = ParameterId::new("height");

        debouncer.push(id.clone(), 1.0);
        sleep(Duration::from_millis(400)).await;
        debouncer.push(id.clone(), 2.0);

        assert_eq!(batches.recv().await.expect("first")[0].value, 1.0);
        assert_eq!(batches.recv().await.expect("second")[0].value, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_flushes_pending_batch() {
        let (debouncer, mut batches) = Debouncer::spawn(Duration::from_millis(300));
        debouncer.push(ParameterId::new("r"), 7.0);
        drop(debouncer);

        assert_eq!(batches.recv().await.expect("flushed").len(), 1);
        assert!(batches.recv().await.is_none());
    }
}
