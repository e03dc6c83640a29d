//! Editable model parameters.
//!
//! Parameters arrive with a generation result or from an explicit fetch.
//! Descriptors naming positional semantics (`origin`, `position`, `center`)
//! are kept in the session but never presented or synced.
//!
//! # Presentation Range
//!
//! | Current value `v` | Step |
//! |-------------------|------|
//! | `v >= 100` | 5 |
//! | `10 <= v < 100` | 1 |
//! | `1 <= v < 10` | 0.1 |
//! | otherwise | 0.01 |
//!
//! Minimum is always 0; maximum is `max(2v, v + 100)`. A descriptor's step
//! hint overrides the derived step.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `sync` | Two-control editor and debounced updates |

// ============================================================================
// Submodules
// ============================================================================

/// Editor state and debounced update batching.
pub mod sync;

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::ParameterId;

pub use sync::{Debouncer, EditSource, ParameterEditor};

// ============================================================================
// Constants
// ============================================================================

/// Name fragments that mark a descriptor as positional.
const POSITIONAL_MARKERS: [&str; 3] = ["origin", "position", "center"];

// ============================================================================
// ParameterDescriptor
// ============================================================================

/// A numeric model parameter as reported by the host or backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Unique id within the model.
    pub id: ParameterId,

    /// Label shown next to the controls.
    #[serde(default, alias = "name")]
    pub display_name: String,

    /// Dotted path within the model tree.
    #[serde(default, alias = "full_path", alias = "path")]
    pub hierarchical_path: String,

    /// Current numeric value.
    #[serde(default, alias = "value")]
    pub current_value: f64,

    /// Unit suffix, e.g. `mm`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Explicit control step.
    #[serde(default, alias = "step", skip_serializing_if = "Option::is_none")]
    pub step_hint: Option<f64>,
}

impl ParameterDescriptor {
    /// Returns `true` if the descriptor denotes positional/origin semantics.
    #[must_use]
    pub fn is_positional(&self) -> bool {
        let path = self.hierarchical_path.to_lowercase();
        let name = self.display_name.to_lowercase();
        POSITIONAL_MARKERS
            .iter()
            .any(|marker| path.contains(marker) || name.contains(marker))
    }

    /// Returns the control range for this descriptor.
    #[inline]
    #[must_use]
    pub fn range(&self) -> SliderRange {
        SliderRange::for_value(self.current_value).with_step_hint(self.step_hint)
    }

    /// Returns the label, falling back to the id.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            self.id.as_str()
        } else {
            &self.display_name
        }
    }
}

/// Returns the descriptors that may be presented and synced.
#[must_use]
pub fn editable(descriptors: &[ParameterDescriptor]) -> Vec<&ParameterDescriptor> {
    descriptors.iter().filter(|d| !d.is_positional()).collect()
}

/// Builds the presentation views for the editable descriptors.
#[must_use]
pub fn views(descriptors: &[ParameterDescriptor]) -> Vec<ParameterView> {
    editable(descriptors)
        .into_iter()
        .map(ParameterView::from_descriptor)
        .collect()
}

/// Extracts descriptors from a parameter listing reply.
///
/// Accepts `{parameters: [...]}` with or without a `success` flag, and a bare
/// array. An explicit `success: false` is a failure.
///
/// # Errors
///
/// - [`Error::Transport`] if the reply reports failure
/// - [`Error::Decode`] if no descriptor list is present or it is malformed
pub fn from_listing(value: &Value, action: &str) -> Result<Vec<ParameterDescriptor>> {
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = value
            .get("error")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("Failed to load parameters");
        return Err(Error::transport(action, message));
    }

    let list = match value {
        Value::Array(_) => value,
        _ => value
            .get("parameters")
            .ok_or_else(|| Error::decode(action, "reply carries no parameters"))?,
    };

    serde_json::from_value(list.clone()).map_err(|e| Error::decode(action, e.to_string()))
}

// ============================================================================
// SliderRange
// ============================================================================

/// Presentation range of a parameter's coarse control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderRange {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
    /// Control step.
    pub step: f64,
}

impl SliderRange {
    /// Derives the range from a current value.
    #[must_use]
    pub fn for_value(value: f64) -> Self {
        Self {
            min: 0.0,
            max: (2.0 * value).max(value + 100.0),
            step: step_for(value),
        }
    }

    /// Replaces the step with a positive hint, if given.
    #[inline]
    #[must_use]
    pub fn with_step_hint(mut self, hint: Option<f64>) -> Self {
        if let Some(step) = hint.filter(|s| s.is_finite() && *s > 0.0) {
            self.step = step;
        }
        self
    }
}

/// Derives the step from a value's magnitude.
fn step_for(value: f64) -> f64 {
    if value >= 100.0 {
        5.0
    } else if value >= 10.0 {
        1.0
    } else if value >= 1.0 {
        0.1
    } else {
        0.01
    }
}

// ============================================================================
// ParameterView
// ============================================================================

/// What the UI renders for one editable parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterView {
    /// Parameter id.
    pub id: ParameterId,
    /// Label.
    pub label: String,
    /// Unit suffix.
    pub unit: Option<String>,
    /// Value shown by both controls.
    pub value: f64,
    /// Coarse control range.
    pub range: SliderRange,
}

impl ParameterView {
    /// Builds the view of a descriptor.
    #[must_use]
    pub fn from_descriptor(descriptor: &ParameterDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            label: descriptor.label().to_string(),
            unit: descriptor.unit.clone(),
            value: descriptor.current_value,
            range: descriptor.range(),
        }
    }
}

// ============================================================================
// ParameterUpdate
// ============================================================================

/// One entry of an outbound parameter update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    /// Parameter id.
    pub id: ParameterId,
    /// New value.
    pub value: f64,
}

// ============================================================================
// Tests
// ============================================================================
