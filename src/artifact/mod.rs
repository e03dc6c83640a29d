//! Generated CAD artifact transfer.
//!
//! A result carries its artifact either inline (base64 text) or as a remote
//! location. Before anything reaches the host import boundary the reference
//! is normalized to inline form; remote bytes are downloaded by
//! [`ArtifactFetcher`] and encoded in fixed-size chunks.
//!
//! # Pipeline
//!
//! ```text
//! ArtifactReference::Inline ─────────────────────────┐
//!                                                    ├──► ImportRequest ──► host
//! ArtifactReference::Remote ──► fetch ──► encode ────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `fetch` | Download with timeout and chunked encoding |

// ============================================================================
// Submodules
// ============================================================================

/// Remote artifact download.
pub mod fetch;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identifiers::{ModelId, blank_model_id_as_none};

pub use fetch::ArtifactFetcher;

// ============================================================================
// ArtifactReference
// ============================================================================

/// Where a generated artifact lives.
#[derive(Clone, PartialEq, Eq)]
pub enum ArtifactReference {
    /// Base64 text of the artifact bytes.
    Inline(String),
    /// Fetchable location of the raw bytes.
    Remote(String),
}

impl fmt::Debug for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(data) => write!(f, "Inline({} chars)", data.len()),
            Self::Remote(url) => f.debug_tuple("Remote").field(url).finish(),
        }
    }
}

impl ArtifactReference {
    /// Creates an inline reference.
    #[inline]
    #[must_use]
    pub fn inline(data: &str) -> Self {
        Self::Inline(data.to_string())
    }

    /// Creates a remote reference.
    #[inline]
    #[must_use]
    pub fn remote(url: &str) -> Self {
        Self::Remote(url.to_string())
    }

    /// Returns `true` for inline bytes.
    #[inline]
    #[must_use]
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Encodes bytes as standard base64, processing `chunk_bytes` at a time.
///
/// The chunk size is rounded down to a multiple of three (minimum three) so
/// every chunk but the last encodes without padding and the concatenation
/// equals a one-shot encoding.
#[must_use]
pub fn encode_chunked(bytes: &[u8], chunk_bytes: usize) -> String {
    let chunk = (chunk_bytes / 3).max(1) * 3;
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for piece in bytes.chunks(chunk) {
        Base64Standard.encode_string(piece, &mut out);
    }
    out
}

/// Decodes inline artifact text.
///
/// # Errors
///
/// Returns [`Error::Base64`] if the text is not valid base64.
pub fn decode(data: &str) -> Result<Vec<u8>> {
    Ok(Base64Standard.decode(data.trim())?)
}

// ============================================================================
// ImportRequest
// ============================================================================

/// Payload of `import_step_file` and `step_import_from_background`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ImportRequest {
    /// Base64 artifact bytes.
    pub step_file_data: String,
    /// Model the artifact belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<ModelId>,
    /// Whether the artifact replaces the current model.
    pub is_iteration: bool,
}

impl fmt::Debug for ImportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportRequest")
            .field("step_file_data", &format_args!("{} chars", self.step_file_data.len()))
            .field("model_id", &self.model_id)
            .field("is_iteration", &self.is_iteration)
            .finish()
    }
}

impl ImportRequest {
    /// Creates an import request.
    #[inline]
    #[must_use]
    pub fn new(data: impl Into<String>, model_id: Option<ModelId>, is_iteration: bool) -> Self {
        Self {
            step_file_data: data.into(),
            model_id,
            is_iteration,
        }
    }
}

// ============================================================================
// ImportOutcome
// ============================================================================

/// Host reply to an import.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImportOutcome {
    /// Whether the import succeeded.
    pub success: bool,
    /// Host message.
    pub message: Option<String>,
    /// Failure text.
    pub error: Option<String>,
    /// Imported model.
    #[serde(deserialize_with = "blank_model_id_as_none")]
    pub model_id: Option<ModelId>,
    /// Whether a previous model was superseded.
    pub model_replaced: bool,
}

impl ImportOutcome {
    /// Converts a failed import into a transfer error carrying the host's text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transfer`] with the host-reported error verbatim.
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let text = self
            .error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "Import failed".to_string());
        Err(Error::transfer(text))
    }

    /// Returns the user-visible summary of a successful import.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.model_replaced {
            "Model imported successfully (previous model replaced)".to_string()
        } else {
            "Model imported successfully".to_string()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
