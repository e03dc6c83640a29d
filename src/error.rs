//! Error types for the CADAgent bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use cadagent_bridge::{Controller, Result};
//!
//! async fn example(controller: &Controller) -> Result<()> {
//!     controller.submit_prompt("create a cube").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Bridge | [`Error::BridgeUnavailable`], [`Error::Transport`] |
//! | Session | [`Error::Busy`], [`Error::EmptyPrompt`], [`Error::NoActiveModel`], [`Error::Validation`] |
//! | Protocol | [`Error::Decode`], [`Error::UnknownEvent`] |
//! | Transfer | [`Error::Transfer`], [`Error::Backend`], [`Error::Timeout`] |
//! | Configuration | [`Error::Config`] |
//! | External | [`Error::Json`], [`Error::Http`], [`Error::Base64`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Bridge Errors
    // ========================================================================
    /// Host bridge object is missing or exposes no callable entry point.
    #[error("Bridge unavailable: {message}")]
    BridgeUnavailable {
        /// Description of what was missing.
        message: String,
    },

    /// Host call threw or its deferred value rejected.
    #[error("Transport failure on '{action}': {message}")]
    Transport {
        /// Outbound action name.
        action: String,
        /// Failure reason reported by the host.
        message: String,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// A mutating request is already in flight.
    #[error("Another request is already in progress")]
    Busy,

    /// Prompt is empty after trimming whitespace.
    #[error("Prompt is empty")]
    EmptyPrompt,

    /// Operation requires an active model.
    #[error("No active model")]
    NoActiveModel,

    /// Credential was rejected.
    #[error("Credential rejected: {message}")]
    Validation {
        /// Rejection reason.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// An event or response payload could not be decoded.
    #[error("Failed to decode {context}: {message}")]
    Decode {
        /// What was being decoded.
        context: String,
        /// Decoder message.
        message: String,
    },

    /// Push event name outside the known vocabulary.
    #[error("Unknown event: {name}")]
    UnknownEvent {
        /// The unrecognized event name.
        name: String,
    },

    // ========================================================================
    // Transfer Errors
    // ========================================================================
    /// Artifact fetch or host import failed.
    #[error("{message}")]
    Transfer {
        /// Failure text, surfaced verbatim.
        message: String,
    },

    /// Operation timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Direct backend request answered with a failure.
    #[error("Backend error: {message}")]
    Backend {
        /// Failure text, e.g. `HTTP 429: Too Many Requests`.
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when controller configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Base64 decoding error.
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a bridge unavailable error.
    #[inline]
    pub fn bridge_unavailable(message: impl Into<String>) -> Self {
        Self::BridgeUnavailable {
            message: message.into(),
        }
    }

    /// Creates a transport failure error.
    #[inline]
    pub fn transport(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Creates a credential validation error.
    #[inline]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown event error.
    #[inline]
    pub fn unknown_event(name: impl Into<String>) -> Self {
        Self::UnknownEvent { name: name.into() }
    }

    /// Creates a transfer error.
    #[inline]
    pub fn transfer(message: impl Into<String>) -> Self {
        Self::Transfer {
            message: message.into(),
        }
    }

    /// Creates a backend error.
    #[inline]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error was raised locally without any outbound call.
    #[inline]
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Busy | Self::EmptyPrompt | Self::NoActiveModel)
    }

    /// Returns `true` if this is a bridge-level error.
    #[inline]
    #[must_use]
    pub fn is_bridge_error(&self) -> bool {
        matches!(
            self,
            Self::BridgeUnavailable { .. } | Self::Transport { .. } | Self::ChannelClosed(_)
        )
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` if this is an artifact transfer error.
    #[inline]
    #[must_use]
    pub fn is_transfer_error(&self) -> bool {
        matches!(self, Self::Transfer { .. } | Self::Http(_) | Self::Base64(_))
            || self.is_timeout()
    }
}

// ============================================================================
// User-Facing Messages
// ============================================================================

const CONNECTIVITY_TEXT: &str =
    "Unable to connect to CADAgent servers. Please check your internet connection and try again.";
const KEY_INVALID_TEXT: &str = "API key is invalid. Please check your Anthropic API key at https://console.anthropic.com/account/keys";
const KEY_DENIED_TEXT: &str =
    "API key access denied. Please verify your Anthropic API key has sufficient permissions.";
const KEY_FAILED_TEXT: &str = "API key validation failed. Please verify your Anthropic API key at https://console.anthropic.com/account/keys";
const RATE_LIMIT_TEXT: &str = "API rate limit exceeded. Please wait a moment and try again.";
const SERVER_TEXT: &str = "Server temporarily unavailable. Please try again in a few moments.";
const TIMEOUT_TEXT: &str =
    "Request timed out. Please try again with a simpler design or check your connection.";
const GENERIC_TEXT: &str = "An error occurred. Please try again.";

impl Error {
    /// Returns text suitable for the chat panel.
    ///
    /// Transfer failures are surfaced verbatim; everything else goes
    /// through [`friendly_message`].
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Transfer { message } => message.clone(),
            Self::Busy => "Please wait for the current request to finish.".to_string(),
            Self::EmptyPrompt => "Please enter a prompt.".to_string(),
            Self::NoActiveModel => "Generate a model before editing parameters.".to_string(),
            Self::BridgeUnavailable { .. } => {
                "Not connected to Fusion 360. Please reopen the CADAgent panel.".to_string()
            }
            Self::Backend { message } | Self::Transport { message, .. } => {
                friendly_message(message)
            }
            other => friendly_message(&other.to_string()),
        }
    }
}

/// Rewrites a technical error string into user-facing text.
///
/// Unmatched text is returned unchanged.
#[must_use]
pub fn friendly_message(raw: &str) -> String {
    if raw.trim().is_empty() {
        return GENERIC_TEXT.to_string();
    }

    let lower = raw.to_lowercase();
    let connectivity = lower.contains("connection refused") || lower.contains("network error");

    if lower.contains("api key onboarding failed") {
        let text = if connectivity {
            CONNECTIVITY_TEXT
        } else if lower.contains("unauthorized") || lower.contains("401") {
            KEY_INVALID_TEXT
        } else if lower.contains("forbidden") || lower.contains("403") {
            KEY_DENIED_TEXT
        } else {
            KEY_FAILED_TEXT
        };
        return text.to_string();
    }

    if connectivity {
        return CONNECTIVITY_TEXT.to_string();
    }
    if lower.contains("rate limit") || lower.contains("429") {
        return RATE_LIMIT_TEXT.to_string();
    }
    if lower.contains("500") || lower.contains("server error") {
        return SERVER_TEXT.to_string();
    }
    if lower.contains("timeout") || lower.contains("timed out") {
        return TIMEOUT_TEXT.to_string();
    }

    if let Some((_, rest)) = raw.split_once("Error:") {
        return format!("Error: {}", rest.trim());
    }

    raw.to_string()
}

// ============================================================================
// Tests
// ============================================================================
