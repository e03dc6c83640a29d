//! Type-safe identifiers and secrets.
//!
//! Newtype wrappers prevent mixing a model id with a parameter id, and keep
//! credentials out of logs.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ModelId`] | Opaque backend model identifier |
//! | [`ParameterId`] | Unique parameter identifier within a model |
//! | [`IdempotencyKey`] | Per-request uniqueness token (UUID v4) |
//! | [`CallId`] | Correlation token of a pending host call |
//! | [`Credential`] | Secret API key with masked rendering |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::Error;

// ============================================================================
// ModelId
// ============================================================================

/// Opaque identifier of a generated model.
///
/// Never blank; deserializing an empty or whitespace-only string fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ModelId(String);

impl ModelId {
    /// Creates a model id, returning `None` for blank input.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ModelId {
    type Error = Error;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id).ok_or_else(|| Error::decode("model_id", "model id is blank"))
    }
}

impl From<ModelId> for String {
    fn from(id: ModelId) -> Self {
        id.0
    }
}

/// Deserializes an optional model id, reading a blank string as absent.
///
/// Use with `#[serde(default, deserialize_with = "...")]` on host payloads.
pub(crate) fn blank_model_id_as_none<'de, D>(deserializer: D) -> Result<Option<ModelId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(ModelId::new))
}

// ============================================================================
// ParameterId
// ============================================================================

/// Identifier of a model parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterId(String);

impl ParameterId {
    /// Creates a parameter id.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParameterId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ============================================================================
// IdempotencyKey
// ============================================================================

/// Request-scoped uniqueness token sent as the `Idempotency-Key` header.
///
/// Rendered in the hyphenated RFC 4122 form,
/// e.g. `550e8400-e29b-41d4-a716-446655440000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(Uuid);

impl IdempotencyKey {
    /// Generates a fresh random key.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

// ============================================================================
// CallId
// ============================================================================

/// Correlation token pairing a host call with its settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(Uuid);

impl CallId {
    /// Generates a fresh call id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Credential
// ============================================================================

/// Number of leading characters shown in a masked credential.
const MASK_PREFIX_LEN: usize = 10;

/// Secret API key.
///
/// `Debug` and `Display` never print the full secret; use
/// [`Credential::expose`] when the value must go on the wire.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credential(String);

impl Credential {
    /// Creates a credential, trimming whitespace. Blank input yields `None`.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        let trimmed = secret.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Returns the raw secret.
    #[inline]
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns a preview safe for logs.
    #[must_use]
    pub fn masked(&self) -> String {
        if self.0.chars().count() > MASK_PREFIX_LEN {
            let prefix: String = self.0.chars().take(MASK_PREFIX_LEN).collect();
            format!("{prefix}...")
        } else {
            "***".to_string()
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

// Serialization is the wire form and carries the full secret.
impl Serialize for Credential {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use regex::Regex;
    use rustc_hash::FxHashSet;

    #[test]
    fn test_model_id_rejects_blank() {
        assert!(ModelId::new("").is_none());
        assert!(ModelId::new("   ").is_none());
        assert_eq!(ModelId::new("M1").map(|m| m.to_string()), Some("M1".into()));
    }

    #[test]
    fn test_model_id_deserialize_rejects_blank() {
        assert!(serde_json::from_str::<ModelId>(r#""""#).is_err());
        assert!(serde_json::from_str::<ModelId>(r#""  ""#).is_err());

        let id: ModelId = serde_json::from_str(r#""M1""#).expect("model id");
        assert_eq!(id.as_str(), "M1");
        assert_eq!(serde_json::to_string(&id).expect("json"), r#""M1""#);
    }

    #[derive(Deserialize)]
    struct Carrier {
        #[serde(default, deserialize_with = "blank_model_id_as_none")]
        model_id: Option<ModelId>,
    }

    #[test]
    fn test_optional_model_id_treats_blank_as_absent() {
        let parse = |json: &str| serde_json::from_str::<Carrier>(json).expect("carrier").model_id;
        assert_eq!(parse(r#"{"model_id": ""}"#), None);
        assert_eq!(parse(r#"{"model_id": null}"#), None);
        assert_eq!(parse("{}"), None);
        assert_eq!(parse(r#"{"model_id": "M7"}"#), ModelId::new("M7"));
    }

    #[test]
    fn test_idempotency_keys_are_distinct_and_well_formed() {
        let shape = Regex::new(
            r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$",
        )
        .expect("valid regex");

        let mut seen = FxHashSet::default();
        for _ in 0..10_000 {
            let key = IdempotencyKey::generate().to_string();
            assert!(shape.is_match(&key), "bad key shape: {key}");
            assert!(seen.insert(key), "duplicate idempotency key");
        }
        assert_eq!(seen.len(), 10_000);
    }

    #[test]
    fn test_credential_trims_and_rejects_blank() {
        assert!(Credential::new("  ").is_none());
        let cred = Credential::new("  sk-ant-abc  ").expect("credential");
        assert_eq!(cred.expose(), "sk-ant-abc");
    }

    #[test]
    fn test_credential_masks_in_debug_and_display() {
        let cred = Credential::new("sk-ant-api03-secretsecret").expect("credential");
        assert_eq!(cred.to_string(), "sk-ant-api...");
        assert!(!format!("{cred:?}").contains("secretsecret"));

        let short = Credential::new("short").expect("credential");
        assert_eq!(short.masked(), "***");
    }

    proptest! {
        #[test]
        fn prop_masked_never_reveals_suffix(secret in "[a-zA-Z0-9]{11,64}") {
            let cred = Credential::new(secret.clone()).expect("credential");
            let masked = cred.masked();
            prop_assert!(masked.ends_with("..."));
            prop_assert_eq!(masked.len(), MASK_PREFIX_LEN + 3);
        }
    }
}
