//! # Core Error Types
//!
//! Errors raised while constructing identifiers, filling the identifier
//! chain, and validating a `CoreDocument`.

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from core type construction and identifier-chain handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A fixed-length value was built from the wrong number of bytes.
    #[error("invalid {kind} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Hex decoding failed.
    #[error("hex decode error: {0}")]
    HexDecode(String),

    /// The identifier chain was filled inconsistently. Never repaired.
    #[error("malformed identifier chain: {0}")]
    MalformedChain(String),

    /// A next identifier collides with an identifier already in use.
    #[error("identifier re-used: {0}")]
    IdentifierReUsed(String),

    /// Serialization of a core value failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Field-specific validation failures for a `CoreDocument`.
///
/// Keys are stable field names (`cd_identifier`, `cd_salts`, ...); values
/// are human-readable reasons. Always user-correctable.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("document validation failed: {}", render(.0))]
pub struct ValidationErrors(pub BTreeMap<String, String>);

impl ValidationErrors {
    /// Create an empty error set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reason against a field. Later reasons for the same field
    /// are appended.
    pub fn add(&mut self, field: &str, reason: impl Into<String>) {
        let reason = reason.into();
        self.0
            .entry(field.to_string())
            .and_modify(|existing| {
                existing.push_str("; ");
                existing.push_str(&reason);
            })
            .or_insert(reason);
    }

    /// Reason recorded for `field`, if any.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `Ok(())` when nothing was recorded, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn render(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(field, reason)| format!("{field}: {reason}"))
        .collect::<Vec<_>>()
        .join(", ")
}
