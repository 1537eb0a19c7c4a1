//! # Canonical Serialization
//!
//! [`CanonicalBytes`] is the sole input accepted by digest computation.
//! Values are serialized with RFC 8785 (JSON Canonicalization Scheme):
//! sorted keys, compact separators, and a deterministic number format, so
//! the same audit event always hashes to the same digest.

use serde::Serialize;

use crate::error::CoreError;

/// Bytes produced by JCS canonicalization.
///
/// The inner buffer is private; [`CanonicalBytes::new`] is the only
/// constructor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    pub fn new(obj: &impl Serialize) -> Result<Self, CoreError> {
        let value = serde_json::to_value(obj)?;
        let bytes = serde_jcs::to_vec(&value)?;
        Ok(Self(bytes))
    }

    /// The canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
