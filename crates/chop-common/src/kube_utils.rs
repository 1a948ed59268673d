//! Shared Kubernetes helpers: object metadata for synthesized resources,
//! compile-time type identity, and stable digests.

use std::collections::BTreeMap;
use std::fmt::Write;

use aws_lc_rs::digest;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// ObjectMeta - Canonical Kubernetes metadata for all synthesized resources
// =============================================================================

/// Standard Kubernetes ObjectMeta for synthesized resources.
///
/// Also embedded in templates, where `name` and `namespace` are ignored:
/// synthesis always overwrites them from the computed identity.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Resource name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Resource namespace
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Create metadata with a name and namespace and no labels
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }

    /// Replace all labels
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }
}

// =============================================================================
// HasApiResource Trait
// =============================================================================

/// Trait for synthesized types with a known API version and kind.
///
/// Synthesized objects stamp these into `apiVersion` and `kind` so they are
/// complete manifests without a discovery round trip.
pub trait HasApiResource {
    /// Full API version (e.g., "apps/v1", "v1")
    const API_VERSION: &'static str;
    /// Resource kind (e.g., "StatefulSet")
    const KIND: &'static str;
}

// =============================================================================
// Digests
// =============================================================================

/// SHA-256 of `input`, hex-encoded and truncated to `hex_len` characters.
///
/// Uses `aws_lc_rs` so the value is stable across toolchains and can be
/// persisted in labels. `hex_len` is clamped to the full digest length.
pub fn sha256_hex(input: &[u8], hex_len: usize) -> String {
    let hash = digest::digest(&digest::SHA256, input);
    let bytes = hash.as_ref();
    let take = hex_len.div_ceil(2).min(bytes.len());
    let mut out = bytes[..take]
        .iter()
        .fold(String::with_capacity(take * 2), |mut s, b| {
            let _ = write!(s, "{:02x}", b);
            s
        });
    out.truncate(hex_len);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_meta_new_has_no_labels() {
        let meta = ObjectMeta::new("chi-demo-0-0-0", "olap");
        assert_eq!(meta.name, "chi-demo-0-0-0");
        assert_eq!(meta.namespace, "olap");
        assert!(meta.labels.is_empty());
    }

    #[test]
    fn template_metadata_deserializes_without_name() {
        let meta: ObjectMeta =
            serde_json::from_str(r#"{"labels":{"team":"olap"}}"#).expect("valid metadata");
        assert!(meta.name.is_empty());
        assert_eq!(meta.labels["team"], "olap");
    }

    #[test]
    fn sha256_hex_is_stable() {
        assert_eq!(sha256_hex(b"a", 16), sha256_hex(b"a", 16));
        assert_ne!(sha256_hex(b"a", 16), sha256_hex(b"b", 16));
        assert_eq!(sha256_hex(b"a", 16).len(), 16);
    }

    #[test]
    fn sha256_hex_odd_length_and_clamp() {
        assert_eq!(sha256_hex(b"x", 5).len(), 5);
        assert_eq!(sha256_hex(b"x", 500).len(), 64);
    }
}
