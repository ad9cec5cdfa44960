//! Spec hashing for change detection.
//!
//! The hash of each planned child spec is stored on the child as an
//! annotation. Matching hashes mean the child already reflects the Unit and
//! no write is needed, which keeps repeated passes free of side effects.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::PlanError;

/// Hasher for computing child spec hashes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpecHasher;

impl SpecHasher {
    /// Creates a new spec hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the hash of a child spec.
    ///
    /// The kind is part of the input, so equal specs of different kinds never
    /// collide.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec cannot be serialized.
    pub fn hash_spec<T: Serialize>(
        &self,
        kind: &'static str,
        spec: &T,
    ) -> Result<String, PlanError> {
        let bytes = serde_json::to_vec(spec).map_err(|e| PlanError::Hash {
            kind,
            message: e.to_string(),
        })?;

        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update(b"\0");
        hasher.update(&bytes);

        Ok(hex::encode(hasher.finalize()))
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ServiceSpec;

    #[test]
    fn test_hash_deterministic() {
        let hasher = SpecHasher::new();
        let spec = ServiceSpec {
            type_: Some(String::from("ClusterIP")),
            ..ServiceSpec::default()
        };

        let first = hasher.hash_spec("Service", &spec).expect("hash");
        let second = hasher.hash_spec("Service", &spec.clone()).expect("hash");

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_kind_changes_hash() {
        let hasher = SpecHasher::new();
        let spec = ServiceSpec::default();

        let a = hasher.hash_spec("Service", &spec).expect("hash");
        let b = hasher.hash_spec("Other", &spec).expect("hash");

        assert_ne!(a, b);
    }

    #[test]
    fn test_short_hash() {
        let short = SpecHasher::short_hash("abcdef1234567890abcdef1234567890");
        assert_eq!(short, "abcdef12");
    }
}
