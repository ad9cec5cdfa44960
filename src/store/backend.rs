//! Object store trait definition.
//!
//! This module defines the common interface for object store backends.

use async_trait::async_trait;

use crate::api::ObjectKey;
use crate::error::Result;

use super::object::ClusterObject;

/// Trait for object store backends.
///
/// Writes use optimistic concurrency: an object carrying a resource version
/// that no longer matches the stored one is rejected with
/// [`StoreError::Conflict`](crate::error::StoreError::Conflict).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Gets an object by identity.
    ///
    /// Returns `None` if no such object exists.
    async fn get<K: ClusterObject>(&self, key: &ObjectKey) -> Result<Option<K>>;

    /// Creates an object and returns it as stored.
    async fn create<K: ClusterObject>(&self, object: &K) -> Result<K>;

    /// Replaces an object's metadata and spec. Status is left untouched.
    async fn update<K: ClusterObject>(&self, object: &K) -> Result<K>;

    /// Replaces an object's status subresource. Spec is left untouched.
    async fn update_status<K: ClusterObject>(&self, object: &K) -> Result<K>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
