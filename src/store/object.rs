//! Type bounds for objects kept in the store.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::{Metadata, NamespaceResourceScope, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

use crate::api::ObjectKey;

/// A namespaced object kind the store can address.
///
/// Every k8s-openapi kind with standard metadata qualifies, and so does
/// [`Unit`](crate::api::Unit). The same bounds make each of them a
/// `kube::Resource`, so `kube::Api<K>` can serve any `K: ClusterObject`.
pub trait ClusterObject:
    Resource<Scope = NamespaceResourceScope>
    + Metadata<Ty = ObjectMeta>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Returns the object's namespaced identity, if it has a name.
    fn key(&self) -> Option<ObjectKey> {
        ObjectKey::from_meta(self.metadata())
    }
}

impl<K> ClusterObject for K where
    K: Resource<Scope = NamespaceResourceScope>
        + Metadata<Ty = ObjectMeta>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Unit, UnitSpec};
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::Service;

    #[test]
    fn test_api_versions() {
        assert_eq!(Unit::API_VERSION, "custom.hmlss.ml/v1");
        assert_eq!(Deployment::API_VERSION, "apps/v1");
        assert_eq!(Service::API_VERSION, "v1");
    }

    #[test]
    fn test_key_uses_default_namespace() {
        let mut unit = Unit::new("shop", "web", UnitSpec::default());
        assert_eq!(ClusterObject::key(&unit), Some(ObjectKey::new("shop", "web")));

        unit.metadata.namespace = None;
        assert_eq!(
            ClusterObject::key(&unit),
            Some(ObjectKey::new("default", "web"))
        );

        unit.metadata.name = None;
        assert_eq!(ClusterObject::key(&unit), None);
    }
}
