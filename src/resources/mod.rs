//! Child objects a Unit owns.
//!
//! Each variant of [`OwnResource`] knows how to render its desired object,
//! look up the live one, create-or-update it, and copy its observed state
//! into the Unit's status.

mod common;
mod deployment;
mod hash;
mod pvc;
mod service;
mod statefulset;

pub use common::{recorded_hash, ChildOwner, SPEC_HASH_ANNOTATION, UNIT_LABEL};
pub use deployment::OwnDeployment;
pub use hash::SpecHasher;
pub use pvc::OwnPvc;
pub use service::OwnService;
pub use statefulset::OwnStatefulSet;

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use k8s_openapi::Resource;
use serde::Serialize;
use std::fmt;

use crate::api::Unit;
use crate::error::{ControllerError, Result, StoreError};
use crate::store::{ClusterObject, ObjectStore};

/// What an apply did to the live child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyAction {
    /// The child was absent and has been created.
    Created,
    /// The child drifted and has been updated.
    Updated,
    /// The child already matched; nothing was written.
    Unchanged,
}

/// Kinds of child the controller manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceKind {
    /// Stateless workload.
    Deployment,
    /// Stateful workload.
    StatefulSet,
    /// Network endpoint.
    Service,
    /// Storage claim.
    PersistentVolumeClaim,
}

/// One planned child of a Unit.
#[derive(Debug, Clone, PartialEq)]
pub enum OwnResource {
    /// Stateless workload.
    Deployment(OwnDeployment),
    /// Stateful workload.
    StatefulSet(OwnStatefulSet),
    /// Network endpoint.
    Service(OwnService),
    /// Storage claim.
    Pvc(OwnPvc),
}

impl ResourceKind {
    /// Returns the object kind name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deployment => Deployment::KIND,
            Self::StatefulSet => StatefulSet::KIND,
            Self::Service => Service::KIND,
            Self::PersistentVolumeClaim => PersistentVolumeClaim::KIND,
        }
    }
}

impl OwnResource {
    /// Returns the kind of child this resource produces.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Deployment(_) => ResourceKind::Deployment,
            Self::StatefulSet(_) => ResourceKind::StatefulSet,
            Self::Service(_) => ResourceKind::Service,
            Self::Pvc(_) => ResourceKind::PersistentVolumeClaim,
        }
    }

    /// Returns the hash recorded on the child when it is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec cannot be hashed.
    pub fn spec_hash(&self) -> Result<String> {
        let hasher = SpecHasher::new();
        let kind = self.kind().as_str();
        let hash = match self {
            Self::Deployment(r) => hasher.hash_spec(kind, &r.spec),
            Self::StatefulSet(r) => hasher.hash_spec(kind, &r.spec),
            Self::Service(r) => hasher.hash_spec(kind, &r.spec),
            Self::Pvc(r) => hasher.hash_spec(kind, &r.spec),
        };
        Ok(hash?)
    }

    /// Renders the desired child as JSON, for display.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be built or encoded.
    pub fn render(&self, owner: &ChildOwner) -> Result<serde_json::Value> {
        match self {
            Self::Deployment(r) => to_json(&r.make(owner)?),
            Self::StatefulSet(r) => to_json(&r.make(owner)?),
            Self::Service(r) => to_json(&r.make(owner)?),
            Self::Pvc(r) => to_json(&r.make(owner)?),
        }
    }

    /// Returns true if a child of this kind exists under the Unit's identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    pub async fn exists<S: ObjectStore>(&self, owner: &ChildOwner, store: &S) -> Result<bool> {
        Ok(match self {
            Self::Deployment(r) => r.exists(owner, store).await?.is_some(),
            Self::StatefulSet(r) => r.exists(owner, store).await?.is_some(),
            Self::Service(r) => r.exists(owner, store).await?.is_some(),
            Self::Pvc(r) => r.exists(owner, store).await?.is_some(),
        })
    }

    /// Makes the live child match the planned one.
    ///
    /// # Errors
    ///
    /// Returns an error if a store call fails.
    pub async fn apply<S: ObjectStore>(&self, owner: &ChildOwner, store: &S) -> Result<ApplyAction> {
        match self {
            Self::Deployment(r) => r.apply(owner, store).await,
            Self::StatefulSet(r) => r.apply(owner, store).await,
            Self::Service(r) => r.apply(owner, store).await,
            Self::Pvc(r) => r.apply(owner, store).await,
        }
    }

    /// Returns a copy of `unit` with this child's status section refreshed.
    ///
    /// # Errors
    ///
    /// Returns an error if the child is missing or the store fails.
    pub async fn update_status<S: ObjectStore>(&self, unit: &Unit, store: &S) -> Result<Unit> {
        match self {
            Self::Deployment(r) => r.update_status(unit, store).await,
            Self::StatefulSet(r) => r.update_status(unit, store).await,
            Self::Service(r) => r.update_status(unit, store).await,
            Self::Pvc(r) => r.update_status(unit, store).await,
        }
    }
}

fn to_json<K: ClusterObject>(object: &K) -> Result<serde_json::Value> {
    serde_json::to_value(object).map_err(|e| {
        ControllerError::Store(StoreError::Encode {
            kind: K::KIND.to_string(),
            message: e.to_string(),
        })
    })
}

impl fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::UnitSpec;
    use crate::store::{MemoryStore, Verb};
    use k8s_openapi::api::core::v1::{ServicePort, ServiceSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

    async fn seeded(store: &MemoryStore) -> (Unit, ChildOwner) {
        let spec = UnitSpec {
            category: "Deployment".into(),
            replicas: Some(2),
            ..UnitSpec::default()
        };
        let unit = store
            .insert(Unit::new("default", "web", spec))
            .await
            .expect("insert unit");
        let owner = ChildOwner::for_unit(&unit).expect("owner");
        (unit, owner)
    }

    fn service(port: i32) -> OwnResource {
        let spec = ServiceSpec {
            ports: Some(vec![ServicePort {
                port,
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        };
        OwnResource::Service(OwnService::from_relation(&spec, &LabelSelector::default()))
    }

    #[tokio::test]
    async fn test_second_apply_is_unchanged() {
        let store = MemoryStore::new();
        let (unit, owner) = seeded(&store).await;
        let resource = OwnResource::Deployment(OwnDeployment::from_unit_spec(&unit.spec));

        assert!(!resource.exists(&owner, &store).await.expect("exists"));
        let first = resource.apply(&owner, &store).await.expect("first apply");
        let writes = store.total_writes().await;
        let second = resource.apply(&owner, &store).await.expect("second apply");

        assert_eq!(first, ApplyAction::Created);
        assert_eq!(second, ApplyAction::Unchanged);
        assert_eq!(store.total_writes().await, writes);
        assert!(resource.exists(&owner, &store).await.expect("exists"));
    }

    #[tokio::test]
    async fn test_replica_change_updates_in_place() {
        let store = MemoryStore::new();
        let (mut unit, owner) = seeded(&store).await;

        OwnResource::Deployment(OwnDeployment::from_unit_spec(&unit.spec))
            .apply(&owner, &store)
            .await
            .expect("create");

        unit.spec.replicas = Some(5);
        let action = OwnResource::Deployment(OwnDeployment::from_unit_spec(&unit.spec))
            .apply(&owner, &store)
            .await
            .expect("update");

        assert_eq!(action, ApplyAction::Updated);
        let live: Deployment = store.get(&unit.key()).await.expect("get").expect("live");
        assert_eq!(live.spec.and_then(|s| s.replicas), Some(5));
        assert_eq!(store.write_count::<Deployment>(Verb::Update).await, 1);
    }

    #[tokio::test]
    async fn test_out_of_band_scale_is_reverted() {
        let store = MemoryStore::new();
        let (unit, owner) = seeded(&store).await;
        let resource = OwnResource::Deployment(OwnDeployment::from_unit_spec(&unit.spec));
        resource.apply(&owner, &store).await.expect("create");

        let mut scaled: Deployment = store.get(&unit.key()).await.expect("get").expect("live");
        if let Some(spec) = scaled.spec.as_mut() {
            spec.replicas = Some(7);
        }
        store.update(&scaled).await.expect("scale");

        let action = resource.apply(&owner, &store).await.expect("apply");

        assert_eq!(action, ApplyAction::Updated);
        let live: Deployment = store.get(&unit.key()).await.expect("get").expect("live");
        assert_eq!(live.spec.and_then(|s| s.replicas), Some(2));
        assert_eq!(
            resource.apply(&owner, &store).await.expect("settled"),
            ApplyAction::Unchanged
        );
    }

    #[tokio::test]
    async fn test_service_update_keeps_cluster_ip() {
        let store = MemoryStore::new();
        let (unit, owner) = seeded(&store).await;

        service(80).apply(&owner, &store).await.expect("create");
        let before: Service = store.get(&unit.key()).await.expect("get").expect("live");
        let ip = before.spec.and_then(|s| s.cluster_ip);
        assert!(ip.is_some());

        let action = service(8080).apply(&owner, &store).await.expect("update");

        assert_eq!(action, ApplyAction::Updated);
        let after: Service = store.get(&unit.key()).await.expect("get").expect("live");
        let spec = after.spec.expect("spec");
        assert_eq!(spec.cluster_ip, ip);
        assert_eq!(spec.ports.map(|p| p[0].port), Some(8080));
    }

    #[tokio::test]
    async fn test_foreign_child_is_adopted() {
        let store = MemoryStore::new();
        let (unit, owner) = seeded(&store).await;
        let resource = service(80);

        let mut foreign = Service {
            metadata: owner.child_metadata("stale"),
            spec: Some(ServiceSpec::default()),
            ..Service::default()
        };
        foreign.metadata.owner_references = None;
        store.insert(foreign).await.expect("insert");

        let action = resource.apply(&owner, &store).await.expect("apply");

        assert_eq!(action, ApplyAction::Updated);
        let live: Service = store.get(&unit.key()).await.expect("get").expect("live");
        assert!(owner.owns(&live.metadata));
        let expected = resource.spec_hash().expect("hash");
        assert_eq!(recorded_hash(&live.metadata), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_status_requires_live_child() {
        let store = MemoryStore::new();
        let (unit, _) = seeded(&store).await;

        let err = OwnResource::Pvc(OwnPvc::from_relation(&Default::default()))
            .update_status(&unit, &store)
            .await
            .expect_err("missing claim");

        assert!(matches!(
            err,
            ControllerError::Store(StoreError::NotFound { .. })
        ));
    }
}
