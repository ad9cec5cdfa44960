//! In-process object store backend.
//!
//! This module provides a store that keeps objects in memory with the same
//! write semantics as the API server: resource versions, status subresource
//! separation and platform-assigned fields. It backs dry runs and tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::api::ObjectKey;
use crate::error::{ControllerError, Result, StoreError};

use super::backend::ObjectStore;
use super::object::ClusterObject;

/// First three octets of simulated service addresses.
const CLUSTER_IP_PREFIX: &str = "10.96.0";

/// Store operations, used to count writes and inject faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Read by identity.
    Get,
    /// Create.
    Create,
    /// Spec/metadata replacement.
    Update,
    /// Status subresource replacement.
    UpdateStatus,
}

/// In-memory object store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Guarded store contents.
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<(&'static str, ObjectKey), Value>,
    last_version: u64,
    last_cluster_ip: u8,
    writes: HashMap<(&'static str, Verb), usize>,
    faults: HashMap<(&'static str, Verb), StoreError>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object without counting it as a write.
    ///
    /// Status is kept as given, so this can also stand in for another
    /// controller reporting observed state.
    ///
    /// # Errors
    ///
    /// Returns an error if the object has no name or cannot be encoded.
    pub async fn insert<K: ClusterObject>(&self, object: K) -> Result<K> {
        let key = object_key(&object)?;
        let mut inner = self.inner.lock().await;

        let mut stored = object;
        let version = inner.next_version();
        let meta = stored.metadata_mut();
        meta.namespace = Some(key.namespace.clone());
        if meta.uid.is_none() {
            meta.uid = Some(Uuid::new_v4().to_string());
        }
        meta.resource_version = Some(version);

        let value = encode(&stored)?;
        inner.objects.insert((K::KIND, key), value.clone());
        decode::<K>(value)
    }

    /// Returns how many successful writes of `verb` hit objects of kind `K`.
    pub async fn write_count<K: ClusterObject>(&self, verb: Verb) -> usize {
        let inner = self.inner.lock().await;
        inner.writes.get(&(K::KIND, verb)).copied().unwrap_or_default()
    }

    /// Returns the number of successful writes across all kinds.
    pub async fn total_writes(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.writes.values().sum()
    }

    /// Makes every `verb` on kind `K` fail with `error` until cleared.
    pub async fn inject_fault<K: ClusterObject>(&self, verb: Verb, error: StoreError) {
        let mut inner = self.inner.lock().await;
        inner.faults.insert((K::KIND, verb), error);
    }

    /// Removes all injected faults.
    pub async fn clear_faults(&self) {
        let mut inner = self.inner.lock().await;
        inner.faults.clear();
    }
}

impl Inner {
    fn next_version(&mut self) -> String {
        self.last_version = self.last_version.saturating_add(1);
        self.last_version.to_string()
    }

    fn check_fault(&self, kind: &'static str, verb: Verb) -> Result<()> {
        match self.faults.get(&(kind, verb)) {
            Some(error) => {
                debug!("Injected fault for {verb:?} {kind}: {error}");
                Err(ControllerError::Store(error.clone()))
            }
            None => Ok(()),
        }
    }

    fn record_write(&mut self, kind: &'static str, verb: Verb) {
        *self.writes.entry((kind, verb)).or_default() += 1;
    }

    /// Fills in `clusterIP` the way the platform does for new services.
    fn assign_cluster_ip(&mut self, value: &mut Value) {
        let Some(spec) = value.get_mut("spec").and_then(Value::as_object_mut) else {
            return;
        };

        let unset = spec
            .get("clusterIP")
            .and_then(Value::as_str)
            .is_none_or(str::is_empty);
        if !unset {
            return;
        }

        self.last_cluster_ip = self.last_cluster_ip.wrapping_add(1);
        let ip = format!("{CLUSTER_IP_PREFIX}.{}", self.last_cluster_ip);
        spec.insert(String::from("clusterIP"), Value::String(ip.clone()));
        spec.insert(
            String::from("clusterIPs"),
            Value::Array(vec![Value::String(ip)]),
        );
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get<K: ClusterObject>(&self, key: &ObjectKey) -> Result<Option<K>> {
        let inner = self.inner.lock().await;
        inner.check_fault(K::KIND, Verb::Get)?;

        trace!("Get {} {key}", K::KIND);
        inner
            .objects
            .get(&(K::KIND, key.clone()))
            .cloned()
            .map(decode::<K>)
            .transpose()
    }

    async fn create<K: ClusterObject>(&self, object: &K) -> Result<K> {
        let key = object_key(object)?;
        let mut inner = self.inner.lock().await;
        inner.check_fault(K::KIND, Verb::Create)?;

        if inner.objects.contains_key(&(K::KIND, key.clone())) {
            return Err(ControllerError::Store(StoreError::AlreadyExists {
                kind: K::KIND.to_string(),
                key: key.to_string(),
            }));
        }

        let mut stored = object.clone();
        let version = inner.next_version();
        let meta = stored.metadata_mut();
        meta.namespace = Some(key.namespace.clone());
        meta.uid = Some(Uuid::new_v4().to_string());
        meta.resource_version = Some(version);
        meta.generation = Some(1);

        let mut value = encode(&stored)?;
        set_field(&mut value, "status", None);
        if K::KIND == "Service" {
            inner.assign_cluster_ip(&mut value);
        }

        debug!("Created {} {key}", K::KIND);
        inner.objects.insert((K::KIND, key), value.clone());
        inner.record_write(K::KIND, Verb::Create);
        decode(value)
    }

    async fn update<K: ClusterObject>(&self, object: &K) -> Result<K> {
        let key = object_key(object)?;
        let mut inner = self.inner.lock().await;
        inner.check_fault(K::KIND, Verb::Update)?;

        let current_value = current_or_not_found::<K>(&inner, &key)?;
        check_version::<K>(&key, &current_value, object)?;
        let current: K = decode(current_value.clone())?;

        let spec_changed = encode(object)?.get("spec") != current_value.get("spec");
        let generation = current.metadata().generation.unwrap_or(1);

        let mut next = object.clone();
        let version = inner.next_version();
        let meta = next.metadata_mut();
        meta.namespace = Some(key.namespace.clone());
        meta.uid.clone_from(&current.metadata().uid);
        meta.resource_version = Some(version);
        meta.generation = Some(if spec_changed {
            generation.saturating_add(1)
        } else {
            generation
        });

        let mut value = encode(&next)?;
        set_field(&mut value, "status", current_value.get("status").cloned());

        debug!("Updated {} {key}", K::KIND);
        inner.objects.insert((K::KIND, key), value.clone());
        inner.record_write(K::KIND, Verb::Update);
        decode(value)
    }

    async fn update_status<K: ClusterObject>(&self, object: &K) -> Result<K> {
        let key = object_key(object)?;
        let mut inner = self.inner.lock().await;
        inner.check_fault(K::KIND, Verb::UpdateStatus)?;

        let current_value = current_or_not_found::<K>(&inner, &key)?;
        check_version::<K>(&key, &current_value, object)?;

        let mut next: K = decode(current_value)?;
        next.metadata_mut().resource_version = Some(inner.next_version());

        let mut value = encode(&next)?;
        set_field(&mut value, "status", encode(object)?.get("status").cloned());

        debug!("Updated status of {} {key}", K::KIND);
        inner.objects.insert((K::KIND, key), value.clone());
        inner.record_write(K::KIND, Verb::UpdateStatus);
        decode(value)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

fn object_key<K: ClusterObject>(object: &K) -> Result<ObjectKey> {
    object.key().ok_or_else(|| {
        ControllerError::Store(StoreError::Encode {
            kind: K::KIND.to_string(),
            message: String::from("object has no name"),
        })
    })
}

fn current_or_not_found<K: ClusterObject>(inner: &Inner, key: &ObjectKey) -> Result<Value> {
    inner
        .objects
        .get(&(K::KIND, key.clone()))
        .cloned()
        .ok_or_else(|| {
            ControllerError::Store(StoreError::NotFound {
                kind: K::KIND.to_string(),
                key: key.to_string(),
            })
        })
}

/// Rejects writes whose resource version is set and stale.
fn check_version<K: ClusterObject>(key: &ObjectKey, current: &Value, incoming: &K) -> Result<()> {
    let Some(expected) = incoming.metadata().resource_version.as_deref() else {
        return Ok(());
    };

    let stored = current
        .pointer("/metadata/resourceVersion")
        .and_then(Value::as_str);

    if stored == Some(expected) {
        Ok(())
    } else {
        Err(ControllerError::Store(StoreError::Conflict {
            kind: K::KIND.to_string(),
            key: key.to_string(),
            message: format!(
                "resource version {expected} does not match stored {}",
                stored.unwrap_or("<none>")
            ),
        }))
    }
}

fn set_field(value: &mut Value, field: &str, new: Option<Value>) {
    if let Some(map) = value.as_object_mut() {
        match new {
            Some(v) if !v.is_null() => {
                map.insert(field.to_string(), v);
            }
            _ => {
                map.remove(field);
            }
        }
    }
}

fn encode<K: ClusterObject>(object: &K) -> Result<Value> {
    serde_json::to_value(object).map_err(|e| {
        ControllerError::Store(StoreError::Encode {
            kind: K::KIND.to_string(),
            message: e.to_string(),
        })
    })
}

fn decode<K: ClusterObject>(value: Value) -> Result<K> {
    serde_json::from_value(value).map_err(|e| {
        ControllerError::Store(StoreError::Decode {
            kind: K::KIND.to_string(),
            message: e.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Unit, UnitSpec, UnitStatus, WorkloadStatusSummary};
    use k8s_openapi::api::core::v1::{Service, ServiceSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn service(name: &str) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(String::from("default")),
                ..ObjectMeta::default()
            },
            spec: Some(ServiceSpec::default()),
            ..Service::default()
        }
    }

    #[tokio::test]
    async fn test_create_assigns_identity_and_cluster_ip() {
        let store = MemoryStore::new();

        let created = store.create(&service("web")).await.expect("create");

        assert!(created.metadata.uid.is_some());
        assert!(created.metadata.resource_version.is_some());
        let ip = created.spec.and_then(|s| s.cluster_ip).expect("cluster ip");
        assert!(ip.starts_with(CLUSTER_IP_PREFIX));
        assert_eq!(store.write_count::<Service>(Verb::Create).await, 1);
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let store = MemoryStore::new();
        store.create(&service("web")).await.expect("first create");

        let err = store.create(&service("web")).await.expect_err("duplicate");
        assert!(matches!(
            err,
            ControllerError::Store(StoreError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = MemoryStore::new();
        let found: Option<Service> = store
            .get(&ObjectKey::new("default", "nope"))
            .await
            .expect("get");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = MemoryStore::new();
        let created = store.create(&service("web")).await.expect("create");

        store.update(&created).await.expect("first update");
        let err = store.update(&created).await.expect_err("stale update");

        assert!(matches!(err, ControllerError::Store(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_update_keeps_status_and_status_update_keeps_spec() {
        let store = MemoryStore::new();
        let unit = store
            .insert(Unit::new("default", "web", UnitSpec::default()))
            .await
            .expect("insert");

        let mut with_status = unit.clone();
        with_status.status = UnitStatus {
            deployment: Some(WorkloadStatusSummary {
                replicas: 2,
                ..WorkloadStatusSummary::default()
            }),
            ..UnitStatus::default()
        };
        with_status.spec.replicas = Some(9);
        let written = store.update_status(&with_status).await.expect("status");

        assert_eq!(written.spec.replicas, None);
        assert_eq!(written.status, with_status.status);

        let mut respec = written.clone();
        respec.spec.replicas = Some(4);
        respec.status = UnitStatus::default();
        let updated = store.update(&respec).await.expect("update");

        assert_eq!(updated.spec.replicas, Some(4));
        assert_eq!(updated.status, with_status.status);
        assert_eq!(updated.metadata.uid, unit.metadata.uid);
    }

    #[tokio::test]
    async fn test_injected_fault_until_cleared() {
        let store = MemoryStore::new();
        store
            .inject_fault::<Service>(Verb::Create, StoreError::network("connection reset"))
            .await;

        assert!(store.create(&service("web")).await.is_err());
        assert_eq!(store.total_writes().await, 0);

        store.clear_faults().await;
        assert!(store.create(&service("web")).await.is_ok());
    }
}
