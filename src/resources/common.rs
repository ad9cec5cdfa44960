//! Shared plumbing for child objects: ownership, metadata and create-or-update.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::api::{ObjectKey, Unit, UNIT_KIND};
use crate::error::{ControllerError, PlanError, Result, StoreError};
use crate::store::{ClusterObject, ObjectStore};

use super::ApplyAction;

/// Label carrying the owning Unit's name.
pub const UNIT_LABEL: &str = "unit.custom.hmlss.ml/name";

/// Annotation carrying the hash of the last applied child spec.
pub const SPEC_HASH_ANNOTATION: &str = "unit.custom.hmlss.ml/spec-hash";

/// Identity and ownership data stamped onto every child of one Unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildOwner {
    /// Identity shared by the Unit and its children.
    key: ObjectKey,
    /// Controller reference back to the Unit.
    owner_ref: OwnerReference,
}

impl ChildOwner {
    /// Builds the owner data for a Unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the Unit has no name or no UID.
    pub fn for_unit(unit: &Unit) -> std::result::Result<Self, PlanError> {
        let key = unit.key();

        if unit.name().is_empty() {
            return Err(PlanError::MissingIdentity {
                key: key.to_string(),
                field: "name",
            });
        }

        let uid = unit
            .metadata
            .uid
            .clone()
            .filter(|uid| !uid.is_empty())
            .ok_or_else(|| PlanError::MissingIdentity {
                key: key.to_string(),
                field: "uid",
            })?;

        Ok(Self {
            owner_ref: OwnerReference {
                api_version: unit.api_version.clone(),
                kind: UNIT_KIND.to_string(),
                name: key.name.clone(),
                uid,
                controller: Some(true),
                block_owner_deletion: Some(true),
            },
            key,
        })
    }

    /// Returns the identity every child of this Unit is stored under.
    #[must_use]
    pub const fn key(&self) -> &ObjectKey {
        &self.key
    }

    /// Returns the controller reference to the Unit.
    #[must_use]
    pub const fn owner_reference(&self) -> &OwnerReference {
        &self.owner_ref
    }

    /// Builds the metadata of a freshly planned child.
    #[must_use]
    pub fn child_metadata(&self, spec_hash: &str) -> ObjectMeta {
        let mut meta = ObjectMeta {
            name: Some(self.key.name.clone()),
            namespace: Some(self.key.namespace.clone()),
            ..ObjectMeta::default()
        };
        self.stamp(&mut meta, spec_hash);
        meta
    }

    /// Returns true if `meta` carries this Unit's owner reference.
    #[must_use]
    pub fn owns(&self, meta: &ObjectMeta) -> bool {
        meta.owner_references
            .as_ref()
            .is_some_and(|refs| refs.iter().any(|r| r.uid == self.owner_ref.uid))
    }

    /// Adds the label, the spec-hash annotation and the owner reference,
    /// keeping whatever other actors put on the object.
    pub fn stamp(&self, meta: &mut ObjectMeta, spec_hash: &str) {
        meta.labels
            .get_or_insert_with(BTreeMap::new)
            .insert(UNIT_LABEL.to_string(), self.key.name.clone());
        meta.annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(SPEC_HASH_ANNOTATION.to_string(), spec_hash.to_string());

        let refs = meta.owner_references.get_or_insert_with(Vec::new);
        refs.retain(|r| r.uid != self.owner_ref.uid);
        refs.push(self.owner_ref.clone());
    }
}

/// Returns the spec hash recorded on an object, if any.
#[must_use]
pub fn recorded_hash(meta: &ObjectMeta) -> Option<&str> {
    meta.annotations
        .as_ref()
        .and_then(|a| a.get(SPEC_HASH_ANNOTATION))
        .map(String::as_str)
}

/// Creates `desired` if absent, otherwise merges owned fields into the live
/// object and writes it back.
///
/// The write is skipped only when the live object carries this Unit's owner
/// reference, records the planned spec hash, and still holds every field the
/// planned spec sets. Fields the platform defaults or allocates on top of the
/// planned spec do not count as drift.
pub(crate) async fn apply_object<S, K, F>(
    store: &S,
    owner: &ChildOwner,
    desired: K,
    merge_owned: F,
) -> Result<ApplyAction>
where
    S: ObjectStore,
    K: ClusterObject,
    F: FnOnce(&mut K, &K) + Send,
{
    let desired_hash = recorded_hash(desired.metadata()).unwrap_or_default().to_string();

    let Some(mut live) = store.get::<K>(owner.key()).await? else {
        debug!("{} {} absent, creating", K::KIND, owner.key());
        store.create(&desired).await?;
        return Ok(ApplyAction::Created);
    };

    if owner.owns(live.metadata())
        && recorded_hash(live.metadata()) == Some(desired_hash.as_str())
        && spec_contained::<K>(&desired, &live)?
    {
        debug!("{} {} up to date", K::KIND, owner.key());
        return Ok(ApplyAction::Unchanged);
    }

    debug!("{} {} drifted, updating", K::KIND, owner.key());
    merge_owned(&mut live, &desired);
    owner.stamp(live.metadata_mut(), &desired_hash);
    store.update(&live).await?;
    Ok(ApplyAction::Updated)
}

/// Returns true if every field set in `desired`'s spec holds the same value
/// in `live`'s spec.
fn spec_contained<K: ClusterObject>(desired: &K, live: &K) -> Result<bool> {
    let encode = |object: &K| {
        serde_json::to_value(object).map_err(|e| {
            ControllerError::Store(StoreError::Encode {
                kind: K::KIND.to_string(),
                message: e.to_string(),
            })
        })
    };

    let desired = encode(desired)?;
    let live = encode(live)?;
    Ok(contains(
        live.get("spec").unwrap_or(&Value::Null),
        desired.get("spec").unwrap_or(&Value::Null),
    ))
}

/// Structural containment: objects may carry extra keys, lists must match
/// element by element, scalars must be equal.
fn contains(live: &Value, wanted: &Value) -> bool {
    match wanted {
        Value::Null => true,
        Value::Object(wanted) => wanted
            .iter()
            .all(|(k, v)| contains(live.get(k).unwrap_or(&Value::Null), v)),
        Value::Array(wanted) => live.as_array().is_some_and(|live| {
            live.len() == wanted.len() && live.iter().zip(wanted).all(|(l, w)| contains(l, w))
        }),
        wanted => live == wanted,
    }
}

/// Reads a child that must exist.
pub(crate) async fn fetch_required<S, K>(store: &S, key: &ObjectKey) -> Result<K>
where
    S: ObjectStore,
    K: ClusterObject,
{
    store.get::<K>(key).await?.ok_or_else(|| {
        ControllerError::Store(StoreError::NotFound {
            kind: K::KIND.to_string(),
            key: key.to_string(),
        })
    })
}
