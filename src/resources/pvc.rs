//! Persistent storage claim child.

use k8s_openapi::Resource;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, PersistentVolumeClaimSpec};

use crate::api::{PvcStatusSummary, Unit};
use crate::error::Result;
use crate::store::ObjectStore;

use super::common::{apply_object, fetch_required, ChildOwner};
use super::hash::SpecHasher;
use super::ApplyAction;

/// Planned storage claim.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnPvc {
    /// Desired claim spec.
    pub spec: PersistentVolumeClaimSpec,
}

impl OwnPvc {
    /// Takes the Unit's claim spec verbatim.
    #[must_use]
    pub fn from_relation(spec: &PersistentVolumeClaimSpec) -> Self {
        Self { spec: spec.clone() }
    }

    /// Builds the desired child object.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec cannot be hashed.
    pub fn make(&self, owner: &ChildOwner) -> Result<PersistentVolumeClaim> {
        let hash = SpecHasher::new().hash_spec(PersistentVolumeClaim::KIND, &self.spec)?;
        Ok(PersistentVolumeClaim {
            metadata: owner.child_metadata(&hash),
            spec: Some(self.spec.clone()),
            status: None,
        })
    }

    /// Looks up the live child.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    pub async fn exists<S: ObjectStore>(
        &self,
        owner: &ChildOwner,
        store: &S,
    ) -> Result<Option<PersistentVolumeClaim>> {
        store.get(owner.key()).await
    }

    /// Creates or updates the live child.
    ///
    /// # Errors
    ///
    /// Returns an error if a store call fails.
    pub async fn apply<S: ObjectStore>(&self, owner: &ChildOwner, store: &S) -> Result<ApplyAction> {
        apply_object(store, owner, self.make(owner)?, merge_owned).await
    }

    /// Copies the live claim's binding state into a copy of `unit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the child is missing or the store fails.
    pub async fn update_status<S: ObjectStore>(&self, unit: &Unit, store: &S) -> Result<Unit> {
        let live: PersistentVolumeClaim = fetch_required(store, &unit.key()).await?;
        let mut next = unit.clone();
        next.status.pvc = Some(PvcStatusSummary::from_claim(&live));
        Ok(next)
    }
}

/// A bound claim only accepts resource changes (volume expansion).
fn merge_owned(live: &mut PersistentVolumeClaim, desired: &PersistentVolumeClaim) {
    let Some(wanted) = desired.spec.as_ref() else {
        return;
    };
    live.spec
        .get_or_insert_with(|| wanted.clone())
        .resources
        .clone_from(&wanted.resources);
}
