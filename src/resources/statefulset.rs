//! Stateful workload child.

use k8s_openapi::Resource;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};

use crate::api::{Unit, UnitSpec, WorkloadStatusSummary};
use crate::error::Result;
use crate::store::ObjectStore;

use super::common::{apply_object, fetch_required, ChildOwner};
use super::hash::SpecHasher;
use super::ApplyAction;

/// Planned stateful workload.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnStatefulSet {
    /// Desired workload spec.
    pub spec: StatefulSetSpec,
}

impl OwnStatefulSet {
    /// Copies replicas, selector and template from the Unit and binds the
    /// governing service name to the Unit's name.
    #[must_use]
    pub fn from_unit_spec(spec: &UnitSpec, unit_name: &str) -> Self {
        Self {
            spec: StatefulSetSpec {
                replicas: spec.replicas,
                selector: spec.selector.clone(),
                template: spec.template.clone(),
                service_name: unit_name.to_string(),
                ..StatefulSetSpec::default()
            },
        }
    }

    /// Builds the desired child object.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec cannot be hashed.
    pub fn make(&self, owner: &ChildOwner) -> Result<StatefulSet> {
        let hash = SpecHasher::new().hash_spec(StatefulSet::KIND, &self.spec)?;
        Ok(StatefulSet {
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
    ) -> Result<Option<StatefulSet>> {
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

    /// Copies the live workload's replica counts into a copy of `unit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the child is missing or the store fails.
    pub async fn update_status<S: ObjectStore>(&self, unit: &Unit, store: &S) -> Result<Unit> {
        let live: StatefulSet = fetch_required(store, &unit.key()).await?;
        let mut next = unit.clone();
        next.status.stateful_set =
            Some(WorkloadStatusSummary::from_stateful_set(live.status.as_ref()));
        Ok(next)
    }
}

/// `selector` and `serviceName` are immutable; only replicas and template move.
fn merge_owned(live: &mut StatefulSet, desired: &StatefulSet) {
    let Some(wanted) = desired.spec.as_ref() else {
        return;
    };
    let spec = live.spec.get_or_insert_with(|| wanted.clone());
    spec.replicas = wanted.replicas;
    spec.template.clone_from(&wanted.template);
}
