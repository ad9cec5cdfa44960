//! Network endpoint child.

use k8s_openapi::Resource;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

use crate::api::{ServiceStatusSummary, Unit};
use crate::error::Result;
use crate::store::ObjectStore;

use super::common::{apply_object, fetch_required, ChildOwner};
use super::hash::SpecHasher;
use super::ApplyAction;

/// Planned network endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnService {
    /// Desired service spec.
    pub spec: ServiceSpec,
}

impl OwnService {
    /// Takes the Unit's service spec, defaulting the pod selector to the
    /// Unit's `matchLabels` when the spec sets none.
    #[must_use]
    pub fn from_relation(spec: &ServiceSpec, selector: &LabelSelector) -> Self {
        let mut spec = spec.clone();
        if spec.selector.is_none() {
            spec.selector.clone_from(&selector.match_labels);
        }
        Self { spec }
    }

    /// Builds the desired child object.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec cannot be hashed.
    pub fn make(&self, owner: &ChildOwner) -> Result<Service> {
        let hash = SpecHasher::new().hash_spec(Service::KIND, &self.spec)?;
        Ok(Service {
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
    ) -> Result<Option<Service>> {
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

    /// Copies the live endpoint's addressing into a copy of `unit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the child is missing or the store fails.
    pub async fn update_status<S: ObjectStore>(&self, unit: &Unit, store: &S) -> Result<Unit> {
        let live: Service = fetch_required(store, &unit.key()).await?;
        let mut next = unit.clone();
        next.status.service = Some(ServiceStatusSummary::from_service(&live));
        Ok(next)
    }
}

/// Replaces the spec but keeps what the platform allocated.
fn merge_owned(live: &mut Service, desired: &Service) {
    let mut spec = desired.spec.clone().unwrap_or_default();

    if let Some(current) = live.spec.as_ref() {
        if current.cluster_ip.is_some() {
            spec.cluster_ip.clone_from(&current.cluster_ip);
            spec.cluster_ips.clone_from(&current.cluster_ips);
        }
        if spec.ip_families.is_none() {
            spec.ip_families.clone_from(&current.ip_families);
        }
        if spec.ip_family_policy.is_none() {
            spec.ip_family_policy.clone_from(&current.ip_family_policy);
        }
        if spec.health_check_node_port.is_none() {
            spec.health_check_node_port = current.health_check_node_port;
        }

        let allocated = current.ports.as_deref().unwrap_or_default();
        for port in spec.ports.iter_mut().flatten() {
            if port.node_port.is_some() {
                continue;
            }
            port.node_port = allocated
                .iter()
                .find(|p| p.port == port.port && protocol(p) == protocol(port))
                .and_then(|p| p.node_port);
        }
    }

    live.spec = Some(spec);
}

fn protocol(port: &ServicePort) -> &str {
    port.protocol.as_deref().unwrap_or("TCP")
}
