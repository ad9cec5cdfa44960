//! Observed-state schema of a `Unit`.
//!
//! Each child kind owns exactly one section of [`UnitStatus`]; sections never
//! overlap, so extraction order does not matter.

use k8s_openapi::api::apps::v1::{DeploymentStatus, StatefulSetStatus};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Observed state of a `Unit`, aggregated from its children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitStatus {
    /// Written by the stateless workload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<WorkloadStatusSummary>,
    /// Written by the stateful workload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stateful_set: Option<WorkloadStatusSummary>,
    /// Written by the network endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceStatusSummary>,
    /// Written by the storage claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pvc: Option<PvcStatusSummary>,
}

/// Replica counts reported by a workload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStatusSummary {
    /// Pods targeted by the workload.
    pub replicas: i32,
    /// Pods passing readiness.
    pub ready_replicas: i32,
    /// Pods available to serve.
    pub available_replicas: i32,
    /// Pods running the latest template.
    pub updated_replicas: i32,
    /// Generation last acted on by the workload controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Addressing details of a network endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatusSummary {
    /// Service type (`ClusterIP`, `NodePort`, ...).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    /// Virtual IP assigned by the platform.
    #[serde(default, rename = "clusterIP", skip_serializing_if = "Option::is_none")]
    pub cluster_ip: Option<String>,
    /// Exposed ports as `port/protocol`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    /// External load balancer addresses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub load_balancer_ingress: Vec<String>,
}

/// Binding state of a storage claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvcStatusSummary {
    /// Claim phase (`Pending`, `Bound`, `Lost`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Bound volume name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,
    /// Actual capacity by resource name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capacity: BTreeMap<String, String>,
    /// Granted access modes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_modes: Vec<String>,
}

impl WorkloadStatusSummary {
    /// Summarizes a stateless workload's status.
    #[must_use]
    pub fn from_deployment(status: Option<&DeploymentStatus>) -> Self {
        status.map_or_else(Self::default, |s| Self {
            replicas: s.replicas.unwrap_or_default(),
            ready_replicas: s.ready_replicas.unwrap_or_default(),
            available_replicas: s.available_replicas.unwrap_or_default(),
            updated_replicas: s.updated_replicas.unwrap_or_default(),
            observed_generation: s.observed_generation,
        })
    }

    /// Summarizes a stateful workload's status.
    #[must_use]
    pub fn from_stateful_set(status: Option<&StatefulSetStatus>) -> Self {
        status.map_or_else(Self::default, |s| Self {
            replicas: s.replicas,
            ready_replicas: s.ready_replicas.unwrap_or_default(),
            available_replicas: s.available_replicas.unwrap_or_default(),
            updated_replicas: s.updated_replicas.unwrap_or_default(),
            observed_generation: s.observed_generation,
        })
    }
}

impl ServiceStatusSummary {
    /// Summarizes a live service.
    #[must_use]
    pub fn from_service(service: &Service) -> Self {
        let spec = service.spec.as_ref();

        let ports = spec
            .and_then(|s| s.ports.as_ref())
            .map(|ports| {
                ports
                    .iter()
                    .map(|p| format!("{}/{}", p.port, p.protocol.as_deref().unwrap_or("TCP")))
                    .collect()
            })
            .unwrap_or_default();

        let load_balancer_ingress = service
            .status
            .as_ref()
            .and_then(|s| s.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .map(|ingress| {
                ingress
                    .iter()
                    .filter_map(|i| i.ip.clone().or_else(|| i.hostname.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            service_type: spec.and_then(|s| s.type_.clone()),
            cluster_ip: spec.and_then(|s| s.cluster_ip.clone()),
            ports,
            load_balancer_ingress,
        }
    }
}

impl PvcStatusSummary {
    /// Summarizes a live storage claim.
    #[must_use]
    pub fn from_claim(claim: &PersistentVolumeClaim) -> Self {
        let status = claim.status.as_ref();

        Self {
            phase: status.and_then(|s| s.phase.clone()),
            volume_name: claim.spec.as_ref().and_then(|s| s.volume_name.clone()),
            capacity: status
                .and_then(|s| s.capacity.as_ref())
                .map(|c| c.iter().map(|(k, q)| (k.clone(), q.0.clone())).collect())
                .unwrap_or_default(),
            access_modes: status
                .and_then(|s| s.access_modes.clone())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ServicePort, ServiceSpec};

    #[test]
    fn test_deployment_summary_defaults_missing_counts() {
        let status = DeploymentStatus {
            replicas: Some(3),
            ready_replicas: Some(2),
            ..DeploymentStatus::default()
        };

        let summary = WorkloadStatusSummary::from_deployment(Some(&status));
        assert_eq!(summary.replicas, 3);
        assert_eq!(summary.ready_replicas, 2);
        assert_eq!(summary.available_replicas, 0);

        assert_eq!(
            WorkloadStatusSummary::from_deployment(None),
            WorkloadStatusSummary::default()
        );
    }

    #[test]
    fn test_service_summary_formats_ports() {
        let service = Service {
            spec: Some(ServiceSpec {
                cluster_ip: Some(String::from("10.96.0.10")),
                ports: Some(vec![
                    ServicePort {
                        port: 80,
                        ..ServicePort::default()
                    },
                    ServicePort {
                        port: 53,
                        protocol: Some(String::from("UDP")),
                        ..ServicePort::default()
                    },
                ]),
                ..ServiceSpec::default()
            }),
            ..Service::default()
        };

        let summary = ServiceStatusSummary::from_service(&service);
        assert_eq!(summary.cluster_ip.as_deref(), Some("10.96.0.10"));
        assert_eq!(summary.ports, vec!["80/TCP", "53/UDP"]);
    }

    #[test]
    fn test_empty_status_serializes_to_empty_object() {
        let json = serde_json::to_string(&UnitStatus::default()).expect("serializes");
        assert_eq!(json, "{}");
    }
}
