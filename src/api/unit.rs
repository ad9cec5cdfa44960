//! The `Unit` resource and its desired-state schema.

use k8s_openapi::api::core::v1::{PersistentVolumeClaimSpec, PodTemplateSpec, ServiceSpec};
use k8s_openapi::api::networking::v1::IngressSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::key::{ObjectKey, DEFAULT_NAMESPACE};
use super::status::UnitStatus;

/// API group of the `Unit` kind.
pub const UNIT_GROUP: &str = "custom.hmlss.ml";

/// API version of the `Unit` kind.
pub const UNIT_VERSION: &str = "v1";

/// Kind name of the `Unit` resource.
pub const UNIT_KIND: &str = "Unit";

/// Lower-case plural used in API paths.
pub const UNIT_PLURAL: &str = "units";

/// A logical application: one workload plus optional service and claim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    /// `custom.hmlss.ml/v1`.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Always `Unit`.
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Standard object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Desired state, authored by the user.
    #[serde(default)]
    pub spec: UnitSpec,
    /// Observed state, written by the controller.
    #[serde(default)]
    pub status: UnitStatus,
}

/// Desired state of a `Unit`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSpec {
    /// Selects the workload variant.
    #[serde(default)]
    pub category: Category,
    /// Desired replica count; `None` leaves the platform default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Label selector the workload uses to find its pods.
    #[serde(default)]
    pub selector: LabelSelector,
    /// Pod template, passed through verbatim.
    #[serde(default)]
    pub template: PodTemplateSpec,
    /// Optional attachments.
    #[serde(default)]
    pub relation_resource: RelationResource,
}

/// Optional attachments managed alongside the workload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationResource {
    /// Network endpoint spec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceSpec>,
    /// Persistent storage claim spec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pvc: Option<PersistentVolumeClaimSpec>,
    /// Reserved. Accepted by the schema but never planned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<IngressSpec>,
}

/// Workload category of a `Unit`.
///
/// Only `Deployment` selects the stateless variant. Every other value,
/// including an empty string, selects the stateful variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    /// Stateless replica set.
    Deployment,
    /// Stateful replica set.
    StatefulSet,
    /// Any other value; treated as stateful.
    Other(String),
}

fn default_api_version() -> String {
    <Unit as k8s_openapi::Resource>::API_VERSION.to_string()
}

fn default_kind() -> String {
    UNIT_KIND.to_string()
}

impl Unit {
    /// Creates a new `Unit` with the given identity and spec.
    #[must_use]
    pub fn new(namespace: &str, name: &str, spec: UnitSpec) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..ObjectMeta::default()
            },
            spec,
            status: UnitStatus::default(),
        }
    }

    /// Returns the Unit's name, or an empty string when unset.
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Returns the Unit's namespace, falling back to the default namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Returns the namespaced identity of the Unit.
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace(), self.name())
    }

    /// Returns true once deletion of the Unit has been requested.
    #[must_use]
    pub const fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}

// Gives `Unit` the same type information the built-in kinds carry, which
// in turn makes it a `kube::Resource`.
impl k8s_openapi::Resource for Unit {
    const API_VERSION: &'static str = "custom.hmlss.ml/v1";
    const GROUP: &'static str = UNIT_GROUP;
    const KIND: &'static str = UNIT_KIND;
    const VERSION: &'static str = UNIT_VERSION;
    const URL_PATH_SEGMENT: &'static str = UNIT_PLURAL;
    type Scope = k8s_openapi::NamespaceResourceScope;
}

impl k8s_openapi::Metadata for Unit {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl Default for Category {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl Category {
    /// Returns true if this category selects the stateless workload.
    #[must_use]
    pub const fn is_stateless(&self) -> bool {
        matches!(self, Self::Deployment)
    }

    /// Returns the wire value of the category.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Deployment => "Deployment",
            Self::StatefulSet => "StatefulSet",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Deployment" => Self::Deployment,
            "StatefulSet" => Self::StatefulSet,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        match value {
            Category::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r"
apiVersion: custom.hmlss.ml/v1
kind: Unit
metadata:
  name: web
  namespace: shop
spec:
  category: Deployment
  replicas: 3
  selector:
    matchLabels:
      app: web
  template:
    metadata:
      labels:
        app: web
    spec:
      containers:
        - name: web
          image: nginx:1.27
  relationResource:
    service:
      ports:
        - port: 80
";

    #[test]
    fn test_parse_manifest() {
        let unit: Unit = serde_yaml::from_str(MANIFEST).expect("manifest parses");

        assert_eq!(unit.key(), ObjectKey::new("shop", "web"));
        assert_eq!(unit.spec.category, Category::Deployment);
        assert_eq!(unit.spec.replicas, Some(3));
        assert!(unit.spec.relation_resource.service.is_some());
        assert!(unit.spec.relation_resource.pvc.is_none());
        assert_eq!(unit.status, UnitStatus::default());
    }

    #[test]
    fn test_category_round_trips_unknown_values() {
        let category = Category::from("StatefulSet-equivalent");
        assert!(!category.is_stateless());
        assert_eq!(String::from(category), "StatefulSet-equivalent");
    }

    #[test]
    fn test_missing_category_is_stateful() {
        let spec: UnitSpec = serde_json::from_str("{}").expect("empty spec parses");
        assert!(!spec.category.is_stateless());
    }

    #[test]
    fn test_new_sets_type_meta() {
        let unit = Unit::new("default", "db", UnitSpec::default());
        assert_eq!(unit.api_version, "custom.hmlss.ml/v1");
        assert_eq!(unit.kind, "Unit");
        assert!(!unit.is_deleting());
    }

    #[test]
    fn test_kube_resource_type_info() {
        use kube::Resource;

        assert_eq!(Unit::api_version(&()), "custom.hmlss.ml/v1");
        assert_eq!(Unit::plural(&()), "units");
        assert_eq!(
            Unit::url_path(&(), Some("shop")),
            "/apis/custom.hmlss.ml/v1/namespaces/shop/units"
        );
    }
}
