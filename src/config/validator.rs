//! Validation of controller settings and Unit manifests.
//!
//! Validation collects every problem instead of stopping at the first one,
//! so `unitctl validate` can report them all. Warnings never fail validation.

use std::collections::BTreeMap;
use tracing::debug;

use crate::api::{Category, Unit};
use crate::error::{ConfigError, Result};

use super::spec::{ClusterConfig, ControllerConfig, ReconcileConfig};

/// Longest name a child object can carry.
const MAX_NAME_LEN: usize = 63;

/// Longest field manager name the API server accepts.
const MAX_FIELD_MANAGER_LEN: usize = 128;

/// Validator for controller configuration and Unit manifests.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates controller settings.
    ///
    /// # Errors
    ///
    /// Returns the first error if validation fails.
    pub fn validate(&self, config: &ControllerConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_cluster(&config.cluster, &mut result);
        Self::validate_reconcile(&config.reconcile, &mut result);

        result.into_outcome("Configuration")
    }

    /// Validates a Unit manifest before it is planned.
    ///
    /// # Errors
    ///
    /// Returns the first error if validation fails.
    pub fn validate_unit(&self, unit: &Unit) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_identity(unit, &mut result);
        Self::validate_workload(unit, &mut result);
        Self::validate_relations(unit, &mut result);

        result.into_outcome("Unit manifest")
    }

    fn validate_cluster(cluster: &ClusterConfig, result: &mut ValidationResult) {
        if let Some(path) = &cluster.kubeconfig
            && !path.exists()
        {
            result.error(
                "cluster.kubeconfig",
                format!("Kubeconfig '{}' does not exist", path.display()),
            );
        }

        if cluster.context.as_deref().is_some_and(str::is_empty) {
            result.error("cluster.context", "Context cannot be empty when set");
        }

        if cluster.timeout_secs == 0 {
            result.error("cluster.timeout_secs", "Timeout must be at least one second");
        }

        if cluster.field_manager.is_empty() {
            result.error("cluster.field_manager", "Field manager cannot be empty");
        } else if cluster.field_manager.len() > MAX_FIELD_MANAGER_LEN {
            result.error(
                "cluster.field_manager",
                format!("Field manager must be at most {MAX_FIELD_MANAGER_LEN} characters"),
            );
        }
    }

    fn validate_reconcile(reconcile: &ReconcileConfig, result: &mut ValidationResult) {
        if reconcile.requeue_base_secs == 0 {
            result.error("reconcile.requeue_base_secs", "Requeue base delay must be positive");
        }
        if reconcile.requeue_max_secs < reconcile.requeue_base_secs {
            result.error(
                "reconcile.requeue_max_secs",
                format!(
                    "Requeue max delay {} is below base delay {}",
                    reconcile.requeue_max_secs, reconcile.requeue_base_secs
                ),
            );
        }
    }

    fn validate_identity(unit: &Unit, result: &mut ValidationResult) {
        let name = unit.name();
        if name.is_empty() {
            result.error("metadata.name", "Unit name cannot be empty");
        } else if !is_valid_name(name) {
            result.error(
                "metadata.name",
                format!(
                    "Unit name '{name}' is invalid. Must be at most {MAX_NAME_LEN} lowercase alphanumeric characters or hyphens, starting and ending with an alphanumeric."
                ),
            );
        }

        if let Some(namespace) = &unit.metadata.namespace
            && !is_valid_name(namespace)
        {
            result.error(
                "metadata.namespace",
                format!("Namespace '{namespace}' is invalid"),
            );
        }
    }

    fn validate_workload(unit: &Unit, result: &mut ValidationResult) {
        let spec = &unit.spec;

        if let Category::Other(value) = &spec.category {
            result.warn(format!(
                "spec.category '{value}' is not Deployment or StatefulSet; a stateful workload will be used"
            ));
        }

        if spec.replicas.is_some_and(|r| r < 0) {
            result.error("spec.replicas", "Replicas cannot be negative");
        }

        let selector = spec.selector.match_labels.clone().unwrap_or_default();
        let has_expressions = spec
            .selector
            .match_expressions
            .as_ref()
            .is_some_and(|e| !e.is_empty());

        if selector.is_empty() && !has_expressions {
            result.error("spec.selector", "Selector must match at least one label");
        }

        let template_labels: BTreeMap<String, String> = spec
            .template
            .metadata
            .as_ref()
            .and_then(|m| m.labels.clone())
            .unwrap_or_default();

        let unmatched: Vec<&str> = selector
            .iter()
            .filter(|(k, v)| template_labels.get(*k) != Some(*v))
            .map(|(k, _)| k.as_str())
            .collect();
        if !unmatched.is_empty() {
            result.error(
                "spec.template.metadata.labels",
                format!("Template labels do not satisfy selector keys: {}", unmatched.join(", ")),
            );
        }

        let has_containers = spec
            .template
            .spec
            .as_ref()
            .is_some_and(|s| !s.containers.is_empty());
        if !has_containers {
            result.error("spec.template.spec.containers", "Pod template needs at least one container");
        }
    }

    fn validate_relations(unit: &Unit, result: &mut ValidationResult) {
        let relations = &unit.spec.relation_resource;

        if let Some(service) = &relations.service {
            let has_ports = service.ports.as_ref().is_some_and(|p| !p.is_empty());
            let headless = service.cluster_ip.as_deref() == Some("None");
            if !has_ports && !headless {
                result.error(
                    "spec.relationResource.service.ports",
                    "Service needs at least one port unless it is headless",
                );
            }
        }

        if let Some(pvc) = &relations.pvc {
            let has_storage = pvc
                .resources
                .as_ref()
                .and_then(|r| r.requests.as_ref())
                .is_some_and(|r| r.contains_key("storage"));
            if !has_storage {
                result.warn("spec.relationResource.pvc requests no storage; the platform default applies");
            }
        }

        if relations.ingress.is_some() {
            result.warn("spec.relationResource.ingress is reserved and will be ignored");
        }
    }
}

/// Checks a DNS-1123 label: lowercase alphanumerics and hyphens, starting
/// and ending with an alphanumeric.
fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }

    let valid_char = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();

    if !name.chars().all(|c| valid_char(c) || c == '-') {
        return false;
    }

    name.starts_with(valid_char) && name.ends_with(valid_char)
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn into_outcome(self, subject: &str) -> Result<Self> {
        if self.errors.is_empty() {
            debug!("{subject} validation passed with {} warnings", self.warnings.len());
            return Ok(self);
        }

        let first = &self.errors[0];

        Err(ConfigError::ValidationError {
            message: if self.errors.len() > 1 {
                format!("{} (and {} more)", first.message, self.errors.len() - 1)
            } else {
                first.message.clone()
            },
            field: Some(first.field.clone()),
        }
        .into())
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{RelationResource, UnitSpec};
    use crate::error::ControllerError;
    use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec, ServiceSpec};
    use k8s_openapi::api::networking::v1::IngressSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

    fn labels() -> BTreeMap<String, String> {
        BTreeMap::from([(String::from("app"), String::from("web"))])
    }

    fn valid_unit() -> Unit {
        Unit::new(
            "shop",
            "web",
            UnitSpec {
                category: Category::Deployment,
                replicas: Some(2),
                selector: LabelSelector {
                    match_labels: Some(labels()),
                    ..LabelSelector::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels()),
                        ..ObjectMeta::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: String::from("web"),
                            image: Some(String::from("nginx:1.27")),
                            ..Container::default()
                        }],
                        ..PodSpec::default()
                    }),
                },
                relation_resource: RelationResource::default(),
            },
        )
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("web"));
        assert!(is_valid_name("my-unit-123"));
        assert!(is_valid_name("1st"));
        assert!(is_valid_name("a"));
    }

    #[test]
    fn test_invalid_name() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("Web")); // uppercase
        assert!(!is_valid_name("-web")); // starts with hyphen
        assert!(!is_valid_name("web-")); // ends with hyphen
        assert!(!is_valid_name("web_db")); // underscore
        assert!(!is_valid_name(&"a".repeat(64))); // too long
    }

    #[test]
    fn test_valid_unit_passes() {
        let result = ConfigValidator::new()
            .validate_unit(&valid_unit())
            .expect("valid unit");
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_unit_errors_are_collected() {
        let mut unit = valid_unit();
        unit.spec.replicas = Some(-1);
        unit.spec.template.metadata = None;
        unit.spec.relation_resource.service = Some(ServiceSpec::default());

        let mut result = ValidationResult::default();
        ConfigValidator::validate_workload(&unit, &mut result);
        ConfigValidator::validate_relations(&unit, &mut result);

        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "spec.replicas",
                "spec.template.metadata.labels",
                "spec.relationResource.service.ports",
            ]
        );

        let err = ConfigValidator::new().validate_unit(&unit).expect_err("invalid unit");
        assert!(matches!(
            err,
            ControllerError::Config(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_unit_warnings_do_not_fail() {
        let mut unit = valid_unit();
        unit.spec.category = Category::from("Batch");
        unit.spec.relation_resource.ingress = Some(IngressSpec::default());

        let result = ConfigValidator::new().validate_unit(&unit).expect("warnings only");
        assert_eq!(result.warning_count(), 2);
    }

    #[test]
    fn test_config_checks() {
        let mut config = ControllerConfig::default();
        let result = ConfigValidator::new().validate(&config).expect("valid config");
        assert!(result.is_valid());

        config.cluster.kubeconfig = Some(std::path::PathBuf::from("/nonexistent/kubeconfig"));
        config.reconcile.requeue_max_secs = 1;
        let mut result = ValidationResult::default();
        ConfigValidator::validate_cluster(&config.cluster, &mut result);
        ConfigValidator::validate_reconcile(&config.reconcile, &mut result);
        assert_eq!(result.error_count(), 2);
    }
}
