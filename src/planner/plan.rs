//! Child set construction.

use std::fmt;

use crate::api::{ObjectKey, Unit};
use crate::resources::{OwnDeployment, OwnPvc, OwnResource, OwnService, OwnStatefulSet, ResourceKind};

/// Ordered children planned for one Unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourcePlan {
    /// Unit the plan was built for.
    pub unit: ObjectKey,
    /// Children in apply order: workload, endpoint, claim.
    pub resources: Vec<OwnResource>,
}

/// Plans the children of `unit`.
///
/// Pure and total: exactly one workload, then the endpoint if a service spec
/// is set, then the claim if a claim spec is set. The ingress attachment is
/// reserved and never planned.
#[must_use]
pub fn plan_own_resources(unit: &Unit) -> ResourcePlan {
    let spec = &unit.spec;
    let mut resources = Vec::with_capacity(3);

    if spec.category.is_stateless() {
        resources.push(OwnResource::Deployment(OwnDeployment::from_unit_spec(spec)));
    } else {
        resources.push(OwnResource::StatefulSet(OwnStatefulSet::from_unit_spec(
            spec,
            unit.name(),
        )));
    }

    if let Some(service) = &spec.relation_resource.service {
        resources.push(OwnResource::Service(OwnService::from_relation(
            service,
            &spec.selector,
        )));
    }

    if let Some(pvc) = &spec.relation_resource.pvc {
        resources.push(OwnResource::Pvc(OwnPvc::from_relation(pvc)));
    }

    ResourcePlan {
        unit: unit.key(),
        resources,
    }
}

impl ResourcePlan {
    /// Returns the planned kinds in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.resources.iter().map(OwnResource::kind).collect()
    }

    /// Returns the number of planned children.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if nothing is planned. Never the case for a real Unit.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl fmt::Display for ResourcePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Plan for unit {} ({} children):", self.unit, self.resources.len())?;
        for (i, resource) in self.resources.iter().enumerate() {
            writeln!(f, "  {i}. {} {}", resource.kind(), self.unit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{RelationResource, UnitSpec};
    use k8s_openapi::api::core::v1::{PersistentVolumeClaimSpec, PodTemplateSpec, ServiceSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
    use std::collections::BTreeMap;

    fn labels() -> BTreeMap<String, String> {
        BTreeMap::from([(String::from("app"), String::from("web"))])
    }

    fn unit(name: &str, category: &str, relation: RelationResource) -> Unit {
        Unit::new(
            "default",
            name,
            UnitSpec {
                category: category.into(),
                replicas: Some(3),
                selector: LabelSelector {
                    match_labels: Some(labels()),
                    ..LabelSelector::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels()),
                        ..ObjectMeta::default()
                    }),
                    spec: None,
                },
                relation_resource: relation,
            },
        )
    }

    #[test]
    fn test_stateless_copies_fields_verbatim() {
        let unit = unit("web", "Deployment", RelationResource::default());
        let plan = plan_own_resources(&unit);

        let OwnResource::Deployment(workload) = &plan.resources[0] else {
            panic!("expected stateless workload, got {:?}", plan.kinds());
        };
        assert_eq!(workload.spec.replicas, unit.spec.replicas);
        assert_eq!(workload.spec.selector, unit.spec.selector);
        assert_eq!(workload.spec.template, unit.spec.template);
    }

    #[test]
    fn test_other_categories_are_stateful() {
        for category in ["StatefulSet", "StatefulSet-equivalent", "", "deployment"] {
            let plan = plan_own_resources(&unit("db", category, RelationResource::default()));

            let OwnResource::StatefulSet(workload) = &plan.resources[0] else {
                panic!("category {category:?} planned {:?}", plan.kinds());
            };
            assert_eq!(workload.spec.service_name, "db");
            assert_eq!(workload.spec.replicas, Some(3));
        }
    }

    #[test]
    fn test_attachments_follow_relation_fields() {
        let plan = plan_own_resources(&unit("web", "Deployment", RelationResource::default()));
        assert_eq!(plan.kinds(), vec![ResourceKind::Deployment]);

        let both = RelationResource {
            service: Some(ServiceSpec::default()),
            pvc: Some(PersistentVolumeClaimSpec::default()),
            ingress: None,
        };
        let plan = plan_own_resources(&unit("web", "Deployment", both));
        assert_eq!(
            plan.kinds(),
            vec![
                ResourceKind::Deployment,
                ResourceKind::Service,
                ResourceKind::PersistentVolumeClaim,
            ]
        );
    }

    #[test]
    fn test_ingress_is_never_planned() {
        let relation = RelationResource {
            ingress: Some(Default::default()),
            ..RelationResource::default()
        };
        let plan = plan_own_resources(&unit("web", "Deployment", relation));
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_scenario_web_plan() {
        let relation = RelationResource {
            service: Some(ServiceSpec::default()),
            ..RelationResource::default()
        };
        let plan = plan_own_resources(&unit("web", "Deployment", relation));

        assert_eq!(plan.kinds(), vec![ResourceKind::Deployment, ResourceKind::Service]);
        let OwnResource::Service(service) = &plan.resources[1] else {
            panic!("expected endpoint");
        };
        assert_eq!(service.spec.selector, Some(labels()));
        assert!(plan.to_string().contains("Service default/web"));
    }

    #[test]
    fn test_scenario_db_plan() {
        let relation = RelationResource {
            pvc: Some(PersistentVolumeClaimSpec::default()),
            ..RelationResource::default()
        };
        let plan = plan_own_resources(&unit("db", "StatefulSet-equivalent", relation));

        assert_eq!(
            plan.kinds(),
            vec![ResourceKind::StatefulSet, ResourceKind::PersistentVolumeClaim]
        );
        assert_eq!(plan.unit, ObjectKey::new("default", "db"));
    }

    #[test]
    fn test_plan_is_deterministic() {
        let unit = unit("web", "Deployment", RelationResource::default());
        assert_eq!(plan_own_resources(&unit), plan_own_resources(&unit));
    }
}
