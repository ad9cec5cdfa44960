//! Data model for the `Unit` custom resource.
//!
//! This module defines the user-authored desired state (`UnitSpec`), the
//! controller-written observed state (`UnitStatus`) and the namespaced
//! identity used to address objects in the cluster.

mod key;
mod status;
mod unit;

pub use key::{ObjectKey, DEFAULT_NAMESPACE};
pub use status::{PvcStatusSummary, ServiceStatusSummary, UnitStatus, WorkloadStatusSummary};
pub use unit::{
    Category, RelationResource, Unit, UnitSpec, UNIT_GROUP, UNIT_KIND, UNIT_PLURAL,
    UNIT_VERSION,
};
