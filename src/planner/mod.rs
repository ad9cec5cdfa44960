//! Planning module for reconcile passes.
//!
//! This module turns a Unit's spec into the ordered set of children it should
//! own, and compares aggregated status against what is already stored.

mod diff;
mod plan;

pub use diff::{SectionChange, StatusDiff};
pub use plan::{plan_own_resources, ResourcePlan};
