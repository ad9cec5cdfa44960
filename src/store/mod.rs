//! Object store access for the controller.
//!
//! This module defines the interface the reconciler uses to read and write
//! cluster objects, plus two backends: an in-process store used for dry runs
//! and tests, and a `kube` client for a live cluster.

mod backend;
mod cluster;
mod memory;
mod object;

pub use backend::ObjectStore;
pub use cluster::ClusterStore;
pub use memory::{MemoryStore, Verb};
pub use object::ClusterObject;
