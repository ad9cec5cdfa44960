// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Unit Controller
//!
//! A reconcile engine for the `Unit` custom resource (`custom.hmlss.ml/v1`).
//!
//! ## Overview
//!
//! A `Unit` describes one logical application: a workload plus an optional
//! network endpoint and storage claim. The controller keeps those children in
//! line with the Unit and reports their observed state back on it:
//!
//! - A `Deployment` when the category is `Deployment`, a `StatefulSet` otherwise
//! - A `Service` when `relationResource.service` is set
//! - A `PersistentVolumeClaim` when `relationResource.pvc` is set
//!
//! ## Architecture
//!
//! Every reconcile pass is stateless:
//!
//! 1. **Plan**: Derive the child set from the Unit's spec
//! 2. **Apply**: Create or update each child, best-effort
//! 3. **Status**: Aggregate child status and write it only when it changed
//!
//! ## Modules
//!
//! - [`api`]: The `Unit` schema and object identities
//! - [`store`]: Object store interface, in-memory and cluster backends
//! - [`resources`]: Child resources and create-or-update logic
//! - [`planner`]: Child set planning and status comparison
//! - [`reconciler`]: The reconcile pass
//! - [`worker`]: Panic isolation and requeue decisions
//! - [`config`]: Configuration loading and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! apiVersion: custom.hmlss.ml/v1
//! kind: Unit
//! metadata:
//!   name: web
//! spec:
//!   category: Deployment
//!   replicas: 3
//!   selector:
//!     matchLabels:
//!       app: web
//!   template:
//!     metadata:
//!       labels:
//!         app: web
//!     spec:
//!       containers:
//!         - name: web
//!           image: nginx:1.27
//!   relationResource:
//!     service:
//!       ports:
//!         - port: 80
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod planner;
pub mod reconciler;
pub mod resources;
pub mod store;
pub mod worker;

// ============================================================================
// Re-exports
// ============================================================================

pub use api::{ObjectKey, Unit, UnitSpec, UnitStatus};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, ControllerConfig};
pub use error::{ControllerError, Result};
pub use planner::{plan_own_resources, ResourcePlan, StatusDiff};
pub use reconciler::{PassOutcome, PassReport, Reconciler};
pub use resources::{ApplyAction, OwnResource};
pub use store::{ClusterStore, MemoryStore, ObjectStore};
pub use worker::{Action, RequeuePolicy, Worker};
