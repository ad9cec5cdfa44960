//! Configuration module for the Unit controller.
//!
//! This module handles all configuration-related functionality:
//! - Loading `unitctl.yaml` with `.env` and environment overrides
//! - Choosing the kubeconfig and context the cluster client uses
//! - Validating controller settings and Unit manifests

mod parser;
mod spec;
mod validator;

pub use parser::{find_config_file, load_unit_manifest, ConfigParser};
pub use spec::{ClusterConfig, ControllerConfig, ReconcileConfig};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
