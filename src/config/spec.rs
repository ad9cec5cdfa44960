//! Controller configuration types.
//!
//! This module defines the structs that map to `unitctl.yaml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration of the controller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Cluster connection.
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Reconcile loop tuning.
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// Cluster connection settings.
///
/// With neither `kubeconfig` nor `context` set, the client is inferred the
/// usual way: `$KUBECONFIG`, then `~/.kube/config`, then the in-cluster
/// service account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Kubeconfig file to read instead of the inferred one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context to use instead of the current one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Per-request read timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Name recorded as the manager of written fields.
    #[serde(default = "default_field_manager")]
    pub field_manager: String,
}

/// Requeue tuning for failed passes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Delay after the first consecutive failure, in seconds.
    #[serde(default = "default_requeue_base_secs")]
    pub requeue_base_secs: u64,
    /// Upper bound on the backoff delay, in seconds.
    #[serde(default = "default_requeue_max_secs")]
    pub requeue_max_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_field_manager() -> String {
    String::from("unitctl")
}

const fn default_requeue_base_secs() -> u64 {
    5
}

const fn default_requeue_max_secs() -> u64 {
    300
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            timeout_secs: default_timeout_secs(),
            field_manager: default_field_manager(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            requeue_base_secs: default_requeue_base_secs(),
            requeue_max_secs: default_requeue_max_secs(),
        }
    }
}

impl ClusterConfig {
    /// Returns true if the client should be inferred from the environment.
    #[must_use]
    pub const fn is_inferred(&self) -> bool {
        self.kubeconfig.is_none() && self.context.is_none()
    }
}
