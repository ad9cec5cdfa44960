//! Cluster object store backend.
//!
//! Reads and writes objects through `kube::Api`, using whichever cluster the
//! configured kubeconfig (or the pod's service account) points at.

use async_trait::async_trait;
use kube::api::{Api, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::fmt::Display;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace};

use crate::api::ObjectKey;
use crate::config::ClusterConfig;
use crate::error::{ConfigError, ControllerError, Result, StoreError};

use super::backend::ObjectStore;
use super::object::ClusterObject;

/// Backoff used for throttled requests, in seconds.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Object store backed by a cluster API server.
#[derive(Clone)]
pub struct ClusterStore {
    /// Shared client; cloning it shares the connection pool.
    client: Client,
    /// Field manager recorded on writes.
    field_manager: String,
}

impl std::fmt::Debug for ClusterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterStore")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

impl ClusterStore {
    /// Connects using the cluster section of the controller configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no usable kubeconfig or in-cluster environment is
    /// found, the selected context does not exist, or the client cannot be
    /// built.
    pub async fn connect(config: &ClusterConfig) -> Result<Self> {
        let mut client_config = if config.is_inferred() {
            kube::Config::infer()
                .await
                .map_err(|e| kubeconfig_error(e, None))?
        } else {
            let options = KubeConfigOptions {
                context: config.context.clone(),
                ..KubeConfigOptions::default()
            };

            match &config.kubeconfig {
                Some(path) => {
                    let kubeconfig = Kubeconfig::read_from(path)
                        .map_err(|e| kubeconfig_error(e, Some(path.as_path())))?;
                    kube::Config::from_custom_kubeconfig(kubeconfig, &options)
                        .await
                        .map_err(|e| kubeconfig_error(e, Some(path.as_path())))?
                }
                None => kube::Config::from_kubeconfig(&options)
                    .await
                    .map_err(|e| kubeconfig_error(e, None))?,
            }
        };

        client_config.read_timeout = Some(Duration::from_secs(config.timeout_secs));
        debug!("Connecting to {}", client_config.cluster_url);

        let client = Client::try_from(client_config).map_err(|e| {
            ControllerError::Store(StoreError::network(format!(
                "Failed to create cluster client: {e}"
            )))
        })?;

        Ok(Self::new(client, &config.field_manager))
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn new(client: Client, field_manager: &str) -> Self {
        Self {
            client,
            field_manager: field_manager.to_string(),
        }
    }

    fn api<K: ClusterObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..PostParams::default()
        }
    }
}

fn kubeconfig_error(err: impl Display, location: Option<&Path>) -> ControllerError {
    ControllerError::Config(ConfigError::ParseError {
        message: format!("Failed to load cluster configuration: {err}"),
        location: location.map(|p| p.display().to_string()),
    })
}

fn object_key<K: ClusterObject>(object: &K) -> Result<ObjectKey> {
    object.key().ok_or_else(|| {
        ControllerError::Store(StoreError::Encode {
            kind: K::KIND.to_string(),
            message: String::from("object has no name"),
        })
    })
}

/// Maps a client failure on `key` to a store error.
fn map_error<K: ClusterObject>(err: kube::Error, key: &ObjectKey) -> ControllerError {
    let mapped = match err {
        kube::Error::Api(response) => {
            debug!(
                "{} {key} failed with {} ({}): {}",
                K::KIND,
                response.code,
                response.reason,
                response.message
            );

            match response.code {
                404 => StoreError::NotFound {
                    kind: K::KIND.to_string(),
                    key: key.to_string(),
                },
                409 if response.reason == "AlreadyExists" => StoreError::AlreadyExists {
                    kind: K::KIND.to_string(),
                    key: key.to_string(),
                },
                409 => StoreError::Conflict {
                    kind: K::KIND.to_string(),
                    key: key.to_string(),
                    message: response.message,
                },
                401 | 403 => StoreError::Unauthorized {
                    message: response.message,
                },
                429 => StoreError::RateLimited {
                    retry_after_secs: DEFAULT_RETRY_AFTER_SECS,
                },
                code => StoreError::api_error(code, response.message),
            }
        }
        kube::Error::SerdeError(e) => StoreError::Decode {
            kind: K::KIND.to_string(),
            message: e.to_string(),
        },
        other => StoreError::network(other.to_string()),
    };

    ControllerError::Store(mapped)
}

#[async_trait]
impl ObjectStore for ClusterStore {
    async fn get<K: ClusterObject>(&self, key: &ObjectKey) -> Result<Option<K>> {
        trace!("GET {} {key}", K::KIND);

        match self.api::<K>(&key.namespace).get(&key.name).await {
            Ok(object) => Ok(Some(object)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(map_error::<K>(e, key)),
        }
    }

    async fn create<K: ClusterObject>(&self, object: &K) -> Result<K> {
        let key = object_key(object)?;
        trace!("POST {} {key}", K::KIND);

        self.api::<K>(&key.namespace)
            .create(&self.post_params(), object)
            .await
            .map_err(|e| map_error::<K>(e, &key))
    }

    async fn update<K: ClusterObject>(&self, object: &K) -> Result<K> {
        let key = object_key(object)?;
        trace!("PUT {} {key}", K::KIND);

        self.api::<K>(&key.namespace)
            .replace(&key.name, &self.post_params(), object)
            .await
            .map_err(|e| map_error::<K>(e, &key))
    }

    async fn update_status<K: ClusterObject>(&self, object: &K) -> Result<K> {
        let key = object_key(object)?;
        trace!("PUT {} {key} status", K::KIND);

        let body = serde_json::to_vec(object).map_err(|e| {
            ControllerError::Store(StoreError::Encode {
                kind: K::KIND.to_string(),
                message: e.to_string(),
            })
        })?;

        self.api::<K>(&key.namespace)
            .replace_status(&key.name, &self.post_params(), body)
            .await
            .map_err(|e| map_error::<K>(e, &key))
    }

    fn backend_type(&self) -> &'static str {
        "cluster"
    }
}
