//! Worker boundary around reconcile passes.
//!
//! The worker runs each pass on its own task so a panic inside a pass is
//! contained and reported as a recoverable failure, then turns the outcome
//! into a queue decision with per-Unit exponential backoff.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::api::ObjectKey;
use crate::config::ReconcileConfig;
use crate::error::ReconcileError;
use crate::reconciler::{PassOutcome, Reconciler};
use crate::store::ObjectStore;

/// What the work queue should do with a key after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Forget the key until the next change notification.
    Done,
    /// Run another pass after the delay.
    Requeue(Duration),
}

/// Backoff bounds for failed passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequeuePolicy {
    /// Delay after the first failure.
    pub base: Duration,
    /// Upper bound on any computed delay.
    pub max: Duration,
}

/// Runs passes and decides how to requeue them.
#[derive(Debug)]
pub struct Worker<S: ObjectStore + 'static> {
    /// Shared pass engine.
    reconciler: Arc<Reconciler<S>>,
    /// Backoff bounds.
    policy: RequeuePolicy,
    /// Consecutive failures per Unit.
    failures: Mutex<HashMap<ObjectKey, u32>>,
}

impl RequeuePolicy {
    /// Creates a policy with the given bounds.
    #[must_use]
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Builds the policy from reconcile settings.
    #[must_use]
    pub const fn from_config(config: &ReconcileConfig) -> Self {
        Self::new(
            Duration::from_secs(config.requeue_base_secs),
            Duration::from_secs(config.requeue_max_secs),
        )
    }

    /// Returns the delay after `failures` consecutive failures:
    /// `base * 2^(failures - 1)`, capped at `max`.
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 2_u32.saturating_pow(failures.saturating_sub(1));
        self.base.saturating_mul(factor).min(self.max)
    }
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        Self::from_config(&ReconcileConfig::default())
    }
}

impl<S: ObjectStore + 'static> Worker<S> {
    /// Creates a worker around a reconciler.
    #[must_use]
    pub fn new(reconciler: Arc<Reconciler<S>>, policy: RequeuePolicy) -> Self {
        Self {
            reconciler,
            policy,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Runs one pass for `key` and returns its outcome with the queue action.
    ///
    /// Never panics: a panicking pass is logged and reported as recoverable.
    pub async fn process(&self, key: ObjectKey) -> (PassOutcome, Action) {
        let reconciler = Arc::clone(&self.reconciler);
        let task_key = key.clone();
        let joined = tokio::spawn(async move { reconciler.reconcile(&task_key).await }).await;

        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    e.to_string()
                };
                error!("Reconcile of Unit {key} aborted: {message}");
                PassOutcome::Recoverable {
                    report: None,
                    error: ReconcileError::Panicked {
                        key: key.to_string(),
                        message,
                    }
                    .into(),
                }
            }
        };

        let action = self.decide(&key, &outcome).await;
        debug!("Unit {key}: {action}");
        (outcome, action)
    }

    /// Returns the number of consecutive failures recorded for `key`.
    pub async fn failures(&self, key: &ObjectKey) -> u32 {
        self.failures.lock().await.get(key).copied().unwrap_or_default()
    }

    async fn decide(&self, key: &ObjectKey, outcome: &PassOutcome) -> Action {
        let mut failures = self.failures.lock().await;

        match outcome {
            PassOutcome::Absent | PassOutcome::Success(_) => {
                failures.remove(key);
                Action::Done
            }
            PassOutcome::Recoverable { .. } => {
                let count = failures.entry(key.clone()).or_default();
                *count = count.saturating_add(1);
                let delay = outcome
                    .retry_delay_secs()
                    .map_or_else(|| self.policy.delay(*count), Duration::from_secs);
                Action::Requeue(delay)
            }
            PassOutcome::Fatal { error } => {
                warn!("Unit {key} will not be retried until it changes: {error}");
                failures.remove(key);
                Action::Done
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("non-string panic payload"))
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::Requeue(delay) => write!(f, "requeue in {}s", delay.as_secs()),
        }
    }
}
