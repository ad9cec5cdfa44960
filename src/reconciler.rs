//! Reconciler for Unit objects.
//!
//! One pass reads the Unit, plans its children, applies every child
//! best-effort, aggregates child status into a copy of the Unit and writes it
//! back only when it changed. Passes are stateless: everything they act on is
//! read from the store during the pass.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::api::{ObjectKey, Unit, UnitStatus};
use crate::error::{ControllerError, ReconcileError, StoreError};
use crate::planner::{plan_own_resources, StatusDiff};
use crate::resources::{ApplyAction, ChildOwner, ResourceKind};
use crate::store::ObjectStore;

/// Reconciliation engine for Units.
#[derive(Debug)]
pub struct Reconciler<S: ObjectStore> {
    /// Object store handle.
    store: Arc<S>,
    /// Parent span for every pass.
    span: Span,
}

/// Result of one child operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildOutcome<T> {
    /// Child kind.
    pub kind: ResourceKind,
    /// What happened, or why it failed.
    pub result: Result<T, String>,
}

/// What happened to the Unit's status at the end of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum StatusWrite {
    /// Aggregated status equals the stored one; nothing was written.
    Skipped,
    /// Status was written.
    Written,
    /// The write was rejected.
    Failed(String),
}

/// Everything a completed pass did.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    /// Unit the pass ran for.
    pub unit: ObjectKey,
    /// Pass identifier, also recorded on the pass span.
    pub pass_id: Uuid,
    /// When the pass started.
    pub started_at: DateTime<Utc>,
    /// Planned child kinds in apply order.
    pub planned: Vec<ResourceKind>,
    /// Apply outcome per planned child.
    pub applied: Vec<ChildOutcome<ApplyAction>>,
    /// Status extraction outcome per planned child.
    pub status: Vec<ChildOutcome<()>>,
    /// Status write result.
    pub status_write: StatusWrite,
    /// Status sections that differed from the stored status.
    pub changed_sections: Vec<&'static str>,
    /// Longest retry delay suggested by any failed store call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Outcome of one pass.
#[derive(Debug)]
pub enum PassOutcome {
    /// The Unit no longer exists or is being deleted.
    Absent,
    /// Every apply and status extraction succeeded.
    Success(PassReport),
    /// The pass failed in a way a later pass may fix.
    Recoverable {
        /// Partial report, when the pass got far enough to produce one.
        report: Option<PassReport>,
        /// Aggregated failure.
        error: ControllerError,
    },
    /// The Unit cannot be reconciled until it changes.
    Fatal {
        /// Cause.
        error: ControllerError,
    },
}

impl<S: ObjectStore> Reconciler<S> {
    /// Creates a reconciler over `store`; every pass span is a child of `span`.
    #[must_use]
    pub const fn new(store: Arc<S>, span: Span) -> Self {
        Self { store, span }
    }

    /// Returns the store this reconciler writes to.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Runs one reconcile pass for the Unit identified by `key`.
    pub async fn reconcile(&self, key: &ObjectKey) -> PassOutcome {
        let pass_id = Uuid::new_v4();
        let span = info_span!(parent: &self.span, "reconcile", unit = %key, pass = %pass_id);
        self.run_pass(key, pass_id).instrument(span).await
    }

    async fn run_pass(&self, key: &ObjectKey, pass_id: Uuid) -> PassOutcome {
        let started_at = Utc::now();
        let store = self.store.as_ref();

        let unit: Unit = match store.get(key).await {
            Ok(Some(unit)) => unit,
            Ok(None) => {
                debug!("Unit {key} not found, nothing to do");
                return PassOutcome::Absent;
            }
            Err(e @ ControllerError::Store(StoreError::Decode { .. })) => {
                error!("Unit {key} cannot be decoded: {e}");
                return PassOutcome::Fatal { error: e };
            }
            Err(e) => {
                warn!("Failed to read Unit {key}: {e}");
                return PassOutcome::Recoverable {
                    report: None,
                    error: e,
                };
            }
        };

        if unit.is_deleting() {
            debug!("Unit {key} is being deleted, children are left to garbage collection");
            return PassOutcome::Absent;
        }

        let owner = match ChildOwner::for_unit(&unit) {
            Ok(owner) => owner,
            Err(e) => {
                error!("{e}");
                return PassOutcome::Fatal { error: e.into() };
            }
        };

        let plan = plan_own_resources(&unit);
        debug!("{plan}");

        let mut retry_after_secs = None;
        let mut note_retry = |e: &ControllerError| {
            retry_after_secs = retry_after_secs.max(e.retry_delay_secs());
        };

        // Apply phase: every child is attempted regardless of sibling failures.
        let mut applied = Vec::with_capacity(plan.len());
        for resource in &plan.resources {
            let kind = resource.kind();
            let result = match resource.apply(&owner, store).await {
                Ok(action) => {
                    debug!("{kind} {key}: {action}");
                    Ok(action)
                }
                Err(e) => {
                    error!("Failed to apply {kind} {key}: {e}");
                    note_retry(&e);
                    Err(e.to_string())
                }
            };
            applied.push(ChildOutcome { kind, result });
        }

        // Status phase: reads happen strictly after all applies.
        let mut candidate = unit.clone();
        let mut status = Vec::with_capacity(plan.len());
        for resource in &plan.resources {
            let kind = resource.kind();
            let result = match resource.update_status(&candidate, store).await {
                Ok(next) => {
                    candidate = next;
                    Ok(())
                }
                Err(e) => {
                    error!("Failed to read status of {kind} {key}: {e}");
                    note_retry(&e);
                    Err(e.to_string())
                }
            };
            status.push(ChildOutcome { kind, result });
        }

        let planned = plan.kinds();
        clear_unplanned(&mut candidate.status, &planned);

        let diff = StatusDiff::compute(&unit.status, &candidate.status);
        let status_write = if diff.has_changes() {
            debug!("Status of Unit {key}: {diff}");
            match store.update_status(&candidate).await {
                Ok(_) => StatusWrite::Written,
                Err(e) => {
                    error!("Failed to write status of Unit {key}: {e}");
                    note_retry(&e);
                    StatusWrite::Failed(e.to_string())
                }
            }
        } else {
            StatusWrite::Skipped
        };

        let report = PassReport {
            unit: key.clone(),
            pass_id,
            started_at,
            planned,
            applied,
            status,
            status_write,
            changed_sections: diff.changed_sections(),
            retry_after_secs,
        };

        let failed = report.failed_count();
        if let StatusWrite::Failed(reason) = &report.status_write {
            info!("Reconcile of Unit {key} failed: status write rejected");
            let error = ReconcileError::StatusWriteFailed {
                key: key.to_string(),
                reason: reason.clone(),
            };
            return PassOutcome::Recoverable {
                report: Some(report),
                error: error.into(),
            };
        }

        if failed > 0 {
            info!(
                "Reconcile of Unit {key} failed: {failed} of {} operations failed",
                report.total_count()
            );
            let error = ReconcileError::PassFailed {
                key: key.to_string(),
                failed,
                total: report.total_count(),
            };
            return PassOutcome::Recoverable {
                report: Some(report),
                error: error.into(),
            };
        }

        info!(
            "Reconciled Unit {key}: {} children, status {}",
            report.planned.len(),
            report.status_write
        );
        PassOutcome::Success(report)
    }
}

/// Drops the status sections of child kinds the Unit no longer plans.
fn clear_unplanned(status: &mut UnitStatus, planned: &[ResourceKind]) {
    let dropped = |kind: ResourceKind| !planned.contains(&kind);

    if dropped(ResourceKind::Deployment) {
        status.deployment = None;
    }
    if dropped(ResourceKind::StatefulSet) {
        status.stateful_set = None;
    }
    if dropped(ResourceKind::Service) {
        status.service = None;
    }
    if dropped(ResourceKind::PersistentVolumeClaim) {
        status.pvc = None;
    }
}

impl PassReport {
    /// Returns the number of failed apply and status operations.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        let applies = self.applied.iter().filter(|o| o.result.is_err()).count();
        let statuses = self.status.iter().filter(|o| o.result.is_err()).count();
        applies + statuses
    }

    /// Returns the number of attempted apply and status operations.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.applied.len() + self.status.len()
    }

    /// Returns the apply outcome for `kind`, if it was planned.
    #[must_use]
    pub fn apply_result(&self, kind: ResourceKind) -> Option<&Result<ApplyAction, String>> {
        self.applied.iter().find(|o| o.kind == kind).map(|o| &o.result)
    }
}

impl PassOutcome {
    /// Returns the pass report, if the pass produced one.
    #[must_use]
    pub const fn report(&self) -> Option<&PassReport> {
        match self {
            Self::Success(report) | Self::Recoverable { report: Some(report), .. } => Some(report),
            _ => None,
        }
    }

    /// Returns true if the pass converged or had nothing to do.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Absent)
    }

    /// Returns the retry delay the failure asks for, if any.
    #[must_use]
    pub fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Recoverable { report, error } => error
                .retry_delay_secs()
                .or_else(|| report.as_ref().and_then(|r| r.retry_after_secs)),
            _ => None,
        }
    }
}

impl fmt::Display for StatusWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => write!(f, "unchanged"),
            Self::Written => write!(f, "written"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

impl fmt::Display for PassOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Success(_) => write!(f, "success"),
            Self::Recoverable { error, .. } => write!(f, "recoverable: {error}"),
            Self::Fatal { error } => write!(f, "fatal: {error}"),
        }
    }
}
