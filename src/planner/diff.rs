//! Status comparison.
//!
//! The engine only writes status when the freshly aggregated status differs
//! from the stored one. This module works out which sections moved so the
//! decision and its log line come from the same place.

use std::fmt;

use crate::api::UnitStatus;

/// How one status section changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionChange {
    /// The section was absent and is now reported.
    Added,
    /// The section's contents changed.
    Changed,
    /// The section was reported and is now absent.
    Removed,
}

/// Difference between a stored and a candidate status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusDiff {
    /// Changed sections by wire name, in declaration order.
    pub sections: Vec<(&'static str, SectionChange)>,
}

impl StatusDiff {
    /// Compares `stored` against `candidate`, section by section.
    #[must_use]
    pub fn compute(stored: &UnitStatus, candidate: &UnitStatus) -> Self {
        let mut sections = Vec::new();

        push_change(&mut sections, "deployment", &stored.deployment, &candidate.deployment);
        push_change(&mut sections, "statefulSet", &stored.stateful_set, &candidate.stateful_set);
        push_change(&mut sections, "service", &stored.service, &candidate.service);
        push_change(&mut sections, "pvc", &stored.pvc, &candidate.pvc);

        Self { sections }
    }

    /// Returns true if a status write is needed.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        !self.sections.is_empty()
    }

    /// Returns the names of the changed sections.
    #[must_use]
    pub fn changed_sections(&self) -> Vec<&'static str> {
        self.sections.iter().map(|(name, _)| *name).collect()
    }
}

fn push_change<T: PartialEq>(
    sections: &mut Vec<(&'static str, SectionChange)>,
    name: &'static str,
    stored: &Option<T>,
    candidate: &Option<T>,
) {
    let change = match (stored, candidate) {
        (None, Some(_)) => SectionChange::Added,
        (Some(_), None) => SectionChange::Removed,
        (Some(old), Some(new)) if old != new => SectionChange::Changed,
        _ => return,
    };
    sections.push((name, change));
}

impl fmt::Display for SectionChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Added => "added",
            Self::Changed => "changed",
            Self::Removed => "removed",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for StatusDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sections.is_empty() {
            return write!(f, "status unchanged");
        }
        for (i, (name, change)) in self.sections.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name} {change}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{PvcStatusSummary, WorkloadStatusSummary};

    fn workload(ready: i32) -> WorkloadStatusSummary {
        WorkloadStatusSummary {
            replicas: 3,
            ready_replicas: ready,
            ..WorkloadStatusSummary::default()
        }
    }

    #[test]
    fn test_equal_status_has_no_changes() {
        let status = UnitStatus {
            deployment: Some(workload(3)),
            ..UnitStatus::default()
        };

        let diff = StatusDiff::compute(&status, &status.clone());
        assert!(!diff.has_changes());
        assert_eq!(diff.to_string(), "status unchanged");
    }

    #[test]
    fn test_reports_each_section() {
        let stored = UnitStatus {
            deployment: Some(workload(1)),
            pvc: Some(PvcStatusSummary::default()),
            ..UnitStatus::default()
        };
        let candidate = UnitStatus {
            deployment: Some(workload(3)),
            stateful_set: Some(workload(0)),
            ..UnitStatus::default()
        };

        let diff = StatusDiff::compute(&stored, &candidate);

        assert!(diff.has_changes());
        assert_eq!(
            diff.sections,
            vec![
                ("deployment", SectionChange::Changed),
                ("statefulSet", SectionChange::Added),
                ("pvc", SectionChange::Removed),
            ]
        );
        assert_eq!(diff.changed_sections(), vec!["deployment", "statefulSet", "pvc"]);
    }
}
