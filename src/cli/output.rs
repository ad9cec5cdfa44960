//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::api::{Unit, UnitStatus};
use crate::config::ValidationResult;
use crate::planner::ResourcePlan;
use crate::reconciler::{PassOutcome, PassReport, StatusWrite};
use crate::resources::{ApplyAction, SpecHasher};
use crate::worker::Action;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Planned child row for table display.
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Spec hash")]
    hash: String,
}

/// Per-child pass row for table display.
#[derive(Tabled)]
struct ChildRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Apply")]
    apply: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Status section row for table display.
#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Section")]
    section: String,
    #[tabled(rename = "Observed")]
    observed: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a plan; `rendered` holds the desired objects in plan order.
    #[must_use]
    pub fn format_plan(&self, plan: &ResourcePlan, rendered: &[serde_json::Value]) -> String {
        let hashes: Vec<String> = plan
            .resources
            .iter()
            .map(|r| r.spec_hash().unwrap_or_default())
            .collect();

        match self.format {
            OutputFormat::Json => {
                let children: Vec<PlanChildJson<'_>> = plan
                    .resources
                    .iter()
                    .zip(&hashes)
                    .zip(rendered)
                    .map(|((r, hash), object)| PlanChildJson {
                        kind: r.kind().as_str(),
                        spec_hash: hash,
                        object,
                    })
                    .collect();
                to_json(&PlanJson {
                    unit: plan.unit.to_string(),
                    children,
                })
            }
            OutputFormat::Text => {
                let rows: Vec<PlanRow> = plan
                    .resources
                    .iter()
                    .zip(&hashes)
                    .enumerate()
                    .map(|(i, (r, hash))| PlanRow {
                        index: i + 1,
                        kind: r.kind().to_string(),
                        name: plan.unit.to_string(),
                        hash: SpecHasher::short_hash(hash),
                    })
                    .collect();

                let mut output = format!(
                    "\n{} Plan for unit {}\n\n",
                    "▶".cyan(),
                    plan.unit.to_string().bold()
                );
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
                output
            }
        }
    }

    /// Formats the outcome of a pass together with the queue decision.
    #[must_use]
    pub fn format_outcome(&self, outcome: &PassOutcome, action: Action) -> String {
        match self.format {
            OutputFormat::Json => to_json(&OutcomeJson {
                outcome: outcome_label(outcome),
                error: match outcome {
                    PassOutcome::Recoverable { error, .. } | PassOutcome::Fatal { error } => {
                        Some(error.to_string())
                    }
                    PassOutcome::Absent | PassOutcome::Success(_) => None,
                },
                requeue_after_secs: match action {
                    Action::Requeue(delay) => Some(delay.as_secs()),
                    Action::Done => None,
                },
                report: outcome.report(),
            }),
            OutputFormat::Text => {
                let headline = match outcome {
                    PassOutcome::Absent => {
                        format!("{} Unit not found or being deleted; nothing to do", "•".dimmed())
                    }
                    PassOutcome::Success(_) => format!("{} Reconcile successful", "✓".green()),
                    PassOutcome::Recoverable { error, .. } => {
                        format!("{} Reconcile failed: {error}", "✗".red())
                    }
                    PassOutcome::Fatal { error } => {
                        format!("{} Reconcile cannot proceed: {error}", "✗".red().bold())
                    }
                };

                let mut output = format!("{headline}\n");
                if let Some(report) = outcome.report() {
                    output.push('\n');
                    output.push_str(&Self::format_report_text(report));
                }
                if let Action::Requeue(delay) = action {
                    let _ = writeln!(output, "\n{} Retry in {}s", "↻".yellow(), delay.as_secs());
                }
                output
            }
        }
    }

    fn format_report_text(report: &PassReport) -> String {
        let rows: Vec<ChildRow> = report
            .applied
            .iter()
            .map(|applied| {
                let status = report
                    .status
                    .iter()
                    .find(|s| s.kind == applied.kind)
                    .map_or_else(String::new, |s| match &s.result {
                        Ok(()) => "ok".green().to_string(),
                        Err(e) => Self::truncate(e, 48).red().to_string(),
                    });

                ChildRow {
                    kind: applied.kind.to_string(),
                    apply: match &applied.result {
                        Ok(action) => Self::format_action(*action),
                        Err(e) => Self::truncate(e, 48).red().to_string(),
                    },
                    status,
                }
            })
            .collect();

        let mut output = Table::new(rows).to_string();
        output.push('\n');

        let write = match &report.status_write {
            StatusWrite::Skipped => "unchanged".dimmed().to_string(),
            StatusWrite::Written => format!("written ({})", report.changed_sections.join(", "))
                .green()
                .to_string(),
            StatusWrite::Failed(reason) => format!("failed: {reason}").red().to_string(),
        };
        let _ = writeln!(output, "\nStatus: {write}");
        let _ = writeln!(
            output,
            "Pass:   {} at {}",
            report.pass_id,
            report.started_at.format("%Y-%m-%d %H:%M:%S")
        );
        output
    }

    /// Formats the status stored on a Unit.
    #[must_use]
    pub fn format_status(&self, unit: &Unit) -> String {
        match self.format {
            OutputFormat::Json => to_json(&unit.status),
            OutputFormat::Text => {
                let mut output = format!(
                    "\n{} Unit {} ({})\n\n",
                    "▶".cyan(),
                    unit.key().to_string().bold(),
                    unit.spec.category
                );

                let rows = Self::status_rows(&unit.status);
                if rows.is_empty() {
                    output.push_str("   No status reported yet.\n");
                    return output;
                }

                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
                output
            }
        }
    }

    fn status_rows(status: &UnitStatus) -> Vec<StatusRow> {
        let mut rows = Vec::new();

        let workloads = [
            ("deployment", &status.deployment),
            ("statefulSet", &status.stateful_set),
        ];
        for (section, workload) in workloads {
            if let Some(w) = workload {
                let ready = if w.ready_replicas >= w.replicas {
                    format!("{}/{} ready", w.ready_replicas, w.replicas).green()
                } else {
                    format!("{}/{} ready", w.ready_replicas, w.replicas).yellow()
                };
                rows.push(StatusRow {
                    section: section.to_string(),
                    observed: format!(
                        "{ready}, {} updated, {} available",
                        w.updated_replicas, w.available_replicas
                    ),
                });
            }
        }

        if let Some(s) = &status.service {
            rows.push(StatusRow {
                section: String::from("service"),
                observed: format!(
                    "{} {} [{}]",
                    s.service_type.as_deref().unwrap_or("ClusterIP"),
                    s.cluster_ip.as_deref().unwrap_or("-"),
                    s.ports.join(", ")
                ),
            });
        }

        if let Some(p) = &status.pvc {
            let capacity = p.capacity.get("storage").map_or("-", String::as_str);
            rows.push(StatusRow {
                section: String::from("pvc"),
                observed: format!(
                    "{} {} ({capacity})",
                    p.phase.as_deref().unwrap_or("Pending"),
                    p.volume_name.as_deref().unwrap_or("-")
                ),
            });
        }

        rows
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(
        &self,
        subject: &str,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => to_json(&ValidationJson {
                subject,
                valid: result.is_valid(),
                errors: result.errors.iter().map(ToString::to_string).collect(),
                warnings: &result.warnings,
            }),
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} {subject} is valid\n", "✓".green())
                } else {
                    format!("{} {subject} has {} errors\n", "✗".red(), result.error_count())
                };

                for error in &result.errors {
                    let _ = writeln!(output, "   - {error}");
                }

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output
            }
        }
    }

    /// Formats an apply action with color.
    fn format_action(action: ApplyAction) -> String {
        match action {
            ApplyAction::Created => "+created".green().to_string(),
            ApplyAction::Updated => "~updated".yellow().to_string(),
            ApplyAction::Unchanged => "unchanged".dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

const fn outcome_label(outcome: &PassOutcome) -> &'static str {
    match outcome {
        PassOutcome::Absent => "absent",
        PassOutcome::Success(_) => "success",
        PassOutcome::Recoverable { .. } => "recoverable",
        PassOutcome::Fatal { .. } => "fatal",
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

// JSON serialization helpers

#[derive(Serialize)]
struct PlanJson<'a> {
    unit: String,
    children: Vec<PlanChildJson<'a>>,
}

#[derive(Serialize)]
struct PlanChildJson<'a> {
    kind: &'static str,
    spec_hash: &'a str,
    object: &'a serde_json::Value,
}

#[derive(Serialize)]
struct OutcomeJson<'a> {
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    requeue_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a PassReport>,
}

#[derive(Serialize)]
struct ValidationJson<'a> {
    subject: &'a str,
    valid: bool,
    errors: Vec<String>,
    warnings: &'a [String],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{PvcStatusSummary, UnitSpec, WorkloadStatusSummary};
    use crate::planner::plan_own_resources;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("abcdefghij", 6), "abc...");
    }

    #[test]
    fn test_plan_json_lists_children() {
        let unit = Unit::new("shop", "db", UnitSpec::default());
        let plan = plan_own_resources(&unit);
        let rendered = vec![serde_json::json!({ "kind": "StatefulSet" })];

        let json = OutputFormatter::new(OutputFormat::Json).format_plan(&plan, &rendered);
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");

        assert_eq!(value["unit"], "shop/db");
        assert_eq!(value["children"][0]["kind"], "StatefulSet");
        assert_eq!(value["children"][0]["spec_hash"].as_str().map(str::len), Some(64));
    }

    #[test]
    fn test_status_rows_cover_reported_sections() {
        let status = UnitStatus {
            deployment: Some(WorkloadStatusSummary {
                replicas: 3,
                ready_replicas: 3,
                ..WorkloadStatusSummary::default()
            }),
            pvc: Some(PvcStatusSummary {
                phase: Some(String::from("Bound")),
                ..PvcStatusSummary::default()
            }),
            ..UnitStatus::default()
        };

        let rows = OutputFormatter::status_rows(&status);
        let sections: Vec<&str> = rows.iter().map(|r| r.section.as_str()).collect();
        assert_eq!(sections, vec!["deployment", "pvc"]);
        assert!(rows[1].observed.starts_with("Bound"));
    }

    #[test]
    fn test_absent_outcome_json() {
        let json = OutputFormatter::new(OutputFormat::Json)
            .format_outcome(&PassOutcome::Absent, Action::Done);
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value, serde_json::json!({ "outcome": "absent" }));
    }
}
