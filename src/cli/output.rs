//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::DeliveryConfiguration;
use crate::deliverer::{DeliveryReport, PreparedDelivery};
use crate::planner::{DeliveryTree, Diagnostics, Severity, TaskStatus};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Planned task row for table display.
#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Details")]
    details: String,
}

/// Counts of a validated configuration.
#[derive(serde::Serialize)]
struct ValidationSummary<'a> {
    domains: usize,
    nodes: usize,
    solutions: usize,
    services: usize,
    deliveries: usize,
    diagnostics: &'a Diagnostics,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats collected diagnostics, optionally leaving warnings out.
    #[must_use]
    pub fn format_diagnostics(&self, diagnostics: &Diagnostics, warnings: bool) -> String {
        if self.format == OutputFormat::Json {
            return serde_json::to_string_pretty(diagnostics).unwrap_or_default();
        }

        let mut output = String::new();
        for diagnostic in diagnostics {
            match diagnostic.severity {
                Severity::Error => {
                    let _ = writeln!(output, "{} {}", "error:".red().bold(), diagnostic.message);
                }
                Severity::Warning if warnings => {
                    let _ = writeln!(output, "{} {}", "warn:".yellow().bold(), diagnostic.message);
                }
                Severity::Warning => {}
            }
        }
        output
    }

    /// Formats the tasks of a prepared delivery.
    #[must_use]
    pub fn format_plan(&self, prepared: &PreparedDelivery) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(prepared).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(prepared),
        }
    }

    fn format_plan_text(prepared: &PreparedDelivery) -> String {
        if prepared.task_lists.is_empty() {
            return format!("{} Nothing to deliver for '{}'.\n", "✓".green(), prepared.domain);
        }

        let rows: Vec<TaskRow> = prepared
            .task_lists
            .iter()
            .flat_map(|list| {
                list.groups.iter().flat_map(|group| {
                    group.tasks.iter().map(|task| TaskRow {
                        node: list.node.name.clone(),
                        service: group.service.clone(),
                        task: task.kind().to_string(),
                        details: Self::truncate(&task.details(), 60),
                    })
                })
            })
            .collect();

        let mut output = format!("\nDelivery plan for '{}'\n\n", prepared.domain);
        output.push_str(&Table::new(rows).to_string());
        let _ = write!(
            output,
            "\n\n{} tasks on {} nodes\n",
            prepared.task_count(),
            prepared.task_lists.len()
        );
        output
    }

    /// Formats the report of a delivery run.
    #[must_use]
    pub fn format_report(&self, report: &DeliveryReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    fn format_report_text(report: &DeliveryReport) -> String {
        let mut output = String::new();

        for service in &report.services {
            let _ = writeln!(output, "{} on {}", service.service.bold(), service.node);
            for outcome in &service.outcomes {
                let marker = match &outcome.status {
                    TaskStatus::Succeeded => "✔".green().to_string(),
                    TaskStatus::Failed(_) => "✘".red().to_string(),
                    TaskStatus::Skipped => "⏩".yellow().to_string(),
                    TaskStatus::Planned => "·".dimmed().to_string(),
                };
                let _ = write!(output, "   {marker} {}", outcome.task.kind());
                if let TaskStatus::Failed(message) = &outcome.status {
                    let _ = write!(output, ": {message}");
                }
                output.push('\n');
            }
        }

        let elapsed = report.finished_at - report.started_at;
        let failed = report.failed_count();
        let summary = if failed == 0 {
            format!("{} Delivered {} services", "✓".green(), report.services.len())
        } else {
            format!(
                "{} {failed} of {} services failed",
                "✗".red(),
                report.services.len()
            )
        };
        let _ = writeln!(output, "\n{summary} ({} ms)", elapsed.num_milliseconds());
        output
    }

    /// Formats the summary of a validated configuration.
    #[must_use]
    pub fn format_validation(
        &self,
        config: &DeliveryConfiguration,
        tree: &DeliveryTree,
        diagnostics: &Diagnostics,
        warnings: bool,
    ) -> String {
        let deliveries = tree
            .values()
            .flat_map(|domain| domain.values())
            .map(|node| node.len())
            .sum();

        if self.format == OutputFormat::Json {
            let summary = ValidationSummary {
                domains: config.domains.len(),
                nodes: config.nodes.len(),
                solutions: config.solutions.len(),
                services: config.services.len(),
                deliveries,
                diagnostics,
            };
            return serde_json::to_string_pretty(&summary).unwrap_or_default();
        }

        let mut output = String::new();
        let _ = writeln!(
            output,
            "{} domains, {} nodes, {} solutions, {} services ({deliveries} deliveries)",
            config.domains.len(),
            config.nodes.len(),
            config.solutions.len(),
            config.services.len()
        );
        output.push_str(&self.format_diagnostics(diagnostics, warnings));

        if diagnostics.has_errors() {
            let _ = writeln!(output, "{} {} errors found", "✗".red(), diagnostics.error_count());
        } else {
            let _ = writeln!(output, "{} Configuration is valid", "✓".green());
        }
        output
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len - 3).collect();
            format!("{head}...")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("a rather long text", 10), "a rathe...");
    }

    #[test]
    fn test_warnings_are_optional() {
        colored::control::set_override(false);
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn("label 'gpu' is not used by any node of the 'test' domain");
        diagnostics.error("domain 'x' is not defined in the configuration");

        let formatter = OutputFormatter::new(OutputFormat::Text);
        assert_eq!(
            formatter.format_diagnostics(&diagnostics, false),
            "error: domain 'x' is not defined in the configuration\n"
        );
        assert_eq!(formatter.format_diagnostics(&diagnostics, true).lines().count(), 2);

        let json = OutputFormatter::new(OutputFormat::Json).format_diagnostics(&diagnostics, false);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["severity"], "warning");
    }
}
