//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ENV_PROJECT_ROOT;
use crate::planner::{DeliveryFilter, ExecutionOptions, NodeSchedule};

/// Bridge delivery - rule-based delivery of services to Bridge nodes.
#[derive(Parser, Debug)]
#[command(name = "bridge-deliver")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Root directory of the delivery definitions.
    #[arg(short, long, global = true, env = ENV_PROJECT_ROOT, default_value = ".")]
    pub project_root: PathBuf,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deliver the services of a domain to its nodes.
    Deliver(DeliverArgs),

    /// Validate the delivery definitions.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },
}

/// Arguments of the deliver command.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DeliverArgs {
    /// Domain to deliver.
    #[arg(short, long)]
    pub domain: String,

    /// Only deliver to these nodes.
    #[arg(short, long = "node")]
    pub nodes: Vec<String>,

    /// Only deliver to nodes carrying one of these labels.
    #[arg(short, long = "label")]
    pub labels: Vec<String>,

    /// Only deliver these solutions.
    #[arg(short, long = "solution")]
    pub solutions: Vec<String>,

    /// Only deliver these services.
    #[arg(long = "service")]
    pub services: Vec<String>,

    /// Show the tasks without executing them.
    #[arg(long)]
    pub dry_run: bool,

    /// Stop at the first failing task.
    #[arg(long)]
    pub break_on_error: bool,

    /// Deliver to all nodes at once instead of one after the other.
    #[arg(long)]
    pub concurrent_nodes: bool,
}

impl DeliverArgs {
    /// Builds the delivery filter.
    #[must_use]
    pub fn filter(&self) -> DeliveryFilter {
        DeliveryFilter::new(self.domain.clone())
            .with_nodes(self.nodes.clone())
            .with_labels(self.labels.clone())
            .with_solutions(self.solutions.clone())
            .with_services(self.services.clone())
    }

    /// Builds the execution options.
    #[must_use]
    pub const fn execution_options(&self) -> ExecutionOptions {
        let schedule = if self.concurrent_nodes {
            NodeSchedule::Concurrent
        } else {
            NodeSchedule::Sequential
        };
        ExecutionOptions::new()
            .with_dry_run(self.dry_run)
            .with_break_on_error(self.break_on_error)
            .with_schedule(schedule)
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deliver() {
        let cli = Cli::try_parse_from([
            "bridge-deliver",
            "--project-root",
            "/srv/delivery",
            "deliver",
            "--domain",
            "production",
            "--node",
            "prod1",
            "--node",
            "prod2",
            "--label",
            "slave",
            "--service",
            "Api",
            "--dry-run",
            "--concurrent-nodes",
        ])
        .unwrap();

        assert_eq!(cli.project_root, PathBuf::from("/srv/delivery"));
        assert_eq!(cli.output, OutputFormat::Text);
        let Commands::Deliver(args) = cli.command else {
            panic!("expected deliver");
        };

        let filter = args.filter();
        assert_eq!(filter.domain, "production");
        assert_eq!(filter.nodes, vec!["prod1", "prod2"]);
        assert_eq!(filter.labels, vec!["slave"]);
        assert!(filter.solutions.is_empty());
        assert_eq!(filter.services, vec!["Api"]);

        let options = args.execution_options();
        assert!(options.dry_run);
        assert!(!options.break_on_error);
        assert_eq!(options.schedule, NodeSchedule::Concurrent);
    }

    #[test]
    fn test_deliver_requires_domain() {
        assert!(Cli::try_parse_from(["bridge-deliver", "deliver"]).is_err());
    }

    #[test]
    fn test_parse_validate() {
        let cli = Cli::try_parse_from([
            "bridge-deliver",
            "validate",
            "--warnings",
            "--output",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Validate { warnings: true }));
    }
}
