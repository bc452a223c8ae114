//! Bridge delivery CLI entrypoint.
//!
//! This is the main entrypoint for the bridge-deliver command-line tool.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use bridge_delivery::cli::{Cli, Commands, DeliverArgs, OutputFormatter, TerminalPrompt};
use bridge_delivery::config::ConfigParser;
use bridge_delivery::deliverer::Deliverer;
use bridge_delivery::error::{ExecutionError, Result};
use bridge_delivery::planner::{Diagnostics, create_delivery_tree};

use tracing::info;
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Deliver(args) => cmd_deliver(&cli.project_root, &args, &formatter).await,
        Commands::Validate { warnings } => {
            cmd_validate(&cli.project_root, warnings, &formatter).await
        }
    }
}

/// Deliver the services of a domain.
async fn cmd_deliver(
    project_root: &Path,
    args: &DeliverArgs,
    formatter: &OutputFormatter,
) -> Result<()> {
    let parser = ConfigParser::new(project_root);
    let deliverer = Deliverer::from_project(&parser)
        .await?
        .with_prompt(Arc::new(TerminalPrompt));

    let prepared = deliverer.prepare(&args.filter())?;
    if !prepared.diagnostics.is_empty() {
        eprint!("{}", formatter.format_diagnostics(&prepared.diagnostics, true));
    }

    let report = deliverer.execute(&prepared, args.execution_options()).await?;
    if report.dry_run {
        eprintln!("{}", formatter.format_plan(&prepared));
    } else {
        eprintln!("{}", formatter.format_report(&report));
    }

    report.check()
}

/// Validate the delivery definitions.
async fn cmd_validate(
    project_root: &Path,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let parser = ConfigParser::new(project_root);
    info!("Validating definitions in: {}", parser.root().display());

    parser.load_dotenv()?;
    let config = parser.read_definitions().await?;

    let mut diagnostics = Diagnostics::new();
    let tree = create_delivery_tree(&config, &mut diagnostics);

    eprint!(
        "{}",
        formatter.format_validation(&config, &tree, &diagnostics, show_warnings)
    );

    if diagnostics.has_errors() {
        return Err(ExecutionError::ConfigurationErrors {
            count: diagnostics.error_count(),
        }
        .into());
    }
    Ok(())
}
