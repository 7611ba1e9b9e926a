#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use rebook_core::config::{self, DEFAULT_CONFIG_FILE};
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "rebook: visit attribution and rebooking linkage for salon POS extracts",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format (overrides `--json` and the `FORMAT` env var).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Path to the config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Create the staging schema and migrate the output database",
        long_about = "Create the staging tables (sale_transaction_lines, appointments) in the \
                      source database and bring the output database to the latest schema. \
                      Safe to run repeatedly.",
        after_help = "EXAMPLES:\n    # Initialize using rebook.toml in the current directory\n    rebook init\n\n    # Use another config file\n    rebook init --config /etc/rebook/rebook.toml"
    )]
    Init,

    #[command(
        next_help_heading = "Batch",
        about = "Run one attribution and rebooking batch",
        long_about = "Read the last N days of transaction lines, attribute each visit to its \
                      top-earning employee, link client visits to later appointments, and \
                      upsert one consolidated record per line into the output database.",
        after_help = "EXAMPLES:\n    # Run over the configured window ending today\n    rebook run\n\n    # Reprocess the last 30 days\n    rebook run --days-back 30\n\n    # Replay a past day and emit machine-readable output\n    rebook run --today 2024-01-11 --json"
    )]
    Run(cmd::run::RunArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show per-employee rebooking rates",
        long_about = "Summarize distinct visits, rebooked visits and new-client visits per \
                      attributed employee from the output database.",
        after_help = "EXAMPLES:\n    # Every visit in the output database\n    rebook report\n\n    # One month\n    rebook report --from 2024-01-01 --to 2024-01-31\n\n    # Emit machine-readable output\n    rebook report --json"
    )]
    Report(cmd::report::ReportArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("REBOOK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "rebook=debug,info"
        } else {
            "rebook=info,warn"
        })
    });

    let format = env::var("REBOOK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command results only.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let output = cli.output_mode();
    let config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            output::render_error(
                output,
                &output::CliError::from_code(
                    rebook_core::error::ErrorCode::ConfigParseError,
                    format!("{err:#}"),
                ),
            )?;
            return Err(err);
        }
    };

    match cli.command {
        Commands::Init => cmd::init::run_init(&config, output),
        Commands::Run(ref args) => cmd::run::run_batch(args, &config, output),
        Commands::Report(ref args) => cmd::report::run_report(args, &config, output),
    }
}
