//! Rescue Alert CLI
//!
//! Evaluates or replays a JSON event log and prints the result as canonical
//! JSON lines on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rescue_alert_cli::{commands, config, Overrides};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "rescue-alert")]
#[command(about = "Rescue alert policy decisions and audit trails", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate the latest request in an event log
    Evaluate {
        /// JSON array of events
        #[arg(short, long)]
        events: PathBuf,

        /// Engine configuration file
        #[arg(short, long, env = "RESCUE_ALERT_CONFIG")]
        config: Option<PathBuf>,

        /// Evaluation instant, ISO-8601 (defaults to the system clock)
        #[arg(long)]
        now: Option<String>,

        /// Mark emitted alerts as capped per recipient
        #[arg(long)]
        per_recipient_caps: bool,

        /// Print hash-chained records instead of bare audit events
        #[arg(long)]
        chain: bool,
    },

    /// Rebuild the projection incrementally and by replay and compare them
    Replay {
        /// JSON array of events
        #[arg(short, long)]
        events: PathBuf,

        /// Also print the canonical projection
        #[arg(long)]
        projection: bool,
    },

    /// Print the published audit event schemas
    Schema,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    match cli.command {
        Command::Evaluate {
            events,
            config: config_path,
            now,
            per_recipient_caps,
            chain,
        } => {
            let overrides = Overrides {
                now,
                per_recipient_caps,
            };
            let config = config::load(config_path.as_deref(), &overrides)?;
            let log = read_log(&events)?;

            for line in commands::evaluate_log(&log, &config, chain)? {
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Replay { events, projection } => {
            let log = read_log(&events)?;
            let report = commands::replay_log(&log)?;

            for line in report.lines(projection) {
                println!("{}", line);
            }
            if report.matches() {
                Ok(ExitCode::SUCCESS)
            } else {
                error!("Incremental projection and replay disagree");
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Schema => {
            for line in commands::audit_schemas()? {
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_log(path: &Path) -> Result<String> {
    info!(path = %path.display(), "Reading event log");
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("rescue_alert=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rescue_alert=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
