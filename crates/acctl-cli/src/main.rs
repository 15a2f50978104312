mod cmd;
mod output;
mod systems;

use clap::{Parser, Subcommand};
use cmd::provision::ProvisionSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "acctl",
    about = "Account lifecycle automation — separations, provisioning, license reclamation",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: ~/.config/acctl/config.yaml)
    #[arg(long, global = true, env = "ACCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deactivate accounts for separation tickets
    Separate {
        /// Ticket id to process (omit with --auto to work the whole queue)
        ticket_id: Option<u64>,

        /// Process every unprocessed separation ticket
        #[arg(long)]
        auto: bool,
    },

    /// Create accounts for new hires
    Provision {
        #[command(subcommand)]
        subcommand: ProvisionSubcommand,
    },

    /// Downgrade meeting-service licenses nobody is entitled to
    Reclaim {
        /// Compute and print the plan without changing any seat
        #[arg(long)]
        dry_run: bool,
    },

    /// Replace the requestor on a batch of tickets
    Reassign {
        /// UID of the new requestor
        #[arg(long)]
        requestor: String,

        /// File with one ticket id per line
        #[arg(long)]
        ids: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Batch modes narrate progress by default; one-shot commands stay quiet.
    let default_level = match &cli.command {
        Commands::Separate { auto: true, .. }
        | Commands::Provision {
            subcommand: ProvisionSubcommand::Batch { .. },
        }
        | Commands::Reclaim { .. }
        | Commands::Reassign { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Separate { ticket_id, auto } => {
            cmd::separate::run(config, ticket_id, auto, cli.json)
        }
        Commands::Provision { subcommand } => cmd::provision::run(config, subcommand, cli.json),
        Commands::Reclaim { dry_run } => cmd::reclaim::run(config, dry_run, cli.json),
        Commands::Reassign { requestor, ids } => {
            cmd::reassign::run(config, &requestor, &ids, cli.json)
        }
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
