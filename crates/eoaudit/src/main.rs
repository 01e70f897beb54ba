//! eoaudit command line
//!
//! - `build`: walk the object store into an inventory snapshot
//! - `check`: reconcile the snapshot against the catalog and datacube index
//! - `summary`, `config`: inspect the snapshot and the resolved settings
//!
//! Exit status: 0 clean, 2 discrepancies found, 1 failure.

use anyhow::Result;
use clap::{Parser, Subcommand};
use eoaudit::CheckKind;
use eoaudit_logging::{init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(
    name = "eoaudit",
    version,
    about = "Consistency audit for an EO archive: object store, STAC catalog and datacube index"
)]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Config file (TOML); defaults to ~/.eoaudit/config.toml when present
    #[arg(long, env = "EOAUDIT_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    connection: cli::ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk the object store and write the inventory snapshot
    Build {
        /// Output build statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run reconciliation checks against the inventory
    Check {
        /// Run only these checks (repeatable or comma separated)
        #[arg(long, value_enum, value_delimiter = ',')]
        only: Vec<CheckKind>,

        /// Skip checks that need the object store or the database
        #[arg(long)]
        skip_live: bool,

        /// Report size totals and extremes cumulatively across platforms
        #[arg(long)]
        cumulative: bool,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Per-platform scene, object and size totals from the inventory
    Summary {
        #[arg(long)]
        json: bool,
    },

    /// Print the resolved configuration (secrets masked)
    Config {
        #[arg(long)]
        json: bool,
    },
}

fn command_wants_json(cmd: &Commands) -> bool {
    match cmd {
        Commands::Build { json }
        | Commands::Check { json, .. }
        | Commands::Summary { json }
        | Commands::Config { json } => *json,
    }
}

fn run_command(cli: Cli) -> Result<u8> {
    let config = cli::resolve_config(cli.config.as_deref(), cli.connection)?;

    match cli.command {
        Commands::Build { json } => cli::build::run(cli::build::BuildArgs { json }, config),
        Commands::Check {
            only,
            skip_live,
            cumulative,
            json,
        } => cli::check::run(
            cli::check::CheckArgs {
                only,
                skip_live,
                cumulative,
                json,
            },
            config,
        ),
        Commands::Summary { json } => cli::summary::run(cli::summary::SummaryArgs { json }, config),
        Commands::Config { json } => cli::config::run(cli::config::ConfigArgs { json }, config),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = command_wants_json(&cli.command);

    if let Err(err) = init_logging(LogConfig {
        app_name: "eoaudit",
        verbose: cli.verbose,
        log_dir: None,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    match run_command(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            let err = cli::error::explain(err);
            if json_mode {
                cli::error::print_json_error(&err);
            } else if err.downcast_ref::<cli::error::HelpfulError>().is_some() {
                eprint!("{}", err);
            } else {
                eprintln!("Error: {:?}", err);
            }
            ExitCode::from(1)
        }
    }
}
