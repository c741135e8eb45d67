use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use mfxirr::cli::report::OutputFormat;
use mfxirr::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display cost basis, value and XIRR per scheme and for the portfolio
    Report {
        /// Evaluation date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Display purchase lots still held after FIFO matching
    Lots {
        /// Only replay transactions up to this date (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
}

impl Commands {
    fn into_app_command(self) -> Option<mfxirr::AppCommand> {
        match self {
            Commands::Setup => None,
            Commands::Report { as_of, json } => Some(mfxirr::AppCommand::Report {
                as_of,
                format: if json {
                    OutputFormat::Json
                } else {
                    OutputFormat::Table
                },
            }),
            Commands::Lots { as_of } => Some(mfxirr::AppCommand::Lots { as_of }),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command.map(Commands::into_app_command) {
        Some(Some(cmd)) => mfxirr::run_command(cmd, cli.config_path.as_deref()).await,
        Some(None) => match cli.config_path.as_deref() {
            Some(path) => mfxirr::cli::setup::setup_at_path(path),
            None => mfxirr::cli::setup::setup(),
        },
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
