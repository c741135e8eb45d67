pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::report::OutputFormat;
use crate::core::FinprimSolver;
use crate::core::config::AppConfig;
use crate::providers::mfapi_provider::MfApiProvider;
use crate::store::KeyValueStore;
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use tracing::debug;

pub enum AppCommand {
    Report {
        as_of: Option<NaiveDate>,
        format: OutputFormat,
    },
    Lots {
        as_of: Option<NaiveDate>,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Report { as_of, format } => {
            let store = match config.default_data_path() {
                Ok(path) => KeyValueStore::open(&path),
                Err(e) => {
                    debug!("No data path available ({e}); caching prices in memory");
                    KeyValueStore::in_memory()
                }
            };
            let provider = MfApiProvider::new(config.providers.mfapi_base_url(), &store);
            let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());

            cli::report::run(
                &config.transactions,
                &provider,
                &FinprimSolver,
                as_of,
                format,
            )
            .await
        }
        AppCommand::Lots { as_of } => cli::lots::run(&config.transactions, as_of),
    }
}
