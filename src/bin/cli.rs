// =============================================================================
// vault-cli -- operator entry point for `backfill` / `import-strategy`
// =============================================================================

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vault_execution_engine::cli::{run_backfill, run_import_strategy, Cli, Command};
use vault_execution_engine::config::AppConfig;
use vault_execution_engine::persistence::PersistenceGateway;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenv::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match AppConfig::load() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let gateway = match PersistenceGateway::connect(&config.database_url).await {
        Ok(g) => g,
        Err(e) => {
            eprintln!("failed to connect to database: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Backfill { check, asset } => run_backfill(&config, &gateway, check, asset).await,
        Command::ImportStrategy { path, dry_run, force, verbose } => {
            run_import_strategy(&gateway, &path, dry_run, force, verbose).await
        }
    };

    match result {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
