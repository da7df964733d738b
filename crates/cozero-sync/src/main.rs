use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use cozero_sync_core::client::DEFAULT_BASE_URL;
use cozero_sync_core::migration::{self, DEFAULT_INPUT_PATH};
use cozero_sync_core::report::DEFAULT_REPORT_PATH;
use cozero_sync_core::{CozeroClient, Credentials, MigrationOptions};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Migrate location records from CSV into Cozero", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Delete all remote locations, upload the valid rows and write the report
    Run(RunArgs),
    /// Validate the CSV and write the report without calling the API
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct PathArgs {
    /// CSV file with the locations to migrate
    #[arg(long, default_value = DEFAULT_INPUT_PATH)]
    input: PathBuf,
    /// Where to write the customer report
    #[arg(long, default_value = DEFAULT_REPORT_PATH)]
    report: PathBuf,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    paths: PathArgs,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[command(flatten)]
    paths: PathArgs,
    /// Business unit id stamped on every row
    #[arg(long)]
    business_unit_id: i64,
    /// Responsible user id stamped on every row
    #[arg(long)]
    user_id: Option<i64>,
}

impl From<PathArgs> for MigrationOptions {
    fn from(args: PathArgs) -> Self {
        MigrationOptions {
            input: args.input,
            report: args.report,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG may come from .env, so load it before building the filter.
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run(args) => handle_run(args).await,
        Command::Check(args) => handle_check(args),
    };

    if let Err(err) = &result {
        error!(error = ?err, "Error in processing");
    }
    result
}

async fn handle_run(args: RunArgs) -> Result<()> {
    let email = env::var("COZERO_EMAIL").context("COZERO_EMAIL must be set")?;
    let password = env::var("COZERO_PASSWORD").context("COZERO_PASSWORD must be set")?;
    let base_url = env::var("COZERO_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

    let mut client = CozeroClient::new(&base_url, Credentials::new(email, password))
        .context("failed to build HTTP client")?;
    let options = MigrationOptions::from(args.paths);

    let summary = migration::run(&mut client, &options)
        .await
        .context("location migration failed")?;
    info!(
        deleted = summary.deleted,
        uploaded = summary.uploaded,
        matched = summary.matched,
        report = %summary.report_path,
        "Migration finished"
    );
    Ok(())
}

fn handle_check(args: CheckArgs) -> Result<()> {
    let options = MigrationOptions::from(args.paths);

    let summary = migration::check(&options, args.user_id, args.business_unit_id)
        .context("location check failed")?;
    info!(
        loaded = summary.loaded,
        rejected = summary.rejected,
        duplicates = summary.duplicates,
        report = %summary.report_path,
        "Check finished"
    );
    Ok(())
}
