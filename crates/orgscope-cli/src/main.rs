mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use orgscope_core::{OrganizationCommands, UpstreamClient, UpstreamConfig};
use tokio_util::sync::CancellationToken;

use crate::cli::Cli;
use crate::error::CliError;

const CONFIG_PATH_ENV: &str = "ORGSCOPE_CONFIG";

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    logging::init(cli.log_level, cli.log_format);

    let config = load_config(cli.config.clone(), |name| std::env::var(name).ok())?;
    let client = UpstreamClient::builder(config).build()?;
    let dispatcher = OrganizationCommands::new(client);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("cli.interrupted");
            interrupt.cancel();
        }
    });

    let outcome = commands::run(&cli.command, &dispatcher, &cancel).await?;
    output::render(outcome, cli.pretty, &cancel).await
}

fn load_config<F>(flag: Option<PathBuf>, lookup: F) -> Result<UpstreamConfig, CliError>
where
    F: Fn(&str) -> Option<String>,
{
    let path = flag.or_else(|| lookup(CONFIG_PATH_ENV).map(PathBuf::from));
    let config = match path {
        Some(path) => UpstreamConfig::from_json_file(&path)?,
        None => UpstreamConfig::default(),
    };
    Ok(config.with_env_overrides(lookup)?)
}
