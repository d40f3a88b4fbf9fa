use anyhow::{Context, Result};
use clap::Parser;
use leafsync_cli::{AppConfig, Cli, Command, commands, load_config};
use leafsync_logger::{Logger, verbosity};
use std::io::Write;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config: AppConfig = load_config(cli.config.as_deref()).context("Configuration is malformed")?;
    let _log = Logger::builder()
        .name(env!("CARGO_BIN_NAME"))
        .settings(config.log.clone())
        .level(verbosity(cli.quiet, cli.verbose))
        .init()?;

    let output = match &cli.command {
        Command::Sync(args) => commands::sync(&config, args).await?,
        Command::Catalog { path } => commands::catalog(&config, path.as_deref())?,
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", serde_json::to_string_pretty(&output)?)?;
    Ok(())
}
