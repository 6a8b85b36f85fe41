use anyhow::{Context, Result};
use clap::Parser;
use is_terminal::IsTerminal;
use log::{debug, info};

use sharepoint_cli::cli::{self, Cli};
use sharepoint_cli::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger to file (truncate on each run)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("sharepoint-cli.log")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded environment from {:?}", path);
    }

    let cli = Cli::parse();
    info!("Starting sharepoint-cli");

    let mut config = Config::load(cli.config.as_deref())?;
    if config.password.is_empty() && std::io::stdin().is_terminal() {
        let prompt = format!("Password for {}: ", config.username);
        config.password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    }

    cli::run(cli.command, &config).await
}
