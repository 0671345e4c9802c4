//! Jenkins MCP server entry point

use clap::Parser;
use jenkins_cli::{
    cli::{Cli, Commands},
    commands,
    error::CliResult,
    utils::{init_tracing, ColoredOutput},
};
use jenkins_connector::{JenkinsClient, JenkinsExecutor};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{} {}", ColoredOutput::error("Error:"), e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;

    if cli.no_color {
        colored::control::set_override(false);
    }

    info!("Jenkins MCP v{}", env!("CARGO_PKG_VERSION"));

    // Configuration and trust material errors abort here, before any traffic.
    let config = cli.jenkins.to_config();
    let executor = Arc::new(JenkinsExecutor::new(&config)?);
    let client = JenkinsClient::new(executor.clone());

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => commands::serve(client, &cli.server).await?,
        Commands::Check => commands::check(&executor, &client).await?,
    }
    Ok(())
}
