//! Warden Server Binary

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use warden_server::{ConfigLoader, Server, ServerConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Server bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Policy store database URL
    #[arg(long)]
    database_url: Option<String>,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Print default configuration if requested
    if cli.print_config {
        println!("{}", serde_yaml::to_string(&ServerConfig::default())?);
        return Ok(());
    }

    let mut config = ConfigLoader::new().load(cli.config.as_ref())?;

    // Override with CLI arguments
    apply_cli_overrides(&mut config, &cli);
    config.validate()?;

    // Create and start server
    let server = Server::new(config).await?;
    server.start().await
}

/// Apply CLI argument overrides to configuration
fn apply_cli_overrides(config: &mut ServerConfig, cli: &Cli) {
    if let Some(bind) = &cli.bind {
        config.bind_address = bind.clone();
    }

    if let Some(url) = &cli.database_url {
        config.database.url = Some(url.clone());
    }
}
