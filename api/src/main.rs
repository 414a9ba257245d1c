use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use paiute_dictionary::config::DictionaryConfig;

/// English/Paiute dictionary API server.
#[derive(Debug, Parser)]
#[command(name = "paiute-dictionary", version, about)]
struct Cli {
    /// TOML configuration file (defaults to ./dictionary.toml when present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind, overriding `server.host`.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overriding `server.port`.
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite file (or `:memory:`), overriding `database.path`.
    #[arg(long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("paiute-dictionary error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let mut config = DictionaryConfig::load_with_dotenv(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(database) = cli.database {
        config.database.path = database;
    }
    config.validate()?;

    paiute_dictionary::run(config).await
}

fn init_tracing() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
