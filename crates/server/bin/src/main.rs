//! campo server
//!
//! Entry point of the field-service scheduling API.

mod config;
mod startup;

use clap::Parser;
use config::ServerConfig;

#[derive(clap::Parser, Debug)]
#[command(name = "campo-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Field-service scheduling server", long_about = None)]
struct Args {
    /// HTTP port (overrides configuration)
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database path (overrides configuration)
    #[arg(short, long)]
    database: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::load()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }

    setup_logging(if args.debug { "debug" } else { &config.log_level });

    startup::run(config).await
}

fn setup_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber was already set");
    }
}
