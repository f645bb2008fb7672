use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use webhdfs_dashboard::config::AppConfig;
use webhdfs_dashboard::relay::{self, RelayState};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_CONFIG: &str = "app.config.json";

fn print_usage() {
    eprintln!("Usage: hdfs-relay [CONFIG]");
    eprintln!();
    eprintln!("  CONFIG      Path to the JSON config (default: {})", DEFAULT_CONFIG);
    eprintln!("  --version   Print version and exit");
    eprintln!("  --help      Print this help message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = match std::env::args().nth(1).as_deref() {
        Some("--version") => {
            println!("hdfs-relay {}", VERSION);
            return Ok(());
        }
        Some("--help") => {
            print_usage();
            return Ok(());
        }
        Some(path) => path.to_string(),
        None => DEFAULT_CONFIG.to_string(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load_or_default(&config_path);
    let state = RelayState::from_config(&config).context("invalid relay configuration")?;

    let addr = format!("{}:{}", config.server.bind, config.server.backend.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("could not bind {}", addr))?;

    info!(
        version = VERSION,
        %addr,
        gateway = %config.connection().gateway_url(),
        datanode = %config.hdfs.datanode.origin(),
        "hdfs-relay listening"
    );

    axum::serve(listener, relay::router(Arc::new(state)))
        .await
        .context("relay server stopped")?;
    Ok(())
}
