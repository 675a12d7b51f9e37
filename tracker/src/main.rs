//! Open-tracking server: records pixel loads and open callbacks against the
//! lead store shared with the `outreach` CLI.

mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing::info;

use outreach::io::config::{DEFAULT_CONFIG_PATH, load_config};
use outreach::io::store::SqliteLeadStore;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "outreach-tracker")]
#[command(about = "Records email opens for outreach leads")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "5001")]
    port: u16,

    /// Outreach config file (names the lead database)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("outreach_tracker=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = load_config(&args.config)?;
    let db_path = config.store.resolve_db_path(&args.config);
    let store = SqliteLeadStore::open(&db_path)
        .with_context(|| format!("open lead store {}", db_path.display()))?;
    info!(db_path = %db_path.display(), "starting outreach-tracker");

    let app = routes::router(AppState::new(store)).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
