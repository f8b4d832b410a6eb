//! CWMP ACS Server
//!
//! Accepts CPE sessions over HTTP and drives queued management tasks.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use cwmp_acs::engine::{AcsEngine, EngineSettings};
use cwmp_acs::events::{BroadcastNotifier, log_events};
use cwmp_acs::server::{AppState, RouterConfig, build_router};
use cwmp_acs::storage::AcsDatabase;
use cwmp_core::config::load_config;
use cwmp_core::tracing_init::{LogFormat, default_filter, init_tracing};

#[derive(Parser, Debug)]
#[command(name = "cwmp-acs")]
#[command(version, about = "CWMP (TR-069) auto-configuration server")]
struct Args {
    /// Address to listen on (overrides the config file).
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Path to SQLite database file.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Configuration file (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Store call timeout in seconds.
    #[arg(long)]
    store_timeout: Option<u64>,

    /// CWMP session idle lifetime in seconds.
    #[arg(long)]
    session_ttl: Option<u64>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "CWMP_ACS_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(secs) = args.store_timeout {
        anyhow::ensure!(secs > 0, "--store-timeout must be positive");
        config.cwmp.store_timeout_secs = secs;
    }
    if let Some(secs) = args.session_ttl {
        config.cwmp.session_ttl_secs = secs;
    }

    init_tracing(
        &default_filter(&config.server.log_level),
        LogFormat::from_json_flag(args.log_json),
    );

    let addr = match args.addr {
        Some(addr) => addr,
        None => config.server.listen_addr.parse()?,
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %addr,
        endpoint = %config.cwmp.endpoint_path,
        "Starting cwmp-acs"
    );

    let db_path = match args.db_path.or_else(|| config.server.database_path.clone()) {
        Some(path) => path,
        None => cwmp_core::config::database_path()
            .ok_or_else(|| anyhow::anyhow!("Cannot determine config directory"))?,
    };
    info!(path = %db_path.display(), "Opening ACS database");
    let db = AcsDatabase::open(&db_path).await?;

    let notifier = BroadcastNotifier::new();
    tokio::spawn(log_events(notifier.subscribe()));

    let engine = AcsEngine::new(
        Arc::new(db.clone()),
        Arc::new(notifier),
        EngineSettings::from_config(&config.cwmp),
    );

    let app = build_router(
        AppState {
            engine: Arc::new(engine),
            db,
        },
        &RouterConfig {
            endpoint_path: config.cwmp.endpoint_path.clone(),
            max_body_bytes: config.server.max_body_bytes,
        },
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Listening for CPE sessions");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received shutdown signal"),
                Err(e) => {
                    warn!(error = %e, "Cannot listen for shutdown signal");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await?;

    info!("ACS stopped");
    Ok(())
}
