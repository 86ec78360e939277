//! Binary entry point: loads configuration, stands up the engine router,
//! session manager, and metrics collector, then serves the HTTP/WS API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use orderflow_sentinel::api::{build_router, AppState};
use orderflow_sentinel::config::EngineConfig;
use orderflow_sentinel::engines::router::EngineRouter;
use orderflow_sentinel::engines::LoopbackPrimaryEngine;
use orderflow_sentinel::metrics_collector::MetricsCollector;
use orderflow_sentinel::session::{spawn_cleanup_task, SessionManager};

/// Environment variables (see the configuration table) are the primary way
/// to configure this service; these flags exist for local overrides.
#[derive(Parser, Debug)]
#[command(name = "orderflow-sentinel")]
#[command(about = "Real-time limit-order-book microstructure analytics engine")]
struct Args {
    /// Overrides BIND_ADDR/PORT for local runs.
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Disables the primary engine regardless of USE_PRIMARY_ENGINE.
    #[arg(long, default_value_t = false)]
    secondary_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    let mut config = EngineConfig::from_env()?;
    if args.secondary_only {
        config.use_primary_engine = false;
    }

    info!(bind_addr = %config.bind_addr, port = config.port, "starting orderflow-sentinel");

    let router = Arc::new(EngineRouter::new(config.f_max));
    if config.use_primary_engine {
        let candidate = Arc::new(LoopbackPrimaryEngine::new(config.primary_call_timeout));
        let online = router.initialize(candidate).await;
        if !online {
            info!("primary engine probe failed at startup, staying in SECONDARY mode");
        }
    }

    let metrics = Arc::new(MetricsCollector::new());
    let sessions = SessionManager::new(Arc::clone(&router), Arc::clone(&metrics), config.clone());

    let app_state = AppState::new(config.clone(), Arc::clone(&router), Arc::clone(&sessions), Arc::clone(&metrics));
    let observer_state = app_state.clone();
    sessions.set_tick_observer(move |enriched| observer_state.observe(enriched));

    spawn_cleanup_task(Arc::clone(&sessions), Duration::from_secs(60));

    let addr = args.bind.unwrap_or_else(|| {
        format!("{}:{}", config.bind_addr, config.port)
            .parse()
            .expect("BIND_ADDR/PORT must form a valid socket address")
    });

    let app = build_router(app_state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
