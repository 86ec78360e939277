//! Transport layer: axum router wiring for the aggregate read surface, the
//! per-session control surface, and the per-session WebSocket.

pub mod control;
pub mod routes;
pub mod state;
pub mod ws;

pub use state::AppState;

use axum::middleware as axum_mw;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::middleware::request_logging_simple;

/// Builds the full HTTP/WS router. Call sites only need to bind and serve it.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // aggregate read surface
        .route("/features", get(routes::get_features))
        .route("/snapshot/latest", get(routes::get_snapshot_latest))
        .route("/anomalies", get(routes::get_anomalies))
        .route("/anomalies/summary", get(routes::get_anomalies_summary))
        .route("/anomalies/:kind", get(routes::get_anomalies_by_kind))
        .route("/alerts/history", get(routes::get_alerts_history))
        .route("/alerts/stats", get(routes::get_alerts_stats))
        .route("/trades/classification", get(routes::get_trade_classification))
        .route("/trades/spreads", get(routes::get_trade_spreads))
        .route("/trades/vpin", get(routes::get_trade_vpin))
        .route("/trades/anomalies", get(routes::get_trade_anomalies))
        .route("/metrics", get(routes::get_metrics))
        .route("/metrics/dashboard", get(routes::get_metrics_dashboard))
        .route("/health", get(routes::get_health))
        .route("/engine/status", get(routes::get_engine_status))
        .route("/engine/switch/:target", post(routes::switch_engine))
        .route("/engine/benchmark", get(routes::benchmark_engine))
        // per-session control surface
        .route("/sessions/:session_id/start", post(control::start_session))
        .route("/sessions/:session_id/pause", post(control::pause_session))
        .route("/sessions/:session_id/resume", post(control::resume_session))
        .route("/sessions/:session_id/stop", post(control::stop_session))
        .route("/sessions/:session_id/speed", post(control::set_speed))
        .route("/sessions/:session_id/go_back", post(control::go_back))
        .route("/sessions/:session_id/state", get(control::get_state))
        .route("/sessions/:session_id", delete(control::delete_session))
        // per-session websocket
        .route("/ws/:session_id", get(ws::session_ws))
        .layer(axum_mw::from_fn(request_logging_simple))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
