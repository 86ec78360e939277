//! Process-wide aggregate read surface (§6): `/features`, `/snapshot/latest`,
//! `/anomalies*`, `/alerts/*`, `/trades/*`, `/metrics*`, `/health`, `/engine/*`.
//!
//! None of these are keyed by session; they all read off `AppState.latest` /
//! `AppState.alert_history`, the most recently observed activity across every
//! session (there is no persistent store).

use std::time::Instant;

use axum::extract::{Path, Query, State as AxumState};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::engines::pipeline::{self, SessionAnalyticsState};
use crate::engines::router::EngineMode;
use crate::metrics_collector::MetricsSnapshot;
use crate::models::{Alert, AlertType, EnrichedSnapshot};

use super::state::AppState;

#[derive(Debug, Serialize, Default)]
pub struct FeatureView {
    pub spread: f64,
    pub microprice: f64,
    pub obi: f64,
    pub ofi_normalized: f64,
    pub divergence: f64,
    pub directional_prob: f64,
    pub regime: usize,
    pub regime_label: String,
    pub volume_volatility: f64,
}

impl From<&EnrichedSnapshot> for FeatureView {
    fn from(s: &EnrichedSnapshot) -> Self {
        Self {
            spread: s.spread,
            microprice: s.microprice,
            obi: s.obi,
            ofi_normalized: s.ofi_normalized,
            divergence: s.divergence,
            directional_prob: s.directional_prob,
            regime: s.regime,
            regime_label: s.regime_label.clone(),
            volume_volatility: s.volume_volatility,
        }
    }
}

pub async fn get_features(AxumState(state): AxumState<AppState>) -> Result<Json<FeatureView>, StatusCode> {
    let latest = state.latest.read();
    latest.as_ref().map(|s| Json(FeatureView::from(s))).ok_or(StatusCode::NOT_FOUND)
}

pub async fn get_snapshot_latest(AxumState(state): AxumState<AppState>) -> Result<Json<EnrichedSnapshot>, StatusCode> {
    state.latest.read().clone().map(Json).ok_or(StatusCode::NOT_FOUND)
}

pub async fn get_anomalies(AxumState(state): AxumState<AppState>) -> Json<Vec<Alert>> {
    Json(state.latest.read().as_ref().map(|s| s.anomalies.clone()).unwrap_or_default())
}

fn alert_type_from_slug(slug: &str) -> Option<AlertType> {
    match slug {
        "liquidity-gaps" => Some(AlertType::LiquidityGap),
        "spoofing" => Some(AlertType::Spoofing),
        "quote-stuffing" => Some(AlertType::QuoteStuffing),
        "layering" => Some(AlertType::Layering),
        "momentum-ignition" => Some(AlertType::MomentumIgnition),
        "wash-trading" => Some(AlertType::WashTrading),
        "iceberg-orders" => Some(AlertType::IcebergOrder),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
pub struct AnomalySummary {
    pub counts_by_type: std::collections::HashMap<String, usize>,
    pub total: usize,
}

pub async fn get_anomalies_by_kind(
    AxumState(state): AxumState<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<Alert>>, StatusCode> {
    if kind == "summary" {
        // handled by a distinct route; unreachable when routed correctly.
        return Err(StatusCode::NOT_FOUND);
    }
    let alert_type = alert_type_from_slug(&kind).ok_or(StatusCode::NOT_FOUND)?;
    let history = state.alert_history.lock();
    let matching: Vec<Alert> = history.iter().filter(|a| a.alert_type == alert_type).cloned().collect();
    Ok(Json(matching))
}

pub async fn get_anomalies_summary(AxumState(state): AxumState<AppState>) -> Json<AnomalySummary> {
    let history = state.alert_history.lock();
    let mut counts_by_type = std::collections::HashMap::new();
    for alert in history.iter() {
        *counts_by_type.entry(alert.alert_type.as_str().to_string()).or_insert(0) += 1;
    }
    Json(AnomalySummary { total: history.len(), counts_by_type })
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn get_alerts_history(
    AxumState(state): AxumState<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Json<Vec<Alert>> {
    let limit = params.limit.unwrap_or(100).min(1000);
    let history = state.alert_history.lock();
    Json(history.tail(limit).cloned().collect())
}

#[derive(Debug, Serialize)]
pub struct AlertStats {
    pub total: usize,
    pub by_severity: std::collections::HashMap<String, usize>,
    pub by_type: std::collections::HashMap<String, usize>,
}

pub async fn get_alerts_stats(AxumState(state): AxumState<AppState>) -> Json<AlertStats> {
    let history = state.alert_history.lock();
    let mut by_severity = std::collections::HashMap::new();
    let mut by_type = std::collections::HashMap::new();
    for alert in history.iter() {
        *by_severity.entry(format!("{:?}", alert.severity).to_lowercase()).or_insert(0) += 1;
        *by_type.entry(alert.alert_type.as_str().to_string()).or_insert(0) += 1;
    }
    Json(AlertStats { total: history.len(), by_severity, by_type })
}

#[derive(Debug, Serialize, Default)]
pub struct TradeClassificationView {
    pub trade_side: Option<crate::models::TradeSide>,
    pub last_trade_price: Option<f64>,
    pub trade_volume: Option<f64>,
}

pub async fn get_trade_classification(AxumState(state): AxumState<AppState>) -> Json<TradeClassificationView> {
    let latest = state.latest.read();
    Json(latest.as_ref().map(|s| TradeClassificationView {
        trade_side: s.trade_side,
        last_trade_price: s.last_trade_price,
        trade_volume: s.trade_volume,
    }).unwrap_or_default())
}

#[derive(Debug, Serialize, Default)]
pub struct TradeSpreadsView {
    pub spread: f64,
    pub effective_spread: Option<f64>,
    pub realized_spread: Option<f64>,
}

pub async fn get_trade_spreads(AxumState(state): AxumState<AppState>) -> Json<TradeSpreadsView> {
    let latest = state.latest.read();
    Json(latest.as_ref().map(|s| TradeSpreadsView {
        spread: s.spread,
        effective_spread: s.effective_spread,
        realized_spread: s.realized_spread,
    }).unwrap_or_default())
}

#[derive(Debug, Serialize, Default)]
pub struct VpinView {
    pub vpin: f64,
}

pub async fn get_trade_vpin(AxumState(state): AxumState<AppState>) -> Json<VpinView> {
    let latest = state.latest.read();
    Json(VpinView { vpin: latest.as_ref().map(|s| s.vpin).unwrap_or(0.0) })
}

/// Trade-adjacent anomalies: the detector kinds whose evidence concerns the
/// trade tape rather than the book (spoofing, wash trading, momentum
/// ignition).
pub async fn get_trade_anomalies(AxumState(state): AxumState<AppState>) -> Json<Vec<Alert>> {
    let history = state.alert_history.lock();
    let matching: Vec<Alert> = history
        .iter()
        .filter(|a| {
            matches!(
                a.alert_type,
                AlertType::Spoofing | AlertType::WashTrading | AlertType::MomentumIgnition
            )
        })
        .cloned()
        .collect();
    Json(matching)
}

pub async fn get_metrics(AxumState(state): AxumState<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub metrics: MetricsSnapshot,
    pub engine: crate::engines::router::EngineStatus,
    pub sessions: crate::session::SessionStats,
}

pub async fn get_metrics_dashboard(AxumState(state): AxumState<AppState>) -> Json<DashboardView> {
    Json(DashboardView {
        metrics: state.metrics.snapshot(),
        engine: state.router.status(),
        sessions: state.sessions.stats(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthView {
    pub status: &'static str,
    pub engine_mode: EngineMode,
    pub active_sessions: usize,
}

pub async fn get_health(AxumState(state): AxumState<AppState>) -> Json<HealthView> {
    let sessions = state.sessions.stats();
    Json(HealthView {
        status: "ok",
        engine_mode: state.router.mode(),
        active_sessions: sessions.active_sessions,
    })
}

pub async fn get_engine_status(AxumState(state): AxumState<AppState>) -> Json<crate::engines::router::EngineStatus> {
    Json(state.router.status())
}

pub async fn switch_engine(
    AxumState(state): AxumState<AppState>,
    Path(target): Path<String>,
) -> Result<Json<crate::engines::router::EngineStatus>, StatusCode> {
    let target = match target.as_str() {
        "primary" => EngineMode::Primary,
        "secondary" => EngineMode::Secondary,
        _ => return Err(StatusCode::BAD_REQUEST),
    };
    let candidate = state.router.primary_client();
    let ok = state.router.switch(target, candidate).await;
    if !ok && target == EngineMode::Primary {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(state.router.status()))
}

#[derive(Debug, Serialize)]
pub struct BenchmarkResult {
    pub primary_available: bool,
    pub primary_latency_ms: Option<f64>,
    pub secondary_latency_ms: f64,
}

/// Times a single canned snapshot through the primary client (if any) and
/// through the reference core pipeline, for `/engine/benchmark`.
pub async fn benchmark_engine(AxumState(state): AxumState<AppState>) -> Json<BenchmarkResult> {
    let probe = crate::engines::router::canned_probe_snapshot();

    let primary_latency_ms = if let Some(client) = state.router.primary_client() {
        let mut scratch = SessionAnalyticsState::scratch();
        let started = Instant::now();
        let ok = client.process_core(&probe, &mut scratch).await.is_ok();
        ok.then(|| started.elapsed().as_secs_f64() * 1000.0)
    } else {
        None
    };

    let mut scratch = SessionAnalyticsState::scratch();
    let started = Instant::now();
    let _ = pipeline::run_core(&mut scratch, &probe);
    let secondary_latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    Json(BenchmarkResult {
        primary_available: primary_latency_ms.is_some(),
        primary_latency_ms,
        secondary_latency_ms,
    })
}
