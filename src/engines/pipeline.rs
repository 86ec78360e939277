//! The A-B-C-D "core" pass and the E-F "advanced" pass, shared by both the
//! primary and secondary engines. Primary runs core only; secondary runs
//! core+advanced in one shot, or supplies the advanced pass standalone to
//! augment a primary result.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::alerts::{AlertManager, AlertManagerState};
use crate::detectors::{self, DetectorInputs, DetectorState};
use crate::metrics::{
    IncrementalMetrics, IncrementalState, PrevBookState, TradeClassification, TradeClassifier, TradeState,
};
use crate::models::{Alert, EnrichedSnapshot, LiquidityGapRecord, Snapshot};
use crate::regime::{RegimeClassifier, RegimeState};
use crate::validator::{ValidationOutcome, Validator};

/// All per-session mutable state the analytics pipeline needs, bundled so a
/// session can own exactly one of these and pass it by `&mut` into whichever
/// engine processes the current tick.
#[derive(Clone)]
pub struct SessionAnalyticsState {
    pub incremental: IncrementalState,
    pub regime: Arc<RegimeState>,
    pub trade: TradeState,
    pub detectors: DetectorState,
    pub alerts: AlertManagerState,
    pub retrain_interval: Duration,
    pub dedup_window: Duration,
}

impl SessionAnalyticsState {
    pub fn new(vpin_bucket_volume: f64, vpin_ring_len: usize, audit_ring_size: usize, retrain_interval: Duration, dedup_window: Duration) -> Self {
        Self {
            incremental: IncrementalState::new(),
            regime: Arc::new(RegimeState::default()),
            trade: TradeState::new(vpin_bucket_volume, vpin_ring_len),
            detectors: DetectorState::new(),
            alerts: AlertManagerState::new(audit_ring_size),
            retrain_interval,
            dedup_window,
        }
    }

    /// A throwaway instance for probing a candidate primary engine at
    /// startup or on a manual `switch`. Never used to process real ticks.
    pub fn scratch() -> Self {
        Self::new(1000.0, 50, 1000, Duration::from_secs(3600), Duration::from_secs(5))
    }
}

/// Result of the A-B-C-D core pass: enough to build a usable enriched
/// snapshot, or to hand off to the advanced (E-F) pass.
pub struct CoreOutput {
    pub spread: f64,
    pub microprice: f64,
    pub obi: f64,
    pub ofi_normalized: f64,
    pub divergence: f64,
    pub directional_prob: f64,
    pub regime: usize,
    pub regime_label: String,
    pub volatility: f64,
    pub feature_vector: [f64; 4],
    pub trade: TradeClassification,
    /// Book state from before this tick, captured ahead of `compute` so the
    /// advanced pass can still compare against the prior tick after
    /// `state.incremental` has advanced to the current one.
    pub prev: PrevBookState,
}

/// Returned when validation short-circuits the pipeline for this tick.
pub enum PipelineResult {
    Enriched(EnrichedSnapshot),
    Rejected { alert: Alert },
}

pub fn run_core(state: &mut SessionAnalyticsState, raw: &Snapshot) -> Result<(Snapshot, CoreOutput), Alert> {
    let (snap, warnings) = match Validator::validate(raw) {
        ValidationOutcome::Accepted { snapshot, warnings } => (snapshot, warnings),
        ValidationOutcome::Sanitized { snapshot, warnings, .. } => (snapshot, warnings),
        ValidationOutcome::Fatal { reasons } => {
            let alert = Alert::new(
                crate::models::AlertType::DataValidationError,
                crate::models::Severity::Critical,
                format!("snapshot rejected: {}", reasons.join("; ")),
            );
            return Err(alert);
        }
    };
    let _ = warnings;

    // Captured before `compute` overwrites `state.incremental`'s prev_* fields
    // with this tick's values; the advanced pass needs the pre-tick book.
    let prev_book = state.incremental.snapshot_prev();
    let incr = IncrementalMetrics::compute(&mut state.incremental, &snap);

    RegimeClassifier::maybe_retrain(
        Arc::clone(&state.regime),
        state
            .incremental
            .feature_ring()
            .iter()
            .copied()
            .collect(),
        state.retrain_interval,
    );
    let regime_out = RegimeClassifier::predict(&state.regime, incr.feature_vector);

    let best_bid = snap.best_bid().expect("validated");
    let best_ask = snap.best_ask().expect("validated");
    let mid = snap.mid_price.unwrap_or((best_bid.price + best_ask.price) / 2.0);
    let trade = TradeClassifier::classify(
        &mut state.trade,
        snap.trade_volume,
        snap.last_trade_price,
        mid,
        best_bid.price,
        best_ask.price,
    );

    let core = CoreOutput {
        spread: incr.spread,
        microprice: incr.microprice,
        obi: incr.obi,
        ofi_normalized: incr.ofi_normalized,
        divergence: incr.divergence,
        directional_prob: incr.directional_prob,
        regime: regime_out.regime,
        regime_label: regime_out.regime_label,
        volatility: incr.volatility,
        feature_vector: incr.feature_vector,
        trade,
        prev: prev_book,
    };

    Ok((snap, core))
}

/// The "advanced" pass: anomaly detection plus alert management. Can run
/// standalone (to augment a primary-only result) or immediately after
/// `run_core` (secondary / full pipeline).
pub fn run_advanced(
    state: &mut SessionAnalyticsState,
    snap: &Snapshot,
    core: &CoreOutput,
    processing_ms: f64,
) -> (Vec<Alert>, usize, f64, Vec<LiquidityGapRecord>, f64, f64) {
    let detector_out = detectors::run_all(
        &mut state.detectors,
        &state.incremental,
        DetectorInputs {
            snapshot: snap,
            obi: core.obi,
            regime: core.regime,
            volatility: core.volatility,
            processing_ms,
            prev: core.prev,
        },
    );

    let accepted = AlertManager::process(
        &mut state.alerts,
        detector_out.alerts,
        Utc::now(),
        state.dedup_window,
    );

    (
        accepted,
        detector_out.gap_count,
        detector_out.gap_severity_score,
        detector_out.liquidity_gaps,
        detector_out.spoofing_risk,
        detector_out.volume_volatility,
    )
}

/// The reference engine's full A-F pass: core metrics immediately followed
/// by anomaly detection and alert management against the same tick.
pub fn run_full(
    state: &mut SessionAnalyticsState,
    raw: &Snapshot,
    engine_tag: &str,
    started_at: std::time::Instant,
) -> Result<EnrichedSnapshot, Alert> {
    let (snap, core) = run_core(state, raw)?;
    let processing_ms = started_at.elapsed().as_secs_f64() * 1000.0;
    let (anomalies, gap_count, gap_severity_score, liquidity_gaps, spoofing_risk, volume_volatility) =
        run_advanced(state, &snap, &core, processing_ms);
    let processing_ms = started_at.elapsed().as_secs_f64() * 1000.0;
    Ok(build_enriched(
        snap,
        &core,
        anomalies,
        gap_count,
        gap_severity_score,
        liquidity_gaps,
        spoofing_risk,
        volume_volatility,
        engine_tag.to_string(),
        processing_ms,
    ))
}

pub fn build_enriched(
    snap: Snapshot,
    core: &CoreOutput,
    anomalies: Vec<Alert>,
    gap_count: usize,
    gap_severity_score: f64,
    liquidity_gaps: Vec<LiquidityGapRecord>,
    spoofing_risk: f64,
    volume_volatility: f64,
    engine: String,
    processing_ms: f64,
) -> EnrichedSnapshot {
    EnrichedSnapshot {
        timestamp: snap.timestamp,
        bids: snap.bids,
        asks: snap.asks,
        mid_price: snap.mid_price,
        trade_volume: snap.trade_volume,
        last_trade_price: snap.last_trade_price,
        symbol: snap.symbol,
        exchange_ts: snap.exchange_ts,
        ingest_ts: snap.ingest_ts,
        spread: core.spread,
        microprice: core.microprice,
        obi: core.obi,
        ofi_normalized: core.ofi_normalized,
        divergence: core.divergence,
        directional_prob: core.directional_prob,
        regime: core.regime,
        regime_label: core.regime_label.clone(),
        vpin: core.trade.vpin,
        trade_side: core.trade.side,
        effective_spread: core.trade.effective_spread,
        realized_spread: core.trade.realized_spread,
        gap_count,
        gap_severity_score,
        spoofing_risk,
        volume_volatility,
        liquidity_gaps,
        anomalies,
        engine,
        processing_ms,
    }
}
