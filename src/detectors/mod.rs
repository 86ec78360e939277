//! Component E: the seven (plus three ambient) stateful anomaly detectors.
//! All run every tick; each may emit zero or more alerts.

pub mod iceberg;
pub mod imbalance;
pub mod layering;
pub mod liquidity;
pub mod momentum;
pub mod quote_stuffing;
pub mod spoofing;
pub mod wash_trading;

use chrono::{DateTime, Utc};

use crate::metrics::{IncrementalState, PrevBookState};
use crate::models::{Alert, Level, LiquidityGapRecord, Snapshot};

use iceberg::IcebergState;
use momentum::MomentumState;
use quote_stuffing::QuoteStuffingState;
use spoofing::SpoofingState;
use wash_trading::WashTradingState;

/// Per-session state for component E, owned exclusively by that session.
#[derive(Default, Clone)]
pub struct DetectorState {
    spoofing: SpoofingState,
    quote_stuffing: QuoteStuffingState,
    momentum: MomentumState,
    wash_trading: WashTradingState,
    iceberg: IcebergState,
}

impl DetectorState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Inputs the detector suite needs beyond the raw snapshot and incremental
/// state: outputs already computed by components B and D this tick, plus
/// the book state from *before* this tick for the prev-dependent detectors.
pub struct DetectorInputs<'a> {
    pub snapshot: &'a Snapshot,
    pub obi: f64,
    pub regime: usize,
    pub volatility: f64,
    pub processing_ms: f64,
    pub prev: PrevBookState,
}

pub struct DetectorOutput {
    pub alerts: Vec<Alert>,
    pub gap_count: usize,
    pub gap_severity_score: f64,
    pub liquidity_gaps: Vec<LiquidityGapRecord>,
    pub spoofing_risk: f64,
    pub volume_volatility: f64,
}

pub fn run_all(
    state: &mut DetectorState,
    incremental: &IncrementalState,
    inputs: DetectorInputs,
) -> DetectorOutput {
    let snap = inputs.snapshot;
    let mut alerts = Vec::new();

    let gap_result = liquidity::detect_liquidity_gaps(&snap.bids, &snap.asks);
    alerts.extend(gap_result.alert);

    if let Some(alert) = liquidity::detect_depth_shock(
        inputs.prev.total_bid_depth,
        inputs.prev.total_ask_depth,
        snap.total_bid_depth(),
        snap.total_ask_depth(),
    ) {
        alerts.push(alert);
    }

    let best_bid = snap.best_bid().unwrap_or(Level::new(0.0, 0.0));
    let best_ask = snap.best_ask().unwrap_or(Level::new(0.0, 0.0));
    let avg_l1_vol = incremental.avg_l1_vol();
    let l1_vol = (best_bid.volume + best_ask.volume) / 2.0;

    let spoof = spoofing::detect_spoofing(
        &mut state.spoofing,
        inputs.prev.best_bid,
        inputs.prev.best_ask,
        best_bid,
        best_ask,
        avg_l1_vol,
    );
    alerts.extend(spoof.alert);

    let stuffing_ts: DateTime<Utc> = snap.timestamp;
    if let Some(alert) = quote_stuffing::detect_quote_stuffing(&mut state.quote_stuffing, stuffing_ts) {
        alerts.push(alert);
    }

    if let Some(alert) = layering::detect_layering(&snap.bids, &snap.asks, avg_l1_vol) {
        alerts.push(alert);
    }

    let mid = snap
        .mid_price
        .unwrap_or((best_bid.price + best_ask.price) / 2.0);
    if let Some(alert) =
        momentum::detect_momentum_ignition(&mut state.momentum, mid, l1_vol, avg_l1_vol)
    {
        alerts.push(alert);
    }

    if let Some(alert) =
        wash_trading::detect_wash_trading(&mut state.wash_trading, &snap.bids, &snap.asks, avg_l1_vol)
    {
        alerts.push(alert);
    }

    alerts.extend(iceberg::detect_iceberg(
        &mut state.iceberg,
        &snap.bids,
        &snap.asks,
        snap.timestamp,
    ));

    alerts.extend(imbalance::detect_heavy_imbalance(inputs.obi));
    alerts.extend(imbalance::detect_regime(inputs.regime, inputs.volatility));
    alerts.extend(imbalance::detect_processing_slow(inputs.processing_ms));

    DetectorOutput {
        alerts,
        gap_count: gap_result.gap_count,
        gap_severity_score: gap_result.gap_severity_score,
        liquidity_gaps: gap_result.records,
        spoofing_risk: spoof.spoofing_risk,
        volume_volatility: spoof.volume_volatility,
    }
}
