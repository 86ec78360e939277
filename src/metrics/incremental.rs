//! Component B: per-tick microstructure metrics and EWMA baselines.

use crate::models::{Level, Snapshot};
use crate::rings::Ring;

/// Divisions smaller than this are treated as degenerate; the guarded
/// metric is defined as 0 (or the documented safe fallback) instead.
const EPS: f64 = 1e-9;
const EWMA_ALPHA: f64 = 0.05;
const OBI_DEPTH: usize = 5;
const PRICE_RING_LEN: usize = 20;
const FEATURE_RING_LEN: usize = 512;
/// Not part of the external configuration surface: a fixed reference tick
/// size used only to scale `divergence` into `divergence_score`.
const TICK_SIZE: f64 = 0.01;

/// Per-session state for component B, owned exclusively by that session's
/// analytics worker.
#[derive(Debug, Clone)]
pub struct IncrementalState {
    prev_best_bid: Option<Level>,
    prev_best_ask: Option<Level>,
    prev_bids: Vec<Level>,
    prev_asks: Vec<Level>,
    prev_total_bid_depth: f64,
    prev_total_ask_depth: f64,
    avg_spread: f64,
    avg_spread_sq: f64,
    avg_l1_vol: f64,
    price_ring: Ring<f64>,
    feature_ring: Ring<[f64; 4]>,
}

impl Default for IncrementalState {
    fn default() -> Self {
        Self {
            prev_best_bid: None,
            prev_best_ask: None,
            prev_bids: Vec::new(),
            prev_asks: Vec::new(),
            prev_total_bid_depth: 0.0,
            prev_total_ask_depth: 0.0,
            avg_spread: 0.0,
            avg_spread_sq: 0.0,
            avg_l1_vol: 0.0,
            price_ring: Ring::new(PRICE_RING_LEN),
            feature_ring: Ring::new(FEATURE_RING_LEN),
        }
    }
}

impl IncrementalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prev_best_bid(&self) -> Option<Level> {
        self.prev_best_bid
    }

    pub fn prev_best_ask(&self) -> Option<Level> {
        self.prev_best_ask
    }

    pub fn prev_bids(&self) -> &[Level] {
        &self.prev_bids
    }

    pub fn prev_asks(&self) -> &[Level] {
        &self.prev_asks
    }

    pub fn prev_total_bid_depth(&self) -> f64 {
        self.prev_total_bid_depth
    }

    pub fn prev_total_ask_depth(&self) -> f64 {
        self.prev_total_ask_depth
    }

    pub fn avg_l1_vol(&self) -> f64 {
        self.avg_l1_vol
    }

    pub fn feature_ring(&self) -> &Ring<[f64; 4]> {
        &self.feature_ring
    }

    /// Captures the book state from *before* the next `compute` call, for
    /// detectors that compare the current tick against the prior one.
    /// Must be called before `compute`, which overwrites these fields with
    /// the current tick's values.
    pub fn snapshot_prev(&self) -> PrevBookState {
        PrevBookState {
            best_bid: self.prev_best_bid(),
            best_ask: self.prev_best_ask(),
            total_bid_depth: self.prev_total_bid_depth(),
            total_ask_depth: self.prev_total_ask_depth(),
        }
    }
}

/// The previous tick's top-of-book and total depths, captured before
/// [`IncrementalMetrics::compute`] advances `IncrementalState` to the
/// current tick. Consumed by the prev-tick-dependent detectors (SPOOFING,
/// DEPTH_SHOCK).
#[derive(Debug, Clone, Copy)]
pub struct PrevBookState {
    pub best_bid: Option<Level>,
    pub best_ask: Option<Level>,
    pub total_bid_depth: f64,
    pub total_ask_depth: f64,
}

/// Output of one tick of component B, consumed by the trade classifier,
/// regime classifier, and anomaly detectors.
#[derive(Debug, Clone, Copy)]
pub struct IncrementalOutput {
    pub spread: f64,
    pub microprice: f64,
    pub obi: f64,
    pub ofi_normalized: f64,
    pub divergence: f64,
    pub divergence_score: f64,
    pub directional_prob: f64,
    pub avg_spread: f64,
    pub std_spread: f64,
    pub spread_z: f64,
    pub avg_l1_vol: f64,
    pub volatility: f64,
    pub feature_vector: [f64; 4],
}

pub struct IncrementalMetrics;

impl IncrementalMetrics {
    /// Compute one tick's metrics and advance `state`. Assumes the snapshot
    /// has already passed validation (non-empty sides, finite prices).
    pub fn compute(state: &mut IncrementalState, snap: &Snapshot) -> IncrementalOutput {
        let best_bid = snap.best_bid().expect("validated snapshot has bids");
        let best_ask = snap.best_ask().expect("validated snapshot has asks");

        let spread = (best_ask.price - best_bid.price).max(0.0);
        let microprice = compute_microprice(best_bid, best_ask);
        let mid = snap.mid_price.unwrap_or((best_bid.price + best_ask.price) / 2.0);
        let divergence = microprice - mid;
        let divergence_score = divergence / TICK_SIZE;
        let directional_prob = 100.0 * sigmoid(2.0 * divergence_score);

        let obi = compute_obi(&snap.bids, &snap.asks);
        let ofi_raw = compute_ofi(state.prev_best_bid, state.prev_best_ask, best_bid, best_ask);
        let ofi_normalized = (ofi_raw / 500.0).clamp(-1.0, 1.0);

        state.avg_spread = (1.0 - EWMA_ALPHA) * state.avg_spread + EWMA_ALPHA * spread;
        state.avg_spread_sq =
            (1.0 - EWMA_ALPHA) * state.avg_spread_sq + EWMA_ALPHA * spread * spread;
        let std_spread = (state.avg_spread_sq - state.avg_spread * state.avg_spread)
            .max(0.0)
            .sqrt();
        let spread_z = (spread - state.avg_spread) / std_spread.max(1e-6);

        let l1_vol = (best_bid.volume + best_ask.volume) / 2.0;
        state.avg_l1_vol = (1.0 - EWMA_ALPHA) * state.avg_l1_vol + EWMA_ALPHA * l1_vol;

        state.price_ring.push(mid);
        let volatility = short_window_volatility(&state.price_ring);

        let feature_vector = [
            spread_z,
            obi.abs(),
            volatility,
            ofi_normalized.abs(),
        ];
        state.feature_ring.push(feature_vector);

        state.prev_best_bid = Some(best_bid);
        state.prev_best_ask = Some(best_ask);
        state.prev_bids = snap.bids.clone();
        state.prev_asks = snap.asks.clone();
        state.prev_total_bid_depth = snap.total_bid_depth();
        state.prev_total_ask_depth = snap.total_ask_depth();

        IncrementalOutput {
            spread,
            microprice,
            obi,
            ofi_normalized,
            divergence,
            divergence_score,
            directional_prob,
            avg_spread: state.avg_spread,
            std_spread,
            spread_z,
            avg_l1_vol: state.avg_l1_vol,
            volatility,
            feature_vector,
        }
    }
}

fn compute_microprice(best_bid: Level, best_ask: Level) -> f64 {
    let denom = best_bid.volume + best_ask.volume;
    if denom.abs() < EPS {
        return (best_bid.price + best_ask.price) / 2.0;
    }
    (best_bid.volume * best_ask.price + best_ask.volume * best_bid.price) / denom
}

fn compute_obi(bids: &[Level], asks: &[Level]) -> f64 {
    let depth = OBI_DEPTH.min(bids.len()).min(asks.len());
    if depth == 0 {
        return 0.0;
    }
    let mut bid_weighted = 0.0;
    let mut ask_weighted = 0.0;
    for i in 0..depth {
        let w = (-0.5 * i as f64).exp();
        bid_weighted += w * bids[i].volume;
        ask_weighted += w * asks[i].volume;
    }
    let denom = bid_weighted + ask_weighted;
    if denom.abs() < EPS {
        return 0.0;
    }
    (bid_weighted - ask_weighted) / denom
}

fn compute_ofi(
    prev_bid: Option<Level>,
    prev_ask: Option<Level>,
    curr_bid: Level,
    curr_ask: Level,
) -> f64 {
    let bid_term = match prev_bid {
        None => 0.0,
        Some(prev) => {
            if curr_bid.price > prev.price {
                curr_bid.volume
            } else if curr_bid.price < prev.price {
                -prev.volume
            } else {
                curr_bid.volume - prev.volume
            }
        }
    };
    let ask_term = match prev_ask {
        None => 0.0,
        Some(prev) => {
            if curr_ask.price > prev.price {
                prev.volume
            } else if curr_ask.price < prev.price {
                -curr_ask.volume
            } else {
                -(curr_ask.volume - prev.volume)
            }
        }
    };
    bid_term + ask_term
}

fn short_window_volatility(price_ring: &Ring<f64>) -> f64 {
    if price_ring.len() < 20 {
        return 0.0;
    }
    let prices: Vec<f64> = price_ring.tail(20).copied().collect();
    let mut log_returns = Vec::with_capacity(prices.len() - 1);
    for window in prices.windows(2) {
        let (prev, curr) = (window[0], window[1]);
        if prev.abs() < EPS || curr.abs() < EPS {
            continue;
        }
        log_returns.push((curr / prev).ln());
    }
    if log_returns.len() < 2 {
        return 0.0;
    }
    let mean = log_returns.iter().sum::<f64>() / log_returns.len() as f64;
    let var = log_returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / log_returns.len() as f64;
    var.max(0.0).sqrt() * 1000.0
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snap(bids: Vec<(f64, f64)>, asks: Vec<(f64, f64)>, mid: f64) -> Snapshot {
        Snapshot {
            timestamp: Utc::now(),
            bids: bids.into_iter().map(|(p, v)| Level::new(p, v)).collect(),
            asks: asks.into_iter().map(|(p, v)| Level::new(p, v)).collect(),
            mid_price: Some(mid),
            trade_volume: None,
            last_trade_price: None,
            symbol: None,
            exchange_ts: None,
            ingest_ts: None,
        }
    }

    #[test]
    fn microprice_lies_between_bid_and_ask() {
        let mut state = IncrementalState::new();
        let s = snap(vec![(99.95, 1000.0)], vec![(100.05, 500.0)], 100.0);
        let out = IncrementalMetrics::compute(&mut state, &s);
        assert!(out.microprice >= 99.95 && out.microprice <= 100.05);
    }

    #[test]
    fn ofi_normalized_is_bounded() {
        let mut state = IncrementalState::new();
        let a = snap(vec![(99.95, 1000.0)], vec![(100.05, 1000.0)], 100.0);
        let b = snap(vec![(99.95, 100000.0)], vec![(100.05, 1000.0)], 100.0);
        IncrementalMetrics::compute(&mut state, &a);
        let out = IncrementalMetrics::compute(&mut state, &b);
        assert!(out.ofi_normalized >= -1.0 && out.ofi_normalized <= 1.0);
    }

    #[test]
    fn spread_is_never_negative() {
        let mut state = IncrementalState::new();
        let s = snap(vec![(99.95, 10.0)], vec![(100.05, 10.0)], 100.0);
        let out = IncrementalMetrics::compute(&mut state, &s);
        assert!(out.spread >= 0.0);
    }

    #[test]
    fn ewma_is_convex_combination() {
        let mut state = IncrementalState::new();
        let s1 = snap(vec![(99.95, 10.0)], vec![(100.05, 10.0)], 100.0);
        let out1 = IncrementalMetrics::compute(&mut state, &s1);
        let s2 = snap(vec![(99.90, 10.0)], vec![(100.10, 10.0)], 100.0);
        let out2 = IncrementalMetrics::compute(&mut state, &s2);
        let expected = (1.0 - EWMA_ALPHA) * out1.avg_spread + EWMA_ALPHA * out2.spread;
        assert!((out2.avg_spread - expected).abs() < 1e-9);
    }
}
