//! WASH_TRADING detector: clusters of suspiciously matched bid/ask volume.

use crate::models::{Alert, AlertType, Level, Severity};
use crate::rings::Ring;

const SCAN_LEVELS: usize = 3;
const RING_LEN: usize = 50;
const MATCH_RATIO: f64 = 0.05;
const MIN_OBSERVATIONS: usize = 5;
const CV_THRESHOLD: f64 = 0.1;
const MEAN_MULTIPLE: f64 = 1.5;
const EPS: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct WashTradingState {
    ring: Ring<f64>,
}

impl Default for WashTradingState {
    fn default() -> Self {
        Self {
            ring: Ring::new(RING_LEN),
        }
    }
}

impl WashTradingState {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn detect_wash_trading(
    state: &mut WashTradingState,
    bids: &[Level],
    asks: &[Level],
    avg_l1_vol: f64,
) -> Option<Alert> {
    let depth = SCAN_LEVELS.min(bids.len()).min(asks.len());
    for i in 0..depth {
        let bid_vol = bids[i].volume;
        let ask_vol = asks[i].volume;
        let max_vol = bid_vol.max(ask_vol);
        if max_vol < EPS {
            continue;
        }
        let matched = (bid_vol - ask_vol).abs() / max_vol < MATCH_RATIO;
        if matched && bid_vol > avg_l1_vol {
            state.ring.push(bid_vol);
        }
    }

    if state.ring.len() < MIN_OBSERVATIONS {
        return None;
    }

    let mean = state.ring.mean();
    if mean.abs() < EPS {
        return None;
    }
    let cv = state.ring.std_dev() / mean;

    if cv < CV_THRESHOLD && mean > MEAN_MULTIPLE * avg_l1_vol {
        Some(
            Alert::new(
                AlertType::WashTrading,
                Severity::High,
                "clustered matched-volume pattern consistent with wash trading".to_string(),
            )
            .with_evidence("coefficient_of_variation", cv)
            .with_evidence("mean_volume", mean),
        )
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clustered_matched_volume_triggers() {
        let mut state = WashTradingState::new();
        let avg_l1_vol = 100.0;
        for _ in 0..10 {
            let bids = vec![Level::new(99.95, 200.0)];
            let asks = vec![Level::new(100.05, 202.0)];
            let _ = detect_wash_trading(&mut state, &bids, &asks, avg_l1_vol);
        }
        let bids = vec![Level::new(99.95, 200.0)];
        let asks = vec![Level::new(100.05, 202.0)];
        let alert = detect_wash_trading(&mut state, &bids, &asks, avg_l1_vol);
        assert!(alert.is_some());
    }
}
