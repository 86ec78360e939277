//! SPOOFING: L1 cancel-without-move detector.

use crate::models::{Alert, AlertType, Level, Severity, Side};
use crate::rings::Ring;

const L1_VOL_RING_LEN: usize = 20;
const DECAY_CADENCE: u64 = 10;
const PRICE_EPS: f64 = 1e-3;
const EPS: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct SpoofingState {
    l1_vol_ring: Ring<f64>,
    event_count: u32,
    tick_count: u64,
}

impl Default for SpoofingState {
    fn default() -> Self {
        Self {
            l1_vol_ring: Ring::new(L1_VOL_RING_LEN),
            event_count: 0,
            tick_count: 0,
        }
    }
}

impl SpoofingState {
    pub fn new() -> Self {
        Self::default()
    }
}

struct SideTrigger {
    side: Side,
    volume_ratio: f64,
}

/// Continuous evidence computed every tick, plus an alert only on an actual
/// cancel-without-move trigger.
pub struct SpoofingOutput {
    pub volume_volatility: f64,
    pub spoofing_risk: f64,
    pub alert: Option<Alert>,
}

pub fn detect_spoofing(
    state: &mut SpoofingState,
    prev_bid: Option<Level>,
    prev_ask: Option<Level>,
    curr_bid: Level,
    curr_ask: Level,
    avg_l1_vol: f64,
) -> SpoofingOutput {
    let l1_vol = (curr_bid.volume + curr_ask.volume) / 2.0;
    state.l1_vol_ring.push(l1_vol);

    let bid_trigger = prev_bid.and_then(|prev| side_trigger(Side::Bid, prev, curr_bid, avg_l1_vol));
    let ask_trigger = prev_ask.and_then(|prev| side_trigger(Side::Ask, prev, curr_ask, avg_l1_vol));
    let trigger = bid_trigger.or(ask_trigger);

    if trigger.is_some() {
        state.event_count += 1;
    }

    state.tick_count += 1;
    if state.tick_count % DECAY_CADENCE == 0 {
        state.event_count = state.event_count.saturating_sub(1);
    }

    let mean = state.l1_vol_ring.mean();
    let volume_volatility = if mean.abs() < EPS {
        0.0
    } else {
        state.l1_vol_ring.std_dev() / mean
    };

    let third_term = if l1_vol > 4.0 * avg_l1_vol {
        30.0
    } else if l1_vol > 2.0 * avg_l1_vol {
        15.0
    } else {
        0.0
    };

    let spoofing_risk = ((volume_volatility * 50.0).min(30.0)
        + (state.event_count as f64 * 5.0).min(40.0)
        + third_term)
        .clamp(0.0, 100.0);

    let alert = trigger.map(|trigger| {
        Alert::new(
            AlertType::Spoofing,
            Severity::Critical,
            format!("spoofing detected on {}", trigger.side.as_str()),
        )
        .with_evidence("side", trigger.side.as_str())
        .with_evidence("volume_ratio", trigger.volume_ratio)
        .with_evidence("spoofing_risk", spoofing_risk)
    });

    SpoofingOutput {
        volume_volatility,
        spoofing_risk,
        alert,
    }
}

fn side_trigger(side: Side, prev: Level, curr: Level, avg_l1_vol: f64) -> Option<SideTrigger> {
    if avg_l1_vol.abs() < EPS {
        return None;
    }
    let cancelled = prev.volume > 3.0 * avg_l1_vol
        && curr.volume < 0.3 * avg_l1_vol
        && (curr.price - prev.price).abs() < PRICE_EPS;
    if !cancelled {
        return None;
    }
    let volume_ratio = prev.volume / curr.volume.max(EPS);
    Some(SideTrigger { side, volume_ratio })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_tick_spoof_sequence_triggers_on_third() {
        let mut state = SpoofingState::new();
        let ask = Level::new(100.05, 1000.0);
        let avg_l1_vol = 1000.0;

        let bid1 = Level::new(99.95, 1000.0);
        let bid2 = Level::new(99.95, 10000.0);
        let bid3 = Level::new(99.95, 50.0);

        assert!(detect_spoofing(&mut state, None, None, bid1, ask, avg_l1_vol).alert.is_none());
        assert!(detect_spoofing(&mut state, Some(bid1), Some(ask), bid2, ask, avg_l1_vol)
            .alert
            .is_none());
        let out = detect_spoofing(&mut state, Some(bid2), Some(ask), bid3, ask, avg_l1_vol);
        let alert = out.alert.expect("spoof should trigger on third tick");
        assert_eq!(alert.evidence.get("side").unwrap(), "BID");
        let ratio = alert.evidence.get("volume_ratio").unwrap().as_f64().unwrap();
        assert!((ratio - 200.0).abs() < 1.0);
        assert!(out.spoofing_risk > 0.0);
    }
}
