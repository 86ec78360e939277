//! MOMENTUM_IGNITION detector: fast, volume-confirmed, directionally
//! consistent price moves.

use crate::models::{Alert, AlertType, Severity};
use crate::rings::Ring;

const RING_LEN: usize = 20;
const DELTA_THRESHOLD: f64 = 0.002;
const VOLUME_MULTIPLE: f64 = 2.5;
const CONSECUTIVE_RETURNS: usize = 3;
const EPS: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct MomentumState {
    mid_ring: Ring<f64>,
}

impl Default for MomentumState {
    fn default() -> Self {
        Self {
            mid_ring: Ring::new(RING_LEN),
        }
    }
}

impl MomentumState {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn detect_momentum_ignition(
    state: &mut MomentumState,
    mid: f64,
    l1_vol: f64,
    avg_l1_vol: f64,
) -> Option<Alert> {
    state.mid_ring.push(mid);

    if state.mid_ring.len() < CONSECUTIVE_RETURNS + 1 {
        return None;
    }

    let recent: Vec<f64> = state.mid_ring.tail(CONSECUTIVE_RETURNS + 1).copied().collect();
    let mut returns = Vec::with_capacity(CONSECUTIVE_RETURNS);
    for w in recent.windows(2) {
        returns.push(w[1] - w[0]);
    }

    let delta = *returns.last().unwrap_or(&0.0);
    if mid.abs() < EPS || (delta / mid).abs() <= DELTA_THRESHOLD {
        return None;
    }
    if l1_vol <= VOLUME_MULTIPLE * avg_l1_vol {
        return None;
    }

    let same_sign = returns.iter().all(|r| *r > 0.0) || returns.iter().all(|r| *r < 0.0);
    if !same_sign {
        return None;
    }

    let direction = if delta > 0.0 { "up" } else { "down" };
    Some(
        Alert::new(
            AlertType::MomentumIgnition,
            Severity::Critical,
            format!("momentum ignition {direction}: {CONSECUTIVE_RETURNS} consecutive same-sign returns"),
        )
        .with_evidence("delta_mid_ratio", delta / mid)
        .with_evidence("l1_vol", l1_vol)
        .with_evidence("avg_l1_vol", avg_l1_vol),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sustained_move_with_volume_triggers() {
        let mut state = MomentumState::new();
        let mids = [100.0, 100.0, 100.3, 100.6, 101.0];
        let mut alert = None;
        for m in mids {
            alert = detect_momentum_ignition(&mut state, m, 300.0, 100.0);
        }
        assert!(alert.is_some());
    }

    #[test]
    fn small_move_does_not_trigger() {
        let mut state = MomentumState::new();
        let mids = [100.0, 100.01, 100.02, 100.03];
        let mut alert = None;
        for m in mids {
            alert = detect_momentum_ignition(&mut state, m, 300.0, 100.0);
        }
        assert!(alert.is_none());
    }
}
