//! ICEBERG detector: repeated, similarly-sized refills at the same price.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::models::{Alert, AlertType, Level, Severity, Side};

const MIN_FILLS: u32 = 8;
const MATCH_LOW: f64 = 0.8;
const MATCH_HIGH: f64 = 1.2;
const MAX_AGE_SECS: i64 = 300;

#[derive(Debug, Clone)]
struct IcebergCandidate {
    fills: u32,
    total_volume: f64,
    last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct IcebergState {
    candidates: HashMap<(Side, i64), IcebergCandidate>,
}

impl IcebergState {
    pub fn new() -> Self {
        Self::default()
    }
}

fn price_key(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

pub fn detect_iceberg(
    state: &mut IcebergState,
    bids: &[Level],
    asks: &[Level],
    now: DateTime<Utc>,
) -> Vec<Alert> {
    state
        .candidates
        .retain(|_, c| (now - c.last_seen).num_seconds() < MAX_AGE_SECS);

    let mut alerts = Vec::new();
    process_side(state, bids, Side::Bid, now, &mut alerts);
    process_side(state, asks, Side::Ask, now, &mut alerts);
    alerts
}

fn process_side(
    state: &mut IcebergState,
    levels: &[Level],
    side: Side,
    now: DateTime<Utc>,
    alerts: &mut Vec<Alert>,
) {
    for level in levels {
        let key = (side, price_key(level.price));
        let entry = state.candidates.entry(key).or_insert(IcebergCandidate {
            fills: 0,
            total_volume: 0.0,
            last_seen: now,
        });

        let avg_fill_before = if entry.fills > 0 {
            entry.total_volume / entry.fills as f64
        } else {
            level.volume
        };

        entry.fills += 1;
        entry.total_volume += level.volume;
        entry.last_seen = now;

        let matured = entry.fills >= MIN_FILLS
            && level.volume >= MATCH_LOW * avg_fill_before
            && level.volume <= MATCH_HIGH * avg_fill_before;

        if matured {
            alerts.push(
                Alert::new(
                    AlertType::IcebergOrder,
                    Severity::Medium,
                    format!("iceberg order detected on {} at {:.2}", side.as_str(), level.price),
                )
                .with_evidence("side", side.as_str())
                .with_evidence("fill_count", entry.fills as i64)
                .with_evidence("price", level.price),
            );
            state.candidates.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twelve_identical_refills_emit_exactly_one_alert() {
        let mut state = IcebergState::new();
        let now = Utc::now();
        let mut total_alerts = 0;
        for _ in 0..12 {
            let bids = vec![Level::new(99.95, 100.0)];
            let asks = vec![Level::new(100.05, 5000.0)];
            let alerts = detect_iceberg(&mut state, &bids, &asks, now);
            total_alerts += alerts
                .iter()
                .filter(|a| a.evidence.get("side").map(|s| s == "BID").unwrap_or(false))
                .count();
        }
        assert_eq!(total_alerts, 1);
    }
}
