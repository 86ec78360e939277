//! QUOTE_STUFFING: abnormal update-rate detector.

use chrono::{DateTime, Utc};

use crate::models::{Alert, AlertType, Severity};
use crate::rings::Ring;

const TIMESTAMP_RING_LEN: usize = 100;
const RATE_RING_LEN: usize = 20;
const RATE_THRESHOLD: f64 = 20.0;
const RATE_MULTIPLE: f64 = 3.0;

#[derive(Debug, Clone)]
pub struct QuoteStuffingState {
    timestamps: Ring<DateTime<Utc>>,
    rate_history: Ring<f64>,
}

impl Default for QuoteStuffingState {
    fn default() -> Self {
        Self {
            timestamps: Ring::new(TIMESTAMP_RING_LEN),
            rate_history: Ring::new(RATE_RING_LEN),
        }
    }
}

impl QuoteStuffingState {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn detect_quote_stuffing(state: &mut QuoteStuffingState, timestamp: DateTime<Utc>) -> Option<Alert> {
    state.timestamps.push(timestamp);
    let update_rate = state
        .timestamps
        .iter()
        .filter(|ts| (timestamp - **ts).num_milliseconds() <= 1000)
        .count() as f64;

    let avg_rate = state.rate_history.mean();
    let alert = if update_rate > RATE_THRESHOLD && update_rate > RATE_MULTIPLE * avg_rate {
        Some(
            Alert::new(
                AlertType::QuoteStuffing,
                Severity::Critical,
                format!("update rate {update_rate} exceeds {RATE_MULTIPLE}x the recent average"),
            )
            .with_evidence("update_rate", update_rate)
            .with_evidence("avg_update_rate", avg_rate),
        )
    } else {
        None
    };

    state.rate_history.push(update_rate);
    alert
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn burst_of_updates_within_one_second_triggers() {
        let mut state = QuoteStuffingState::new();
        let base = Utc::now();
        for i in 0..5 {
            detect_quote_stuffing(&mut state, base + ChronoDuration::milliseconds(i * 50));
        }
        let mut alert = None;
        for i in 0..30 {
            alert = detect_quote_stuffing(&mut state, base + ChronoDuration::milliseconds(300 + i * 10));
        }
        assert!(alert.is_some());
    }
}
