//! LAYERING detector: stacked large orders on one side of the book.

use crate::models::{Alert, AlertType, Level, Severity, Side};

const SCAN_LEVELS: usize = 5;
const LARGE_MULTIPLE: f64 = 2.0;
const MIN_COUNT: usize = 3;
const MIN_EDGE: i64 = 2;
const EPS: f64 = 1e-9;

pub fn detect_layering(bids: &[Level], asks: &[Level], avg_l1_vol: f64) -> Option<Alert> {
    if avg_l1_vol.abs() < EPS {
        return None;
    }
    let bid_count = count_large(bids, avg_l1_vol);
    let ask_count = count_large(asks, avg_l1_vol);

    let (side, count, other) = if bid_count >= ask_count {
        (Side::Bid, bid_count, ask_count)
    } else {
        (Side::Ask, ask_count, bid_count)
    };

    if count < MIN_COUNT || (count as i64 - other as i64) < MIN_EDGE {
        return None;
    }

    let score = ((count as f64) * 20.0).min(100.0);
    let severity = if score > 70.0 {
        Severity::Critical
    } else {
        Severity::High
    };

    Some(
        Alert::new(
            AlertType::Layering,
            severity,
            format!("layering detected on {}: {count} large order(s)", side.as_str()),
        )
        .with_evidence("side", side.as_str())
        .with_evidence("large_order_count", count as i64)
        .with_evidence("score", score),
    )
}

fn count_large(levels: &[Level], avg_l1_vol: f64) -> usize {
    levels
        .iter()
        .take(SCAN_LEVELS)
        .filter(|l| l.volume > LARGE_MULTIPLE * avg_l1_vol)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacked_bids_trigger_layering() {
        let bids = vec![
            Level::new(99.95, 500.0),
            Level::new(99.90, 500.0),
            Level::new(99.85, 500.0),
            Level::new(99.80, 500.0),
            Level::new(99.75, 500.0),
        ];
        let asks = vec![Level::new(100.05, 50.0)];
        let alert = detect_layering(&bids, &asks, 100.0).expect("layering should trigger");
        assert_eq!(alert.evidence.get("side").unwrap(), "BID");
        let count = alert.evidence.get("large_order_count").unwrap().as_i64().unwrap();
        assert!(count >= 3);
        let score = alert.evidence.get("score").unwrap().as_f64().unwrap();
        assert!((60.0..=100.0).contains(&score));
    }
}
