//! LIQUIDITY_GAP and DEPTH_SHOCK detectors.
//!
//! DEPTH_SHOCK is stateless given the previous tick's depth sums, which the
//! caller must capture before `IncrementalMetrics::compute` overwrites them.

use crate::models::{Alert, AlertType, Level, LiquidityGapRecord, Severity, Side};

const GAP_VOLUME_THRESHOLD: f64 = 50.0;
const GAP_SCAN_LEVELS: usize = 10;
const DEPTH_SHOCK_DROP: f64 = 0.3;
const EPS: f64 = 1e-9;

pub struct LiquidityGapResult {
    pub gap_count: usize,
    pub gap_severity_score: f64,
    pub records: Vec<LiquidityGapRecord>,
    pub alert: Option<Alert>,
}

pub fn detect_liquidity_gaps(bids: &[Level], asks: &[Level]) -> LiquidityGapResult {
    let mut records = Vec::new();
    let mut gap_severity_score = 0.0;

    scan_side(bids, Side::Bid, &mut records, &mut gap_severity_score);
    scan_side(asks, Side::Ask, &mut records, &mut gap_severity_score);

    let gap_count = records.len();
    let alert = if gap_count == 0 {
        None
    } else {
        let min_level = records.iter().map(|r| r.level_index).min().unwrap_or(usize::MAX);
        let severity = if gap_count > 6 || min_level <= 2 {
            Severity::Critical
        } else if gap_count > 3 {
            Severity::High
        } else {
            Severity::Medium
        };
        let affected_levels: Vec<usize> = records.iter().map(|r| r.level_index).collect();
        Some(
            Alert::new(
                AlertType::LiquidityGap,
                severity,
                format!("{gap_count} liquidity gap(s) detected in top {GAP_SCAN_LEVELS} levels"),
            )
            .with_evidence("gap_count", gap_count as i64)
            .with_evidence("gap_severity_score", gap_severity_score)
            .with_evidence(
                "affected_levels",
                serde_json::to_value(&affected_levels).unwrap_or_default(),
            ),
        )
    };

    LiquidityGapResult {
        gap_count,
        gap_severity_score,
        records,
        alert,
    }
}

fn scan_side(
    levels: &[Level],
    side: Side,
    records: &mut Vec<LiquidityGapRecord>,
    gap_severity_score: &mut f64,
) {
    for (i, level) in levels.iter().take(GAP_SCAN_LEVELS).enumerate() {
        if level.volume < GAP_VOLUME_THRESHOLD {
            let risk_score =
                (((GAP_SCAN_LEVELS - i) as f64) * 15.0 + (GAP_VOLUME_THRESHOLD - level.volume) * 2.0)
                    .clamp(0.0, 100.0);
            *gap_severity_score += ((GAP_SCAN_LEVELS - i) as f64) * 2.0;
            records.push(LiquidityGapRecord {
                side,
                level_index: i,
                price: level.price,
                volume: level.volume,
                risk_score,
            });
        }
    }
}

pub fn detect_depth_shock(
    prev_bid_depth: f64,
    prev_ask_depth: f64,
    curr_bid_depth: f64,
    curr_ask_depth: f64,
) -> Option<Alert> {
    if prev_bid_depth < EPS || prev_ask_depth < EPS {
        return None;
    }

    let bid_drop = ((prev_bid_depth - curr_bid_depth) / prev_bid_depth).max(0.0);
    let ask_drop = ((prev_ask_depth - curr_ask_depth) / prev_ask_depth).max(0.0);

    if bid_drop > DEPTH_SHOCK_DROP || ask_drop > DEPTH_SHOCK_DROP {
        Some(
            Alert::new(
                AlertType::DepthShock,
                Severity::High,
                format!("depth shock: bid_drop={bid_drop:.3}, ask_drop={ask_drop:.3}"),
            )
            .with_evidence("bid_drop", bid_drop)
            .with_evidence("ask_drop", ask_drop),
        )
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gap_scan_flags_thin_levels() {
        let bids = vec![
            Level::new(99.95, 1000.0),
            Level::new(99.94, 20.0),
            Level::new(99.93, 15.0),
            Level::new(99.92, 800.0),
            Level::new(99.91, 5.0),
        ];
        let asks = vec![
            Level::new(100.05, 1200.0),
            Level::new(100.06, 30.0),
            Level::new(100.07, 900.0),
            Level::new(100.08, 10.0),
            Level::new(100.09, 600.0),
        ];
        let result = detect_liquidity_gaps(&bids, &asks);
        assert!(result.gap_count >= 4);
        assert!(result.records.iter().any(|r| r.level_index <= 2));
    }
}
