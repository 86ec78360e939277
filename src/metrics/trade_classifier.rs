//! Component C: Lee-Ready trade side, effective/realized spread, V-PIN buckets.

use crate::models::TradeSide;
use crate::rings::Ring;

const EPS: f64 = 1e-9;
const VPIN_MIN_BUCKETS: usize = 10;
/// Used only for the quote-rule tie-break and the "equidistant" unknown case;
/// not part of the external configuration surface.
const TICK_SIZE: f64 = 0.01;

#[derive(Debug, Clone, Default)]
struct VpinBucket {
    volume: f64,
    buy: f64,
    sell: f64,
}

/// Per-session state for component C.
#[derive(Debug, Clone)]
pub struct TradeState {
    bucket: VpinBucket,
    bucket_volume: f64,
    completed: Ring<f64>,
    prev_mid: Option<f64>,
}

impl TradeState {
    pub fn new(bucket_volume: f64, ring_len: usize) -> Self {
        Self {
            bucket: VpinBucket::default(),
            bucket_volume,
            completed: Ring::new(ring_len),
            prev_mid: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TradeClassification {
    pub side: Option<TradeSide>,
    pub effective_spread: Option<f64>,
    pub realized_spread: Option<f64>,
    pub vpin: f64,
}

pub struct TradeClassifier;

impl TradeClassifier {
    pub fn classify(
        state: &mut TradeState,
        trade_volume: Option<f64>,
        trade_price: Option<f64>,
        mid: f64,
        best_bid: f64,
        best_ask: f64,
    ) -> TradeClassification {
        let vpin = Self::vpin_snapshot(state);

        let (volume, price) = match (trade_volume, trade_price) {
            (Some(v), Some(p)) if v > 0.0 => (v, p),
            _ => {
                state.prev_mid = Some(mid);
                return TradeClassification {
                    side: None,
                    effective_spread: None,
                    realized_spread: None,
                    vpin,
                };
            }
        };

        let side = lee_ready_side(price, mid, best_bid, best_ask);
        let effective_spread = Some(match side {
            TradeSide::Buy => 2.0 * (price - mid),
            TradeSide::Sell => 2.0 * (mid - price),
            TradeSide::Unknown => 2.0 * (price - mid).abs(),
        });
        let realized_spread = state.prev_mid.map(|prev_mid| match side {
            TradeSide::Buy => 2.0 * (price - prev_mid),
            TradeSide::Sell => 2.0 * (prev_mid - price),
            TradeSide::Unknown => 0.0,
        });

        state.bucket.volume += volume;
        match side {
            TradeSide::Buy => state.bucket.buy += volume,
            TradeSide::Sell => state.bucket.sell += volume,
            TradeSide::Unknown => {}
        }
        if state.bucket.volume >= state.bucket_volume {
            let total = state.bucket.volume.max(EPS);
            let oi = ((state.bucket.buy - state.bucket.sell).abs() / total).clamp(0.0, 1.0);
            state.completed.push(oi);
            state.bucket = VpinBucket::default();
        }

        state.prev_mid = Some(mid);

        TradeClassification {
            side: Some(side),
            effective_spread,
            realized_spread,
            vpin: Self::vpin_snapshot(state),
        }
    }

    fn vpin_snapshot(state: &TradeState) -> f64 {
        if state.completed.len() < VPIN_MIN_BUCKETS {
            return 0.0;
        }
        state.completed.mean()
    }
}

fn lee_ready_side(trade_price: f64, mid: f64, best_bid: f64, best_ask: f64) -> TradeSide {
    if trade_price > mid {
        return TradeSide::Buy;
    }
    if trade_price < mid {
        return TradeSide::Sell;
    }
    let spread = best_ask - best_bid;
    if spread < TICK_SIZE {
        return TradeSide::Unknown;
    }
    let dist_to_ask = (best_ask - trade_price).abs();
    let dist_to_bid = (trade_price - best_bid).abs();
    if dist_to_ask < dist_to_bid {
        TradeSide::Buy
    } else if dist_to_bid < dist_to_ask {
        TradeSide::Sell
    } else {
        TradeSide::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_above_mid_classifies_buy() {
        let mut state = TradeState::new(1000.0, 50);
        let out = TradeClassifier::classify(&mut state, Some(10.0), Some(100.1), 100.0, 99.95, 100.05);
        assert_eq!(out.side, Some(TradeSide::Buy));
        assert!((out.effective_spread.unwrap() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn no_trade_yields_none_side() {
        let mut state = TradeState::new(1000.0, 50);
        let out = TradeClassifier::classify(&mut state, None, None, 100.0, 99.95, 100.05);
        assert_eq!(out.side, None);
        assert_eq!(out.effective_spread, None);
    }

    #[test]
    fn vpin_stays_in_unit_interval() {
        let mut state = TradeState::new(100.0, 5);
        for i in 0..40 {
            let price = if i % 2 == 0 { 100.05 } else { 99.95 };
            let out = TradeClassifier::classify(&mut state, Some(20.0), Some(price), 100.0, 99.95, 100.05);
            assert!(out.vpin >= 0.0 && out.vpin <= 1.0);
        }
    }

    #[test]
    fn balanced_alternating_trades_give_low_vpin() {
        let mut state = TradeState::new(1000.0, 50);
        let mut last = TradeClassification { side: None, effective_spread: None, realized_spread: None, vpin: 0.0 };
        for i in 0..20 {
            let price = if i % 2 == 0 { 100.05 } else { 99.95 };
            last = TradeClassifier::classify(&mut state, Some(100.0), Some(price), 100.0, 99.95, 100.05);
        }
        assert!(last.vpin <= 0.2);
    }
}
