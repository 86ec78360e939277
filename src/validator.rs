//! Component A: accept or repair a raw snapshot before it enters the pipeline.

use crate::models::Snapshot;

const DEFAULT_PRICE: f64 = 100.0;
const DEFAULT_VOLUME: f64 = 0.0;
const MAX_SPREAD_RATIO: f64 = 0.1;

/// Outcome of validating (and possibly sanitizing) a raw snapshot.
pub enum ValidationOutcome {
    /// Snapshot was clean; `warnings` are informational only (e.g. a crossed
    /// book) and do not block further processing.
    Accepted { snapshot: Snapshot, warnings: Vec<String> },
    /// Numeric fields were repaired with typed defaults and re-validated
    /// successfully.
    Sanitized {
        snapshot: Snapshot,
        repairs: Vec<String>,
        warnings: Vec<String>,
    },
    /// Required fields missing, or a repaired snapshot still failed
    /// re-validation. The pipeline must short-circuit for this tick.
    Fatal { reasons: Vec<String> },
}

struct NumericCheck {
    defects: Vec<String>,
    warnings: Vec<String>,
}

pub struct Validator;

impl Validator {
    pub fn validate(raw: &Snapshot) -> ValidationOutcome {
        if let Some(reasons) = Self::required_fields(raw) {
            return ValidationOutcome::Fatal { reasons };
        }

        let first = Self::numeric_check(raw);
        if first.defects.is_empty() {
            return ValidationOutcome::Accepted {
                snapshot: raw.clone(),
                warnings: first.warnings,
            };
        }

        let sanitized = Self::sanitize(raw);
        let second = Self::numeric_check(&sanitized);
        if second.defects.is_empty() {
            ValidationOutcome::Sanitized {
                snapshot: sanitized,
                repairs: first.defects,
                warnings: second.warnings,
            }
        } else {
            ValidationOutcome::Fatal {
                reasons: second.defects,
            }
        }
    }

    fn required_fields(raw: &Snapshot) -> Option<Vec<String>> {
        let mut reasons = Vec::new();
        if raw.bids.is_empty() {
            reasons.push("bids: required, non-empty".to_string());
        }
        if raw.asks.is_empty() {
            reasons.push("asks: required, non-empty".to_string());
        }
        if raw.mid_price.is_none() {
            reasons.push("mid_price: required".to_string());
        }
        if reasons.is_empty() {
            None
        } else {
            Some(reasons)
        }
    }

    fn numeric_check(snap: &Snapshot) -> NumericCheck {
        let mut defects = Vec::new();
        let mut warnings = Vec::new();

        for (i, level) in snap.bids.iter().enumerate() {
            if !is_finite_positive(level.price) {
                defects.push(format!("bids[{i}].price invalid"));
            }
            if !is_finite_nonneg(level.volume) {
                defects.push(format!("bids[{i}].volume invalid"));
            }
        }
        for (i, level) in snap.asks.iter().enumerate() {
            if !is_finite_positive(level.price) {
                defects.push(format!("asks[{i}].price invalid"));
            }
            if !is_finite_nonneg(level.volume) {
                defects.push(format!("asks[{i}].volume invalid"));
            }
        }

        if let (Some(bid), Some(ask)) = (snap.best_bid(), snap.best_ask()) {
            if !(bid.price < ask.price) {
                warnings.push("crossed book: best_bid >= best_ask".to_string());
            } else {
                let spread = ask.price - bid.price;
                if spread > MAX_SPREAD_RATIO * ask.price {
                    warnings.push(format!(
                        "spread {spread:.4} exceeds {MAX_SPREAD_RATIO} x best_ask"
                    ));
                }
            }
        }

        NumericCheck { defects, warnings }
    }

    fn sanitize(raw: &Snapshot) -> Snapshot {
        let mut snap = raw.clone();
        for level in snap.bids.iter_mut() {
            if !is_finite_positive(level.price) {
                level.price = DEFAULT_PRICE;
            }
            if !is_finite_nonneg(level.volume) {
                level.volume = DEFAULT_VOLUME;
            }
        }
        for level in snap.asks.iter_mut() {
            if !is_finite_positive(level.price) {
                level.price = DEFAULT_PRICE;
            }
            if !is_finite_nonneg(level.volume) {
                level.volume = DEFAULT_VOLUME;
            }
        }
        snap
    }
}

fn is_finite_positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn is_finite_nonneg(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snap(bids: Vec<(f64, f64)>, asks: Vec<(f64, f64)>) -> Snapshot {
        Snapshot {
            timestamp: Utc::now(),
            bids: bids.into_iter().map(|(p, v)| crate::models::Level::new(p, v)).collect(),
            asks: asks.into_iter().map(|(p, v)| crate::models::Level::new(p, v)).collect(),
            mid_price: Some(100.0),
            trade_volume: None,
            last_trade_price: None,
            symbol: None,
            exchange_ts: None,
            ingest_ts: None,
        }
    }

    #[test]
    fn clean_snapshot_is_accepted() {
        let s = snap(vec![(99.95, 100.0)], vec![(100.05, 100.0)]);
        match Validator::validate(&s) {
            ValidationOutcome::Accepted { warnings, .. } => assert!(warnings.is_empty()),
            _ => panic!("expected accepted"),
        }
    }

    #[test]
    fn missing_bids_is_fatal() {
        let mut s = snap(vec![(99.95, 100.0)], vec![(100.05, 100.0)]);
        s.bids.clear();
        match Validator::validate(&s) {
            ValidationOutcome::Fatal { reasons } => assert!(!reasons.is_empty()),
            _ => panic!("expected fatal"),
        }
    }

    #[test]
    fn negative_volume_is_sanitized() {
        let s = snap(vec![(99.95, -5.0)], vec![(100.05, 100.0)]);
        match Validator::validate(&s) {
            ValidationOutcome::Sanitized { snapshot, repairs, .. } => {
                assert!(!repairs.is_empty());
                assert_eq!(snapshot.bids[0].volume, 0.0);
            }
            _ => panic!("expected sanitized"),
        }
    }

    #[test]
    fn nan_price_sanitizes_to_default() {
        let s = snap(vec![(f64::NAN, 10.0)], vec![(100.05, 100.0)]);
        match Validator::validate(&s) {
            ValidationOutcome::Sanitized { snapshot, .. } => {
                assert_eq!(snapshot.bids[0].price, DEFAULT_PRICE);
            }
            _ => panic!("expected sanitized"),
        }
    }
}
