//! HEAVY_IMBALANCE, REGIME, and PROCESSING_SLOW: single-tick checks against
//! already-computed metrics, with no dedicated history of their own.

use crate::models::{Alert, AlertType, Severity};
use crate::regime::DEFAULT_K;

const OBI_THRESHOLD: f64 = 0.5;
const PROCESSING_SLOW_MS: f64 = 100.0;

pub fn detect_heavy_imbalance(obi: f64) -> Option<Alert> {
    if obi.abs() <= OBI_THRESHOLD {
        return None;
    }
    let direction = if obi > 0.0 { "bid" } else { "ask" };
    Some(
        Alert::new(
            AlertType::HeavyImbalance,
            Severity::High,
            format!("heavy order book imbalance toward {direction}"),
        )
        .with_evidence("obi", obi)
        .with_evidence("direction", direction),
    )
}

pub fn detect_regime(regime: usize, volatility: f64) -> Option<Alert> {
    if regime == 1 {
        Some(
            Alert::new(
                AlertType::Regime,
                Severity::Medium,
                "market entering a stressed regime",
            )
            .with_evidence("regime", regime as i64)
            .with_evidence("volatility", volatility),
        )
    } else if regime == DEFAULT_K - 1 {
        Some(
            Alert::new(
                AlertType::Regime,
                Severity::Critical,
                "market in crisis regime",
            )
            .with_evidence("regime", regime as i64)
            .with_evidence("volatility", volatility),
        )
    } else {
        None
    }
}

pub fn detect_processing_slow(processing_ms: f64) -> Option<Alert> {
    if processing_ms > PROCESSING_SLOW_MS {
        Some(
            Alert::new(
                AlertType::ProcessingSlow,
                Severity::Medium,
                format!("tick processing took {processing_ms:.1}ms"),
            )
            .with_evidence("processing_ms", processing_ms),
        )
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_bid_imbalance_triggers() {
        let alert = detect_heavy_imbalance(0.7).expect("should trigger");
        assert_eq!(alert.evidence.get("direction").unwrap(), "bid");
    }

    #[test]
    fn calm_regime_does_not_trigger() {
        assert!(detect_regime(0, 0.1).is_none());
    }

    #[test]
    fn crisis_regime_triggers_critical() {
        let alert = detect_regime(DEFAULT_K - 1, 5.0).expect("should trigger");
        assert_eq!(alert.severity, Severity::Critical);
    }
}
