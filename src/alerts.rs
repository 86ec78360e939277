//! Component F: alert deduplication, escalation, and the audit ring.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::models::{Alert, AlertType};
use crate::rings::Ring;

const GC_CADENCE: Duration = Duration::from_secs(60);

fn default_escalation_threshold(alert_type: AlertType) -> Option<u32> {
    match alert_type {
        AlertType::Spoofing => Some(3),
        AlertType::DepthShock => Some(2),
        AlertType::HeavyImbalance => Some(5),
        _ => None,
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: crate::models::Severity,
    pub message: String,
}

/// Per-session state for component F.
#[derive(Clone)]
pub struct AlertManagerState {
    dedup: HashMap<u64, DateTime<Utc>>,
    type_counts: HashMap<AlertType, u32>,
    audit: Ring<AuditEntry>,
    last_gc: Instant,
}

impl AlertManagerState {
    pub fn new(audit_ring_size: usize) -> Self {
        Self {
            dedup: HashMap::new(),
            type_counts: HashMap::new(),
            audit: Ring::new(audit_ring_size),
            last_gc: Instant::now(),
        }
    }

    pub fn audit_ring(&self) -> &Ring<AuditEntry> {
        &self.audit
    }
}

pub struct AlertManager;

impl AlertManager {
    /// Dedup + escalate a batch of freshly-emitted alerts and append the
    /// accepted ones to the audit ring. Call once per tick.
    pub fn process(
        state: &mut AlertManagerState,
        alerts: Vec<Alert>,
        now: DateTime<Utc>,
        dedup_window: Duration,
    ) -> Vec<Alert> {
        Self::maybe_gc(state, now, dedup_window);

        let mut accepted = Vec::with_capacity(alerts.len());
        for mut alert in alerts {
            let key = alert.dedup_key();
            if let Some(last_seen) = state.dedup.get(&key) {
                if now.signed_duration_since(*last_seen).to_std().unwrap_or(Duration::ZERO)
                    < dedup_window
                {
                    continue;
                }
            }
            state.dedup.insert(key, now);

            let count = state
                .type_counts
                .entry(alert.alert_type)
                .and_modify(|c| *c += 1)
                .or_insert(1);

            if let Some(threshold) = default_escalation_threshold(alert.alert_type) {
                if *count >= threshold {
                    alert.severity = alert.severity.bump();
                    alert.message = format!("{} [ESCALATED: {count} occurrences]", alert.message);
                }
            }

            state.audit.push(AuditEntry {
                timestamp: alert.timestamp,
                alert_type: alert.alert_type,
                severity: alert.severity,
                message: alert.message.clone(),
            });

            accepted.push(alert);
        }
        accepted
    }

    fn maybe_gc(state: &mut AlertManagerState, now: DateTime<Utc>, dedup_window: Duration) {
        if state.last_gc.elapsed() < GC_CADENCE {
            return;
        }
        let cutoff = dedup_window * 2;
        state.dedup.retain(|_, last_seen| {
            now.signed_duration_since(*last_seen).to_std().unwrap_or(Duration::ZERO) < cutoff
        });
        state.last_gc = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    #[test]
    fn duplicate_alert_within_window_is_suppressed() {
        let mut state = AlertManagerState::new(100);
        let now = Utc::now();
        let a = Alert::new(AlertType::LiquidityGap, Severity::Medium, "gap");
        let b = Alert::new(AlertType::LiquidityGap, Severity::Medium, "gap");
        let accepted1 = AlertManager::process(&mut state, vec![a], now, Duration::from_secs(5));
        let accepted2 =
            AlertManager::process(&mut state, vec![b], now + chrono::Duration::seconds(1), Duration::from_secs(5));
        assert_eq!(accepted1.len(), 1);
        assert_eq!(accepted2.len(), 0);
    }

    #[test]
    fn escalation_bumps_severity_after_threshold() {
        let mut state = AlertManagerState::new(100);
        let base = Utc::now();
        let mut last_severity = Severity::Medium;
        for i in 0..3 {
            let now = base + chrono::Duration::seconds(i * 10);
            let alert = Alert::new(AlertType::DepthShock, Severity::High, format!("shock {i}"));
            let accepted = AlertManager::process(&mut state, vec![alert], now, Duration::from_secs(5));
            if let Some(a) = accepted.first() {
                last_severity = a.severity;
            }
        }
        assert_eq!(last_severity, Severity::Critical);
    }
}
