//! Component G: engine routing, circuit breaking via the failure counter,
//! and the primary/secondary post-processing merge.
//!
//! Grounded on the source system's snapshot processor: try primary while
//! under the failure ceiling, fall back to the reference engine on any
//! failure, and permanently demote once the ceiling is reached.

use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::warn;

use crate::engines::pipeline::{self, PipelineResult, SessionAnalyticsState};
use crate::engines::router::{EngineMode, EngineRouter};
use crate::errors::EngineFailureKind;
use crate::models::Snapshot;

pub struct SnapshotProcessor;

impl SnapshotProcessor {
    /// Processes one raw snapshot for a session, routing through whichever
    /// engine the router currently selects.
    pub async fn process(
        router: &EngineRouter,
        session: &mut SessionAnalyticsState,
        raw: &Snapshot,
        call_timeout: Duration,
    ) -> PipelineResult {
        let started_at = Instant::now();

        if router.mode() == EngineMode::Secondary {
            return Self::run_secondary(session, raw, "secondary", started_at);
        }

        let Some(client) = router.primary_client() else {
            return Self::run_secondary(session, raw, "secondary_fallback", started_at);
        };
        if router.consecutive_failures() >= router.f_max() {
            return Self::run_secondary(session, raw, "secondary_fallback", started_at);
        }

        // Attempt the primary engine against a scratch clone of session
        // state so a failed/timed-out attempt never leaves partial state
        // behind; only a successful call's mutations are committed.
        let mut scratch = session.clone();
        let outcome = timeout(call_timeout, client.process_core(raw, &mut scratch)).await;

        match outcome {
            Ok(Ok((snap, core))) => {
                *session = scratch;
                router.record_success();
                let processing_ms = started_at.elapsed().as_secs_f64() * 1000.0;
                let (anomalies, gap_count, gap_severity_score, liquidity_gaps, spoofing_risk, volume_volatility) =
                    pipeline::run_advanced(session, &snap, &core, processing_ms);
                let engine = if anomalies.is_empty() {
                    "primary"
                } else {
                    "primary+secondary_advanced"
                };
                let processing_ms = started_at.elapsed().as_secs_f64() * 1000.0;
                PipelineResult::Enriched(pipeline::build_enriched(
                    snap,
                    &core,
                    anomalies,
                    gap_count,
                    gap_severity_score,
                    liquidity_gaps,
                    spoofing_risk,
                    volume_volatility,
                    engine.to_string(),
                    processing_ms,
                ))
            }
            Ok(Err(kind)) => Self::fallback(router, session, raw, started_at, kind),
            Err(_elapsed) => Self::fallback(router, session, raw, started_at, EngineFailureKind::Timeout),
        }
    }

    fn fallback(
        router: &EngineRouter,
        session: &mut SessionAnalyticsState,
        raw: &Snapshot,
        started_at: Instant,
        kind: EngineFailureKind,
    ) -> PipelineResult {
        let demoted = router.record_failure();
        warn!(
            %kind,
            consecutive_failures = router.consecutive_failures(),
            demoted,
            "primary engine failure, falling back to secondary"
        );
        Self::run_secondary(session, raw, "secondary_fallback", started_at)
    }

    fn run_secondary(
        session: &mut SessionAnalyticsState,
        raw: &Snapshot,
        engine_tag: &str,
        started_at: Instant,
    ) -> PipelineResult {
        match pipeline::run_full(session, raw, engine_tag, started_at) {
            Ok(enriched) => PipelineResult::Enriched(enriched),
            Err(alert) => PipelineResult::Rejected { alert },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::LoopbackPrimaryEngine;
    use crate::models::Level;
    use std::sync::Arc;

    fn snap() -> Snapshot {
        Snapshot {
            timestamp: chrono::Utc::now(),
            bids: vec![Level::new(99.95, 10.0)],
            asks: vec![Level::new(100.05, 10.0)],
            mid_price: Some(100.0),
            trade_volume: None,
            last_trade_price: None,
            symbol: None,
            exchange_ts: None,
            ingest_ts: None,
        }
    }

    #[tokio::test]
    async fn secondary_mode_tags_enriched_snapshot_secondary() {
        let router = EngineRouter::new(5);
        let mut session = SessionAnalyticsState::scratch();
        let result = SnapshotProcessor::process(&router, &mut session, &snap(), Duration::from_millis(100)).await;
        match result {
            PipelineResult::Enriched(enriched) => assert_eq!(enriched.engine, "secondary"),
            PipelineResult::Rejected { .. } => panic!("expected enriched snapshot"),
        }
    }

    #[tokio::test]
    async fn primary_mode_tags_enriched_snapshot_primary() {
        let router = EngineRouter::new(5);
        let client = Arc::new(LoopbackPrimaryEngine::new(Duration::from_millis(100)));
        assert!(router.initialize(client).await);
        let mut session = SessionAnalyticsState::scratch();
        let result = SnapshotProcessor::process(&router, &mut session, &snap(), Duration::from_millis(100)).await;
        match result {
            PipelineResult::Enriched(enriched) => assert!(enriched.engine.starts_with("primary")),
            PipelineResult::Rejected { .. } => panic!("expected enriched snapshot"),
        }
    }
}
