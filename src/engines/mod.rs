//! Component G's engine boundary: the `PrimaryEngineClient` contract and the
//! reference pipeline it is benchmarked and raced against.

pub mod pipeline;
pub mod router;

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use crate::errors::EngineFailureKind;
use crate::models::Snapshot;

use pipeline::{CoreOutput, SessionAnalyticsState};

/// The optimized backend's contract. A real deployment reaches an
/// out-of-process engine through whatever transport it exposes; that
/// transport is outside this crate's scope, so callers only ever see this
/// trait. `process_core` must run components A-D and return a `CoreOutput`;
/// it must never run the anomaly detector suite (component E) itself, since
/// that "advanced" pass is always supplied by the secondary/reference engine
/// as an augmentation on top of the primary's result.
#[async_trait]
pub trait PrimaryEngineClient: Send + Sync {
    async fn process_core(
        &self,
        raw: &Snapshot,
        session: &mut SessionAnalyticsState,
    ) -> Result<(Snapshot, CoreOutput), EngineFailureKind>;

    /// Human-readable name surfaced by `/engine/status`.
    fn name(&self) -> &'static str {
        "primary"
    }
}

/// The only primary implementation this crate ships: it runs the same A-D
/// core pass as the reference pipeline. A real deployment would instead
/// dial out to a genuinely separate optimized process; until one is wired
/// up, this in-process stand-in lets the router, circuit breaker, and
/// augmentation logic in [`crate::processor`] exercise the real contract.
pub struct LoopbackPrimaryEngine {
    pub call_timeout: Duration,
}

impl LoopbackPrimaryEngine {
    pub fn new(call_timeout: Duration) -> Self {
        Self { call_timeout }
    }
}

#[async_trait]
impl PrimaryEngineClient for LoopbackPrimaryEngine {
    async fn process_core(
        &self,
        raw: &Snapshot,
        session: &mut SessionAnalyticsState,
    ) -> Result<(Snapshot, CoreOutput), EngineFailureKind> {
        let raw = raw.clone();
        let fut = async { pipeline::run_core(session, &raw) };
        match timeout(self.call_timeout, fut).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_validation_alert)) => Err(EngineFailureKind::Malformed),
            Err(_elapsed) => Err(EngineFailureKind::Timeout),
        }
    }
}
