//! Component I: primary/secondary selection behind a single writer lock.
//! Readers (the processor, the `/engine/status` handler) take a cheap
//! snapshot of the current mode and never observe a half-initialized client.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

use crate::models::{Level, Snapshot};

use super::pipeline::SessionAnalyticsState;
use super::PrimaryEngineClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    Primary,
    Secondary,
}

struct RouterInner {
    mode: EngineMode,
    primary_client: Option<Arc<dyn PrimaryEngineClient>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub mode: EngineMode,
    pub has_primary: bool,
    pub consecutive_failures: u32,
    pub f_max: u32,
}

pub struct EngineRouter {
    inner: RwLock<RouterInner>,
    consecutive_failures: AtomicU32,
    f_max: u32,
}

impl EngineRouter {
    pub fn new(f_max: u32) -> Self {
        Self {
            inner: RwLock::new(RouterInner {
                mode: EngineMode::Secondary,
                primary_client: None,
            }),
            consecutive_failures: AtomicU32::new(0),
            f_max,
        }
    }

    /// Probes `candidate` with a canned snapshot; only on success does it
    /// commit `mode = Primary` and publish the client.
    pub async fn initialize(&self, candidate: Arc<dyn PrimaryEngineClient>) -> bool {
        let probe = canned_probe_snapshot();
        let mut scratch = SessionAnalyticsState::scratch();
        let ok = candidate.process_core(&probe, &mut scratch).await.is_ok();
        if ok {
            let mut inner = self.inner.write();
            inner.mode = EngineMode::Primary;
            inner.primary_client = Some(candidate);
            self.consecutive_failures.store(0, Ordering::Release);
            info!("engine router: primary engine online, mode=PRIMARY");
        } else {
            info!("engine router: primary engine probe failed, staying SECONDARY");
        }
        ok
    }

    /// Manual switch, atomic with respect to concurrent readers. Switching
    /// to `Primary` re-probes the given client first.
    pub async fn switch(&self, target: EngineMode, candidate: Option<Arc<dyn PrimaryEngineClient>>) -> bool {
        match target {
            EngineMode::Secondary => {
                let mut inner = self.inner.write();
                inner.mode = EngineMode::Secondary;
                true
            }
            EngineMode::Primary => match candidate {
                Some(client) => self.initialize(client).await,
                None => {
                    let inner = self.inner.read();
                    inner.primary_client.is_some() && {
                        drop(inner);
                        self.inner.write().mode = EngineMode::Primary;
                        true
                    }
                }
            },
        }
    }

    pub fn mode(&self) -> EngineMode {
        self.inner.read().mode
    }

    pub fn primary_client(&self) -> Option<Arc<dyn PrimaryEngineClient>> {
        self.inner.read().primary_client.clone()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    pub fn f_max(&self) -> u32 {
        self.f_max
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
    }

    /// Increments the failure counter; demotes permanently once it reaches
    /// `f_max`. Returns `true` if this call triggered the demotion.
    pub fn record_failure(&self) -> bool {
        let count = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        if count >= self.f_max {
            let mut inner = self.inner.write();
            if inner.mode == EngineMode::Primary {
                inner.mode = EngineMode::Secondary;
                info!(
                    consecutive_failures = count,
                    "engine router: primary failure ceiling reached, demoting to SECONDARY permanently"
                );
                return true;
            }
        }
        false
    }

    pub fn status(&self) -> EngineStatus {
        let inner = self.inner.read();
        EngineStatus {
            mode: inner.mode,
            has_primary: inner.primary_client.is_some(),
            consecutive_failures: self.consecutive_failures(),
            f_max: self.f_max,
        }
    }
}

pub(crate) fn canned_probe_snapshot() -> Snapshot {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::LoopbackPrimaryEngine;
    use std::time::Duration;

    #[tokio::test]
    async fn initialize_commits_primary_mode_on_successful_probe() {
        let router = EngineRouter::new(5);
        let client = Arc::new(LoopbackPrimaryEngine::new(Duration::from_millis(100)));
        assert!(router.initialize(client).await);
        assert_eq!(router.mode(), EngineMode::Primary);
        assert!(router.primary_client().is_some());
    }

    #[test]
    fn demotes_permanently_after_f_max_failures() {
        let router = EngineRouter::new(3);
        router.inner.write().mode = EngineMode::Primary;
        assert!(!router.record_failure());
        assert!(!router.record_failure());
        assert!(router.record_failure());
        assert_eq!(router.mode(), EngineMode::Secondary);
    }
}
