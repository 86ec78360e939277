//! Shared application state, cloned cheaply (all fields are `Arc`s) into
//! every axum handler.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::EngineConfig;
use crate::engines::router::EngineRouter;
use crate::metrics_collector::MetricsCollector;
use crate::models::{Alert, EnrichedSnapshot};
use crate::rings::Ring;
use crate::session::SessionManager;

const GLOBAL_ALERT_RING_SIZE: usize = 1000;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EngineConfig>,
    pub router: Arc<EngineRouter>,
    pub sessions: Arc<SessionManager>,
    pub metrics: Arc<MetricsCollector>,
    /// The most recently processed snapshot across every session; backs the
    /// process-wide aggregate read surface (there is no persistent store).
    pub latest: Arc<RwLock<Option<EnrichedSnapshot>>>,
    pub alert_history: Arc<Mutex<Ring<Alert>>>,
}

impl AppState {
    pub fn new(config: EngineConfig, router: Arc<EngineRouter>, sessions: Arc<SessionManager>, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            config: Arc::new(config),
            router,
            sessions,
            metrics,
            latest: Arc::new(RwLock::new(None)),
            alert_history: Arc::new(Mutex::new(Ring::new(GLOBAL_ALERT_RING_SIZE))),
        }
    }

    /// Called by a session's broadcaster for every tick so the aggregate
    /// read surface reflects the most recent activity system-wide.
    pub fn observe(&self, enriched: &EnrichedSnapshot) {
        *self.latest.write() = Some(enriched.clone());
        let mut history = self.alert_history.lock();
        for alert in &enriched.anomalies {
            history.push(alert.clone());
        }
    }
}
