//! Component H: `SessionManager` owns all live sessions and spawns their
//! cooperative tasks (analytics worker, broadcaster) on creation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::engines::pipeline::PipelineResult;
use crate::engines::router::EngineRouter;
use crate::errors::ControlError;
use crate::metrics_collector::MetricsCollector;
use crate::models::EnrichedSnapshot;
use crate::processor::SnapshotProcessor;

use super::handle::{SessionChannels, SessionHandle};

/// Notified once per tick with the enriched snapshot that was just
/// broadcast, regardless of which session produced it.
type TickObserver = dyn Fn(&EnrichedSnapshot) + Send + Sync;

pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    router: Arc<EngineRouter>,
    metrics: Arc<MetricsCollector>,
    config: EngineConfig,
    on_tick: RwLock<Option<Arc<TickObserver>>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub paused_sessions: usize,
}

impl SessionManager {
    pub fn new(router: Arc<EngineRouter>, metrics: Arc<MetricsCollector>, config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            router,
            metrics,
            config,
            on_tick: RwLock::new(None),
        })
    }

    /// Registers a callback invoked with every enriched snapshot produced by
    /// any session, used to feed the process-wide aggregate read surface.
    pub fn set_tick_observer<F>(&self, callback: F)
    where
        F: Fn(&EnrichedSnapshot) + Send + Sync + 'static,
    {
        *self.on_tick.write() = Some(Arc::new(callback));
    }

    pub fn create_session(self: &Arc<Self>, session_id: String) -> Arc<SessionHandle> {
        if let Some(existing) = self.sessions.read().get(&session_id) {
            warn!(session = %session_id, "session already exists, returning existing");
            return Arc::clone(existing);
        }

        let (handle, channels) = SessionHandle::new(session_id.clone(), self.config.clone());
        self.sessions.write().insert(session_id.clone(), Arc::clone(&handle));
        self.spawn_workers(Arc::clone(&handle), channels);
        info!(session = %session_id, "session created");
        handle
    }

    pub fn get_session(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().get(session_id).cloned()
    }

    pub fn delete_session(&self, session_id: &str) -> Result<(), ControlError> {
        let mut sessions = self.sessions.write();
        match sessions.remove(session_id) {
            Some(handle) => {
                handle.shutdown();
                info!(session = %session_id, "session deleted");
                Ok(())
            }
            None => Err(ControlError::UnknownSession { session_id: session_id.to_string() }),
        }
    }

    /// Periodic sweep: shuts down and removes sessions idle past the
    /// configured timeout. Intended to run on a background interval.
    pub fn cleanup_inactive(&self) {
        let inactive: Vec<String> = self
            .sessions
            .read()
            .iter()
            .filter(|(_, h)| !h.is_active())
            .map(|(id, _)| id.clone())
            .collect();

        if inactive.is_empty() {
            return;
        }
        let mut sessions = self.sessions.write();
        for id in &inactive {
            if let Some(handle) = sessions.remove(id) {
                handle.shutdown();
            }
        }
        info!(count = inactive.len(), "cleaned up inactive sessions");
    }

    pub fn stats(&self) -> SessionStats {
        let sessions = self.sessions.read();
        let active = sessions.values().filter(|h| h.is_playing()).count();
        let paused = sessions
            .values()
            .filter(|h| h.get_state().state == crate::models::PlaybackState::Paused)
            .count();
        SessionStats {
            total_sessions: sessions.len(),
            active_sessions: active,
            paused_sessions: paused,
        }
    }

    fn spawn_workers(self: &Arc<Self>, handle: Arc<SessionHandle>, channels: SessionChannels) {
        let router = Arc::clone(&self.router);
        let worker_metrics = Arc::clone(&self.metrics);
        let call_timeout = self.config.primary_call_timeout;
        let worker_handle = Arc::clone(&handle);
        let mut ingest_rx = channels.ingest_rx;
        let outbound_tx = handle.outbound_sender();

        tokio::spawn(async move {
            while let Some(raw) = ingest_rx.recv().await {
                if !worker_handle.is_active() {
                    break;
                }
                if !worker_handle.scheduler.should_process() {
                    continue;
                }

                let mut analytics = worker_handle.analytics.lock().await;
                let result = SnapshotProcessor::process(&router, &mut analytics, &raw, call_timeout).await;
                drop(analytics);

                match result {
                    PipelineResult::Enriched(enriched) => {
                        worker_handle.scheduler.record(enriched.processing_ms);
                        worker_metrics.record_tick(&enriched.engine, enriched.processing_ms);
                        for alert in &enriched.anomalies {
                            worker_metrics.record_alert(alert.alert_type);
                        }
                        if outbound_tx.send((enriched.clone(), enriched.processing_ms)).await.is_err() {
                            break;
                        }
                    }
                    PipelineResult::Rejected { alert } => {
                        worker_metrics.record_rejected();
                        warn!(session = %worker_handle.id, alert = %alert.message, "snapshot rejected");
                    }
                }
            }
            info!(session = %worker_handle.id, "analytics worker exiting");
        });

        let broadcaster_handle = handle;
        let mut outbound_rx = channels.outbound_rx;
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while let Some((enriched, _processing_ms)) = outbound_rx.recv().await {
                if let Some(observer) = manager.on_tick.read().clone() {
                    observer(&enriched);
                }
                broadcaster_handle.broadcast(enriched);
            }
            info!(session = %broadcaster_handle.id, "broadcaster exiting");
        });
    }
}

/// Spawns the recurring inactive-session sweep. Call once at startup.
pub fn spawn_cleanup_task(manager: Arc<SessionManager>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            manager.cleanup_inactive();
        }
    });
}
