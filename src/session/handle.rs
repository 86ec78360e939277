//! Component H: per-session state, queues, and playback controls.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::engines::pipeline::SessionAnalyticsState;
use crate::errors::{ControlError, PipelineError};
use crate::models::{EnrichedSnapshot, PlaybackState, SessionStateView, Snapshot};
use crate::rings::Ring;
use crate::scheduler::AdaptiveScheduler;

const MIN_SPEED: u32 = 1;

/// One session's queues, playback cursor, and analytics state.
///
/// `ingest_rx` and `outbound_rx` are taken once by the worker/broadcaster
/// tasks spawned in [`crate::session::manager`]; everything else is shared
/// via `Arc` so the control surface, the workers, and the websocket handler
/// can all touch the same session concurrently.
pub struct SessionHandle {
    pub id: String,
    pub config: EngineConfig,
    state: RwLock<PlaybackState>,
    speed: AtomicU32,
    cursor_ts: RwLock<Option<DateTime<Utc>>>,
    data_buffer: Mutex<Ring<EnrichedSnapshot>>,
    replay_buffer: Mutex<std::collections::VecDeque<Snapshot>>,
    created_at: DateTime<Utc>,
    last_activity: RwLock<DateTime<Utc>>,
    running: AtomicBool,

    ingest_tx: mpsc::Sender<Snapshot>,
    outbound_tx: mpsc::Sender<(EnrichedSnapshot, f64)>,
    client_tx: RwLock<Option<mpsc::Sender<EnrichedSnapshot>>>,

    queue_full_count: AtomicU64,
    queue_backpressure_count: AtomicU64,
    broadcaster_fail_count: AtomicU64,

    /// A tokio mutex, not parking_lot: the analytics worker holds this lock
    /// across the primary engine's `.await`, and a lock held across an
    /// await point must not be a blocking one.
    pub analytics: tokio::sync::Mutex<SessionAnalyticsState>,
    pub scheduler: AdaptiveScheduler,
}

pub struct SessionChannels {
    pub ingest_rx: mpsc::Receiver<Snapshot>,
    pub outbound_rx: mpsc::Receiver<(EnrichedSnapshot, f64)>,
}

impl SessionHandle {
    pub fn new(id: String, config: EngineConfig) -> (Arc<Self>, SessionChannels) {
        let (ingest_tx, ingest_rx) = mpsc::channel(config.q_in);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.q_out);
        let now = Utc::now();

        let analytics = SessionAnalyticsState::new(
            config.vpin_bucket_volume,
            config.vpin_ring_len,
            config.audit_ring_size,
            config.retrain_interval,
            config.dedup_window,
        );

        let handle = Arc::new(Self {
            id,
            data_buffer: Mutex::new(Ring::new(config.data_buffer_size)),
            replay_buffer: Mutex::new(std::collections::VecDeque::new()),
            created_at: now,
            last_activity: RwLock::new(now),
            running: AtomicBool::new(true),
            state: RwLock::new(PlaybackState::Stopped),
            speed: AtomicU32::new(1),
            cursor_ts: RwLock::new(None),
            ingest_tx,
            outbound_tx,
            client_tx: RwLock::new(None),
            queue_full_count: AtomicU64::new(0),
            queue_backpressure_count: AtomicU64::new(0),
            broadcaster_fail_count: AtomicU64::new(0),
            analytics: tokio::sync::Mutex::new(analytics),
            scheduler: AdaptiveScheduler::new(config.t_slow.as_secs_f64() * 1000.0),
            config,
        });

        (handle, SessionChannels { ingest_rx, outbound_rx })
    }

    fn touch(&self) {
        *self.last_activity.write() = Utc::now();
    }

    // --- playback controls, mirroring the source system's replay session ---

    pub fn start(&self) {
        *self.state.write() = PlaybackState::Playing;
        self.touch();
        info!(session = %self.id, "session started");
    }

    pub fn pause(&self) {
        let mut state = self.state.write();
        if *state == PlaybackState::Playing {
            *state = PlaybackState::Paused;
            self.touch();
        }
    }

    pub fn resume(&self) {
        let mut state = self.state.write();
        if *state == PlaybackState::Paused {
            *state = PlaybackState::Playing;
            self.touch();
        }
    }

    pub fn stop(&self) {
        *self.state.write() = PlaybackState::Stopped;
        *self.cursor_ts.write() = None;
        self.data_buffer.lock().clear();
        self.replay_buffer.lock().clear();
        self.touch();
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
        self.stop();
    }

    pub fn set_speed(&self, speed: u32) -> Result<(), ControlError> {
        if speed < MIN_SPEED {
            return Err(ControlError::InvalidSpeed { given: speed.to_string() });
        }
        let clamped = speed.clamp(MIN_SPEED, self.config.speed_max);
        self.speed.store(clamped, Ordering::Release);
        self.touch();
        Ok(())
    }

    /// Rewinds the cursor and clears both buffers; errors if no cursor has
    /// been established yet (nothing to rewind from).
    pub fn go_back(&self, seconds: i64) -> Result<(), ControlError> {
        let mut cursor = self.cursor_ts.write();
        match *cursor {
            Some(ts) => {
                *cursor = Some(ts - chrono::Duration::seconds(seconds));
                self.replay_buffer.lock().clear();
                self.data_buffer.lock().clear();
                drop(cursor);
                self.touch();
                Ok(())
            }
            None => Err(ControlError::RewindUnsupported),
        }
    }

    pub fn set_cursor(&self, ts: DateTime<Utc>) {
        *self.cursor_ts.write() = Some(ts);
    }

    pub fn get_state(&self) -> SessionStateView {
        SessionStateView {
            state: *self.state.read(),
            speed: self.speed.load(Ordering::Acquire),
            cursor_ts: self.cursor_ts.read().unwrap_or_else(Utc::now),
            buffer_size: self.data_buffer.lock().len(),
            created_at: self.created_at,
            last_activity: *self.last_activity.read(),
        }
    }

    pub fn is_active(&self) -> bool {
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        Utc::now().signed_duration_since(*self.last_activity.read())
            < chrono::Duration::from_std(self.config.session_idle_timeout).unwrap_or(chrono::Duration::seconds(1800))
    }

    pub fn is_playing(&self) -> bool {
        *self.state.read() == PlaybackState::Playing
    }

    pub fn speed(&self) -> u32 {
        self.speed.load(Ordering::Acquire)
    }

    // --- ingest / outbound plumbing ---

    /// Pushes a raw snapshot from the (external) producer. Applies the
    /// backpressure and full-queue policy from the runtime spec.
    pub fn push_raw(&self, snapshot: Snapshot) -> Result<(), PipelineError> {
        let depth = self.config.q_in - self.ingest_tx.capacity();
        if depth as f64 > 0.75 * self.config.q_in as f64 {
            self.queue_backpressure_count.fetch_add(1, Ordering::Relaxed);
            return Err(PipelineError::QueueBackpressure { queue: "ingest", depth });
        }
        match self.ingest_tx.try_send(snapshot) {
            Ok(()) => {
                self.touch();
                Ok(())
            }
            Err(_) => {
                self.queue_full_count.fetch_add(1, Ordering::Relaxed);
                Err(PipelineError::QueueFull { queue: "ingest" })
            }
        }
    }

    pub(crate) fn outbound_sender(&self) -> mpsc::Sender<(EnrichedSnapshot, f64)> {
        self.outbound_tx.clone()
    }

    pub fn set_client_sender(&self, tx: mpsc::Sender<EnrichedSnapshot>) {
        *self.client_tx.write() = Some(tx);
    }

    pub fn clear_client_sender(&self) {
        *self.client_tx.write() = None;
    }

    pub fn push_history(&self, enriched: EnrichedSnapshot) {
        self.data_buffer.lock().push(enriched);
    }

    pub fn history(&self) -> Vec<EnrichedSnapshot> {
        self.data_buffer.lock().iter().cloned().collect()
    }

    /// Appends to the data buffer and forwards to the session's single
    /// client channel, if attached. Non-fatal on send failure.
    pub fn broadcast(&self, enriched: EnrichedSnapshot) {
        self.push_history(enriched.clone());
        let maybe_tx = self.client_tx.read().clone();
        if let Some(tx) = maybe_tx {
            if tx.try_send(enriched).is_err() {
                self.broadcaster_fail_count.fetch_add(1, Ordering::Relaxed);
                warn!(session = %self.id, "broadcaster send failed, client channel full or closed");
            }
        }
    }

    pub fn queue_full_count(&self) -> u64 {
        self.queue_full_count.load(Ordering::Relaxed)
    }

    pub fn queue_backpressure_count(&self) -> u64 {
        self.queue_backpressure_count.load(Ordering::Relaxed)
    }

    pub fn broadcaster_fail_count(&self) -> u64 {
        self.broadcaster_fail_count.load(Ordering::Relaxed)
    }

    pub fn idle_timeout(&self) -> Duration {
        self.config.session_idle_timeout
    }
}
