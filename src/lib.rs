//! Real-time limit-order-book microstructure analytics engine.
//!
//! Per-tick pipeline (components A-F, `engines::pipeline`) computes
//! microstructure metrics, classifies the market regime, and emits typed
//! anomaly alerts; `processor` routes each tick to a primary or secondary
//! engine with circuit-breaker fallback; `session` owns the per-session
//! queues, workers, and playback state that wrap the pipeline; `api` is the
//! transport layer on top of all of it.

pub mod alerts;
pub mod api;
pub mod config;
pub mod detectors;
pub mod engines;
pub mod errors;
pub mod metrics;
pub mod metrics_collector;
pub mod middleware;
pub mod models;
pub mod processor;
pub mod regime;
pub mod rings;
pub mod scheduler;
pub mod session;
pub mod validator;
