//! Error taxonomy for the analytics pipeline.
//!
//! Only `ValidationFatal` ever surfaces to a client, as a `DATA_VALIDATION_ERROR`
//! alert. Everything else is local-recovery: counted, logged, and folded back
//! into the next tick rather than unwound as a panic or propagated failure.

use std::fmt;

/// Why the primary (optimized) engine failed on a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFailureKind {
    Timeout,
    Rpc,
    Malformed,
}

impl fmt::Display for EngineFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineFailureKind::Timeout => write!(f, "timeout"),
            EngineFailureKind::Rpc => write!(f, "rpc"),
            EngineFailureKind::Malformed => write!(f, "malformed reply"),
        }
    }
}

/// Top-level error taxonomy shared across the pipeline.
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// Required fields missing or a second sanitize-and-revalidate pass
    /// still failed. Short-circuits the pipeline for this tick.
    ValidationFatal { reasons: Vec<String> },
    /// Non-fatal field was repaired in place; processing continued.
    Sanitized { repairs: Vec<String> },
    /// Primary engine call failed; secondary fallback was used.
    EngineFailure {
        kind: EngineFailureKind,
        consecutive_failures: u32,
    },
    /// Ingest or outbound queue rejected a push because it was full.
    QueueFull { queue: &'static str },
    /// Queue crossed the backpressure watermark; producer should throttle.
    QueueBackpressure { queue: &'static str, depth: usize },
    /// Broadcaster failed to deliver to the session's client channel.
    BroadcasterSendFailure,
    /// Background regime retraining failed; previous model retained.
    RetrainFailure { reason: String },
    /// Session exceeded the inactivity timeout.
    SessionIdle { idle_for_secs: u64 },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::ValidationFatal { reasons } => {
                write!(f, "validation fatal: {}", reasons.join("; "))
            }
            PipelineError::Sanitized { repairs } => {
                write!(f, "sanitized {} field(s)", repairs.len())
            }
            PipelineError::EngineFailure {
                kind,
                consecutive_failures,
            } => write!(
                f,
                "primary engine failure ({kind}), consecutive={consecutive_failures}"
            ),
            PipelineError::QueueFull { queue } => write!(f, "{queue} queue full"),
            PipelineError::QueueBackpressure { queue, depth } => {
                write!(f, "{queue} queue over backpressure watermark (depth={depth})")
            }
            PipelineError::BroadcasterSendFailure => write!(f, "broadcaster send failed"),
            PipelineError::RetrainFailure { reason } => write!(f, "retrain failed: {reason}"),
            PipelineError::SessionIdle { idle_for_secs } => {
                write!(f, "session idle for {idle_for_secs}s")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// Errors from the session control surface (start/pause/resume/stop/...).
#[derive(Debug, Clone)]
pub enum ControlError {
    UnknownSession { session_id: String },
    RewindUnsupported,
    InvalidSpeed { given: String },
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::UnknownSession { session_id } => {
                write!(f, "unknown session: {session_id}")
            }
            ControlError::RewindUnsupported => {
                write!(f, "go_back requires a rewindable playback source")
            }
            ControlError::InvalidSpeed { given } => write!(f, "invalid speed value: {given}"),
        }
    }
}

impl std::error::Error for ControlError {}
