//! Wire and domain types shared across the pipeline.
//!
//! Typed structs replace the ad-hoc key bags of the source system; unknown
//! fields on the wire are ignored by serde and every outbound type is
//! serialized explicitly (no dynamic dictionaries).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// One `(price, volume)` pair on a side of the book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: f64,
    pub volume: f64,
}

impl Level {
    pub fn new(price: f64, volume: f64) -> Self {
        Self { price, volume }
    }
}

/// Which side of the book a level, order, or signal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Bid => "BID",
            Side::Ask => "ASK",
        }
    }
}

/// Raw market snapshot as received from a `RawSource`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
    #[serde(default)]
    pub mid_price: Option<f64>,
    #[serde(default)]
    pub trade_volume: Option<f64>,
    #[serde(default)]
    pub last_trade_price: Option<f64>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub exchange_ts: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ingest_ts: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn best_bid(&self) -> Option<Level> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<Level> {
        self.asks.first().copied()
    }

    pub fn total_bid_depth(&self) -> f64 {
        self.bids.iter().map(|l| l.volume).sum()
    }

    pub fn total_ask_depth(&self) -> f64 {
        self.asks.iter().map(|l| l.volume).sum()
    }
}

/// Lee-Ready classification of a trade against the contemporaneous quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
    Unknown,
}

/// Severity escalates monotonically: `medium -> high -> critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Bump severity one step; saturates at `Critical`.
    pub fn bump(self) -> Self {
        match self {
            Severity::Medium => Severity::High,
            Severity::High => Severity::Critical,
            Severity::Critical => Severity::Critical,
        }
    }
}

/// Named anomaly/alert types. Order here has no significance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    DataValidationError,
    LiquidityGap,
    DepthShock,
    Spoofing,
    QuoteStuffing,
    Layering,
    MomentumIgnition,
    WashTrading,
    IcebergOrder,
    HeavyImbalance,
    Regime,
    ProcessingSlow,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::DataValidationError => "DATA_VALIDATION_ERROR",
            AlertType::LiquidityGap => "LIQUIDITY_GAP",
            AlertType::DepthShock => "DEPTH_SHOCK",
            AlertType::Spoofing => "SPOOFING",
            AlertType::QuoteStuffing => "QUOTE_STUFFING",
            AlertType::Layering => "LAYERING",
            AlertType::MomentumIgnition => "MOMENTUM_IGNITION",
            AlertType::WashTrading => "WASH_TRADING",
            AlertType::IcebergOrder => "ICEBERG_ORDER",
            AlertType::HeavyImbalance => "HEAVY_IMBALANCE",
            AlertType::Regime => "REGIME",
            AlertType::ProcessingSlow => "PROCESSING_SLOW",
        }
    }
}

/// A single emitted anomaly or data-quality alert.
///
/// `evidence` carries the type-specific numeric fields named in the
/// detector definitions (`volume_ratio`, `score`, `gap_count`, ...) so
/// tests can assert on them without a type per alert kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub evidence: serde_json::Map<String, serde_json::Value>,
}

impl Alert {
    pub fn new(alert_type: AlertType, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            alert_type,
            severity,
            message: message.into(),
            timestamp: Utc::now(),
            evidence: serde_json::Map::new(),
        }
    }

    pub fn with_evidence(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.evidence.insert(key.to_string(), value.into());
        self
    }

    /// Hashed identity used for dedup: `hash(type || message)`.
    pub fn dedup_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.alert_type.as_str().hash(&mut hasher);
        self.message.hash(&mut hasher);
        hasher.finish()
    }
}

/// Per-level liquidity-gap evidence attached to an `EnrichedSnapshot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityGapRecord {
    pub side: Side,
    pub level_index: usize,
    pub price: f64,
    pub volume: f64,
    pub risk_score: f64,
}

/// Output of the full analytics pipeline for one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedSnapshot {
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
    pub mid_price: Option<f64>,
    pub trade_volume: Option<f64>,
    pub last_trade_price: Option<f64>,
    pub symbol: Option<String>,
    pub exchange_ts: Option<DateTime<Utc>>,
    pub ingest_ts: Option<DateTime<Utc>>,

    pub spread: f64,
    pub microprice: f64,
    pub obi: f64,
    pub ofi_normalized: f64,
    pub divergence: f64,
    pub directional_prob: f64,
    pub regime: usize,
    pub regime_label: String,
    pub vpin: f64,
    pub trade_side: Option<TradeSide>,
    pub effective_spread: Option<f64>,
    pub realized_spread: Option<f64>,
    pub gap_count: usize,
    pub gap_severity_score: f64,
    pub spoofing_risk: f64,
    pub volume_volatility: f64,
    pub liquidity_gaps: Vec<LiquidityGapRecord>,
    pub anomalies: Vec<Alert>,
    pub engine: String,
    pub processing_ms: f64,
}

/// Playback states for a session's replay source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Response body for `get_state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStateView {
    pub state: PlaybackState,
    pub speed: u32,
    pub cursor_ts: DateTime<Utc>,
    pub buffer_size: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Client -> server control messages on the per-session WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SetSpeed {
        #[serde(default)]
        speed: Option<serde_json::Value>,
        #[serde(default)]
        session_id: Option<String>,
    },
    Ping {
        #[serde(default)]
        session_id: Option<String>,
    },
    Pong {
        #[serde(default)]
        session_id: Option<String>,
    },
    Subscribe {
        #[serde(default)]
        session_id: Option<String>,
    },
    Unsubscribe {
        #[serde(default)]
        session_id: Option<String>,
    },
}

/// Server -> client initial replay message.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: Vec<EnrichedSnapshot>,
    pub session_id: String,
}

impl HistoryMessage {
    pub fn new(session_id: String, data: Vec<EnrichedSnapshot>) -> Self {
        Self {
            kind: "history",
            data,
            session_id,
        }
    }
}
