//! Process-wide configuration, loaded once from the environment at startup.

use std::time::Duration;

/// Configuration for the analytics engine, assembled from environment
/// variables with sensible defaults (see the Configuration table in the
/// external interface docs).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub bind_addr: String,
    pub port: u16,

    pub use_primary_engine: bool,
    pub primary_engine_host: String,
    pub primary_engine_port: u16,

    pub q_in: usize,
    pub q_out: usize,
    pub replay_batch_size: usize,
    pub backpressure_threshold: usize,
    pub data_buffer_size: usize,

    pub retrain_interval: Duration,
    pub dedup_window: Duration,
    pub t_slow: Duration,
    pub f_max: u32,

    pub speed_max: u32,
    pub session_idle_timeout: Duration,

    pub primary_call_timeout: Duration,
    pub vpin_bucket_volume: f64,
    pub vpin_ring_len: usize,
    pub audit_ring_size: usize,
}

impl EngineConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let bind_addr = env_or("BIND_ADDR", "0.0.0.0");
        let port = env_parse_or("PORT", 8080);

        let use_primary_engine = env_or("USE_PRIMARY_ENGINE", "true")
            .eq_ignore_ascii_case("true");
        let primary_engine_host = env_or("PRIMARY_ENGINE_HOST", "localhost");
        let primary_engine_port = env_parse_or("PRIMARY_ENGINE_PORT", 50051);

        let q_in = env_parse_or("Q_IN", 2000);
        let q_out = env_parse_or("Q_OUT", 2000);
        let replay_batch_size = env_parse_or("REPLAY_BATCH_SIZE", 500);
        let backpressure_threshold = env_parse_or("BACKPRESSURE_THRESHOLD", 1500);
        let data_buffer_size = env_parse_or("DATA_BUFFER_SIZE", 100);

        let retrain_interval = Duration::from_secs(env_parse_or("RETRAIN_INTERVAL_S", 10));
        let dedup_window = Duration::from_secs(env_parse_or("DEDUP_WINDOW_S", 5));
        let t_slow = Duration::from_millis(env_parse_or("T_SLOW_MS", 100));
        let f_max = env_parse_or("F_MAX", 5);

        let speed_max = env_parse_or("SPEED_MAX", 100);
        let session_idle_timeout = Duration::from_secs(env_parse_or("SESSION_IDLE_TIMEOUT_S", 1800));

        let primary_call_timeout = Duration::from_millis(env_parse_or("PRIMARY_CALL_TIMEOUT_MS", 100));
        let vpin_bucket_volume = env_parse_or("VPIN_BUCKET_VOLUME", 1000.0);
        let vpin_ring_len = env_parse_or("VPIN_RING_LEN", 50);
        let audit_ring_size = env_parse_or("AUDIT_RING_SIZE", 1000);

        Ok(Self {
            bind_addr,
            port,
            use_primary_engine,
            primary_engine_host,
            primary_engine_port,
            q_in,
            q_out,
            replay_batch_size,
            backpressure_threshold,
            data_buffer_size,
            retrain_interval,
            dedup_window,
            t_slow,
            f_max,
            speed_max,
            session_idle_timeout,
            primary_call_timeout,
            vpin_bucket_volume,
            vpin_ring_len,
            audit_ring_size,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            use_primary_engine: true,
            primary_engine_host: "localhost".to_string(),
            primary_engine_port: 50051,
            q_in: 2000,
            q_out: 2000,
            replay_batch_size: 500,
            backpressure_threshold: 1500,
            data_buffer_size: 100,
            retrain_interval: Duration::from_secs(10),
            dedup_window: Duration::from_secs(5),
            t_slow: Duration::from_millis(100),
            f_max: 5,
            speed_max: 100,
            session_idle_timeout: Duration::from_secs(1800),
            primary_call_timeout: Duration::from_millis(100),
            vpin_bucket_volume: 1000.0,
            vpin_ring_len: 50,
            audit_ring_size: 1000,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
