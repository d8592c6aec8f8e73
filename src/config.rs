use std::net::SocketAddr;
use std::time::Duration;

use envconfig::Envconfig;

/// Service configuration, loaded from environment variables with defaults.
#[derive(Debug, Envconfig, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    #[envconfig(from = "LISTEN_ADDR", default = "127.0.0.1:8080")]
    pub listen_addr: SocketAddr,

    /// Default log level for the crate's tracing targets.
    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,

    /// Whether routed requests pass through the rate-limit gate.
    #[envconfig(from = "LIMITER_ENABLED", default = "true")]
    pub limiter_enabled: bool,

    /// Steady-state admission rate, tokens per second per client.
    #[envconfig(from = "LIMIT_RATE", default = "50.0")]
    pub limit_rate: f64,

    /// Burst capacity per client.
    #[envconfig(from = "LIMIT_BURST", default = "100")]
    pub limit_burst: u32,

    /// Longest a request waits for a token before a 429, in milliseconds.
    #[envconfig(from = "LIMIT_TIMEOUT_MS", default = "500")]
    pub limit_timeout_ms: u64,

    /// Redis URL for session state; empty selects the in-memory backend.
    #[envconfig(from = "SESSION_REDIS_URL", default = "")]
    pub session_redis_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    pub fn limit_timeout(&self) -> Duration {
        Duration::from_millis(self.limit_timeout_ms)
    }
}
