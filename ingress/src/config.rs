use std::time::Duration;

use payline_common::env;

/// Default `PORT` for the ingress service.
pub const DEFAULT_PORT: u16 = 8081;
/// Idempotency cache expiry in KV.
pub const IDEMPOTENCY_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// How often the outbox drainer runs when not nudged.
pub const OUTBOX_DRAIN_INTERVAL: Duration = Duration::from_millis(200);
/// How long tasks get to drain after a shutdown signal.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Ingress service configuration, read from env.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        env::load_dotenv();
        Ok(Self {
            database_url: env::req_var("DATABASE_URL")?,
            redis_url: env::req_var("REDIS_URL")?,
            port: env::port_or(DEFAULT_PORT)?,
        })
    }
}
