use std::time::Duration;

use payline_common::env;

/// Default `PORT` for the ledger service.
pub const DEFAULT_PORT: u16 = 8084;
/// How long tasks get to drain after a shutdown signal.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Log consumer group / consumer names. Stable so pending entries are
/// replayed on restart.
pub const CONSUMER_GROUP: &str = "ledger";
pub const CONSUMER_NAME: &str = "ledger-0";

/// Ledger service configuration, read from env.
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
