use std::time::Duration;

use payline_common::env;

/// Default `PORT` for the fraud service.
pub const DEFAULT_PORT: u16 = 8083;
/// How long tasks get to drain after a shutdown signal.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Fraud service configuration, read from env.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub nats_url: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        env::load_dotenv();
        Ok(Self {
            database_url: env::req_var("DATABASE_URL")?,
            redis_url: env::req_var("REDIS_URL")?,
            nats_url: env::req_var("NATS_URL")?,
            port: env::port_or(DEFAULT_PORT)?,
        })
    }
}
