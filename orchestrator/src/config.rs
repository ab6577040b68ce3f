use std::time::Duration;

use payline_common::env;

/// Default `PORT` for the orchestrator service.
pub const DEFAULT_PORT: u16 = 8082;
/// Deadline for a `fraud.check` reply.
pub const FRAUD_TIMEOUT: Duration = Duration::from_secs(5);
/// TTL of the per-payment KV lock.
pub const PAYMENT_LOCK_TTL: Duration = Duration::from_secs(30);
/// Rows stuck in AUTH_PENDING longer than this are demoted to FAILED by the
/// sweeper. Twice the fraud timeout, so an in-flight consultation can never
/// race its own sweep.
pub const STUCK_THRESHOLD: Duration =
    Duration::from_secs(2 * FRAUD_TIMEOUT.as_secs());
/// How often the sweeper looks for stuck rows.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);
/// How often the outbox drainer runs when not nudged.
pub const OUTBOX_DRAIN_INTERVAL: Duration = Duration::from_millis(200);
/// How long tasks get to drain after a shutdown signal.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Log consumer group / consumer names. The consumer name is stable so that
/// un-acked entries from a crashed incarnation are replayed on restart.
pub const CONSUMER_GROUP: &str = "orchestrator";
pub const CONSUMER_NAME: &str = "orchestrator-0";

/// Orchestrator service configuration, read from env.
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
