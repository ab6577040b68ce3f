//! Global `tracing` logger setup shared by the four Payline services.
//!
//! Each service binary calls [`init`] first thing in `main`. Log lines go
//! to stdout in compact single-line format, which is what the deployment
//! scrapes alongside each service's `GET /metrics`.
//!
//! Filtering uses `RUST_LOG` in `tracing` `Targets` syntax, e.g.
//! `RUST_LOG=info,orchestrator=debug,sqlx=debug`. When `RUST_LOG` is unset
//! (or unparseable), the default is INFO for service code with the chatty
//! infra client crates capped at WARN, so a payment's lifecycle
//! (admission, transitions, fraud verdicts, postings) isn't buried under
//! per-query and per-connection noise.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    filter::Targets,
    layer::{Layer, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
};

/// Crates whose INFO output drowns the payment flow: every Store query,
/// KV round-trip, and Bus reconnect. Capped at WARN unless `RUST_LOG`
/// says otherwise.
const NOISY_TARGETS: [&str; 3] = ["sqlx", "redis", "nats"];

/// Initialize the global logger for a service binary.
///
/// Panics if a logger is already initialized, which is a bug in the
/// calling service (`init` must be called exactly once, before any tasks
/// are spawned).
pub fn init() {
    try_init().expect("Failed to set up logger");
}

/// Use this to initialize the global logger in tests. Does nothing unless
/// `RUST_LOG` is set, and tolerates another test thread having already
/// installed the logger.
pub fn init_for_testing() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let _ = try_init();
}

/// Try to initialize the global logger. Returns an `Err` if another global
/// logger is already set.
pub fn try_init() -> Result<(), TryInitError> {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|rust_log| Targets::from_str(&rust_log).ok())
        .unwrap_or_else(default_targets);

    let stdout_log = tracing_subscriber::fmt::layer()
        .compact()
        .with_level(true)
        .with_target(true)
        .with_ansi(true)
        .with_filter(filter);

    tracing_subscriber::registry().with(stdout_log).try_init()
}

/// The filter used when `RUST_LOG` is absent: INFO everywhere except the
/// [`NOISY_TARGETS`].
fn default_targets() -> Targets {
    let mut targets = Targets::new().with_default(Level::INFO);
    for noisy in NOISY_TARGETS {
        targets = targets.with_target(noisy, Level::WARN);
    }
    targets
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_filter_keeps_services_and_caps_infra() {
        let targets = default_targets();

        // Payment-flow logs from the services pass at INFO.
        for service in ["ingress", "orchestrator", "fraud", "ledger"] {
            assert!(targets.would_enable(service, &Level::INFO), "{service}");
            assert!(!targets.would_enable(service, &Level::DEBUG));
        }

        // Infra chatter is capped at WARN.
        for noisy in NOISY_TARGETS {
            assert!(targets.would_enable(noisy, &Level::WARN), "{noisy}");
            assert!(!targets.would_enable(noisy, &Level::INFO), "{noisy}");
        }
    }
}
