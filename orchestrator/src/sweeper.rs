//! The stuck-payment sweeper.
//!
//! A payment can be left in AUTH_PENDING if the orchestrator crashes after
//! committing the AUTH_PENDING transition and its redelivery short-circuits
//! on the CAS guard. The sweeper demotes such rows to FAILED (verdict
//! `timeout`) once they are older than twice the fraud timeout.

use payline_tokio::{notify, notify_once::NotifyOnce, task::Task};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::{
    config::{STUCK_THRESHOLD, SWEEP_INTERVAL},
    store,
};

pub fn spawn_sweeper(
    db: PgPool,
    outbox_wake: notify::Sender,
    mut shutdown: NotifyOnce,
) -> Task<()> {
    Task::spawn("auth_pending sweeper", async move {
        loop {
            if shutdown.recv_timeout(SWEEP_INTERVAL).await {
                break;
            }

            match store::sweep_stuck(&db, STUCK_THRESHOLD).await {
                Ok(0) => (),
                Ok(swept) => {
                    info!("Swept {swept} stuck AUTH_PENDING payments");
                    metrics::counter!("payments_swept_total")
                        .increment(swept as u64);
                    outbox_wake.send();
                }
                Err(e) => warn!("Sweep failed: {e:#}"),
            }
        }
    })
}
