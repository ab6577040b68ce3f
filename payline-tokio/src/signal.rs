//! OS signal handling.

use tracing::info;

use crate::{notify_once::NotifyOnce, task::Task};

/// Spawns a task which waits for SIGINT or SIGTERM and then triggers a
/// graceful shutdown via the given [`NotifyOnce`]. The task also exits
/// quietly if a shutdown is initiated elsewhere.
pub fn spawn_listener(mut shutdown: NotifyOnce) -> Task<()> {
    Task::spawn("signal listener", async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::error!("Couldn't install SIGTERM handler: {e:#}");
                    shutdown.send();
                    return;
                }
            };

            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
                () = shutdown.recv() => return,
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = ctrl_c => info!("Received ctrl-c"),
                () = shutdown.recv() => return,
            }
        }

        shutdown.send();
    })
}
