use std::{sync::Arc, time::Duration};

use tokio::sync::Semaphore;

/// The shutdown signal threaded through every Payline service: the OS
/// signal listener sends it once, and the HTTP server, Log consumer, Bus
/// responder, sweeper, and outbox drainer each hold a clone to observe it.
///
/// Semantics:
///
/// - Multi-producer and multi-consumer; clone to get another handle.
/// - Each handle observes the signal at most once via [`recv`]; a fresh
///   clone gets its own chance, even for a signal sent long ago. Tasks
///   spawned after shutdown has already begun therefore still see it.
/// - Sending more than once is harmless.
/// - [`recv_timeout`] doubles as the tick for periodic loops, so a
///   shutdown interrupts the wait instead of waiting out the tick.
///
/// Internally this rides on a zero-permit [`Semaphore`]: [`Semaphore::close`]
/// is "send", and the [`AcquireError`] every waiter then gets from
/// [`acquire`] is "receive". The methods hide that encoding.
///
/// [`recv`]: NotifyOnce::recv
/// [`recv_timeout`]: NotifyOnce::recv_timeout
/// [`acquire`]: Semaphore::acquire
/// [`AcquireError`]: tokio::sync::AcquireError
#[derive(Debug)]
pub struct NotifyOnce {
    inner: Arc<Semaphore>,
    have_recved: bool,
}

impl NotifyOnce {
    /// Construct a new [`NotifyOnce`].
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let inner = Arc::new(Semaphore::new(0));
        Self {
            inner,
            have_recved: false,
        }
    }

    /// Send the signal, waking every handle currently waiting in [`recv`].
    ///
    /// [`recv`]: NotifyOnce::recv
    pub fn send(&self) {
        self.inner.close();
    }

    /// Wait for the signal.
    ///
    /// NOTE: a handle that has already observed the signal will wait
    /// forever; clone the handle if multiple waits are needed.
    pub async fn recv(&mut self) {
        if self.have_recved {
            // THIS FUTURE WILL NEVER RESOLVE
            std::future::pending().await
        } else {
            self.inner
                .acquire()
                .await
                .map_err(|_| ())
                .expect_err("Shouldn't've been able to acquire a permit");
            // Observed; further recv calls on this handle won't yield.
            self.have_recved = true;
        }
    }

    /// Wait for the signal for up to `timeout`, returning whether it was
    /// observed (`false` = the tick elapsed first). Periodic loops use
    /// this as their tick:
    ///
    /// ```ignore
    /// loop {
    ///     if shutdown.recv_timeout(SWEEP_INTERVAL).await {
    ///         break;
    ///     }
    ///     // ... periodic work ...
    /// }
    /// ```
    pub async fn recv_timeout(&mut self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.recv()).await.is_ok()
    }

    /// Waits for the signal, taking ownership of the handle. Useful for
    /// graceful shutdown APIs which require `impl Future<Output = ()> +
    /// 'static`, e.g. axum's.
    pub async fn recv_owned(mut self) {
        self.recv().await
    }

    /// Immediately returns whether the signal has been sent. Does NOT
    /// count as this handle's one observation.
    #[must_use]
    pub fn try_recv(&self) -> bool {
        self.inner.is_closed()
    }
}

impl Clone for NotifyOnce {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            // Every clone gets a chance to see the signal, even if the
            // original has already seen it.
            have_recved: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const TICK: Duration = Duration::from_millis(10);

    #[test]
    fn send_is_idempotent() {
        let shutdown = NotifyOnce::new();
        shutdown.send();
        shutdown.send();
        assert!(shutdown.try_recv());
    }

    #[tokio::test(start_paused = true)]
    async fn each_handle_observes_once() {
        let shutdown = NotifyOnce::new();
        let mut observer = shutdown.clone();

        // Nothing sent yet: the tick elapses.
        assert!(!observer.recv_timeout(TICK).await);

        shutdown.send();
        assert!(observer.recv_timeout(TICK).await);

        // The same handle never observes the signal twice...
        assert!(!observer.recv_timeout(TICK).await);

        // ...but a fresh clone gets its own observation.
        let mut late = observer.clone();
        assert!(late.recv_timeout(TICK).await);
    }

    #[tokio::test(start_paused = true)]
    async fn handles_cloned_after_send_still_observe() {
        let shutdown = NotifyOnce::new();
        shutdown.send();

        // Cloned after the signal went out, like a task spawned while the
        // service is already draining.
        let late = shutdown.clone();
        assert!(late.try_recv());
        tokio::time::timeout(TICK, late.recv_owned())
            .await
            .expect("Should resolve immediately");
    }

    #[tokio::test(start_paused = true)]
    async fn try_recv_does_not_consume_the_observation() {
        let shutdown = NotifyOnce::new();
        shutdown.send();

        let mut handle = shutdown.clone();
        assert!(handle.try_recv());
        assert!(handle.try_recv());
        // The one real observation is still available after try_recv.
        assert!(handle.recv_timeout(TICK).await);
    }
}
