use std::{
    borrow::Cow,
    fmt::{self, Display},
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use futures::{stream::FuturesUnordered, StreamExt};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn, Instrument};

use crate::notify_once::NotifyOnce;

/// Errors that can occur when joining [`Task`]s.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Static task finished prematurely: {name}")]
    PrematureFinish { name: Cow<'static, str> },
    #[error("Some tasks failed to finish on time: {hung_tasks:?}")]
    Hung { hung_tasks: Vec<String> },
}

/// A thin wrapper around [`tokio::task::JoinHandle`] that:
///
/// (1) propagates panics instead of catching them, and
/// (2) adds the `#[must_use]` lint to ensure that all spawned tasks are
///     joined or explicitly annotated that no joining is required. Use
///     [`Task::detach`] to make it clear that a task is intentionally
///     left running without a handle.
///
/// [`Task`] also carries a task name for debuggability. Use [`Task::logged`]
/// to instrument the task so it logs its name and status when it finishes.
#[must_use]
pub struct Task<T> {
    handle: JoinHandle<T>,
    name: Cow<'static, str>,
}

/// A [`Future`] that wraps [`Task`] so its result is logged when it finishes.
/// The inner `T` is discarded and the [`Future::Output`] is mapped to the
/// task's name.
pub struct LoggedTask<T>(Task<T>);

// Provides a [`Display`] impl for the result of a finished task.
struct TaskOutputDisplay<'a> {
    name: &'a str,
    result: Result<(), &'a JoinError>,
}

// --- impl Task --- //

impl<T> Task<T> {
    /// Spawns a named task which inherits the current tracing span, so log
    /// lines inside the task keep their context past the spawn boundary.
    #[inline]
    pub fn spawn<F>(
        name: impl Into<Cow<'static, str>>,
        future: F,
    ) -> Task<F::Output>
    where
        F: Future<Output = T> + Send + 'static,
        F::Output: Send + 'static,
    {
        let name = name.into();
        debug!("Spawning task: {name}");
        let span = tracing::Span::current();
        Task {
            handle: tokio::spawn(future.instrument(span)),
            name,
        }
    }

    /// Drop the task handle, detaching the task so it continues running in
    /// the background. Use sparingly: a detached task's panics are lost.
    #[inline]
    pub fn detach(self) {
        std::mem::drop(self)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Instrument a [`Task`] so that its result is logged when it finishes.
    #[inline]
    pub fn logged(self) -> LoggedTask<T> {
        LoggedTask(self)
    }

    #[inline]
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T, JoinError>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Self::Output> {
        let result = match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(result) => result,
            Poll::Pending => return Poll::Pending,
        };

        let result = match result {
            Ok(val) => Ok(val),
            Err(join_err) => match join_err.try_into_panic() {
                // If the inner spawned task panicked, propagate the panic to
                // the `Task` poller.
                Ok(panic_reason) => {
                    error!("Task '{name}' panicked!", name = self.name());
                    std::panic::resume_unwind(panic_reason)
                }
                Err(join_err) => Err(join_err),
            },
        };

        Poll::Ready(result)
    }
}

// --- impl LoggedTask --- //

impl<T> LoggedTask<T> {
    #[inline]
    pub fn name(&self) -> &str {
        self.0.name()
    }
}

impl<T> Future for LoggedTask<T> {
    type Output = Cow<'static, str>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx).map(|result| {
            let msg = TaskOutputDisplay {
                name: self.name(),
                result: result.as_ref().map(|_| ()),
            };

            match &result {
                Ok(_) => info!("{msg}"),
                Err(_) => warn!("{msg}"),
            }

            self.0.name.clone()
        })
    }
}

impl Display for TaskOutputDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join_label = match &self.result {
            Ok(_) => "finished",
            Err(e) if e.is_cancelled() => "cancelled",
            _ => "(unknown join error)",
        };

        // "Task '<name>' <finished|cancelled>[: <error>]"
        let name = self.name;
        write!(f, "Task '{name}' {join_label}")?;

        if let Err(e) = self.result {
            write!(f, ": {e:#}")?;
        }

        Ok(())
    }
}

// --- Joining --- //

/// Drives a service's long-lived tasks to completion.
///
/// - "static" tasks are intended to run until the end of the program
///   lifetime. To prevent partial failures, this helper triggers a shutdown
///   if any static task finishes prematurely.
/// - All task handles are polled so that panics are propagated.
/// - After a shutdown signal is received, this helper waits for the
///   remaining tasks to complete, up to `shutdown_timeout`.
///
/// NOTE: To propagate panics beyond this function, the callsite must still
/// poll the future returned here, and so on up to the top-level future.
pub async fn try_join_tasks_and_shutdown(
    static_tasks: Vec<Task<()>>,
    mut shutdown: NotifyOnce,
    shutdown_timeout: Duration,
) -> Result<(), Error> {
    if static_tasks.is_empty() {
        shutdown.recv().await;
        return Ok(());
    }

    let mut static_tasks = static_tasks
        .into_iter()
        .map(Task::logged)
        .collect::<FuturesUnordered<_>>();

    let mut result = Ok(());

    // Wait for a shutdown signal while polling all tasks.
    tokio::select! {
        // Mitigate possible select! race after a shutdown signal is sent
        biased;
        () = shutdown.recv() => (),
        Some(name) = static_tasks.next() => {
            // A static task finished prematurely. Set our result to an
            // error, initiate a shutdown, and wait on the remaining tasks.
            result = Err(Error::PrematureFinish { name });
            shutdown.send();
        }
    }

    let shutdown_timeout_fut = tokio::time::sleep(shutdown_timeout);
    tokio::pin!(shutdown_timeout_fut);

    while !static_tasks.is_empty() {
        tokio::select! {
            Some(_name) = static_tasks.next() => (),
            () = &mut shutdown_timeout_fut => {
                let hung_tasks = static_tasks
                    .iter()
                    .map(|task| task.name().to_owned())
                    .collect::<Vec<_>>();

                return Err(Error::Hung { hung_tasks });
            }
        }
    }

    result
}

/// Shorthand to call [`try_join_tasks_and_shutdown`] and log any errors.
pub async fn join_tasks_and_shutdown(
    name: &str,
    static_tasks: Vec<Task<()>>,
    shutdown: NotifyOnce,
    shutdown_timeout: Duration,
) {
    let result =
        try_join_tasks_and_shutdown(static_tasks, shutdown, shutdown_timeout)
            .await;

    match result {
        Ok(()) => info!("{name} tasks finished."),
        Err(e) => error!("{name} tasks errored: {e:#}"),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn join_returns_after_shutdown() {
        let shutdown = NotifyOnce::new();
        let task_shutdown = shutdown.clone();
        let task = Task::spawn("waits for shutdown", async move {
            task_shutdown.recv_owned().await;
        });

        shutdown.send();
        let result = try_join_tasks_and_shutdown(
            vec![task],
            shutdown,
            Duration::from_secs(1),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn premature_finish_is_an_error() {
        let shutdown = NotifyOnce::new();
        let task = Task::spawn("finishes immediately", async {});

        let result = try_join_tasks_and_shutdown(
            vec![task],
            shutdown,
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(Error::PrematureFinish { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_task_is_an_error() {
        let shutdown = NotifyOnce::new();
        let task = Task::spawn("never finishes", async {
            std::future::pending::<()>().await
        });

        shutdown.send();
        let result = try_join_tasks_and_shutdown(
            vec![task],
            shutdown,
            Duration::from_secs(1),
        )
        .await;
        match result {
            Err(Error::Hung { hung_tasks }) => {
                assert_eq!(hung_tasks, vec!["never finishes".to_owned()]);
            }
            other => panic!("Expected Hung, got {other:?}"),
        }
    }
}
