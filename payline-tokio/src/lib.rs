//! Payline's 'standard' way of handling structured task concurrency and
//! shutdown. Every service spawns its listeners, consumers, and background
//! loops as named [`Task`]s, then parks in [`task::try_join_tasks_and_shutdown`]
//! until a shutdown signal arrives or a static task finishes prematurely.
//!
//! [`Task`]: crate::task::Task

/// Debounced wakeup channel.
pub mod notify;
/// One-shot multi-consumer shutdown signal.
pub mod notify_once;
/// OS signal handling.
pub mod signal;
/// Named task handles and the join-until-shutdown helper.
pub mod task;
