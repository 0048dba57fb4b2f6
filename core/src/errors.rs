use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

/// The opaque failure payload a task body may produce. Bodies are user code,
/// so nothing beyond debuggability is demanded of their errors; the payload
/// travels into the error hook unchanged
pub type TaskError = Arc<dyn Debug + Send + Sync>;

/// The failure type storage adapters report from their fallible operations.
/// Concrete back-ends wrap whatever driver error they hit; the core never
/// inspects it beyond formatting
pub type AdapterError = Box<dyn std::error::Error + Send + Sync>;

/// [`SchedulerError`] is the enum that contains the errors surfaced synchronously
/// from the scheduling surface, it uses under the hood [`thiserror`] to make it as
/// smooth sailing to add more errors in the future as possible. Operational
/// conditions (storage hiccups mid-revolution, task body failures and the like)
/// never appear here, they are routed to the configured error hook instead
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// This error is meant to happen when a scheduling call is handed a
    /// negative delay. Delays are milliseconds and must be zero or positive
    #[error("Task delay must be zero or a positive number of milliseconds, got `{0}`")]
    NegativeDelay(i64),

    /// This error is meant to happen when a scheduling call is handed an
    /// empty task identifier. Identifiers name the task fleet-wide and
    /// cannot be blank
    #[error("Task uid must be a non-empty string")]
    EmptyUid,

    /// This error is meant to happen when a caller-facing storage operation
    /// fails, the first field is the adapter operation that failed and the
    /// second is the underlying adapter error
    #[error("Storage adapter operation `{0}` failed: {1}")]
    Storage(&'static str, AdapterError),
}
