use crate::adapter::TaskRecord;
use crate::errors::{AdapterError, TaskError};
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::ops::Deref;
use std::sync::Arc;

/// The category of an operational condition surfaced through the error hook.
/// The scheduler never aborts on these, it reports and keeps revolving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A scheduling call was malformed (these also surface synchronously
    /// from the call itself)
    Validation,
    /// A storage adapter operation failed mid-revolution
    Storage,
    /// A task body failed, either by an explicit failure signal, a rejected
    /// future or a panic
    Body,
    /// A claimed task has no body registered on this instance. Informational
    /// unless ``auto_clear`` is configured, in which case the record is
    /// removed instead of reported
    MissingTask,
    /// A scheduling call was made on a destroyed instance
    DestroyedUse,
    /// A task body resolved more than once, only the first resolution took
    /// effect
    OverResolved,
}

/// [`ErrorEvent`] is the record handed to the error hook for every operational
/// condition. The ``uid`` is absent when the condition is not attributable to a
/// particular task (a failed lock acquisition for instance)
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    /// The condition category
    pub kind: ErrorKind,
    /// A human-oriented description of what happened
    pub description: String,
    /// The internal uid of the task involved, when there is one
    pub uid: Option<String>,
    /// The underlying failure payload, when there is one
    pub error: Option<TaskError>,
    /// The persisted record of the task involved, when the condition arose
    /// while handling one
    pub task: Option<TaskRecord>,
}

impl ErrorEvent {
    pub(crate) fn storage(op: &'static str, error: AdapterError) -> Self {
        ErrorEvent {
            kind: ErrorKind::Storage,
            description: format!("Storage adapter operation `{op}` failed"),
            uid: None,
            error: Some(Arc::new(error)),
            task: None,
        }
    }

    pub(crate) fn task_storage(op: &'static str, task: &TaskRecord, error: AdapterError) -> Self {
        ErrorEvent {
            kind: ErrorKind::Storage,
            description: format!(
                "Storage adapter operation `{op}` failed for task `{}`",
                task.uid
            ),
            uid: Some(task.uid.clone()),
            error: Some(Arc::new(error)),
            task: Some(task.clone()),
        }
    }

    pub(crate) fn add_failed(uid: &str, error: AdapterError) -> Self {
        ErrorEvent {
            kind: ErrorKind::Storage,
            description: format!("Storage adapter operation `add` failed for task `{uid}`"),
            uid: Some(uid.to_string()),
            error: Some(Arc::new(error)),
            task: None,
        }
    }

    pub(crate) fn body(task: &TaskRecord, error: TaskError) -> Self {
        ErrorEvent {
            kind: ErrorKind::Body,
            description: format!("Task `{}` body failed", task.uid),
            uid: Some(task.uid.clone()),
            error: Some(error),
            task: Some(task.clone()),
        }
    }

    pub(crate) fn missing_task(task: &TaskRecord) -> Self {
        ErrorEvent {
            kind: ErrorKind::MissingTask,
            description: format!(
                "Task `{}` was claimed but has no body registered on this instance",
                task.uid
            ),
            uid: Some(task.uid.clone()),
            error: None,
            task: Some(task.clone()),
        }
    }

    pub(crate) fn destroyed_use(uid: &str) -> Self {
        ErrorEvent {
            kind: ErrorKind::DestroyedUse,
            description: format!("Cannot schedule task `{uid}` on a destroyed scheduler instance"),
            uid: Some(uid.to_string()),
            error: None,
            task: None,
        }
    }

    pub(crate) fn over_resolved(uid: &str) -> Self {
        ErrorEvent {
            kind: ErrorKind::OverResolved,
            description: format!(
                "Task `{uid}` signalled completion more than once, only the first resolution took effect"
            ),
            uid: Some(uid.to_string()),
            error: None,
            task: None,
        }
    }
}

/// [`ExecutedEvent`] is the record handed to the executed hook on every normal
/// task completion. The hook's first argument carries the caller-supplied uid
/// with the internal kind suffix stripped; the ``uid`` field here keeps the
/// internal one
#[derive(Debug, Clone)]
pub struct ExecutedEvent {
    /// The internal (suffixed) uid of the task
    pub uid: String,
    /// The completion instant as a calendar date
    pub date: DateTime<Utc>,
    /// The task's configured delay in milliseconds
    pub delay: i64,
    /// The completion instant as epoch milliseconds
    pub timestamp: i64,
}

/// [`ErrorHook`] is the seam through which every operational condition leaves
/// the scheduler. It is invoked from scheduling calls, the revolution loop and
/// task completion paths alike, so implementations must be quick and must not
/// block
///
/// # Required Method(s)
/// When implementing [`ErrorHook`], one has to supply an implementation for
/// [`ErrorHook::on_error`], which receives the full [`ErrorEvent`] record
///
/// # Trait Implementation(s)
/// The provided implementation is [`TracingErrorHook`], which emits the event
/// as a `tracing` error. It is the default for every scheduler instance
///
/// # See Also
/// - [`ErrorEvent`]
/// - [`TracingErrorHook`]
pub trait ErrorHook: Send + Sync {
    /// Receives one operational condition record
    ///
    /// # Argument(s)
    /// This method accepts one argument, that being the [`ErrorEvent`]
    /// record as ``event``
    fn on_error(&self, event: ErrorEvent);
}

impl<H> ErrorHook for H
where
    H: Deref + Send + Sync,
    H::Target: ErrorHook,
{
    fn on_error(&self, event: ErrorEvent) {
        self.deref().on_error(event);
    }
}

/// [`ExecutedHook`] is the informational counterpart to [`ErrorHook`], invoked
/// once per normal task completion
///
/// # Required Method(s)
/// When implementing [`ExecutedHook`], one has to supply an implementation for
/// [`ExecutedHook::on_executed`], which receives the caller-supplied uid (the
/// internal kind suffix stripped) and the full [`ExecutedEvent`] record
///
/// # See Also
/// - [`ExecutedEvent`]
/// - [`TracingExecutedHook`]
pub trait ExecutedHook: Send + Sync {
    /// Receives one completion record
    ///
    /// # Arguments
    /// - **uid** The caller-supplied identifier, the internal kind suffix
    ///   already stripped
    /// - **event** The full [`ExecutedEvent`] record, internal uid included
    fn on_executed(&self, uid: &str, event: ExecutedEvent);
}

impl<H> ExecutedHook for H
where
    H: Deref + Send + Sync,
    H::Target: ExecutedHook,
{
    fn on_executed(&self, uid: &str, event: ExecutedEvent) {
        self.deref().on_executed(uid, event);
    }
}

/// The default [`ErrorHook`], it forwards every event to the process log as a
/// `tracing` error record
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorHook;

impl ErrorHook for TracingErrorHook {
    fn on_error(&self, event: ErrorEvent) {
        tracing::error!(
            kind = ?event.kind,
            uid = event.uid.as_deref(),
            error = ?event.error,
            "{}",
            event.description
        );
    }
}

/// The default [`ExecutedHook`], it notes every completion at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingExecutedHook;

impl ExecutedHook for TracingExecutedHook {
    fn on_executed(&self, uid: &str, event: ExecutedEvent) {
        tracing::debug!(
            uid,
            internal_uid = event.uid.as_str(),
            delay = event.delay,
            timestamp = event.timestamp,
            "task executed"
        );
    }
}
