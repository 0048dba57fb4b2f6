use crate::errors::TaskError;
use crate::hooks::{ErrorEvent, ErrorHook};
use crate::utils::date_time_to_millis;
use chrono::{DateTime, Utc};
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// The suffix appended to a caller uid by the recurring primitive
pub(crate) const INTERVAL_SUFFIX: &str = "setInterval";

/// The suffix appended to a caller uid by the one-shot primitive
pub(crate) const TIMEOUT_SUFFIX: &str = "setTimeout";

/// The suffix appended to a caller uid by the immediate primitive
pub(crate) const IMMEDIATE_SUFFIX: &str = "setImmediate";

/// Recovers the caller-supplied uid from an internal key. Unknown shapes are
/// passed through untouched
pub(crate) fn strip_kind_suffix(uid: &str) -> &str {
    uid.strip_suffix(INTERVAL_SUFFIX)
        .or_else(|| uid.strip_suffix(TIMEOUT_SUFFIX))
        .or_else(|| uid.strip_suffix(IMMEDIATE_SUFFIX))
        .unwrap_or(uid)
}

/// The future shape a [`TaskBody::Future`] closure produces
pub type BoxedTaskFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send>>;

/// [`TaskBody`] is the logic of a task as this instance knows it, held in the
/// in-memory registry and never persisted. Two calling conventions exist and
/// both receive a [`Done`] completion handle:
///
/// - [`TaskBody::Callback`] the body is a plain closure that signals through
///   the handle whenever it considers itself finished (possibly from another
///   thread, long after returning)
/// - [`TaskBody::Future`] the body returns a future; its resolution counts as
///   [`Done::signal`] with no argument and an ``Err`` as [`Done::fail`]. The
///   closure may also use the handle directly, whichever lands first is the
///   one observed
///
/// # Constructor(s)
/// Use [`TaskBody::callback`] or [`TaskBody::future`] rather than building
/// the variants by hand, they take care of the boxing
///
/// # See Also
/// - [`Done`]
#[derive(Clone)]
pub enum TaskBody {
    /// A plain closure signalling completion through the handle
    Callback(Arc<dyn Fn(Done) + Send + Sync>),
    /// A closure producing a future whose settlement is the completion
    Future(Arc<dyn Fn(Done) -> BoxedTaskFuture + Send + Sync>),
}

impl TaskBody {
    /// Wraps a plain closure as a [`TaskBody::Callback`]
    ///
    /// # Argument(s)
    /// This method accepts one argument, that being the closure as
    /// ``body``; it receives the [`Done`] handle to signal through
    pub fn callback(body: impl Fn(Done) + Send + Sync + 'static) -> Self {
        TaskBody::Callback(Arc::new(body))
    }

    /// Wraps a future-returning closure as a [`TaskBody::Future`]
    ///
    /// # Argument(s)
    /// This method accepts one argument, that being the closure as
    /// ``body``; it receives the [`Done`] handle and produces the future
    /// whose settlement counts as the completion
    pub fn future<F, Fut>(body: F) -> Self
    where
        F: Fn(Done) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        TaskBody::Future(Arc::new(move |done| Box::pin(body(done))))
    }
}

impl Debug for TaskBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskBody::Callback(_) => f.write_str("TaskBody::Callback"),
            TaskBody::Future(_) => f.write_str("TaskBody::Future"),
        }
    }
}

/// How one execution attempt ended, as observed by the execution engine
#[derive(Debug)]
pub(crate) enum Resolution {
    /// Normal completion, optionally carrying an explicit next-run instant
    /// (epoch milliseconds) for recurring tasks
    Completed(Option<i64>),
    /// The body failed, by explicit signal, rejected future or panic
    Failed(TaskError),
}

enum ResolverState {
    Pending,
    Resolved,
    OverResolved,
}

struct DoneInner {
    uid: String,
    state: Mutex<ResolverState>,
    tx: Mutex<Option<oneshot::Sender<Resolution>>>,
    on_error: Arc<dyn ErrorHook>,
}

/// [`Done`] is the completion handle a task body receives. It is cheap to
/// clone and safe to move across threads; exactly one resolution is ever
/// observed per execution attempt
///
/// Resolving a second time (through any clone, by any method) is a programmer
/// error: the extra resolution is dropped and reported through the error
/// hook. Dropping every clone without resolving leaves the attempt
/// unresolved, which the zombie recovery protocol eventually retries
///
/// # See Also
/// - [`TaskBody`]
#[derive(Clone)]
pub struct Done {
    inner: Arc<DoneInner>,
}

impl Debug for Done {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Done").field("uid", &self.inner.uid).finish()
    }
}

impl Done {
    /// Builds a handle and the receiving end the execution engine awaits
    pub(crate) fn channel(
        uid: String,
        on_error: Arc<dyn ErrorHook>,
    ) -> (Done, oneshot::Receiver<Resolution>) {
        let (tx, rx) = oneshot::channel();
        let done = Done {
            inner: Arc::new(DoneInner {
                uid,
                state: Mutex::new(ResolverState::Pending),
                tx: Mutex::new(Some(tx)),
                on_error,
            }),
        };
        (done, rx)
    }

    /// Signals normal completion. For recurring tasks the next run lands at
    /// the regular period from now
    pub fn signal(&self) {
        self.resolve(Resolution::Completed(None));
    }

    /// Signals normal completion with an explicit next-run instant, which is
    /// how calendar-style cadences are layered on recurring tasks. An instant
    /// already in the past is treated as malformed and the regular period is
    /// used instead
    ///
    /// # Argument(s)
    /// It accepts a ``next_run`` parameter, the instant at which the task
    /// should next come due
    pub fn signal_at(&self, next_run: DateTime<Utc>) {
        self.resolve(Resolution::Completed(Some(date_time_to_millis(next_run))));
    }

    /// Signals that the body failed with the given payload
    ///
    /// # Argument(s)
    /// It accepts an ``error`` parameter, the opaque failure payload handed
    /// to the error hook
    pub fn fail(&self, error: TaskError) {
        self.resolve(Resolution::Failed(error));
    }

    fn resolve(&self, resolution: Resolution) {
        {
            let mut state = self.inner.state.lock().unwrap();
            match *state {
                ResolverState::Pending => {
                    *state = ResolverState::Resolved;
                }
                ResolverState::Resolved | ResolverState::OverResolved => {
                    *state = ResolverState::OverResolved;
                    drop(state);
                    self.inner
                        .on_error
                        .on_error(ErrorEvent::over_resolved(&self.inner.uid));
                    return;
                }
            }
        }
        if let Some(tx) = self.inner.tx.lock().unwrap().take() {
            // the engine dropping the receiver is not the body's concern
            let _ = tx.send(resolution);
        }
    }
}
