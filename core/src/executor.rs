use crate::adapter::{StorageAdapter, TaskExecutor, TaskRecord};
use crate::clock::SchedulerClock;
use crate::errors::TaskError;
use crate::hooks::{ErrorEvent, ErrorHook, ExecutedEvent, ExecutedHook};
use crate::registry::TaskRegistry;
use crate::task::{Done, Resolution, TaskBody, strip_kind_suffix};
use crate::utils::millis_to_date_time;
use async_trait::async_trait;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// The execution engine. It receives every claimed due task from the storage
/// adapter's iterate step, finds the matching body in this instance's
/// registry and drives one execution attempt to a single observed resolution
///
/// Execution ordering contracts:
/// - one-shot tasks have their record removed before the body is invoked, so
///   a body that never resolves cannot fire again in a later revolution
/// - recurring tasks get their next due instant written only when the
///   attempt resolves, an unresolved attempt is left to the zombie horizon
#[derive(Clone)]
pub(crate) struct ExecutionEngine {
    adapter: Arc<dyn StorageAdapter>,
    clock: Arc<dyn SchedulerClock>,
    registry: Arc<TaskRegistry>,
    on_error: Arc<dyn ErrorHook>,
    on_executed: Arc<dyn ExecutedHook>,
    auto_clear: bool,
    debug: bool,
}

#[async_trait]
impl TaskExecutor for ExecutionEngine {
    async fn execute(&self, task: TaskRecord) {
        match self.registry.body(&task.uid) {
            Some(body) => {
                if self.debug {
                    tracing::debug!(uid = task.uid.as_str(), "dispatching claimed task");
                }
                let engine = self.clone();
                // bodies run on the worker pool, a slow one never stalls the
                // revolution that claimed it
                tokio::spawn(async move {
                    engine.run_attempt(task, body).await;
                });
            }
            None => self.handle_missing(task).await,
        }
    }
}

impl ExecutionEngine {
    pub(crate) fn new(
        adapter: Arc<dyn StorageAdapter>,
        clock: Arc<dyn SchedulerClock>,
        registry: Arc<TaskRegistry>,
        on_error: Arc<dyn ErrorHook>,
        on_executed: Arc<dyn ExecutedHook>,
        auto_clear: bool,
        debug: bool,
    ) -> Self {
        ExecutionEngine {
            adapter,
            clock,
            registry,
            on_error,
            on_executed,
            auto_clear,
            debug,
        }
    }

    /// The claimed task's body lives on some other instance. Either clear the
    /// record (``auto_clear``) or warn once per uid and leave it for the
    /// operator
    async fn handle_missing(&self, task: TaskRecord) {
        let first_encounter = self.registry.mark_missing(&task.uid);
        if self.auto_clear {
            if self.debug {
                tracing::debug!(uid = task.uid.as_str(), "auto-clearing bodyless task");
            }
            if let Err(error) = self.adapter.remove(&task.uid).await {
                self.on_error
                    .on_error(ErrorEvent::task_storage("remove", &task, error));
            }
        } else if first_encounter {
            self.on_error.on_error(ErrorEvent::missing_task(&task));
        }
    }

    async fn run_attempt(&self, task: TaskRecord, body: TaskBody) {
        if !task.is_interval {
            // one-shots disappear from storage before the body runs; losing
            // the race here means a cancellation or another instance won
            match self.adapter.remove(&task.uid).await {
                Ok(true) => {}
                Ok(false) => return,
                Err(error) => {
                    self.on_error
                        .on_error(ErrorEvent::task_storage("remove", &task, error));
                    return;
                }
            }
        }

        let (done, rx) = Done::channel(task.uid.clone(), self.on_error.clone());
        match body {
            TaskBody::Callback(callback) => {
                let handle = done.clone();
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback.as_ref()(handle))) {
                    done.fail(panic_payload(payload));
                }
            }
            TaskBody::Future(factory) => {
                match catch_unwind(AssertUnwindSafe(|| factory.as_ref()(done.clone()))) {
                    Ok(settling) => {
                        let settled = tokio::spawn(settling);
                        let handle = done.clone();
                        tokio::spawn(async move {
                            match settled.await {
                                Ok(Ok(())) => handle.signal(),
                                Ok(Err(error)) => handle.fail(error),
                                Err(join_error) => handle.fail(Arc::new(join_error)),
                            }
                        });
                    }
                    Err(payload) => done.fail(panic_payload(payload)),
                }
            }
        }
        // keep no handle of our own, so an attempt whose body dropped every
        // clone unresolved is observed as abandoned rather than pending
        drop(done);

        match rx.await {
            Ok(Resolution::Completed(next_override)) => {
                self.complete(&task, next_override).await;
            }
            Ok(Resolution::Failed(error)) => {
                self.fail(&task, error).await;
            }
            // abandoned: the zombie horizon re-dispatches surviving records
            Err(_) => {}
        }
    }

    async fn complete(&self, task: &TaskRecord, next_override: Option<i64>) {
        let now = self.clock.now().await;
        if task.is_interval {
            let next_execute_at = match next_override {
                Some(at) if at >= now => at,
                _ => now + task.delay,
            };
            if let Err(error) = self.adapter.update(task, next_execute_at).await {
                self.on_error
                    .on_error(ErrorEvent::task_storage("update", task, error));
            }
        } else {
            self.registry.remove(&task.uid);
        }
        self.on_executed.on_executed(
            strip_kind_suffix(&task.uid),
            ExecutedEvent {
                uid: task.uid.clone(),
                date: millis_to_date_time(now),
                delay: task.delay,
                timestamp: now,
            },
        );
    }

    async fn fail(&self, task: &TaskRecord, error: TaskError) {
        self.on_error.on_error(ErrorEvent::body(task, error));
        if task.is_interval {
            // a failing beat must not stop the cadence
            let now = self.clock.now().await;
            if let Err(error) = self.adapter.update(task, now + task.delay).await {
                self.on_error
                    .on_error(ErrorEvent::task_storage("update", task, error));
            }
        } else {
            self.registry.remove(&task.uid);
        }
    }
}

/// Renders a panic payload into the opaque body-failure type
fn panic_payload(payload: Box<dyn Any + Send>) -> TaskError {
    if let Some(message) = payload.downcast_ref::<&str>() {
        Arc::new(format!("task body panicked: {message}"))
    } else if let Some(message) = payload.downcast_ref::<String>() {
        Arc::new(format!("task body panicked: {message}"))
    } else {
        Arc::new("task body panicked".to_string())
    }
}
