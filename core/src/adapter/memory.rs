use crate::adapter::{LockRecord, PingStatus, StorageAdapter, TaskExecutor, TaskRecord};
use crate::errors::AdapterError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::Mutex;

/// [`MemoryAdapter`] is an implementation of [`StorageAdapter`] that keeps every
/// record in process memory. It is the reference implementation of the adapter
/// contract and the back-end the test-suite runs against; several scheduler
/// instances sharing one `Arc<MemoryAdapter>` form an in-process fleet over the
/// same task table and lock slot
///
/// # Usage Note(s)
/// Nothing survives a process exit, so it is meant for demos, tests and
/// single-process deployments where durability does not matter. Production
/// fleets should use a back-end over an external store
///
/// # Constructor(s)
/// When constructing a new [`MemoryAdapter`], use [`MemoryAdapter::new`] with
/// the scope prefix the fleet shares
///
/// # See Also
/// - [`StorageAdapter`]
/// - [`MemoryAdapter::new`]
pub struct MemoryAdapter {
    prefix: String,
    tasks: DashMap<String, TaskRecord>,
    lock: Mutex<Option<LockRecord>>,
}

impl Debug for MemoryAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAdapter")
            .field("prefix", &self.prefix)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl MemoryAdapter {
    /// Creates / Constructs a new [`MemoryAdapter`] over the given scope
    /// prefix, wrapped in an ``Arc`` so a fleet of instances can share it
    ///
    /// # Argument(s)
    /// This method accepts one argument, that being the scope ``prefix``
    /// the fleet shares
    pub fn new(prefix: impl Into<String>) -> Arc<Self> {
        Arc::new(MemoryAdapter {
            prefix: prefix.into(),
            tasks: DashMap::new(),
            lock: Mutex::new(None),
        })
    }

    /// The scope prefix this adapter serves
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns a copy of the stored record for ``uid``, tombstoned records
    /// included. Inspection surface for tests and diagnostics
    ///
    /// # Argument(s)
    /// This method accepts one argument, that being the internal task
    /// identifier as ``uid``
    pub fn task(&self, uid: &str) -> Option<TaskRecord> {
        self.tasks.get(uid).map(|entry| entry.value().clone())
    }

    /// The number of live records in the task table
    pub fn task_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|entry| !entry.value().is_deleted)
            .count()
    }

    /// Returns a copy of the current lock record, if any instance holds one
    pub async fn current_lock(&self) -> Option<LockRecord> {
        self.lock.lock().await.clone()
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    async fn ping(&self) -> PingStatus {
        PingStatus::ok()
    }

    async fn acquire_lock(&self, now: i64, expire_at: i64) -> Result<bool, AdapterError> {
        let mut slot = self.lock.lock().await;
        match slot.as_ref() {
            // a live lock belongs to some revolution in flight
            Some(held) if held.expire_at > now => Ok(false),
            _ => {
                *slot = Some(LockRecord {
                    scope: self.prefix.clone(),
                    expire_at,
                });
                Ok(true)
            }
        }
    }

    async fn release_lock(&self) -> Result<(), AdapterError> {
        self.lock.lock().await.take();
        Ok(())
    }

    async fn add(
        &self,
        uid: &str,
        is_interval: bool,
        delay: i64,
        now: i64,
    ) -> Result<bool, AdapterError> {
        if let Some(mut record) = self.tasks.get_mut(uid) {
            if !record.is_deleted {
                let record = record.value_mut();
                if record.delay != delay {
                    record.delay = delay;
                }
                let due = now + delay;
                if due < record.execute_at {
                    record.execute_at = due;
                }
                return Ok(false);
            }
        }
        self.tasks.insert(
            uid.to_string(),
            TaskRecord {
                uid: uid.to_string(),
                delay,
                execute_at: now + delay,
                is_interval,
                is_deleted: false,
            },
        );
        Ok(true)
    }

    async fn remove(&self, uid: &str) -> Result<bool, AdapterError> {
        Ok(self
            .tasks
            .remove_if(uid, |_, record| !record.is_deleted)
            .is_some())
    }

    async fn update(&self, task: &TaskRecord, next_execute_at: i64) -> Result<bool, AdapterError> {
        if let Some(mut record) = self.tasks.get_mut(&task.uid) {
            if !record.is_deleted {
                record.value_mut().execute_at = next_execute_at;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn iterate(
        &self,
        now: i64,
        reschedule_to: i64,
        executor: Arc<dyn TaskExecutor>,
    ) -> Result<(), AdapterError> {
        // claim first: every due record is pushed to the zombie horizon before
        // anything runs, then the shard guards are released before dispatch
        let mut due = Vec::new();
        for mut entry in self.tasks.iter_mut() {
            let record = entry.value_mut();
            if !record.is_deleted && record.execute_at <= now {
                record.execute_at = reschedule_to;
                due.push(record.clone());
            }
        }
        for task in due {
            executor.execute(task).await;
        }
        Ok(())
    }
}
