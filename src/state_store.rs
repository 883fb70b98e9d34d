//! The external collaborator that persists pod state across scheduler
//! restarts. Grounded in the wrapper-over-external-client pattern (a trait
//! boundary the core depends on, with an async, fallible surface) rather
//! than reaching into a concrete storage client directly.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Error;
use crate::proto::{TaskInfo, TaskStatus};

/// Read access to whatever durably persists a service's tasks between
/// `evaluate` calls. A real implementation would be backed by ZooKeeper,
/// etcd, or similar; the core only ever reads through this trait.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// All persisted `TaskInfo`s for the named pod instance, keyed by task
    /// name. Empty/missing means "this is a new pod, nothing to match
    /// against".
    async fn fetch_tasks(&self, pod_instance_name: &str) -> Result<BTreeMap<String, TaskInfo>, Error>;

    /// The last known status for a given task, if any has ever been
    /// reported.
    async fn fetch_status(&self, task_name: &str) -> Result<Option<TaskStatus>, Error>;

    /// Whether the orchestrator's failure/recovery classification (§5) has
    /// already marked this pod as permanently failed, e.g. via an operator
    /// "replace" marker persisted out of band.
    async fn is_permanently_failed(&self, pod_instance_name: &str) -> Result<bool, Error>;
}

/// An in-memory [`StateStore`] for tests and local experimentation. Never
/// used in production — the real store is always injected by the caller.
#[derive(Default)]
pub struct InMemoryStateStore {
    tasks: Mutex<BTreeMap<String, BTreeMap<String, TaskInfo>>>,
    statuses: Mutex<BTreeMap<String, TaskStatus>>,
    permanently_failed: Mutex<BTreeMap<String, bool>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        InMemoryStateStore::default()
    }

    pub fn put_tasks(&self, pod_instance_name: impl Into<String>, tasks: BTreeMap<String, TaskInfo>) {
        self.tasks.lock().unwrap().insert(pod_instance_name.into(), tasks);
    }

    pub fn put_status(&self, task_name: impl Into<String>, status: TaskStatus) {
        self.statuses.lock().unwrap().insert(task_name.into(), status);
    }

    pub fn mark_permanently_failed(&self, pod_instance_name: impl Into<String>) {
        self.permanently_failed
            .lock()
            .unwrap()
            .insert(pod_instance_name.into(), true);
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn fetch_tasks(&self, pod_instance_name: &str) -> Result<BTreeMap<String, TaskInfo>, Error> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .get(pod_instance_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_status(&self, task_name: &str) -> Result<Option<TaskStatus>, Error> {
        Ok(self.statuses.lock().unwrap().get(task_name).cloned())
    }

    async fn is_permanently_failed(&self, pod_instance_name: &str) -> Result<bool, Error> {
        Ok(self
            .permanently_failed
            .lock()
            .unwrap()
            .get(pod_instance_name)
            .copied()
            .unwrap_or(false))
    }
}
