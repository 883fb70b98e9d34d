//! Accumulates the in-progress task and executor protocol messages as
//! stages contribute reservations, volumes and ports, and finalizes them
//! into [`TaskInfo`] records once a pipeline completes.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::proto::TaskInfo;
use crate::resource::Resource;
use crate::spec::PodInstance;

/// A single pod evaluation's mutable scratch space, one instance per
/// offer attempt. Stages call [`PodInfoBuilder::add_resource`] with either
/// a task name (the resource belongs to that task alone) or `None` (an
/// executor-level resource, shared by every task in the pod).
pub struct PodInfoBuilder {
    pod_instance: PodInstance,
    service_name: String,
    target_config_id: Uuid,
    /// Carried forward from the persisted TaskInfo on the existing-pod
    /// path; `None` means a fresh executor is being created.
    executor_id: Option<String>,
    task_resources: BTreeMap<String, Vec<Resource>>,
    executor_resources: Vec<Resource>,
    task_environment: BTreeMap<String, BTreeMap<String, String>>,
    /// Side channel for dynamically allocated port numbers, keyed by port
    /// spec name, consulted when building `PORT_<NAME>` environment
    /// entries and when a sibling volume stage needs to find an
    /// already-built executor resource by label.
    allocated_ports: BTreeMap<String, u32>,
}

impl PodInfoBuilder {
    pub fn new(pod_instance: PodInstance, service_name: impl Into<String>, target_config_id: Uuid) -> Self {
        PodInfoBuilder {
            pod_instance,
            service_name: service_name.into(),
            target_config_id,
            executor_id: None,
            task_resources: BTreeMap::new(),
            executor_resources: Vec::new(),
            task_environment: BTreeMap::new(),
            allocated_ports: BTreeMap::new(),
        }
    }

    pub fn with_existing_executor_id(mut self, executor_id: impl Into<String>) -> Self {
        self.executor_id = Some(executor_id.into());
        self
    }

    pub fn pod_instance(&self) -> &PodInstance {
        &self.pod_instance
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn target_config_id(&self) -> Uuid {
        self.target_config_id
    }

    /// Record a resource against a specific task, or, when `task_name` is
    /// `None`, against the pod's shared executor so every task in the pod
    /// picks it up at `build` time.
    pub fn add_resource(&mut self, task_name: Option<&str>, resource: Resource) {
        match task_name {
            Some(name) => self
                .task_resources
                .entry(name.to_string())
                .or_default()
                .push(resource),
            None => self.executor_resources.push(resource),
        }
    }

    /// Find an already-built executor-level resource by its effective
    /// `resource_id`, used by the volume stage's reuse path (§4.3) when a
    /// task needs to reference a shared executor volume that a sibling
    /// task's stage already materialized this evaluation.
    pub fn find_executor_resource_by_id(&self, resource_id: &str) -> Option<&Resource> {
        self.executor_resources
            .iter()
            .find(|r| r.effective_resource_id() == Some(resource_id))
    }

    pub fn set_allocated_port(&mut self, spec_name: impl Into<String>, port: u32) {
        self.allocated_ports.insert(spec_name.into(), port);
    }

    pub fn allocated_port(&self, spec_name: &str) -> Option<u32> {
        self.allocated_ports.get(spec_name).copied()
    }

    pub fn set_environment(&mut self, task_name: &str, key: impl Into<String>, value: impl Into<String>) {
        self.task_environment
            .entry(task_name.to_string())
            .or_default()
            .insert(key.into(), value.into());
    }

    pub fn executor_id(&self) -> Option<&str> {
        self.executor_id.as_deref()
    }

    /// Finalize the named task into a [`TaskInfo`], combining its own
    /// resources with the pod's shared executor-level resources.
    pub fn build_task(&self, task_name: &str, command: Option<String>) -> TaskInfo {
        let mut resources = self
            .task_resources
            .get(task_name)
            .cloned()
            .unwrap_or_default();
        resources.extend(self.executor_resources.iter().cloned());

        TaskInfo {
            name: task_name.to_string(),
            executor_id: self.executor_id.clone(),
            resources,
            command,
            environment: self
                .task_environment
                .get(task_name)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn builder() -> PodInfoBuilder {
        PodInfoBuilder::new(
            PodInstance { name: "pod".into(), tasks: vec![], placement_rule: std::sync::Arc::new(crate::spec::AlwaysAcceptable) },
            "my-service",
            Uuid::from_u128(1),
        )
    }

    #[test]
    fn executor_resources_are_shared_across_tasks() {
        let mut builder = builder();
        builder.add_resource(None, Resource::new("disk", "*", Value::Scalar(10.0)));
        builder.add_resource(Some("task-a"), Resource::new("cpus", "*", Value::Scalar(1.0)));

        let built = builder.build_task("task-a", None);
        assert_eq!(built.resources.len(), 2);

        let built_other = builder.build_task("task-b", None);
        assert_eq!(built_other.resources.len(), 1);
    }

    #[test]
    fn allocated_port_round_trips() {
        let mut builder = builder();
        builder.set_allocated_port("http", 31005);
        assert_eq!(builder.allocated_port("http"), Some(31005));
        assert_eq!(builder.allocated_port("missing"), None);
    }
}
