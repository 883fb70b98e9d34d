//! The desired-state description the orchestrator consumes: resource
//! specs, volume/port/VIP specs, and the pod instance + requirement that
//! bundle them together.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::value::Value;

#[derive(Clone, Debug, PartialEq)]
pub struct ResourceSpec {
    pub name: String,
    pub value: Value,
    pub role: String,
    pub principal: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeType {
    Root,
    Mount,
    Path,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VolumeSpec {
    pub name: String,
    pub value: Value,
    pub role: String,
    pub principal: Option<String>,
    pub volume_type: VolumeType,
    pub container_path: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PortSpec {
    pub name: String,
    pub role: String,
    pub principal: Option<String>,
    /// `0` means "allocate dynamically from the role's port range".
    pub port: u32,
}

impl PortSpec {
    pub fn is_dynamic(&self) -> bool {
        self.port == 0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NamedVipSpec {
    pub port_spec: PortSpec,
    pub vip_name: String,
    pub vip_port: u32,
}

/// One task's full resource requirement. Resource sets are shareable
/// across the tasks of a pod (e.g. an executor-level volume).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceSet {
    pub id: String,
    pub resources: Vec<ResourceSpec>,
    pub volumes: Vec<VolumeSpec>,
    pub ports: Vec<PortSpec>,
    pub named_vips: Vec<NamedVipSpec>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TaskSpec {
    pub name: String,
    pub resource_set: ResourceSet,
    pub command: Option<String>,
    /// Whether the orchestrator should emit a LAUNCH recommendation once
    /// this task's resources are fully evaluated, or merely prepare and
    /// retain them (§4.3 `shouldLaunch=false`).
    pub should_launch: bool,
    pub environment: BTreeMap<String, String>,
}

/// A predicate over `(offer, all tasks in the service)`, authored
/// externally (an affinity/anti-affinity DSL is out of scope here — the
/// core only consumes the resulting yes/no decision).
pub trait PlacementRule: Send + Sync {
    fn is_acceptable(&self, offer: &crate::proto::Offer, all_tasks: &[TaskSpec]) -> bool;

    fn describe(&self) -> String {
        "placement rule".to_string()
    }
}

/// A placement rule that always accepts, used when a pod has no affinity
/// requirements.
pub struct AlwaysAcceptable;

impl PlacementRule for AlwaysAcceptable {
    fn is_acceptable(&self, _offer: &crate::proto::Offer, _all_tasks: &[TaskSpec]) -> bool {
        true
    }

    fn describe(&self) -> String {
        "no placement rule".to_string()
    }
}

/// `tasks` plus an optional placement rule. `Clone` only, not `Debug`/
/// `PartialEq` — `Arc<dyn PlacementRule>` carries no such bounds, the way
/// a predicate value generally can't be compared or printed meaningfully.
#[derive(Clone)]
pub struct PodInstance {
    /// Identifies this pod instance to the state store and in logs, e.g.
    /// `"data-node-0"`.
    pub name: String,
    pub tasks: Vec<TaskSpec>,
    pub placement_rule: Arc<dyn PlacementRule>,
}

impl PodInstance {
    pub fn task(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.name == name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryType {
    None,
    Transient,
    Permanent,
}

#[derive(Clone)]
pub struct PodInstanceRequirement {
    pub pod_instance: PodInstance,
    pub tasks_to_launch: Vec<String>,
    pub recovery_type: RecoveryType,
}

impl PodInstanceRequirement {
    /// `InvalidRequirement` validation (§7): no tasks, duplicate names, or a
    /// `tasks_to_launch` entry the pod instance does not define.
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if self.pod_instance.tasks.is_empty() {
            return Err(crate::error::Error::InvalidRequirement {
                reason: "pod instance has no tasks".to_string(),
            });
        }

        let mut seen = std::collections::BTreeSet::new();
        for task in &self.pod_instance.tasks {
            if !seen.insert(task.name.as_str()) {
                return Err(crate::error::Error::InvalidRequirement {
                    reason: format!("duplicate task name {:?}", task.name),
                });
            }
        }

        for wanted in &self.tasks_to_launch {
            if self.pod_instance.task(wanted).is_none() {
                return Err(crate::error::Error::InvalidRequirement {
                    reason: format!("tasksToLaunch names unknown task {wanted:?}"),
                });
            }
        }

        Ok(())
    }

    pub fn should_launch(&self, task_name: &str) -> bool {
        self.tasks_to_launch.iter().any(|t| t == task_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str) -> TaskSpec {
        TaskSpec {
            name: name.to_string(),
            resource_set: ResourceSet::default(),
            command: None,
            should_launch: true,
            environment: BTreeMap::new(),
        }
    }

    fn test_pod_instance(tasks: Vec<TaskSpec>) -> PodInstance {
        PodInstance {
            name: "pod".into(),
            tasks,
            placement_rule: Arc::new(AlwaysAcceptable),
        }
    }

    #[test]
    fn validate_rejects_empty_pod() {
        let requirement = PodInstanceRequirement {
            pod_instance: test_pod_instance(vec![]),
            tasks_to_launch: vec![],
            recovery_type: RecoveryType::None,
        };
        assert!(requirement.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_task_names() {
        let requirement = PodInstanceRequirement {
            pod_instance: test_pod_instance(vec![task("a"), task("a")]),
            tasks_to_launch: vec![],
            recovery_type: RecoveryType::None,
        };
        assert!(requirement.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_tasks_to_launch() {
        let requirement = PodInstanceRequirement {
            pod_instance: test_pod_instance(vec![task("a")]),
            tasks_to_launch: vec!["b".to_string()],
            recovery_type: RecoveryType::None,
        };
        assert!(requirement.validate().is_err());
    }
}
