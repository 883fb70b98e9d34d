//! Protocol-message-shaped types.
//!
//! These stand in for the wire types a real master/agent protocol (Mesos,
//! or a DC/OS-style framework built on top of it) would generate from its
//! own schema. They are kept deliberately small and `serde`-friendly rather
//! than full protobuf bindings, since the protobuf compiler and the
//! generated client stubs are an external collaborator (§6) — the core only
//! needs to read and write the handful of fields it reasons about.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// `resource_id` — identifies a reservation across restarts.
pub const LABEL_RESOURCE_ID: &str = "resource_id";
/// Marks a port reservation as allocated from a dynamic range; the value is
/// the port spec's name.
pub const LABEL_DYNAMIC_PORT: &str = "dynamic_port";
/// Carries a named VIP's name.
pub const LABEL_VIP_KEY: &str = "vip_key";
/// Carries a named VIP's port.
pub const LABEL_VIP_VALUE: &str = "vip_value";

/// A flat label map with typed accessors for the handful of labels the core
/// cares about, grounded in the pattern of exposing typed getters over a
/// string-keyed map rather than scattering raw string lookups through call
/// sites.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels(pub BTreeMap<String, String>);

impl Labels {
    pub fn new() -> Self {
        Labels::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn resource_id(&self) -> Option<&str> {
        self.get(LABEL_RESOURCE_ID).filter(|v| !v.is_empty())
    }

    pub fn dynamic_port_spec_name(&self) -> Option<&str> {
        self.get(LABEL_DYNAMIC_PORT)
    }

    pub fn vip_key(&self) -> Option<&str> {
        self.get(LABEL_VIP_KEY)
    }

    pub fn vip_value(&self) -> Option<&str> {
        self.get(LABEL_VIP_VALUE)
    }
}

/// One entry of a resource's reservation stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationStackEntry {
    pub role: String,
    pub principal: Option<String>,
    pub labels: Labels,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskSourceType {
    Path,
    Mount,
    Root,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeMode {
    Rw,
    Ro,
}

/// The `source` of a [`Volume`], distinguishing a sandbox-relative bind
/// mount (used for ROOT and MOUNT-backed persistent volumes) from a true
/// block-device MOUNT source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeSource {
    /// `SANDBOX_PATH` with `type=PARENT`, `path=<containerPath>`.
    SandboxPath { path: String },
    /// `type=MOUNT`, pointing at the root of a pre-formatted device.
    Mount { root: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub container_path: String,
    pub mode: VolumeMode,
    pub source: VolumeSource,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persistence {
    pub id: String,
    pub principal: Option<String>,
}

/// Disk-specific fields carried by a `disk`-bearing [`crate::resource::Resource`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskInfo {
    pub source_type: DiskSourceType,
    pub persistence: Option<Persistence>,
    pub volume: Option<Volume>,
}

impl DiskInfo {
    pub fn is_atomic(&self) -> bool {
        self.source_type == DiskSourceType::Mount
    }
}

/// The persisted, protocol-level task record the state store hands back for
/// an existing pod. `resources` carries each resource exactly as it was
/// reserved, including its `resource_id`/`persistence_id` labels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub name: String,
    pub executor_id: Option<String>,
    pub resources: Vec<crate::resource::Resource>,
    pub command: Option<String>,
    pub environment: BTreeMap<String, String>,
}

impl TaskInfo {
    pub fn resource_ids(&self) -> BTreeSet<String> {
        self.resources
            .iter()
            .filter_map(|r| r.effective_resource_id().map(str::to_owned))
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Staging,
    Starting,
    Running,
    Finished,
    Failed,
    Killed,
    Lost,
}

impl TaskState {
    pub fn is_running(self) -> bool {
        matches!(self, TaskState::Running)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_name: String,
    pub state: TaskState,
}

/// One agent's advertised resources, as handed to the core by the driver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub agent_id: String,
    pub resources: Vec<crate::resource::Resource>,
}
