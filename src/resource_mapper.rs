//! Matches a persisted `TaskInfo`'s resources against the specs a
//! `TaskSpec` currently declares, so the existing-pod pipeline can seed
//! each evaluation stage with the exact `resource_id`/`persistence_id` it
//! should rebind to, and flag anything left over as orphaned (§4.2).

use std::collections::BTreeSet;

use crate::proto::TaskInfo;
use crate::resource::Resource;
use crate::spec::TaskSpec;
use crate::stage::ExistingReservation;

/// Which declared spec a persisted resource was matched against, by name.
/// The orchestrator uses this to look up the right spec and attach the
/// carried-forward [`ExistingReservation`] when building that spec's
/// stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchedKind {
    Resource { spec_name: String },
    Port { spec_name: String },
    Volume { spec_name: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Matched {
    pub kind: MatchedKind,
    pub existing: ExistingReservation,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MappingResult {
    pub matched: Vec<Matched>,
    /// Persisted resources with no corresponding spec; each yields exactly
    /// one UNRESERVE (and a DESTROY first if persistent).
    pub orphaned: Vec<Resource>,
}

/// Partitions `persisted`'s resources against `task_spec`'s current
/// `ResourceSet`.
pub fn map_resources(task_spec: &TaskSpec, persisted: &TaskInfo) -> MappingResult {
    let resource_set = &task_spec.resource_set;
    let mut matched = Vec::new();
    let mut consumed: BTreeSet<usize> = BTreeSet::new();

    for spec in &resource_set.resources {
        if let Some((idx, resource)) = persisted
            .resources
            .iter()
            .enumerate()
            .find(|(i, r)| !consumed.contains(i) && r.name == spec.name && r.has_resource_id())
        {
            if let Some(resource_id) = resource.effective_resource_id() {
                consumed.insert(idx);
                matched.push(Matched {
                    kind: MatchedKind::Resource {
                        spec_name: spec.name.clone(),
                    },
                    existing: ExistingReservation {
                        resource_id: resource_id.to_string(),
                        persistence_id: None,
                        port: None,
                    },
                });
            }
        }
    }

    for spec in &resource_set.volumes {
        if let Some((idx, resource)) = persisted.resources.iter().enumerate().find(|(i, r)| {
            !consumed.contains(i)
                && r.disk
                    .as_ref()
                    .and_then(|d| d.volume.as_ref())
                    .is_some_and(|v| v.container_path == spec.container_path)
        }) {
            if let Some(resource_id) = resource.effective_resource_id() {
                consumed.insert(idx);
                matched.push(Matched {
                    kind: MatchedKind::Volume {
                        spec_name: spec.name.clone(),
                    },
                    existing: ExistingReservation {
                        resource_id: resource_id.to_string(),
                        persistence_id: resource.effective_persistence_id().map(str::to_owned),
                        port: None,
                    },
                });
            }
        }
    }

    for spec in resource_set.ports.iter().chain(resource_set.named_vips.iter().map(|v| &v.port_spec)) {
        let found = persisted.resources.iter().enumerate().find(|(i, r)| {
            if consumed.contains(i) {
                return false;
            }
            if spec.is_dynamic() {
                r.effective_labels()
                    .and_then(|l| l.dynamic_port_spec_name())
                    == Some(spec.name.as_str())
            } else {
                r.value
                    .as_ranges()
                    .and_then(crate::value::RangeSet::lowest)
                    .is_some_and(|p| p == u64::from(spec.port))
            }
        });

        if let Some((idx, resource)) = found {
            if let Some(resource_id) = resource.effective_resource_id() {
                consumed.insert(idx);
                let bound_port = resource
                    .value
                    .as_ranges()
                    .and_then(crate::value::RangeSet::lowest)
                    .and_then(|p| u32::try_from(p).ok());
                matched.push(Matched {
                    kind: MatchedKind::Port {
                        spec_name: spec.name.clone(),
                    },
                    existing: ExistingReservation {
                        resource_id: resource_id.to_string(),
                        persistence_id: None,
                        port: bound_port,
                    },
                });
            }
        }
    }

    let orphaned = persisted
        .resources
        .iter()
        .enumerate()
        .filter(|(i, _)| !consumed.contains(i))
        .map(|(_, r)| r.clone())
        .collect();

    MappingResult { matched, orphaned }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{DiskInfo, DiskSourceType, Labels, Persistence, Volume, VolumeMode, VolumeSource};
    use crate::resource::DEFAULT_ROLE;
    use crate::spec::{PortSpec, ResourceSet, ResourceSpec, VolumeSpec, VolumeType};
    use crate::value::{Interval, RangeSet, Value};
    use std::collections::BTreeMap;

    fn task_spec_with(resource_set: ResourceSet) -> TaskSpec {
        TaskSpec {
            name: "task-a".into(),
            resource_set,
            command: None,
            should_launch: true,
            environment: BTreeMap::new(),
        }
    }

    #[test]
    fn matches_scalar_resource_by_name_and_resource_id() {
        let spec = task_spec_with(ResourceSet {
            id: "rs".into(),
            resources: vec![ResourceSpec {
                name: "cpus".into(),
                value: Value::Scalar(1.0),
                role: DEFAULT_ROLE.into(),
                principal: None,
            }],
            volumes: vec![],
            ports: vec![],
            named_vips: vec![],
        });

        let persisted = TaskInfo {
            name: "task-a".into(),
            executor_id: Some("exec-1".into()),
            resources: vec![Resource::new("cpus", "role-a", Value::Scalar(1.0)).reserve(
                "role-a",
                None,
                Labels::new().with("resource_id", "r1"),
            )],
            command: None,
            environment: BTreeMap::new(),
        };

        let result = map_resources(&spec, &persisted);
        assert_eq!(result.matched.len(), 1);
        assert!(result.orphaned.is_empty());
        assert_eq!(result.matched[0].existing.resource_id, "r1");
    }

    #[test]
    fn unmatched_resources_are_orphaned() {
        let spec = task_spec_with(ResourceSet::default());
        let persisted = TaskInfo {
            name: "task-a".into(),
            executor_id: None,
            resources: vec![Resource::new("mem", "role-a", Value::Scalar(256.0)).reserve(
                "role-a",
                None,
                Labels::new().with("resource_id", "r2"),
            )],
            command: None,
            environment: BTreeMap::new(),
        };

        let result = map_resources(&spec, &persisted);
        assert!(result.matched.is_empty());
        assert_eq!(result.orphaned.len(), 1);
    }

    #[test]
    fn matches_volume_by_container_path_and_carries_persistence_id() {
        let spec = task_spec_with(ResourceSet {
            id: "rs".into(),
            resources: vec![],
            volumes: vec![VolumeSpec {
                name: "data".into(),
                value: Value::Scalar(5.0),
                role: DEFAULT_ROLE.into(),
                principal: None,
                volume_type: VolumeType::Root,
                container_path: "/data".into(),
            }],
            ports: vec![],
            named_vips: vec![],
        });

        let disk = DiskInfo {
            source_type: DiskSourceType::Root,
            persistence: Some(Persistence {
                id: "p1".into(),
                principal: None,
            }),
            volume: Some(Volume {
                container_path: "/data".into(),
                mode: VolumeMode::Rw,
                source: VolumeSource::SandboxPath { path: "/data".into() },
            }),
        };
        let persisted = TaskInfo {
            name: "task-a".into(),
            executor_id: None,
            resources: vec![Resource::new("disk", "role-a", Value::Scalar(5.0))
                .with_disk(disk)
                .reserve("role-a", None, Labels::new().with("resource_id", "r3"))],
            command: None,
            environment: BTreeMap::new(),
        };

        let result = map_resources(&spec, &persisted);
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].existing.persistence_id.as_deref(), Some("p1"));
    }

    #[test]
    fn matches_dynamic_port_by_label() {
        let spec = task_spec_with(ResourceSet {
            id: "rs".into(),
            resources: vec![],
            volumes: vec![],
            ports: vec![PortSpec {
                name: "http".into(),
                role: DEFAULT_ROLE.into(),
                principal: None,
                port: 0,
            }],
            named_vips: vec![],
        });

        let persisted = TaskInfo {
            name: "task-a".into(),
            executor_id: None,
            resources: vec![Resource::new(
                "ports",
                "role-a",
                Value::Ranges(RangeSet::new(vec![Interval::single(31005)])),
            )
            .reserve(
                "role-a",
                None,
                Labels::new()
                    .with("resource_id", "r4")
                    .with("dynamic_port", "http"),
            )],
            command: None,
            environment: BTreeMap::new(),
        };

        let result = map_resources(&spec, &persisted);
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].existing.port, Some(31005));
    }
}
