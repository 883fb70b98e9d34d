use super::reserve::{reserve_or_bind_atomic, reserve_or_bind_divisible};
use super::{EvaluationStage, ExistingReservation, Outcome};
use crate::error::Error;
use crate::pod_info_builder::PodInfoBuilder;
use crate::proto::{
    DiskInfo, DiskSourceType, Labels, Offer, Persistence, Volume, VolumeMode, VolumeSource,
};
use crate::recommendation::Recommendation;
use crate::resource_pool::ResourcePool;
use crate::spec::{VolumeSpec, VolumeType};
use crate::uuid_gen::UuidSource;

/// The resource name both ROOT and MOUNT volumes are carried under.
pub const DISK_RESOURCE_NAME: &str = "disk";

/// ROOT and MOUNT persistent volumes (§4.3). PATH volumes carry no
/// persistence identity and are out of scope for this core — the spec's
/// `VolumeType::Path` variant exists for completeness of the wire model
/// but this stage only handles `Root`/`Mount`.
pub struct VolumeEvaluationStage {
    pub task_name: Option<String>,
    pub spec: VolumeSpec,
    pub existing: Option<ExistingReservation>,
}

impl EvaluationStage for VolumeEvaluationStage {
    fn evaluate(
        &self,
        pool: &mut ResourcePool,
        builder: &mut PodInfoBuilder,
        uuid_source: &dyn UuidSource,
        offer: &Offer,
    ) -> Result<Outcome, Error> {
        let existing_id = self.existing.as_ref().map(|e| e.resource_id.as_str());

        let reserved = match self.spec.volume_type {
            VolumeType::Root => reserve_or_bind_divisible(
                pool,
                uuid_source,
                &self.spec.role,
                DISK_RESOURCE_NAME,
                self.spec.principal.as_deref(),
                &self.spec.value,
                existing_id,
                Labels::new(),
            )?,
            VolumeType::Mount => reserve_or_bind_atomic(
                pool,
                uuid_source,
                &self.spec.role,
                DISK_RESOURCE_NAME,
                self.spec.principal.as_deref(),
                &self.spec.value,
                existing_id,
                Labels::new(),
            )?,
            VolumeType::Path => {
                return Ok(Outcome::fail("PATH volumes are not persistence-tracked"));
            }
        };

        let Some(reserved) = reserved else {
            return Ok(Outcome::fail(format!(
                "insufficient {:?} volume capacity for {}",
                self.spec.volume_type, self.spec.name
            )));
        };

        let existing_persistence_id = self.existing.as_ref().and_then(|e| e.persistence_id.clone());
        let freshly_created = existing_persistence_id.is_none();
        let persistence_id = existing_persistence_id.unwrap_or_else(|| uuid_source.next_uuid().to_string());

        let source = match self.spec.volume_type {
            VolumeType::Mount => VolumeSource::Mount {
                root: self.spec.container_path.clone(),
            },
            _ => VolumeSource::SandboxPath {
                path: self.spec.container_path.clone(),
            },
        };

        let disk = DiskInfo {
            source_type: match self.spec.volume_type {
                VolumeType::Root => DiskSourceType::Root,
                VolumeType::Mount => DiskSourceType::Mount,
                VolumeType::Path => DiskSourceType::Path,
            },
            persistence: Some(Persistence {
                id: persistence_id.clone(),
                principal: self.spec.principal.clone(),
            }),
            volume: Some(Volume {
                container_path: self.spec.container_path.clone(),
                mode: VolumeMode::Rw,
                source,
            }),
        };

        let resource = reserved.resource.into_inner().with_disk(disk);
        builder.add_resource(self.task_name.as_deref(), resource.clone());

        let mut recommendations = Vec::new();
        if reserved.freshly_reserved {
            recommendations.push(Recommendation::reserve(offer, resource.clone()));
        }
        if freshly_created {
            recommendations.push(Recommendation::create(offer, resource));
        }

        Ok(Outcome::pass(format!(
            "bound {:?} volume {} (persistence_id={persistence_id})",
            self.spec.volume_type, self.spec.name
        ))
        .with_recommendations(recommendations))
    }

    fn name(&self) -> &'static str {
        "VolumeEvaluationStage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Resource, DEFAULT_ROLE};
    use crate::uuid_gen::SequentialUuidSource;
    use crate::value::Value;

    fn builder() -> PodInfoBuilder {
        PodInfoBuilder::new(
            crate::spec::PodInstance { name: "pod".into(), tasks: vec![], placement_rule: std::sync::Arc::new(crate::spec::AlwaysAcceptable) },
            "svc",
            uuid::Uuid::from_u128(1),
        )
    }

    #[test]
    fn root_volume_reserves_and_creates_fresh() {
        let offer = Offer {
            id: "offer-1".into(),
            agent_id: "agent-1".into(),
            resources: vec![Resource::new(DISK_RESOURCE_NAME, DEFAULT_ROLE, Value::Scalar(10.0))],
        };
        let mut pool = ResourcePool::from_offer(&offer);
        let mut builder = builder();
        let uuid_source = SequentialUuidSource::new();

        let stage = VolumeEvaluationStage {
            task_name: Some("task-a".into()),
            spec: VolumeSpec {
                name: "data".into(),
                value: Value::Scalar(5.0),
                role: DEFAULT_ROLE.into(),
                principal: None,
                volume_type: VolumeType::Root,
                container_path: "/data".into(),
            },
            existing: None,
        };

        let outcome = stage.evaluate(&mut pool, &mut builder, &uuid_source, &offer).unwrap();
        assert!(outcome.passing);
        assert_eq!(outcome.recommendations.len(), 2);
        assert!(matches!(outcome.recommendations[0], Recommendation::Reserve { .. }));
        assert!(matches!(outcome.recommendations[1], Recommendation::Create { .. }));
    }

    #[test]
    fn root_volume_relaunch_reuses_persistence_id_and_emits_nothing() {
        let offer = Offer {
            id: "offer-1".into(),
            agent_id: "agent-1".into(),
            resources: vec![Resource::new(DISK_RESOURCE_NAME, "role-a", Value::Scalar(5.0)).reserve(
                "role-a",
                None,
                Labels::new().with("resource_id", "r1"),
            )],
        };
        let mut pool = ResourcePool::from_offer(&offer);
        let mut builder = builder();
        let uuid_source = SequentialUuidSource::new();

        let stage = VolumeEvaluationStage {
            task_name: Some("task-a".into()),
            spec: VolumeSpec {
                name: "data".into(),
                value: Value::Scalar(5.0),
                role: "role-a".into(),
                principal: None,
                volume_type: VolumeType::Root,
                container_path: "/data".into(),
            },
            existing: Some(ExistingReservation {
                resource_id: "r1".into(),
                persistence_id: Some("p1".into()),
                port: None,
            }),
        };

        let outcome = stage.evaluate(&mut pool, &mut builder, &uuid_source, &offer).unwrap();
        assert!(outcome.passing);
        assert!(outcome.recommendations.is_empty());
    }
}
