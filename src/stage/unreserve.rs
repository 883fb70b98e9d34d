use super::{EvaluationStage, Outcome};
use crate::error::Error;
use crate::pod_info_builder::PodInfoBuilder;
use crate::proto::Offer;
use crate::recommendation::Recommendation;
use crate::resource::Resource;
use crate::resource_pool::ResourcePool;
use crate::uuid_gen::UuidSource;

/// Emits an UNRESERVE for one orphaned resource (§4.2), with a DESTROY
/// emitted first when the resource is a persistent volume.
pub struct UnreserveEvaluationStage {
    pub resource: Resource,
}

impl EvaluationStage for UnreserveEvaluationStage {
    fn evaluate(
        &self,
        _pool: &mut ResourcePool,
        _builder: &mut PodInfoBuilder,
        _uuid_source: &dyn UuidSource,
        offer: &Offer,
    ) -> Result<Outcome, Error> {
        let mut recommendations = Vec::new();
        if self.resource.disk.as_ref().and_then(|d| d.persistence.as_ref()).is_some() {
            recommendations.push(Recommendation::destroy(offer, self.resource.clone()));
        }
        recommendations.push(Recommendation::unreserve(offer, self.resource.clone()));

        Ok(Outcome::pass(format!("unreserving orphaned resource {}", self.resource.name))
            .with_recommendations(recommendations))
    }

    fn name(&self) -> &'static str {
        "UnreserveEvaluationStage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pod_info_builder::PodInfoBuilder;
    use crate::proto::{DiskInfo, DiskSourceType, Persistence};
    use crate::resource::DEFAULT_ROLE;
    use crate::spec::{AlwaysAcceptable, PodInstance};
    use crate::uuid_gen::SequentialUuidSource;
    use crate::value::Value;
    use std::sync::Arc;

    fn offer() -> Offer {
        Offer {
            id: "offer-1".into(),
            agent_id: "agent-1".into(),
            resources: vec![],
        }
    }

    fn builder() -> PodInfoBuilder {
        PodInfoBuilder::new(
            PodInstance {
                name: "pod".into(),
                tasks: vec![],
                placement_rule: Arc::new(AlwaysAcceptable),
            },
            "svc",
            uuid::Uuid::from_u128(1),
        )
    }

    #[test]
    fn plain_resource_only_unreserves() {
        let stage = UnreserveEvaluationStage {
            resource: Resource::new("mem", DEFAULT_ROLE, Value::Scalar(128.0)),
        };
        let mut pool = ResourcePool::default();
        let mut builder = builder();
        let uuid_source = SequentialUuidSource::new();

        let outcome = stage.evaluate(&mut pool, &mut builder, &uuid_source, &offer()).unwrap();

        assert_eq!(outcome.recommendations.len(), 1);
        assert!(matches!(outcome.recommendations[0], Recommendation::Unreserve { .. }));
    }

    #[test]
    fn persistent_volume_destroys_before_unreserving() {
        let resource = Resource::new("disk", DEFAULT_ROLE, Value::Scalar(512.0)).with_disk(DiskInfo {
            source_type: DiskSourceType::Path,
            persistence: Some(Persistence {
                id: "persist-1".into(),
                principal: None,
            }),
            volume: None,
        });
        let stage = UnreserveEvaluationStage { resource };
        let mut pool = ResourcePool::default();
        let mut builder = builder();
        let uuid_source = SequentialUuidSource::new();

        let outcome = stage.evaluate(&mut pool, &mut builder, &uuid_source, &offer()).unwrap();

        assert_eq!(outcome.recommendations.len(), 2);
        assert!(matches!(outcome.recommendations[0], Recommendation::Destroy { .. }));
        assert!(matches!(outcome.recommendations[1], Recommendation::Unreserve { .. }));
    }
}
