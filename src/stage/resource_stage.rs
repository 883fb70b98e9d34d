use super::reserve::reserve_or_bind_divisible;
use super::{EvaluationStage, ExistingReservation, Outcome};
use crate::error::Error;
use crate::pod_info_builder::PodInfoBuilder;
use crate::proto::{Labels, Offer};
use crate::recommendation::Recommendation;
use crate::resource_pool::ResourcePool;
use crate::spec::ResourceSpec;
use crate::uuid_gen::UuidSource;

/// CPU/mem-style scalar (or ranges/set) resources: reserve fresh or
/// rebind an existing `resource_id`, then hand the result to the pod info
/// builder.
pub struct ResourceEvaluationStage {
    pub task_name: Option<String>,
    pub spec: ResourceSpec,
    pub existing: Option<ExistingReservation>,
}

impl EvaluationStage for ResourceEvaluationStage {
    fn evaluate(
        &self,
        pool: &mut ResourcePool,
        builder: &mut PodInfoBuilder,
        uuid_source: &dyn UuidSource,
        offer: &Offer,
    ) -> Result<Outcome, Error> {
        let existing_id = self.existing.as_ref().map(|e| e.resource_id.as_str());
        let reserved = reserve_or_bind_divisible(
            pool,
            uuid_source,
            &self.spec.role,
            &self.spec.name,
            self.spec.principal.as_deref(),
            &self.spec.value,
            existing_id,
            Labels::new(),
        )?;

        let Some(reserved) = reserved else {
            return Ok(Outcome::fail(format!(
                "insufficient {} in role {}",
                self.spec.name, self.spec.role
            )));
        };

        builder.add_resource(self.task_name.as_deref(), reserved.resource.clone().into_inner());

        let recommendations = if reserved.freshly_reserved {
            vec![Recommendation::reserve(offer, reserved.resource.into_inner())]
        } else {
            Vec::new()
        };

        Ok(Outcome::pass(format!(
            "reserved {} (resource_id={})",
            self.spec.name, reserved.resource_id
        ))
        .with_recommendations(recommendations))
    }

    fn name(&self) -> &'static str {
        "ResourceEvaluationStage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::Offer as ProtoOffer;
    use crate::resource::{Resource, DEFAULT_ROLE};
    use crate::resource_pool::ResourcePool;
    use crate::uuid_gen::SequentialUuidSource;
    use crate::value::Value;

    fn offer() -> ProtoOffer {
        ProtoOffer {
            id: "offer-1".into(),
            agent_id: "agent-1".into(),
            resources: vec![Resource::new("cpus", DEFAULT_ROLE, Value::Scalar(2.0))],
        }
    }

    #[test]
    fn new_reservation_emits_reserve_with_fresh_id() {
        let offer = offer();
        let mut pool = ResourcePool::from_offer(&offer);
        let mut builder = crate::pod_info_builder::PodInfoBuilder::new(
            crate::spec::PodInstance { name: "pod".into(), tasks: vec![], placement_rule: std::sync::Arc::new(crate::spec::AlwaysAcceptable) },
            "svc",
            uuid::Uuid::from_u128(1),
        );
        let uuid_source = SequentialUuidSource::new();

        let stage = ResourceEvaluationStage {
            task_name: Some("task-a".into()),
            spec: ResourceSpec {
                name: "cpus".into(),
                value: Value::Scalar(0.5),
                role: DEFAULT_ROLE.into(),
                principal: None,
            },
            existing: None,
        };

        let outcome = stage.evaluate(&mut pool, &mut builder, &uuid_source, &offer).unwrap();
        assert!(outcome.passing);
        assert_eq!(outcome.recommendations.len(), 1);
        assert!(matches!(
            &outcome.recommendations[0],
            Recommendation::Reserve { .. }
        ));
    }

    #[test]
    fn insufficient_resource_fails_without_mutating_recommendation() {
        let offer = offer();
        let mut pool = ResourcePool::from_offer(&offer);
        let mut builder = crate::pod_info_builder::PodInfoBuilder::new(
            crate::spec::PodInstance { name: "pod".into(), tasks: vec![], placement_rule: std::sync::Arc::new(crate::spec::AlwaysAcceptable) },
            "svc",
            uuid::Uuid::from_u128(1),
        );
        let uuid_source = SequentialUuidSource::new();

        let stage = ResourceEvaluationStage {
            task_name: Some("task-a".into()),
            spec: ResourceSpec {
                name: "cpus".into(),
                value: Value::Scalar(20.0),
                role: DEFAULT_ROLE.into(),
                principal: None,
            },
            existing: None,
        };

        let outcome = stage.evaluate(&mut pool, &mut builder, &uuid_source, &offer).unwrap();
        assert!(!outcome.passing);
        assert!(outcome.recommendations.is_empty());
    }
}
