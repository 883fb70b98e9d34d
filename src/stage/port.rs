use super::reserve::reserve_or_bind_divisible;
use super::{EvaluationStage, ExistingReservation, Outcome};
use crate::error::Error;
use crate::pod_info_builder::PodInfoBuilder;
use crate::proto::{Labels, Offer, LABEL_DYNAMIC_PORT};
use crate::recommendation::Recommendation;
use crate::resource_pool::ResourcePool;
use crate::spec::PortSpec;
use crate::uuid_gen::UuidSource;
use crate::value::{Interval, RangeSet, Value};

/// The resource name every port reservation is carried under, matching
/// the protocol convention of a single `ports` ranges resource per role.
pub const PORTS_RESOURCE_NAME: &str = "ports";

/// Static (`port > 0`) or dynamic (`port == 0`) port allocation. Dynamic
/// ports pick the lowest free port in the role's ranges pool, label the
/// reservation `dynamic_port:<specName>`, and publish the concrete port
/// both into the task's environment (`PORT_<NAME>`) and the pod info
/// builder's side channel so sibling stages (named VIPs) can read it
/// back.
pub struct PortEvaluationStage {
    pub task_name: Option<String>,
    pub spec: PortSpec,
    pub existing: Option<ExistingReservation>,
}

impl PortEvaluationStage {
    fn desired_port(&self) -> Option<u32> {
        if self.spec.is_dynamic() {
            self.existing.as_ref().and_then(|e| e.port)
        } else {
            Some(self.spec.port)
        }
    }

    fn pick_dynamic_port(&self, pool: &ResourcePool) -> Option<u32> {
        let available = pool.reservable_total(&self.spec.role, PORTS_RESOURCE_NAME)?;
        available
            .as_ranges()?
            .lowest()
            .and_then(|p| u32::try_from(p).ok())
    }
}

impl EvaluationStage for PortEvaluationStage {
    fn evaluate(
        &self,
        pool: &mut ResourcePool,
        builder: &mut PodInfoBuilder,
        uuid_source: &dyn UuidSource,
        offer: &Offer,
    ) -> Result<Outcome, Error> {
        let existing_id = self.existing.as_ref().map(|e| e.resource_id.as_str());

        let port = if self.spec.is_dynamic() && existing_id.is_none() {
            match self.pick_dynamic_port(pool) {
                Some(p) => p,
                None => return Ok(Outcome::fail(format!("no free port for {}", self.spec.name))),
            }
        } else {
            match self.desired_port() {
                Some(p) => p,
                None => {
                    return Ok(Outcome::fail(format!(
                        "existing dynamic port {} missing its bound port number",
                        self.spec.name
                    )))
                }
            }
        };

        let desired = Value::Ranges(RangeSet::new(vec![Interval::single(u64::from(port))]));
        let extra_labels = if self.spec.is_dynamic() {
            Labels::new().with(LABEL_DYNAMIC_PORT, self.spec.name.clone())
        } else {
            Labels::new()
        };

        let reserved = reserve_or_bind_divisible(
            pool,
            uuid_source,
            &self.spec.role,
            PORTS_RESOURCE_NAME,
            self.spec.principal.as_deref(),
            &desired,
            existing_id,
            extra_labels,
        )?;

        let Some(reserved) = reserved else {
            return Ok(Outcome::fail(format!(
                "port {port} unavailable for {}",
                self.spec.name
            )));
        };

        builder.add_resource(self.task_name.as_deref(), reserved.resource.clone().into_inner());
        builder.set_allocated_port(self.spec.name.clone(), port);
        if let Some(task_name) = &self.task_name {
            builder.set_environment(
                task_name,
                format!("PORT_{}", self.spec.name.to_uppercase()),
                port.to_string(),
            );
        }

        let recommendations = if reserved.freshly_reserved {
            vec![Recommendation::reserve(offer, reserved.resource.into_inner())]
        } else {
            Vec::new()
        };

        Ok(Outcome::pass(format!("bound port {} to {port}", self.spec.name))
            .with_recommendations(recommendations))
    }

    fn name(&self) -> &'static str {
        "PortEvaluationStage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Resource, DEFAULT_ROLE};
    use crate::uuid_gen::SequentialUuidSource;

    fn offer_with_ports() -> Offer {
        Offer {
            id: "offer-1".into(),
            agent_id: "agent-1".into(),
            resources: vec![Resource::new(
                PORTS_RESOURCE_NAME,
                DEFAULT_ROLE,
                Value::Ranges(RangeSet::new(vec![Interval::new(31000, 31100)])),
            )],
        }
    }

    #[test]
    fn dynamic_port_picks_lowest_and_labels_it() {
        let offer = offer_with_ports();
        let mut pool = ResourcePool::from_offer(&offer);
        let mut builder = crate::pod_info_builder::PodInfoBuilder::new(
            crate::spec::PodInstance { name: "pod".into(), tasks: vec![], placement_rule: std::sync::Arc::new(crate::spec::AlwaysAcceptable) },
            "svc",
            uuid::Uuid::from_u128(1),
        );
        let uuid_source = SequentialUuidSource::new();

        let stage = PortEvaluationStage {
            task_name: Some("task-a".into()),
            spec: PortSpec {
                name: "http".into(),
                role: DEFAULT_ROLE.into(),
                principal: None,
                port: 0,
            },
            existing: None,
        };

        let outcome = stage.evaluate(&mut pool, &mut builder, &uuid_source, &offer).unwrap();
        assert!(outcome.passing);
        assert_eq!(builder.allocated_port("http"), Some(31000));
    }

    #[test]
    fn static_port_reserves_exact_number() {
        let offer = offer_with_ports();
        let mut pool = ResourcePool::from_offer(&offer);
        let mut builder = crate::pod_info_builder::PodInfoBuilder::new(
            crate::spec::PodInstance { name: "pod".into(), tasks: vec![], placement_rule: std::sync::Arc::new(crate::spec::AlwaysAcceptable) },
            "svc",
            uuid::Uuid::from_u128(1),
        );
        let uuid_source = SequentialUuidSource::new();

        let stage = PortEvaluationStage {
            task_name: Some("task-a".into()),
            spec: PortSpec {
                name: "http".into(),
                role: DEFAULT_ROLE.into(),
                principal: None,
                port: 31050,
            },
            existing: None,
        };

        let outcome = stage.evaluate(&mut pool, &mut builder, &uuid_source, &offer).unwrap();
        assert!(outcome.passing);
        assert_eq!(builder.allocated_port("http"), Some(31050));
    }
}
