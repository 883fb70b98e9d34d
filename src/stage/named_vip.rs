use super::reserve::reserve_or_bind_divisible;
use super::port::PORTS_RESOURCE_NAME;
use super::{EvaluationStage, ExistingReservation, Outcome};
use crate::error::Error;
use crate::pod_info_builder::PodInfoBuilder;
use crate::proto::{Labels, Offer, LABEL_DYNAMIC_PORT, LABEL_VIP_KEY, LABEL_VIP_VALUE};
use crate::recommendation::Recommendation;
use crate::resource_pool::ResourcePool;
use crate::spec::NamedVipSpec;
use crate::uuid_gen::UuidSource;
use crate::value::{Interval, RangeSet, Value};

/// Like [`super::PortEvaluationStage`] plus two extra reservation labels
/// (`vip_key`/`vip_value`) carrying the VIP's name and port, per §4.3.
pub struct NamedVipEvaluationStage {
    pub task_name: Option<String>,
    pub spec: NamedVipSpec,
    pub existing: Option<ExistingReservation>,
}

impl EvaluationStage for NamedVipEvaluationStage {
    fn evaluate(
        &self,
        pool: &mut ResourcePool,
        builder: &mut PodInfoBuilder,
        uuid_source: &dyn UuidSource,
        offer: &Offer,
    ) -> Result<Outcome, Error> {
        let port_spec = &self.spec.port_spec;
        let existing_id = self.existing.as_ref().map(|e| e.resource_id.as_str());

        let port = if port_spec.is_dynamic() && existing_id.is_none() {
            let Some(available) = pool.reservable_total(&port_spec.role, PORTS_RESOURCE_NAME) else {
                return Ok(Outcome::fail(format!("no ports pool for {}", port_spec.name)));
            };
            let Some(lowest) = available
                .as_ranges()
                .and_then(crate::value::RangeSet::lowest)
                .and_then(|p| u32::try_from(p).ok())
            else {
                return Ok(Outcome::fail(format!("no free port for {}", port_spec.name)));
            };
            lowest
        } else {
            match (port_spec.is_dynamic(), self.existing.as_ref().and_then(|e| e.port)) {
                (true, Some(bound)) => bound,
                (false, _) => port_spec.port,
                (true, None) => {
                    return Ok(Outcome::fail(format!(
                        "existing dynamic VIP port {} missing its bound port number",
                        port_spec.name
                    )))
                }
            }
        };

        let desired = Value::Ranges(RangeSet::new(vec![Interval::single(u64::from(port))]));
        let mut extra_labels = Labels::new()
            .with(LABEL_VIP_KEY, self.spec.vip_name.clone())
            .with(LABEL_VIP_VALUE, self.spec.vip_port.to_string());
        if port_spec.is_dynamic() {
            extra_labels = extra_labels.with(LABEL_DYNAMIC_PORT, port_spec.name.clone());
        }

        let reserved = reserve_or_bind_divisible(
            pool,
            uuid_source,
            &port_spec.role,
            PORTS_RESOURCE_NAME,
            port_spec.principal.as_deref(),
            &desired,
            existing_id,
            extra_labels,
        )?;

        let Some(reserved) = reserved else {
            return Ok(Outcome::fail(format!(
                "port {port} unavailable for VIP {}",
                self.spec.vip_name
            )));
        };

        builder.add_resource(self.task_name.as_deref(), reserved.resource.clone().into_inner());
        builder.set_allocated_port(port_spec.name.clone(), port);
        if let Some(task_name) = &self.task_name {
            builder.set_environment(
                task_name,
                format!("PORT_{}", port_spec.name.to_uppercase()),
                port.to_string(),
            );
        }

        let recommendations = if reserved.freshly_reserved {
            vec![Recommendation::reserve(offer, reserved.resource.into_inner())]
        } else {
            Vec::new()
        };

        Ok(Outcome::pass(format!(
            "bound VIP {} ({}) to port {port}",
            self.spec.vip_name, port_spec.name
        ))
        .with_recommendations(recommendations))
    }

    fn name(&self) -> &'static str {
        "NamedVipEvaluationStage"
    }
}
