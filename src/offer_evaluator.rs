//! The orchestrator: classifies a pod, builds its evaluation pipeline,
//! and runs that pipeline against offers until one satisfies every stage.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Error;
use crate::failure::{classify, PodClassification};
use crate::pod_info_builder::PodInfoBuilder;
use crate::proto::{Offer, TaskInfo};
use crate::recommendation::Recommendation;
use crate::resource_mapper::{map_resources, MatchedKind};
use crate::resource_pool::ResourcePool;
use crate::spec::{PodInstanceRequirement, TaskSpec};
use crate::stage::{
    EvaluationStage, LaunchEvaluationStage, NamedVipEvaluationStage, PlacementRuleStage,
    PortEvaluationStage, ResourceEvaluationStage, UnreserveEvaluationStage, VolumeEvaluationStage,
};
use crate::state_store::StateStore;
use crate::uuid_gen::UuidSource;

pub struct OfferEvaluator {
    state_store: Arc<dyn StateStore>,
    uuid_source: Arc<dyn UuidSource>,
    config: crate::config::SchedulerConfiguration,
}

impl OfferEvaluator {
    pub fn new(
        state_store: Arc<dyn StateStore>,
        uuid_source: Arc<dyn UuidSource>,
        config: crate::config::SchedulerConfiguration,
    ) -> Self {
        OfferEvaluator {
            state_store,
            uuid_source,
            config,
        }
    }

    /// The single public entry point (§4.5): evaluate `requirement`
    /// against `offers` in order, returning the first offer's full
    /// recommendation set, or an empty list if none satisfy every stage.
    pub async fn evaluate(
        &self,
        requirement: &PodInstanceRequirement,
        offers: &[Offer],
    ) -> Result<Vec<Recommendation>, Error> {
        requirement.validate()?;

        let pod_instance = &requirement.pod_instance;
        let persisted_tasks = self.state_store.fetch_tasks(&pod_instance.name).await?;
        let is_permanently_failed = self.state_store.is_permanently_failed(&pod_instance.name).await?;

        let classification = classify(requirement.recovery_type, is_permanently_failed, &persisted_tasks);
        info!(
            pod = %pod_instance.name,
            classification = ?classification,
            offer_count = offers.len(),
            "evaluating pod against offers"
        );

        let existing_executor_id = persisted_tasks
            .values()
            .find_map(|task| task.executor_id.clone());

        // The pipeline shape depends only on the requirement/classification,
        // not on any one offer, so it is built once and reused; `None`
        // means an existing pod references a `TaskInfo` the state store no
        // longer has, which is handled exactly like "no offer sufficed".
        let Some(stages) = self.build_pipeline(requirement, classification, &persisted_tasks)? else {
            debug!(pod = %pod_instance.name, "persisted task missing, treating pod as unplaceable this cycle");
            return Ok(Vec::new());
        };

        for offer in offers {
            let mut pool = ResourcePool::from_offer(offer);
            let mut builder = PodInfoBuilder::new(
                pod_instance.clone(),
                self.config.service_name.clone(),
                self.config.target_config_id,
            );
            if classification == PodClassification::Existing {
                if let Some(executor_id) = &existing_executor_id {
                    builder = builder.with_existing_executor_id(executor_id.clone());
                }
            }

            let mut all_passing = true;
            let mut reasons = Vec::with_capacity(stages.len());
            let mut recommendations = Vec::new();
            for stage in &stages {
                let outcome = stage.evaluate(&mut pool, &mut builder, self.uuid_source.as_ref(), offer)?;
                all_passing &= outcome.passing;
                reasons.push((stage.name(), outcome.passing, outcome.reason.clone()));
                recommendations.extend(outcome.recommendations);
            }

            if all_passing {
                info!(offer_id = %offer.id, pod = %pod_instance.name, "offer satisfied all stages");
                return Ok(recommendations);
            }

            debug!(offer_id = %offer.id, pod = %pod_instance.name, ?reasons, "offer insufficient");
        }

        debug!(pod = %pod_instance.name, "no offer satisfied the pod's requirement");
        Ok(Vec::new())
    }

    /// Builds the stage pipeline for `requirement`. Returns `Ok(None)` when
    /// an existing pod references a task the state store no longer has a
    /// `TaskInfo` for (§7 `PersistedTaskMissing`): that is treated the same
    /// as an insufficient offer rather than surfaced to the caller, since
    /// the external recovery path is what reclassifies such a pod.
    fn build_pipeline(
        &self,
        requirement: &PodInstanceRequirement,
        classification: PodClassification,
        persisted_tasks: &BTreeMap<String, TaskInfo>,
    ) -> Result<Option<Vec<Box<dyn EvaluationStage>>>, Error> {
        let pod_instance = &requirement.pod_instance;
        let mut stages: Vec<Box<dyn EvaluationStage>> = vec![Box::new(PlacementRuleStage::new(
            pod_instance.placement_rule.clone(),
            pod_instance.tasks.clone(),
        ))];

        // Existing-pod output ordering (§6): every UNRESERVE for an
        // orphaned resource precedes any RESERVE/CREATE/LAUNCH, so orphans
        // across all of the pod's tasks are mapped and pushed up front.
        if classification == PodClassification::Existing {
            for task in &pod_instance.tasks {
                let Some(persisted) = persisted_tasks.get(&task.name) else {
                    let err = Error::PersistedTaskMissing {
                        task_name: task.name.clone(),
                    };
                    debug!(%err, "treating as offer-insufficient, deferring to recovery path");
                    return Ok(None);
                };
                for orphan in map_resources(task, persisted).orphaned {
                    stages.push(Box::new(UnreserveEvaluationStage { resource: orphan }));
                }
            }
        }

        for task in &pod_instance.tasks {
            let should_launch = requirement.should_launch(&task.name) && task.should_launch;

            match classification {
                PodClassification::New | PodClassification::PermanentlyFailed => {
                    self.push_new_task_stages(&mut stages, task, should_launch);
                }
                PodClassification::Existing => {
                    // Already confirmed present above.
                    let persisted = &persisted_tasks[&task.name];
                    self.push_existing_task_stages(&mut stages, task, persisted, should_launch);
                }
            }
        }

        Ok(Some(stages))
    }

    /// New/permanently-failed pipeline ordering (§4.3): static ports,
    /// dynamic ports, everything else, then volumes, then launch.
    fn push_new_task_stages(&self, stages: &mut Vec<Box<dyn EvaluationStage>>, task: &TaskSpec, should_launch: bool) {
        let task_name = Some(task.name.clone());

        for port in task.resource_set.ports.iter().filter(|p| !p.is_dynamic()) {
            stages.push(Box::new(PortEvaluationStage {
                task_name: task_name.clone(),
                spec: port.clone(),
                existing: None,
            }));
        }
        for vip in task.resource_set.named_vips.iter().filter(|v| !v.port_spec.is_dynamic()) {
            stages.push(Box::new(NamedVipEvaluationStage {
                task_name: task_name.clone(),
                spec: vip.clone(),
                existing: None,
            }));
        }
        for port in task.resource_set.ports.iter().filter(|p| p.is_dynamic()) {
            stages.push(Box::new(PortEvaluationStage {
                task_name: task_name.clone(),
                spec: port.clone(),
                existing: None,
            }));
        }
        for vip in task.resource_set.named_vips.iter().filter(|v| v.port_spec.is_dynamic()) {
            stages.push(Box::new(NamedVipEvaluationStage {
                task_name: task_name.clone(),
                spec: vip.clone(),
                existing: None,
            }));
        }
        for resource in &task.resource_set.resources {
            stages.push(Box::new(ResourceEvaluationStage {
                task_name: task_name.clone(),
                spec: resource.clone(),
                existing: None,
            }));
        }
        for volume in &task.resource_set.volumes {
            stages.push(Box::new(VolumeEvaluationStage {
                task_name: task_name.clone(),
                spec: volume.clone(),
                existing: None,
            }));
        }

        stages.push(Box::new(LaunchEvaluationStage {
            task_name: task.name.clone(),
            command: task.command.clone(),
            should_launch,
        }));
    }

    /// Existing-pod pipeline (§4.2): every matched resource is seeded with
    /// its carried-forward id, same static/dynamic/scalar/volume ordering
    /// as the new path. Orphan UNRESERVEs are pushed separately by
    /// [`Self::build_pipeline`] so they precede every task's reservations
    /// in the emitted recommendation order.
    fn push_existing_task_stages(
        &self,
        stages: &mut Vec<Box<dyn EvaluationStage>>,
        task: &TaskSpec,
        persisted: &TaskInfo,
        should_launch: bool,
    ) {
        let task_name = Some(task.name.clone());
        let mapping = map_resources(task, persisted);

        let existing_for = |spec_name: &str, want: fn(&MatchedKind, &str) -> bool| {
            mapping
                .matched
                .iter()
                .find(|m| want(&m.kind, spec_name))
                .map(|m| m.existing.clone())
        };

        fn is_port(kind: &MatchedKind, name: &str) -> bool {
            matches!(kind, MatchedKind::Port { spec_name } if spec_name == name)
        }
        fn is_resource(kind: &MatchedKind, name: &str) -> bool {
            matches!(kind, MatchedKind::Resource { spec_name } if spec_name == name)
        }
        fn is_volume(kind: &MatchedKind, name: &str) -> bool {
            matches!(kind, MatchedKind::Volume { spec_name } if spec_name == name)
        }

        for port in task.resource_set.ports.iter().filter(|p| !p.is_dynamic()) {
            stages.push(Box::new(PortEvaluationStage {
                task_name: task_name.clone(),
                spec: port.clone(),
                existing: existing_for(&port.name, is_port),
            }));
        }
        for vip in task.resource_set.named_vips.iter().filter(|v| !v.port_spec.is_dynamic()) {
            stages.push(Box::new(NamedVipEvaluationStage {
                task_name: task_name.clone(),
                spec: vip.clone(),
                existing: existing_for(&vip.port_spec.name, is_port),
            }));
        }
        for port in task.resource_set.ports.iter().filter(|p| p.is_dynamic()) {
            stages.push(Box::new(PortEvaluationStage {
                task_name: task_name.clone(),
                spec: port.clone(),
                existing: existing_for(&port.name, is_port),
            }));
        }
        for vip in task.resource_set.named_vips.iter().filter(|v| v.port_spec.is_dynamic()) {
            stages.push(Box::new(NamedVipEvaluationStage {
                task_name: task_name.clone(),
                spec: vip.clone(),
                existing: existing_for(&vip.port_spec.name, is_port),
            }));
        }
        for resource in &task.resource_set.resources {
            stages.push(Box::new(ResourceEvaluationStage {
                task_name: task_name.clone(),
                spec: resource.clone(),
                existing: existing_for(&resource.name, is_resource),
            }));
        }
        for volume in &task.resource_set.volumes {
            stages.push(Box::new(VolumeEvaluationStage {
                task_name: task_name.clone(),
                spec: volume.clone(),
                existing: existing_for(&volume.name, is_volume),
            }));
        }

        stages.push(Box::new(LaunchEvaluationStage {
            task_name: task.name.clone(),
            command: task.command.clone(),
            should_launch,
        }));
    }
}

/// Convenience for constructing a fresh `target_config_id`-stamped
/// configuration when the caller has no prior generation to carry
/// forward.
pub fn fresh_target_config_id(uuid_source: &dyn UuidSource) -> Uuid {
    uuid_source.next_uuid()
}
