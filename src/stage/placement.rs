use std::sync::Arc;

use tracing::debug;

use super::{EvaluationStage, Outcome};
use crate::error::Error;
use crate::pod_info_builder::PodInfoBuilder;
use crate::proto::Offer;
use crate::resource_pool::ResourcePool;
use crate::spec::{PlacementRule, TaskSpec};
use crate::uuid_gen::UuidSource;

/// Evaluates a placement predicate over `(offer, allTasksInService)`;
/// fails the whole offer if the predicate rejects it. Carries no pool or
/// builder mutation — a pure gate, always run first in the pipeline.
pub struct PlacementRuleStage {
    rule: Arc<dyn PlacementRule>,
    all_tasks: Vec<TaskSpec>,
}

impl PlacementRuleStage {
    pub fn new(rule: Arc<dyn PlacementRule>, all_tasks: Vec<TaskSpec>) -> Self {
        PlacementRuleStage { rule, all_tasks }
    }
}

impl EvaluationStage for PlacementRuleStage {
    fn evaluate(
        &self,
        _pool: &mut ResourcePool,
        _builder: &mut PodInfoBuilder,
        _uuid_source: &dyn UuidSource,
        offer: &Offer,
    ) -> Result<Outcome, Error> {
        if self.rule.is_acceptable(offer, &self.all_tasks) {
            Ok(Outcome::pass(format!("{} accepted offer", self.rule.describe())))
        } else {
            debug!(offer_id = %offer.id, "offer rejected by placement rule");
            Ok(Outcome::fail(format!("{} rejected offer", self.rule.describe())))
        }
    }

    fn name(&self) -> &'static str {
        "PlacementRuleStage"
    }
}
