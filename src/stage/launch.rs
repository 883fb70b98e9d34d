use super::{EvaluationStage, Outcome};
use crate::error::Error;
use crate::pod_info_builder::PodInfoBuilder;
use crate::proto::Offer;
use crate::recommendation::Recommendation;
use crate::resource_pool::ResourcePool;
use crate::uuid_gen::UuidSource;

/// Finalizes a task's accumulated resources into a `TaskInfo` and, unless
/// `should_launch` is false, emits a LAUNCH. Always last per task (§4.3) —
/// every preceding stage for that task has already populated the builder.
pub struct LaunchEvaluationStage {
    pub task_name: String,
    pub command: Option<String>,
    pub should_launch: bool,
}

impl EvaluationStage for LaunchEvaluationStage {
    fn evaluate(
        &self,
        _pool: &mut ResourcePool,
        builder: &mut PodInfoBuilder,
        _uuid_source: &dyn UuidSource,
        offer: &Offer,
    ) -> Result<Outcome, Error> {
        let task = builder.build_task(&self.task_name, self.command.clone());

        if !self.should_launch {
            return Ok(Outcome::pass(format!(
                "task {} prepared, not launched (shouldLaunch=false)",
                self.task_name
            )));
        }

        Ok(Outcome::pass(format!("launching task {}", self.task_name))
            .with_recommendations(vec![Recommendation::launch(offer, task)]))
    }

    fn name(&self) -> &'static str {
        "LaunchEvaluationStage"
    }
}
