//! Evaluation stages: the per-resource-kind units the orchestrator strings
//! together into a pipeline. Replaces the deep `VolumeEvaluationStage
//! extends ResourceEvaluationStage`-style inheritance the source used with
//! one flat capability (`EvaluationStage::evaluate`) and a tagged variant
//! struct per kind; shared behavior lives in free functions in
//! [`reserve`] rather than a base class.

mod launch;
mod named_vip;
mod placement;
mod port;
pub mod reserve;
mod resource_stage;
mod unreserve;
mod volume;

pub use launch::LaunchEvaluationStage;
pub use named_vip::NamedVipEvaluationStage;
pub use placement::PlacementRuleStage;
pub use port::PortEvaluationStage;
pub use resource_stage::ResourceEvaluationStage;
pub use unreserve::UnreserveEvaluationStage;
pub use volume::VolumeEvaluationStage;

use crate::error::Error;
use crate::pod_info_builder::PodInfoBuilder;
use crate::proto::Offer;
use crate::recommendation::Recommendation;
use crate::resource_pool::ResourcePool;
use crate::uuid_gen::UuidSource;

/// The result of running one stage: whether it passed, a one-line reason
/// (always present, win or lose, so the orchestrator's per-offer log
/// carries a full reason set), any nested outcomes, and any
/// recommendations it produced.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    pub passing: bool,
    pub reason: String,
    pub children: Vec<Outcome>,
    pub recommendations: Vec<Recommendation>,
}

impl Outcome {
    pub fn pass(reason: impl Into<String>) -> Self {
        Outcome {
            passing: true,
            reason: reason.into(),
            children: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Outcome {
            passing: false,
            reason: reason.into(),
            children: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn with_recommendations(mut self, recommendations: Vec<Recommendation>) -> Self {
        self.recommendations = recommendations;
        self
    }

    pub fn with_children(mut self, children: Vec<Outcome>) -> Self {
        self.passing = self.passing && children.iter().all(|c| c.passing);
        self.children = children;
        self
    }
}

/// Carries every seed an existing-pod stage needs to rebind to the exact
/// reservation a persisted `TaskInfo` already referenced, rather than
/// minting a fresh one. `None` at the call site means "new pod, reserve
/// from scratch".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExistingReservation {
    pub resource_id: String,
    pub persistence_id: Option<String>,
    /// The concrete port number already bound, for a dynamic port being
    /// rebound on relaunch.
    pub port: Option<u32>,
}

/// One unit of the evaluation pipeline. `evaluate` may mutate `pool` and
/// `builder` in place; a `Result::Err` only ever carries a fatal error
/// (`ValueKindMismatch`) — every other failure to satisfy a requirement is
/// expressed as a non-passing [`Outcome`], never an `Err`.
pub trait EvaluationStage {
    fn evaluate(
        &self,
        pool: &mut ResourcePool,
        builder: &mut PodInfoBuilder,
        uuid_source: &dyn UuidSource,
        offer: &Offer,
    ) -> Result<Outcome, Error>;

    fn name(&self) -> &'static str;
}
