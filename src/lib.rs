//! Offer evaluation core for a two-level resource-offer cluster scheduler.
//!
//! Given a pod instance requirement and a list of resource offers from a
//! master, [`offer_evaluator::OfferEvaluator::evaluate`] produces the
//! ordered sequence of RESERVE/CREATE/UNRESERVE/LAUNCH recommendations
//! that, applied by the caller's driver, reliably places that pod on one
//! agent. The transport to the master, the persistent state store, and the
//! plan manager that decides *which* pod to place next are all external
//! collaborators consumed through traits (see [`state_store`]); this crate
//! only solves the per-pod bin-packing problem.

pub mod config;
pub mod error;
pub mod failure;
pub mod offer_evaluator;
pub mod pod_info_builder;
pub mod proto;
pub mod recommendation;
pub mod resource;
pub mod resource_mapper;
pub mod resource_pool;
pub mod spec;
pub mod stage;
pub mod state_store;
pub mod uuid_gen;
pub mod value;

pub use crate::config::SchedulerConfiguration;
pub use crate::error::Error;
pub use crate::offer_evaluator::OfferEvaluator;
pub use crate::recommendation::Recommendation;
pub use crate::spec::PodInstanceRequirement;
