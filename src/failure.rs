//! Failure & recovery classification helpers (§4.5, §9): deciding whether
//! a pod should be treated as new, existing, or permanently failed.

use std::collections::BTreeMap;

use crate::proto::TaskInfo;
use crate::spec::RecoveryType;

/// The three pod states the orchestrator's pipeline construction branches
/// on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PodClassification {
    /// No persisted task in the pod carries a non-empty resource id.
    New,
    /// At least one persisted task carries a resource id.
    Existing,
    /// Explicitly marked for permanent recovery, or flagged failed in the
    /// state store; treated identically to `New` — the state-store-level
    /// cleanup of the old reservations is an external recovery path's job.
    PermanentlyFailed,
}

/// Classifies a pod given its already-fetched persisted tasks and
/// permanent-failure flag. Does not itself talk to the state store — the
/// orchestrator fetches first, then classifies, keeping this function
/// pure and easy to test.
pub fn classify(
    recovery_type: RecoveryType,
    is_permanently_failed: bool,
    persisted_tasks: &BTreeMap<String, TaskInfo>,
) -> PodClassification {
    if recovery_type == RecoveryType::Permanent || is_permanently_failed {
        return PodClassification::PermanentlyFailed;
    }

    let has_any_resource_id = persisted_tasks
        .values()
        .any(|task| !task.resource_ids().is_empty());

    if has_any_resource_id {
        PodClassification::Existing
    } else {
        PodClassification::New
    }
}
