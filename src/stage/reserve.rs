//! Shared "reserve if new, bind if existing" behavior (§9), factored out
//! of the per-kind stages so `ResourceEvaluationStage` and the ROOT/MOUNT
//! branches of `VolumeEvaluationStage` consume it identically instead of
//! inheriting it from a common base type.

use crate::error::Error;
use crate::proto::{Labels, LABEL_RESOURCE_ID};
use crate::resource::MesosResource;
use crate::resource_pool::ResourcePool;
use crate::uuid_gen::UuidSource;
use crate::value::Value;

/// The outcome of a reserve-or-bind attempt: the consumed resource
/// (already carrying its `resource_id` label, new or carried-forward) and
/// whether a fresh reservation was made (callers use this to decide
/// whether to emit a RESERVE recommendation).
pub struct Reserved {
    pub resource: MesosResource,
    pub freshly_reserved: bool,
    pub resource_id: String,
}

/// Divisible resources (cpus, mem, ranges, ROOT disk quota): if
/// `existing_resource_id` is `Some`, rebind via `consume_expects`; else
/// reserve fresh from the role's merged pool and mint a new
/// `resource_id`.
pub fn reserve_or_bind_divisible(
    pool: &mut ResourcePool,
    uuid_source: &dyn UuidSource,
    role: &str,
    name: &str,
    principal: Option<&str>,
    desired: &Value,
    existing_resource_id: Option<&str>,
    extra_labels: Labels,
) -> Result<Option<Reserved>, Error> {
    if let Some(id) = existing_resource_id {
        let consumed = pool.consume_expects(id, desired)?;
        return Ok(consumed.map(|resource| Reserved {
            resource,
            freshly_reserved: false,
            resource_id: id.to_string(),
        }));
    }

    let Some(consumed) = pool.consume_divisible(role, name, desired)? else {
        return Ok(None);
    };
    let resource_id = uuid_source.next_uuid().to_string();
    let mut labels = extra_labels;
    labels = labels.with(LABEL_RESOURCE_ID, resource_id.clone());
    let reserved = consumed
        .into_inner()
        .reserve(role.to_string(), principal.map(str::to_string), labels);
    Ok(Some(Reserved {
        resource: MesosResource::from(reserved),
        freshly_reserved: true,
        resource_id,
    }))
}

/// Atomic resources (MOUNT disks): same contract, but consumption is
/// whole-or-nothing via `consume_atomic`, and rebinding an existing
/// reservation still goes through `consume_expects` since the previously
/// reserved disk is addressed by its `resource_id`, not by scanning the
/// unreserved pool again.
pub fn reserve_or_bind_atomic(
    pool: &mut ResourcePool,
    uuid_source: &dyn UuidSource,
    role: &str,
    name: &str,
    principal: Option<&str>,
    desired: &Value,
    existing_resource_id: Option<&str>,
    extra_labels: Labels,
) -> Result<Option<Reserved>, Error> {
    if let Some(id) = existing_resource_id {
        let consumed = pool.consume_expects(id, desired)?;
        return Ok(consumed.map(|resource| Reserved {
            resource,
            freshly_reserved: false,
            resource_id: id.to_string(),
        }));
    }

    let Some(consumed) = pool.consume_atomic(name, desired)? else {
        return Ok(None);
    };
    let resource_id = uuid_source.next_uuid().to_string();
    let mut labels = extra_labels;
    labels = labels.with(LABEL_RESOURCE_ID, resource_id.clone());
    let reserved = consumed
        .into_inner()
        .reserve(role.to_string(), principal.map(str::to_string), labels);
    Ok(Some(Reserved {
        resource: MesosResource::from(reserved),
        freshly_reserved: true,
        resource_id,
    }))
}
