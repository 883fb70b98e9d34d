//! A mutable, per-offer view of the resources currently available on one
//! agent, partitioned into the three sub-pools described by the data
//! model: unreserved atomic resources, resources already dynamically
//! reserved under a known `resource_id`, and reservable scalar/range
//! resources merged per role.
//!
//! `consume` never fails loudly — every branch that cannot satisfy a
//! request returns `None` and logs the specific cause (missing name,
//! insufficient quantity, unknown role, unknown reserved id) so that the
//! orchestrator's per-offer structured log carries a real reason.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::Error;
use crate::proto::Offer;
use crate::resource::{MesosResource, Resource, DEFAULT_ROLE};
use crate::value::Value;

#[derive(Debug, Default)]
pub struct ResourcePool {
    unreserved_atomic_pool: BTreeMap<String, Vec<MesosResource>>,
    dynamically_reserved_pool: BTreeMap<String, MesosResource>,
    reservable_merged_pool: BTreeMap<String, BTreeMap<String, Value>>,
}

impl ResourcePool {
    pub fn from_offer(offer: &Offer) -> Self {
        let mut pool = ResourcePool::default();
        pool.update(offer);
        pool
    }

    /// Full reinitialization, equivalent to constructing a new pool from
    /// `offer`.
    pub fn update(&mut self, offer: &Offer) {
        self.unreserved_atomic_pool.clear();
        self.dynamically_reserved_pool.clear();
        self.reservable_merged_pool.clear();

        for resource in &offer.resources {
            let mesos_resource = MesosResource::new(resource.clone());
            if resource.is_atomic() {
                if let Some(resource_id) = resource.effective_resource_id() {
                    self.dynamically_reserved_pool
                        .insert(resource_id.to_string(), mesos_resource);
                } else {
                    self.unreserved_atomic_pool
                        .entry(resource.name.clone())
                        .or_default()
                        .push(mesos_resource);
                }
                continue;
            }

            if let Some(resource_id) = resource.effective_resource_id() {
                self.dynamically_reserved_pool
                    .insert(resource_id.to_string(), mesos_resource);
                continue;
            }

            let role = resource.effective_role().to_string();
            let by_name = self.reservable_merged_pool.entry(role).or_default();
            match by_name.get(&resource.name).cloned() {
                Some(existing) => {
                    if let Ok(merged) = existing.add(&resource.value) {
                        by_name.insert(resource.name.clone(), merged);
                    }
                }
                None => {
                    by_name.insert(resource.name.clone(), resource.value.clone());
                }
            }
        }
    }

    /// *Expects-resource* consumption: the spec already carries a known
    /// `resource_id` from a previous RESERVE/CREATE. Looks the id up in the
    /// dynamically-reserved pool.
    pub fn consume_expects(
        &mut self,
        resource_id: &str,
        desired: &Value,
    ) -> Result<Option<MesosResource>, Error> {
        let Some(existing) = self.dynamically_reserved_pool.get(resource_id).cloned() else {
            debug!(resource_id, "no reserved resource with this id in offer");
            return Ok(None);
        };

        if existing.is_atomic() {
            if existing.value.covers(desired)? {
                self.dynamically_reserved_pool.remove(resource_id);
                return Ok(Some(existing));
            }
            debug!(resource_id, "expected atomic resource insufficient");
            return Ok(None);
        }

        if !existing.value.covers(desired)? {
            debug!(resource_id, "expected resource insufficient");
            return Ok(None);
        }

        let remainder = existing.value.subtract(desired)?;
        if is_zero(&remainder) {
            self.dynamically_reserved_pool.remove(resource_id);
            Ok(Some(existing))
        } else {
            let consumed = existing.with_value(desired.clone());
            let remaining = existing.with_value(remainder);
            self.dynamically_reserved_pool
                .insert(resource_id.to_string(), remaining.into());
            Ok(Some(consumed.into()))
        }
    }

    /// *Atomic reserve*: scan `unreserved_atomic_pool[name]` in offer order,
    /// picking the first item whose value covers `desired`. Remaining items
    /// are left untouched — no partial consumption of an atomic resource is
    /// ever possible.
    ///
    /// Preserves the source behavior noted as an open design question: even
    /// when no item is large enough, the pool entry is rewritten with the
    /// same (unfiltered) list, which is observably a no-op but keeps this
    /// method's side effect shape identical to the one it was ported from.
    pub fn consume_atomic(
        &mut self,
        name: &str,
        desired: &Value,
    ) -> Result<Option<MesosResource>, Error> {
        let Some(candidates) = self.unreserved_atomic_pool.get(name) else {
            debug!(name, "no atomic resources of this name offered");
            return Ok(None);
        };

        let mut remaining = Vec::with_capacity(candidates.len());
        let mut chosen = None;
        for candidate in candidates {
            if chosen.is_none() && candidate.value.covers(desired)? {
                chosen = Some(candidate.clone());
            } else {
                remaining.push(candidate.clone());
            }
        }

        self.unreserved_atomic_pool.insert(name.to_string(), remaining);

        if chosen.is_none() {
            debug!(name, "offered quantity of atomic resource insufficient");
        }
        Ok(chosen)
    }

    /// *Divisible reserve*: subtract `desired` from
    /// `reservable_merged_pool[role][name]` in place and return a fresh,
    /// unreserved resource of exactly `desired`.
    pub fn consume_divisible(
        &mut self,
        role: &str,
        name: &str,
        desired: &Value,
    ) -> Result<Option<MesosResource>, Error> {
        let Some(by_name) = self.reservable_merged_pool.get_mut(role) else {
            debug!(role, "unknown role in offer");
            return Ok(None);
        };
        let Some(available) = by_name.get(name) else {
            debug!(role, name, "no resource of this name in role's pool");
            return Ok(None);
        };

        if !available.covers(desired)? {
            debug!(role, name, "offered quantity insufficient");
            return Ok(None);
        }

        let remainder = available.subtract(desired)?;
        by_name.insert(name.to_string(), remainder);

        Ok(Some(MesosResource::new(Resource::new(
            name,
            role,
            desired.clone(),
        ))))
    }

    /// Release a previously-consumed atomic resource back into the
    /// unreserved pool, with its reservation cleared and role reset to the
    /// default role.
    pub fn release_atomic(&mut self, resource: MesosResource) {
        let name = resource.name.clone();
        let released = resource.0.released();
        self.unreserved_atomic_pool
            .entry(name)
            .or_default()
            .push(released.into());
    }

    pub fn reservable_total(&self, role: &str, name: &str) -> Option<&Value> {
        self.reservable_merged_pool.get(role)?.get(name)
    }

    pub fn atomic_candidates(&self, name: &str) -> usize {
        self.unreserved_atomic_pool.get(name).map_or(0, Vec::len)
    }

    pub fn default_role(&self) -> &'static str {
        DEFAULT_ROLE
    }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Scalar(v) => *v <= f64::EPSILON,
        Value::Ranges(r) => r.is_empty(),
        Value::Set(s) => s.is_empty(),
        Value::Text(t) => t.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{DiskInfo, DiskSourceType};
    use crate::resource::DEFAULT_ROLE;
    use rstest::rstest;

    fn offer_with(resources: Vec<Resource>) -> Offer {
        Offer {
            id: "offer-1".into(),
            agent_id: "agent-1".into(),
            resources,
        }
    }

    #[test]
    fn divisible_consume_subtracts_in_place_and_isolates_roles() {
        let mut pool = ResourcePool::from_offer(&offer_with(vec![
            Resource::new("cpus", DEFAULT_ROLE, Value::Scalar(2.0)),
            Resource::new("cpus", "other-role", Value::Scalar(10.0)),
        ]));

        let consumed = pool
            .consume_divisible(DEFAULT_ROLE, "cpus", &Value::Scalar(0.5))
            .unwrap()
            .expect("should consume");
        assert_eq!(consumed.value, Value::Scalar(0.5));
        assert_eq!(
            pool.reservable_total(DEFAULT_ROLE, "cpus"),
            Some(&Value::Scalar(1.5))
        );
        // role isolation: other-role pool is untouched.
        assert_eq!(
            pool.reservable_total("other-role", "cpus"),
            Some(&Value::Scalar(10.0))
        );
    }

    #[test]
    fn divisible_consume_insufficient_returns_none_and_does_not_mutate() {
        let mut pool = ResourcePool::from_offer(&offer_with(vec![Resource::new(
            "cpus",
            DEFAULT_ROLE,
            Value::Scalar(0.2),
        )]));

        assert!(pool
            .consume_divisible(DEFAULT_ROLE, "cpus", &Value::Scalar(0.5))
            .unwrap()
            .is_none());
        assert_eq!(
            pool.reservable_total(DEFAULT_ROLE, "cpus"),
            Some(&Value::Scalar(0.2))
        );
    }

    #[rstest]
    #[case(vec![50.0, 100.0], 100.0, Some(100.0))]
    #[case(vec![50.0], 100.0, None)]
    #[case(vec![200.0, 50.0], 100.0, Some(200.0))]
    fn atomic_consume_picks_first_fit_and_leaves_rest(
        #[case] disk_sizes: Vec<f64>,
        #[case] desired: f64,
        #[case] expected: Option<f64>,
    ) {
        let resources = disk_sizes
            .iter()
            .map(|size| {
                Resource::new("disk", DEFAULT_ROLE, Value::Scalar(*size)).with_disk(DiskInfo {
                    source_type: DiskSourceType::Mount,
                    persistence: None,
                    volume: None,
                })
            })
            .collect();
        let mut pool = ResourcePool::from_offer(&offer_with(resources));

        let picked = pool.consume_atomic("disk", &Value::Scalar(desired)).unwrap();
        assert_eq!(picked.as_ref().map(|r| r.value.as_scalar().unwrap()), expected);

        if expected.is_some() {
            // exactly one fewer candidate remains available afterwards.
            assert_eq!(pool.atomic_candidates("disk"), disk_sizes.len() - 1);
        } else {
            assert_eq!(pool.atomic_candidates("disk"), disk_sizes.len());
        }
    }

    #[test]
    fn expects_resource_partial_writes_back_remainder() {
        let resource = Resource::new("cpus", "role-a", Value::Scalar(2.0)).reserve(
            "role-a",
            None,
            crate::proto::Labels::new().with("resource_id", "r1"),
        );
        let mut pool = ResourcePool::from_offer(&offer_with(vec![resource]));

        let consumed = pool
            .consume_expects("r1", &Value::Scalar(0.5))
            .unwrap()
            .expect("should consume");
        assert_eq!(consumed.value, Value::Scalar(0.5));
        assert_eq!(consumed.effective_resource_id(), Some("r1"));

        // remainder stays addressable under the same resource id.
        let consumed_again = pool
            .consume_expects("r1", &Value::Scalar(1.5))
            .unwrap()
            .expect("remainder should still be present");
        assert_eq!(consumed_again.value, Value::Scalar(1.5));
    }

    #[test]
    fn expects_resource_missing_id_returns_none() {
        let mut pool = ResourcePool::from_offer(&offer_with(vec![]));
        assert!(pool
            .consume_expects("missing", &Value::Scalar(1.0))
            .unwrap()
            .is_none());
    }
}
